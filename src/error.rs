//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Problems in the model schema or in a tree configuration. Always aborts the call.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: model {model} column {column}")]
    InvalidPrimaryKey { model: String, column: String },
    #[error("duplicate model: {0}")]
    DuplicateModel(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("A tree_nodes configuration item is required")]
    MissingTreeNodes,
    #[error("A text attribute must be defined in each node configuration (level {0})")]
    MissingText(usize),
    #[error("Level {0} is not setup in tree config")]
    TreeLevel(usize),
    #[error("Tree level {0} has no link")]
    MissingLink(usize),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("invocation: {0}")]
    Invocation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("persistence: {0}")]
    Persistence(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

/// Coarse classification callers branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Configuration,
    Persistence,
    Invocation,
    BadRequest,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Config(_) => ErrorKind::Configuration,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Invocation(_) => ErrorKind::Invocation,
            AppError::Db(sqlx::Error::RowNotFound) => ErrorKind::NotFound,
            AppError::Db(_) | AppError::Persistence(_) => ErrorKind::Persistence,
            AppError::BadRequest(_) => ErrorKind::BadRequest,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match self.kind() {
            ErrorKind::Configuration => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ErrorKind::Validation => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            ErrorKind::Invocation => (StatusCode::UNPROCESSABLE_ENTITY, "invocation_error"),
            ErrorKind::Persistence => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            ErrorKind::BadRequest => (StatusCode::BAD_REQUEST, "bad_request"),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

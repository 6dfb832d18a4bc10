//! Ext Direct handlers: `POST /direct` runs one request or a batch, `GET /direct/api` describes
//! the registered actions.

use crate::direct::{dispatch, DirectRequest};
use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde_json::Value;

fn parse_request(v: Value) -> Result<DirectRequest, AppError> {
    serde_json::from_value(v).map_err(|e| AppError::BadRequest(format!("invalid direct request: {}", e)))
}

/// A batch answers with an array in request order, a single request with one object.
pub async fn route(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Json<Value>, AppError> {
    match body {
        Value::Array(items) => {
            tracing::debug!(count = items.len(), "direct batch");
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let response = dispatch(&state, parse_request(item)?).await;
                out.push(serde_json::to_value(response).map_err(|e| AppError::BadRequest(e.to_string()))?);
            }
            Ok(Json(Value::Array(out)))
        }
        single @ Value::Object(_) => {
            let response = dispatch(&state, parse_request(single)?).await;
            Ok(Json(serde_json::to_value(response).map_err(|e| AppError::BadRequest(e.to_string()))?))
        }
        _ => Err(AppError::BadRequest("body must be a direct request or a batch of them".into())),
    }
}

pub async fn api(State(state): State<AppState>) -> Json<Value> {
    Json(state.direct.descriptor())
}

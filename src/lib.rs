//! ExtJS store, tree and form protocol over a configured set of models, exposed through
//! Ext Direct.

pub mod case;
pub mod config;
pub mod direct;
pub mod error;
pub mod handlers;
pub mod options;
pub mod path;
pub mod record;
pub mod response;
pub mod routes;
pub mod service;
pub mod session;
pub mod sort;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_from_path, resolve, FullConfig, ResolvedModel, Schema, Settings};
pub use direct::{DirectConfig, DirectMethod, DirectRequest, DirectResponse};
pub use error::{AppError, ConfigError, ErrorKind};
pub use response::Envelope;
pub use routes::{common_routes, direct_routes};
pub use service::{ExtApi, OnEdit, TreeLevelConfig, TreeNode};
pub use state::AppState;
pub use store::{MemoryStore, PgStore, Store};

use axum::Router;

/// Full router: common routes plus the Ext Direct endpoint and its API descriptor.
pub fn app(state: AppState, body_limit: usize) -> Router {
    common_routes(state.clone()).merge(direct_routes(state, body_limit))
}

//! Shared application state for all routes.

use crate::config::Schema;
use crate::direct::DirectConfig;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub schema: Arc<Schema>,
    /// Actions and methods reachable over Ext Direct.
    pub direct: Arc<DirectConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, schema: Schema, direct: DirectConfig) -> Self {
        AppState {
            store,
            schema: Arc::new(schema),
            direct: Arc::new(direct),
        }
    }
}

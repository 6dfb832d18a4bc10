//! Persistence boundary. Operations only talk to a `Store`; the crate ships an in-memory
//! store and a PostgreSQL store.

mod memory;
mod postgres;
mod query;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use query::*;

use crate::config::{ResolvedModel, Schema};
use crate::error::AppError;
use crate::record::Record;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait Store: Send + Sync {
    /// Rows matching `query`, in query order.
    async fn find_all(
        &self,
        schema: &Schema,
        model: &ResolvedModel,
        query: &Query,
    ) -> Result<Vec<Record>, AppError>;

    /// One row by primary key.
    async fn find(&self, model: &ResolvedModel, id: &Value) -> Result<Option<Record>, AppError>;

    /// Number of rows matching `query`, ignoring limit/offset/order.
    async fn count(&self, schema: &Schema, model: &ResolvedModel, query: &Query) -> Result<u64, AppError>;

    /// Insert a new record or update a persisted one. Returns the stored row (with generated id).
    async fn save(&self, model: &ResolvedModel, record: Record) -> Result<Record, AppError>;

    /// Delete by primary key. Returns rows affected.
    async fn delete(&self, model: &ResolvedModel, id: &Value) -> Result<u64, AppError>;
}

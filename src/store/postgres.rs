//! PostgreSQL store: one table per model, queries from `crate::sql`.

use super::{Query, Store};
use crate::config::{ResolvedModel, Schema};
use crate::error::AppError;
use crate::record::{Attributes, Record};
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn query_many(&self, q: &QueryBuf) -> Result<Vec<Attributes>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_attributes).collect())
    }

    async fn query_optional(&self, q: &QueryBuf) -> Result<Option<Attributes>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from(p));
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_attributes))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_all(
        &self,
        schema: &Schema,
        model: &ResolvedModel,
        query: &Query,
    ) -> Result<Vec<Record>, AppError> {
        let q = sql::select(schema, model, query)?;
        let rows = self.query_many(&q).await?;
        Ok(rows
            .into_iter()
            .map(|r| Record::loaded(model.name.clone(), r))
            .collect())
    }

    async fn find(&self, model: &ResolvedModel, id: &Value) -> Result<Option<Record>, AppError> {
        let mut q = sql::select_by_id(model);
        q.params.push(id.clone());
        let row = self.query_optional(&q).await?;
        Ok(row.map(|r| Record::loaded(model.name.clone(), r)))
    }

    async fn count(&self, _schema: &Schema, model: &ResolvedModel, query: &Query) -> Result<u64, AppError> {
        let q = sql::count(model, query)?;
        let row = self.query_optional(&q).await?;
        Ok(row
            .and_then(|r| r.get("count").and_then(Value::as_u64))
            .unwrap_or(0))
    }

    async fn save(&self, model: &ResolvedModel, record: Record) -> Result<Record, AppError> {
        let q = match record.id(&model.pk).cloned() {
            Some(id) if !record.is_new() => sql::update(model, &id, record.attributes()),
            _ => sql::insert(model, record.attributes()),
        };
        let row = self.query_optional(&q).await?.ok_or_else(|| {
            AppError::NotFound(format!(
                "{} {}",
                model.name,
                record.id(&model.pk).map(Value::to_string).unwrap_or_default()
            ))
        })?;
        Ok(Record::loaded(model.name.clone(), row))
    }

    async fn delete(&self, model: &ResolvedModel, id: &Value) -> Result<u64, AppError> {
        let q = sql::delete(model);
        tracing::debug!(sql = %q.sql, id = %id, "query");
        let result = sqlx::query(&q.sql)
            .bind(PgBindValue::from(id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_attributes(row: &PgRow) -> Attributes {
    use sqlx::Column;
    use sqlx::Row;
    row.columns()
        .iter()
        .map(|col| (col.name().to_string(), cell_to_value(row, col.name())))
        .collect()
}

/// Decode one cell by trying the column types the schema can declare, most specific first.
fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}

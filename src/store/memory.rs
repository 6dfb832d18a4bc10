//! In-process store: one table of JSON rows per model, guarded by a RwLock.
//! Used by the demo server (no DATABASE_URL) and by the test suite.

use super::query::{check_columns, resolve_sort, Condition, Query, SortKey};
use super::Store;
use crate::config::{PkType, ResolvedModel, Schema};
use crate::error::AppError;
use crate::record::{Attributes, Record};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Table {
    rows: Vec<Attributes>,
    next_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a model's rows in insertion order.
    pub fn rows(&self, model: &str) -> Vec<Attributes> {
        self.tables
            .read()
            .map(|t| t.get(model).map(|t| t.rows.clone()).unwrap_or_default())
            .unwrap_or_default()
    }

    fn poisoned<T>(_: T) -> AppError {
        AppError::Persistence("memory store lock poisoned".into())
    }

    fn select(&self, schema: &Schema, model: &ResolvedModel, query: &Query) -> Result<Vec<Attributes>, AppError> {
        check_columns(model, query)?;
        let keys = query
            .order
            .iter()
            .map(|t| resolve_sort(schema, model, t))
            .collect::<Result<Vec<_>, _>>()?;

        let tables = self.tables.read().map_err(Self::poisoned)?;
        let mut rows: Vec<&Attributes> = tables
            .get(&model.name)
            .map(|t| t.rows.iter().filter(|r| matches_all(r, &query.conditions)).collect())
            .unwrap_or_default();

        if !keys.is_empty() {
            rows.sort_by(|a, b| {
                for key in &keys {
                    let ord = compare_values(
                        sort_value(&tables, a, key).as_ref(),
                        sort_value(&tables, b, key).as_ref(),
                    );
                    let ord = if key.descending { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|r| project(model, r, query.select.as_deref()))
            .collect())
    }

    fn write(&self, model: &ResolvedModel, record: Record) -> Result<Record, AppError> {
        let mut tables = self.tables.write().map_err(Self::poisoned)?;
        let table = tables.entry(model.name.clone()).or_default();

        if record.is_new() {
            let mut row = Attributes::new();
            for c in &model.columns {
                let v = record
                    .get(&c.name)
                    .cloned()
                    .filter(|v| !v.is_null())
                    .or_else(|| c.default.clone())
                    .unwrap_or(Value::Null);
                row.insert(c.name.clone(), v);
            }
            if row.get(&model.pk).map_or(true, Value::is_null) {
                row.insert(model.pk.clone(), next_id(model, table)?);
            } else if let Some(n) = row.get(&model.pk).and_then(int_key) {
                table.next_id = table.next_id.max(n);
            }
            check_not_null(model, &row)?;
            let id = row.get(&model.pk).cloned().unwrap_or(Value::Null);
            if table.rows.iter().any(|r| r.get(&model.pk).is_some_and(|v| same_id(v, &id))) {
                return Err(AppError::Persistence(format!(
                    "duplicate key value violates unique constraint on {}.{}",
                    model.table_name, model.pk
                )));
            }
            table.rows.push(row.clone());
            Ok(Record::loaded(model.name.clone(), row))
        } else {
            let id = record
                .id(&model.pk)
                .cloned()
                .ok_or_else(|| AppError::Validation(format!("{} record without {}", model.name, model.pk)))?;
            let row = table
                .rows
                .iter_mut()
                .find(|r| r.get(&model.pk).is_some_and(|v| same_id(v, &id)))
                .ok_or_else(|| AppError::NotFound(format!("{} {}", model.name, id)))?;
            let mut updated = row.clone();
            for c in &model.columns {
                if c.name == model.pk {
                    continue;
                }
                if let Some(v) = record.get(&c.name) {
                    updated.insert(c.name.clone(), v.clone());
                }
            }
            check_not_null(model, &updated)?;
            *row = updated.clone();
            Ok(Record::loaded(model.name.clone(), updated))
        }
    }

    fn remove(&self, model: &ResolvedModel, id: &Value) -> Result<u64, AppError> {
        let mut tables = self.tables.write().map_err(Self::poisoned)?;
        let Some(table) = tables.get_mut(&model.name) else {
            return Ok(0);
        };
        let before = table.rows.len();
        table
            .rows
            .retain(|r| !r.get(&model.pk).is_some_and(|v| same_id(v, id)));
        Ok((before - table.rows.len()) as u64)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_all(
        &self,
        schema: &Schema,
        model: &ResolvedModel,
        query: &Query,
    ) -> Result<Vec<Record>, AppError> {
        tracing::debug!(model = %model.name, query = ?query, "memory find_all");
        let rows = self.select(schema, model, query)?;
        Ok(rows
            .into_iter()
            .map(|r| Record::loaded(model.name.clone(), r))
            .collect())
    }

    async fn find(&self, model: &ResolvedModel, id: &Value) -> Result<Option<Record>, AppError> {
        tracing::debug!(model = %model.name, id = %id, "memory find");
        let tables = self.tables.read().map_err(Self::poisoned)?;
        Ok(tables.get(&model.name).and_then(|t| {
            t.rows
                .iter()
                .find(|r| r.get(&model.pk).is_some_and(|v| same_id(v, id)))
                .map(|r| Record::loaded(model.name.clone(), r.clone()))
        }))
    }

    async fn count(&self, schema: &Schema, model: &ResolvedModel, query: &Query) -> Result<u64, AppError> {
        Ok(self.select(schema, model, &query.without_pagination())?.len() as u64)
    }

    async fn save(&self, model: &ResolvedModel, record: Record) -> Result<Record, AppError> {
        tracing::debug!(model = %model.name, new = record.is_new(), "memory save");
        self.write(model, record)
    }

    async fn delete(&self, model: &ResolvedModel, id: &Value) -> Result<u64, AppError> {
        tracing::debug!(model = %model.name, id = %id, "memory delete");
        self.remove(model, id)
    }
}

fn next_id(model: &ResolvedModel, table: &mut Table) -> Result<Value, AppError> {
    match model.pk_type {
        PkType::Uuid => Ok(Value::String(uuid::Uuid::new_v4().to_string())),
        PkType::Text => Err(AppError::Persistence(format!(
            "null value in column {} of {} violates not-null constraint",
            model.pk, model.table_name
        ))),
        PkType::BigInt | PkType::Int => {
            table.next_id += 1;
            Ok(Value::Number(table.next_id.into()))
        }
    }
}

fn check_not_null(model: &ResolvedModel, row: &Attributes) -> Result<(), AppError> {
    for c in &model.columns {
        if !c.nullable && row.get(&c.name).map_or(true, Value::is_null) {
            return Err(AppError::Persistence(format!(
                "null value in column {} of {} violates not-null constraint",
                c.name, model.table_name
            )));
        }
    }
    Ok(())
}

fn project(model: &ResolvedModel, row: &Attributes, select: Option<&[String]>) -> Attributes {
    match select {
        None => row.clone(),
        Some(cols) => row
            .iter()
            .filter(|(k, _)| **k == model.pk || cols.iter().any(|c| c == *k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

fn sort_value(tables: &HashMap<String, Table>, row: &Attributes, key: &SortKey<'_>) -> Option<Value> {
    match key.via {
        None => row.get(key.column).cloned(),
        Some(assoc) => {
            let fk = row.get(&assoc.foreign_key).filter(|v| !v.is_null())?;
            tables
                .get(&key.model.name)?
                .rows
                .iter()
                .find(|r| r.get(&key.model.pk).is_some_and(|v| same_id(v, fk)))
                .and_then(|r| r.get(key.column).cloned())
        }
    }
}

fn matches_all(row: &Attributes, conditions: &[Condition]) -> bool {
    conditions.iter().all(|c| {
        let v = row.get(&c.column).unwrap_or(&Value::Null);
        match &c.value {
            Value::Null => v.is_null(),
            Value::Array(options) => options.iter().any(|o| loose_eq(v, o)),
            expected => loose_eq(v, expected),
        }
    })
}

fn int_key(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Ids arrive as numbers or numeric strings depending on the client.
fn same_id(a: &Value, b: &Value) -> bool {
    match (int_key(a), int_key(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => same_id(a, b),
        _ => a == b,
    }
}

/// Nulls first, then booleans, numbers, strings; other JSON compares as text.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => match rank(a).cmp(&rank(b)) {
            Ordering::Equal => a.map(|v| v.to_string()).cmp(&b.map(|v| v.to_string())),
            other => other,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, FullConfig};
    use serde_json::json;

    fn schema() -> Schema {
        let config: FullConfig = serde_json::from_value(json!({
            "models": [
                {"name": "Author", "columns": [{"name": "name"}]},
                {
                    "name": "Book",
                    "columns": [
                        {"name": "title", "nullable": false},
                        {"name": "author_id"},
                        {"name": "pages", "default": 100}
                    ],
                    "associations": [{"name": "author", "kind": "belongs_to", "model": "Author"}]
                }
            ]
        }))
        .unwrap();
        resolve(&config).unwrap()
    }

    fn record(model: &str, attrs: Value) -> Record {
        let mut r = Record::new(model);
        for (k, v) in attrs.as_object().unwrap() {
            r.set(k.clone(), v.clone());
        }
        r
    }

    #[tokio::test]
    async fn save_assigns_ids_and_defaults() {
        let schema = schema();
        let store = MemoryStore::new();
        let book = schema.get("Book").unwrap();
        let saved = store.save(book, record("Book", json!({"title": "A"}))).await.unwrap();
        assert_eq!(saved.get("id"), Some(&json!(1)));
        assert_eq!(saved.get("pages"), Some(&json!(100)));
        let second = store.save(book, record("Book", json!({"title": "B"}))).await.unwrap();
        assert_eq!(second.get("id"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn not_null_is_enforced() {
        let schema = schema();
        let store = MemoryStore::new();
        let err = store
            .save(schema.get("Book").unwrap(), record("Book", json!({"author_id": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
    }

    #[tokio::test]
    async fn sorts_across_belongs_to_and_paginates() {
        let schema = schema();
        let store = MemoryStore::new();
        let author = schema.get("Author").unwrap();
        let book = schema.get("Book").unwrap();
        store.save(author, record("Author", json!({"name": "Zed"}))).await.unwrap();
        store.save(author, record("Author", json!({"name": "Amy"}))).await.unwrap();
        store.save(book, record("Book", json!({"title": "z1", "author_id": 1}))).await.unwrap();
        store.save(book, record("Book", json!({"title": "a2", "author_id": 2}))).await.unwrap();
        store.save(book, record("Book", json!({"title": "a1", "author_id": 2}))).await.unwrap();

        let mut q = Query::new();
        q.order = super::super::parse_order("authors.name ASC,title DESC").unwrap();
        let titles: Vec<Value> = store
            .find_all(&schema, book, &q)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.get("title").cloned().unwrap())
            .collect();
        assert_eq!(titles, vec![json!("a2"), json!("a1"), json!("z1")]);

        q.limit = Some(1);
        q.offset = Some(1);
        let page = store.find_all(&schema, book, &q).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].get("title"), Some(&json!("a1")));
        assert_eq!(store.count(&schema, book, &q).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn conditions_match_loosely_and_delete_counts_rows() {
        let schema = schema();
        let store = MemoryStore::new();
        let book = schema.get("Book").unwrap();
        store.save(book, record("Book", json!({"title": "x", "author_id": 4}))).await.unwrap();
        store.save(book, record("Book", json!({"title": "y"}))).await.unwrap();
        let q = Query::eq("author_id", json!("4"));
        assert_eq!(store.find_all(&schema, book, &q).await.unwrap().len(), 1);
        let q = Query::eq("author_id", Value::Null);
        assert_eq!(store.find_all(&schema, book, &q).await.unwrap().len(), 1);
        assert_eq!(store.delete(book, &json!("1")).await.unwrap(), 1);
        assert_eq!(store.delete(book, &json!(1)).await.unwrap(), 0);
        assert!(store.find(book, &json!(1)).await.unwrap().is_none());
    }
}

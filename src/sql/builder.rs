//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from a resolved model and a `Query`.

use crate::config::{ColumnInfo, ResolvedModel, Schema};
use crate::error::AppError;
use crate::record::Attributes;
use crate::store::{check_columns, resolve_sort, Condition, Query};
use serde_json::Value;

const MAIN_ALIAS: &str = "main";

/// Quote identifier for PostgreSQL (safe: only from config or validated order terms).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(model: &ResolvedModel) -> String {
    format!("{}.{}", quoted(&model.schema_name), quoted(&model.table_name))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and return its placeholder, cast to the column type when known.
    fn placeholder(&mut self, column: Option<&ColumnInfo>, v: Value) -> String {
        self.params.push(v);
        let n = self.params.len();
        match column.and_then(|c| c.pg_type.as_deref()) {
            Some(t) => format!("${}::{}", n, t),
            None => format!("${}", n),
        }
    }
}

/// Column expressions for `alias`: custom enums and numerics come back as text.
fn column_list(model: &ResolvedModel, alias: &str, only: Option<&[String]>) -> String {
    model
        .columns
        .iter()
        .filter(|c| match only {
            None => true,
            Some(cols) => c.name == model.pk || cols.iter().any(|s| *s == c.name),
        })
        .map(|c| {
            let q = quoted(&c.name);
            let pg_type = c.pg_type.as_deref().unwrap_or("");
            if pg_type.contains('.') || pg_type == "numeric" {
                format!("{}.{}::text AS {}", alias, q, q)
            } else {
                format!("{}.{}", alias, q)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn where_clause(q: &mut QueryBuf, model: &ResolvedModel, conditions: &[Condition]) -> String {
    let mut parts = Vec::new();
    for c in conditions {
        let col = model.column(&c.column);
        let lhs = format!("{}.{}", MAIN_ALIAS, quoted(&c.column));
        match &c.value {
            Value::Null => parts.push(format!("{} IS NULL", lhs)),
            Value::Array(values) if values.is_empty() => parts.push("1 = 0".to_string()),
            Value::Array(values) => {
                let phs: Vec<String> = values.iter().map(|v| q.placeholder(col, v.clone())).collect();
                parts.push(format!("{} IN ({})", lhs, phs.join(", ")));
            }
            v => {
                let ph = q.placeholder(col, v.clone());
                parts.push(format!("{} = {}", lhs, ph));
            }
        }
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// SELECT for `query`. Sorting on a belongs_to target's column LEFT JOINs that table.
pub fn select(schema: &Schema, model: &ResolvedModel, query: &Query) -> Result<QueryBuf, AppError> {
    check_columns(model, query)?;
    let mut q = QueryBuf::new();
    let mut joins: Vec<String> = Vec::new();
    let mut order = Vec::new();
    for term in &query.order {
        let key = resolve_sort(schema, model, term)?;
        let alias = match key.via {
            None => MAIN_ALIAS.to_string(),
            Some(assoc) => {
                let alias = format!("j_{}", assoc.name);
                let join = format!(
                    " LEFT JOIN {} {} ON {}.{} = {}.{}",
                    qualified_table(key.model),
                    quoted(&alias),
                    quoted(&alias),
                    quoted(&key.model.pk),
                    MAIN_ALIAS,
                    quoted(&assoc.foreign_key)
                );
                if !joins.contains(&join) {
                    joins.push(join);
                }
                quoted(&alias)
            }
        };
        order.push(format!(
            "{}.{} {}",
            alias,
            quoted(key.column),
            if key.descending { "DESC" } else { "ASC" }
        ));
    }

    let where_sql = where_clause(&mut q, model, &query.conditions);
    let order_sql = if order.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", order.join(", "))
    };
    let limit_sql = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_sql = query.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    let lock_sql = if query.lock { " FOR UPDATE OF main" } else { "" };
    q.sql = format!(
        "SELECT {} FROM {} {}{}{}{}{}{}{}",
        column_list(model, MAIN_ALIAS, query.select.as_deref()),
        qualified_table(model),
        MAIN_ALIAS,
        joins.concat(),
        where_sql,
        order_sql,
        limit_sql,
        offset_sql,
        lock_sql
    );
    Ok(q)
}

/// COUNT(*) over the query's conditions.
pub fn count(model: &ResolvedModel, query: &Query) -> Result<QueryBuf, AppError> {
    check_columns(model, query)?;
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, model, &query.conditions);
    q.sql = format!(
        "SELECT COUNT(*) AS \"count\" FROM {} {}{}",
        qualified_table(model),
        MAIN_ALIAS,
        where_sql
    );
    Ok(q)
}

/// SELECT by primary key. Caller binds the id as sole param.
pub fn select_by_id(model: &ResolvedModel) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(model.column(&model.pk), Value::Null);
    q.params.clear();
    q.sql = format!(
        "SELECT {} FROM {} {} WHERE {}.{} = {}",
        column_list(model, MAIN_ALIAS, None),
        qualified_table(model),
        MAIN_ALIAS,
        MAIN_ALIAS,
        quoted(&model.pk),
        ph
    );
    q
}

/// INSERT the model's columns present in `attrs`. Absent or null columns with a default are
/// left to the database; a null primary key is always left out.
pub fn insert(model: &ResolvedModel, attrs: &Attributes) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &model.columns {
        let val = attrs.get(&c.name).filter(|v| !v.is_null()).cloned();
        let val = match val {
            Some(v) => v,
            None if c.name == model.pk || c.has_default => continue,
            None => match &c.default {
                Some(d) => d.clone(),
                None if attrs.contains_key(&c.name) => Value::Null,
                None => continue,
            },
        };
        placeholders.push(q.placeholder(Some(c), val));
        cols.push(quoted(&c.name));
    }
    let table = qualified_table(model);
    let returning = column_list(model, MAIN_ALIAS, None);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} AS main DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} AS main ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET every non-key model column present in `attrs`.
pub fn update(model: &ResolvedModel, id: &Value, attrs: &Attributes) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(model);
    let mut sets = Vec::new();
    for c in &model.columns {
        if c.name == model.pk {
            continue;
        }
        let Some(v) = attrs.get(&c.name) else { continue };
        let rhs = q.placeholder(Some(c), v.clone());
        sets.push(format!("{} = {}", quoted(&c.name), rhs));
    }
    let returning = column_list(model, MAIN_ALIAS, None);
    let id_ph = q.placeholder(model.column(&model.pk), id.clone());
    q.sql = if sets.is_empty() {
        format!(
            "SELECT {} FROM {} main WHERE main.{} = {}",
            returning,
            table,
            quoted(&model.pk),
            id_ph
        )
    } else {
        format!(
            "UPDATE {} main SET {} WHERE main.{} = {} RETURNING {}",
            table,
            sets.join(", "),
            quoted(&model.pk),
            id_ph,
            returning
        )
    };
    q
}

/// DELETE by id. Caller binds the id and reads rows affected.
pub fn delete(model: &ResolvedModel) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(model.column(&model.pk), Value::Null);
    q.params.clear();
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        qualified_table(model),
        quoted(&model.pk),
        ph
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, FullConfig};
    use crate::store::parse_order;
    use serde_json::json;

    fn schema() -> Schema {
        let config: FullConfig = serde_json::from_value(json!({
            "models": [
                {"name": "Author", "columns": [{"name": "name", "type": "text"}]},
                {
                    "name": "Book",
                    "columns": [
                        {"name": "title", "type": "text", "nullable": false},
                        {"name": "author_id", "type": "bigint"}
                    ],
                    "associations": [{"name": "author", "kind": "belongs_to", "model": "Author"}]
                }
            ]
        }))
        .unwrap();
        resolve(&config).unwrap()
    }

    #[test]
    fn select_joins_belongs_to_for_cross_table_sort() {
        let schema = schema();
        let book = schema.get("Book").unwrap();
        let mut query = Query::eq("author_id", json!([2, 3]));
        query.order = parse_order("authors.name ASC,title DESC").unwrap();
        query.limit = Some(10);
        query.offset = Some(5);
        let q = select(&schema, book, &query).unwrap();
        assert!(q.sql.contains(
            "LEFT JOIN \"public\".\"authors\" \"j_author\" ON \"j_author\".\"id\" = main.\"author_id\""
        ));
        assert!(q.sql.contains("WHERE main.\"author_id\" IN ($1::bigint, $2::bigint)"));
        assert!(q.sql.contains("ORDER BY \"j_author\".\"name\" ASC, main.\"title\" DESC"));
        assert!(q.sql.ends_with(" LIMIT 10 OFFSET 5"));
        assert_eq!(q.params, vec![json!(2), json!(3)]);
    }

    #[test]
    fn null_condition_is_is_null() {
        let schema = schema();
        let book = schema.get("Book").unwrap();
        let q = count(book, &Query::eq("author_id", Value::Null)).unwrap();
        assert_eq!(
            q.sql,
            "SELECT COUNT(*) AS \"count\" FROM \"public\".\"books\" main WHERE main.\"author_id\" IS NULL"
        );
        assert!(q.params.is_empty());
    }

    #[test]
    fn unknown_sort_table_is_rejected() {
        let schema = schema();
        let book = schema.get("Book").unwrap();
        let mut query = Query::new();
        query.order = parse_order("publishers.name").unwrap();
        assert!(select(&schema, book, &query).is_err());
    }

    #[test]
    fn insert_skips_null_primary_key() {
        let schema = schema();
        let book = schema.get("Book").unwrap();
        let attrs = json!({"id": null, "title": "Dune", "author_id": 1});
        let q = insert(book, attrs.as_object().unwrap());
        assert!(q.sql.starts_with(
            "INSERT INTO \"public\".\"books\" AS main (\"title\", \"author_id\") VALUES ($1::text, $2::bigint)"
        ));
        assert_eq!(q.params, vec![json!("Dune"), json!(1)]);
    }

    #[test]
    fn update_sets_present_columns_only() {
        let schema = schema();
        let book = schema.get("Book").unwrap();
        let attrs = json!({"id": 4, "title": "Emma", "unknown": 1});
        let q = update(book, &json!(4), attrs.as_object().unwrap());
        assert!(q.sql.starts_with("UPDATE \"public\".\"books\" main SET \"title\" = $1::text WHERE main.\"id\" = $2::bigint"));
        assert_eq!(q.params, vec![json!("Emma"), json!(4)]);
    }
}

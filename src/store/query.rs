//! Typed query built from (already filtered) request options.

use crate::config::{AssociationKind, AssociationSpec, ResolvedModel, Schema};
use crate::error::AppError;
use serde_json::{Map, Value};

/// Equality filter. An array value means IN, null means IS NULL.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub column: String,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderTerm {
    /// Table qualifier from a cross-table sort (`authors` in `authors.name`).
    pub table: Option<String>,
    pub column: String,
    pub descending: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub conditions: Vec<Condition>,
    pub order: Vec<OrderTerm>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub include: Vec<String>,
    pub joins: Vec<String>,
    pub select: Option<Vec<String>>,
    pub readonly: bool,
    pub lock: bool,
}

/// Options that would need a raw SQL fragment; never interpolated.
const RAW_SQL_OPTIONS: &[&str] = &["group", "having", "from"];

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single equality condition.
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Query {
            conditions: vec![Condition {
                column: column.into(),
                value,
            }],
            ..Default::default()
        }
    }

    pub fn from_options(opts: &Map<String, Value>) -> Result<Self, AppError> {
        for key in RAW_SQL_OPTIONS {
            if opts.get(*key).is_some_and(|v| !v.is_null()) {
                return Err(AppError::BadRequest(format!("option '{}' is not supported", key)));
            }
        }
        let mut q = Query::new();
        if let Some(c) = opts.get("conditions") {
            q.conditions = parse_conditions(c)?;
        }
        if let Some(o) = opts.get("order") {
            match o {
                Value::String(s) => q.order = parse_order(s)?,
                Value::Null => {}
                _ => return Err(AppError::BadRequest("order must be a string".into())),
            }
        }
        q.limit = opt_u64(opts, "limit")?;
        q.offset = opt_u64(opts, "offset")?;
        q.include = option_names(opts, "include")?.unwrap_or_default();
        q.joins = option_names(opts, "joins")?.unwrap_or_default();
        q.select = option_names(opts, "select")?;
        q.readonly = opt_bool(opts, "readonly");
        q.lock = opt_bool(opts, "lock");
        Ok(q)
    }

    /// Same query for counting: no limit, offset or order.
    pub fn without_pagination(&self) -> Self {
        Query {
            limit: None,
            offset: None,
            order: Vec::new(),
            ..self.clone()
        }
    }
}

fn parse_conditions(v: &Value) -> Result<Vec<Condition>, AppError> {
    match v {
        Value::Null => Ok(Vec::new()),
        Value::Object(m) => Ok(m
            .iter()
            .map(|(k, v)| Condition {
                column: k.clone(),
                value: v.clone(),
            })
            .collect()),
        _ => Err(AppError::BadRequest(
            "conditions must be an object of column: value".into(),
        )),
    }
}

/// Parse "authors.name ASC,title DESC" into terms.
pub fn parse_order(clause: &str) -> Result<Vec<OrderTerm>, AppError> {
    let mut terms = Vec::new();
    for part in clause.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let mut words = part.split_whitespace();
        let field = words.next().unwrap_or_default();
        let descending = match words.next().map(|d| d.to_ascii_uppercase()) {
            None => false,
            Some(d) if d == "ASC" => false,
            Some(d) if d == "DESC" => true,
            Some(d) => return Err(AppError::BadRequest(format!("invalid sort direction: {}", d))),
        };
        if words.next().is_some() {
            return Err(AppError::BadRequest(format!("invalid order term: {}", part)));
        }
        let (table, column) = match field.split_once('.') {
            Some((t, c)) => (Some(t.to_string()), c.to_string()),
            None => (None, field.to_string()),
        };
        if !is_identifier(&column) || table.as_deref().is_some_and(|t| !is_identifier(t)) {
            return Err(AppError::BadRequest(format!("invalid order field: {}", field)));
        }
        terms.push(OrderTerm {
            table,
            column,
            descending,
        });
    }
    Ok(terms)
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn opt_u64(opts: &Map<String, Value>, key: &str) -> Result<Option<u64>, AppError> {
    match opts.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => as_u64(v)
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("{} must be a non-negative integer", key))),
    }
}

/// Numbers or numeric strings (grids send both).
pub fn as_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn opt_bool(opts: &Map<String, Value>, key: &str) -> bool {
    match opts.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// A list of names: JSON array of strings, or a comma separated string.
pub fn option_names(opts: &Map<String, Value>, key: &str) -> Result<Option<Vec<String>>, AppError> {
    match opts.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )),
        Some(Value::Array(items)) => items
            .iter()
            .map(|i| {
                i.as_str()
                    .map(String::from)
                    .ok_or_else(|| AppError::BadRequest(format!("{} must list names", key)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(AppError::BadRequest(format!("{} must list names", key))),
    }
}

/// Where an order term's column lives: on the model itself or behind a belongs_to.
#[derive(Clone, Debug)]
pub struct SortKey<'a> {
    pub via: Option<&'a AssociationSpec>,
    pub model: &'a ResolvedModel,
    pub column: &'a str,
    pub descending: bool,
}

/// Resolve a term against the schema. A table qualifier other than the model's own must name
/// the table of one of its belongs_to targets.
pub fn resolve_sort<'a>(
    schema: &'a Schema,
    model: &'a ResolvedModel,
    term: &'a OrderTerm,
) -> Result<SortKey<'a>, AppError> {
    let (via, target) = match term.table.as_deref() {
        None => (None, model),
        Some(t) if t == model.table_name => (None, model),
        Some(t) => {
            let found = model.associations.iter().find_map(|a| {
                if a.kind != AssociationKind::BelongsTo {
                    return None;
                }
                schema
                    .get(&a.target)
                    .filter(|m| m.table_name == t)
                    .map(|m| (a, m))
            });
            let (a, m) = found.ok_or_else(|| {
                AppError::BadRequest(format!("cannot sort {} on table {}", model.name, t))
            })?;
            (Some(a), m)
        }
    };
    if !target.has_column(&term.column) {
        return Err(AppError::BadRequest(format!(
            "unknown sort column {}.{}",
            target.table_name, term.column
        )));
    }
    Ok(SortKey {
        via,
        model: target,
        column: &term.column,
        descending: term.descending,
    })
}

/// Reject conditions and select lists naming unknown columns.
pub fn check_columns(model: &ResolvedModel, query: &Query) -> Result<(), AppError> {
    for c in &query.conditions {
        if !model.has_column(&c.column) {
            return Err(AppError::BadRequest(format!(
                "unknown condition column {}.{}",
                model.name, c.column
            )));
        }
    }
    if let Some(select) = &query.select {
        for col in select {
            if !model.has_column(col) {
                return Err(AppError::BadRequest(format!(
                    "unknown select column {}.{}",
                    model.name, col
                )));
            }
        }
    }
    for j in &query.joins {
        if model.association(j).is_none() {
            return Err(AppError::BadRequest(format!("unknown join {}.{}", model.name, j)));
        }
    }
    Ok(())
}

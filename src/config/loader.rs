//! Load config from in-memory structs or from a models.json file.

use crate::case::{pluralize, to_snake_case};
use crate::config::resolved::{AssociationSpec, ColumnInfo, PkType, ResolvedModel, Schema};
use crate::config::types::*;
use crate::config::{default_foreign_key, validate, FullConfig};
use crate::error::ConfigError;
use std::path::Path;

pub const DEFAULT_SCHEMA: &str = "public";

/// Table name for a model: explicit `table`, else the pluralized snake_case model name.
pub fn table_name_for(model: &ModelConfig) -> String {
    model
        .table
        .clone()
        .unwrap_or_else(|| pluralize(&to_snake_case(&model.name)))
}

/// Build resolved schema from full config (validates first).
pub fn resolve(config: &FullConfig) -> Result<Schema, ConfigError> {
    validate(config)?;
    let schema_name = config.schema.clone().unwrap_or_else(|| DEFAULT_SCHEMA.to_string());

    let mut models = Vec::with_capacity(config.models.len());
    for m in &config.models {
        let pk = m.primary_key.clone().unwrap_or_else(|| "id".to_string());
        let mut columns: Vec<ColumnInfo> = m
            .columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                nullable: c.nullable || c.name == pk,
                has_default: c.default.is_some() || c.name == pk,
                default: c.default.clone(),
                pg_type: c.type_.as_ref().and_then(column_pg_type_name),
            })
            .collect();

        let pk_type = match m.columns.iter().find(|c| c.name == pk) {
            Some(col) => infer_pk_type(col),
            None => {
                if m.primary_key.is_some() {
                    return Err(ConfigError::InvalidPrimaryKey {
                        model: m.name.clone(),
                        column: pk,
                    });
                }
                columns.insert(
                    0,
                    ColumnInfo {
                        name: pk.clone(),
                        nullable: true,
                        has_default: true,
                        default: None,
                        pg_type: Some("bigint".into()),
                    },
                );
                PkType::BigInt
            }
        };

        let associations = m
            .associations
            .iter()
            .map(|a| AssociationSpec {
                name: a.name.clone(),
                kind: a.kind,
                target: a.model.clone(),
                foreign_key: a
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| default_foreign_key(m, a.kind, &a.name)),
            })
            .collect();

        models.push(ResolvedModel {
            name: m.name.clone(),
            schema_name: schema_name.clone(),
            table_name: table_name_for(m),
            pk,
            pk_type,
            columns,
            associations,
        });
    }

    Schema::new(models)
}

fn column_pg_type_name(ty: &ColumnTypeConfig) -> Option<String> {
    let name = ty.name();
    let lower = name.to_lowercase();
    if lower == "timestamptz" || lower == "timestamp with time zone" {
        Some("timestamptz".into())
    } else if lower == "timestamp" || lower.starts_with("timestamp ") {
        Some("timestamp".into())
    } else if lower == "date" {
        Some("date".into())
    } else if lower.contains("uuid") {
        Some("uuid".into())
    } else if lower == "boolean" || lower == "bool" {
        Some("boolean".into())
    } else if lower == "numeric" || lower.starts_with("decimal") {
        Some("numeric".into())
    } else if matches!(lower.as_str(), "bigint" | "bigserial" | "int8") {
        Some("bigint".into())
    } else if matches!(lower.as_str(), "integer" | "int" | "int4" | "serial") {
        Some("integer".into())
    } else if lower == "smallint" || lower == "int2" {
        Some("smallint".into())
    } else if lower == "text" || lower.starts_with("varchar") || lower.starts_with("character varying") {
        Some("text".into())
    } else if lower == "real" || lower.starts_with("double") || lower.starts_with("float") {
        Some("double precision".into())
    } else if lower == "json" || lower == "jsonb" {
        Some(lower)
    } else if name.contains('.') {
        // Schema-qualified custom type (e.g. library.loan_state); cast so text binds correctly
        Some(name.to_string())
    } else {
        None
    }
}

fn infer_pk_type(col: &ColumnConfig) -> PkType {
    let type_lower = col
        .type_
        .as_ref()
        .map(|t| t.name().to_lowercase())
        .unwrap_or_else(|| "bigserial".into());
    if type_lower.contains("uuid") {
        PkType::Uuid
    } else if type_lower.contains("bigserial") || type_lower.contains("bigint") {
        PkType::BigInt
    } else if type_lower.contains("serial") || type_lower.contains("integer") || type_lower.contains("int") {
        PkType::Int
    } else {
        PkType::Text
    }
}

/// Load full config from a models.json file, or from `models.json` inside a directory.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    let file = if tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        path.join("models.json")
    } else {
        path.to_path_buf()
    };
    tracing::debug!(path = %file.display(), "loading model config");
    let raw = tokio::fs::read_to_string(&file)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", file.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(e.to_string()))
}

//! Resolved schema: config validated and flattened for runtime use.

use crate::config::AssociationKind;
use crate::error::{AppError, ConfigError};
use std::collections::HashMap;

/// Primary key type for parsing ids coming from node ids and payloads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PkType {
    Uuid,
    BigInt,
    Int,
    Text,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub nullable: bool,
    /// Whether the column has a default (e.g. serial, NOW()).
    pub has_default: bool,
    pub default: Option<serde_json::Value>,
    /// PostgreSQL type name for SQL casts (e.g. "timestamptz") when binding string values.
    pub pg_type: Option<String>,
}

/// A navigable relation from one model to another record or collection.
#[derive(Clone, Debug)]
pub struct AssociationSpec {
    pub name: String,
    pub kind: AssociationKind,
    pub target: String,
    /// Column holding the key: on our side for belongs_to, on theirs for has_many.
    pub foreign_key: String,
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub name: String,
    pub schema_name: String,
    pub table_name: String,
    pub pk: String,
    pub pk_type: PkType,
    pub columns: Vec<ColumnInfo>,
    pub associations: Vec<AssociationSpec>,
}

impl ResolvedModel {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn association(&self, name: &str) -> Option<&AssociationSpec> {
        self.associations.iter().find(|a| a.name == name)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Schema {
    pub models: Vec<ResolvedModel>,
    pub model_by_name: HashMap<String, usize>,
}

impl Schema {
    pub fn new(models: Vec<ResolvedModel>) -> Result<Self, ConfigError> {
        let mut model_by_name = HashMap::new();
        for (i, m) in models.iter().enumerate() {
            if model_by_name.insert(m.name.clone(), i).is_some() {
                return Err(ConfigError::DuplicateModel(m.name.clone()));
            }
        }
        Ok(Schema {
            models,
            model_by_name,
        })
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedModel> {
        self.model_by_name.get(name).map(|&i| &self.models[i])
    }

    /// Like `get` but a missing model is a NotFound error.
    pub fn model(&self, name: &str) -> Result<&ResolvedModel, AppError> {
        self.get(name)
            .ok_or_else(|| AppError::NotFound(format!("model {}", name)))
    }

    /// Walk association names from `model` and return the model at the end of the chain.
    pub fn follow<'a>(&'a self, model: &'a ResolvedModel, names: &[String]) -> Result<&'a ResolvedModel, AppError> {
        let mut current = model;
        for name in names {
            let assoc = current.association(name).ok_or_else(|| {
                AppError::Invocation(format!("undefined association '{}' for {}", name, current.name))
            })?;
            current = self.model(&assoc.target)?;
        }
        Ok(current)
    }
}

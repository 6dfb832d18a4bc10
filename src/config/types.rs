//! Raw config types matching the models.json schema.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnTypeConfig {
    Simple(String),
    Parameterized { name: String, params: Option<Vec<u32>> },
}

impl ColumnTypeConfig {
    pub fn name(&self) -> &str {
        match self {
            ColumnTypeConfig::Simple(s) => s.as_str(),
            ColumnTypeConfig::Parameterized { name, .. } => name.as_str(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_: Option<ColumnTypeConfig>,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Value used by the in-memory store when the column is omitted; any presence means "has a DB default".
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    /// We hold the foreign key (`book.author_id`).
    BelongsTo,
    /// They hold the foreign key (`book.author_id` seen from the author).
    HasMany,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssociationConfig {
    pub name: String,
    pub kind: AssociationKind,
    /// Target model name.
    pub model: String,
    #[serde(default)]
    pub foreign_key: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub associations: Vec<AssociationConfig>,
}

/// All model declarations in one struct for in-memory loading.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FullConfig {
    /// PostgreSQL schema holding the model tables.
    #[serde(default)]
    pub schema: Option<String>,
    pub models: Vec<ModelConfig>,
}

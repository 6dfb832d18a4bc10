//! Config validation: referential integrity between models, columns and associations.

use crate::case::to_snake_case;
use crate::config::{AssociationKind, FullConfig, ModelConfig};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

/// Foreign key column an association uses when the config leaves it out.
pub fn default_foreign_key(owner: &ModelConfig, kind: AssociationKind, name: &str) -> String {
    match kind {
        AssociationKind::BelongsTo => format!("{}_id", name),
        AssociationKind::HasMany => format!("{}_id", to_snake_case(&owner.name)),
    }
}

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let mut by_name: HashMap<&str, &ModelConfig> = HashMap::new();
    for m in &config.models {
        if m.name.is_empty() {
            return Err(ConfigError::Validation("model name must not be empty".into()));
        }
        if by_name.insert(m.name.as_str(), m).is_some() {
            return Err(ConfigError::DuplicateModel(m.name.clone()));
        }
    }

    for m in &config.models {
        let columns: HashSet<&str> = m.columns.iter().map(|c| c.name.as_str()).collect();
        if columns.len() != m.columns.len() {
            return Err(ConfigError::Validation(format!("duplicate column in model {}", m.name)));
        }
        let mut assoc_names = HashSet::new();
        for a in &m.associations {
            if !assoc_names.insert(a.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate association {} in model {}",
                    a.name, m.name
                )));
            }
            if columns.contains(a.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "association {}.{} shadows a column",
                    m.name, a.name
                )));
            }
            let target = by_name.get(a.model.as_str()).ok_or_else(|| ConfigError::MissingReference {
                kind: "model",
                id: a.model.clone(),
            })?;
            let fk = a
                .foreign_key
                .clone()
                .unwrap_or_else(|| default_foreign_key(m, a.kind, &a.name));
            let (holder, holder_columns): (&str, HashSet<&str>) = match a.kind {
                AssociationKind::BelongsTo => (m.name.as_str(), columns.clone()),
                AssociationKind::HasMany => (
                    target.name.as_str(),
                    target.columns.iter().map(|c| c.name.as_str()).collect(),
                ),
            };
            if !holder_columns.contains(fk.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "foreign key column",
                    id: format!("{}.{}", holder, fk),
                });
            }
        }
    }

    let mut tables = HashSet::new();
    for m in &config.models {
        let table = super::loader::table_name_for(m);
        if !tables.insert(table.clone()) {
            return Err(ConfigError::Validation(format!("table {} declared twice", table)));
        }
    }

    Ok(())
}

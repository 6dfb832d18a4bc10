//! One row of some model, held as a string-keyed JSON mapping.

use serde_json::{Map, Value};

pub type Attributes = Map<String, Value>;

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    model: String,
    attributes: Attributes,
    persisted: bool,
}

impl Record {
    /// Unsaved record with no attributes.
    pub fn new(model: impl Into<String>) -> Self {
        Record {
            model: model.into(),
            attributes: Attributes::new(),
            persisted: false,
        }
    }

    /// Record as read back from a store.
    pub fn loaded(model: impl Into<String>, attributes: Attributes) -> Self {
        Record {
            model: model.into(),
            attributes,
            persisted: true,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_new(&self) -> bool {
        !self.persisted
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }

    /// Primary key value, `None` while unset or null.
    pub fn id(&self, pk: &str) -> Option<&Value> {
        self.attributes.get(pk).filter(|v| !v.is_null())
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

/// Render an id for messages and node ids: numbers and strings without JSON quoting.
pub fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_records_have_no_id() {
        let mut r = Record::new("Book");
        assert!(r.is_new());
        assert!(r.id("id").is_none());
        r.set("id", Value::Null);
        assert!(r.id("id").is_none());
        r.set("id", json!(4));
        assert_eq!(r.id("id"), Some(&json!(4)));
    }

    #[test]
    fn id_rendering() {
        assert_eq!(id_to_string(&json!(12)), "12");
        assert_eq!(id_to_string(&json!("abc")), "abc");
    }
}

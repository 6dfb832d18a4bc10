//! Standard response envelope understood by ExtJS stores and forms.
//!
//! Every store call answers with `success`, a CRLF-joined `message`, and `data`.
//! Extra keys (`total`, `errorMessage`, ...) are merged at the top level.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

#[derive(Clone, Debug)]
pub struct Envelope {
    pub success: bool,
    pub messages: Vec<String>,
    pub data: Vec<Value>,
    pub extra: Map<String, Value>,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

impl Envelope {
    pub fn new() -> Self {
        Envelope {
            success: true,
            messages: Vec::new(),
            data: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn add_message(&mut self, msg: impl Into<String>) {
        self.messages.push(msg.into());
    }

    pub fn add_data(&mut self, data: Value) {
        self.data.push(data);
    }

    /// Set an extra top-level key (e.g. `total`).
    pub fn add(&mut self, key: &str, value: impl Into<Value>) {
        self.extra.insert(key.to_string(), value.into());
    }

    pub fn message(&self) -> String {
        self.messages.join("\r\n")
    }

    /// A single held record is returned bare, anything else as an array.
    pub fn data_value(&self) -> Value {
        if self.data.len() == 1 {
            self.data[0].clone()
        } else {
            Value::Array(self.data.clone())
        }
    }

    pub fn to_value(&self) -> Value {
        let mut out = self.extra.clone();
        out.insert("success".into(), Value::Bool(self.success));
        out.insert("message".into(), Value::String(self.message()));
        out.insert("data".into(), self.data_value());
        Value::Object(out)
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let reserved = ["success", "message", "data"];
        let extra: Vec<_> = self
            .extra
            .iter()
            .filter(|(k, _)| !reserved.contains(&k.as_str()))
            .collect();
        let mut map = serializer.serialize_map(Some(extra.len() + 3))?;
        for (k, v) in extra {
            map.serialize_entry(k, v)?;
        }
        map.serialize_entry("success", &self.success)?;
        map.serialize_entry("message", &self.message())?;
        map.serialize_entry("data", &self.data_value())?;
        map.end()
    }
}

//! Request option allow-lists. Keys a method does not know are dropped, never reported.

use serde_json::{Map, Value};

pub type Options = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Create,
    Update,
    Destroy,
    FormLoad,
    Tree,
}

const READ: &[&str] = &[
    "limit",
    "offset",
    "start",
    "sort",
    "dir",
    "conditions",
    "order",
    "group",
    "having",
    "joins",
    "include",
    "select",
    "from",
    "readonly",
    "lock",
];
const CREATE: &[&str] = &["data"];
const UPDATE: &[&str] = &["data", "on_edit", "include"];
const DESTROY: &[&str] = &["data"];
const TREE: &[&str] = &["tree_nodes", "root_options"];

impl OperationKind {
    pub fn allowed(self, key: &str) -> bool {
        match self {
            OperationKind::Read => READ.contains(&key),
            OperationKind::Create => CREATE.contains(&key),
            OperationKind::Update => UPDATE.contains(&key),
            OperationKind::Destroy => DESTROY.contains(&key),
            OperationKind::FormLoad => key == "id" || READ.contains(&key),
            OperationKind::Tree => TREE.contains(&key),
        }
    }
}

pub fn filter(kind: OperationKind, mut options: Options) -> Options {
    options.retain(|k, _| kind.allowed(k));
    options
}

/// Options from a wire value; anything but an object counts as no options.
pub fn from_value(v: Value) -> Options {
    match v {
        Value::Object(m) => m,
        _ => Options::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_unknown_keys() {
        let opts = from_value(json!({"data": [1], "limit": 3, "evil": "DROP"}));
        let create = filter(OperationKind::Create, opts.clone());
        assert_eq!(Value::Object(create), json!({"data": [1]}));
        let read = filter(OperationKind::Read, opts);
        assert_eq!(Value::Object(read), json!({"limit": 3}));
    }

    #[test]
    fn update_keeps_on_edit() {
        let opts = from_value(json!({"data": {"id": 1}, "on_edit": "force_create", "limit": 1}));
        let update = filter(OperationKind::Update, opts);
        assert!(update.contains_key("on_edit"));
        assert!(!update.contains_key("limit"));
    }

    #[test]
    fn form_load_accepts_id_and_read_options() {
        let opts = from_value(json!({"id": 4, "include": ["author"], "data": {}}));
        let load = filter(OperationKind::FormLoad, opts);
        assert!(load.contains_key("id") && load.contains_key("include"));
        assert!(!load.contains_key("data"));
    }

    #[test]
    fn non_object_is_empty() {
        assert!(from_value(json!("x")).is_empty());
    }
}

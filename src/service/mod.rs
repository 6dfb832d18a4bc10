//! Store, tree and form operations for one model, in the shape ExtJS clients expect.

mod create;
mod destroy;
mod form;
mod read;
mod tree;
mod update;

pub use tree::{NodeRef, TreeLevelConfig, TreeNode};
pub use update::OnEdit;

use crate::config::{PkType, ResolvedModel, Schema};
use crate::error::AppError;
use crate::record::Attributes;
use crate::session::{Link, RecordKey, Session};
use crate::store::Store;
use serde_json::Value;
use std::sync::Arc;

/// Entry point for every operation on `model`. Cheap to clone; each call runs in its own
/// `Session`.
#[derive(Clone)]
pub struct ExtApi {
    store: Arc<dyn Store>,
    schema: Arc<Schema>,
    model: String,
}

impl ExtApi {
    pub fn new(store: Arc<dyn Store>, schema: Arc<Schema>, model: impl Into<String>) -> Result<Self, AppError> {
        let model = model.into();
        schema.model(&model)?;
        Ok(ExtApi { store, schema, model })
    }

    fn model(&self) -> Result<&ResolvedModel, AppError> {
        self.schema.model(&self.model)
    }

    fn session(&self) -> Session {
        Session::new(Arc::clone(&self.store), Arc::clone(&self.schema))
    }
}

/// `data` from the request, required by every mutating operation.
fn require_data(opts: &crate::options::Options) -> Result<&Value, AppError> {
    match opts.get("data") {
        None | Some(Value::Null) => Err(AppError::Validation("No data arguments in request".into())),
        Some(v) => Ok(v),
    }
}

/// A record's attributes plus, per name, the association's attributes: an object, a list, or
/// null for an empty single association.
async fn with_includes(session: &mut Session, key: RecordKey, include: &[String]) -> Result<Attributes, AppError> {
    let mut attrs = session.attributes(key);
    for name in include {
        let value = match session.association(key, name).await? {
            Link::One(None) => Value::Null,
            Link::One(Some(k)) => Value::Object(session.attributes(k)),
            Link::Many(ks) => Value::Array(ks.into_iter().map(|k| Value::Object(session.attributes(k))).collect()),
        };
        attrs.insert(name.clone(), value);
    }
    Ok(attrs)
}

/// Parse an id taken from a node id or URL segment by the model's key type.
fn parse_id(id_str: &str, pk_type: &PkType) -> Result<Value, AppError> {
    Ok(match pk_type {
        PkType::Uuid => {
            let u = uuid::Uuid::parse_str(id_str).map_err(|_| AppError::Validation(format!("invalid uuid '{}'", id_str)))?;
            Value::String(u.to_string())
        }
        PkType::BigInt | PkType::Int => {
            let n: i64 = id_str
                .parse()
                .map_err(|_| AppError::Validation(format!("invalid id '{}'", id_str)))?;
            Value::Number(n.into())
        }
        PkType::Text => Value::String(id_str.to_string()),
    })
}

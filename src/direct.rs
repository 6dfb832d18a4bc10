//! Ext Direct remoting: which model actions expose which methods, and request dispatch.
//!
//! A client sends `{action, method, data, type: "rpc", tid}` where `action` is a model name
//! and `data` the positional arguments. Registration is explicit; nothing is exposed unless a
//! model is registered here.

use crate::error::AppError;
use crate::options::from_value;
use crate::service::ExtApi;
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DirectMethod {
    Read,
    Create,
    Update,
    Destroy,
    GetNodes,
    FormLoad,
    FormSubmit,
}

impl DirectMethod {
    pub const STORE: [DirectMethod; 4] = [
        DirectMethod::Read,
        DirectMethod::Create,
        DirectMethod::Update,
        DirectMethod::Destroy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DirectMethod::Read => "ext_read",
            DirectMethod::Create => "ext_create",
            DirectMethod::Update => "ext_update",
            DirectMethod::Destroy => "ext_destroy",
            DirectMethod::GetNodes => "ext_get_nodes",
            DirectMethod::FormLoad => "ext_form_load",
            DirectMethod::FormSubmit => "ext_form_submit",
        }
    }

    /// Number of positional arguments.
    pub fn arity(self) -> usize {
        match self {
            DirectMethod::GetNodes | DirectMethod::FormLoad => 2,
            _ => 1,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            DirectMethod::Read,
            DirectMethod::Create,
            DirectMethod::Update,
            DirectMethod::Destroy,
            DirectMethod::GetNodes,
            DirectMethod::FormLoad,
            DirectMethod::FormSubmit,
        ]
        .into_iter()
        .find(|m| m.name() == name)
    }
}

/// Registered actions, keyed by model name.
#[derive(Clone, Debug)]
pub struct DirectConfig {
    pub url: String,
    actions: BTreeMap<String, Vec<DirectMethod>>,
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self::new("/direct")
    }
}

impl DirectConfig {
    pub fn new(url: impl Into<String>) -> Self {
        DirectConfig {
            url: url.into(),
            actions: BTreeMap::new(),
        }
    }

    /// Expose the store methods (read, create, update, destroy) for `model`.
    pub fn register(self, model: impl Into<String>) -> Self {
        self.register_with(model, &DirectMethod::STORE)
    }

    /// Expose `methods` for `model`, in addition to any already registered.
    pub fn register_with(mut self, model: impl Into<String>, methods: &[DirectMethod]) -> Self {
        let entry = self.actions.entry(model.into()).or_default();
        for m in methods {
            if !entry.contains(m) {
                entry.push(*m);
            }
        }
        self
    }

    pub fn methods(&self, action: &str) -> Option<&[DirectMethod]> {
        self.actions.get(action).map(Vec::as_slice)
    }

    /// Remoting descriptor for `Ext.Direct.addProvider`.
    pub fn descriptor(&self) -> Value {
        let actions: serde_json::Map<String, Value> = self
            .actions
            .iter()
            .map(|(action, methods)| {
                let list = methods
                    .iter()
                    .map(|m| json!({"name": m.name(), "len": m.arity()}))
                    .collect();
                (action.clone(), Value::Array(list))
            })
            .collect();
        json!({
            "url": self.url,
            "type": "remoting",
            "actions": actions,
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct DirectRequest {
    pub action: String,
    pub method: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub tid: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DirectResponse {
    Rpc {
        tid: Value,
        action: String,
        method: String,
        result: Value,
    },
    Exception {
        tid: Value,
        action: String,
        method: String,
        message: String,
    },
}

/// Run one request. Errors become `exception` responses; the transport call itself succeeds.
pub async fn dispatch(state: &AppState, request: DirectRequest) -> DirectResponse {
    tracing::debug!(action = %request.action, method = %request.method, tid = %request.tid, "direct call");
    match call(state, &request).await {
        Ok(result) => DirectResponse::Rpc {
            tid: request.tid,
            action: request.action,
            method: request.method,
            result,
        },
        Err(e) => {
            tracing::warn!(action = %request.action, method = %request.method, error = %e, "direct call failed");
            DirectResponse::Exception {
                tid: request.tid,
                action: request.action,
                method: request.method,
                message: e.to_string(),
            }
        }
    }
}

async fn call(state: &AppState, request: &DirectRequest) -> Result<Value, AppError> {
    if request.kind.as_deref().is_some_and(|k| k != "rpc") {
        return Err(AppError::BadRequest(format!("unsupported request type '{}'", request.kind.as_deref().unwrap_or_default())));
    }
    let method = state
        .direct
        .methods(&request.action)
        .and_then(|methods| {
            DirectMethod::from_name(&request.method).filter(|m| methods.contains(m))
        })
        .ok_or_else(|| {
            AppError::NotFound(format!("no method {}.{}", request.action, request.method))
        })?;

    let mut args = match request.data.clone() {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(args)) => args,
        Some(other) => vec![other],
    };
    if args.len() > method.arity() {
        return Err(AppError::BadRequest(format!(
            "{} takes {} argument(s), got {}",
            method.name(),
            method.arity(),
            args.len()
        )));
    }
    args.resize(method.arity(), Value::Null);
    let mut args = args.into_iter();
    let mut next = || args.next().unwrap_or(Value::Null);

    let api = ExtApi::new(Arc::clone(&state.store), Arc::clone(&state.schema), request.action.clone())?;
    Ok(match method {
        DirectMethod::Read => api.read(from_value(next())).await?.to_value(),
        DirectMethod::Create => api.create(from_value(next())).await?.to_value(),
        DirectMethod::Update => api.update(from_value(next())).await?.to_value(),
        DirectMethod::Destroy => api.destroy(from_value(next())).await?.to_value(),
        DirectMethod::GetNodes => {
            let node = match next() {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            let nodes = api.get_nodes(&node, from_value(next())).await?;
            serde_json::to_value(nodes).map_err(|e| AppError::BadRequest(e.to_string()))?
        }
        DirectMethod::FormLoad => {
            let id = next();
            api.form_load(id, from_value(next())).await.to_value()
        }
        DirectMethod::FormSubmit => api.form_submit(from_value(next())).to_value(),
    })
}

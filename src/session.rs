//! Unit of work for one operation call.
//!
//! A `Session` owns every record it loads or builds, keyed by `RecordKey`, and keeps an
//! identity map so the same row is only materialized once. Associations are loaded lazily
//! and cached; assignments stay in the session until `save`.

use crate::config::{AssociationKind, AssociationSpec, ResolvedModel, Schema};
use crate::error::AppError;
use crate::record::{id_to_string, Attributes, Record};
use crate::store::{OrderTerm, Query, Store};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Handle to a record held by a `Session`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordKey(usize);

/// Cached value of an association.
#[derive(Clone, Debug, PartialEq)]
pub enum Link {
    One(Option<RecordKey>),
    Many(Vec<RecordKey>),
}

struct Entry {
    record: Record,
    links: HashMap<String, Link>,
    /// has_many associations assigned since load, with the children linked before.
    relink: HashMap<String, Vec<RecordKey>>,
}

pub struct Session {
    store: Arc<dyn Store>,
    schema: Arc<Schema>,
    entries: Vec<Entry>,
    identity: HashMap<(String, String), RecordKey>,
}

impl Session {
    pub fn new(store: Arc<dyn Store>, schema: Arc<Schema>) -> Self {
        Session {
            store,
            schema,
            entries: Vec::new(),
            identity: HashMap::new(),
        }
    }

    /// Empty session over the same store and schema.
    pub fn fresh(&self) -> Session {
        Session::new(Arc::clone(&self.store), Arc::clone(&self.schema))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn record(&self, key: RecordKey) -> &Record {
        &self.entries[key.0].record
    }

    pub fn attributes(&self, key: RecordKey) -> Attributes {
        self.record(key).attributes().clone()
    }

    pub fn model_of(&self, key: RecordKey) -> Result<&ResolvedModel, AppError> {
        self.schema.model(self.record(key).model())
    }

    pub fn id(&self, key: RecordKey) -> Option<Value> {
        let model = self.model_of(key).ok()?;
        self.record(key).id(&model.pk).cloned()
    }

    pub fn is_new(&self, key: RecordKey) -> bool {
        self.record(key).is_new()
    }

    fn identity_key(model: &ResolvedModel, record: &Record) -> Option<(String, String)> {
        record
            .id(&model.pk)
            .map(|id| (model.name.clone(), id_to_string(id)))
    }

    /// Take ownership of a record. A persisted row already in the session resolves to the
    /// existing handle so pending changes are kept.
    fn adopt(&mut self, record: Record) -> RecordKey {
        let ident = match self.schema.get(record.model()) {
            Some(model) if !record.is_new() => Self::identity_key(model, &record),
            _ => None,
        };
        if let Some(existing) = ident.as_ref().and_then(|i| self.identity.get(i)) {
            return *existing;
        }
        let key = RecordKey(self.entries.len());
        self.entries.push(Entry {
            record,
            links: HashMap::new(),
            relink: HashMap::new(),
        });
        if let Some(ident) = ident {
            self.identity.insert(ident, key);
        }
        key
    }

    pub async fn find(&mut self, model: &str, id: &Value) -> Result<Option<RecordKey>, AppError> {
        let schema = Arc::clone(&self.schema);
        let model = schema.model(model)?;
        if let Some(key) = self.identity.get(&(model.name.clone(), id_to_string(id))) {
            return Ok(Some(*key));
        }
        let found = self.store.find(model, id).await?;
        Ok(found.map(|r| self.adopt(r)))
    }

    /// Like `find` but a missing row is a NotFound error.
    pub async fn get(&mut self, model: &str, id: &Value) -> Result<RecordKey, AppError> {
        self.find(model, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Couldn't find {} with id={}", model, id_to_string(id))))
    }

    pub async fn find_all(&mut self, model: &str, query: &Query) -> Result<Vec<RecordKey>, AppError> {
        let schema = Arc::clone(&self.schema);
        let model = schema.model(model)?;
        let rows = self.store.find_all(&schema, model, query).await?;
        Ok(rows.into_iter().map(|r| self.adopt(r)).collect())
    }

    pub async fn count(&self, model: &str, query: &Query) -> Result<u64, AppError> {
        let model = self.schema.model(model)?;
        self.store.count(&self.schema, model, query).await
    }

    /// First record of `model` whose `column` equals `value`.
    pub async fn find_first_by(
        &mut self,
        model: &str,
        column: &str,
        value: Value,
    ) -> Result<Option<RecordKey>, AppError> {
        let mut query = Query::eq(column, value);
        query.limit = Some(1);
        Ok(self.find_all(model, &query).await?.into_iter().next())
    }

    /// New unsaved record.
    pub fn build(&mut self, model: &str) -> Result<RecordKey, AppError> {
        let model = self.schema.model(model)?;
        let record = Record::new(model.name.clone());
        Ok(self.adopt(record))
    }

    /// Unsaved copy of `key`'s attributes without its primary key. Associations are not copied.
    pub fn clone_record(&mut self, key: RecordKey) -> Result<RecordKey, AppError> {
        let pk = self.model_of(key)?.pk.clone();
        let source = self.record(key);
        let mut copy = Record::new(source.model());
        for (k, v) in source.attributes() {
            if *k != pk {
                copy.set(k.clone(), v.clone());
            }
        }
        Ok(self.adopt(copy))
    }

    pub fn get_attribute(&self, key: RecordKey, name: &str) -> Result<Value, AppError> {
        let model = self.model_of(key)?;
        if !model.has_column(name) {
            return Err(AppError::Invocation(format!(
                "undefined attribute '{}' for {}",
                name, model.name
            )));
        }
        Ok(self.record(key).get(name).cloned().unwrap_or(Value::Null))
    }

    pub fn set_attribute(&mut self, key: RecordKey, name: &str, value: Value) -> Result<(), AppError> {
        let model = self.model_of(key)?;
        if !model.has_column(name) {
            return Err(AppError::Invocation(format!(
                "undefined attribute '{}=' for {}",
                name, model.name
            )));
        }
        let belongs_to: Vec<String> = model
            .associations
            .iter()
            .filter(|a| a.kind == AssociationKind::BelongsTo && a.foreign_key == name)
            .map(|a| a.name.clone())
            .collect();
        let entry = &mut self.entries[key.0];
        entry.record.set(name, value);
        // A changed foreign key invalidates the cached target.
        for a in belongs_to {
            entry.links.remove(&a);
        }
        Ok(())
    }

    fn association_spec(&self, key: RecordKey, name: &str) -> Result<AssociationSpec, AppError> {
        let model = self.model_of(key)?;
        model.association(name).cloned().ok_or_else(|| {
            AppError::Invocation(format!("undefined association '{}' for {}", name, model.name))
        })
    }

    /// Load (or return the cached) association.
    pub async fn association(&mut self, key: RecordKey, name: &str) -> Result<Link, AppError> {
        if let Some(link) = self.entries[key.0].links.get(name) {
            return Ok(link.clone());
        }
        let assoc = self.association_spec(key, name)?;
        let link = match assoc.kind {
            AssociationKind::BelongsTo => {
                let fk = self.record(key).get(&assoc.foreign_key).cloned();
                match fk.filter(|v| !v.is_null()) {
                    Some(fk) => Link::One(self.find(&assoc.target, &fk).await?),
                    None => Link::One(None),
                }
            }
            AssociationKind::HasMany => match self.id(key) {
                Some(id) if !self.is_new(key) => {
                    let target_pk = self.schema.model(&assoc.target)?.pk.clone();
                    let mut query = Query::eq(assoc.foreign_key.clone(), id);
                    query.order = vec![OrderTerm {
                        table: None,
                        column: target_pk,
                        descending: false,
                    }];
                    Link::Many(self.find_all(&assoc.target, &query).await?)
                }
                _ => Link::Many(Vec::new()),
            },
        };
        self.entries[key.0].links.insert(name.to_string(), link.clone());
        Ok(link)
    }

    /// Replace an association. belongs_to updates the foreign key at once when the target has an
    /// id; has_many children are re-linked when the owner is saved.
    pub async fn assign_association(&mut self, key: RecordKey, name: &str, link: Link) -> Result<(), AppError> {
        let assoc = self.association_spec(key, name)?;
        match (assoc.kind, link) {
            (AssociationKind::BelongsTo, Link::One(target)) => {
                if let Some(t) = target {
                    self.check_target(&assoc, t)?;
                }
                let fk = target.and_then(|t| self.id(t)).unwrap_or(Value::Null);
                let entry = &mut self.entries[key.0];
                entry.record.set(assoc.foreign_key.clone(), fk);
                entry.links.insert(assoc.name.clone(), Link::One(target));
                Ok(())
            }
            (AssociationKind::HasMany, Link::Many(children)) => {
                for c in &children {
                    self.check_target(&assoc, *c)?;
                }
                let previous = match self.association(key, name).await? {
                    Link::Many(prev) => prev,
                    Link::One(_) => Vec::new(),
                };
                let entry = &mut self.entries[key.0];
                entry.relink.entry(assoc.name.clone()).or_insert(previous);
                entry.links.insert(assoc.name.clone(), Link::Many(children));
                Ok(())
            }
            (AssociationKind::BelongsTo, Link::Many(_)) => Err(AppError::Invocation(format!(
                "association '{}' holds a single record",
                name
            ))),
            (AssociationKind::HasMany, Link::One(_)) => Err(AppError::Invocation(format!(
                "association '{}' holds a collection",
                name
            ))),
        }
    }

    fn check_target(&self, assoc: &AssociationSpec, target: RecordKey) -> Result<(), AppError> {
        let actual = self.record(target).model();
        if actual != assoc.target {
            return Err(AppError::Invocation(format!(
                "{} expected for association '{}', got {}",
                assoc.target, assoc.name, actual
            )));
        }
        Ok(())
    }

    /// Persist a record. Unsaved belongs_to targets are saved first so the foreign keys can be
    /// filled in; reassigned has_many children are re-pointed afterwards.
    pub fn save(&mut self, key: RecordKey) -> BoxFuture<'_, Result<(), AppError>> {
        async move {
            let model = self.model_of(key)?.clone();

            let parents: Vec<(AssociationSpec, RecordKey)> = model
                .associations
                .iter()
                .filter(|a| a.kind == AssociationKind::BelongsTo)
                .filter_map(|a| match self.entries[key.0].links.get(&a.name) {
                    Some(Link::One(Some(t))) => Some((a.clone(), *t)),
                    _ => None,
                })
                .collect();
            for (assoc, target) in parents {
                if target != key && self.is_new(target) {
                    self.save(target).await?;
                }
                let fk = self.id(target).unwrap_or(Value::Null);
                self.entries[key.0].record.set(assoc.foreign_key.clone(), fk);
            }

            let record = self.entries[key.0].record.clone();
            let saved = self.store.save(&model, record).await?;
            if let Some(ident) = Self::identity_key(&model, &saved) {
                self.identity.insert(ident, key);
            }
            self.entries[key.0].record = saved;

            let relink: Vec<(String, Vec<RecordKey>)> = self.entries[key.0].relink.drain().collect();
            for (name, previous) in relink {
                let Some(assoc) = model.association(&name) else { continue };
                let children = match self.entries[key.0].links.get(&name) {
                    Some(Link::Many(c)) => c.clone(),
                    _ => Vec::new(),
                };
                let id = self.id(key).unwrap_or(Value::Null);
                for child in previous.into_iter().filter(|p| !children.contains(p)) {
                    self.set_attribute(child, &assoc.foreign_key, Value::Null)?;
                    self.save(child).await?;
                }
                for child in children {
                    self.set_attribute(child, &assoc.foreign_key, id.clone())?;
                    self.save(child).await?;
                }
            }
            Ok(())
        }
        .boxed()
    }
}

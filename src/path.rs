//! Dotted attribute paths over a `Session`'s record graph.
//!
//! `author.name` reads or writes the `name` of a book's author; a has_many segment fans the
//! rest of the path out over every child, in order. The last segment may be a set of sibling
//! names, read (or written) together.

use crate::error::AppError;
use crate::session::{Link, RecordKey, Session};
use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Name(String),
    Fields(Vec<String>),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributePath(Vec<Segment>);

impl AttributePath {
    /// Split a payload key on `.`.
    pub fn parse(s: &str) -> Self {
        AttributePath(s.split('.').map(|n| Segment::Name(n.to_string())).collect())
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AttributePath(names.into_iter().map(|n| Segment::Name(n.into())).collect())
    }

    /// Append a final sibling set.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .push(Segment::Fields(fields.into_iter().map(Into::into).collect()));
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Everything but the last segment.
    pub fn prefix(&self) -> AttributePath {
        AttributePath(self.0[..self.0.len().saturating_sub(1)].to_vec())
    }

    /// Leading plain names, for schema lookups.
    pub fn names(&self) -> Vec<String> {
        self.0
            .iter()
            .filter_map(|s| match s {
                Segment::Name(n) => Some(n.clone()),
                Segment::Fields(_) => None,
            })
            .collect()
    }

    pub fn last_name(&self) -> Option<&str> {
        match self.0.last() {
            Some(Segment::Name(n)) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match s {
                Segment::Name(n) => f.write_str(n)?,
                Segment::Fields(ns) => write!(f, "[{}]", ns.join(","))?,
            }
        }
        Ok(())
    }
}

/// Outcome of resolving a path.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolved {
    Value(Value),
    Record(Option<RecordKey>),
    Records(Vec<RecordKey>),
    /// One result per child of a has_many fan-out.
    List(Vec<Resolved>),
    /// Sibling set results, in request order.
    Fields(Vec<(String, Resolved)>),
}

impl Resolved {
    /// Every record reached, in order.
    pub fn records(&self) -> Vec<RecordKey> {
        let mut out = Vec::new();
        self.collect_records(&mut out);
        out
    }

    fn collect_records(&self, out: &mut Vec<RecordKey>) {
        match self {
            Resolved::Value(_) | Resolved::Record(None) => {}
            Resolved::Record(Some(k)) => out.push(*k),
            Resolved::Records(ks) => out.extend(ks),
            Resolved::List(items) => items.iter().for_each(|i| i.collect_records(out)),
            Resolved::Fields(fields) => fields.iter().for_each(|(_, r)| r.collect_records(out)),
        }
    }
}

/// Value written at the end of a path.
#[derive(Clone, Debug, PartialEq)]
pub enum Assign {
    Value(Value),
    Record(Option<RecordKey>),
    Records(Vec<RecordKey>),
}

impl Assign {
    fn resolved(&self) -> Resolved {
        match self {
            Assign::Value(v) => Resolved::Value(v.clone()),
            Assign::Record(k) => Resolved::Record(*k),
            Assign::Records(ks) => Resolved::Records(ks.clone()),
        }
    }
}

impl From<Resolved> for Option<Assign> {
    fn from(r: Resolved) -> Self {
        match r {
            Resolved::Value(v) => Some(Assign::Value(v)),
            Resolved::Record(k) => Some(Assign::Record(k)),
            Resolved::Records(ks) => Some(Assign::Records(ks)),
            Resolved::List(_) | Resolved::Fields(_) => None,
        }
    }
}

/// Record methods callable at the end of a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Clone,
    Save,
}

impl Session {
    /// Read `path` from `root`, or write `value` at its end.
    pub fn resolve<'s>(
        &'s mut self,
        root: RecordKey,
        path: &'s [Segment],
        value: Option<&'s Assign>,
    ) -> BoxFuture<'s, Result<Resolved, AppError>> {
        async move {
            match path {
                [] => Err(AppError::Invocation("empty attribute path".into())),
                [Segment::Name(name)] => self.access(root, name, value).await,
                [Segment::Fields(names)] => {
                    let mut out = Vec::with_capacity(names.len());
                    for name in names {
                        out.push((name.clone(), self.access(root, name, value).await?));
                    }
                    Ok(Resolved::Fields(out))
                }
                [Segment::Fields(_), ..] => Err(AppError::Invocation(
                    "an attribute set must be the last path segment".into(),
                )),
                [Segment::Name(name), rest @ ..] => {
                    let model = self.model_of(root)?;
                    if model.association(name).is_none() {
                        return Err(AppError::Invocation(format!(
                            "undefined association '{}' for {}",
                            name, model.name
                        )));
                    }
                    match self.association(root, name).await? {
                        Link::One(Some(next)) => self.resolve(next, rest, value).await,
                        Link::One(None) => Err(AppError::Invocation(format!(
                            "undefined method '{}' for nil ({} is empty)",
                            segment_name(rest),
                            name
                        ))),
                        Link::Many(children) => {
                            let mut out = Vec::with_capacity(children.len());
                            for child in children {
                                out.push(self.resolve(child, rest, value).await?);
                            }
                            Ok(Resolved::List(out))
                        }
                    }
                }
            }
        }
        .boxed()
    }

    /// Read or write one name on one record.
    async fn access(&mut self, key: RecordKey, name: &str, value: Option<&Assign>) -> Result<Resolved, AppError> {
        let (is_column, is_association, model_name) = {
            let model = self.model_of(key)?;
            (model.has_column(name), model.association(name).is_some(), model.name.clone())
        };
        if is_column {
            return match value {
                None => Ok(Resolved::Value(self.get_attribute(key, name)?)),
                Some(Assign::Value(v)) => {
                    self.set_attribute(key, name, v.clone())?;
                    Ok(Resolved::Value(v.clone()))
                }
                Some(_) => Err(AppError::Invocation(format!(
                    "cannot assign a record to attribute '{}'",
                    name
                ))),
            };
        }
        if !is_association {
            return Err(AppError::Invocation(format!(
                "undefined attribute '{}' for {}",
                name, model_name
            )));
        }
        match value {
            None => Ok(match self.association(key, name).await? {
                Link::One(k) => Resolved::Record(k),
                Link::Many(ks) => Resolved::Records(ks),
            }),
            Some(assign) => {
                let link = match assign {
                    Assign::Record(k) => Link::One(*k),
                    Assign::Value(Value::Null) => Link::One(None),
                    Assign::Records(ks) => Link::Many(ks.clone()),
                    Assign::Value(_) => {
                        return Err(AppError::Invocation(format!(
                            "association '{}' expects a record",
                            name
                        )))
                    }
                };
                self.assign_association(key, name, link).await?;
                Ok(assign.resolved())
            }
        }
    }

    /// Resolve `path`, then call `method` on every record reached. The result keeps the
    /// shape of the resolved path with each record replaced by the method's result.
    pub async fn invoke(&mut self, root: RecordKey, path: &[Segment], method: Method) -> Result<Resolved, AppError> {
        let target = if path.is_empty() {
            Resolved::Record(Some(root))
        } else {
            self.resolve(root, path, None).await?
        };
        self.apply(target, method).await
    }

    fn apply(&mut self, target: Resolved, method: Method) -> BoxFuture<'_, Result<Resolved, AppError>> {
        async move {
            match target {
                Resolved::Record(Some(k)) => Ok(Resolved::Record(Some(self.call(k, method).await?))),
                Resolved::Records(ks) => {
                    let mut out = Vec::with_capacity(ks.len());
                    for k in ks {
                        out.push(self.call(k, method).await?);
                    }
                    Ok(Resolved::Records(out))
                }
                Resolved::List(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(self.apply(item, method).await?);
                    }
                    Ok(Resolved::List(out))
                }
                Resolved::Record(None) => Err(AppError::Invocation(format!(
                    "undefined method '{}' for nil",
                    method.name()
                ))),
                Resolved::Value(v) => Err(AppError::Invocation(format!(
                    "undefined method '{}' for {}",
                    method.name(),
                    v
                ))),
                Resolved::Fields(_) => Err(AppError::Invocation(format!(
                    "undefined method '{}' for an attribute set",
                    method.name()
                ))),
            }
        }
        .boxed()
    }

    async fn call(&mut self, key: RecordKey, method: Method) -> Result<RecordKey, AppError> {
        match method {
            Method::Clone => self.clone_record(key),
            Method::Save => {
                self.save(key).await?;
                Ok(key)
            }
        }
    }

    /// JSON for a resolved value: records become their attribute maps.
    pub fn to_json(&self, resolved: &Resolved) -> Value {
        match resolved {
            Resolved::Value(v) => v.clone(),
            Resolved::Record(None) => Value::Null,
            Resolved::Record(Some(k)) => Value::Object(self.attributes(*k)),
            Resolved::Records(ks) => Value::Array(ks.iter().map(|k| Value::Object(self.attributes(*k))).collect()),
            Resolved::List(items) => Value::Array(items.iter().map(|i| self.to_json(i)).collect()),
            Resolved::Fields(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(n, r)| (n.clone(), self.to_json(r)))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

impl Method {
    fn name(self) -> &'static str {
        match self {
            Method::Clone => "clone",
            Method::Save => "save",
        }
    }
}

fn segment_name(rest: &[Segment]) -> String {
    AttributePath(rest.to_vec()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, FullConfig};
    use crate::store::{MemoryStore, Store};
    use serde_json::json;
    use std::sync::Arc;

    /// Ann wrote "One" and "Two"; "Three" has no author.
    async fn session() -> Session {
        let config: FullConfig = serde_json::from_value(json!({
            "models": [
                {"name": "Author", "columns": [{"name": "name"}],
                 "associations": [{"name": "books", "kind": "has_many", "model": "Book"}]},
                {"name": "Book", "columns": [{"name": "title"}, {"name": "author_id"}],
                 "associations": [{"name": "author", "kind": "belongs_to", "model": "Author"}]}
            ]
        }))
        .unwrap();
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mut s = Session::new(store, Arc::new(resolve(&config).unwrap()));
        let ann = s.build("Author").unwrap();
        s.set_attribute(ann, "name", json!("Ann")).unwrap();
        s.save(ann).await.unwrap();
        for (title, author) in [("One", json!(1)), ("Two", json!(1)), ("Three", Value::Null)] {
            let b = s.build("Book").unwrap();
            s.set_attribute(b, "title", json!(title)).unwrap();
            s.set_attribute(b, "author_id", author).unwrap();
            s.save(b).await.unwrap();
        }
        s
    }

    #[tokio::test]
    async fn single_attribute_round_trips() {
        let mut s = session().await;
        let book = s.get("Book", &json!(1)).await.unwrap();
        let path = AttributePath::parse("title");
        let before = s.resolve(book, path.segments(), None).await.unwrap();
        assert_eq!(before, Resolved::Value(json!("One")));
        let assign = Assign::Value(json!("Uno"));
        let written = s.resolve(book, path.segments(), Some(&assign)).await.unwrap();
        assert_eq!(written, Resolved::Value(json!("Uno")));
        let after = s.resolve(book, path.segments(), None).await.unwrap();
        assert_eq!(after, Resolved::Value(json!("Uno")));
    }

    #[tokio::test]
    async fn has_many_fans_out_in_order() {
        let mut s = session().await;
        let ann = s.get("Author", &json!(1)).await.unwrap();
        let path = AttributePath::parse("books.title");
        let titles = s.resolve(ann, path.segments(), None).await.unwrap();
        assert_eq!(
            titles,
            Resolved::List(vec![Resolved::Value(json!("One")), Resolved::Value(json!("Two"))])
        );
    }

    #[tokio::test]
    async fn sibling_set_reads_each_name() {
        let mut s = session().await;
        let book = s.get("Book", &json!(2)).await.unwrap();
        let path = AttributePath::from_names(["author"]).with_fields(["name", "id"]);
        let fields = s.resolve(book, path.segments(), None).await.unwrap();
        assert_eq!(s.to_json(&fields), json!({"name": "Ann", "id": 1}));
    }

    #[tokio::test]
    async fn sibling_set_writes_each_name() {
        let mut s = session().await;
        let one = s.get("Book", &json!(1)).await.unwrap();
        let path = AttributePath::from_names(["author"]).with_fields(["name"]);
        let written = s
            .resolve(one, path.segments(), Some(&Assign::Value(json!("Anne"))))
            .await
            .unwrap();
        assert_eq!(written, Resolved::Fields(vec![("name".into(), Resolved::Value(json!("Anne")))]));

        // Book 2 shares the author, so the session hands back the edited record.
        let two = s.get("Book", &json!(2)).await.unwrap();
        let read = s.resolve(two, path.segments(), None).await.unwrap();
        assert_eq!(s.to_json(&read), json!({"name": "Anne"}));

        let bad = AttributePath::from_names(["author"]).with_fields(["name", "born"]);
        let err = s
            .resolve(one, bad.segments(), Some(&Assign::Value(json!(1900))))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Invocation(_)));
    }

    #[tokio::test]
    async fn broken_intermediate_segments_are_invocation_errors() {
        let mut s = session().await;
        let orphan = s.get("Book", &json!(3)).await.unwrap();
        for key in ["author.name", "title.length", "publisher.name"] {
            let path = AttributePath::parse(key);
            let err = s.resolve(orphan, path.segments(), None).await.unwrap_err();
            assert!(matches!(err, AppError::Invocation(_)), "{}: {:?}", key, err);
        }
    }

    #[tokio::test]
    async fn writing_through_an_association() {
        let mut s = session().await;
        let book = s.get("Book", &json!(1)).await.unwrap();
        let path = AttributePath::parse("author.name");
        s.resolve(book, path.segments(), Some(&Assign::Value(json!("Anna"))))
            .await
            .unwrap();
        s.invoke(book, path.prefix().segments(), Method::Save).await.unwrap();

        let mut fresh = s.fresh();
        let ann = fresh.get("Author", &json!(1)).await.unwrap();
        assert_eq!(fresh.record(ann).get("name"), Some(&json!("Anna")));
    }

    #[tokio::test]
    async fn clone_then_assign_replaces_the_association() {
        let mut s = session().await;
        let book = s.get("Book", &json!(2)).await.unwrap();
        let author = AttributePath::parse("author");
        let copy = s.invoke(book, author.segments(), Method::Clone).await.unwrap();
        let Resolved::Record(Some(copy_key)) = copy else {
            panic!("expected a single clone");
        };
        assert!(s.is_new(copy_key));
        s.resolve(book, author.segments(), Some(&Assign::Record(Some(copy_key))))
            .await
            .unwrap();
        s.save(book).await.unwrap();
        assert_eq!(s.record(book).get("author_id"), Some(&json!(2)));
    }
}

use super::{require_data, with_includes, ExtApi};
use crate::error::AppError;
use crate::options::{filter, OperationKind, Options};
use crate::path::{Assign, AttributePath, Method, Resolved};
use crate::record::{id_to_string, Attributes};
use crate::response::Envelope;
use crate::session::Session;
use crate::store::option_names;
use serde_json::Value;

/// What to do with the secondary record behind a dotted key such as `author.name`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OnEdit {
    /// Edit the associated record in place.
    #[default]
    InPlace,
    /// Reuse a record whose attribute already has the new value, else a copy of the current one.
    FindOrCreate,
    /// Always associate a copy of the current record.
    ForceCreate,
}

impl OnEdit {
    fn from_option(v: Option<&Value>) -> Self {
        match v.and_then(Value::as_str) {
            Some("find_or_create") => OnEdit::FindOrCreate,
            Some("force_create") => OnEdit::ForceCreate,
            _ => OnEdit::InPlace,
        }
    }
}

impl ExtApi {
    /// Update one record (`data` object) or several (`data` list). In a list the first failure
    /// aborts the call; a single record failure is reported in the envelope.
    pub async fn update(&self, opts: Options) -> Result<Envelope, AppError> {
        require_data(&opts)?;
        let opts = filter(OperationKind::Update, opts);
        let on_edit = OnEdit::from_option(opts.get("on_edit"));
        let include = option_names(&opts, "include")?.unwrap_or_default();
        let data = opts.get("data").cloned().unwrap_or(Value::Null);

        let is_empty = |v: &Value| v.as_object().is_some_and(|m| m.is_empty());
        let empty = match &data {
            Value::Array(items) => items.iter().any(is_empty),
            other => is_empty(other),
        };
        if empty {
            return Err(AppError::Validation("Record is empty".into()));
        }

        let mut session = self.session();
        let mut envelope = Envelope::new();
        let mut updated = Vec::new();
        match &data {
            Value::Array(records) => {
                for record in records {
                    match self.update_record(&mut session, record, on_edit, &include).await {
                        Ok(attrs) => {
                            updated.push(record_id(record));
                            envelope.add_data(Value::Object(attrs));
                        }
                        Err(e) => {
                            tracing::warn!(model = %self.model, id = %record_id(record), error = %e, "update failed, aborting batch");
                            return Err(e);
                        }
                    }
                }
            }
            record => match self.update_record(&mut session, record, on_edit, &include).await {
                Ok(attrs) => {
                    updated.push(record_id(record));
                    envelope.add_data(Value::Object(attrs));
                }
                Err(e) => {
                    tracing::warn!(model = %self.model, id = %record_id(record), error = %e, "update failed");
                    envelope.add_message(format!(
                        "Warning : Could not update record with id {}. {}",
                        record_id(record),
                        e
                    ));
                }
            },
        }

        if updated.is_empty() {
            envelope.add_message("No record updated.");
            envelope.success = false;
        } else {
            envelope.add_message(format!(
                "Successfully updated {} records with id : {}",
                updated.len(),
                updated.join(", ")
            ));
        }
        Ok(envelope)
    }

    async fn update_record(
        &self,
        session: &mut Session,
        record: &Value,
        on_edit: OnEdit,
        include: &[String],
    ) -> Result<Attributes, AppError> {
        let fields = record
            .as_object()
            .ok_or_else(|| AppError::Validation("a record must be an object".into()))?;
        let model = self.model()?;
        let id = fields
            .get("id")
            .filter(|v| !v.is_null())
            .ok_or_else(|| AppError::NotFound(format!("Couldn't find {} without an ID", model.name)))?;
        let key = session.get(&model.name, id).await?;

        let keys = fields
            .keys()
            .filter(|name| *name != "id" && **name != model.pk)
            .map(String::as_str);
        let secondary = secondary_paths(keys);
        for (name, value) in fields {
            if name == "id" || *name == model.pk {
                continue;
            }
            let path = AttributePath::parse(name);
            if path.len() > 1 {
                let prefix = path.prefix();
                let replacement = match on_edit {
                    OnEdit::InPlace => None,
                    OnEdit::FindOrCreate => {
                        let target = self.schema.follow(model, &prefix.names())?;
                        let column = path.last_name().unwrap_or_default();
                        match session.find_first_by(&target.name, column, value.clone()).await? {
                            Some(found) => Some(Resolved::Record(Some(found))),
                            None => Some(session.invoke(key, prefix.segments(), Method::Clone).await?),
                        }
                    }
                    OnEdit::ForceCreate => Some(session.invoke(key, prefix.segments(), Method::Clone).await?),
                };
                if let Some(replacement) = replacement {
                    let assign: Option<Assign> = replacement.into();
                    let assign = assign.ok_or_else(|| {
                        AppError::Invocation(format!("cannot replace '{}' across a collection", prefix))
                    })?;
                    session.resolve(key, prefix.segments(), Some(&assign)).await?;
                }
            }
            session
                .resolve(key, path.segments(), Some(&Assign::Value(value.clone())))
                .await?;
        }

        session.save(key).await?;
        for prefix in &secondary {
            session.invoke(key, prefix.segments(), Method::Save).await?;
        }
        with_includes(session, key, include).await
    }
}

fn record_id(record: &Value) -> String {
    record.get("id").map(id_to_string).unwrap_or_default()
}

/// Distinct association prefixes of dotted keys, in the order they first appear.
fn secondary_paths<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<AttributePath> {
    let mut out: Vec<AttributePath> = Vec::new();
    for key in keys {
        let path = AttributePath::parse(key);
        if path.len() > 1 {
            let prefix = path.prefix();
            if !out.contains(&prefix) {
                out.push(prefix);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secondary_paths_keep_first_seen_order() {
        let keys = [
            "parent_book.title",
            "title",
            "author.name",
            "parent_book.pages",
            "parent_book.author.name",
            "author.name",
        ];
        let paths: Vec<String> = secondary_paths(keys.into_iter())
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(paths, vec!["parent_book", "author", "parent_book.author"]);
    }

    #[test]
    fn on_edit_defaults_to_in_place() {
        assert_eq!(OnEdit::from_option(None), OnEdit::InPlace);
        assert_eq!(OnEdit::from_option(Some(&Value::from("force_create"))), OnEdit::ForceCreate);
        assert_eq!(OnEdit::from_option(Some(&Value::from("find_or_create"))), OnEdit::FindOrCreate);
        assert_eq!(OnEdit::from_option(Some(&Value::from("replace"))), OnEdit::InPlace);
    }
}

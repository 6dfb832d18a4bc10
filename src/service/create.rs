use super::{require_data, ExtApi};
use crate::error::AppError;
use crate::options::{filter, OperationKind, Options};
use crate::path::{Assign, Segment};
use crate::record::{id_to_string, Attributes};
use crate::response::Envelope;
use crate::session::Session;
use serde_json::Value;

impl ExtApi {
    /// Create one record (`data` object) or several (`data` list). A record that fails is
    /// reported and skipped.
    pub async fn create(&self, opts: Options) -> Result<Envelope, AppError> {
        require_data(&opts)?;
        let mut opts = filter(OperationKind::Create, opts);
        let records = match opts.remove("data") {
            Some(Value::Array(items)) => items,
            Some(item) => vec![item],
            None => Vec::new(),
        };

        let mut session = self.session();
        let mut envelope = Envelope::new();
        let mut created = Vec::new();
        for record in &records {
            match self.create_record(&mut session, record).await {
                Ok((id, attrs)) => {
                    created.push(id);
                    envelope.add_data(Value::Object(attrs));
                }
                Err(e) => {
                    tracing::warn!(model = %self.model, error = %e, "create failed");
                    envelope.add_message(format!("Warning : Could not create record {}. {}", record, e));
                }
            }
        }

        if created.is_empty() {
            envelope.add_message("No record created.");
            envelope.success = false;
        } else {
            envelope.add_message(format!(
                "Successfully created {} records with id : {}",
                created.len(),
                created.join(", ")
            ));
        }
        Ok(envelope)
    }

    async fn create_record(&self, session: &mut Session, record: &Value) -> Result<(String, Attributes), AppError> {
        let fields = record
            .as_object()
            .ok_or_else(|| AppError::Validation("a record must be an object".into()))?;
        let model = self.model()?;
        let key = session.build(&model.name)?;
        for (name, value) in fields {
            // Ids come from the store, never the client.
            if name == "id" || *name == model.pk {
                continue;
            }
            let segment = [Segment::Name(name.clone())];
            session
                .resolve(key, &segment, Some(&Assign::Value(value.clone())))
                .await?;
        }
        session.save(key).await?;
        let id = session.id(key).map(|v| id_to_string(&v)).unwrap_or_default();
        Ok((id, session.attributes(key)))
    }
}

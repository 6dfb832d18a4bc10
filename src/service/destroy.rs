use super::{require_data, ExtApi};
use crate::error::AppError;
use crate::options::{filter, OperationKind, Options};
use crate::record::id_to_string;
use crate::response::Envelope;
use serde_json::Value;

impl ExtApi {
    /// Delete one id (`data` scalar) or several (`data` list). Ids that delete nothing are
    /// reported and skipped.
    pub async fn destroy(&self, opts: Options) -> Result<Envelope, AppError> {
        require_data(&opts)?;
        let mut opts = filter(OperationKind::Destroy, opts);
        let ids = match opts.remove("data") {
            Some(Value::Array(ids)) => ids,
            Some(id) => vec![id],
            None => Vec::new(),
        };
        let model = self.model()?;

        let mut envelope = Envelope::new();
        let mut deleted = Vec::new();
        for id in &ids {
            let outcome = match self.store.delete(model, id).await {
                Ok(0) => Err("record not found".to_string()),
                Ok(_) => Ok(()),
                Err(e) => Err(e.to_string()),
            };
            match outcome {
                Ok(()) => deleted.push(id_to_string(id)),
                Err(reason) => {
                    tracing::warn!(model = %model.name, id = %id, reason = %reason, "destroy failed");
                    envelope.add_message(format!(
                        "Warning : Could not destroy record with id {} : {}",
                        id_to_string(id),
                        reason
                    ));
                }
            }
        }

        if deleted.is_empty() {
            envelope.add_message("No record deleted.");
            envelope.success = false;
        } else {
            envelope.add_message(format!(
                "Successfully deleted {} records with id : {}",
                deleted.len(),
                deleted.join(", ")
            ));
        }
        Ok(envelope)
    }
}

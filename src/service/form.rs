use super::{with_includes, ExtApi};
use crate::error::AppError;
use crate::options::{filter, OperationKind, Options};
use crate::record::Attributes;
use crate::response::Envelope;
use crate::store::option_names;
use serde_json::Value;

impl ExtApi {
    /// Load one record into a form. Failures never escape: they come back as
    /// `success: false` with an `errorMessage`.
    pub async fn form_load(&self, id: Value, opts: Options) -> Envelope {
        let mut envelope = Envelope::new();
        match self.load_record(&id, opts).await {
            Ok(attrs) => envelope.add_data(Value::Object(attrs)),
            Err(e) => {
                tracing::warn!(model = %self.model, id = %id, error = %e, "form load failed");
                envelope.success = false;
                envelope.add("errorMessage", e.to_string());
            }
        }
        envelope
    }

    /// Saving through a form submit is not supported; the client always gets
    /// `success: false` with `errorMessage: "Not Implemented"`.
    pub fn form_submit(&self, _opts: Options) -> Envelope {
        tracing::warn!(model = %self.model, "form submit is not implemented");
        let mut envelope = Envelope::new();
        envelope.success = false;
        envelope.add("errorMessage", "Not Implemented");
        envelope
    }

    async fn load_record(&self, id: &Value, opts: Options) -> Result<Attributes, AppError> {
        if id.is_null() || id.as_str().is_some_and(str::is_empty) {
            return Err(AppError::Validation("An ID is required !".into()));
        }
        let opts = filter(OperationKind::FormLoad, opts);
        let include = option_names(&opts, "include")?.unwrap_or_default();
        let mut session = self.session();
        let key = session.get(&self.model, id).await?;
        with_includes(&mut session, key, &include).await
    }
}

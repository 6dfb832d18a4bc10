use super::{with_includes, ExtApi};
use crate::error::AppError;
use crate::options::{filter, OperationKind, Options};
use crate::response::Envelope;
use crate::sort;
use crate::store::Query;
use serde_json::Value;

impl ExtApi {
    /// Paginated, filtered, sorted list. `total` counts every matching row when a `limit` is
    /// given, otherwise the rows returned.
    pub async fn read(&self, opts: Options) -> Result<Envelope, AppError> {
        let mut opts = sort::translate(filter(OperationKind::Read, opts))?;
        let paginated = opts.get("limit").is_some_and(|v| !v.is_null());
        match opts.remove("start") {
            Some(start) if paginated => {
                opts.insert("offset".into(), start);
            }
            _ => {}
        }
        let query = Query::from_options(&opts)?;
        let model = self.model()?;
        tracing::debug!(model = %model.name, query = ?query, "read");

        let mut session = self.session();
        let total = if paginated {
            Some(session.count(&model.name, &query.without_pagination()).await?)
        } else {
            None
        };

        let mut envelope = Envelope::new();
        for key in session.find_all(&model.name, &query).await? {
            let attrs = with_includes(&mut session, key, &query.include).await?;
            envelope.add_data(Value::Object(attrs));
        }
        let total = total.unwrap_or(envelope.data.len() as u64);
        envelope.add("total", total);
        Ok(envelope)
    }
}

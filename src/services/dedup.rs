use crate::domain::{
    error::PipelineError,
    id::EventId,
    store::Store,
    webhook::NewWebhookLog,
};

/// Answers "has this exact event been fully processed?" and keeps the
/// forensic trail. An optimization over redelivery, not the only guard:
/// concurrent deliveries may both pass `is_processed`, and the reconciler's
/// upserts absorb that.
pub struct EventDeduplicator<'a> {
    store: &'a dyn Store,
}

impl<'a> EventDeduplicator<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// A receipt with `processed = false` does not block: the earlier attempt
    /// may have crashed before finishing.
    pub async fn is_processed(&self, event_id: &EventId) -> Result<bool, PipelineError> {
        self.store.is_event_processed(event_id).await
    }

    pub async fn log_received(&self, entry: &NewWebhookLog) -> Result<(), PipelineError> {
        self.store.log_webhook_event(entry).await
    }

    /// Records a failed attempt on the receipt. Best-effort: the caller is
    /// already on an error path.
    pub async fn log_failure(&self, entry: &NewWebhookLog, error: &str) {
        let mut failed = entry.clone();
        failed.processed = false;
        failed.error_message = Some(error.to_string());
        if let Err(e) = self.store.log_webhook_event(&failed).await {
            tracing::error!(event_id = %entry.event_id, error = %e, "failed to record webhook failure");
        }
    }

    /// Best-effort: a failure here leaves the applied effect in place and the
    /// event eligible for a harmless redelivery.
    pub async fn mark_processed(&self, event_id: &EventId) -> bool {
        match self.store.mark_event_processed(event_id).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(event_id = %event_id, "no ledger entry to mark processed");
                false
            }
            Err(e) => {
                tracing::error!(event_id = %event_id, error = %e, "failed to mark event processed");
                false
            }
        }
    }
}

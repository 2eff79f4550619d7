use crate::domain::{
    error::PipelineError,
    id::EventId,
    order::WebhookEvent,
    store::Store,
};

/// Appends notification receipts to an order's audit trail. Runs after the
/// primary effect is decided; callers treat its failures as secondary.
pub struct EventRecorder<'a> {
    store: &'a dyn Store,
}

impl<'a> EventRecorder<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Read-modify-write over the whole array. Returns `false` without
    /// writing when the order is missing or already lists this event id.
    pub async fn record(
        &self,
        shopify_order_id: i64,
        topic: &str,
        event_id: &EventId,
    ) -> Result<bool, PipelineError> {
        let Some(order) = self.store.find_order_by_order_id(shopify_order_id).await? else {
            tracing::warn!(shopify_order_id, "order not found, audit entry not recorded");
            return Ok(false);
        };
        if order.has_event(event_id.as_str()) {
            return Ok(false);
        }

        let mut events = order.webhook_events;
        events.push(WebhookEvent::received(topic, event_id));
        self.store.set_webhook_events(shopify_order_id, &events).await
    }
}

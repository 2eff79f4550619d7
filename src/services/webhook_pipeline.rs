//! Orchestrates one inbound notification end to end:
//! verify → dedup check → parse → log receipt → effects → mark processed.

use {
    super::{
        dedup::EventDeduplicator,
        effects::Effects,
        reconciler::OrderReconciler,
        recorder::EventRecorder,
        resolver::{Derivation, IdentityResolver, Resolution, extract_listing_id, extract_purchaser},
        signature::{SignatureCheck, check_signature},
        tracking::{FULFILLMENT_SUCCESS, FulfillmentTracker, tracking_record},
    },
    crate::domain::{
        error::PipelineError,
        money::MoneyAmount,
        order::{NewOrder, Order, OrderStatus, StatusUpdate, StatusUpdateOutcome},
        provider::FulfillmentLookup,
        store::Store,
        webhook::{
            FulfillmentPayload, NewWebhookLog, Notification, OrderPayload, ProcessResult,
            SkipReason, WebhookHeaders,
        },
    },
};

/// Top-level entry: the adapter hands over parsed headers and the raw body.
pub async fn process_webhook(
    store: &dyn Store,
    lookup: &dyn FulfillmentLookup,
    secret: Option<&str>,
    headers: &WebhookHeaders,
    body: &str,
) -> Result<ProcessResult, PipelineError> {
    // Nothing is written before this line.
    let check = check_signature(body.as_bytes(), &headers.hmac_sha256, secret)?;
    if check == SignatureCheck::Skipped {
        tracing::warn!(unverified = true, "processing unverified webhook");
    }

    let dedup = EventDeduplicator::new(store);
    if dedup.is_processed(&headers.event_id).await? {
        tracing::info!("event already processed, skipping");
        return Ok(ProcessResult::Duplicate);
    }

    let raw: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| PipelineError::Validation(format!("body is not valid JSON: {e}")))?;
    let parsed = Notification::parse(&headers.topic, body);

    let receipt = NewWebhookLog {
        event_id: headers.event_id.clone(),
        topic: headers.topic.to_string(),
        webhook_id: headers.webhook_id.clone(),
        shop_domain: headers.shop_domain.clone(),
        shopify_order_id: parsed.as_ref().ok().and_then(Notification::order_id),
        payload: raw,
        processed: false,
        error_message: None,
    };
    dedup.log_received(&receipt).await?;

    let notification = match parsed {
        Ok(n) => n,
        Err(e) => {
            dedup.log_failure(&receipt, &e.to_string()).await;
            return Err(e);
        }
    };

    let pipeline = Pipeline::new(store, lookup, headers, &receipt.payload);
    match pipeline.apply(notification).await {
        Ok(result) => {
            dedup.mark_processed(&headers.event_id).await;
            tracing::info!(outcome = %result.message(), "webhook processed");
            Ok(result)
        }
        Err(e) => {
            tracing::error!(error = %e, "webhook processing failed");
            dedup.log_failure(&receipt, &e.to_string()).await;
            Err(e)
        }
    }
}

struct Pipeline<'a> {
    headers: &'a WebhookHeaders,
    raw: &'a serde_json::Value,
    resolver: IdentityResolver<'a>,
    reconciler: OrderReconciler<'a>,
    tracker: FulfillmentTracker<'a>,
    recorder: EventRecorder<'a>,
}

impl<'a> Pipeline<'a> {
    fn new(
        store: &'a dyn Store,
        lookup: &'a dyn FulfillmentLookup,
        headers: &'a WebhookHeaders,
        raw: &'a serde_json::Value,
    ) -> Self {
        Self {
            headers,
            raw,
            resolver: IdentityResolver::new(store, lookup),
            reconciler: OrderReconciler::new(store),
            tracker: FulfillmentTracker::new(store),
            recorder: EventRecorder::new(store),
        }
    }

    async fn apply(&self, notification: Notification) -> Result<ProcessResult, PipelineError> {
        match notification {
            Notification::OrderCreated(order) => self.on_order_created(&order).await,
            Notification::OrderPaid(order) => self.on_order_progress(&order, OrderStatus::Paid).await,
            Notification::OrderFulfilled(order) => {
                self.on_order_progress(&order, OrderStatus::Fulfilled).await
            }
            Notification::OrderUpdated(order) => self.on_order_updated(&order).await,
            Notification::OrderCancelled(order) => self.on_order_cancelled(&order).await,
            Notification::FulfillmentCreated(f) => self.on_fulfillment(&f, false).await,
            Notification::FulfillmentUpdated(f) => self.on_fulfillment(&f, true).await,
            Notification::Unsupported(topic) => {
                tracing::info!(topic = %topic, "unsupported topic acknowledged");
                Ok(ProcessResult::Skipped(SkipReason::UnsupportedTopic(topic)))
            }
        }
    }

    async fn record_receipt(&self, shopify_order_id: i64, effects: &mut Effects) {
        let recorded = self
            .recorder
            .record(shopify_order_id, self.headers.topic.as_str(), &self.headers.event_id)
            .await;
        effects.secondary("audit_append", recorded);
    }

    /// Paid-type side effect. Attempted whatever happened to the order write.
    async fn sell_listing(&self, order: &OrderPayload, stored: Option<&Order>, effects: &mut Effects) {
        let Some(listing_id) =
            extract_listing_id(order).or_else(|| stored.and_then(|o| o.listing_id.clone()))
        else {
            return;
        };
        let email = order
            .email
            .clone()
            .or_else(|| order.customer.as_ref().and_then(|c| c.email.clone()));
        let sold = self
            .reconciler
            .mark_listing_sold(&listing_id, email, &extract_purchaser(order))
            .await;
        effects.secondary("listing_sold", sold);
    }

    async fn derive(&self, order: &OrderPayload, status: OrderStatus) -> Result<Derivation, PipelineError> {
        self.resolver
            .derive_new_order(order, self.raw, &self.headers.topic, &self.headers.event_id, status)
            .await
    }

    /// Upsert of a derived record, plus the product link cancellations use.
    async fn create_order(&self, new_order: &NewOrder, order: &OrderPayload, effects: &mut Effects) {
        let upserted = self.reconciler.upsert_order(new_order, effects).await;
        effects.primary("order_upsert", upserted);

        let product_id = order.line_items.iter().find_map(|item| item.product_id);
        if let (Some(listing_id), Some(product_id)) = (&new_order.listing_id, product_id) {
            let linked = self
                .reconciler
                .link_listing_product(listing_id, &product_id.to_string())
                .await;
            effects.secondary("listing_product_link", linked);
        }
    }

    async fn on_order_created(&self, order: &OrderPayload) -> Result<ProcessResult, PipelineError> {
        let status = order.derived_status();
        let mut effects = Effects::new();
        let derived = self.derive(order, status).await;
        if matches!(status, OrderStatus::Paid | OrderStatus::Fulfilled) {
            self.sell_listing(order, None, &mut effects).await;
        }
        let new_order = match derived? {
            Derivation::Derived(new_order) => new_order,
            Derivation::Unlinked(reason) => return Err(PipelineError::Validation(reason)),
        };
        self.create_order(&new_order, order, &mut effects).await;
        self.record_receipt(order.id, &mut effects).await;
        effects.finish(ProcessResult::Applied {
            shopify_order_id: order.id,
            message: "order created",
        })
    }

    /// `orders/paid` and `orders/fulfilled`: guarded status update on a known
    /// order, otherwise creation when the payload carries the linkage.
    async fn on_order_progress(
        &self,
        order: &OrderPayload,
        status: OrderStatus,
    ) -> Result<ProcessResult, PipelineError> {
        let mut effects = Effects::new();
        let stored = match self.resolver.resolve_order(order).await? {
            Resolution::Found { order, .. } => Some(order),
            Resolution::NotOurs => None,
        };

        let mut result = None;
        if let Some(existing) = &stored {
            let update = StatusUpdate {
                financial_status: order.financial_status.clone(),
                fulfillment_status: order.fulfillment_status.clone(),
                ..StatusUpdate::new(existing.shopify_order_id, status)
            };
            let outcome = self.reconciler.update_order_status(&update).await;
            match effects.primary("status_update", outcome) {
                Some(StatusUpdateOutcome::Rejected { current }) => {
                    result = Some(ProcessResult::Skipped(SkipReason::StaleStatus {
                        current,
                        incoming: status,
                    }));
                }
                Some(StatusUpdateOutcome::NoMatchingRow) => {}
                _ => {
                    result = Some(ProcessResult::Applied {
                        shopify_order_id: existing.shopify_order_id,
                        message: "order status updated",
                    });
                }
            }
        }

        let creating = result.is_none();
        if status == OrderStatus::Paid || creating {
            self.sell_listing(order, stored.as_ref(), &mut effects).await;
        }
        if creating {
            match self.derive(order, status).await? {
                Derivation::Derived(new_order) => {
                    self.create_order(&new_order, order, &mut effects).await;
                    result = Some(ProcessResult::Applied {
                        shopify_order_id: order.id,
                        message: "order created",
                    });
                }
                Derivation::Unlinked(reason) => {
                    tracing::info!(
                        shopify_order_id = order.id,
                        reason = %reason,
                        "unknown order without marketplace linkage, skipping"
                    );
                    return Ok(ProcessResult::Skipped(SkipReason::NotOurs));
                }
            }
        }

        let shopify_order_id = stored.as_ref().map_or(order.id, |o| o.shopify_order_id);
        self.record_receipt(shopify_order_id, &mut effects).await;

        effects.finish(result.unwrap_or(ProcessResult::Skipped(SkipReason::NotOurs)))
    }

    /// Refreshes the mutable order fields and applies the derived status
    /// through the guard. A held-back status still writes the other fields.
    async fn on_order_updated(&self, order: &OrderPayload) -> Result<ProcessResult, PipelineError> {
        let Resolution::Found { order: stored, .. } = self.resolver.resolve_order(order).await?
        else {
            tracing::info!(shopify_order_id = order.id, "update for untracked order, skipping");
            return Ok(ProcessResult::Skipped(SkipReason::NotOurs));
        };

        let total_price = order
            .total_price
            .as_deref()
            .map(MoneyAmount::parse_decimal)
            .transpose()?;
        let status = order.derived_status();
        let mut effects = Effects::new();
        let update = StatusUpdate {
            financial_status: order.financial_status.clone(),
            fulfillment_status: order.fulfillment_status.clone(),
            total_price,
            customer_email: order
                .email
                .clone()
                .or_else(|| order.customer.as_ref().and_then(|c| c.email.clone())),
            ..StatusUpdate::new(stored.shopify_order_id, status)
        };
        let outcome = self.reconciler.update_order_status(&update).await;
        let result = match effects.primary("status_update", outcome) {
            Some(StatusUpdateOutcome::Rejected { current }) => {
                ProcessResult::Skipped(SkipReason::StaleStatus { current, incoming: status })
            }
            _ => ProcessResult::Applied {
                shopify_order_id: stored.shopify_order_id,
                message: "order status updated",
            },
        };
        self.record_receipt(stored.shopify_order_id, &mut effects).await;
        effects.finish(result)
    }

    async fn on_order_cancelled(&self, order: &OrderPayload) -> Result<ProcessResult, PipelineError> {
        let Resolution::Found { order: stored, .. } = self.resolver.resolve_order(order).await?
        else {
            tracing::info!(shopify_order_id = order.id, "cancellation for untracked order, skipping");
            return Ok(ProcessResult::Skipped(SkipReason::NotOurs));
        };

        let mut effects = Effects::new();
        let update = StatusUpdate {
            financial_status: order.financial_status.clone(),
            fulfillment_status: order.fulfillment_status.clone(),
            ..StatusUpdate::new(stored.shopify_order_id, OrderStatus::Cancelled)
        };
        let outcome = self.reconciler.update_order_status(&update).await;
        let result = match effects.primary("status_update", outcome) {
            Some(StatusUpdateOutcome::Rejected { current }) => ProcessResult::Skipped(
                SkipReason::StaleStatus { current, incoming: OrderStatus::Cancelled },
            ),
            _ => {
                let restored = self
                    .reconciler
                    .restore_listings(order, Some(&stored), &mut effects)
                    .await;
                tracing::info!(shopify_order_id = stored.shopify_order_id, restored, "order cancelled");
                ProcessResult::Applied {
                    shopify_order_id: stored.shopify_order_id,
                    message: "order cancelled",
                }
            }
        };
        self.record_receipt(stored.shopify_order_id, &mut effects).await;
        effects.finish(result)
    }

    async fn on_fulfillment(
        &self,
        fulfillment: &FulfillmentPayload,
        is_update: bool,
    ) -> Result<ProcessResult, PipelineError> {
        let Resolution::Found { order, matched_by } =
            self.resolver.resolve_fulfillment(fulfillment).await?
        else {
            tracing::info!(
                fulfillment_id = fulfillment.id,
                order_id = ?fulfillment.order_id,
                "fulfillment for untracked order, skipping"
            );
            return Ok(ProcessResult::Skipped(SkipReason::NotOurs));
        };
        tracing::debug!(shopify_order_id = order.shopify_order_id, ?matched_by, "fulfillment resolved");

        let mut effects = Effects::new();
        let tracking = tracking_record(fulfillment, order.shopify_order_id, is_update);
        let upserted = self.tracker.upsert(&tracking).await;
        effects.primary("tracking_upsert", upserted);

        if !is_update && fulfillment.status.as_deref() == Some(FULFILLMENT_SUCCESS) {
            let update = StatusUpdate {
                fulfillment_status: Some("fulfilled".to_string()),
                ..StatusUpdate::new(order.shopify_order_id, OrderStatus::Fulfilled)
            };
            let outcome = self.reconciler.update_order_status(&update).await;
            effects.secondary("order_fulfilled", outcome);
        }
        self.record_receipt(order.shopify_order_id, &mut effects).await;

        effects.finish(ProcessResult::Applied {
            shopify_order_id: order.shopify_order_id,
            message: if is_update {
                "fulfillment tracking updated"
            } else {
                "fulfillment tracking created"
            },
        })
    }
}

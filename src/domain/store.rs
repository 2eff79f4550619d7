//! Backing-store seams. Each method is a single round-trip and is atomic per
//! row; no component holds in-process state between notifications.

use {
    super::error::PipelineError,
    super::fulfillment::{FulfillmentTracking, NewFulfillmentTracking},
    super::id::{EventId, ListingId},
    super::listing::{Listing, ListingSale},
    super::money::MoneyAmount,
    super::order::{NewOrder, Order, StatusUpdate, StatusUpdateOutcome, UpsertOutcome, WebhookEvent},
    super::webhook::{NewWebhookLog, WebhookLogEntry},
    chrono::{DateTime, Utc},
    std::{future::Future, pin::Pin},
    uuid::Uuid,
};

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PipelineError>> + Send + 'a>>;

pub trait WebhookLogRepo: Send + Sync {
    /// True only when an entry exists and is marked processed.
    fn is_event_processed<'a>(&'a self, event_id: &'a EventId) -> StoreFuture<'a, bool>;

    fn log_webhook_event<'a>(&'a self, entry: &'a NewWebhookLog) -> StoreFuture<'a, ()>;

    /// Returns `false` when no entry exists for the id.
    fn mark_event_processed<'a>(&'a self, event_id: &'a EventId) -> StoreFuture<'a, bool>;

    fn get_webhook_log<'a>(&'a self, event_id: &'a EventId)
    -> StoreFuture<'a, Option<WebhookLogEntry>>;
}

pub trait OrderRepo: Send + Sync {
    fn find_order_by_order_id(&self, shopify_order_id: i64) -> StoreFuture<'_, Option<Order>>;

    fn find_order_by_checkout_id<'a>(&'a self, checkout_id: &'a str)
    -> StoreFuture<'a, Option<Order>>;

    /// Insert-or-update keyed on `shopify_order_id`. On conflict the stored
    /// status only moves forward, claim fields and the audit array are kept,
    /// and a placeholder purchaser is replaced by a known one.
    fn upsert_order<'a>(&'a self, order: &'a NewOrder) -> StoreFuture<'a, UpsertOutcome>;

    fn update_order_status<'a>(&'a self, update: &'a StatusUpdate)
    -> StoreFuture<'a, StatusUpdateOutcome>;

    /// Overwrites the audit array. Returns `false` when the order does not exist.
    fn set_webhook_events<'a>(
        &'a self,
        shopify_order_id: i64,
        events: &'a [WebhookEvent],
    ) -> StoreFuture<'a, bool>;

    /// Sets claim fields iff the order is fulfilled, owned by `wallet`
    /// (case-insensitive) and unclaimed. Returns whether the row was claimed.
    fn claim_order<'a>(
        &'a self,
        shopify_order_id: i64,
        wallet: &'a str,
        claimed_at: DateTime<Utc>,
        amount: MoneyAmount,
    ) -> StoreFuture<'a, bool>;

    /// Orders where the wallet is purchaser or creator, newest first.
    fn orders_for_wallet<'a>(&'a self, wallet: &'a str) -> StoreFuture<'a, Vec<Order>>;
}

pub trait FulfillmentRepo: Send + Sync {
    fn upsert_fulfillment_tracking<'a>(
        &'a self,
        tracking: &'a NewFulfillmentTracking,
    ) -> StoreFuture<'a, Uuid>;

    fn tracking_for_order(&self, shopify_order_id: i64)
    -> StoreFuture<'_, Vec<FulfillmentTracking>>;
}

pub trait ListingRepo: Send + Sync {
    fn get_listing<'a>(&'a self, id: &'a ListingId) -> StoreFuture<'a, Option<Listing>>;

    fn find_listing_by_product_id<'a>(&'a self, product_id: &'a str)
    -> StoreFuture<'a, Option<Listing>>;

    /// Flips the listing to sold unless it already is. Returns whether a write happened.
    fn mark_listing_sold<'a>(&'a self, sale: &'a ListingSale) -> StoreFuture<'a, bool>;

    /// Back to available with purchase attribution cleared.
    fn restore_listing<'a>(&'a self, id: &'a ListingId) -> StoreFuture<'a, bool>;

    fn set_listing_product_id<'a>(
        &'a self,
        id: &'a ListingId,
        product_id: &'a str,
    ) -> StoreFuture<'a, bool>;

    /// Bumps order count and revenue, stamps `last_order_at`.
    fn record_listing_order<'a>(
        &'a self,
        id: &'a ListingId,
        amount: MoneyAmount,
        at: DateTime<Utc>,
    ) -> StoreFuture<'a, bool>;
}

/// The injected store handle every pipeline component works against.
pub trait Store: WebhookLogRepo + OrderRepo + FulfillmentRepo + ListingRepo {}

impl<T> Store for T where T: WebhookLogRepo + OrderRepo + FulfillmentRepo + ListingRepo {}

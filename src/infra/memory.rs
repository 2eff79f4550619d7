//! In-memory [`Store`](crate::domain::store::Store) for local runs without a
//! database and for tests. One lock guards all tables, so each call is
//! atomic the way a single Postgres statement is. Mirrors the Postgres
//! guards exactly. With the `test-util` feature, write faults can be
//! injected per table.

use {
    crate::domain::{
        error::PipelineError,
        fulfillment::{FulfillmentTracking, NewFulfillmentTracking},
        id::{EventId, ListingId},
        listing::{Listing, ListingSale, ListingStatus},
        money::MoneyAmount,
        order::{NewOrder, Order, StatusUpdate, StatusUpdateOutcome, UpsertOutcome, WebhookEvent},
        store::{FulfillmentRepo, ListingRepo, OrderRepo, StoreFuture, WebhookLogRepo},
        webhook::{NewWebhookLog, WebhookLogEntry},
    },
    chrono::{DateTime, Utc},
    std::collections::{HashMap, HashSet},
    tokio::sync::Mutex,
    uuid::Uuid,
};

#[derive(Default)]
struct Faults {
    order_writes: bool,
    audit_writes: bool,
    tracking_writes: bool,
    listing_writes: HashSet<ListingId>,
}

#[derive(Default)]
struct Tables {
    orders: HashMap<i64, Order>,
    tracking: HashMap<i64, FulfillmentTracking>,
    webhook_logs: HashMap<String, WebhookLogEntry>,
    listings: HashMap<ListingId, Listing>,
    listing_sold_writes: u64,
    faults: Faults,
}

impl Tables {
    fn check_listing_fault(&self, id: &ListingId) -> Result<(), PipelineError> {
        if self.faults.listing_writes.contains(id) {
            return Err(PipelineError::Store(format!("injected write failure for listing {id}")));
        }
        Ok(())
    }
}

fn injected(table: &str) -> PipelineError {
    PipelineError::Store(format!("injected write failure on {table}"))
}

/// Same rule as the SQL guard: non-terminal rows may keep or raise rank.
fn guard_allows(current: &Order, rank: i16) -> bool {
    !current.order_status.is_terminal() && rank >= current.order_status.rank()
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_listing(&self, listing: Listing) {
        self.tables
            .lock()
            .await
            .listings
            .insert(listing.id.clone(), listing);
    }

    /// Seeds an order row as-is, bypassing the upsert rules.
    pub async fn insert_order(&self, order: Order) {
        self.tables
            .lock()
            .await
            .orders
            .insert(order.shopify_order_id, order);
    }

    pub async fn orders(&self) -> Vec<Order> {
        let mut orders: Vec<_> = self.tables.lock().await.orders.values().cloned().collect();
        orders.sort_by_key(|o| o.shopify_order_id);
        orders
    }

    pub async fn webhook_log_count(&self) -> usize {
        self.tables.lock().await.webhook_logs.len()
    }

    pub async fn tracking_count(&self) -> usize {
        self.tables.lock().await.tracking.len()
    }

    /// Number of times a listing actually flipped to sold.
    pub async fn listing_sold_writes(&self) -> u64 {
        self.tables.lock().await.listing_sold_writes
    }

    #[cfg(any(test, feature = "test-util"))]
    pub async fn fail_order_writes(&self) {
        self.tables.lock().await.faults.order_writes = true;
    }

    #[cfg(any(test, feature = "test-util"))]
    pub async fn fail_audit_writes(&self) {
        self.tables.lock().await.faults.audit_writes = true;
    }

    #[cfg(any(test, feature = "test-util"))]
    pub async fn fail_tracking_writes(&self) {
        self.tables.lock().await.faults.tracking_writes = true;
    }

    #[cfg(any(test, feature = "test-util"))]
    pub async fn fail_listing_writes(&self, id: &ListingId) {
        self.tables.lock().await.faults.listing_writes.insert(id.clone());
    }
}

impl WebhookLogRepo for MemoryStore {
    fn is_event_processed<'a>(&'a self, event_id: &'a EventId) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let tables = self.tables.lock().await;
            Ok(tables
                .webhook_logs
                .get(event_id.as_str())
                .is_some_and(|e| e.processed))
        })
    }

    fn log_webhook_event<'a>(&'a self, entry: &'a NewWebhookLog) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut tables = self.tables.lock().await;
            match tables.webhook_logs.get_mut(entry.event_id.as_str()) {
                Some(existing) => {
                    if !existing.processed && entry.error_message.is_some() {
                        existing.error_message = entry.error_message.clone();
                    }
                }
                None => {
                    tables.webhook_logs.insert(
                        entry.event_id.as_str().to_string(),
                        WebhookLogEntry {
                            event_id: entry.event_id.as_str().to_string(),
                            topic: entry.topic.clone(),
                            webhook_id: entry.webhook_id.clone(),
                            shop_domain: entry.shop_domain.clone(),
                            shopify_order_id: entry.shopify_order_id,
                            payload: entry.payload.clone(),
                            processed: entry.processed,
                            error_message: entry.error_message.clone(),
                            received_at: Utc::now(),
                        },
                    );
                }
            }
            Ok(())
        })
    }

    fn mark_event_processed<'a>(&'a self, event_id: &'a EventId) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut tables = self.tables.lock().await;
            Ok(match tables.webhook_logs.get_mut(event_id.as_str()) {
                Some(entry) => {
                    entry.processed = true;
                    true
                }
                None => false,
            })
        })
    }

    fn get_webhook_log<'a>(
        &'a self,
        event_id: &'a EventId,
    ) -> StoreFuture<'a, Option<WebhookLogEntry>> {
        Box::pin(async move {
            Ok(self
                .tables
                .lock()
                .await
                .webhook_logs
                .get(event_id.as_str())
                .cloned())
        })
    }
}

impl OrderRepo for MemoryStore {
    fn find_order_by_order_id(&self, shopify_order_id: i64) -> StoreFuture<'_, Option<Order>> {
        Box::pin(async move { Ok(self.tables.lock().await.orders.get(&shopify_order_id).cloned()) })
    }

    fn find_order_by_checkout_id<'a>(
        &'a self,
        checkout_id: &'a str,
    ) -> StoreFuture<'a, Option<Order>> {
        Box::pin(async move {
            let tables = self.tables.lock().await;
            Ok(tables
                .orders
                .values()
                .filter(|o| o.shopify_checkout_id.as_deref() == Some(checkout_id))
                .min_by_key(|o| o.created_at)
                .cloned())
        })
    }

    fn upsert_order<'a>(&'a self, order: &'a NewOrder) -> StoreFuture<'a, UpsertOutcome> {
        Box::pin(async move {
            let mut tables = self.tables.lock().await;
            if tables.faults.order_writes {
                return Err(injected("shopify_orders"));
            }
            let now = Utc::now();

            let Some(existing) = tables.orders.get_mut(&order.shopify_order_id) else {
                tables.orders.insert(
                    order.shopify_order_id,
                    Order {
                        id: order.id,
                        shopify_order_id: order.shopify_order_id,
                        shopify_checkout_id: order.shopify_checkout_id.clone(),
                        listing_id: order.listing_id.clone(),
                        purchaser_wallet_address: order.purchaser_wallet_address.clone(),
                        creator_wallet_address: order.creator_wallet_address.clone(),
                        order_status: order.order_status,
                        financial_status: order.financial_status.clone(),
                        fulfillment_status: order.fulfillment_status.clone(),
                        total_price: order.total_price,
                        currency: order.currency.clone(),
                        shopify_customer_id: order.shopify_customer_id,
                        shopify_customer_email: order.shopify_customer_email.clone(),
                        shipping_address: order.shipping_address.clone(),
                        line_items: order.line_items.clone(),
                        webhook_events: order.webhook_events.clone(),
                        claimed_at: None,
                        claim_amount: None,
                        created_at: now,
                        updated_at: now,
                    },
                );
                return Ok(UpsertOutcome {
                    id: order.id,
                    inserted: true,
                });
            };

            if order.shopify_checkout_id.is_some() {
                existing.shopify_checkout_id = order.shopify_checkout_id.clone();
            }
            if existing.listing_id.is_none() {
                existing.listing_id = order.listing_id.clone();
            }
            if existing.purchaser_wallet_address.is_unknown() {
                existing.purchaser_wallet_address = order.purchaser_wallet_address.clone();
            }
            if existing.creator_wallet_address.is_unknown() {
                existing.creator_wallet_address = order.creator_wallet_address.clone();
            }
            if guard_allows(existing, order.order_status.rank()) {
                existing.order_status = order.order_status;
                if order.financial_status.is_some() {
                    existing.financial_status = order.financial_status.clone();
                }
                if order.fulfillment_status.is_some() {
                    existing.fulfillment_status = order.fulfillment_status.clone();
                }
            }
            existing.total_price = order.total_price;
            existing.currency = order.currency.clone();
            if order.shopify_customer_id.is_some() {
                existing.shopify_customer_id = order.shopify_customer_id;
            }
            if order.shopify_customer_email.is_some() {
                existing.shopify_customer_email = order.shopify_customer_email.clone();
            }
            if order.shipping_address.is_some() {
                existing.shipping_address = order.shipping_address.clone();
            }
            existing.line_items = order.line_items.clone();
            existing.updated_at = now;

            Ok(UpsertOutcome {
                id: existing.id,
                inserted: false,
            })
        })
    }

    fn update_order_status<'a>(
        &'a self,
        update: &'a StatusUpdate,
    ) -> StoreFuture<'a, StatusUpdateOutcome> {
        Box::pin(async move {
            let mut tables = self.tables.lock().await;
            if tables.faults.order_writes {
                return Err(injected("shopify_orders"));
            }
            let Some(order) = tables.orders.get_mut(&update.shopify_order_id) else {
                return Ok(StatusUpdateOutcome::NoMatchingRow);
            };
            let applied = guard_allows(order, update.status.rank());
            if applied {
                order.order_status = update.status;
            }
            if update.financial_status.is_some() {
                order.financial_status = update.financial_status.clone();
            }
            if update.fulfillment_status.is_some() {
                order.fulfillment_status = update.fulfillment_status.clone();
            }
            if let Some(price) = update.total_price {
                order.total_price = price;
            }
            if update.customer_email.is_some() {
                order.shopify_customer_email = update.customer_email.clone();
            }
            order.updated_at = Utc::now();
            Ok(if applied || order.order_status == update.status {
                StatusUpdateOutcome::Updated
            } else {
                StatusUpdateOutcome::Rejected {
                    current: order.order_status,
                }
            })
        })
    }

    fn set_webhook_events<'a>(
        &'a self,
        shopify_order_id: i64,
        events: &'a [WebhookEvent],
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut tables = self.tables.lock().await;
            if tables.faults.audit_writes {
                return Err(injected("shopify_orders.webhook_events"));
            }
            Ok(match tables.orders.get_mut(&shopify_order_id) {
                Some(order) => {
                    order.webhook_events = events.to_vec();
                    order.updated_at = Utc::now();
                    true
                }
                None => false,
            })
        })
    }

    fn claim_order<'a>(
        &'a self,
        shopify_order_id: i64,
        wallet: &'a str,
        claimed_at: DateTime<Utc>,
        amount: MoneyAmount,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut tables = self.tables.lock().await;
            if tables.faults.order_writes {
                return Err(injected("shopify_orders"));
            }
            let Some(order) = tables.orders.get_mut(&shopify_order_id) else {
                return Ok(false);
            };
            if order.check_claim(wallet).is_err() {
                return Ok(false);
            }
            order.claimed_at = Some(claimed_at);
            order.claim_amount = Some(amount);
            order.updated_at = Utc::now();
            Ok(true)
        })
    }

    fn orders_for_wallet<'a>(&'a self, wallet: &'a str) -> StoreFuture<'a, Vec<Order>> {
        Box::pin(async move {
            let tables = self.tables.lock().await;
            let mut orders: Vec<Order> = tables
                .orders
                .values()
                .filter(|o| {
                    o.purchaser_wallet_address.matches(wallet)
                        || o.creator_wallet_address.matches(wallet)
                })
                .cloned()
                .collect();
            orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(orders)
        })
    }
}

impl FulfillmentRepo for MemoryStore {
    fn upsert_fulfillment_tracking<'a>(
        &'a self,
        tracking: &'a NewFulfillmentTracking,
    ) -> StoreFuture<'a, Uuid> {
        Box::pin(async move {
            let mut tables = self.tables.lock().await;
            if tables.faults.tracking_writes {
                return Err(injected("fulfillment_tracking"));
            }
            let now = Utc::now();

            let Some(existing) = tables.tracking.get_mut(&tracking.shopify_fulfillment_id) else {
                tables.tracking.insert(
                    tracking.shopify_fulfillment_id,
                    FulfillmentTracking {
                        id: tracking.id,
                        shopify_order_id: tracking.shopify_order_id,
                        shopify_fulfillment_id: tracking.shopify_fulfillment_id,
                        tracking_company: tracking.tracking_company.clone(),
                        tracking_number: tracking.tracking_number.clone(),
                        tracking_url: tracking.tracking_url.clone(),
                        shipment_status: tracking.shipment_status,
                        shipped_at: tracking.shipped_at,
                        delivered_at: tracking.delivered_at,
                        location_updates: tracking.location_updates.clone(),
                        created_at: now,
                        updated_at: now,
                    },
                );
                return Ok(tracking.id);
            };

            existing.shopify_order_id = tracking.shopify_order_id;
            if tracking.tracking_company.is_some() {
                existing.tracking_company = tracking.tracking_company.clone();
            }
            if tracking.tracking_number.is_some() {
                existing.tracking_number = tracking.tracking_number.clone();
            }
            if tracking.tracking_url.is_some() {
                existing.tracking_url = tracking.tracking_url.clone();
            }
            existing.shipment_status = tracking.shipment_status;
            existing.shipped_at = existing.shipped_at.or(tracking.shipped_at);
            if tracking.delivered_at.is_some() {
                existing.delivered_at = tracking.delivered_at;
            }
            for update in &tracking.location_updates {
                if !existing.location_updates.contains(update) {
                    existing.location_updates.push(update.clone());
                }
            }
            existing.updated_at = now;
            Ok(existing.id)
        })
    }

    fn tracking_for_order(
        &self,
        shopify_order_id: i64,
    ) -> StoreFuture<'_, Vec<FulfillmentTracking>> {
        Box::pin(async move {
            let tables = self.tables.lock().await;
            let mut rows: Vec<_> = tables
                .tracking
                .values()
                .filter(|t| t.shopify_order_id == shopify_order_id)
                .cloned()
                .collect();
            rows.sort_by_key(|t| t.created_at);
            Ok(rows)
        })
    }
}

impl ListingRepo for MemoryStore {
    fn get_listing<'a>(&'a self, id: &'a ListingId) -> StoreFuture<'a, Option<Listing>> {
        Box::pin(async move { Ok(self.tables.lock().await.listings.get(id).cloned()) })
    }

    fn find_listing_by_product_id<'a>(
        &'a self,
        product_id: &'a str,
    ) -> StoreFuture<'a, Option<Listing>> {
        Box::pin(async move {
            let tables = self.tables.lock().await;
            Ok(tables
                .listings
                .values()
                .find(|l| l.shopify_product_id.as_deref() == Some(product_id))
                .cloned())
        })
    }

    fn mark_listing_sold<'a>(&'a self, sale: &'a ListingSale) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut tables = self.tables.lock().await;
            tables.check_listing_fault(&sale.listing_id)?;
            let Some(listing) = tables.listings.get_mut(&sale.listing_id) else {
                return Ok(false);
            };
            if listing.status == ListingStatus::Sold {
                return Ok(false);
            }
            listing.status = ListingStatus::Sold;
            listing.purchased_at = Some(sale.purchased_at);
            listing.purchaser_email = sale.purchaser_email.clone();
            listing.purchaser_wallet_address = sale.purchaser_wallet_address.clone();
            tables.listing_sold_writes += 1;
            Ok(true)
        })
    }

    fn restore_listing<'a>(&'a self, id: &'a ListingId) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut tables = self.tables.lock().await;
            tables.check_listing_fault(id)?;
            let Some(listing) = tables.listings.get_mut(id) else {
                return Ok(false);
            };
            listing.status = ListingStatus::Available;
            listing.purchased_at = None;
            listing.purchaser_email = None;
            listing.purchaser_wallet_address = None;
            Ok(true)
        })
    }

    fn set_listing_product_id<'a>(
        &'a self,
        id: &'a ListingId,
        product_id: &'a str,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut tables = self.tables.lock().await;
            tables.check_listing_fault(id)?;
            Ok(match tables.listings.get_mut(id) {
                Some(listing) => {
                    listing.shopify_product_id = Some(product_id.to_string());
                    true
                }
                None => false,
            })
        })
    }

    fn record_listing_order<'a>(
        &'a self,
        id: &'a ListingId,
        amount: MoneyAmount,
        at: DateTime<Utc>,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut tables = self.tables.lock().await;
            tables.check_listing_fault(id)?;
            Ok(match tables.listings.get_mut(id) {
                Some(listing) => {
                    listing.total_orders += 1;
                    listing.total_revenue = listing.total_revenue.saturating_add(amount);
                    listing.last_order_at = Some(at);
                    true
                }
                None => false,
            })
        })
    }
}

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use order_sync::AppState;
use order_sync::adapters::routes::router;
use order_sync::domain::error::PipelineError;
use order_sync::domain::id::{ListingId, WalletAddress};
use order_sync::domain::listing::{Listing, ListingStatus};
use order_sync::domain::money::MoneyAmount;
use order_sync::domain::order::Order;
use order_sync::domain::provider::{
    FulfillmentDetails, FulfillmentInfo, FulfillmentLookup, FulfillmentOrderInfo,
    NoFulfillmentLookup,
};
use order_sync::domain::store::{ListingRepo, OrderRepo};
use order_sync::infra::memory::MemoryStore;
use order_sync::services::signature::compute_signature;
use serde_json::{Value, json};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;

pub const SECRET: &str = "shpss_test_secret";

/// Mixed-case on purpose: claims must match it case-insensitively.
pub const BUYER_WALLET: &str = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01";
pub const CREATOR_WALLET: &str = "0x1111111111111111111111111111111111111111";
pub const OTHER_WALLET: &str = "0x2222222222222222222222222222222222222222";

// ── App setup ──────────────────────────────────────────────────────────────

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub router: Router,
}

/// Router over a fresh in-memory store with signature verification on and
/// no provider lookup configured.
pub fn setup() -> TestApp {
    build(Some(SECRET), Arc::new(NoFulfillmentLookup))
}

pub fn setup_with_lookup(lookup: Arc<dyn FulfillmentLookup>) -> TestApp {
    build(Some(SECRET), lookup)
}

/// Degraded mode: no webhook secret configured.
pub fn setup_without_secret() -> TestApp {
    build(None, Arc::new(NoFulfillmentLookup))
}

fn build(secret: Option<&str>, lookup: Arc<dyn FulfillmentLookup>) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = AppState {
        store: store.clone(),
        fulfillment_lookup: lookup,
        webhook_secret: secret.map(Into::into),
    };
    TestApp {
        store,
        router: router(state),
    }
}

impl TestApp {
    /// Signed POST to the main ingress.
    pub async fn webhook(&self, topic: &str, event_id: &str, body: &Value) -> (StatusCode, Value) {
        let body = body.to_string();
        let signature = compute_signature(body.as_bytes(), SECRET).unwrap();
        self.send(webhook_request("/webhooks/shopify", topic, event_id, &signature, body))
            .await
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn order(&self, shopify_order_id: i64) -> Option<Order> {
        self.store.find_order_by_order_id(shopify_order_id).await.unwrap()
    }

    pub async fn listing(&self, id: &str) -> Listing {
        self.store
            .get_listing(&ListingId::new(id).unwrap())
            .await
            .unwrap()
            .expect("listing seeded")
    }

    pub async fn add_listing(&self, id: &str) {
        self.store.add_listing(listing(id, Some(CREATOR_WALLET))).await;
    }
}

pub fn webhook_request(
    uri: &str,
    topic: &str,
    event_id: &str,
    signature: &str,
    body: String,
) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .header("X-Shopify-Topic", topic)
        .header("X-Shopify-Hmac-SHA256", signature)
        .header("X-Shopify-Event-Id", event_id)
        .header("X-Shopify-Shop-Domain", "test-shop.myshopify.com")
        .header("X-Shopify-Webhook-Id", format!("wh-{event_id}"))
        .body(Body::from(body))
        .unwrap()
}

// ── Fixtures ───────────────────────────────────────────────────────────────

pub fn listing(id: &str, owner: Option<&str>) -> Listing {
    Listing {
        id: ListingId::new(id).unwrap(),
        title: format!("Artwork {id}"),
        description: None,
        price: Some(MoneyAmount::new(4999).unwrap()),
        image_url: None,
        owner_wallet_address: owner.map(WalletAddress::from_raw),
        status: ListingStatus::Available,
        purchased_at: None,
        purchaser_email: None,
        purchaser_wallet_address: None,
        shopify_product_id: None,
        total_orders: 0,
        total_revenue: MoneyAmount::ZERO,
        last_order_at: None,
    }
}

/// Order payload linked to `listing_id` through a note attribute.
pub fn order_json(id: i64, checkout_id: i64, listing_id: &str, financial_status: &str) -> Value {
    json!({
        "id": id,
        "checkout_id": checkout_id,
        "email": "buyer@example.com",
        "financial_status": financial_status,
        "fulfillment_status": null,
        "total_price": "49.99",
        "currency": "USD",
        "note_attributes": [
            {"name": "listing_id", "value": listing_id},
            {"name": "wallet_address", "value": BUYER_WALLET}
        ],
        "line_items": [
            {"id": 1, "product_id": 9001, "title": "Artwork", "quantity": 1, "price": "49.99"}
        ],
        "customer": {"id": 77, "email": "buyer@example.com"}
    })
}

/// Order payload without any marketplace linkage.
pub fn foreign_order_json(id: i64) -> Value {
    json!({
        "id": id,
        "financial_status": "paid",
        "total_price": "10.00",
        "currency": "USD",
        "line_items": [{"id": 1, "title": "T-shirt", "sku": "TSHIRT-M"}]
    })
}

pub fn fulfillment_json(id: i64, order_id: Option<i64>, status: &str) -> Value {
    json!({
        "id": id,
        "order_id": order_id,
        "status": status,
        "created_at": "2025-03-01T10:00:00Z",
        "updated_at": "2025-03-02T08:30:00Z",
        "tracking_company": "UPS",
        "tracking_number": "1Z999",
        "tracking_url": "https://ups.example/1Z999",
        "shipment_status": "confirmed"
    })
}

// ── Provider lookup double ─────────────────────────────────────────────────

/// Fixed-answer fulfillment lookup that counts how often it is asked.
pub struct MockLookup {
    answer: Result<Option<FulfillmentDetails>, String>,
    calls: AtomicUsize,
}

impl MockLookup {
    pub fn linking(order_id: i64, checkout_id: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(Some(FulfillmentDetails {
                fulfillment: FulfillmentInfo {
                    id: "555".to_string(),
                    status: Some("success".to_string()),
                    created_at: None,
                    tracking_company: None,
                    tracking_number: None,
                    tracking_url: None,
                },
                order: FulfillmentOrderInfo {
                    id: order_id.to_string(),
                    checkout_id: checkout_id.map(str::to_string),
                    name: Some(format!("#{order_id}")),
                    email: None,
                    financial_status: Some("paid".to_string()),
                    fulfillment_status: None,
                    created_at: None,
                },
            })),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn unknown() -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(None),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            answer: Err("connection reset".to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FulfillmentLookup for MockLookup {
    fn fulfillment_details(
        &self,
        _fulfillment_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<FulfillmentDetails>, PipelineError>> + Send + '_>>
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.answer.clone().map_err(PipelineError::Provider);
        Box::pin(async move { answer })
    }
}

mod common;

use axum::http::StatusCode;
use common::*;
use order_sync::domain::order::OrderStatus;
use order_sync::services::signature::compute_signature;
use serde_json::json;
use tower::ServiceExt;

// ── 1. concurrent_redeliveries_of_one_event ────────────────────────────────
// 10 tasks deliver the same paid event. All are acknowledged; the order,
// the sale and the revenue are recorded exactly once.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redeliveries_of_one_event() {
    let app = setup();
    app.add_listing("L-77").await;
    let body = order_json(1001, 2001, "L-77", "paid").to_string();
    let signature = compute_signature(body.as_bytes(), SECRET).unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let router = app.router.clone();
        let req = webhook_request("/webhooks/shopify", "orders/paid", "evt-same", &signature, body.clone());
        handles.push(tokio::spawn(async move { router.oneshot(req).await.unwrap().status() }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap(), StatusCode::OK);
    }

    assert_eq!(app.store.orders().await.len(), 1);
    assert_eq!(app.store.listing_sold_writes().await, 1);
    let listing = app.listing("L-77").await;
    assert_eq!(listing.total_orders, 1);
    assert_eq!(listing.total_revenue.cents(), 4999);
    assert_eq!(app.store.webhook_log_count().await, 1);
}

// ── 2. concurrent_out_of_order_statuses ────────────────────────────────────
// paid, fulfilled and updated(paid) race for one order. Whatever the
// interleaving, the order ends fulfilled.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_out_of_order_statuses() {
    let app = setup();
    app.add_listing("L-77").await;
    app.webhook("orders/create", "evt-0", &order_json(1001, 2001, "L-77", "pending"))
        .await;

    let mut fulfilled = order_json(1001, 2001, "L-77", "paid");
    fulfilled["fulfillment_status"] = json!("fulfilled");
    let deliveries = [
        ("orders/paid", "evt-1", order_json(1001, 2001, "L-77", "paid")),
        ("orders/fulfilled", "evt-2", fulfilled),
        ("orders/updated", "evt-3", order_json(1001, 2001, "L-77", "paid")),
        ("orders/paid", "evt-4", order_json(1001, 2001, "L-77", "paid")),
    ];

    let mut handles = Vec::new();
    for (topic, event_id, payload) in deliveries {
        let router = app.router.clone();
        let body = payload.to_string();
        let signature = compute_signature(body.as_bytes(), SECRET).unwrap();
        let req = webhook_request("/webhooks/shopify", topic, event_id, &signature, body);
        handles.push(tokio::spawn(async move { router.oneshot(req).await.unwrap().status() }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap(), StatusCode::OK);
    }

    assert_eq!(app.order(1001).await.unwrap().order_status, OrderStatus::Fulfilled);
}

// ── 3. concurrent_claims ───────────────────────────────────────────────────
// 8 claims by the purchaser race. Exactly one wins.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims() {
    let app = setup();
    app.add_listing("L-77").await;
    let mut fulfilled = order_json(1001, 2001, "L-77", "paid");
    fulfilled["fulfillment_status"] = json!("fulfilled");
    app.webhook("orders/fulfilled", "evt-1", &fulfilled).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let router = app.router.clone();
        let req = axum::http::Request::post("/api/orders/1001/claim")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(
                json!({ "walletAddress": BUYER_WALLET }).to_string(),
            ))
            .unwrap();
        handles.push(tokio::spawn(async move { router.oneshot(req).await.unwrap().status() }));
    }

    let mut won = 0;
    let mut refused = 0;
    for h in handles {
        match h.await.unwrap() {
            StatusCode::OK => won += 1,
            StatusCode::BAD_REQUEST => refused += 1,
            other => panic!("unexpected status: {other}"),
        }
    }
    assert_eq!(won, 1, "exactly 1 claim succeeds");
    assert_eq!(refused, 7);
}

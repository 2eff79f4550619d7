mod common;

use axum::http::StatusCode;
use common::*;
use order_sync::domain::id::{EventId, ListingId};
use order_sync::domain::listing::ListingStatus;
use order_sync::domain::order::OrderStatus;
use order_sync::domain::store::WebhookLogRepo;
use serde_json::json;

async fn ledger(app: &TestApp, event_id: &str) -> Option<order_sync::domain::webhook::WebhookLogEntry> {
    app.store
        .get_webhook_log(&EventId::new(event_id).unwrap())
        .await
        .unwrap()
}

// ── 1. paid_notification_creates_order_and_sells_listing ───────────────────

#[tokio::test]
async fn paid_notification_creates_order_and_sells_listing() {
    let app = setup();
    app.add_listing("L-77").await;

    let (status, body) = app
        .webhook("orders/paid", "evt-1", &order_json(1001, 2001, "L-77", "paid"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "order created");

    let order = app.order(1001).await.expect("order created");
    assert_eq!(order.order_status, OrderStatus::Paid);
    assert_eq!(order.listing_id, Some(ListingId::new("L-77").unwrap()));
    assert_eq!(order.shopify_checkout_id.as_deref(), Some("2001"));
    assert_eq!(order.total_price.cents(), 4999);
    assert!(order.creator_wallet_address.matches(CREATOR_WALLET));
    assert_eq!(order.webhook_events.len(), 1);

    let listing = app.listing("L-77").await;
    assert_eq!(listing.status, ListingStatus::Sold);
    assert!(listing.purchased_at.is_some());
    assert_eq!(listing.purchaser_email.as_deref(), Some("buyer@example.com"));
    assert_eq!(listing.total_orders, 1);
    assert_eq!(listing.total_revenue.cents(), 4999);
    assert_eq!(listing.shopify_product_id.as_deref(), Some("9001"));

    let entry = ledger(&app, "evt-1").await.expect("receipt logged");
    assert!(entry.processed);
    assert_eq!(entry.shopify_order_id, Some(1001));
    assert_eq!(entry.shop_domain.as_deref(), Some("test-shop.myshopify.com"));
}

// ── 2. redelivered_event_is_a_no_op ────────────────────────────────────────

#[tokio::test]
async fn redelivered_event_is_a_no_op() {
    let app = setup();
    app.add_listing("L-77").await;
    let payload = order_json(1001, 2001, "L-77", "paid");

    app.webhook("orders/paid", "evt-1", &payload).await;
    let before = app.order(1001).await.unwrap();

    let (status, body) = app.webhook("orders/paid", "evt-1", &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "event already processed");

    let after = app.order(1001).await.unwrap();
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(after.webhook_events, before.webhook_events);

    let listing = app.listing("L-77").await;
    assert_eq!(listing.total_orders, 1, "revenue must not double count");
    assert_eq!(listing.total_revenue.cents(), 4999);
    assert_eq!(app.store.listing_sold_writes().await, 1);
    assert!(ledger(&app, "evt-1").await.unwrap().processed);
}

// ── 3. second_paid_event_does_not_double_count ─────────────────────────────
// Same order, new event id: status stays, audit grows, stats untouched.

#[tokio::test]
async fn second_paid_event_does_not_double_count() {
    let app = setup();
    app.add_listing("L-77").await;
    let payload = order_json(1001, 2001, "L-77", "paid");

    app.webhook("orders/paid", "evt-1", &payload).await;
    let (status, body) = app.webhook("orders/paid", "evt-2", &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "order status updated");

    let order = app.order(1001).await.unwrap();
    assert_eq!(order.order_status, OrderStatus::Paid);
    assert_eq!(order.webhook_events.len(), 2);
    assert_eq!(app.listing("L-77").await.total_orders, 1);
    assert_eq!(app.store.listing_sold_writes().await, 1);
}

// ── 4. fulfilled_before_paid_keeps_fulfilled ───────────────────────────────

#[tokio::test]
async fn fulfilled_before_paid_keeps_fulfilled() {
    let app = setup();
    app.add_listing("L-77").await;
    let mut fulfilled = order_json(1001, 2001, "L-77", "paid");
    fulfilled["fulfillment_status"] = json!("fulfilled");

    let (status, body) = app.webhook("orders/fulfilled", "evt-f", &fulfilled).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "order created");
    assert_eq!(app.listing("L-77").await.status, ListingStatus::Sold);

    let (status, body) = app
        .webhook("orders/paid", "evt-p", &order_json(1001, 2001, "L-77", "paid"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["message"].as_str().unwrap().contains("stale"));

    let order = app.order(1001).await.unwrap();
    assert_eq!(order.order_status, OrderStatus::Fulfilled);
    assert_eq!(order.fulfillment_status.as_deref(), Some("fulfilled"));
    assert!(ledger(&app, "evt-p").await.unwrap().processed);
}

// ── 5. terminal_status_is_never_left ───────────────────────────────────────

#[tokio::test]
async fn terminal_status_is_never_left() {
    let app = setup();
    app.add_listing("L-77").await;
    app.webhook("orders/paid", "evt-1", &order_json(1001, 2001, "L-77", "paid"))
        .await;

    let mut cancelled = order_json(1001, 2001, "L-77", "voided");
    cancelled["cancelled_at"] = json!("2025-03-03T12:00:00Z");
    let (status, body) = app.webhook("orders/cancelled", "evt-2", &cancelled).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "order cancelled");

    let (status, body) = app
        .webhook("orders/updated", "evt-3", &order_json(1001, 2001, "L-77", "paid"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("stale"));
    assert_eq!(app.order(1001).await.unwrap().order_status, OrderStatus::Cancelled);
}

// ── 6. updated_derives_status_from_payload ─────────────────────────────────

#[tokio::test]
async fn updated_derives_status_from_payload() {
    let app = setup();
    app.add_listing("L-77").await;
    app.webhook("orders/create", "evt-1", &order_json(1001, 2001, "L-77", "pending"))
        .await;
    assert_eq!(app.order(1001).await.unwrap().order_status, OrderStatus::Pending);
    assert_eq!(app.listing("L-77").await.status, ListingStatus::Available);

    let mut refunded = order_json(1001, 2001, "L-77", "refunded");
    refunded["fulfillment_status"] = json!("fulfilled");
    let (status, body) = app.webhook("orders/updated", "evt-2", &refunded).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "order status updated");

    let order = app.order(1001).await.unwrap();
    assert_eq!(order.order_status, OrderStatus::Refunded);
    assert_eq!(order.financial_status.as_deref(), Some("refunded"));
}

// ── 7. foreign_orders_are_skipped_or_rejected ──────────────────────────────
// No linkage: paid-type is "not ours" (200), create is a validation error (400).

#[tokio::test]
async fn foreign_orders_are_skipped_or_rejected() {
    let app = setup();

    let (status, body) = app.webhook("orders/paid", "evt-1", &foreign_order_json(5)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("not tracked"));
    assert!(ledger(&app, "evt-1").await.unwrap().processed);

    let (status, body) = app.webhook("orders/updated", "evt-2", &foreign_order_json(5)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("not tracked"));

    let (status, body) = app.webhook("orders/create", "evt-3", &foreign_order_json(5)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "validation_error");
    assert!(body.get("success").is_none());
    let entry = ledger(&app, "evt-3").await.unwrap();
    assert!(!entry.processed);
    assert!(entry.error_message.unwrap().contains("listing"));

    assert!(app.store.orders().await.is_empty());
}

// ── 8. create_for_unknown_listing_is_rejected ──────────────────────────────

#[tokio::test]
async fn create_for_unknown_listing_is_rejected() {
    let app = setup();
    let (status, body) = app
        .webhook("orders/create", "evt-1", &order_json(1001, 2001, "L-404", "paid"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("L-404"));
    assert!(app.order(1001).await.is_none());
}

// ── 9. tampered_body_is_rejected_before_any_write ──────────────────────────

#[tokio::test]
async fn tampered_body_is_rejected_before_any_write() {
    let app = setup();
    app.add_listing("L-77").await;

    let original = order_json(1001, 2001, "L-77", "paid").to_string();
    let signature = order_sync::services::signature::compute_signature(original.as_bytes(), SECRET)
        .unwrap();
    let tampered = original.replace("49.99", "0.01");

    let (status, body) = app
        .send(webhook_request("/webhooks/shopify", "orders/paid", "evt-1", &signature, tampered))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "webhook_signature");
    assert_eq!(app.store.webhook_log_count().await, 0);
    assert!(app.order(1001).await.is_none());
    assert_eq!(app.listing("L-77").await.status, ListingStatus::Available);
}

// ── 10. missing_headers_are_rejected ───────────────────────────────────────

#[tokio::test]
async fn missing_headers_are_rejected() {
    let app = setup();
    let req = axum::http::Request::post("/webhooks/shopify")
        .header("X-Shopify-Topic", "orders/paid")
        .body(axum::body::Body::from("{}"))
        .unwrap();

    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "missing_headers");
    assert!(body["error"].as_str().unwrap().contains("X-Shopify-Event-Id"));
    assert_eq!(app.store.webhook_log_count().await, 0);
}

// ── 11. unsigned_webhooks_pass_when_no_secret_configured ───────────────────

#[tokio::test]
async fn unsigned_webhooks_pass_when_no_secret_configured() {
    let app = setup_without_secret();
    app.add_listing("L-77").await;

    let body = order_json(1001, 2001, "L-77", "paid").to_string();
    let (status, resp) = app
        .send(webhook_request("/webhooks/shopify", "orders/paid", "evt-1", "not-a-signature", body))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["message"], "order created");
    assert!(app.order(1001).await.is_some());
}

// ── 12. malformed_bodies ───────────────────────────────────────────────────

#[tokio::test]
async fn malformed_bodies() {
    let app = setup();

    // Not JSON at all: rejected before the ledger.
    let body = "{not json".to_string();
    let sig = order_sync::services::signature::compute_signature(body.as_bytes(), SECRET).unwrap();
    let (status, _) = app
        .send(webhook_request("/webhooks/shopify", "orders/paid", "evt-1", &sig, body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.store.webhook_log_count().await, 0);

    // JSON without an order id: logged with the parse error.
    let (status, body) = app
        .webhook("orders/paid", "evt-2", &json!({"email": "a@b.c"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "validation_error");
    let entry = ledger(&app, "evt-2").await.unwrap();
    assert!(!entry.processed);
    assert!(entry.error_message.is_some());
}

// ── 13. unknown_topic_is_acknowledged ──────────────────────────────────────

#[tokio::test]
async fn unknown_topic_is_acknowledged() {
    let app = setup();
    let (status, body) = app
        .webhook("app/uninstalled", "evt-1", &json!({"id": 1}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("unsupported topic"));
    let entry = ledger(&app, "evt-1").await.unwrap();
    assert!(entry.processed);
    assert_eq!(entry.topic, "app/uninstalled");
}

// ── 14. topic_aliases_dispatch_by_header ───────────────────────────────────

#[tokio::test]
async fn topic_aliases_dispatch_by_header() {
    let app = setup();
    app.add_listing("L-77").await;

    let body = order_json(1001, 2001, "L-77", "paid").to_string();
    let sig = order_sync::services::signature::compute_signature(body.as_bytes(), SECRET).unwrap();
    let (status, resp) = app
        .send(webhook_request("/webhooks/orders/paid", "orders/paid", "evt-1", &sig, body))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["message"], "order created");

    let body = json!({"id": 42}).to_string();
    let sig = order_sync::services::signature::compute_signature(body.as_bytes(), SECRET).unwrap();
    let (status, resp) = app
        .send(webhook_request("/webhooks/orders/create", "shop/update", "evt-2", &sig, body))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(resp["message"].as_str().unwrap().contains("shop/update"));
}

// ── 15. secondary_failure_still_acknowledges ───────────────────────────────

#[tokio::test]
async fn secondary_failure_still_acknowledges() {
    let app = setup();
    app.add_listing("L-77").await;
    app.webhook("orders/paid", "evt-1", &order_json(1001, 2001, "L-77", "paid"))
        .await;

    app.store.fail_audit_writes().await;
    let mut fulfilled = order_json(1001, 2001, "L-77", "paid");
    fulfilled["fulfillment_status"] = json!("fulfilled");
    let (status, body) = app.webhook("orders/fulfilled", "evt-2", &fulfilled).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let order = app.order(1001).await.unwrap();
    assert_eq!(order.order_status, OrderStatus::Fulfilled);
    assert_eq!(order.webhook_events.len(), 1, "audit append failed");
    assert!(ledger(&app, "evt-2").await.unwrap().processed);
}

// ── 16. primary_failure_is_retryable ───────────────────────────────────────

#[tokio::test]
async fn primary_failure_is_retryable() {
    let app = setup();
    app.add_listing("L-77").await;
    app.store.fail_order_writes().await;

    let (status, body) = app
        .webhook("orders/paid", "evt-1", &order_json(1001, 2001, "L-77", "paid"))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error_code"], "internal_error");

    let entry = ledger(&app, "evt-1").await.unwrap();
    assert!(!entry.processed, "failed event must stay eligible for redelivery");
    assert!(entry.error_message.is_some());
    assert!(app.order(1001).await.is_none());
}

// ── 17. cancellation_restores_every_listing ────────────────────────────────
// One listing write fails; the others are still restored and the
// cancellation is acknowledged.

#[tokio::test]
async fn cancellation_restores_every_listing() {
    let app = setup();
    app.add_listing("L-1").await;
    let mut second = listing("L-2", Some(CREATOR_WALLET));
    second.status = ListingStatus::Sold;
    app.store.add_listing(second).await;
    let mut third = listing("L-3", Some(CREATOR_WALLET));
    third.status = ListingStatus::Sold;
    third.shopify_product_id = Some("3".to_string());
    app.store.add_listing(third).await;

    let mut payload = order_json(1001, 2001, "L-1", "paid");
    payload["line_items"] = json!([
        {"id": 1, "product_id": 1, "sku": "listing-L-1"},
        {"id": 2, "product_id": 2, "sku": "listing-L-2"},
        {"id": 3, "product_id": 3, "title": "Print"}
    ]);
    app.webhook("orders/paid", "evt-1", &payload).await;
    assert_eq!(app.listing("L-1").await.status, ListingStatus::Sold);

    app.store.fail_listing_writes(&ListingId::new("L-2").unwrap()).await;
    payload["cancelled_at"] = json!("2025-03-03T12:00:00Z");
    let (status, body) = app.webhook("orders/cancelled", "evt-2", &payload).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "order cancelled");
    assert_eq!(app.order(1001).await.unwrap().order_status, OrderStatus::Cancelled);

    let first = app.listing("L-1").await;
    assert_eq!(first.status, ListingStatus::Available);
    assert!(first.purchaser_email.is_none());
    assert_eq!(app.listing("L-2").await.status, ListingStatus::Sold);
    assert_eq!(app.listing("L-3").await.status, ListingStatus::Available);
}

// ── 18. cancellation_of_untracked_order_is_skipped ─────────────────────────

#[tokio::test]
async fn cancellation_of_untracked_order_is_skipped() {
    let app = setup();
    let (status, body) = app
        .webhook("orders/cancelled", "evt-1", &foreign_order_json(77))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("not tracked"));
}

// ── 19. paid_with_unrepresentable_price_is_rejected_not_skipped ────────────
// The listing is ours, so the sale sticks and the event stays retryable.

#[tokio::test]
async fn paid_with_unrepresentable_price_is_rejected_not_skipped() {
    let app = setup();
    app.add_listing("L-77").await;

    let mut payload = order_json(1001, 2001, "L-77", "paid");
    payload["total_price"] = json!("12.345");
    payload["currency"] = json!("KWD");
    let (status, body) = app.webhook("orders/paid", "evt-1", &payload).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "validation_error");
    assert!(body["error"].as_str().unwrap().contains("12.345"));
    assert_eq!(app.listing("L-77").await.status, ListingStatus::Sold);
    assert!(app.order(1001).await.is_none());
    let entry = ledger(&app, "evt-1").await.unwrap();
    assert!(!entry.processed);
    assert!(entry.error_message.is_some());
}

#[tokio::test]
async fn paid_for_unknown_listing_is_not_ours() {
    let app = setup();
    let (status, body) = app
        .webhook("orders/paid", "evt-1", &order_json(1001, 2001, "L-404", "paid"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("not tracked"));
    assert!(app.order(1001).await.is_none());
}

// ── 20. updated_refreshes_fields_when_status_is_held ───────────────────────
// partially_refunded derives pending, which the guard holds back; the
// financial status, price and email are written anyway.

#[tokio::test]
async fn updated_refreshes_fields_when_status_is_held() {
    let app = setup();
    app.add_listing("L-77").await;
    app.webhook("orders/paid", "evt-1", &order_json(1001, 2001, "L-77", "paid"))
        .await;

    let mut partial = order_json(1001, 2001, "L-77", "partially_refunded");
    partial["total_price"] = json!("20.00");
    partial["email"] = json!("new-buyer@example.com");
    let (status, body) = app.webhook("orders/updated", "evt-2", &partial).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("stale"));
    let order = app.order(1001).await.unwrap();
    assert_eq!(order.order_status, OrderStatus::Paid);
    assert_eq!(order.financial_status.as_deref(), Some("partially_refunded"));
    assert_eq!(order.total_price.cents(), 2000);
    assert_eq!(order.shopify_customer_email.as_deref(), Some("new-buyer@example.com"));
    assert!(ledger(&app, "evt-2").await.unwrap().processed);
}

use {
    super::{orders_api, shopify_webhook::shopify_webhook_handler},
    crate::AppState,
    axum::{
        Router,
        extract::DefaultBodyLimit,
        http::StatusCode,
        routing::{get, post},
    },
    std::time::Duration,
    tower_http::{timeout::TimeoutLayer, trace::TraceLayer},
};

const BODY_LIMIT: usize = 256 * 1024; // 256 KB, order payloads with many line items stay well below
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// Per-topic aliases kept for stores configured with one URL per topic.
const WEBHOOK_ALIASES: [&str; 7] = [
    "/webhooks/orders/create",
    "/webhooks/orders/paid",
    "/webhooks/orders/updated",
    "/webhooks/orders/cancelled",
    "/webhooks/orders/fulfilled",
    "/webhooks/fulfillments/create",
    "/webhooks/fulfillments/update",
];

pub fn router(state: AppState) -> Router {
    let webhooks = WEBHOOK_ALIASES.iter().fold(
        Router::new().route("/webhooks/shopify", post(shopify_webhook_handler)),
        |router, path| router.route(path, post(shopify_webhook_handler)),
    );

    Router::new()
        .route("/", get(orders_api::health))
        .merge(webhooks)
        .route(
            "/api/orders/{shopify_order_id}/claim",
            post(orders_api::claim_order_handler),
        )
        .route(
            "/api/orders/{shopify_order_id}",
            get(orders_api::order_details_handler),
        )
        .route(
            "/api/orders/user/{wallet}",
            get(orders_api::user_orders_handler),
        )
        .route(
            "/api/shopify/fulfillment/{fulfillment_id}",
            get(orders_api::fulfillment_details_handler),
        )
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

use {
    super::api_errors::{ApiError, ClaimApiError},
    crate::{
        AppState,
        domain::{error::PipelineError, order::ClaimRecord, provider::FulfillmentDetails},
        services::{
            orders_query::{self, OrderAnalytics, OrderDetails, UserOrder},
            reconciler::OrderReconciler,
        },
    },
    axum::{
        Json,
        extract::{Path, State},
    },
    serde::{Deserialize, Serialize},
};

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    #[serde(rename = "walletAddress", alias = "wallet_address")]
    pub wallet_address: String,
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub success: bool,
    pub message: &'static str,
    pub claim: ClaimRecord,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub order: OrderDetails,
}

#[derive(Debug, Serialize)]
pub struct UserOrdersResponse {
    pub success: bool,
    pub orders: Vec<UserOrder>,
    pub analytics: OrderAnalytics,
}

#[derive(Debug, Serialize)]
pub struct FulfillmentResponse {
    pub success: bool,
    #[serde(flatten)]
    pub details: FulfillmentDetails,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[tracing::instrument(name = "claim", skip_all, fields(shopify_order_id))]
pub async fn claim_order_handler(
    State(state): State<AppState>,
    Path(shopify_order_id): Path<i64>,
    Json(req): Json<ClaimRequest>,
) -> Result<Json<ClaimResponse>, ClaimApiError> {
    let claim = OrderReconciler::new(state.store.as_ref())
        .claim_order(shopify_order_id, &req.wallet_address)
        .await?;
    Ok(Json(ClaimResponse {
        success: true,
        message: "order claimed successfully",
        claim,
    }))
}

pub async fn order_details_handler(
    State(state): State<AppState>,
    Path(shopify_order_id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = orders_query::order_details(state.store.as_ref(), shopify_order_id).await?;
    Ok(Json(OrderResponse {
        success: true,
        order,
    }))
}

pub async fn user_orders_handler(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> Result<Json<UserOrdersResponse>, ApiError> {
    let user = orders_query::user_orders(state.store.as_ref(), &wallet).await?;
    Ok(Json(UserOrdersResponse {
        success: true,
        orders: user.orders,
        analytics: user.analytics,
    }))
}

pub async fn fulfillment_details_handler(
    State(state): State<AppState>,
    Path(fulfillment_id): Path<i64>,
) -> Result<Json<FulfillmentResponse>, ApiError> {
    let details = state
        .fulfillment_lookup
        .fulfillment_details(fulfillment_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("fulfillment {fulfillment_id}")))?;
    Ok(Json(FulfillmentResponse {
        success: true,
        details,
    }))
}

use {
    super::api_errors::ApiError,
    crate::{
        AppState,
        domain::{
            error::PipelineError,
            id::EventId,
            webhook::{ProcessResult, Topic, WebhookHeaders},
        },
        services::webhook_pipeline::process_webhook,
    },
    axum::{Json, extract::State, http::HeaderMap},
    serde::Serialize,
};

pub const HEADER_TOPIC: &str = "X-Shopify-Topic";
pub const HEADER_HMAC: &str = "X-Shopify-Hmac-SHA256";
pub const HEADER_SHOP_DOMAIN: &str = "X-Shopify-Shop-Domain";
pub const HEADER_API_VERSION: &str = "X-Shopify-API-Version";
pub const HEADER_WEBHOOK_ID: &str = "X-Shopify-Webhook-Id";
pub const HEADER_TRIGGERED_AT: &str = "X-Shopify-Triggered-At";
pub const HEADER_EVENT_ID: &str = "X-Shopify-Event-Id";

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
}

impl From<&ProcessResult> for WebhookResponse {
    fn from(result: &ProcessResult) -> Self {
        Self {
            success: true,
            message: result.message(),
        }
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Topic, signature and event id are mandatory; the rest is forensic.
pub fn parse_headers(headers: &HeaderMap) -> Result<WebhookHeaders, PipelineError> {
    let required = (
        header(headers, HEADER_TOPIC),
        header(headers, HEADER_HMAC),
        header(headers, HEADER_EVENT_ID),
    );
    let (topic, hmac_sha256, event_id) = match required {
        (Some(topic), Some(hmac), Some(event_id)) => (topic, hmac, event_id),
        (topic, hmac, event_id) => {
            let missing: Vec<&str> = [
                (HEADER_TOPIC, topic.is_none()),
                (HEADER_HMAC, hmac.is_none()),
                (HEADER_EVENT_ID, event_id.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect();
            return Err(PipelineError::MissingHeaders(missing.join(", ")));
        }
    };

    Ok(WebhookHeaders {
        topic: Topic::parse(&topic),
        hmac_sha256,
        event_id: EventId::new(event_id)?,
        shop_domain: header(headers, HEADER_SHOP_DOMAIN),
        api_version: header(headers, HEADER_API_VERSION),
        webhook_id: header(headers, HEADER_WEBHOOK_ID),
        triggered_at: header(headers, HEADER_TRIGGERED_AT),
    })
}

/// Single ingress for every topic; per-topic routes point here too and
/// dispatch always follows the topic header.
#[tracing::instrument(
    name = "webhook",
    skip_all,
    fields(
        event_id = tracing::field::Empty,
        topic = tracing::field::Empty,
        shop_domain = tracing::field::Empty,
    )
)]
pub async fn shopify_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let headers = parse_headers(&headers).inspect_err(|e| {
        tracing::warn!(error = %e, "rejecting webhook with missing headers");
    })?;

    let span = tracing::Span::current();
    span.record("event_id", tracing::field::display(&headers.event_id));
    span.record("topic", tracing::field::display(&headers.topic));
    if let Some(shop) = &headers.shop_domain {
        span.record("shop_domain", tracing::field::display(shop));
    }
    tracing::debug!(
        api_version = ?headers.api_version,
        triggered_at = ?headers.triggered_at,
        "webhook received"
    );

    let result = process_webhook(
        state.store.as_ref(),
        state.fulfillment_lookup.as_ref(),
        state.webhook_secret.as_deref(),
        &headers,
        &body,
    )
    .await?;

    Ok(Json(WebhookResponse::from(&result)))
}

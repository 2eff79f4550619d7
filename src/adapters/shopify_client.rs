use {
    crate::domain::{
        error::PipelineError,
        provider::{FulfillmentDetails, FulfillmentInfo, FulfillmentLookup, FulfillmentOrderInfo},
    },
    reqwest::{
        Client,
        header::{HeaderMap, HeaderValue},
    },
    serde::Deserialize,
    std::{future::Future, pin::Pin, time::Duration},
};

const FULFILLMENT_QUERY: &str = r#"
query GetFulfillment($id: ID!) {
  fulfillment(id: $id) {
    legacyResourceId
    status
    createdAt
    trackingInfo { company number url }
    order {
      legacyResourceId
      name
      email
      createdAt
      checkoutId
      financialStatus
      fulfillmentStatus
    }
  }
}
"#;

#[derive(Debug, Clone)]
pub struct ShopifyConfig {
    /// Store handle, without `.myshopify.com`.
    pub store: String,
    pub admin_access_token: String,
    pub api_version: String,
}

/// Shopify Admin GraphQL client backing the fulfillment fallback lookup.
pub struct ShopifyClient {
    config: ShopifyConfig,
    client: Client,
}

impl ShopifyClient {
    pub fn new(config: ShopifyConfig) -> Result<Self, PipelineError> {
        let mut headers = HeaderMap::with_capacity(2);
        let token = HeaderValue::from_str(&config.admin_access_token)
            .map_err(|e| PipelineError::Provider(format!("invalid access token header: {e}")))?;
        headers.insert("X-Shopify-Access-Token", token);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| PipelineError::Provider(format!("http client init: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn graphql_url(&self) -> String {
        format!(
            "https://{}.myshopify.com/admin/api/{}/graphql.json",
            self.config.store, self.config.api_version
        )
    }

    async fn fetch_fulfillment(
        &self,
        fulfillment_id: i64,
    ) -> Result<Option<FulfillmentDetails>, PipelineError> {
        let body = serde_json::json!({
            "query": FULFILLMENT_QUERY,
            "variables": { "id": format!("gid://shopify/Fulfillment/{fulfillment_id}") },
        });
        tracing::debug!(fulfillment_id, "querying Shopify for fulfillment");

        let response = self
            .client
            .post(self.graphql_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Provider(format!("Shopify GraphQL request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::Provider(format!(
                "Shopify GraphQL returned {status}: {text}"
            )));
        }

        let parsed: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Provider(format!("Shopify GraphQL body: {e}")))?;
        parsed.into_details()
    }
}

impl FulfillmentLookup for ShopifyClient {
    fn fulfillment_details(
        &self,
        fulfillment_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<FulfillmentDetails>, PipelineError>> + Send + '_>>
    {
        Box::pin(self.fetch_fulfillment(fulfillment_id))
    }
}

// ── GraphQL wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<FulfillmentData>,
    #[serde(default)]
    errors: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct FulfillmentData {
    fulfillment: Option<GqlFulfillment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlFulfillment {
    legacy_resource_id: String,
    status: Option<String>,
    created_at: Option<String>,
    #[serde(default)]
    tracking_info: Vec<GqlTrackingInfo>,
    order: GqlOrder,
}

#[derive(Debug, Deserialize)]
struct GqlTrackingInfo {
    company: Option<String>,
    number: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlOrder {
    legacy_resource_id: String,
    name: Option<String>,
    email: Option<String>,
    created_at: Option<String>,
    checkout_id: Option<String>,
    financial_status: Option<String>,
    fulfillment_status: Option<String>,
}

/// `gid://shopify/Checkout/123?key=…` → `123`; plain ids pass through.
fn legacy_id(gid: &str) -> String {
    let tail = gid.rsplit('/').next().unwrap_or(gid);
    tail.split('?').next().unwrap_or(tail).to_string()
}

impl GraphQlResponse {
    fn into_details(self) -> Result<Option<FulfillmentDetails>, PipelineError> {
        if let Some(errors) = self.errors.filter(|e| !e.is_empty()) {
            let joined = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(PipelineError::Provider(format!("Shopify GraphQL errors: {joined}")));
        }
        let Some(f) = self.data.and_then(|d| d.fulfillment) else {
            return Ok(None);
        };
        let tracking = f.tracking_info.into_iter().next();

        Ok(Some(FulfillmentDetails {
            fulfillment: FulfillmentInfo {
                id: f.legacy_resource_id,
                status: f.status.map(|s| s.to_lowercase()),
                created_at: f.created_at,
                tracking_company: tracking.as_ref().and_then(|t| t.company.clone()),
                tracking_number: tracking.as_ref().and_then(|t| t.number.clone()),
                tracking_url: tracking.and_then(|t| t.url),
            },
            order: FulfillmentOrderInfo {
                id: f.order.legacy_resource_id,
                checkout_id: f.order.checkout_id.as_deref().map(legacy_id),
                name: f.order.name,
                email: f.order.email,
                financial_status: f.order.financial_status.map(|s| s.to_lowercase()),
                fulfillment_status: f.order.fulfillment_status.map(|s| s.to_lowercase()),
                created_at: f.order.created_at,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_graphql_payload_to_linkage() {
        let raw = serde_json::json!({
            "data": {"fulfillment": {
                "legacyResourceId": "555",
                "status": "SUCCESS",
                "createdAt": "2025-03-01T10:00:00Z",
                "trackingInfo": [{"company": "UPS", "number": "1Z", "url": null}],
                "order": {
                    "legacyResourceId": "1001",
                    "checkoutId": "gid://shopify/Checkout/2001?key=abc",
                    "financialStatus": "PAID",
                    "fulfillmentStatus": "FULFILLED"
                }
            }}
        });
        let resp: GraphQlResponse = serde_json::from_value(raw).unwrap();
        let details = resp.into_details().unwrap().unwrap();
        assert_eq!(details.order.numeric_id(), Some(1001));
        assert_eq!(details.order.checkout_id.as_deref(), Some("2001"));
        assert_eq!(details.fulfillment.status.as_deref(), Some("success"));
        assert_eq!(details.fulfillment.tracking_company.as_deref(), Some("UPS"));
    }

    #[test]
    fn unknown_fulfillment_is_none_and_errors_are_provider_errors() {
        let resp: GraphQlResponse =
            serde_json::from_value(serde_json::json!({"data": {"fulfillment": null}})).unwrap();
        assert!(resp.into_details().unwrap().is_none());

        let resp: GraphQlResponse = serde_json::from_value(
            serde_json::json!({"data": null, "errors": [{"message": "throttled"}]}),
        )
        .unwrap();
        assert!(matches!(resp.into_details(), Err(PipelineError::Provider(_))));
    }
}

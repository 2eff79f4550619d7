use {
    super::error::PipelineError,
    serde::Serialize,
    std::{future::Future, pin::Pin},
};

#[derive(Debug, Clone, Serialize)]
pub struct FulfillmentInfo {
    pub id: String,
    pub status: Option<String>,
    pub created_at: Option<String>,
    pub tracking_company: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FulfillmentOrderInfo {
    pub id: String,
    pub checkout_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub financial_status: Option<String>,
    pub fulfillment_status: Option<String>,
    pub created_at: Option<String>,
}

impl FulfillmentOrderInfo {
    /// The provider's numeric order id, when the returned id is numeric.
    pub fn numeric_id(&self) -> Option<i64> {
        self.id.trim().parse().ok()
    }
}

/// Authoritative fulfillment → order linkage fetched from the provider API.
#[derive(Debug, Clone, Serialize)]
pub struct FulfillmentDetails {
    pub fulfillment: FulfillmentInfo,
    pub order: FulfillmentOrderInfo,
}

pub trait FulfillmentLookup: Send + Sync {
    /// `Ok(None)` when the provider does not know the fulfillment.
    fn fulfillment_details(
        &self,
        fulfillment_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<FulfillmentDetails>, PipelineError>> + Send + '_>>;
}

/// Used when no provider API credentials are configured: every lookup misses.
pub struct NoFulfillmentLookup;

impl FulfillmentLookup for NoFulfillmentLookup {
    fn fulfillment_details(
        &self,
        fulfillment_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<FulfillmentDetails>, PipelineError>> + Send + '_>>
    {
        Box::pin(async move {
            tracing::debug!(fulfillment_id, "fulfillment lookup not configured");
            Ok(None)
        })
    }
}

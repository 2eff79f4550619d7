use {
    super::error::PipelineError,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    InTransit,
    Delivered,
    Exception,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
            Self::Exception => "exception",
        }
    }

    /// Maps the provider's raw shipment vocabulary. Only `confirmed` counts as
    /// progress; everything else stays `pending`, since `in_transit` and
    /// `delivered` are shown to buyers as promises.
    pub fn from_provider(raw: Option<&str>) -> Self {
        match raw {
            Some("confirmed") => Self::InTransit,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ShipmentStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_transit" => Ok(Self::InTransit),
            "delivered" => Ok(Self::Delivered),
            "exception" => Ok(Self::Exception),
            other => Err(PipelineError::Validation(format!(
                "unknown shipment status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub description: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FulfillmentTracking {
    pub id: Uuid,
    pub shopify_order_id: i64,
    pub shopify_fulfillment_id: i64,
    pub tracking_company: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub shipment_status: ShipmentStatus,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub location_updates: Vec<LocationUpdate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upsert record keyed on `shopify_fulfillment_id`. `location_updates` are
/// appended to whatever the row already holds, skipping exact repeats.
#[derive(Debug, Clone)]
pub struct NewFulfillmentTracking {
    pub id: Uuid,
    pub shopify_order_id: i64,
    pub shopify_fulfillment_id: i64,
    pub tracking_company: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub shipment_status: ShipmentStatus,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub location_updates: Vec<LocationUpdate>,
}

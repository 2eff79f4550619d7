use {
    super::error::PipelineError,
    super::id::{ListingId, WalletAddress},
    super::money::MoneyAmount,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Available,
    Sold,
    Reserved,
    Pending,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Sold => "sold",
            Self::Reserved => "reserved",
            Self::Pending => "pending",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ListingStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "available" => Ok(Self::Available),
            "sold" => Ok(Self::Sold),
            "reserved" => Ok(Self::Reserved),
            "pending" => Ok(Self::Pending),
            other => Err(PipelineError::Validation(format!(
                "unknown listing status: {other}"
            ))),
        }
    }
}

/// Catalog entry owned by the marketplace UI; this service only flips its
/// availability and keeps its order statistics.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    pub description: Option<String>,
    pub price: Option<MoneyAmount>,
    pub image_url: Option<String>,
    /// Wallet of the user the listing belongs to, if one is linked.
    pub owner_wallet_address: Option<WalletAddress>,
    pub status: ListingStatus,
    pub purchased_at: Option<DateTime<Utc>>,
    pub purchaser_email: Option<String>,
    pub purchaser_wallet_address: Option<WalletAddress>,
    pub shopify_product_id: Option<String>,
    pub total_orders: i64,
    pub total_revenue: MoneyAmount,
    pub last_order_at: Option<DateTime<Utc>>,
}

/// Attribution written when a paid order commits a listing.
#[derive(Debug, Clone)]
pub struct ListingSale {
    pub listing_id: ListingId,
    pub purchased_at: DateTime<Utc>,
    pub purchaser_email: Option<String>,
    pub purchaser_wallet_address: Option<WalletAddress>,
}

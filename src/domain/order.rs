use {
    super::error::{ClaimRejection, PipelineError},
    super::id::{EventId, ListingId, WalletAddress},
    super::money::{Currency, MoneyAmount},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Fulfilled,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        Self::Pending,
        Self::Paid,
        Self::Fulfilled,
        Self::Cancelled,
        Self::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Fulfilled => "fulfilled",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Lifecycle rank, higher means further along. Stored next to the status
    /// so the backing store can refuse downgrades inside a single-row write.
    pub fn rank(&self) -> i16 {
        match self {
            Self::Pending => 0,
            Self::Paid => 1,
            Self::Fulfilled => 2,
            Self::Cancelled | Self::Refunded => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }

    /// Monotonic guard: the status may stay where it is or move forward, but a
    /// terminal status never changes.
    pub fn can_transition_to(&self, next: &OrderStatus) -> bool {
        if self.is_terminal() {
            return self == next;
        }
        next.rank() >= self.rank()
    }

    /// Best-effort lifecycle status for a full order representation.
    pub fn from_provider(
        financial_status: Option<&str>,
        fulfillment_status: Option<&str>,
        cancelled: bool,
    ) -> Self {
        if cancelled {
            return Self::Cancelled;
        }
        match financial_status {
            Some("refunded") => return Self::Refunded,
            Some("voided") => return Self::Cancelled,
            _ => {}
        }
        if fulfillment_status == Some("fulfilled") {
            return Self::Fulfilled;
        }
        match financial_status {
            Some("paid") => Self::Paid,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for OrderStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "fulfilled" => Ok(Self::Fulfilled),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            other => Err(PipelineError::Validation(format!(
                "unknown order status: {other}"
            ))),
        }
    }
}

/// One entry of an order's append-only audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub topic: String,
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub processed: bool,
}

impl WebhookEvent {
    pub fn received(topic: &str, event_id: &EventId) -> Self {
        Self {
            topic: topic.to_string(),
            event_id: event_id.as_str().to_string(),
            timestamp: Utc::now(),
            processed: true,
        }
    }
}

/// Full order record (for reads).
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub shopify_order_id: i64,
    pub shopify_checkout_id: Option<String>,
    pub listing_id: Option<ListingId>,
    pub purchaser_wallet_address: WalletAddress,
    pub creator_wallet_address: WalletAddress,
    pub order_status: OrderStatus,
    pub financial_status: Option<String>,
    pub fulfillment_status: Option<String>,
    pub total_price: MoneyAmount,
    pub currency: Currency,
    pub shopify_customer_id: Option<i64>,
    pub shopify_customer_email: Option<String>,
    pub shipping_address: Option<serde_json::Value>,
    pub line_items: serde_json::Value,
    pub webhook_events: Vec<WebhookEvent>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claim_amount: Option<MoneyAmount>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn has_event(&self, event_id: &str) -> bool {
        self.webhook_events.iter().any(|e| e.event_id == event_id)
    }

    /// All three claim conditions, checked in the order the wallet UI reports them.
    pub fn check_claim(&self, wallet: &str) -> Result<(), ClaimRejection> {
        if self.order_status != OrderStatus::Fulfilled {
            return Err(ClaimRejection::NotFulfilled);
        }
        if !self.purchaser_wallet_address.matches(wallet) {
            return Err(ClaimRejection::NotPurchaser);
        }
        if self.claimed_at.is_some() {
            return Err(ClaimRejection::AlreadyClaimed);
        }
        Ok(())
    }
}

/// Record for the upsert path, keyed on `shopify_order_id`.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub shopify_order_id: i64,
    pub shopify_checkout_id: Option<String>,
    pub listing_id: Option<ListingId>,
    pub purchaser_wallet_address: WalletAddress,
    pub creator_wallet_address: WalletAddress,
    pub order_status: OrderStatus,
    pub financial_status: Option<String>,
    pub fulfillment_status: Option<String>,
    pub total_price: MoneyAmount,
    pub currency: Currency,
    pub shopify_customer_id: Option<i64>,
    pub shopify_customer_email: Option<String>,
    pub shipping_address: Option<serde_json::Value>,
    pub line_items: serde_json::Value,
    pub webhook_events: Vec<WebhookEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: Uuid,
    /// `true` when the row did not exist before this write.
    pub inserted: bool,
}

/// Partial update: `None` fields are left untouched. Only `status` is held
/// back by the monotonic guard; the other supplied fields are always written.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub shopify_order_id: i64,
    pub status: OrderStatus,
    pub financial_status: Option<String>,
    pub fulfillment_status: Option<String>,
    pub total_price: Option<MoneyAmount>,
    pub customer_email: Option<String>,
}

impl StatusUpdate {
    pub fn new(shopify_order_id: i64, status: OrderStatus) -> Self {
        Self {
            shopify_order_id,
            status,
            financial_status: None,
            fulfillment_status: None,
            total_price: None,
            customer_email: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdateOutcome {
    Updated,
    /// No row with this order id; the caller may fall back to a full upsert.
    NoMatchingRow,
    /// Row exists but the monotonic guard refused the status transition.
    /// The remaining supplied fields were still written.
    Rejected { current: OrderStatus },
}

/// Result of a successful claim, as reported to the wallet UI.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimRecord {
    pub order_id: i64,
    pub amount: MoneyAmount,
    pub currency: Currency,
    pub status: &'static str,
    pub claimed_at: DateTime<Utc>,
}

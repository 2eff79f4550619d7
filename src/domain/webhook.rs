use {
    super::error::PipelineError,
    super::id::EventId,
    super::order::OrderStatus,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Deserializer, Serialize},
    std::fmt,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    OrdersCreate,
    OrdersPaid,
    OrdersUpdated,
    OrdersCancelled,
    OrdersFulfilled,
    FulfillmentsCreate,
    FulfillmentsUpdate,
    Other(String),
}

impl Topic {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "orders/create" => Self::OrdersCreate,
            "orders/paid" => Self::OrdersPaid,
            "orders/updated" => Self::OrdersUpdated,
            "orders/cancelled" => Self::OrdersCancelled,
            "orders/fulfilled" => Self::OrdersFulfilled,
            "fulfillments/create" => Self::FulfillmentsCreate,
            "fulfillments/update" => Self::FulfillmentsUpdate,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::OrdersCreate => "orders/create",
            Self::OrdersPaid => "orders/paid",
            Self::OrdersUpdated => "orders/updated",
            Self::OrdersCancelled => "orders/cancelled",
            Self::OrdersFulfilled => "orders/fulfilled",
            Self::FulfillmentsCreate => "fulfillments/create",
            Self::FulfillmentsUpdate => "fulfillments/update",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The provider headers carried by every notification.
#[derive(Debug, Clone)]
pub struct WebhookHeaders {
    pub topic: Topic,
    pub hmac_sha256: String,
    pub event_id: EventId,
    pub shop_domain: Option<String>,
    pub api_version: Option<String>,
    pub webhook_id: Option<String>,
    pub triggered_at: Option<String>,
}

// ── Payloads ────────────────────────────────────────────────────────────────

/// `{name, value}` pair used both for order note attributes and line-item properties.
#[derive(Debug, Clone, Deserialize)]
pub struct NoteAttribute {
    pub name: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

impl NoteAttribute {
    /// Value as text; numbers are rendered, empty strings count as absent.
    pub fn value_str(&self) -> Option<String> {
        match self.value.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItem {
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "opt_id")]
    pub product_id: Option<i64>,
    #[serde(default, deserialize_with = "opt_id")]
    pub variant_id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub properties: Vec<NoteAttribute>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Full order representation carried by every `orders/*` topic.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderPayload {
    #[serde(deserialize_with = "req_id")]
    pub id: i64,
    #[serde(default, deserialize_with = "opt_id")]
    pub checkout_id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub financial_status: Option<String>,
    #[serde(default)]
    pub fulfillment_status: Option<String>,
    #[serde(default)]
    pub total_price: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub note_attributes: Vec<NoteAttribute>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub customer: Option<Customer>,
    #[serde(default)]
    pub shipping_address: Option<serde_json::Value>,
    #[serde(default)]
    pub cancelled_at: Option<String>,
    #[serde(default)]
    pub cancel_reason: Option<String>,
}

impl OrderPayload {
    pub fn checkout_id_str(&self) -> Option<String> {
        self.checkout_id.map(|id| id.to_string())
    }

    pub fn derived_status(&self) -> OrderStatus {
        OrderStatus::from_provider(
            self.financial_status.as_deref(),
            self.fulfillment_status.as_deref(),
            self.cancelled_at.is_some(),
        )
    }
}

/// Carried by `fulfillments/*` topics.
#[derive(Debug, Clone, Deserialize)]
pub struct FulfillmentPayload {
    #[serde(deserialize_with = "req_id")]
    pub id: i64,
    #[serde(default, deserialize_with = "opt_id")]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tracking_company: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub tracking_numbers: Vec<String>,
    #[serde(default)]
    pub tracking_url: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub tracking_urls: Vec<String>,
    #[serde(default)]
    pub shipment_status: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub line_items: Vec<LineItem>,
}

impl FulfillmentPayload {
    pub fn tracking_number(&self) -> Option<String> {
        self.tracking_number
            .clone()
            .or_else(|| self.tracking_numbers.first().cloned())
    }

    pub fn tracking_url(&self) -> Option<String> {
        self.tracking_url
            .clone()
            .or_else(|| self.tracking_urls.first().cloned())
    }
}

/// One closed variant per topic, validated at the boundary.
#[derive(Debug, Clone)]
pub enum Notification {
    OrderCreated(OrderPayload),
    OrderPaid(OrderPayload),
    OrderUpdated(OrderPayload),
    OrderCancelled(OrderPayload),
    OrderFulfilled(OrderPayload),
    FulfillmentCreated(FulfillmentPayload),
    FulfillmentUpdated(FulfillmentPayload),
    Unsupported(String),
}

impl Notification {
    pub fn parse(topic: &Topic, body: &str) -> Result<Self, PipelineError> {
        let order = || -> Result<OrderPayload, PipelineError> {
            serde_json::from_str(body)
                .map_err(|e| PipelineError::Validation(format!("malformed order payload: {e}")))
        };
        let fulfillment = || -> Result<FulfillmentPayload, PipelineError> {
            serde_json::from_str(body).map_err(|e| {
                PipelineError::Validation(format!("malformed fulfillment payload: {e}"))
            })
        };

        Ok(match topic {
            Topic::OrdersCreate => Self::OrderCreated(order()?),
            Topic::OrdersPaid => Self::OrderPaid(order()?),
            Topic::OrdersUpdated => Self::OrderUpdated(order()?),
            Topic::OrdersCancelled => Self::OrderCancelled(order()?),
            Topic::OrdersFulfilled => Self::OrderFulfilled(order()?),
            Topic::FulfillmentsCreate => Self::FulfillmentCreated(fulfillment()?),
            Topic::FulfillmentsUpdate => Self::FulfillmentUpdated(fulfillment()?),
            Topic::Other(name) => Self::Unsupported(name.clone()),
        })
    }

    /// The order id the notification talks about, if it names one directly.
    pub fn order_id(&self) -> Option<i64> {
        match self {
            Self::OrderCreated(o)
            | Self::OrderPaid(o)
            | Self::OrderUpdated(o)
            | Self::OrderCancelled(o)
            | Self::OrderFulfilled(o) => Some(o.id),
            Self::FulfillmentCreated(f) | Self::FulfillmentUpdated(f) => f.order_id,
            Self::Unsupported(_) => None,
        }
    }
}

// ── Ledger ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct WebhookLogEntry {
    pub event_id: String,
    pub topic: String,
    pub webhook_id: Option<String>,
    pub shop_domain: Option<String>,
    pub shopify_order_id: Option<i64>,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub error_message: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Receipt written before any effect is attempted. Re-logging an id that is
/// already present only records the error message, and never on a row that
/// is already processed.
#[derive(Debug, Clone)]
pub struct NewWebhookLog {
    pub event_id: EventId,
    pub topic: String,
    pub webhook_id: Option<String>,
    pub shop_domain: Option<String>,
    pub shopify_order_id: Option<i64>,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub error_message: Option<String>,
}

// ── Outcome ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No local order matches any identifier in the notification.
    NotOurs,
    /// Monotonic guard refused a downgrade.
    StaleStatus {
        current: OrderStatus,
        incoming: OrderStatus,
    },
    UnsupportedTopic(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOurs => write!(f, "order not tracked by this marketplace, skipped"),
            Self::StaleStatus { current, incoming } => {
                write!(f, "stale status {incoming} ignored, order is {current}")
            }
            Self::UnsupportedTopic(t) => write!(f, "unsupported topic {t}, skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessResult {
    Applied {
        shopify_order_id: i64,
        message: &'static str,
    },
    Skipped(SkipReason),
    /// Event id already fully processed.
    Duplicate,
}

impl ProcessResult {
    pub fn message(&self) -> String {
        match self {
            Self::Applied { message, .. } => (*message).to_string(),
            Self::Skipped(reason) => reason.to_string(),
            Self::Duplicate => "event already processed".to_string(),
        }
    }
}

// ── Serde helpers ───────────────────────────────────────────────────────────

/// Provider ids arrive as numbers, numeric strings, or null.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Num(i64),
    Text(String),
}

fn opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    match Option::<RawId>::deserialize(d)? {
        None => Ok(None),
        Some(RawId::Num(n)) => Ok(Some(n)),
        Some(RawId::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(RawId::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid id: {s:?}"))),
    }
}

fn req_id<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    opt_id(d)?.ok_or_else(|| serde::de::Error::custom("id is required"))
}

fn nullable_vec<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(d)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_order_with_string_ids_and_nulls() {
        let body = r#"{"id":"1001","checkout_id":null,"note_attributes":null,"line_items":[{"id":1,"properties":null}]}"#;
        let n = Notification::parse(&Topic::OrdersPaid, body).unwrap();
        match n {
            Notification::OrderPaid(o) => {
                assert_eq!(o.id, 1001);
                assert!(o.checkout_id.is_none());
                assert!(o.note_attributes.is_empty());
                assert!(o.line_items[0].properties.is_empty());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn order_without_id_is_a_validation_error() {
        let err = Notification::parse(&Topic::OrdersPaid, r#"{"email":"a@b.c"}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn updated_payload_derives_lifecycle_status() {
        let derive = |body: &str| match Notification::parse(&Topic::OrdersUpdated, body).unwrap() {
            Notification::OrderUpdated(o) => o.derived_status(),
            other => panic!("unexpected: {other:?}"),
        };
        assert_eq!(derive(r#"{"id":1,"financial_status":"paid"}"#), OrderStatus::Paid);
        assert_eq!(
            derive(r#"{"id":1,"financial_status":"paid","fulfillment_status":"fulfilled"}"#),
            OrderStatus::Fulfilled
        );
        assert_eq!(derive(r#"{"id":1,"financial_status":"voided"}"#), OrderStatus::Cancelled);
        assert_eq!(
            derive(r#"{"id":1,"financial_status":"paid","cancelled_at":"2025-03-01T00:00:00Z"}"#),
            OrderStatus::Cancelled
        );
        assert_eq!(derive(r#"{"id":1}"#), OrderStatus::Pending);
    }

    #[test]
    fn unknown_topic_is_unsupported_without_parsing() {
        let n = Notification::parse(&Topic::parse("products/update"), "not json").unwrap();
        assert!(matches!(n, Notification::Unsupported(t) if t == "products/update"));
    }
}

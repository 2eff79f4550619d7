//! Maps the provider's identifier spaces (order id, checkout id, fulfillment
//! id, note fields) onto local orders.

use {
    crate::domain::{
        error::PipelineError,
        id::{EventId, ListingId, WalletAddress},
        money::{Currency, MoneyAmount},
        order::{NewOrder, Order, OrderStatus, WebhookEvent},
        provider::FulfillmentLookup,
        store::Store,
        webhook::{FulfillmentPayload, LineItem, OrderPayload, Topic},
    },
    regex::Regex,
    std::sync::LazyLock,
    uuid::Uuid,
};

type Pattern = LazyLock<Result<Regex, regex::Error>>;

static TITLE_LISTING: Pattern = LazyLock::new(|| Regex::new(r"(?i)\[listing:([a-z0-9_-]+)\]"));
static NOTE_LISTING: Pattern = LazyLock::new(|| Regex::new(r"(?i)listing[_-]?id:?\s*([a-z0-9_-]+)"));
static NOTE_WALLET: Pattern =
    LazyLock::new(|| Regex::new(r"(?i)wallet[_-]?address:?\s*(0x[a-f0-9]{40})\b"));
static CUSTOMER_WALLET: Pattern = LazyLock::new(|| Regex::new(r"(?i)wallet:?\s*(0x[a-f0-9]{40})\b"));

/// First capture group of `pattern` in `text`.
fn first_capture(pattern: &Pattern, text: &str) -> Option<String> {
    let re = pattern.as_ref().ok()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

const LISTING_SKU_PREFIX: &str = "listing-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedBy {
    OrderId,
    CheckoutId,
    ProviderLookup,
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Found { order: Order, matched_by: MatchedBy },
    /// Not an order this marketplace tracks. A valid outcome, not an error.
    NotOurs,
}

/// Outcome of deriving a creation record from an order payload.
#[derive(Debug, Clone)]
pub enum Derivation {
    Derived(Box<NewOrder>),
    /// No listing reference, or one naming a listing this marketplace does
    /// not hold. Carries the reason for logs and the 400 body.
    Unlinked(String),
}

// ── Forward derivation from payload fields ──────────────────────────────────

fn property_listing_id(item: &LineItem) -> Option<ListingId> {
    item.properties
        .iter()
        .filter(|p| p.name == "listing_id" || p.name == "Listing ID")
        .find_map(|p| p.value_str())
        .and_then(|v| ListingId::new(v).ok())
}

fn sku_listing_id(item: &LineItem) -> Option<ListingId> {
    item.sku
        .as_deref()
        .and_then(|sku| sku.strip_prefix(LISTING_SKU_PREFIX))
        .and_then(|id| ListingId::new(id).ok())
}

fn title_listing_id(item: &LineItem) -> Option<ListingId> {
    [item.title.as_deref(), item.name.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|t| first_capture(&TITLE_LISTING, t))
        .and_then(|id| ListingId::new(id).ok())
}

/// Listing reference of a single line item: properties, then SKU, then title marker.
pub fn line_item_listing_id(item: &LineItem) -> Option<ListingId> {
    property_listing_id(item)
        .or_else(|| sku_listing_id(item))
        .or_else(|| title_listing_id(item))
}

/// Listing reference for an order. First match wins, in priority order:
/// note attribute, line-item property, `listing-` SKU, `[listing:…]` title
/// marker, free-text order note.
pub fn extract_listing_id(order: &OrderPayload) -> Option<ListingId> {
    let from_attributes = order
        .note_attributes
        .iter()
        .filter(|a| a.name == "listing_id")
        .find_map(|a| a.value_str())
        .and_then(|v| ListingId::new(v).ok());

    from_attributes
        .or_else(|| order.line_items.iter().find_map(property_listing_id))
        .or_else(|| order.line_items.iter().find_map(sku_listing_id))
        .or_else(|| order.line_items.iter().find_map(title_listing_id))
        .or_else(|| {
            order
                .note
                .as_deref()
                .and_then(|n| first_capture(&NOTE_LISTING, n))
                .and_then(|id| ListingId::new(id).ok())
        })
}

/// Purchaser wallet: note attribute, then order note, then customer note.
/// Absence degrades to the `unknown` placeholder so the order is never lost.
pub fn extract_purchaser(order: &OrderPayload) -> WalletAddress {
    // Same strict form the claim check parses, so a stored purchaser can
    // always claim. Malformed candidates fall through to the next layer.
    let valid = |raw: &str| WalletAddress::parse(raw).ok();

    let from_attributes = order
        .note_attributes
        .iter()
        .filter(|a| a.name == "wallet_address")
        .filter_map(|a| a.value_str())
        .find_map(|v| valid(&v));

    from_attributes
        .or_else(|| {
            order
                .note
                .as_deref()
                .and_then(|n| first_capture(&NOTE_WALLET, n))
                .and_then(|w| valid(&w))
        })
        .or_else(|| {
            order
                .customer
                .as_ref()
                .and_then(|c| c.note.as_deref())
                .and_then(|n| first_capture(&CUSTOMER_WALLET, n))
                .and_then(|w| valid(&w))
        })
        .unwrap_or_else(WalletAddress::unknown)
}

// ── Resolver ────────────────────────────────────────────────────────────────

pub struct IdentityResolver<'a> {
    store: &'a dyn Store,
    lookup: &'a dyn FulfillmentLookup,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(store: &'a dyn Store, lookup: &'a dyn FulfillmentLookup) -> Self {
        Self { store, lookup }
    }

    /// Steps 1–2: exact order id, then the same value as a checkout id, then
    /// the explicit checkout id if one is known.
    async fn local_lookup(
        &self,
        order_id: Option<i64>,
        checkout_id: Option<&str>,
    ) -> Result<Option<(Order, MatchedBy)>, PipelineError> {
        if let Some(id) = order_id {
            if let Some(order) = self.store.find_order_by_order_id(id).await? {
                return Ok(Some((order, MatchedBy::OrderId)));
            }
            let as_checkout = id.to_string();
            if let Some(order) = self.store.find_order_by_checkout_id(&as_checkout).await? {
                return Ok(Some((order, MatchedBy::CheckoutId)));
            }
        }
        if let Some(checkout) = checkout_id {
            if let Some(order) = self.store.find_order_by_checkout_id(checkout).await? {
                return Ok(Some((order, MatchedBy::CheckoutId)));
            }
        }
        Ok(None)
    }

    pub async fn resolve_order(&self, order: &OrderPayload) -> Result<Resolution, PipelineError> {
        let checkout = order.checkout_id_str();
        Ok(
            match self.local_lookup(Some(order.id), checkout.as_deref()).await? {
                Some((order, matched_by)) => Resolution::Found { order, matched_by },
                None => Resolution::NotOurs,
            },
        )
    }

    /// Full fallback chain for fulfillment-shaped notifications, including the
    /// provider round-trip when both local lookups miss.
    pub async fn resolve_fulfillment(
        &self,
        fulfillment: &FulfillmentPayload,
    ) -> Result<Resolution, PipelineError> {
        if let Some((order, matched_by)) = self.local_lookup(fulfillment.order_id, None).await? {
            return Ok(Resolution::Found { order, matched_by });
        }

        tracing::info!(
            fulfillment_id = fulfillment.id,
            order_id = ?fulfillment.order_id,
            fallback = true,
            "local lookups missed, asking provider for fulfillment linkage"
        );
        let Some(details) = self.lookup.fulfillment_details(fulfillment.id).await? else {
            return Ok(Resolution::NotOurs);
        };

        let linked = self
            .local_lookup(
                details.order.numeric_id(),
                details.order.checkout_id.as_deref(),
            )
            .await?;
        Ok(match linked {
            Some((order, _)) => Resolution::Found {
                order,
                matched_by: MatchedBy::ProviderLookup,
            },
            None => Resolution::NotOurs,
        })
    }

    /// Creator wallet of a listing, `None` when the listing does not exist.
    /// A listing without a linked user yields the placeholder.
    pub async fn resolve_creator(
        &self,
        listing_id: &ListingId,
    ) -> Result<Option<WalletAddress>, PipelineError> {
        let Some(listing) = self.store.get_listing(listing_id).await? else {
            return Ok(None);
        };
        Ok(Some(match listing.owner_wallet_address {
            Some(wallet) => wallet,
            None => {
                tracing::warn!(listing_id = %listing_id, "no creator linked to listing");
                WalletAddress::unknown()
            }
        }))
    }

    /// Builds the creation record for an order notification. Missing linkage
    /// is [`Derivation::Unlinked`]; a price or currency the record cannot
    /// hold is a validation error.
    pub async fn derive_new_order(
        &self,
        order: &OrderPayload,
        raw: &serde_json::Value,
        topic: &Topic,
        event_id: &EventId,
        status: OrderStatus,
    ) -> Result<Derivation, PipelineError> {
        let Some(listing_id) = extract_listing_id(order) else {
            return Ok(Derivation::Unlinked("could not identify marketplace listing".into()));
        };
        let Some(creator) = self.resolve_creator(&listing_id).await? else {
            return Ok(Derivation::Unlinked(format!(
                "could not identify listing creator for listing {listing_id}"
            )));
        };
        let purchaser = extract_purchaser(order);
        if purchaser.is_unknown() {
            tracing::warn!(order_id = order.id, "no purchaser wallet in order, using placeholder");
        }

        let total_price = match order.total_price.as_deref() {
            Some(raw) => MoneyAmount::parse_decimal(raw)?,
            None => MoneyAmount::ZERO,
        };
        let currency = match order.currency.as_deref() {
            Some(code) => Currency::try_from(code)?,
            None => Currency::usd(),
        };

        Ok(Derivation::Derived(Box::new(NewOrder {
            id: Uuid::now_v7(),
            shopify_order_id: order.id,
            shopify_checkout_id: order.checkout_id_str(),
            listing_id: Some(listing_id),
            purchaser_wallet_address: purchaser,
            creator_wallet_address: creator,
            order_status: status,
            financial_status: order.financial_status.clone(),
            fulfillment_status: Some(
                order
                    .fulfillment_status
                    .clone()
                    .unwrap_or_else(|| "unfulfilled".to_string()),
            ),
            total_price,
            currency,
            shopify_customer_id: order.customer.as_ref().and_then(|c| c.id),
            shopify_customer_email: order
                .email
                .clone()
                .or_else(|| order.customer.as_ref().and_then(|c| c.email.clone())),
            shipping_address: order.shipping_address.clone(),
            line_items: raw
                .get("line_items")
                .cloned()
                .unwrap_or(serde_json::Value::Array(Vec::new())),
            webhook_events: vec![WebhookEvent::received(topic.as_str(), event_id)],
        })))
    }
}

//! Read side consumed by the wallet UI.

use {
    crate::domain::{
        error::PipelineError,
        fulfillment::FulfillmentTracking,
        id::{ListingId, WalletAddress},
        listing::Listing,
        money::MoneyAmount,
        order::{Order, OrderStatus},
        store::Store,
    },
    serde::Serialize,
    std::collections::BTreeMap,
};

#[derive(Debug, Clone, Serialize)]
pub struct ListingSummary {
    pub id: ListingId,
    pub title: String,
    pub image_url: Option<String>,
    pub price: Option<MoneyAmount>,
}

impl From<Listing> for ListingSummary {
    fn from(l: Listing) -> Self {
        Self {
            id: l.id,
            title: l.title,
            image_url: l.image_url,
            price: l.price,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub listing: Option<ListingSummary>,
    pub fulfillment_tracking: Vec<FulfillmentTracking>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserOrder {
    #[serde(flatten)]
    pub order: Order,
    pub fulfillment_tracking: Vec<FulfillmentTracking>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonthlyBucket {
    pub revenue: MoneyAmount,
    pub orders: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderAnalytics {
    pub total_revenue: MoneyAmount,
    pub total_orders: u64,
    /// Keyed by `YYYY-MM` of the order's creation date.
    pub monthly: BTreeMap<String, MonthlyBucket>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserOrders {
    pub orders: Vec<UserOrder>,
    pub analytics: OrderAnalytics,
}

/// Revenue analytics over the orders `wallet` sold that reached `paid` or
/// `fulfilled`. Purchases made by the wallet do not count.
pub fn creator_analytics(wallet: &WalletAddress, orders: &[Order]) -> OrderAnalytics {
    let mut analytics = OrderAnalytics::default();
    let settled = orders.iter().filter(|o| {
        o.creator_wallet_address.matches(wallet.as_str())
            && matches!(o.order_status, OrderStatus::Paid | OrderStatus::Fulfilled)
    });
    for order in settled {
        analytics.total_revenue = analytics.total_revenue.saturating_add(order.total_price);
        analytics.total_orders += 1;
        let bucket = analytics
            .monthly
            .entry(order.created_at.format("%Y-%m").to_string())
            .or_default();
        bucket.revenue = bucket.revenue.saturating_add(order.total_price);
        bucket.orders += 1;
    }
    analytics
}

pub async fn order_details(
    store: &dyn Store,
    shopify_order_id: i64,
) -> Result<OrderDetails, PipelineError> {
    let order = store
        .find_order_by_order_id(shopify_order_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("order {shopify_order_id}")))?;

    let listing = match &order.listing_id {
        Some(id) => store.get_listing(id).await?.map(ListingSummary::from),
        None => None,
    };
    let fulfillment_tracking = store.tracking_for_order(shopify_order_id).await?;

    Ok(OrderDetails {
        order,
        listing,
        fulfillment_tracking,
    })
}

/// Orders where `wallet` is purchaser or creator, newest first.
pub async fn user_orders(store: &dyn Store, wallet: &str) -> Result<UserOrders, PipelineError> {
    let wallet = WalletAddress::parse(wallet)?;
    let orders = store.orders_for_wallet(wallet.as_str()).await?;
    let analytics = creator_analytics(&wallet, &orders);

    let mut with_tracking = Vec::with_capacity(orders.len());
    for order in orders {
        let fulfillment_tracking = store.tracking_for_order(order.shopify_order_id).await?;
        with_tracking.push(UserOrder {
            order,
            fulfillment_tracking,
        });
    }

    Ok(UserOrders {
        orders: with_tracking,
        analytics,
    })
}

use {
    super::PgStore,
    crate::domain::{
        error::PipelineError,
        id::{ListingId, WalletAddress},
        money::{Currency, MoneyAmount},
        order::{
            NewOrder, Order, OrderStatus, StatusUpdate, StatusUpdateOutcome, UpsertOutcome,
            WebhookEvent,
        },
        store::{OrderRepo, StoreFuture},
    },
    chrono::{DateTime, Utc},
    sqlx::types::Json,
    uuid::Uuid,
};

const ORDER_COLUMNS: &str = r#"
    id, shopify_order_id, shopify_checkout_id, listing_id,
    purchaser_wallet_address, creator_wallet_address, order_status,
    financial_status, fulfillment_status, total_price_cents, currency,
    shopify_customer_id, shopify_customer_email, shipping_address, line_items,
    webhook_events, claimed_at, claim_amount_cents, created_at, updated_at
"#;

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    shopify_order_id: i64,
    shopify_checkout_id: Option<String>,
    listing_id: Option<String>,
    purchaser_wallet_address: String,
    creator_wallet_address: String,
    order_status: String,
    financial_status: Option<String>,
    fulfillment_status: Option<String>,
    total_price_cents: i64,
    currency: String,
    shopify_customer_id: Option<i64>,
    shopify_customer_email: Option<String>,
    shipping_address: Option<serde_json::Value>,
    line_items: serde_json::Value,
    webhook_events: Json<Vec<WebhookEvent>>,
    claimed_at: Option<DateTime<Utc>>,
    claim_amount_cents: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = PipelineError;

    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            shopify_order_id: r.shopify_order_id,
            shopify_checkout_id: r.shopify_checkout_id,
            listing_id: r.listing_id.map(ListingId::new).transpose()?,
            purchaser_wallet_address: WalletAddress::from_raw(r.purchaser_wallet_address),
            creator_wallet_address: WalletAddress::from_raw(r.creator_wallet_address),
            order_status: OrderStatus::try_from(r.order_status.as_str())?,
            financial_status: r.financial_status,
            fulfillment_status: r.fulfillment_status,
            total_price: MoneyAmount::new(r.total_price_cents)?,
            currency: Currency::try_from(r.currency.as_str())?,
            shopify_customer_id: r.shopify_customer_id,
            shopify_customer_email: r.shopify_customer_email,
            shipping_address: r.shipping_address,
            line_items: r.line_items,
            webhook_events: r.webhook_events.0,
            claimed_at: r.claimed_at,
            claim_amount: r.claim_amount_cents.map(MoneyAmount::new).transpose()?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

impl OrderRepo for PgStore {
    fn find_order_by_order_id(&self, shopify_order_id: i64) -> StoreFuture<'_, Option<Order>> {
        Box::pin(async move {
            let sql = format!("SELECT {ORDER_COLUMNS} FROM shopify_orders WHERE shopify_order_id = $1");
            let row = sqlx::query_as::<_, OrderRow>(&sql)
                .bind(shopify_order_id)
                .fetch_optional(&self.pool)
                .await?;
            row.map(Order::try_from).transpose()
        })
    }

    fn find_order_by_checkout_id<'a>(
        &'a self,
        checkout_id: &'a str,
    ) -> StoreFuture<'a, Option<Order>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {ORDER_COLUMNS} FROM shopify_orders WHERE shopify_checkout_id = $1 \
                 ORDER BY created_at LIMIT 1"
            );
            let row = sqlx::query_as::<_, OrderRow>(&sql)
                .bind(checkout_id)
                .fetch_optional(&self.pool)
                .await?;
            row.map(Order::try_from).transpose()
        })
    }

    fn upsert_order<'a>(&'a self, order: &'a NewOrder) -> StoreFuture<'a, UpsertOutcome> {
        Box::pin(async move {
            // The status guard and the fields that follow it only move when the
            // stored row is non-terminal and the incoming rank is not lower.
            let (id, inserted): (Uuid, bool) = sqlx::query_as(
                r#"
                INSERT INTO shopify_orders (
                    id, shopify_order_id, shopify_checkout_id, listing_id,
                    purchaser_wallet_address, creator_wallet_address,
                    order_status, status_rank, financial_status, fulfillment_status,
                    total_price_cents, currency, shopify_customer_id, shopify_customer_email,
                    shipping_address, line_items, webhook_events
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                ON CONFLICT (shopify_order_id) DO UPDATE SET
                    shopify_checkout_id = COALESCE(EXCLUDED.shopify_checkout_id, shopify_orders.shopify_checkout_id),
                    listing_id = COALESCE(shopify_orders.listing_id, EXCLUDED.listing_id),
                    purchaser_wallet_address = CASE
                        WHEN shopify_orders.purchaser_wallet_address = 'unknown'
                        THEN EXCLUDED.purchaser_wallet_address
                        ELSE shopify_orders.purchaser_wallet_address END,
                    creator_wallet_address = CASE
                        WHEN shopify_orders.creator_wallet_address = 'unknown'
                        THEN EXCLUDED.creator_wallet_address
                        ELSE shopify_orders.creator_wallet_address END,
                    order_status = CASE
                        WHEN shopify_orders.status_rank < 3 AND EXCLUDED.status_rank >= shopify_orders.status_rank
                        THEN EXCLUDED.order_status
                        ELSE shopify_orders.order_status END,
                    financial_status = CASE
                        WHEN shopify_orders.status_rank < 3 AND EXCLUDED.status_rank >= shopify_orders.status_rank
                        THEN COALESCE(EXCLUDED.financial_status, shopify_orders.financial_status)
                        ELSE shopify_orders.financial_status END,
                    fulfillment_status = CASE
                        WHEN shopify_orders.status_rank < 3 AND EXCLUDED.status_rank >= shopify_orders.status_rank
                        THEN COALESCE(EXCLUDED.fulfillment_status, shopify_orders.fulfillment_status)
                        ELSE shopify_orders.fulfillment_status END,
                    status_rank = CASE
                        WHEN shopify_orders.status_rank < 3 AND EXCLUDED.status_rank >= shopify_orders.status_rank
                        THEN EXCLUDED.status_rank
                        ELSE shopify_orders.status_rank END,
                    total_price_cents = EXCLUDED.total_price_cents,
                    currency = EXCLUDED.currency,
                    shopify_customer_id = COALESCE(EXCLUDED.shopify_customer_id, shopify_orders.shopify_customer_id),
                    shopify_customer_email = COALESCE(EXCLUDED.shopify_customer_email, shopify_orders.shopify_customer_email),
                    shipping_address = COALESCE(EXCLUDED.shipping_address, shopify_orders.shipping_address),
                    line_items = EXCLUDED.line_items,
                    updated_at = now()
                RETURNING id, (xmax = 0) AS inserted
                "#,
            )
            .bind(order.id)
            .bind(order.shopify_order_id)
            .bind(order.shopify_checkout_id.as_deref())
            .bind(order.listing_id.as_ref().map(|l| l.as_str()))
            .bind(order.purchaser_wallet_address.as_str())
            .bind(order.creator_wallet_address.as_str())
            .bind(order.order_status.as_str())
            .bind(order.order_status.rank())
            .bind(order.financial_status.as_deref())
            .bind(order.fulfillment_status.as_deref())
            .bind(order.total_price.cents())
            .bind(order.currency.as_str())
            .bind(order.shopify_customer_id)
            .bind(order.shopify_customer_email.as_deref())
            .bind(order.shipping_address.as_ref())
            .bind(&order.line_items)
            .bind(Json(&order.webhook_events))
            .fetch_one(&self.pool)
            .await?;
            Ok(UpsertOutcome { id, inserted })
        })
    }

    fn update_order_status<'a>(
        &'a self,
        update: &'a StatusUpdate,
    ) -> StoreFuture<'a, StatusUpdateOutcome> {
        Box::pin(async move {
            let row: Option<(String, bool)> = sqlx::query_as(
                r#"
                UPDATE shopify_orders
                SET order_status = CASE
                        WHEN status_rank < 3 AND status_rank <= $3 THEN $2
                        ELSE order_status
                    END,
                    status_rank = CASE
                        WHEN status_rank < 3 AND status_rank <= $3 THEN $3
                        ELSE status_rank
                    END,
                    financial_status = COALESCE($4, financial_status),
                    fulfillment_status = COALESCE($5, fulfillment_status),
                    total_price_cents = COALESCE($6, total_price_cents),
                    shopify_customer_email = COALESCE($7, shopify_customer_email),
                    updated_at = now()
                WHERE shopify_order_id = $1
                RETURNING order_status, order_status = $2 AS applied
                "#,
            )
            .bind(update.shopify_order_id)
            .bind(update.status.as_str())
            .bind(update.status.rank())
            .bind(update.financial_status.as_deref())
            .bind(update.fulfillment_status.as_deref())
            .bind(update.total_price.map(|p| p.cents()))
            .bind(update.customer_email.as_deref())
            .fetch_optional(&self.pool)
            .await?;

            Ok(match row {
                None => StatusUpdateOutcome::NoMatchingRow,
                Some((_, true)) => StatusUpdateOutcome::Updated,
                Some((current, false)) => StatusUpdateOutcome::Rejected {
                    current: OrderStatus::try_from(current.as_str())?,
                },
            })
        })
    }

    fn set_webhook_events<'a>(
        &'a self,
        shopify_order_id: i64,
        events: &'a [WebhookEvent],
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE shopify_orders SET webhook_events = $2, updated_at = now() WHERE shopify_order_id = $1",
            )
            .bind(shopify_order_id)
            .bind(Json(events))
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn claim_order<'a>(
        &'a self,
        shopify_order_id: i64,
        wallet: &'a str,
        claimed_at: DateTime<Utc>,
        amount: MoneyAmount,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                r#"
                UPDATE shopify_orders
                SET claimed_at = $3, claim_amount_cents = $4, updated_at = now()
                WHERE shopify_order_id = $1
                  AND claimed_at IS NULL
                  AND order_status = 'fulfilled'
                  AND lower(purchaser_wallet_address) = lower($2)
                "#,
            )
            .bind(shopify_order_id)
            .bind(wallet)
            .bind(claimed_at)
            .bind(amount.cents())
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn orders_for_wallet<'a>(&'a self, wallet: &'a str) -> StoreFuture<'a, Vec<Order>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {ORDER_COLUMNS} FROM shopify_orders \
                 WHERE lower(purchaser_wallet_address) = lower($1) \
                    OR lower(creator_wallet_address) = lower($1) \
                 ORDER BY created_at DESC"
            );
            let rows = sqlx::query_as::<_, OrderRow>(&sql)
                .bind(wallet)
                .fetch_all(&self.pool)
                .await?;
            rows.into_iter().map(Order::try_from).collect()
        })
    }
}

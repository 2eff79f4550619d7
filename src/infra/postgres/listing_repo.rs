use {
    super::PgStore,
    crate::domain::{
        error::PipelineError,
        id::{ListingId, WalletAddress},
        listing::{Listing, ListingSale, ListingStatus},
        money::MoneyAmount,
        store::{ListingRepo, StoreFuture},
    },
    chrono::{DateTime, Utc},
};

const LISTING_SELECT: &str = r#"
    SELECT l.id, l.title, l.description, l.price_cents, l.image_url,
           u.wallet_address AS owner_wallet_address, l.status, l.purchased_at,
           l.purchaser_email, l.purchaser_wallet_address, l.shopify_product_id,
           l.total_orders, l.total_revenue_cents, l.last_order_at
    FROM listings l
    LEFT JOIN users u ON u.id = l.ordered_by_user_id
"#;

#[derive(sqlx::FromRow)]
struct ListingRow {
    id: String,
    title: String,
    description: Option<String>,
    price_cents: Option<i64>,
    image_url: Option<String>,
    owner_wallet_address: Option<String>,
    status: String,
    purchased_at: Option<DateTime<Utc>>,
    purchaser_email: Option<String>,
    purchaser_wallet_address: Option<String>,
    shopify_product_id: Option<String>,
    total_orders: i64,
    total_revenue_cents: i64,
    last_order_at: Option<DateTime<Utc>>,
}

impl TryFrom<ListingRow> for Listing {
    type Error = PipelineError;

    fn try_from(r: ListingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ListingId::new(r.id)?,
            title: r.title,
            description: r.description,
            price: r.price_cents.map(MoneyAmount::new).transpose()?,
            image_url: r.image_url,
            owner_wallet_address: r.owner_wallet_address.map(WalletAddress::from_raw),
            status: ListingStatus::try_from(r.status.as_str())?,
            purchased_at: r.purchased_at,
            purchaser_email: r.purchaser_email,
            purchaser_wallet_address: r.purchaser_wallet_address.map(WalletAddress::from_raw),
            shopify_product_id: r.shopify_product_id,
            total_orders: r.total_orders,
            total_revenue: MoneyAmount::new(r.total_revenue_cents)?,
            last_order_at: r.last_order_at,
        })
    }
}

impl ListingRepo for PgStore {
    fn get_listing<'a>(&'a self, id: &'a ListingId) -> StoreFuture<'a, Option<Listing>> {
        Box::pin(async move {
            let sql = format!("{LISTING_SELECT} WHERE l.id = $1");
            let row = sqlx::query_as::<_, ListingRow>(&sql)
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;
            row.map(Listing::try_from).transpose()
        })
    }

    fn find_listing_by_product_id<'a>(
        &'a self,
        product_id: &'a str,
    ) -> StoreFuture<'a, Option<Listing>> {
        Box::pin(async move {
            let sql = format!("{LISTING_SELECT} WHERE l.shopify_product_id = $1 LIMIT 1");
            let row = sqlx::query_as::<_, ListingRow>(&sql)
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;
            row.map(Listing::try_from).transpose()
        })
    }

    fn mark_listing_sold<'a>(&'a self, sale: &'a ListingSale) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                r#"
                UPDATE listings
                SET status = 'sold',
                    purchased_at = $2,
                    purchaser_email = $3,
                    purchaser_wallet_address = $4,
                    updated_at = now()
                WHERE id = $1 AND status <> 'sold'
                "#,
            )
            .bind(sale.listing_id.as_str())
            .bind(sale.purchased_at)
            .bind(sale.purchaser_email.as_deref())
            .bind(sale.purchaser_wallet_address.as_ref().map(|w| w.as_str()))
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn restore_listing<'a>(&'a self, id: &'a ListingId) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                r#"
                UPDATE listings
                SET status = 'available',
                    purchased_at = NULL,
                    purchaser_email = NULL,
                    purchaser_wallet_address = NULL,
                    updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn set_listing_product_id<'a>(
        &'a self,
        id: &'a ListingId,
        product_id: &'a str,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE listings SET shopify_product_id = $2, updated_at = now() WHERE id = $1",
            )
            .bind(id.as_str())
            .bind(product_id)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn record_listing_order<'a>(
        &'a self,
        id: &'a ListingId,
        amount: MoneyAmount,
        at: DateTime<Utc>,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                r#"
                UPDATE listings
                SET total_orders = total_orders + 1,
                    total_revenue_cents = total_revenue_cents + $2,
                    last_order_at = $3,
                    updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(id.as_str())
            .bind(amount.cents())
            .bind(at)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        })
    }
}

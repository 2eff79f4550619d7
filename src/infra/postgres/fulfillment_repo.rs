use {
    super::PgStore,
    crate::domain::{
        error::PipelineError,
        fulfillment::{FulfillmentTracking, LocationUpdate, NewFulfillmentTracking, ShipmentStatus},
        store::{FulfillmentRepo, StoreFuture},
    },
    chrono::{DateTime, Utc},
    sqlx::types::Json,
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct TrackingRow {
    id: Uuid,
    shopify_order_id: i64,
    shopify_fulfillment_id: i64,
    tracking_company: Option<String>,
    tracking_number: Option<String>,
    tracking_url: Option<String>,
    shipment_status: String,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    location_updates: Json<Vec<LocationUpdate>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TrackingRow> for FulfillmentTracking {
    type Error = PipelineError;

    fn try_from(r: TrackingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            shopify_order_id: r.shopify_order_id,
            shopify_fulfillment_id: r.shopify_fulfillment_id,
            tracking_company: r.tracking_company,
            tracking_number: r.tracking_number,
            tracking_url: r.tracking_url,
            shipment_status: ShipmentStatus::try_from(r.shipment_status.as_str())?,
            shipped_at: r.shipped_at,
            delivered_at: r.delivered_at,
            location_updates: r.location_updates.0,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

impl FulfillmentRepo for PgStore {
    fn upsert_fulfillment_tracking<'a>(
        &'a self,
        tracking: &'a NewFulfillmentTracking,
    ) -> StoreFuture<'a, Uuid> {
        Box::pin(async move {
            // Location entries are appended one by one, skipping any the row
            // already holds, so replaying an update is a no-op.
            let id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO fulfillment_tracking (
                    id, shopify_order_id, shopify_fulfillment_id, tracking_company,
                    tracking_number, tracking_url, shipment_status, shipped_at,
                    delivered_at, location_updates
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (shopify_fulfillment_id) DO UPDATE SET
                    shopify_order_id = EXCLUDED.shopify_order_id,
                    tracking_company = COALESCE(EXCLUDED.tracking_company, fulfillment_tracking.tracking_company),
                    tracking_number = COALESCE(EXCLUDED.tracking_number, fulfillment_tracking.tracking_number),
                    tracking_url = COALESCE(EXCLUDED.tracking_url, fulfillment_tracking.tracking_url),
                    shipment_status = EXCLUDED.shipment_status,
                    shipped_at = COALESCE(fulfillment_tracking.shipped_at, EXCLUDED.shipped_at),
                    delivered_at = COALESCE(EXCLUDED.delivered_at, fulfillment_tracking.delivered_at),
                    location_updates = fulfillment_tracking.location_updates || COALESCE((
                        SELECT jsonb_agg(u)
                        FROM jsonb_array_elements(EXCLUDED.location_updates) AS u
                        WHERE NOT fulfillment_tracking.location_updates @> jsonb_build_array(u)
                    ), '[]'::jsonb),
                    updated_at = now()
                RETURNING id
                "#,
            )
            .bind(tracking.id)
            .bind(tracking.shopify_order_id)
            .bind(tracking.shopify_fulfillment_id)
            .bind(tracking.tracking_company.as_deref())
            .bind(tracking.tracking_number.as_deref())
            .bind(tracking.tracking_url.as_deref())
            .bind(tracking.shipment_status.as_str())
            .bind(tracking.shipped_at)
            .bind(tracking.delivered_at)
            .bind(Json(&tracking.location_updates))
            .fetch_one(&self.pool)
            .await?;
            Ok(id)
        })
    }

    fn tracking_for_order(
        &self,
        shopify_order_id: i64,
    ) -> StoreFuture<'_, Vec<FulfillmentTracking>> {
        Box::pin(async move {
            let rows = sqlx::query_as::<_, TrackingRow>(
                r#"
                SELECT id, shopify_order_id, shopify_fulfillment_id, tracking_company,
                       tracking_number, tracking_url, shipment_status, shipped_at,
                       delivered_at, location_updates, created_at, updated_at
                FROM fulfillment_tracking
                WHERE shopify_order_id = $1
                ORDER BY created_at
                "#,
            )
            .bind(shopify_order_id)
            .fetch_all(&self.pool)
            .await?;
            rows.into_iter().map(FulfillmentTracking::try_from).collect()
        })
    }
}

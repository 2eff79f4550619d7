use {
    crate::domain::{
        error::PipelineError,
        fulfillment::{LocationUpdate, NewFulfillmentTracking, ShipmentStatus},
        store::Store,
        webhook::FulfillmentPayload,
    },
    chrono::Utc,
    uuid::Uuid,
};

/// Provider fulfillment status that means the shipment left the warehouse.
pub const FULFILLMENT_SUCCESS: &str = "success";

/// Builds the tracking record for a fulfillment notification resolved to
/// `shopify_order_id`. Updates also carry a location entry stamped with the
/// provider's own `updated_at`, so a replay produces an identical entry
/// that the store skips.
pub fn tracking_record(
    payload: &FulfillmentPayload,
    shopify_order_id: i64,
    with_location: bool,
) -> NewFulfillmentTracking {
    let shipment_status = ShipmentStatus::from_provider(payload.shipment_status.as_deref());

    let location_updates = if with_location {
        let raw = payload
            .shipment_status
            .clone()
            .unwrap_or_else(|| shipment_status.as_str().to_string());
        vec![LocationUpdate {
            timestamp: payload
                .updated_at
                .or(payload.created_at)
                .unwrap_or_else(Utc::now),
            location: payload.tracking_company.clone().unwrap_or_default(),
            description: format!("Shipment status: {raw}"),
            status: raw,
        }]
    } else {
        Vec::new()
    };

    NewFulfillmentTracking {
        id: Uuid::now_v7(),
        shopify_order_id,
        shopify_fulfillment_id: payload.id,
        tracking_company: payload.tracking_company.clone(),
        tracking_number: payload.tracking_number(),
        tracking_url: payload.tracking_url(),
        shipment_status,
        shipped_at: payload.created_at,
        delivered_at: None,
        location_updates,
    }
}

pub struct FulfillmentTracker<'a> {
    store: &'a dyn Store,
}

impl<'a> FulfillmentTracker<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, tracking: &NewFulfillmentTracking) -> Result<Uuid, PipelineError> {
        let id = self.store.upsert_fulfillment_tracking(tracking).await?;
        tracing::info!(
            shopify_order_id = tracking.shopify_order_id,
            fulfillment_id = tracking.shopify_fulfillment_id,
            shipment_status = %tracking.shipment_status,
            "fulfillment tracking upserted"
        );
        Ok(id)
    }
}

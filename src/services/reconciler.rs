use {
    super::{effects::Effects, resolver::line_item_listing_id},
    crate::domain::{
        error::{ClaimError, ClaimRejection, PipelineError},
        id::{ListingId, WalletAddress},
        listing::ListingSale,
        order::{ClaimRecord, NewOrder, Order, StatusUpdate, StatusUpdateOutcome, UpsertOutcome},
        store::Store,
        webhook::OrderPayload,
    },
    chrono::Utc,
    std::collections::BTreeSet,
};

/// Applies notification effects to the order record and the listings it
/// touches. Every write is an upsert or a guarded single-row update, so a
/// concurrent or repeated application converges on the same row.
pub struct OrderReconciler<'a> {
    store: &'a dyn Store,
}

impl<'a> OrderReconciler<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Insert-or-update on `shopify_order_id`. A fresh insert carrying a
    /// listing and a price also bumps the listing's order statistics as a
    /// secondary effect, so replays never double-count revenue.
    pub async fn upsert_order(
        &self,
        order: &NewOrder,
        effects: &mut Effects,
    ) -> Result<UpsertOutcome, PipelineError> {
        let outcome = self.store.upsert_order(order).await?;
        tracing::info!(
            shopify_order_id = order.shopify_order_id,
            inserted = outcome.inserted,
            status = %order.order_status,
            "order upserted"
        );

        if outcome.inserted && order.total_price.cents() > 0 {
            if let Some(listing_id) = &order.listing_id {
                effects.secondary(
                    "listing_stats",
                    self.store
                        .record_listing_order(listing_id, order.total_price, Utc::now())
                        .await,
                );
            }
        }
        Ok(outcome)
    }

    /// Guarded partial update. Only the status is held back by the guard;
    /// supplied fields land either way. `Rejected` with the same status as
    /// requested is folded into `Updated`: the order is already where the
    /// notification wants it.
    pub async fn update_order_status(
        &self,
        update: &StatusUpdate,
    ) -> Result<StatusUpdateOutcome, PipelineError> {
        let outcome = self.store.update_order_status(update).await?;
        match outcome {
            StatusUpdateOutcome::Rejected { current } if current == update.status => {
                Ok(StatusUpdateOutcome::Updated)
            }
            StatusUpdateOutcome::Rejected { current } => {
                tracing::warn!(
                    shopify_order_id = update.shopify_order_id,
                    current = %current,
                    incoming = %update.status,
                    "refusing status downgrade"
                );
                Ok(outcome)
            }
            other => Ok(other),
        }
    }

    /// Commits a listing as sold. A listing that is already sold is left
    /// untouched so the first purchase attribution sticks.
    pub async fn mark_listing_sold(
        &self,
        listing_id: &ListingId,
        purchaser_email: Option<String>,
        purchaser_wallet: &WalletAddress,
    ) -> Result<bool, PipelineError> {
        let sale = ListingSale {
            listing_id: listing_id.clone(),
            purchased_at: Utc::now(),
            purchaser_email,
            purchaser_wallet_address: (!purchaser_wallet.is_unknown())
                .then(|| purchaser_wallet.clone()),
        };
        let written = self.store.mark_listing_sold(&sale).await?;
        if written {
            tracing::info!(listing_id = %listing_id, "listing marked sold");
        } else {
            tracing::debug!(listing_id = %listing_id, "listing already sold or missing");
        }
        Ok(written)
    }

    /// Remembers the provider product id of a listing so later cancellations
    /// can map line items back to it.
    pub async fn link_listing_product(
        &self,
        listing_id: &ListingId,
        product_id: &str,
    ) -> Result<bool, PipelineError> {
        self.store.set_listing_product_id(listing_id, product_id).await
    }

    /// Listings a cancelled order should release: each line item's own
    /// listing marker, else the listing holding its product id, plus the
    /// listing stored on the order.
    async fn listings_to_restore(
        &self,
        payload: &OrderPayload,
        stored: Option<&Order>,
        effects: &mut Effects,
    ) -> BTreeSet<ListingId> {
        let mut ids = BTreeSet::new();
        if let Some(id) = stored.and_then(|o| o.listing_id.clone()) {
            ids.insert(id);
        }
        for item in &payload.line_items {
            if let Some(id) = line_item_listing_id(item) {
                ids.insert(id);
                continue;
            }
            let Some(product_id) = item.product_id else {
                continue;
            };
            let found = effects.secondary(
                "listing_lookup",
                self.store
                    .find_listing_by_product_id(&product_id.to_string())
                    .await,
            );
            if let Some(Some(listing)) = found {
                ids.insert(listing.id);
            }
        }
        ids
    }

    /// Fan-out over the cancelled order's listings. Each restore is its own
    /// secondary effect: one failing listing does not block the others.
    /// Returns how many listings were restored.
    pub async fn restore_listings(
        &self,
        payload: &OrderPayload,
        stored: Option<&Order>,
        effects: &mut Effects,
    ) -> usize {
        let ids = self.listings_to_restore(payload, stored, effects).await;
        let mut restored = 0;
        for id in &ids {
            let result = self.store.restore_listing(id).await;
            if let Some(true) = effects.secondary("listing_restore", result) {
                tracing::info!(listing_id = %id, "listing restored to available");
                restored += 1;
            }
        }
        restored
    }

    /// One-way settlement by the purchaser. The conditional write re-checks
    /// every condition, so two racing claims cannot both succeed.
    pub async fn claim_order(
        &self,
        shopify_order_id: i64,
        wallet: &str,
    ) -> Result<ClaimRecord, ClaimError> {
        let wallet = WalletAddress::parse(wallet)
            .map_err(|_| ClaimRejection::InvalidWallet(wallet.to_string()))?;
        let order = self
            .store
            .find_order_by_order_id(shopify_order_id)
            .await?
            .ok_or(ClaimRejection::OrderNotFound)?;
        order.check_claim(wallet.as_str())?;

        let claimed_at = Utc::now();
        let amount = order.total_price;
        let claimed = self
            .store
            .claim_order(shopify_order_id, wallet.as_str(), claimed_at, amount)
            .await?;
        if !claimed {
            // Lost a race: report whatever condition now fails.
            let current = self
                .store
                .find_order_by_order_id(shopify_order_id)
                .await?
                .ok_or(ClaimRejection::OrderNotFound)?;
            current.check_claim(wallet.as_str())?;
            return Err(ClaimRejection::AlreadyClaimed.into());
        }

        tracing::info!(shopify_order_id, amount = %amount, "order claimed");
        Ok(ClaimRecord {
            order_id: shopify_order_id,
            amount,
            currency: order.currency,
            status: "completed",
            claimed_at,
        })
    }
}

use {
    super::PgStore,
    crate::domain::{
        id::EventId,
        store::{StoreFuture, WebhookLogRepo},
        webhook::{NewWebhookLog, WebhookLogEntry},
    },
    chrono::{DateTime, Utc},
};

#[derive(sqlx::FromRow)]
struct WebhookLogRow {
    event_id: String,
    topic: String,
    webhook_id: Option<String>,
    shop_domain: Option<String>,
    shopify_order_id: Option<i64>,
    payload: serde_json::Value,
    processed: bool,
    error_message: Option<String>,
    received_at: DateTime<Utc>,
}

impl From<WebhookLogRow> for WebhookLogEntry {
    fn from(r: WebhookLogRow) -> Self {
        Self {
            event_id: r.event_id,
            topic: r.topic,
            webhook_id: r.webhook_id,
            shop_domain: r.shop_domain,
            shopify_order_id: r.shopify_order_id,
            payload: r.payload,
            processed: r.processed,
            error_message: r.error_message,
            received_at: r.received_at,
        }
    }
}

impl WebhookLogRepo for PgStore {
    fn is_event_processed<'a>(&'a self, event_id: &'a EventId) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let processed: Option<bool> =
                sqlx::query_scalar("SELECT processed FROM webhook_logs WHERE event_id = $1")
                    .bind(event_id.as_str())
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(processed.unwrap_or(false))
        })
    }

    fn log_webhook_event<'a>(&'a self, entry: &'a NewWebhookLog) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            // A processed row is never touched again; an unprocessed one only
            // picks up the latest error.
            sqlx::query(
                r#"
                INSERT INTO webhook_logs
                    (event_id, topic, webhook_id, shop_domain, shopify_order_id, payload, processed, error_message)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (event_id) DO UPDATE
                    SET error_message = COALESCE(EXCLUDED.error_message, webhook_logs.error_message)
                    WHERE webhook_logs.processed = false
                "#,
            )
            .bind(entry.event_id.as_str())
            .bind(&entry.topic)
            .bind(entry.webhook_id.as_deref())
            .bind(entry.shop_domain.as_deref())
            .bind(entry.shopify_order_id)
            .bind(&entry.payload)
            .bind(entry.processed)
            .bind(entry.error_message.as_deref())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn mark_event_processed<'a>(&'a self, event_id: &'a EventId) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE webhook_logs SET processed = true WHERE event_id = $1",
            )
            .bind(event_id.as_str())
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn get_webhook_log<'a>(
        &'a self,
        event_id: &'a EventId,
    ) -> StoreFuture<'a, Option<WebhookLogEntry>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, WebhookLogRow>(
                r#"
                SELECT event_id, topic, webhook_id, shop_domain, shopify_order_id,
                       payload, processed, error_message, received_at
                FROM webhook_logs
                WHERE event_id = $1
                "#,
            )
            .bind(event_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
            Ok(row.map(WebhookLogEntry::from))
        })
    }
}

//! Postgres-backed [`Store`](crate::domain::store::Store). Every method is a
//! single statement, so per-row atomicity comes from Postgres itself.

mod fulfillment_repo;
mod listing_repo;
mod order_repo;
mod webhook_log_repo;

use sqlx::PgPool;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

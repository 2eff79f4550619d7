pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;

use {
    domain::{provider::FulfillmentLookup, store::Store},
    std::sync::Arc,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub fulfillment_lookup: Arc<dyn FulfillmentLookup>,
    /// `None` accepts unsigned webhooks (logged on every request).
    pub webhook_secret: Option<Arc<str>>,
}

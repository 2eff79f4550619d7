pub mod error;
pub mod fulfillment;
pub mod id;
pub mod listing;
pub mod money;
pub mod order;
pub mod provider;
pub mod store;
pub mod webhook;

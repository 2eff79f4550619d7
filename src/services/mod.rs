pub mod dedup;
pub mod effects;
pub mod orders_query;
pub mod reconciler;
pub mod recorder;
pub mod resolver;
pub mod signature;
pub mod tracking;
pub mod webhook_pipeline;

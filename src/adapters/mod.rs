pub mod api_errors;
pub mod orders_api;
pub mod routes;
pub mod shopify_client;
pub mod shopify_webhook;

use {crate::adapters::shopify_client::ShopifyConfig, std::env};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_API_VERSION: &str = "2024-10";
const DEFAULT_MAX_DB_CONNECTIONS: u32 = 20;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub max_db_connections: u32,
    /// `None` disables signature verification.
    pub webhook_secret: Option<String>,
    pub shopify: Option<ShopifyConfig>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_db_connections = var("MAX_DB_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_DB_CONNECTIONS);

        let shopify = match (var("SHOPIFY_STORE"), var("SHOPIFY_ADMIN_API")) {
            (Some(store), Some(admin_access_token)) => Some(ShopifyConfig {
                store: store.trim_end_matches(".myshopify.com").to_string(),
                admin_access_token,
                api_version: var("SHOPIFY_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            }),
            _ => None,
        };

        Self {
            database_url: var("DATABASE_URL"),
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            max_db_connections,
            webhook_secret: var("SHOPIFY_WEBHOOK_SECRET"),
            shopify,
        }
    }
}

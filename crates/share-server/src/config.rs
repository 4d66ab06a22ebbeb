//! Server Configuration

use std::path::PathBuf;

use share_core::money::DEFAULT_CURRENCY;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Settings read from the environment (after `.env` is loaded)
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    /// Lowercase ISO code used for payment intents
    pub currency: String,
    pub staff_token: Option<String>,
    /// JSON catalog loaded into the memory store
    pub catalog_seed_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            database_url: get("DATABASE_URL"),
            stripe_secret_key: get("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: get("STRIPE_WEBHOOK_SECRET"),
            currency: get("PAYMENT_CURRENCY")
                .map_or_else(|| DEFAULT_CURRENCY.into(), |c| c.to_lowercase()),
            staff_token: get("STAFF_API_TOKEN"),
            catalog_seed_file: get("CATALOG_SEED_FILE").map(PathBuf::from),
        }
    }

    /// Intents can be created and webhooks verified
    pub const fn stripe_configured(&self) -> bool {
        self.stripe_secret_key.is_some() && self.stripe_webhook_secret.is_some()
    }
}

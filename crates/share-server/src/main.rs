//! SHARE CRM HTTP Server
//!
//! Serves the public enrollment API, the staff booking API and the Stripe
//! webhook receiver.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use share_core::store::Store;
use share_core::MemoryStore;
use share_server::{AppState, Config, router, routes::ENDPOINTS};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    let store = open_store(&config).await?;
    tracing::info!(backend = store.backend(), "✓ Storage ready");

    if config.stripe_configured() {
        tracing::info!(currency = %config.currency, "✓ Stripe configured");
    } else {
        tracing::warn!("⚠ Stripe not configured - paid enrollments disabled");
        tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
    }
    if config.staff_token.is_none() {
        tracing::warn!("⚠ STAFF_API_TOKEN not set - staff API disabled");
    }

    let state = AppState::from_config(store, &config);
    let app = router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 SHARE CRM server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    for (route, purpose) in ENDPOINTS {
        tracing::info!("  {route:<40} - {purpose}");
    }

    axum::serve(listener, app).await?;

    Ok(())
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    #[cfg(feature = "postgres")]
    {
        if let Some(url) = &config.database_url {
            let store = share_core::store::PgStore::connect(url)
                .await
                .context("connecting to Postgres")?;
            return Ok(Arc::new(store));
        }
    }

    #[cfg(not(feature = "postgres"))]
    {
        if config.database_url.is_some() {
            tracing::warn!("⚠ DATABASE_URL ignored - built without the postgres feature");
        }
    }

    let store = match &config.catalog_seed_file {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading catalog seed {}", path.display()))?;
            let store = MemoryStore::from_seed_json(&json)?;
            tracing::info!(path = %path.display(), "Loaded catalog seed");
            store
        }
        None => {
            tracing::warn!("⚠ CATALOG_SEED_FILE not set - class catalog is empty");
            MemoryStore::new()
        }
    };

    Ok(Arc::new(store))
}

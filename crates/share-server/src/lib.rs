//! SHARE CRM HTTP server
//!
//! Axum surface over `share-core` (catalog, enrollment, bookings) and
//! `share-payments` (Stripe intents and webhooks). The binary in `main.rs`
//! only wires configuration into [`AppState`] and serves [`router`].

pub mod auth;
pub mod config;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::Config;
pub use routes::router;
pub use state::AppState;

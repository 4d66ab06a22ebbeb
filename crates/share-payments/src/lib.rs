//! # share-payments
//!
//! Stripe integration for SHARE CRM enrollments.
//!
//! - [`StripeGateway`]: creates payment intents for the booking's fee
//!   snapshot (implements [`share_core::PaymentGateway`])
//! - [`WebhookHandler`]: verifies `Stripe-Signature`, maps events and
//!   applies them through [`share_core::BookingService`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use share_payments::{StripeGateway, WebhookHandler};
//!
//! let gateway = Arc::new(StripeGateway::new(&secret_key));
//! let webhooks = WebhookHandler::new(bookings.clone(), "whsec_xxx");
//!
//! // POST /webhook
//! let outcome = webhooks.handle(&body, headers.get("stripe-signature")).await?;
//! ```

mod error;
mod intent;
mod webhook;

pub use error::{PaymentError, Result};
pub use intent::{StripeGateway, parse_currency};
pub use webhook::{
    SIGNATURE_TOLERANCE_SECS, StripeEvent, WebhookEvent, WebhookHandler, WebhookOutcome, classify,
    signature_header, verify_signature,
};

//! Stripe Payment Intents
//!
//! Embedded (Elements) flow: the server creates the intent and returns its
//! client secret; the browser confirms the card with Stripe directly.
//!
//! ```text
//! ┌──────────┐  enroll   ┌──────────┐  create intent  ┌──────────┐
//! │  Client  │──────────▶│  Server  │────────────────▶│  Stripe  │
//! │          │◀──────────│          │◀────────────────│          │
//! │          │  secret   └──────────┘   id + secret   │          │
//! │          │─────────────── confirm card ──────────▶│          │
//! └──────────┘                                       └──────────┘
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use stripe::{
    Client, CreatePaymentIntent, CreatePaymentIntentAutomaticPaymentMethods, Currency,
    PaymentIntent,
};

use share_core::gateway::{IntentMetadata, PaymentGateway, PaymentIntentHandle};
use share_core::BookingError;

use crate::error::{stripe_message, PaymentError, Result};

/// Stripe client wrapper
pub struct StripeGateway {
    client: Client,
}

impl StripeGateway {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }
}

/// Parse a lowercase ISO code (`"aud"`) into Stripe's currency enum
pub fn parse_currency(code: &str) -> Result<Currency> {
    serde_json::from_value(serde_json::Value::String(code.to_lowercase()))
        .map_err(|_| PaymentError::Config(format!("unsupported currency {code:?}")))
}

fn intent_metadata(metadata: &IntentMetadata) -> HashMap<String, String> {
    HashMap::from([
        ("class_id".to_string(), metadata.class_id.to_string()),
        ("customer_email".to_string(), metadata.customer_email.clone()),
        ("customer_name".to_string(), metadata.customer_name.clone()),
    ])
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> share_core::Result<PaymentIntentHandle> {
        let currency = parse_currency(currency).map_err(|e| BookingError::Gateway(e.to_string()))?;

        let mut params = CreatePaymentIntent::new(amount_minor, currency);
        params.metadata = Some(intent_metadata(metadata));
        params.receipt_email = Some(&metadata.customer_email);
        params.automatic_payment_methods = Some(CreatePaymentIntentAutomaticPaymentMethods {
            enabled: true,
            allow_redirects: None,
        });

        let intent = PaymentIntent::create(&self.client, params)
            .await
            .map_err(|e| BookingError::Gateway(stripe_message(&e)))?;

        let client_secret = intent
            .client_secret
            .ok_or_else(|| BookingError::Gateway("No client secret returned".into()))?;

        tracing::info!(
            intent_id = %intent.id,
            amount_minor,
            class_id = %metadata.class_id,
            "Created payment intent"
        );

        Ok(PaymentIntentHandle {
            id: intent.id.to_string(),
            client_secret,
        })
    }

    fn name(&self) -> &str {
        "Stripe"
    }
}

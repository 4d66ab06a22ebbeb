//! Payment Intent Gateway
//!
//! Creates a provider-side payment intent for a fixed amount and hands back
//! the client secret. Confirmation happens between the client and the
//! provider; the outcome arrives later as a webhook.

mod mock;

pub use mock::{GatewayRequest, MockPaymentGateway};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::ClassId;

/// Metadata attached to the intent so provider dashboards can be traced back
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentMetadata {
    pub class_id: ClassId,
    pub customer_email: String,
    pub customer_name: String,
}

/// What the client needs to confirm the payment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntentHandle {
    /// Provider intent id (`pi_...`)
    pub id: String,
    pub client_secret: String,
}

/// Payment provider client (Strategy pattern)
///
/// `share-payments` provides the Stripe implementation.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an intent for `amount_minor` units of `currency`.
    ///
    /// Fails with [`BookingError::Gateway`](crate::BookingError::Gateway)
    /// carrying the provider's message.
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntentHandle>;

    /// Provider name
    fn name(&self) -> &str;
}

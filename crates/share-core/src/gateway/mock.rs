//! Mock Payment Gateway
//!
//! For tests and local development without provider keys.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{IntentMetadata, PaymentGateway, PaymentIntentHandle};
use crate::error::{BookingError, Result};

/// A `create_intent` call as the mock saw it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: IntentMetadata,
}

/// Mock gateway that either always succeeds or always fails
#[derive(Default)]
pub struct MockPaymentGateway {
    failure: Option<String>,
    counter: AtomicU64,
    requests: Mutex<Vec<GatewayRequest>>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with this provider message
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntentHandle> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(GatewayRequest {
                amount_minor,
                currency: currency.to_string(),
                metadata: metadata.clone(),
            });
        }

        if let Some(message) = &self.failure {
            return Err(BookingError::Gateway(message.clone()));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("pi_mock_{n:06}");
        Ok(PaymentIntentHandle {
            client_secret: format!("{id}_secret_mock"),
            id,
        })
    }

    fn name(&self) -> &str {
        "MockGateway"
    }
}

//! Payment Error Types

use share_core::BookingError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Stripe API error (provider message, verbatim)
    #[error("{0}")]
    Stripe(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Applying the event to the booking store failed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Check if the provider should redeliver (webhooks) or the caller retry
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Stripe(_) | Self::Storage(_))
    }

    /// Rejected outright: redelivering the same request will not help
    pub const fn is_bad_request(&self) -> bool {
        matches!(self, Self::WebhookSignature(_) | Self::WebhookParse(_))
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &str {
        match self {
            Self::Stripe(_) => "Payment processing failed. Please try again.",
            Self::WebhookSignature(_) => "Invalid signature",
            Self::WebhookParse(_) => "Invalid payload",
            Self::Config(_) => "Service configuration error.",
            Self::Storage(_) => "An error occurred processing your request.",
        }
    }
}

impl From<BookingError> for PaymentError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Gateway(msg) => Self::Stripe(msg),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<stripe::StripeError> for PaymentError {
    fn from(err: stripe::StripeError) -> Self {
        Self::Stripe(stripe_message(&err))
    }
}

/// The provider's own message when there is one
pub(crate) fn stripe_message(err: &stripe::StripeError) -> String {
    match err {
        stripe::StripeError::Stripe(request) => request
            .message
            .clone()
            .unwrap_or_else(|| err.to_string()),
        other => other.to_string(),
    }
}

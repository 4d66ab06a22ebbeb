//! Application State

use std::sync::Arc;

use share_core::store::Store;
use share_core::{BookingService, Catalog, CustomerRegistry, EnrollmentService, PaymentGateway};
use share_payments::{StripeGateway, WebhookHandler};

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub customers: Arc<CustomerRegistry>,
    pub bookings: Arc<BookingService>,
    pub enrollments: Arc<EnrollmentService>,

    /// Webhook receiver (None if no signing secret is configured)
    pub webhooks: Option<Arc<WebhookHandler>>,

    /// Bearer token for the staff routes (None disables them)
    pub staff_token: Option<Arc<str>>,

    /// Storage backend name for `/health`
    pub storage: &'static str,
}

impl AppState {
    /// Wire every service over one store; `gateway` None disables paid enrollments
    pub fn new(store: Arc<dyn Store>, gateway: Option<Arc<dyn PaymentGateway>>, currency: &str) -> Self {
        let catalog = Arc::new(Catalog::new(store.clone()));
        let customers = Arc::new(CustomerRegistry::new(store.clone()));
        let bookings = Arc::new(BookingService::new(store.clone()));
        let enrollments = Arc::new(
            EnrollmentService::new(catalog.clone(), customers.clone(), bookings.clone(), gateway)
                .with_currency(currency),
        );

        Self {
            catalog,
            customers,
            bookings,
            enrollments,
            webhooks: None,
            staff_token: None,
            storage: store.backend(),
        }
    }

    /// Wire the state from configuration.
    ///
    /// Paid enrollments need both Stripe keys: a gateway without a webhook
    /// receiver would create intents whose outcome never arrives.
    pub fn from_config(store: Arc<dyn Store>, config: &Config) -> Self {
        let mut state = match (&config.stripe_secret_key, &config.stripe_webhook_secret) {
            (Some(key), Some(secret)) => {
                let gateway: Arc<dyn PaymentGateway> = Arc::new(StripeGateway::new(key));
                Self::new(store, Some(gateway), &config.currency).with_webhook_secret(secret.clone())
            }
            _ => Self::new(store, None, &config.currency),
        };
        if let Some(token) = &config.staff_token {
            state = state.with_staff_token(token.clone());
        }
        state
    }

    #[must_use]
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhooks = Some(Arc::new(WebhookHandler::new(self.bookings.clone(), secret)));
        self
    }

    #[must_use]
    pub fn with_staff_token(mut self, token: impl Into<String>) -> Self {
        self.staff_token = Some(Arc::from(token.into()));
        self
    }

    pub fn payments_enabled(&self) -> bool {
        self.enrollments.payments_enabled() && self.webhooks.is_some()
    }
}

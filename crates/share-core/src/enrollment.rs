//! Enrollment orchestrator
//!
//! Wizard submission → customer → booking → (paid classes) intent + pending
//! payment. Returns as soon as the client secret exists; the outcome of the
//! payment arrives later through the webhook.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::booking::{BookingService, NewBooking};
use crate::catalog::Catalog;
use crate::customers::CustomerRegistry;
use crate::error::{BookingError, Result};
use crate::gateway::{IntentMetadata, PaymentGateway};
use crate::model::{
    Booking, BookingId, BookingPaymentStatus, BookingStatus, ClassId, Customer, CustomerId,
    CustomerInput, PaqResponse, Term,
};
use crate::money::{DEFAULT_CURRENCY, to_minor_units};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentType {
    /// Free trial class, no payment
    Trial,
    /// Paid enrollment
    Direct,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRequest {
    pub class_id: ClassId,
    pub enrollment_type: EnrollmentType,
    #[serde(default)]
    pub term: Option<Term>,
    pub personal_details: CustomerInput,
    #[serde(default)]
    pub paq: Option<PaqResponse>,
}

/// Client secret and amount for a payment the client must confirm
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStart {
    pub booking_id: BookingId,
    pub client_secret: String,
    pub amount_minor: i64,
    pub currency: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentResult {
    pub customer_id: CustomerId,
    pub booking_id: BookingId,
    pub status: BookingStatus,
    pub payment_status: BookingPaymentStatus,
    pub needs_medical_clearance: bool,
    /// Present for paid enrollments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentStart>,
}

pub struct EnrollmentService {
    catalog: Arc<Catalog>,
    customers: Arc<CustomerRegistry>,
    bookings: Arc<BookingService>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    currency: String,
}

impl EnrollmentService {
    pub fn new(
        catalog: Arc<Catalog>,
        customers: Arc<CustomerRegistry>,
        bookings: Arc<BookingService>,
        gateway: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        Self {
            catalog,
            customers,
            bookings,
            gateway,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Settlement currency (ISO code, lowercase)
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into().to_lowercase();
        self
    }

    pub const fn payments_enabled(&self) -> bool {
        self.gateway.is_some()
    }

    pub async fn enroll(&self, request: EnrollmentRequest) -> Result<EnrollmentResult> {
        let is_free_trial = request.enrollment_type == EnrollmentType::Trial;

        // Fail before writing anything if the class or the gateway is missing
        let class = self.catalog.get_occurrence(&request.class_id).await?;
        if !is_free_trial && self.gateway.is_none() {
            return Err(BookingError::PaymentsDisabled);
        }

        let customer = self
            .customers
            .register(request.personal_details, request.paq)
            .await?;
        let needs_medical_clearance = customer
            .paq
            .as_ref()
            .is_some_and(PaqResponse::needs_medical_clearance);

        let booking = self
            .bookings
            .create_booking(NewBooking {
                customer_id: customer.id.clone(),
                class_id: class.id,
                term: request.term,
                is_free_trial,
            })
            .await?;

        let payment = if is_free_trial {
            None
        } else {
            Some(self.start_payment(&booking, &customer).await?)
        };

        tracing::info!(
            customer_id = %customer.id,
            booking_id = %booking.id,
            kind = ?request.enrollment_type,
            "Enrollment completed"
        );

        Ok(EnrollmentResult {
            customer_id: customer.id,
            booking_id: booking.id.clone(),
            status: booking.status(),
            payment_status: booking.payment_status(),
            needs_medical_clearance,
            payment,
        })
    }

    /// New intent for a booking whose earlier attempt failed or was abandoned
    pub async fn retry_payment(&self, booking_id: &BookingId) -> Result<PaymentStart> {
        if self.gateway.is_none() {
            return Err(BookingError::PaymentsDisabled);
        }

        let booking = self.bookings.begin_payment_attempt(booking_id).await?;
        let customer = self.customers.get(&booking.customer_id).await?;
        self.start_payment(&booking, &customer).await
    }

    async fn start_payment(&self, booking: &Booking, customer: &Customer) -> Result<PaymentStart> {
        let gateway = self.gateway.as_ref().ok_or(BookingError::PaymentsDisabled)?;
        let amount_minor = to_minor_units(booking.fee_amount)?;
        let metadata = IntentMetadata {
            class_id: booking.class_id.clone(),
            customer_email: customer.email.clone(),
            customer_name: customer.full_name(),
        };

        let intent = gateway
            .create_intent(amount_minor, &self.currency, &metadata)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    booking_id = %booking.id,
                    gateway = gateway.name(),
                    error = %e,
                    "Payment intent creation failed"
                );
            })?;
        self.bookings.attach_intent(booking, &intent).await?;

        Ok(PaymentStart {
            booking_id: booking.id.clone(),
            client_secret: intent.client_secret,
            amount_minor,
            currency: self.currency.clone(),
        })
    }
}

//! Booking service
//!
//! Storage-backed side of the state machine: staff operations, manual
//! payments, receipts and provider events.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::state::{BookingState, Decision, IgnoreReason, PaymentEvent, PaymentEventKind, transition};
use crate::error::{BookingError, Result};
use crate::gateway::PaymentIntentHandle;
use crate::model::{
    Booking, BookingId, BookingPaymentStatus, BookingStatus, ClassId, CustomerId, ManualPayment,
    Payment, PaymentId, PaymentMethod, PaymentStatus, Term,
};
use crate::money::amounts_match;
use crate::receipt::{self, ReceiptData};
use crate::store::{BookingFilter, Store};

/// Staff "create booking" form
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub customer_id: CustomerId,
    pub class_id: ClassId,
    /// Defaults to the class's own term
    #[serde(default)]
    pub term: Option<Term>,
    #[serde(default)]
    pub is_free_trial: bool,
}

/// Booking with its derived statuses, as shown to staff
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub status: BookingStatus,
    pub payment_status: BookingPaymentStatus,
}

impl From<Booking> for BookingView {
    fn from(booking: Booking) -> Self {
        Self {
            status: booking.status(),
            payment_status: booking.payment_status(),
            booking,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    pub booking: BookingView,
    pub payments: Vec<Payment>,
    /// Sum of completed payments
    pub total_paid: Decimal,
    /// Fee snapshot minus `total_paid`; negative when overpaid
    pub remaining_amount: Decimal,
}

/// What happened to a provider event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    Applied {
        booking_id: BookingId,
        state: BookingState,
        payment_status: PaymentStatus,
    },
    AlreadyApplied,
    Ignored(IgnoreReason),
    /// No payment carries this intent id
    UnknownIntent,
}

pub struct BookingService {
    store: Arc<dyn Store>,
    /// Held across every read-modify-write of booking state or a payment row
    writes: Mutex<()>,
}

impl BookingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            writes: Mutex::new(()),
        }
    }

    pub async fn get_booking(&self, id: &BookingId) -> Result<Booking> {
        self.store
            .get_booking(id)
            .await?
            .ok_or_else(|| BookingError::not_found("booking", id))
    }

    pub async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>> {
        self.store.list_bookings(filter).await
    }

    /// Create a booking for an existing customer and class.
    ///
    /// The class fee is snapshotted; free trials are zero-fee and never paid.
    pub async fn create_booking(&self, new: NewBooking) -> Result<Booking> {
        let customer = self
            .store
            .get_customer(&new.customer_id)
            .await?
            .ok_or_else(|| BookingError::not_found("customer", &new.customer_id))?;
        let class = self
            .store
            .get_occurrence(&new.class_id)
            .await?
            .ok_or_else(|| BookingError::not_found("class", &new.class_id))?;

        let term = new.term.unwrap_or(class.term);
        let booking = Booking::new(customer.id, &class, term, new.is_free_trial);
        self.store.insert_booking(&booking).await?;

        tracing::info!(
            booking_id = %booking.id,
            class_id = %booking.class_id,
            state = %booking.state,
            fee = %booking.fee_amount,
            "Booking created"
        );
        Ok(booking)
    }

    /// Record the pending provider charge for a freshly created intent.
    ///
    /// Earlier pending charges on the booking are marked cancelled, so late
    /// events for a replaced intent cannot move the booking.
    pub async fn attach_intent(&self, booking: &Booking, intent: &PaymentIntentHandle) -> Result<Payment> {
        let _guard = self.writes.lock().await;

        for mut previous in self.store.payments_for_booking(&booking.id).await? {
            if previous.payment_method == PaymentMethod::Stripe
                && previous.payment_status == PaymentStatus::Pending
            {
                previous.payment_status = PaymentStatus::Cancelled;
                self.store.update_payment(&previous).await?;
                tracing::info!(
                    booking_id = %booking.id,
                    intent_id = ?previous.transaction_id,
                    "Earlier payment attempt replaced"
                );
            }
        }

        let receipt_number = self.store.next_receipt_number().await?;
        let payment = Payment::provider_charge(
            booking.id.clone(),
            booking.fee_amount,
            intent.id.clone(),
            receipt_number,
        );
        self.store.insert_payment(&payment).await?;

        tracing::info!(
            booking_id = %booking.id,
            intent_id = %intent.id,
            receipt = %payment.receipt_number,
            "Pending payment recorded"
        );
        Ok(payment)
    }

    /// Move a booking back to awaiting payment before a new intent is created
    pub async fn begin_payment_attempt(&self, id: &BookingId) -> Result<Booking> {
        let _guard = self.writes.lock().await;
        let mut booking = self.get_booking(id).await?;
        let next = booking.state.begin_payment_attempt()?;
        if next != booking.state {
            booking.state = next;
            booking.updated_at = Utc::now();
            self.save_booking(&booking).await?;
        }
        Ok(booking)
    }

    /// Record a staff-entered payment.
    ///
    /// Overpayment is accepted; the booking becomes paid once completed
    /// payments cover the fee snapshot.
    pub async fn record_manual_payment(&self, id: &BookingId, input: ManualPayment) -> Result<Payment> {
        if input.amount <= Decimal::ZERO {
            return Err(BookingError::invalid_field("amount", "Amount must be greater than zero"));
        }

        let _guard = self.writes.lock().await;
        let mut booking = self.get_booking(id).await?;
        let paid_so_far = completed_total(&self.store.payments_for_booking(id).await?);
        let fully_paid = paid_so_far + input.amount >= booking.fee_amount;
        let next = booking.state.after_manual_payment(fully_paid)?;

        let now = Utc::now();
        let payment = Payment {
            id: PaymentId::generate(),
            booking_id: booking.id.clone(),
            amount: input.amount,
            payment_method: input.payment_method,
            payment_status: PaymentStatus::Completed,
            transaction_id: input.transaction_id.filter(|t| !t.trim().is_empty()),
            receipt_number: self.store.next_receipt_number().await?,
            payment_date: input.payment_date,
            notes: input.notes.filter(|n| !n.trim().is_empty()),
            last_event_at: None,
            created_at: now,
        };
        self.store.insert_payment(&payment).await?;

        if next != booking.state {
            booking.state = next;
            booking.updated_at = now;
            self.save_booking(&booking).await?;
        }

        tracing::info!(
            booking_id = %booking.id,
            amount = %payment.amount,
            method = payment.payment_method.as_str(),
            receipt = %payment.receipt_number,
            state = %booking.state,
            "Manual payment recorded"
        );
        Ok(payment)
    }

    pub async fn cancel_booking(&self, id: &BookingId) -> Result<Booking> {
        let _guard = self.writes.lock().await;
        let mut booking = self.get_booking(id).await?;
        let next = booking.state.cancel();
        if next != booking.state {
            booking.state = next;
            booking.updated_at = Utc::now();
            self.save_booking(&booking).await?;
            tracing::info!(booking_id = %booking.id, "Booking cancelled by staff");
        }
        Ok(booking)
    }

    /// Hard delete; payments are removed with the booking
    pub async fn delete_booking(&self, id: &BookingId) -> Result<()> {
        if !self.store.delete_booking(id).await? {
            return Err(BookingError::not_found("booking", id));
        }
        tracing::info!(booking_id = %id, "Booking deleted");
        Ok(())
    }

    pub async fn booking_details(&self, id: &BookingId) -> Result<BookingDetails> {
        let booking = self.get_booking(id).await?;
        let payments = self.store.payments_for_booking(id).await?;
        let total_paid = completed_total(&payments);

        Ok(BookingDetails {
            remaining_amount: booking.fee_amount - total_paid,
            total_paid,
            booking: booking.into(),
            payments,
        })
    }

    /// Apply a verified provider event to the payment it targets
    pub async fn apply_provider_event(&self, event: &PaymentEvent) -> Result<EventOutcome> {
        let _guard = self.writes.lock().await;

        let Some(mut payment) = self.store.find_payment_by_transaction(&event.intent_id).await? else {
            tracing::warn!(
                event_id = %event.event_id,
                intent_id = %event.intent_id,
                "No payment for intent, dropping event"
            );
            return Ok(EventOutcome::UnknownIntent);
        };
        let Some(mut booking) = self.store.get_booking(&payment.booking_id).await? else {
            tracing::warn!(
                intent_id = %event.intent_id,
                booking_id = %payment.booking_id,
                "Payment has no booking, dropping event"
            );
            return Ok(EventOutcome::UnknownIntent);
        };

        if event.kind == PaymentEventKind::IntentSucceeded {
            if let Some(received) = event.amount_minor {
                if !amounts_match(payment.amount, received) {
                    tracing::warn!(
                        intent_id = %event.intent_id,
                        expected = %payment.amount,
                        received_minor = received,
                        "Provider amount differs from fee snapshot"
                    );
                }
            }
        }

        match transition(booking.state, payment.payment_status, payment.last_event_at, event) {
            Decision::Apply {
                booking: state,
                payment: payment_status,
            } => {
                payment.payment_status = payment_status;
                payment.last_event_at = Some(
                    payment
                        .last_event_at
                        .map_or(event.occurred_at, |last| last.max(event.occurred_at)),
                );
                if !self.store.update_payment(&payment).await? {
                    return Err(BookingError::not_found("payment", &payment.id));
                }

                if state != booking.state {
                    booking.state = state;
                    booking.updated_at = Utc::now();
                    self.save_booking(&booking).await?;
                }

                tracing::info!(
                    event_id = %event.event_id,
                    kind = ?event.kind,
                    booking_id = %booking.id,
                    state = %state,
                    payment_status = payment_status.as_str(),
                    "Provider event applied"
                );
                Ok(EventOutcome::Applied {
                    booking_id: booking.id,
                    state,
                    payment_status,
                })
            }
            Decision::AlreadyApplied => {
                tracing::debug!(event_id = %event.event_id, kind = ?event.kind, "Event already applied");
                Ok(EventOutcome::AlreadyApplied)
            }
            Decision::Ignore(reason) => {
                tracing::info!(
                    event_id = %event.event_id,
                    kind = ?event.kind,
                    reason = ?reason,
                    state = %booking.state,
                    "Provider event ignored"
                );
                Ok(EventOutcome::Ignored(reason))
            }
        }
    }

    /// Gather everything printed on a payment receipt
    pub async fn receipt_for(&self, payment_id: &PaymentId) -> Result<ReceiptData> {
        let payment = self
            .store
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| BookingError::not_found("payment", payment_id))?;
        let booking = self.get_booking(&payment.booking_id).await?;
        let customer = self
            .store
            .get_customer(&booking.customer_id)
            .await?
            .ok_or_else(|| BookingError::not_found("customer", &booking.customer_id))?;
        let class = self
            .store
            .get_occurrence(&booking.class_id)
            .await?
            .ok_or_else(|| BookingError::not_found("class", &booking.class_id))?;

        Ok(ReceiptData::new(&payment, &booking, &customer, &class))
    }

    /// Render the receipt for a payment as a PDF document
    pub async fn receipt_pdf(&self, payment_id: &PaymentId) -> Result<(String, Vec<u8>)> {
        let data = self.receipt_for(payment_id).await?;
        let bytes = receipt::render_pdf(&data)?;
        Ok((data.receipt_number, bytes))
    }

    async fn save_booking(&self, booking: &Booking) -> Result<()> {
        if self.store.update_booking(booking).await? {
            Ok(())
        } else {
            Err(BookingError::not_found("booking", &booking.id))
        }
    }
}

fn completed_total(payments: &[Payment]) -> Decimal {
    payments
        .iter()
        .filter(|p| p.payment_status == PaymentStatus::Completed)
        .map(|p| p.amount)
        .sum()
}

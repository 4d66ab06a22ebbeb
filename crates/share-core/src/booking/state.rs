//! Booking lifecycle state machine
//!
//! ```text
//!                    ┌──────────────┐
//!  enroll (trial) ──▶│  FreeTrial   │ (terminal)
//!                    └──────────────┘
//!                    ┌──────────────────┐  succeeded   ┌────────┐  dispute  ┌──────────┐
//!  enroll (paid) ───▶│ AwaitingPayment  │─────────────▶│  Paid  │──────────▶│ Disputed │
//!                    └──────────────────┘              └────────┘           └──────────┘
//!                      │  ▲        │ canceled              │ refunded
//!               failed │  │ retry  ▼                       ▼
//!                    ┌───────────────┐  canceled  ┌─────────────────────┐
//!                    │ PaymentFailed │───────────▶│ Cancelled{reason}   │
//!                    └───────────────┘            └─────────────────────┘
//! ```
//!
//! Everything here is pure: storage and the provider are handled by
//! [`BookingService`](super::BookingService).
//!
//! Ordering policy for provider events on the same intent:
//! `succeeded` is authoritative and is applied whatever arrived before it;
//! a `failed` or `canceled` arriving after success is stale. Any other event
//! whose provider timestamp is older than the last applied one is ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BookingError, Result};
use crate::model::{BookingPaymentStatus, BookingStatus, PaymentStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    IntentCanceled,
    Refunded,
    Staff,
}

impl CancelReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IntentCanceled => "intent_canceled",
            Self::Refunded => "refunded",
            Self::Staff => "staff",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "intent_canceled" => Some(Self::IntentCanceled),
            "refunded" => Some(Self::Refunded),
            "staff" => Some(Self::Staff),
            _ => None,
        }
    }
}

/// Lifecycle state of a booking and its payment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookingState {
    FreeTrial,
    AwaitingPayment,
    Paid,
    PaymentFailed,
    Cancelled { reason: CancelReason },
    Disputed,
}

impl BookingState {
    pub const fn initial(is_free_trial: bool) -> Self {
        if is_free_trial {
            Self::FreeTrial
        } else {
            Self::AwaitingPayment
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FreeTrial => "free_trial",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Paid => "paid",
            Self::PaymentFailed => "payment_failed",
            Self::Cancelled { .. } => "cancelled",
            Self::Disputed => "disputed",
        }
    }

    pub const fn cancel_reason(self) -> Option<CancelReason> {
        match self {
            Self::Cancelled { reason } => Some(reason),
            _ => None,
        }
    }

    /// Rebuild from the stored `(state, cancel_reason)` columns
    pub fn from_parts(state: &str, reason: Option<&str>) -> Option<Self> {
        match state {
            "free_trial" => Some(Self::FreeTrial),
            "awaiting_payment" => Some(Self::AwaitingPayment),
            "paid" => Some(Self::Paid),
            "payment_failed" => Some(Self::PaymentFailed),
            "cancelled" => reason
                .and_then(CancelReason::parse)
                .map(|reason| Self::Cancelled { reason }),
            "disputed" => Some(Self::Disputed),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::FreeTrial | Self::Paid | Self::Cancelled { .. })
    }

    pub const fn booking_status(self) -> BookingStatus {
        match self {
            Self::FreeTrial => BookingStatus::Confirmed,
            Self::AwaitingPayment => BookingStatus::Pending,
            Self::Paid | Self::Disputed => BookingStatus::Active,
            Self::PaymentFailed | Self::Cancelled { .. } => BookingStatus::Cancelled,
        }
    }

    pub const fn payment_status(self) -> BookingPaymentStatus {
        match self {
            Self::FreeTrial => BookingPaymentStatus::NotRequired,
            Self::AwaitingPayment => BookingPaymentStatus::Pending,
            Self::Paid => BookingPaymentStatus::Paid,
            Self::PaymentFailed => BookingPaymentStatus::Failed,
            Self::Cancelled { reason: CancelReason::Refunded } => BookingPaymentStatus::Refunded,
            Self::Cancelled { .. } => BookingPaymentStatus::Cancelled,
            Self::Disputed => BookingPaymentStatus::Disputed,
        }
    }

    /// Staff recorded a completed payment; `fully_paid` means completed sum ≥ fee
    pub fn after_manual_payment(self, fully_paid: bool) -> Result<Self> {
        match self {
            Self::FreeTrial => Err(self.invalid("record a payment for")),
            Self::AwaitingPayment | Self::PaymentFailed | Self::Cancelled { .. } if fully_paid => {
                Ok(Self::Paid)
            }
            other => Ok(other),
        }
    }

    /// A new provider intent is about to be created for this booking
    pub fn begin_payment_attempt(self) -> Result<Self> {
        match self {
            Self::AwaitingPayment | Self::PaymentFailed => Ok(Self::AwaitingPayment),
            _ => Err(self.invalid("start a payment for")),
        }
    }

    /// Staff cancellation; cancelling twice is a no-op
    pub const fn cancel(self) -> Self {
        match self {
            Self::Cancelled { .. } => self,
            _ => Self::Cancelled {
                reason: CancelReason::Staff,
            },
        }
    }

    fn invalid(self, action: &'static str) -> BookingError {
        BookingError::InvalidTransition {
            state: self.as_str().to_string(),
            action,
        }
    }
}

impl std::fmt::Display for BookingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled { reason } => write!(f, "cancelled ({})", reason.as_str()),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Provider-side payment lifecycle events we react to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventKind {
    IntentSucceeded,
    IntentFailed,
    IntentCanceled,
    ChargeRefunded,
    DisputeCreated,
}

/// A verified provider event, keyed by payment-intent id
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentEvent {
    pub event_id: String,
    pub kind: PaymentEventKind,
    pub intent_id: String,
    /// Amount reported by the provider, in minor units
    pub amount_minor: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// failed/canceled after the intent already succeeded
    StaleAfterSuccess,
    /// Older than the last event applied to this payment
    OutOfOrder,
    /// Event makes no sense for the current payment (e.g. refund of an uncaptured intent)
    NotApplicable,
    /// Failure or cancellation of an attempt that a newer intent replaced
    Superseded,
}

/// Result of running an event through the transition table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Apply {
        booking: BookingState,
        payment: PaymentStatus,
    },
    AlreadyApplied,
    Ignore(IgnoreReason),
}

/// Decide how a provider event changes a booking and the payment it targets
pub fn transition(
    booking: BookingState,
    payment: PaymentStatus,
    last_event_at: Option<DateTime<Utc>>,
    event: &PaymentEvent,
) -> Decision {
    use PaymentEventKind as K;
    use PaymentStatus as P;

    let settled = matches!(payment, P::Completed | P::Refunded | P::Disputed);

    // Idempotency first: the payment row already reflects this event.
    let already = match event.kind {
        K::IntentSucceeded => settled,
        K::IntentFailed => payment == P::Failed,
        K::IntentCanceled => payment == P::Cancelled,
        K::ChargeRefunded => payment == P::Refunded,
        K::DisputeCreated => payment == P::Disputed,
    };
    if already {
        return Decision::AlreadyApplied;
    }

    if matches!(event.kind, K::IntentFailed | K::IntentCanceled) && settled {
        return Decision::Ignore(IgnoreReason::StaleAfterSuccess);
    }

    if event.kind != K::IntentSucceeded
        && last_event_at.is_some_and(|last| event.occurred_at < last)
    {
        return Decision::Ignore(IgnoreReason::OutOfOrder);
    }

    if booking == BookingState::FreeTrial {
        return Decision::Ignore(IgnoreReason::NotApplicable);
    }

    let apply = |booking, payment| Decision::Apply { booking, payment };

    match event.kind {
        K::IntentSucceeded => match booking {
            BookingState::AwaitingPayment
            | BookingState::PaymentFailed
            | BookingState::Cancelled {
                reason: CancelReason::IntentCanceled,
            } => apply(BookingState::Paid, P::Completed),
            // Booking already settled by another payment or cancelled by staff:
            // the money still arrived, so record it.
            other => apply(other, P::Completed),
        },
        // Only the attempt the booking is waiting on may move it.
        K::IntentFailed => match (booking, payment) {
            (BookingState::AwaitingPayment, P::Pending) => {
                apply(BookingState::PaymentFailed, P::Failed)
            }
            (BookingState::AwaitingPayment, _) | (_, P::Cancelled) => {
                Decision::Ignore(IgnoreReason::Superseded)
            }
            (other, _) => apply(other, P::Failed),
        },
        K::IntentCanceled => match (booking, payment) {
            (BookingState::AwaitingPayment, P::Pending)
            | (BookingState::PaymentFailed, P::Pending | P::Failed) => apply(
                BookingState::Cancelled {
                    reason: CancelReason::IntentCanceled,
                },
                P::Cancelled,
            ),
            (BookingState::AwaitingPayment, _) => Decision::Ignore(IgnoreReason::Superseded),
            (other, _) => apply(other, P::Cancelled),
        },
        K::ChargeRefunded => match (booking, payment) {
            (_, P::Pending | P::Failed | P::Cancelled) => {
                Decision::Ignore(IgnoreReason::NotApplicable)
            }
            (BookingState::Paid | BookingState::Disputed, _) => apply(
                BookingState::Cancelled {
                    reason: CancelReason::Refunded,
                },
                P::Refunded,
            ),
            (other, _) => apply(other, P::Refunded),
        },
        K::DisputeCreated => match (booking, payment) {
            (_, P::Completed) => match booking {
                BookingState::Paid => apply(BookingState::Disputed, P::Disputed),
                other => apply(other, P::Disputed),
            },
            _ => Decision::Ignore(IgnoreReason::NotApplicable),
        },
    }
}

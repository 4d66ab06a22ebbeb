//! Bookings
//!
//! [`state`] holds the pure lifecycle rules; [`BookingService`] persists them.

pub mod state;
mod service;

pub use service::{BookingDetails, BookingService, BookingView, EventOutcome, NewBooking};
pub use state::{
    BookingState, CancelReason, Decision, IgnoreReason, PaymentEvent, PaymentEventKind, transition,
};

//! # share-core
//!
//! Enrollment and booking core for SHARE CRM, a community exercise class
//! operator.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌─────────┐   ┌─────────────┐
//! │  Wizard  │──▶│ Customer │──▶│ Booking │──▶│   Gateway   │── client secret ──▶ client
//! └──────────┘   └──────────┘   └─────────┘   └─────────────┘
//!                                    ▲
//!                                    │ transition (idempotent)
//!                              ┌───────────┐
//!                  provider ──▶│  Webhook  │
//!                              └───────────┘
//! ```
//!
//! Free trials stop at the booking. Paid enrollments snapshot the class fee,
//! create a payment intent for it and return; the booking becomes paid when
//! the provider reports success.
//!
//! Storage and the payment provider are traits ([`Store`],
//! [`PaymentGateway`]) injected as `Arc` handles.

pub mod booking;
pub mod catalog;
pub mod customers;
pub mod enrollment;
pub mod error;
pub mod gateway;
pub mod model;
pub mod money;
pub mod receipt;
pub mod store;

#[cfg(test)]
mod testing;

pub use booking::{BookingService, BookingState, EventOutcome, PaymentEvent, PaymentEventKind};
pub use catalog::Catalog;
pub use customers::CustomerRegistry;
pub use enrollment::{EnrollmentRequest, EnrollmentResult, EnrollmentService, EnrollmentType};
pub use error::{BookingError, FieldError, Result};
pub use gateway::{IntentMetadata, MockPaymentGateway, PaymentGateway, PaymentIntentHandle};
pub use store::{MemoryStore, Store};

//! Storage Collaborators
//!
//! The hosted relational store is the single source of truth. Services only
//! see these traits; [`MemoryStore`] backs development and tests, `PgStore`
//! (feature `postgres`) backs production.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::Result;
use crate::model::{
    Booking, BookingId, ClassId, ClassOccurrence, ClassOccurrenceSummary, Customer, CustomerId,
    ExerciseTypeId, Payment, PaymentId,
};

/// Catalog search filters; every field is optional
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceFilter {
    /// Substring of the venue or zip code
    #[serde(default)]
    pub location: Option<String>,
    /// Exact exercise type; `"all"` means no filter
    #[serde(default)]
    pub exercise_type_id: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl OccurrenceFilter {
    /// Trimmed location, or `None` when blank
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Exercise type to filter on, treating `"all"` and blank as no filter
    pub fn exercise_type(&self) -> Option<ExerciseTypeId> {
        self.exercise_type_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
            .map(ExerciseTypeId::from)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingFilter {
    #[serde(default)]
    pub class_id: Option<ClassId>,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
}

/// Read-only class lookups
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_occurrences(&self, filter: &OccurrenceFilter) -> Result<Vec<ClassOccurrenceSummary>>;

    async fn get_occurrence(&self, id: &ClassId) -> Result<Option<ClassOccurrence>>;
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn insert_customer(&self, customer: &Customer) -> Result<()>;

    async fn get_customer(&self, id: &CustomerId) -> Result<Option<Customer>>;

    /// Returns `false` when no such customer exists
    async fn update_customer(&self, customer: &Customer) -> Result<bool>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert_booking(&self, booking: &Booking) -> Result<()>;

    async fn get_booking(&self, id: &BookingId) -> Result<Option<Booking>>;

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>>;

    /// Returns `false` when no such booking exists
    async fn update_booking(&self, booking: &Booking) -> Result<bool>;

    /// Hard delete; the booking's payments go with it
    async fn delete_booking(&self, id: &BookingId) -> Result<bool>;

    async fn insert_payment(&self, payment: &Payment) -> Result<()>;

    async fn update_payment(&self, payment: &Payment) -> Result<bool>;

    async fn get_payment(&self, id: &PaymentId) -> Result<Option<Payment>>;

    /// Payments for a booking, oldest first
    async fn payments_for_booking(&self, booking_id: &BookingId) -> Result<Vec<Payment>>;

    /// Look up a provider charge by its payment-intent id; staff-entered
    /// payments never match, whatever their reference says
    async fn find_payment_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>>;

    /// Next receipt number from an atomic sequence; never reused
    async fn next_receipt_number(&self) -> Result<String>;
}

/// Everything the booking flow needs from storage
pub trait Store: CatalogStore + CustomerStore + BookingStore {
    /// Backend name for health reporting
    fn backend(&self) -> &'static str;
}

/// Receipt numbers are zero-padded so they also sort lexically
pub fn format_receipt_number(seq: u64) -> String {
    format!("RCP-{seq:08}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exercise_type_all_means_no_filter() {
        let filter = OccurrenceFilter {
            exercise_type_id: Some("all".into()),
            ..Default::default()
        };
        assert_eq!(filter.exercise_type(), None);

        let filter = OccurrenceFilter {
            exercise_type_id: Some("yoga".into()),
            location: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(filter.exercise_type(), Some(ExerciseTypeId::from("yoga")));
        assert_eq!(filter.location(), None);
    }

    #[test]
    fn test_receipt_number_format() {
        assert_eq!(format_receipt_number(42), "RCP-00000042");
        assert!(format_receipt_number(9) < format_receipt_number(10));
    }
}

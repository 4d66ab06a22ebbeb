//! In-memory store (for development and tests)

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use super::{
    format_receipt_number, BookingFilter, BookingStore, CatalogStore, CustomerStore,
    OccurrenceFilter, Store,
};
use crate::error::{BookingError, Result};
use crate::model::{
    Booking, BookingId, ClassId, ClassOccurrence, ClassOccurrenceSummary, Customer, CustomerId,
    Payment, PaymentId, PaymentMethod,
};

/// Catalog seed file layout
#[derive(Deserialize)]
struct Seed {
    classes: Vec<ClassOccurrence>,
}

#[derive(Default)]
pub struct MemoryStore {
    classes: RwLock<HashMap<ClassId, ClassOccurrence>>,
    customers: RwLock<HashMap<CustomerId, Customer>>,
    bookings: RwLock<HashMap<BookingId, Booking>>,
    payments: RwLock<HashMap<PaymentId, Payment>>,
    receipt_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with class occurrences
    pub fn with_classes(classes: impl IntoIterator<Item = ClassOccurrence>) -> Self {
        let map = classes.into_iter().map(|c| (c.id.clone(), c)).collect();
        Self {
            classes: RwLock::new(map),
            ..Self::default()
        }
    }

    /// Create a store from a JSON catalog seed (`{"classes": [...]}`)
    pub fn from_seed_json(json: &str) -> Result<Self> {
        let seed: Seed = serde_json::from_str(json)
            .map_err(|e| BookingError::Storage(format!("invalid catalog seed: {e}")))?;
        tracing::info!(classes = seed.classes.len(), "Catalog seed loaded");
        Ok(Self::with_classes(seed.classes))
    }
}

fn matches_filter(class: &ClassOccurrence, filter: &OccurrenceFilter) -> bool {
    if let Some(location) = filter.location() {
        let needle = location.to_lowercase();
        let in_venue = class.venue.to_lowercase().contains(&needle);
        let in_zip = class
            .zip_code
            .as_deref()
            .is_some_and(|z| z.to_lowercase().contains(&needle));
        if !in_venue && !in_zip {
            return false;
        }
    }

    if let Some(exercise_type) = filter.exercise_type() {
        if class.exercise_type.id != exercise_type {
            return false;
        }
    }

    filter.date.is_none_or(|date| class.date == date)
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn find_occurrences(&self, filter: &OccurrenceFilter) -> Result<Vec<ClassOccurrenceSummary>> {
        let classes = self.classes.read().await;
        let mut found: Vec<ClassOccurrenceSummary> = classes
            .values()
            .filter(|c| matches_filter(c, filter))
            .map(ClassOccurrence::summary)
            .collect();
        found.sort_by(|a, b| (a.date, a.time, &a.name).cmp(&(b.date, b.time, &b.name)));
        Ok(found)
    }

    async fn get_occurrence(&self, id: &ClassId) -> Result<Option<ClassOccurrence>> {
        Ok(self.classes.read().await.get(id).cloned())
    }
}

#[async_trait]
impl CustomerStore for MemoryStore {
    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        self.customers
            .write()
            .await
            .insert(customer.id.clone(), customer.clone());
        Ok(())
    }

    async fn get_customer(&self, id: &CustomerId) -> Result<Option<Customer>> {
        Ok(self.customers.read().await.get(id).cloned())
    }

    async fn update_customer(&self, customer: &Customer) -> Result<bool> {
        let mut customers = self.customers.write().await;
        Ok(customers
            .get_mut(&customer.id)
            .map(|existing| *existing = customer.clone())
            .is_some())
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        self.bookings
            .write()
            .await
            .insert(booking.id.clone(), booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: &BookingId) -> Result<Option<Booking>> {
        Ok(self.bookings.read().await.get(id).cloned())
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        let mut found: Vec<Booking> = bookings
            .values()
            .filter(|b| filter.class_id.as_ref().is_none_or(|id| &b.class_id == id))
            .filter(|b| filter.customer_id.as_ref().is_none_or(|id| &b.customer_id == id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn update_booking(&self, booking: &Booking) -> Result<bool> {
        let mut bookings = self.bookings.write().await;
        Ok(bookings
            .get_mut(&booking.id)
            .map(|existing| *existing = booking.clone())
            .is_some())
    }

    async fn delete_booking(&self, id: &BookingId) -> Result<bool> {
        // Lock order: bookings, then payments
        let mut bookings = self.bookings.write().await;
        let mut payments = self.payments.write().await;

        let removed = bookings.remove(id).is_some();
        if removed {
            payments.retain(|_, p| &p.booking_id != id);
        }
        Ok(removed)
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        self.payments
            .write()
            .await
            .insert(payment.id.clone(), payment.clone());
        Ok(())
    }

    async fn update_payment(&self, payment: &Payment) -> Result<bool> {
        let mut payments = self.payments.write().await;
        Ok(payments
            .get_mut(&payment.id)
            .map(|existing| *existing = payment.clone())
            .is_some())
    }

    async fn get_payment(&self, id: &PaymentId) -> Result<Option<Payment>> {
        Ok(self.payments.read().await.get(id).cloned())
    }

    async fn payments_for_booking(&self, booking_id: &BookingId) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        let mut found: Vec<Payment> = payments
            .values()
            .filter(|p| &p.booking_id == booking_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.receipt_number.cmp(&b.receipt_number));
        Ok(found)
    }

    async fn find_payment_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments
            .values()
            .find(|p| {
                p.payment_method == PaymentMethod::Stripe
                    && p.transaction_id.as_deref() == Some(transaction_id)
            })
            .cloned())
    }

    async fn next_receipt_number(&self) -> Result<String> {
        let seq = self.receipt_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format_receipt_number(seq))
    }
}

impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }
}

//! Class Catalog
//!
//! Public, read-only search over scheduled class occurrences.

use std::sync::Arc;

use crate::error::{BookingError, Result};
use crate::model::{ClassId, ClassOccurrence, ClassOccurrenceSummary};
use crate::store::{OccurrenceFilter, Store};

pub struct Catalog {
    store: Arc<dyn Store>,
}

impl Catalog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Search occurrences, ordered by date, time and name.
    /// No match is an empty list, not an error.
    pub async fn find_occurrences(&self, filter: &OccurrenceFilter) -> Result<Vec<ClassOccurrenceSummary>> {
        let found = self.store.find_occurrences(filter).await?;
        tracing::debug!(
            location = filter.location(),
            exercise_type = ?filter.exercise_type(),
            date = ?filter.date,
            count = found.len(),
            "Catalog search"
        );
        Ok(found)
    }

    pub async fn get_occurrence(&self, id: &ClassId) -> Result<ClassOccurrence> {
        self.store
            .get_occurrence(id)
            .await?
            .ok_or_else(|| BookingError::not_found("class", id))
    }
}

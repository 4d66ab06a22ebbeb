//! Shared fixtures for unit tests

use chrono::{NaiveDate, NaiveTime};
use rust_decimal_macros::dec;
use std::sync::Arc;

use crate::model::{
    ClassId, ClassOccurrence, Customer, CustomerInput, ExerciseType, ExerciseTypeId, Instructor,
    InstructorId, Term,
};
use crate::store::{CustomerStore, MemoryStore};

pub fn class(id: &str, name: &str, venue: &str, zip: &str) -> ClassOccurrence {
    ClassOccurrence {
        id: ClassId::from(id),
        code: format!("CLS-{id}"),
        name: name.to_string(),
        exercise_type: ExerciseType {
            id: ExerciseTypeId::from("strength"),
            name: "Strength & Balance".into(),
        },
        venue: venue.to_string(),
        address: "1 Main St".into(),
        zip_code: Some(zip.to_string()),
        date: NaiveDate::from_ymd_opt(2025, 2, 3).unwrap(),
        time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        instructor: Instructor {
            id: InstructorId::from("ins-1"),
            name: "Pat Morgan".into(),
        },
        fee_criteria: "Per term".into(),
        fee_amount: dec!(45.00),
        term: Term::Term1,
    }
}

pub fn customer_input() -> CustomerInput {
    CustomerInput {
        first_name: "Jane".into(),
        last_name: "Citizen".into(),
        email: "Jane@Example.com".into(),
        phone: "0400123456".into(),
        date_of_birth: NaiveDate::from_ymd_opt(1950, 6, 1).unwrap(),
        address: "12 Elm St".into(),
        suburb: Some("Footscray".into()),
        post_code: Some("3011".into()),
        emergency_contact: "John Citizen".into(),
        emergency_phone: "0400654321".into(),
        medical_conditions: None,
    }
}

pub fn customer() -> Customer {
    Customer::new(customer_input(), None)
}

/// Memory store holding class `42` and one registered customer
pub async fn seeded() -> (Arc<MemoryStore>, Customer, ClassOccurrence) {
    let class = class("42", "Chair Yoga", "Footscray Community Hall", "3011");
    let store = Arc::new(MemoryStore::with_classes([class.clone()]));
    let customer = customer();
    store.insert_customer(&customer).await.unwrap();
    (store, customer, class)
}

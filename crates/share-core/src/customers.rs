//! Customer Registry

use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

use crate::error::{BookingError, Result};
use crate::model::{Customer, CustomerId, CustomerInput, CustomerStatus, PaqResponse};
use crate::store::Store;

pub struct CustomerRegistry {
    store: Arc<dyn Store>,
}

impl CustomerRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Validate and insert a new customer.
    ///
    /// Input is trimmed before validation, so whitespace never satisfies a
    /// required field. Every call creates a new row; matching on email is
    /// not attempted.
    pub async fn register(&self, input: CustomerInput, paq: Option<PaqResponse>) -> Result<Customer> {
        let input = input.normalized();
        input.validate()?;

        let customer = Customer::new(input, paq);
        self.store.insert_customer(&customer).await?;

        tracing::info!(customer_id = %customer.id, "Customer registered");
        if customer.paq.as_ref().is_some_and(PaqResponse::needs_medical_clearance) {
            tracing::warn!(customer_id = %customer.id, "PAQ answers require medical clearance");
        }
        Ok(customer)
    }

    pub async fn get(&self, id: &CustomerId) -> Result<Customer> {
        self.store
            .get_customer(id)
            .await?
            .ok_or_else(|| BookingError::not_found("customer", id))
    }

    /// Staff edit of the personal details
    pub async fn update(&self, id: &CustomerId, input: CustomerInput) -> Result<Customer> {
        let input = input.normalized();
        input.validate()?;

        let mut customer = self.get(id).await?;
        customer.apply(input);
        self.save(&customer).await?;

        tracing::info!(customer_id = %customer.id, "Customer updated");
        Ok(customer)
    }

    pub async fn set_status(&self, id: &CustomerId, status: CustomerStatus) -> Result<Customer> {
        let mut customer = self.get(id).await?;
        if customer.status != status {
            customer.status = status;
            customer.updated_at = Utc::now();
            self.save(&customer).await?;
            tracing::info!(customer_id = %customer.id, status = status.as_str(), "Customer status changed");
        }
        Ok(customer)
    }

    async fn save(&self, customer: &Customer) -> Result<()> {
        if self.store.update_customer(customer).await? {
            Ok(())
        } else {
            Err(BookingError::not_found("customer", &customer.id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::customer_input;

    fn registry() -> CustomerRegistry {
        CustomerRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_register_normalises_email() {
        let registry = registry();
        let customer = registry.register(customer_input(), None).await.unwrap();

        assert_eq!(customer.email, "jane@example.com");
        assert_eq!(customer.status, CustomerStatus::Active);
        assert_eq!(registry.get(&customer.id).await.unwrap().full_name(), "Jane Citizen");
    }

    #[tokio::test]
    async fn test_register_twice_creates_two_customers() {
        let registry = registry();
        let first = registry.register(customer_input(), None).await.unwrap();
        let second = registry.register(customer_input(), None).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_validation_reports_each_field() {
        let mut input = customer_input();
        input.first_name = "J".into();
        input.email = "not-an-email".into();
        input.emergency_phone = "123".into();

        let err = registry().register(input, None).await.unwrap_err();
        let BookingError::Validation(fields) = err else {
            panic!("expected validation error, got {err:?}");
        };
        let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, ["email", "emergency_phone", "first_name"]);
        assert_eq!(fields[0].message, "Invalid email address");
    }

    #[tokio::test]
    async fn test_blank_names_are_rejected() {
        let registry = registry();
        let mut input = customer_input();
        input.first_name = "   ".into();
        input.last_name = " J ".into();
        input.email = "  Jane@Example.COM ".into();

        let err = registry.register(input, None).await.unwrap_err();
        let BookingError::Validation(fields) = err else {
            panic!("expected validation error, got {err:?}");
        };
        let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, ["first_name", "last_name"]);

        let customer = registry.register(customer_input(), None).await.unwrap();
        let mut input = customer_input();
        input.first_name = "\t".into();
        assert!(matches!(
            registry.update(&customer.id, input).await,
            Err(BookingError::Validation(_))
        ));
        assert_eq!(registry.get(&customer.id).await.unwrap().first_name, "Jane");
    }

    #[tokio::test]
    async fn test_update_and_deactivate() {
        let registry = registry();
        let customer = registry.register(customer_input(), None).await.unwrap();

        let mut input = customer_input();
        input.phone = "0399998888".into();
        let updated = registry.update(&customer.id, input).await.unwrap();
        assert_eq!(updated.contact_no, "0399998888");

        let inactive = registry
            .set_status(&customer.id, CustomerStatus::Inactive)
            .await
            .unwrap();
        assert_eq!(inactive.status, CustomerStatus::Inactive);

        let missing = registry
            .set_status(&CustomerId::from("nobody"), CustomerStatus::Active)
            .await;
        assert!(missing.is_err());
    }
}

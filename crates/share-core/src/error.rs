//! Error Types

use serde::Serialize;
use thiserror::Error;

/// Result type alias for booking operations
pub type Result<T> = std::result::Result<T, BookingError>;

/// A single rejected input field
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Booking, enrollment and registry errors
#[derive(Error, Debug)]
pub enum BookingError {
    /// Client input rejected before any write
    #[error("Validation failed: {}", format_fields(.0))]
    Validation(Vec<FieldError>),

    /// Payment provider rejected the request (message is the provider's, verbatim)
    #[error("{0}")]
    Gateway(String),

    /// No payment gateway configured
    #[error("Payments are not configured")]
    PaymentsDisabled,

    /// Entity lookup failed
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Operation not allowed in the booking's current state
    #[error("Cannot {action} a booking in state {state}")]
    InvalidTransition { state: String, action: &'static str },

    /// Storage collaborator failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Receipt rendering failed
    #[error("Receipt error: {0}")]
    Receipt(String),
}

impl BookingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(_) => "Some details are missing or invalid.".into(),
            Self::Gateway(msg) => msg.clone(),
            Self::PaymentsDisabled => "Online payments are currently unavailable.".into(),
            Self::NotFound { entity, .. } => format!("The requested {entity} could not be found."),
            Self::InvalidTransition { .. } => "This booking cannot be changed that way.".into(),
            Self::Storage(_) | Self::Receipt(_) => "An unexpected error occurred.".into(),
        }
    }
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<validator::ValidationErrors> for BookingError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    let message = error
                        .message
                        .as_ref()
                        .map_or_else(|| error.code.to_string(), ToString::to_string);
                    FieldError::new(field.to_string(), message)
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        Self::Validation(fields)
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::migrate::MigrateError> for BookingError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Storage(err.to_string())
    }
}

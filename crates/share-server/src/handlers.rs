//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use share_core::booking::{BookingDetails, BookingView, NewBooking};
use share_core::enrollment::PaymentStart;
use share_core::model::{
    BookingId, ClassId, ClassOccurrence, ClassOccurrenceSummary, Customer, CustomerId,
    CustomerInput, CustomerStatus, ManualPayment, Payment, PaymentId,
};
use share_core::store::{BookingFilter, OccurrenceFilter};
use share_core::{BookingError, EnrollmentRequest, EnrollmentResult, FieldError};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub storage: &'static str,
    pub stripe_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: CustomerStatus,
}

// ============================================================================
// Errors
// ============================================================================

/// Error returned by the JSON handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("Staff API is not configured")]
    StaffDisabled,

    #[error("Missing or invalid staff token")]
    Unauthorized,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub const fn status(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Booking(err) => match err {
                BookingError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_FAILED"),
                BookingError::Gateway(_) => (StatusCode::BAD_GATEWAY, "PAYMENT_PROVIDER_ERROR"),
                BookingError::PaymentsDisabled => (StatusCode::SERVICE_UNAVAILABLE, "PAYMENTS_DISABLED"),
                BookingError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                BookingError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
                BookingError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
                BookingError::Receipt(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RECEIPT_ERROR"),
            },
            Self::StaffDisabled => (StatusCode::SERVICE_UNAVAILABLE, "STAFF_API_DISABLED"),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, code, "Request failed");
        } else {
            tracing::debug!(error = %self, code, "Request rejected");
        }

        let error = match &self {
            Self::Booking(err) => err.user_message(),
            other => other.to_string(),
        };
        let fields = match self {
            Self::Booking(BookingError::Validation(fields)) => Some(fields),
            _ => None,
        };

        (
            status,
            Json(ErrorResponse {
                error,
                code: code.into(),
                fields,
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Public handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        storage: state.storage,
        stripe_configured: state.payments_enabled(),
    })
}

/// Catalog search
pub async fn list_classes(
    State(state): State<AppState>,
    Query(filter): Query<OccurrenceFilter>,
) -> ApiResult<Json<Vec<ClassOccurrenceSummary>>> {
    Ok(Json(state.catalog.find_occurrences(&filter).await?))
}

pub async fn get_class(
    State(state): State<AppState>,
    Path(id): Path<ClassId>,
) -> ApiResult<Json<ClassOccurrence>> {
    Ok(Json(state.catalog.get_occurrence(&id).await?))
}

/// Enrollment wizard submission (trial or direct)
pub async fn create_enrollment(
    State(state): State<AppState>,
    Json(request): Json<EnrollmentRequest>,
) -> ApiResult<(StatusCode, Json<EnrollmentResult>)> {
    let result = state.enrollments.enroll(request).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// New intent for a booking whose first attempt failed or was abandoned
pub async fn retry_payment(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
) -> ApiResult<Json<PaymentStart>> {
    Ok(Json(state.enrollments.retry_payment(&id).await?))
}

/// Stripe webhook receiver
///
/// Always answers with JSON: `{"received": true}` once the event is applied
/// (or safely ignored), `{"error": ..}` otherwise.
pub async fn stripe_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(webhooks) = state.webhooks.as_ref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Payments not configured" })),
        )
            .into_response();
    };

    let signature = headers.get("stripe-signature").and_then(|v| v.to_str().ok());

    match webhooks.handle(&body, signature).await {
        Ok(outcome) => {
            tracing::debug!(?outcome, "Webhook handled");
            (StatusCode::OK, Json(json!({ "received": true }))).into_response()
        }
        Err(e) if e.is_bad_request() => {
            tracing::warn!(error = %e, "Webhook rejected");
            (StatusCode::BAD_REQUEST, Json(json!({ "error": e.user_message() }))).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, retryable = e.is_retryable(), "Webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.user_message() })),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Staff handlers
// ============================================================================

pub async fn list_bookings(
    State(state): State<AppState>,
    Query(filter): Query<BookingFilter>,
) -> ApiResult<Json<Vec<BookingView>>> {
    let bookings = state.bookings.list_bookings(&filter).await?;
    Ok(Json(bookings.into_iter().map(BookingView::from).collect()))
}

pub async fn create_booking(
    State(state): State<AppState>,
    Json(new): Json<NewBooking>,
) -> ApiResult<(StatusCode, Json<BookingView>)> {
    let booking = state.bookings.create_booking(new).await?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
) -> ApiResult<Json<BookingDetails>> {
    Ok(Json(state.bookings.booking_details(&id).await?))
}

pub async fn delete_booking(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
) -> ApiResult<StatusCode> {
    state.bookings.delete_booking(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
) -> ApiResult<Json<BookingView>> {
    let booking = state.bookings.cancel_booking(&id).await?;
    Ok(Json(booking.into()))
}

/// Cash, transfer or card-in-person payment entered by staff
pub async fn record_payment(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    Json(input): Json<ManualPayment>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    let payment = state.bookings.record_manual_payment(&id, input).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// PDF receipt download
pub async fn payment_receipt(
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
) -> ApiResult<Response> {
    let (receipt_number, pdf) = state.bookings.receipt_pdf(&id).await?;
    let disposition = format!("attachment; filename=\"receipt-{receipt_number}.pdf\"");

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(state.customers.get(&id).await?))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Json(input): Json<CustomerInput>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(state.customers.update(&id, input).await?))
}

pub async fn set_customer_status(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(state.customers.set_status(&id, update.status).await?))
}

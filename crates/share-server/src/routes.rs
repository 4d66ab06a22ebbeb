//! Router

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::require_staff;
use crate::handlers::{
    cancel_booking, create_booking, create_enrollment, delete_booking, get_booking, get_class,
    get_customer, health_check, list_bookings, list_classes, payment_receipt, record_payment,
    retry_payment, set_customer_status, stripe_webhook, update_customer,
};
use crate::state::AppState;

/// Build the full application router
pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Staff dashboard API
    let staff = Router::new()
        .route("/api/bookings", get(list_bookings).post(create_booking))
        .route("/api/bookings/{id}", get(get_booking).delete(delete_booking))
        .route("/api/bookings/{id}/cancel", post(cancel_booking))
        .route("/api/bookings/{id}/payments", post(record_payment))
        .route("/api/payments/{id}/receipt", get(payment_receipt))
        .route("/api/customers/{id}", get(get_customer).put(update_customer))
        .route("/api/customers/{id}/status", put(set_customer_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_staff));

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Catalog & enrollment
        .route("/api/classes", get(list_classes))
        .route("/api/classes/{id}", get(get_class))
        .route("/api/enrollments", post(create_enrollment))
        .route("/api/bookings/{id}/payment-intent", post(retry_payment))
        // Payments (preflight is answered by the CORS layer)
        .route("/webhook", post(stripe_webhook))
        .merge(staff)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Endpoint listing printed at startup
pub const ENDPOINTS: &[(&str, &str)] = &[
    ("GET  /health", "Health check"),
    ("GET  /api/classes", "Search classes"),
    ("GET  /api/classes/{id}", "Class details"),
    ("POST /api/enrollments", "Enroll (trial or direct)"),
    ("POST /api/bookings/{id}/payment-intent", "Retry payment"),
    ("POST /webhook", "Stripe webhook"),
    ("*    /api/bookings, /api/payments, /api/customers", "Staff API (bearer token)"),
];

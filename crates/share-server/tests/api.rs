//! HTTP-level tests against the full router with a memory store and the
//! mock payment gateway.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use share_core::{MemoryStore, MockPaymentGateway, PaymentGateway};
use share_payments::signature_header;
use share_server::{AppState, Config, router};

const WEBHOOK_SECRET: &str = "whsec_api_test";
const STAFF_TOKEN: &str = "staff-token";

const SEED: &str = r#"{"classes": [
    {
        "id": "42", "code": "CY-01", "name": "Chair Yoga",
        "exercise_type": {"id": "yoga", "name": "Yoga"},
        "venue": "Footscray Community Hall", "address": "1 Main St", "zip_code": "3011",
        "date": "2025-02-03", "time": "10:00:00",
        "instructor": {"id": "ins-1", "name": "Pat Morgan"},
        "fee_criteria": "Per term", "fee_amount": "45.00", "term": "Term1"
    },
    {
        "id": "43", "code": "ST-02", "name": "Gentle Strength",
        "exercise_type": {"id": "strength", "name": "Strength"},
        "venue": "Brunswick Library", "address": "2 High St", "zip_code": "3056",
        "date": "2025-02-04", "time": "14:00:00",
        "instructor": {"id": "ins-2", "name": "Sam Lee"},
        "fee_criteria": "Per term", "fee_amount": "60.00", "term": "Term1"
    }
]}"#;

fn state(gateway: Option<Arc<dyn PaymentGateway>>) -> AppState {
    let store = Arc::new(MemoryStore::from_seed_json(SEED).unwrap());
    AppState::new(store, gateway, "aud")
}

fn app() -> Router {
    let gateway: Arc<dyn PaymentGateway> = Arc::new(MockPaymentGateway::new());
    router(
        state(Some(gateway))
            .with_webhook_secret(WEBHOOK_SECRET)
            .with_staff_token(STAFF_TOKEN),
    )
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn staff(method: Method, uri: &str, body: Option<&Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {STAFF_TOKEN}"));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn enrollment(class_id: &str, enrollment_type: &str) -> Value {
    json!({
        "classId": class_id,
        "enrollmentType": enrollment_type,
        "personalDetails": {
            "firstName": "Jane", "lastName": "Citizen",
            "email": "jane@example.com", "phone": "0400123456",
            "dateOfBirth": "1950-06-01", "address": "12 Elm St",
            "emergencyContact": "John Citizen", "emergencyPhone": "0400654321"
        }
    })
}

fn webhook(event_type: &str, object: &Value, created: i64, signature: Option<String>) -> Request<Body> {
    let body = serde_json::to_vec(&json!({
        "id": format!("evt_{event_type}_{created}"),
        "type": event_type,
        "created": created,
        "data": { "object": object },
    }))
    .unwrap();
    let signature = signature
        .unwrap_or_else(|| signature_header(&body, WEBHOOK_SECRET, chrono::Utc::now().timestamp()).unwrap());

    Request::post("/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .header("stripe-signature", signature)
        .body(Body::from(body))
        .unwrap()
}

/// Direct enrollment into class 42; returns the booking id
async fn enroll_direct(app: &Router) -> String {
    let (status, body) = send(app, post_json("/api/enrollments", &enrollment("42", "direct"))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["bookingId"].as_str().unwrap().to_string()
}

async fn booking_details(app: &Router, booking_id: &str) -> Value {
    let (status, body) = send(app, staff(Method::GET, &format!("/api/bookings/{booking_id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["stripe_configured"], true);
}

#[tokio::test]
async fn test_catalog_search() {
    let app = app();

    let (status, body) = send(&app, get("/api/classes?location=footscray")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], "42");

    let (_, body) = send(&app, get("/api/classes?exerciseTypeId=all")).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(&app, get("/api/classes/404")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_direct_enrollment_creates_intent_for_fee() {
    let (status, body) = send(&app(), post_json("/api/enrollments", &enrollment("42", "direct"))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["paymentStatus"], "pending");
    assert_eq!(body["payment"]["amountMinor"], 4500);
    assert_eq!(body["payment"]["currency"], "aud");
    assert_eq!(body["payment"]["clientSecret"], "pi_mock_000001_secret_mock");
}

#[tokio::test]
async fn test_trial_enrollment_needs_no_payment() {
    let (status, body) = send(&app(), post_json("/api/enrollments", &enrollment("42", "trial"))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["paymentStatus"], "not_required");
    assert!(body.get("payment").is_none());
}

#[tokio::test]
async fn test_invalid_enrollment_lists_fields() {
    let mut request = enrollment("42", "direct");
    request["personalDetails"]["email"] = json!("not-an-email");

    let (status, body) = send(&app(), post_json("/api/enrollments", &request)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert_eq!(body["fields"][0]["field"], "email");
}

#[tokio::test]
async fn test_payments_disabled_without_gateway() {
    let app = router(state(None));

    let (status, body) = send(&app, post_json("/api/enrollments", &enrollment("42", "direct"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "PAYMENTS_DISABLED");

    let (status, _) = send(&app, post_json("/api/enrollments", &enrollment("42", "trial"))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, webhook("payment_intent.succeeded", &json!({"id": "pi_x"}), 1, None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_secret_key_alone_does_not_enable_payments() {
    let store = Arc::new(MemoryStore::from_seed_json(SEED).unwrap());
    let config = Config {
        stripe_secret_key: Some("sk_test_only".into()),
        currency: "aud".into(),
        staff_token: Some(STAFF_TOKEN.into()),
        ..Config::default()
    };
    let state = AppState::from_config(store, &config);
    assert!(!state.payments_enabled());
    assert!(state.webhooks.is_none());

    let app = router(state);
    let (status, body) = send(&app, post_json("/api/enrollments", &enrollment("42", "direct"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "PAYMENTS_DISABLED");

    let (status, body) = send(&app, staff(Method::GET, "/api/bookings", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_both_stripe_keys_enable_payments() {
    let store = Arc::new(MemoryStore::from_seed_json(SEED).unwrap());
    let config = Config {
        stripe_secret_key: Some("sk_test_key".into()),
        stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
        currency: "aud".into(),
        ..Config::default()
    };
    let state = AppState::from_config(store, &config);
    assert!(state.payments_enabled());
    assert!(state.staff_token.is_none());
}

#[tokio::test]
async fn test_succeeded_webhook_marks_booking_paid() {
    let app = app();
    let booking_id = enroll_direct(&app).await;

    let object = json!({"id": "pi_mock_000001", "amount_received": 4500});
    let (status, body) = send(&app, webhook("payment_intent.succeeded", &object, 1_700_000_000, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"received": true}));

    // redelivery is a no-op
    let (status, _) = send(&app, webhook("payment_intent.succeeded", &object, 1_700_000_000, None)).await;
    assert_eq!(status, StatusCode::OK);

    let details = booking_details(&app, &booking_id).await;
    assert_eq!(details["booking"]["status"], "active");
    assert_eq!(details["booking"]["paymentStatus"], "paid");
    assert_eq!(details["payments"].as_array().unwrap().len(), 1);
    assert_eq!(details["payments"][0]["paymentStatus"], "completed");
}

#[tokio::test]
async fn test_refund_after_success_cancels_booking() {
    let app = app();
    let booking_id = enroll_direct(&app).await;

    let succeeded = json!({"id": "pi_mock_000001", "amount_received": 4500});
    send(&app, webhook("payment_intent.succeeded", &succeeded, 1_700_000_000, None)).await;

    let refunded = json!({"id": "ch_1", "payment_intent": "pi_mock_000001", "amount_refunded": 4500});
    let (status, _) = send(&app, webhook("charge.refunded", &refunded, 1_700_000_060, None)).await;
    assert_eq!(status, StatusCode::OK);

    let details = booking_details(&app, &booking_id).await;
    assert_eq!(details["booking"]["status"], "cancelled");
    assert_eq!(details["booking"]["paymentStatus"], "refunded");
}

#[tokio::test]
async fn test_dispute_keeps_booking_active() {
    let app = app();
    let booking_id = enroll_direct(&app).await;

    let succeeded = json!({"id": "pi_mock_000001", "amount_received": 4500});
    send(&app, webhook("payment_intent.succeeded", &succeeded, 1_700_000_000, None)).await;

    let dispute = json!({"id": "dp_1", "payment_intent": "pi_mock_000001", "amount": 4500});
    for _ in 0..2 {
        let (status, body) = send(&app, webhook("charge.dispute.created", &dispute, 1_700_000_060, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received"], true);
    }

    let details = booking_details(&app, &booking_id).await;
    assert_eq!(details["booking"]["status"], "active");
    assert_eq!(details["booking"]["paymentStatus"], "disputed");
    assert_eq!(details["payments"][0]["paymentStatus"], "disputed");
}

#[tokio::test]
async fn test_charge_without_intent_is_acknowledged() {
    let app = app();
    let booking_id = enroll_direct(&app).await;

    let refunded = json!({"id": "ch_9", "payment_intent": null, "amount_refunded": 4500});
    let (status, body) = send(&app, webhook("charge.refunded", &refunded, 1_700_000_000, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"received": true}));

    let dispute = json!({"id": "dp_9", "charge": "ch_9"});
    let (status, _) = send(&app, webhook("charge.dispute.created", &dispute, 1_700_000_000, None)).await;
    assert_eq!(status, StatusCode::OK);

    let details = booking_details(&app, &booking_id).await;
    assert_eq!(details["booking"]["paymentStatus"], "pending");
}

#[tokio::test]
async fn test_tampered_webhook_is_rejected_without_changes() {
    let app = app();
    let booking_id = enroll_direct(&app).await;

    let forged = format!("t={},v1={}", chrono::Utc::now().timestamp(), "0".repeat(64));
    let object = json!({"id": "pi_mock_000001", "amount_received": 4500});
    let (status, body) = send(&app, webhook("payment_intent.succeeded", &object, 1_700_000_000, Some(forged))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid signature");

    let details = booking_details(&app, &booking_id).await;
    assert_eq!(details["booking"]["paymentStatus"], "pending");
}

#[tokio::test]
async fn test_unknown_event_is_acknowledged() {
    let app = app();
    let booking_id = enroll_direct(&app).await;

    let (status, body) = send(&app, webhook("customer.created", &json!({"id": "cus_1"}), 1_700_000_000, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    let details = booking_details(&app, &booking_id).await;
    assert_eq!(details["booking"]["paymentStatus"], "pending");
}

#[tokio::test]
async fn test_unknown_intent_is_acknowledged() {
    let object = json!({"id": "pi_elsewhere", "amount_received": 100});
    let (status, _) = send(&app(), webhook("payment_intent.succeeded", &object, 1_700_000_000, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_preflight() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/webhook")
        .header(header::ORIGIN, "https://js.stripe.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();

    assert!(response.status().is_success());
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_retry_after_failed_payment() {
    let app = app();
    let booking_id = enroll_direct(&app).await;

    let failed = json!({"id": "pi_mock_000001", "amount": 4500});
    send(&app, webhook("payment_intent.payment_failed", &failed, 1_700_000_000, None)).await;

    let uri = format!("/api/bookings/{booking_id}/payment-intent");
    let (status, body) = send(&app, post_json(&uri, &json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["clientSecret"], "pi_mock_000002_secret_mock");
    assert_eq!(body["amountMinor"], 4500);
}

#[tokio::test]
async fn test_staff_routes_require_token() {
    let app = app();

    let (status, body) = send(&app, get("/api/bookings")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let wrong = Request::get("/api/bookings")
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, staff(Method::GET, "/api/bookings", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_staff_routes_disabled_without_token() {
    let gateway: Arc<dyn PaymentGateway> = Arc::new(MockPaymentGateway::new());
    let app = router(state(Some(gateway)));

    let (status, body) = send(&app, staff(Method::GET, "/api/bookings", None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "STAFF_API_DISABLED");
}

#[tokio::test]
async fn test_manual_payment_and_receipt() {
    let app = app();
    let booking_id = enroll_direct(&app).await;

    let payment = json!({
        "amount": "45.00",
        "paymentMethod": "cash",
        "paymentDate": "2025-02-03",
        "notes": "Paid at front desk"
    });
    let uri = format!("/api/bookings/{booking_id}/payments");
    let (status, body) = send(&app, staff(Method::POST, &uri, Some(&payment))).await;
    assert_eq!(status, StatusCode::CREATED);
    let payment_id = body["id"].as_str().unwrap().to_string();

    let details = booking_details(&app, &booking_id).await;
    assert_eq!(details["booking"]["paymentStatus"], "paid");

    let uri = format!("/api/payments/{payment_id}/receipt");
    let response = app.clone().oneshot(staff(Method::GET, &uri, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_staff_cancel_and_delete() {
    let app = app();
    let booking_id = enroll_direct(&app).await;

    let (status, body) = send(&app, staff(Method::POST, &format!("/api/bookings/{booking_id}/cancel"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (status, _) = send(&app, staff(Method::DELETE, &format!("/api/bookings/{booking_id}"), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, staff(Method::GET, &format!("/api/bookings/{booking_id}"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_customer_status_update() {
    let app = app();
    let (_, body) = send(&app, post_json("/api/enrollments", &enrollment("42", "trial"))).await;
    let customer_id = body["customerId"].as_str().unwrap().to_string();

    let uri = format!("/api/customers/{customer_id}/status");
    let (status, body) = send(&app, staff(Method::PUT, &uri, Some(&json!({"status": "inactive"})))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "inactive");
}

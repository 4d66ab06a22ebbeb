//! Stripe Webhook Handling
//!
//! Verifies the `Stripe-Signature` header over the raw body, maps payment
//! intent, charge and dispute events to [`PaymentEvent`]s and hands them to
//! the booking service. Anything else is acknowledged and dropped.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;

use share_core::{BookingService, EventOutcome, PaymentEvent, PaymentEventKind};

use crate::error::{PaymentError, Result};

/// Maximum age of a signed payload, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Verify a `t=<ts>,v1=<hex>` signature header against the shared secret
pub fn verify_signature(payload: &[u8], header: &str, secret: &str) -> Result<()> {
    verify_signature_at(payload, header, secret, Utc::now().timestamp())
}

fn verify_signature_at(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        if let Some(t) = part.trim().strip_prefix("t=") {
            timestamp = Some(t);
        } else if let Some(v) = part.trim().strip_prefix("v1=") {
            signatures.push(v);
        }
    }

    let timestamp = timestamp.ok_or_else(|| invalid("missing timestamp"))?;
    if signatures.is_empty() {
        return Err(invalid("missing v1 signature"));
    }

    let ts: i64 = timestamp.parse().map_err(|_| invalid("invalid timestamp"))?;
    if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(invalid("timestamp outside tolerance"));
    }

    let mac = signed_payload_mac(payload, timestamp, secret)?;

    // Several v1 entries appear while a secret is being rolled; any match is enough
    let matched = signatures.iter().any(|sig| {
        hex::decode(sig).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });
    if matched {
        Ok(())
    } else {
        Err(invalid("signature mismatch"))
    }
}

fn signed_payload_mac(payload: &[u8], timestamp: &str, secret: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::Config("invalid webhook secret".into()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

fn invalid(reason: &str) -> PaymentError {
    PaymentError::WebhookSignature(reason.to_string())
}

/// Build a `Stripe-Signature` header value, as Stripe would send it
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let mac = signed_payload_mac(payload, &timestamp.to_string(), secret)?;
    Ok(format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// The parts of a Stripe event envelope we rely on
#[derive(Clone, Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Unix seconds, set by Stripe
    pub created: i64,
    pub data: EventData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EventData {
    pub object: Value,
}

impl StripeEvent {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| PaymentError::WebhookParse(e.to_string()))
    }

    fn object_str(&self, field: &str) -> Option<&str> {
        self.data.object.get(field).and_then(Value::as_str)
    }

    fn object_amount(&self, field: &str) -> Option<i64> {
        self.data.object.get(field).and_then(Value::as_i64)
    }
}

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Changes the state of a booking's payment
    Payment(PaymentEvent),

    /// Intent lifecycle noise (created, requires_action): logged only
    Informational {
        event_type: String,
        intent_id: Option<String>,
    },

    /// Payment event type that names no intent, so no payment can match it
    Unmatched {
        event_type: String,
        object_id: Option<String>,
    },

    /// Unhandled event type
    Other { event_type: String },
}

/// Map a Stripe event onto our event type
pub fn classify(event: &StripeEvent) -> Result<WebhookEvent> {
    let (kind, key, amount_field) = match event.event_type.as_str() {
        "payment_intent.succeeded" => (PaymentEventKind::IntentSucceeded, "id", "amount_received"),
        "payment_intent.payment_failed" => (PaymentEventKind::IntentFailed, "id", "amount"),
        "payment_intent.canceled" => (PaymentEventKind::IntentCanceled, "id", "amount"),
        "charge.refunded" => (PaymentEventKind::ChargeRefunded, "payment_intent", "amount_refunded"),
        "charge.dispute.created" => (PaymentEventKind::DisputeCreated, "payment_intent", "amount"),
        "payment_intent.created" | "payment_intent.requires_action" => {
            return Ok(WebhookEvent::Informational {
                event_type: event.event_type.clone(),
                intent_id: event.object_str("id").map(String::from),
            });
        }
        other => {
            return Ok(WebhookEvent::Other {
                event_type: other.to_string(),
            });
        }
    };

    let Some(intent_id) = event.object_str(key) else {
        return Ok(WebhookEvent::Unmatched {
            event_type: event.event_type.clone(),
            object_id: event.object_str("id").map(String::from),
        });
    };
    let occurred_at = DateTime::from_timestamp(event.created, 0)
        .ok_or_else(|| PaymentError::WebhookParse(format!("invalid created {}", event.created)))?;

    Ok(WebhookEvent::Payment(PaymentEvent {
        event_id: event.id.clone(),
        kind,
        intent_id: intent_id.to_string(),
        amount_minor: event
            .object_amount(amount_field)
            .or_else(|| event.object_amount("amount")),
        occurred_at,
    }))
}

/// What the receiver did with a verified event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed(EventOutcome),
    Acknowledged { event_type: String },
    Ignored { event_type: String },
}

/// Webhook handler
pub struct WebhookHandler {
    bookings: Arc<BookingService>,
    secret: String,
}

impl WebhookHandler {
    pub fn new(bookings: Arc<BookingService>, secret: impl Into<String>) -> Self {
        Self {
            bookings,
            secret: secret.into(),
        }
    }

    /// Verify, parse and apply one delivery.
    ///
    /// Signature and parse failures leave no side effects; storage failures
    /// surface as retryable so the provider redelivers.
    pub async fn handle(&self, payload: &[u8], signature: Option<&str>) -> Result<WebhookOutcome> {
        let signature = signature.ok_or_else(|| invalid("missing Stripe-Signature header"))?;
        verify_signature(payload, signature, &self.secret)?;

        let event = StripeEvent::parse(payload)?;
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Processing Stripe webhook");

        match classify(&event)? {
            WebhookEvent::Payment(payment_event) => {
                let outcome = self.bookings.apply_provider_event(&payment_event).await?;
                Ok(WebhookOutcome::Processed(outcome))
            }
            WebhookEvent::Informational {
                event_type,
                intent_id,
            } => {
                tracing::info!(event_type = %event_type, intent_id = ?intent_id, "Intent update acknowledged");
                Ok(WebhookOutcome::Acknowledged { event_type })
            }
            WebhookEvent::Unmatched {
                event_type,
                object_id,
            } => {
                tracing::warn!(
                    event_id = %event.id,
                    event_type = %event_type,
                    object_id = ?object_id,
                    "Event names no payment intent, dropping"
                );
                Ok(WebhookOutcome::Ignored { event_type })
            }
            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
                Ok(WebhookOutcome::Ignored { event_type })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test_secret";

    fn payload(event_type: &str, object: &Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": event_type,
            "created": 1_700_000_000,
            "data": { "object": object },
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"id":"evt_1"}"#;
        let now = 1_700_000_000;
        let header = signature_header(body, SECRET, now).unwrap();
        assert!(verify_signature_at(body, &header, SECRET, now + 10).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let now = 1_700_000_000;
        let header = signature_header(br#"{"amount":4500}"#, SECRET, now).unwrap();
        let err = verify_signature_at(br#"{"amount":1}"#, &header, SECRET, now).unwrap_err();
        assert!(matches!(err, PaymentError::WebhookSignature(_)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = b"{}";
        let now = 1_700_000_000;
        let header = signature_header(body, "whsec_other", now).unwrap();
        assert!(verify_signature_at(body, &header, SECRET, now).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let body = b"{}";
        let signed_at = 1_700_000_000;
        let header = signature_header(body, SECRET, signed_at).unwrap();
        let err = verify_signature_at(body, &header, SECRET, signed_at + SIGNATURE_TOLERANCE_SECS + 1)
            .unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let now = 1_700_000_000;
        for header in ["", "t=1700000000", "v1=abcd", "t=abc,v1=abcd", "t=1700000000,v1=zz"] {
            assert!(verify_signature_at(b"{}", header, SECRET, now).is_err(), "{header}");
        }
    }

    #[test]
    fn test_any_matching_v1_accepted() {
        let body = b"{}";
        let now = 1_700_000_000;
        let good = signature_header(body, SECRET, now).unwrap();
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={now},v1={},v1={good_sig}", "00".repeat(32));
        assert!(verify_signature_at(body, &header, SECRET, now).is_ok());
    }

    #[test]
    fn test_classify_intent_succeeded() {
        let body = payload(
            "payment_intent.succeeded",
            &json!({"id": "pi_123", "amount": 4500, "amount_received": 4500}),
        );
        let event = StripeEvent::parse(&body).unwrap();

        let WebhookEvent::Payment(payment) = classify(&event).unwrap() else {
            panic!("expected payment event");
        };
        assert_eq!(payment.kind, PaymentEventKind::IntentSucceeded);
        assert_eq!(payment.intent_id, "pi_123");
        assert_eq!(payment.amount_minor, Some(4500));
        assert_eq!(payment.occurred_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_classify_charge_events_key_on_payment_intent() {
        let body = payload(
            "charge.refunded",
            &json!({"id": "ch_1", "payment_intent": "pi_123", "amount": 4500, "amount_refunded": 4500}),
        );
        let event = StripeEvent::parse(&body).unwrap();
        let WebhookEvent::Payment(payment) = classify(&event).unwrap() else {
            panic!("expected payment event");
        };
        assert_eq!(payment.kind, PaymentEventKind::ChargeRefunded);
        assert_eq!(payment.intent_id, "pi_123");

        let body = payload("charge.dispute.created", &json!({"id": "dp_1", "charge": "ch_1"}));
        let event = StripeEvent::parse(&body).unwrap();
        assert_eq!(
            classify(&event).unwrap(),
            WebhookEvent::Unmatched {
                event_type: "charge.dispute.created".into(),
                object_id: Some("dp_1".into()),
            }
        );
    }

    #[test]
    fn test_classify_informational_and_unknown() {
        let event = StripeEvent::parse(&payload("payment_intent.created", &json!({"id": "pi_1"}))).unwrap();
        assert_eq!(
            classify(&event).unwrap(),
            WebhookEvent::Informational {
                event_type: "payment_intent.created".into(),
                intent_id: Some("pi_1".into()),
            }
        );

        let event = StripeEvent::parse(&payload("customer.created", &json!({"id": "cus_1"}))).unwrap();
        assert!(matches!(classify(&event).unwrap(), WebhookEvent::Other { .. }));
    }

    mod handler {
        use super::*;
        use share_core::store::Store;
        use share_core::{
            BookingState, Catalog, CustomerRegistry, EnrollmentRequest, EnrollmentService,
            MemoryStore, MockPaymentGateway, PaymentGateway,
        };

        const SEED: &str = r#"{"classes": [{
            "id": "42", "code": "CY-01", "name": "Chair Yoga",
            "exercise_type": {"id": "yoga", "name": "Yoga"},
            "venue": "Footscray Community Hall", "address": "1 Main St", "zip_code": "3011",
            "date": "2025-02-03", "time": "10:00:00",
            "instructor": {"id": "ins-1", "name": "Pat Morgan"},
            "fee_criteria": "Per term", "fee_amount": "45.00", "term": "Term1"
        }]}"#;

        /// Enroll into class 42 and return the handler, the service and the booking id
        async fn enrolled() -> (WebhookHandler, Arc<BookingService>, share_core::model::BookingId) {
            let store: Arc<dyn Store> = Arc::new(MemoryStore::from_seed_json(SEED).unwrap());
            let bookings = Arc::new(BookingService::new(store.clone()));
            let gateway: Arc<dyn PaymentGateway> = Arc::new(MockPaymentGateway::new());
            let enrollments = EnrollmentService::new(
                Arc::new(Catalog::new(store.clone())),
                Arc::new(CustomerRegistry::new(store)),
                bookings.clone(),
                Some(gateway),
            );

            let request: EnrollmentRequest = serde_json::from_value(json!({
                "classId": "42",
                "enrollmentType": "direct",
                "personalDetails": {
                    "firstName": "Jane", "lastName": "Citizen",
                    "email": "jane@example.com", "phone": "0400123456",
                    "dateOfBirth": "1950-06-01", "address": "12 Elm St",
                    "emergencyContact": "John Citizen", "emergencyPhone": "0400654321"
                }
            }))
            .unwrap();
            let result = enrollments.enroll(request).await.unwrap();

            (WebhookHandler::new(bookings.clone(), SECRET), bookings, result.booking_id)
        }

        fn signed(event_type: &str, object: &Value) -> (Vec<u8>, String) {
            let body = payload(event_type, object);
            let header = signature_header(&body, SECRET, Utc::now().timestamp()).unwrap();
            (body, header)
        }

        #[tokio::test]
        async fn test_succeeded_marks_booking_paid_once() {
            let (handler, bookings, booking_id) = enrolled().await;
            let (body, header) = signed(
                "payment_intent.succeeded",
                &json!({"id": "pi_mock_000001", "amount_received": 4500}),
            );

            let first = handler.handle(&body, Some(&header)).await.unwrap();
            assert!(matches!(
                first,
                WebhookOutcome::Processed(EventOutcome::Applied { state: BookingState::Paid, .. })
            ));

            let again = handler.handle(&body, Some(&header)).await.unwrap();
            assert_eq!(again, WebhookOutcome::Processed(EventOutcome::AlreadyApplied));

            let booking = bookings.get_booking(&booking_id).await.unwrap();
            assert_eq!(booking.state, BookingState::Paid);
        }

        #[tokio::test]
        async fn test_tampered_delivery_changes_nothing() {
            let (handler, bookings, booking_id) = enrolled().await;
            let (_, header) = signed("payment_intent.succeeded", &json!({"id": "pi_mock_000001"}));
            let forged = payload("payment_intent.succeeded", &json!({"id": "pi_mock_000001", "amount": 1}));

            let err = handler.handle(&forged, Some(&header)).await.unwrap_err();
            assert!(err.is_bad_request());
            assert!(handler.handle(&forged, None).await.is_err());

            let booking = bookings.get_booking(&booking_id).await.unwrap();
            assert_eq!(booking.state, BookingState::AwaitingPayment);
        }

        #[tokio::test]
        async fn test_refund_and_dispute_follow_payment() {
            let (handler, bookings, booking_id) = enrolled().await;
            let (body, header) = signed("payment_intent.succeeded", &json!({"id": "pi_mock_000001"}));
            handler.handle(&body, Some(&header)).await.unwrap();

            let (body, header) = signed(
                "charge.dispute.created",
                &json!({"id": "dp_1", "payment_intent": "pi_mock_000001", "amount": 4500}),
            );
            assert!(matches!(
                handler.handle(&body, Some(&header)).await.unwrap(),
                WebhookOutcome::Processed(EventOutcome::Applied { state: BookingState::Disputed, .. })
            ));

            let (body, header) = signed(
                "charge.refunded",
                &json!({"id": "ch_1", "payment_intent": "pi_mock_000001", "amount_refunded": 4500}),
            );
            handler.handle(&body, Some(&header)).await.unwrap();
            assert_eq!(
                handler.handle(&body, Some(&header)).await.unwrap(),
                WebhookOutcome::Processed(EventOutcome::AlreadyApplied)
            );

            let booking = bookings.get_booking(&booking_id).await.unwrap();
            assert_eq!(booking.status(), share_core::model::BookingStatus::Cancelled);
        }

        #[tokio::test]
        async fn test_unknown_intent_and_type_are_acknowledged() {
            let (handler, _, _) = enrolled().await;

            let (body, header) = signed("payment_intent.succeeded", &json!({"id": "pi_unknown"}));
            assert_eq!(
                handler.handle(&body, Some(&header)).await.unwrap(),
                WebhookOutcome::Processed(EventOutcome::UnknownIntent)
            );

            let (body, header) = signed(
                "charge.refunded",
                &json!({"id": "ch_1", "payment_intent": null, "amount_refunded": 4500}),
            );
            assert_eq!(
                handler.handle(&body, Some(&header)).await.unwrap(),
                WebhookOutcome::Ignored {
                    event_type: "charge.refunded".into()
                }
            );

            let (body, header) = signed("invoice.paid", &json!({"id": "in_1"}));
            assert!(matches!(
                handler.handle(&body, Some(&header)).await.unwrap(),
                WebhookOutcome::Ignored { .. }
            ));
        }
    }

    #[test]
    fn test_unparseable_payload() {
        assert!(matches!(
            StripeEvent::parse(b"not json"),
            Err(PaymentError::WebhookParse(_))
        ));
    }
}

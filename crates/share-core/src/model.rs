//! Domain Models
//!
//! Customers, class occurrences, bookings and payments.
//! Uses `rust_decimal` for all monetary values - never use f64 for money!

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::booking::BookingState;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a new random identifier
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Customer identifier
    CustomerId
);
string_id!(
    /// Class occurrence identifier
    ClassId
);
string_id!(BookingId);
string_id!(PaymentId);
string_id!(ExerciseTypeId);
string_id!(InstructorId);

/// Enrollment period a booking belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    Term1,
    Term2,
    Term3,
    Term4,
}

impl Term {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Term1 => "Term1",
            Self::Term2 => "Term2",
            Self::Term3 => "Term3",
            Self::Term4 => "Term4",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Term1" => Some(Self::Term1),
            "Term2" => Some(Self::Term2),
            "Term3" => Some(Self::Term3),
            "Term4" => Some(Self::Term4),
            _ => None,
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseType {
    pub id: ExerciseTypeId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructor {
    pub id: InstructorId,
    pub name: String,
}

/// One scheduled instance of an exercise class
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassOccurrence {
    pub id: ClassId,
    pub code: String,
    pub name: String,
    pub exercise_type: ExerciseType,
    pub venue: String,
    pub address: String,
    #[serde(default)]
    pub zip_code: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub instructor: Instructor,
    /// Free-text description of who pays what (e.g. "per term, concession available")
    pub fee_criteria: String,
    pub fee_amount: Decimal,
    pub term: Term,
}

impl ClassOccurrence {
    pub fn summary(&self) -> ClassOccurrenceSummary {
        ClassOccurrenceSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            venue: self.venue.clone(),
            date: self.date,
            time: self.time,
            instructor_name: self.instructor.name.clone(),
            exercise_type: self.exercise_type.name.clone(),
            fee_amount: self.fee_amount,
        }
    }
}

/// Search result row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassOccurrenceSummary {
    pub id: ClassId,
    pub name: String,
    pub venue: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub instructor_name: String,
    pub exercise_type: String,
    pub fee_amount: Decimal,
}

// ============================================================================
// Customers
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    #[default]
    Active,
    Inactive,
}

impl CustomerStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// Physical Activity Questionnaire answers from the enrollment wizard
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaqResponse {
    pub heart_condition: bool,
    pub chest_pain: bool,
    pub loss_of_consciousness: bool,
    pub bone_joint_problem: bool,
    pub blood_pressure_medication: bool,
    #[serde(default)]
    pub other_conditions: Option<String>,
}

impl PaqResponse {
    /// Any "yes" answer means the instructor should see a doctor's clearance
    pub const fn needs_medical_clearance(&self) -> bool {
        self.heart_condition
            || self.chest_pain
            || self.loss_of_consciousness
            || self.bone_joint_problem
            || self.blood_pressure_medication
    }
}

/// Personal details step of the enrollment wizard (also used for staff edits)
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInput {
    #[validate(length(min = 2, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 2, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 10, message = "Valid phone number is required"))]
    pub phone: String,
    pub date_of_birth: NaiveDate,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[serde(default)]
    pub suburb: Option<String>,
    #[serde(default)]
    pub post_code: Option<String>,
    #[validate(length(min = 1, message = "Emergency contact is required"))]
    pub emergency_contact: String,
    #[validate(length(min = 10, message = "Valid emergency contact number is required"))]
    pub emergency_phone: String,
    #[serde(default)]
    pub medical_conditions: Option<String>,
}

impl CustomerInput {
    /// Trim every field and lowercase the email; blank optionals become None
    #[must_use]
    pub fn normalized(self) -> Self {
        let trim = |s: String| s.trim().to_string();
        let optional = |s: Option<String>| s.map(trim).filter(|s| !s.is_empty());
        Self {
            first_name: trim(self.first_name),
            last_name: trim(self.last_name),
            email: self.email.trim().to_lowercase(),
            phone: trim(self.phone),
            date_of_birth: self.date_of_birth,
            address: trim(self.address),
            suburb: optional(self.suburb),
            post_code: optional(self.post_code),
            emergency_contact: trim(self.emergency_contact),
            emergency_phone: trim(self.emergency_phone),
            medical_conditions: optional(self.medical_conditions),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    pub surname: String,
    pub email: String,
    pub contact_no: String,
    pub date_of_birth: NaiveDate,
    pub address: String,
    pub suburb: Option<String>,
    pub post_code: Option<String>,
    pub next_of_kin_name: String,
    pub next_of_kin_phone: String,
    pub medical_conditions: Option<String>,
    pub paq: Option<PaqResponse>,
    pub status: CustomerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(input: CustomerInput, paq: Option<PaqResponse>) -> Self {
        let now = Utc::now();
        let mut customer = Self {
            id: CustomerId::generate(),
            first_name: String::new(),
            surname: String::new(),
            email: String::new(),
            contact_no: String::new(),
            date_of_birth: input.date_of_birth,
            address: String::new(),
            suburb: None,
            post_code: None,
            next_of_kin_name: String::new(),
            next_of_kin_phone: String::new(),
            medical_conditions: None,
            paq,
            status: CustomerStatus::Active,
            created_at: now,
            updated_at: now,
        };
        customer.apply(input);
        customer
    }

    /// Overwrite the editable fields from form input
    pub fn apply(&mut self, input: CustomerInput) {
        let input = input.normalized();
        self.first_name = input.first_name;
        self.surname = input.last_name;
        self.email = input.email;
        self.contact_no = input.phone;
        self.date_of_birth = input.date_of_birth;
        self.address = input.address;
        self.suburb = input.suburb;
        self.post_code = input.post_code;
        self.next_of_kin_name = input.emergency_contact;
        self.next_of_kin_phone = input.emergency_phone;
        self.medical_conditions = input.medical_conditions;
        self.updated_at = Utc::now();
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.surname)
    }
}

// ============================================================================
// Bookings & payments
// ============================================================================

/// Externally visible booking status, derived from [`BookingState`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Active,
    Cancelled,
}

impl BookingStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Booking-level payment status, derived from [`BookingState`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingPaymentStatus {
    NotRequired,
    Pending,
    Paid,
    Failed,
    Cancelled,
    Refunded,
    Disputed,
}

impl BookingPaymentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotRequired => "not_required",
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::Disputed => "disputed",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub customer_id: CustomerId,
    pub class_id: ClassId,
    pub term: Term,
    pub is_free_trial: bool,
    /// Class fee copied at booking time; later fee edits do not affect this booking
    pub fee_amount: Decimal,
    pub state: BookingState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(customer_id: CustomerId, class: &ClassOccurrence, term: Term, is_free_trial: bool) -> Self {
        let now = Utc::now();
        Self {
            id: BookingId::generate(),
            customer_id,
            class_id: class.id.clone(),
            term,
            is_free_trial,
            fee_amount: if is_free_trial { Decimal::ZERO } else { class.fee_amount },
            state: BookingState::initial(is_free_trial),
            created_at: now,
            updated_at: now,
        }
    }

    pub const fn status(&self) -> BookingStatus {
        self.state.booking_status()
    }

    pub const fn payment_status(&self) -> BookingPaymentStatus {
        self.state.payment_status()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Charged through the payment provider
    Stripe,
    Cash,
    Cheque,
    Card,
}

impl PaymentMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::Cash => "cash",
            Self::Cheque => "cheque",
            Self::Card => "card",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stripe" => Some(Self::Stripe),
            "cash" => Some(Self::Cash),
            "cheque" => Some(Self::Cheque),
            "card" => Some(Self::Card),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
    Refunded,
    Disputed,
}

impl PaymentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::Disputed => "disputed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            "refunded" => Some(Self::Refunded),
            "disputed" => Some(Self::Disputed),
            _ => None,
        }
    }
}

/// A payment against a booking (financial record, never deleted on its own)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub booking_id: BookingId,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    /// Provider intent id for provider charges, free-form reference otherwise
    pub transaction_id: Option<String>,
    pub receipt_number: String,
    pub payment_date: NaiveDate,
    pub notes: Option<String>,
    /// Provider timestamp of the latest webhook event applied to this payment
    pub last_event_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn provider_charge(booking_id: BookingId, amount: Decimal, intent_id: String, receipt_number: String) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::generate(),
            booking_id,
            amount,
            payment_method: PaymentMethod::Stripe,
            payment_status: PaymentStatus::Pending,
            transaction_id: Some(intent_id),
            receipt_number,
            payment_date: now.date_naive(),
            notes: None,
            last_event_at: None,
            created_at: now,
        }
    }
}

/// Staff-entered payment (the "Add Payment" form)
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualPayment {
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub transaction_id: Option<String>,
    pub payment_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

//! PostgreSQL store
//!
//! Runtime-checked queries (`sqlx::query_as` + `bind`), embedded migrations.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;

use super::{
    format_receipt_number, BookingFilter, BookingStore, CatalogStore, CustomerStore,
    OccurrenceFilter, Store,
};
use crate::booking::BookingState;
use crate::error::{BookingError, Result};
use crate::model::{
    Booking, BookingId, ClassId, ClassOccurrence, ClassOccurrenceSummary, Customer, CustomerId,
    CustomerStatus, ExerciseType, Instructor, PaqResponse, Payment, PaymentId, PaymentMethod,
    PaymentStatus, Term,
};

const CLASS_SELECT: &str = "
    SELECT c.id, c.code, c.name,
           c.exercise_type_id, e.name AS exercise_type_name,
           c.venue, c.address, c.zip_code, c.date, c.time,
           c.instructor_id, i.name AS instructor_name,
           c.fee_criteria, c.fee_amount, c.term
    FROM classes c
    JOIN exercise_types e ON e.id = c.exercise_type_id
    JOIN instructors i ON i.id = c.instructor_id";

const CUSTOMER_COLUMNS: &str = "id, first_name, surname, email, contact_no, date_of_birth,
    address, suburb, post_code, next_of_kin_name, next_of_kin_phone, medical_conditions,
    paq, status, created_at, updated_at";

const BOOKING_COLUMNS: &str = "id, customer_id, class_id, term, is_free_trial, fee_amount,
    state, cancel_reason, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, booking_id, amount, payment_method, payment_status,
    transaction_id, receipt_number, payment_date, notes, last_event_at, created_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and run pending migrations
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");

        Ok(Self { pool })
    }
}

fn decode<T>(parsed: Option<T>, column: &str, raw: &str) -> Result<T> {
    parsed.ok_or_else(|| BookingError::Storage(format!("unexpected {column} value {raw:?}")))
}

#[derive(sqlx::FromRow)]
struct ClassRow {
    id: String,
    code: String,
    name: String,
    exercise_type_id: String,
    exercise_type_name: String,
    venue: String,
    address: String,
    zip_code: Option<String>,
    date: NaiveDate,
    time: NaiveTime,
    instructor_id: String,
    instructor_name: String,
    fee_criteria: String,
    fee_amount: Decimal,
    term: String,
}

impl TryFrom<ClassRow> for ClassOccurrence {
    type Error = BookingError;

    fn try_from(row: ClassRow) -> Result<Self> {
        Ok(Self {
            term: decode(Term::parse(&row.term), "term", &row.term)?,
            id: row.id.into(),
            code: row.code,
            name: row.name,
            exercise_type: ExerciseType {
                id: row.exercise_type_id.into(),
                name: row.exercise_type_name,
            },
            venue: row.venue,
            address: row.address,
            zip_code: row.zip_code,
            date: row.date,
            time: row.time,
            instructor: Instructor {
                id: row.instructor_id.into(),
                name: row.instructor_name,
            },
            fee_criteria: row.fee_criteria,
            fee_amount: row.fee_amount,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: String,
    name: String,
    venue: String,
    date: NaiveDate,
    time: NaiveTime,
    instructor_name: String,
    exercise_type: String,
    fee_amount: Decimal,
}

impl From<SummaryRow> for ClassOccurrenceSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            id: row.id.into(),
            name: row.name,
            venue: row.venue,
            date: row.date,
            time: row.time,
            instructor_name: row.instructor_name,
            exercise_type: row.exercise_type,
            fee_amount: row.fee_amount,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: String,
    first_name: String,
    surname: String,
    email: String,
    contact_no: String,
    date_of_birth: NaiveDate,
    address: String,
    suburb: Option<String>,
    post_code: Option<String>,
    next_of_kin_name: String,
    next_of_kin_phone: String,
    medical_conditions: Option<String>,
    paq: Option<Json<PaqResponse>>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = BookingError;

    fn try_from(row: CustomerRow) -> Result<Self> {
        Ok(Self {
            status: decode(CustomerStatus::parse(&row.status), "customer status", &row.status)?,
            id: row.id.into(),
            first_name: row.first_name,
            surname: row.surname,
            email: row.email,
            contact_no: row.contact_no,
            date_of_birth: row.date_of_birth,
            address: row.address,
            suburb: row.suburb,
            post_code: row.post_code,
            next_of_kin_name: row.next_of_kin_name,
            next_of_kin_phone: row.next_of_kin_phone,
            medical_conditions: row.medical_conditions,
            paq: row.paq.map(|Json(paq)| paq),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: String,
    customer_id: String,
    class_id: String,
    term: String,
    is_free_trial: bool,
    fee_amount: Decimal,
    state: String,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = BookingError;

    fn try_from(row: BookingRow) -> Result<Self> {
        let state = decode(
            BookingState::from_parts(&row.state, row.cancel_reason.as_deref()),
            "booking state",
            &row.state,
        )?;
        Ok(Self {
            term: decode(Term::parse(&row.term), "term", &row.term)?,
            id: row.id.into(),
            customer_id: row.customer_id.into(),
            class_id: row.class_id.into(),
            is_free_trial: row.is_free_trial,
            fee_amount: row.fee_amount,
            state,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: String,
    booking_id: String,
    amount: Decimal,
    payment_method: String,
    payment_status: String,
    transaction_id: Option<String>,
    receipt_number: String,
    payment_date: NaiveDate,
    notes: Option<String>,
    last_event_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = BookingError;

    fn try_from(row: PaymentRow) -> Result<Self> {
        Ok(Self {
            payment_method: decode(
                PaymentMethod::parse(&row.payment_method),
                "payment method",
                &row.payment_method,
            )?,
            payment_status: decode(
                PaymentStatus::parse(&row.payment_status),
                "payment status",
                &row.payment_status,
            )?,
            id: row.id.into(),
            booking_id: row.booking_id.into(),
            amount: row.amount,
            transaction_id: row.transaction_id,
            receipt_number: row.receipt_number,
            payment_date: row.payment_date,
            notes: row.notes,
            last_event_at: row.last_event_at,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn find_occurrences(&self, filter: &OccurrenceFilter) -> Result<Vec<ClassOccurrenceSummary>> {
        let exercise_type = filter.exercise_type();
        let rows: Vec<SummaryRow> = sqlx::query_as(
            "SELECT c.id, c.name, c.venue, c.date, c.time,
                    i.name AS instructor_name, e.name AS exercise_type, c.fee_amount
             FROM classes c
             JOIN exercise_types e ON e.id = c.exercise_type_id
             JOIN instructors i ON i.id = c.instructor_id
             WHERE ($1::text IS NULL
                    OR strpos(lower(c.venue), lower($1)) > 0
                    OR strpos(lower(coalesce(c.zip_code, '')), lower($1)) > 0)
               AND ($2::text IS NULL OR c.exercise_type_id = $2)
               AND ($3::date IS NULL OR c.date = $3)
             ORDER BY c.date, c.time, c.name",
        )
        .bind(filter.location())
        .bind(exercise_type.as_ref().map(|id| id.as_str()))
        .bind(filter.date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_occurrence(&self, id: &ClassId) -> Result<Option<ClassOccurrence>> {
        let row: Option<ClassRow> = sqlx::query_as(&format!("{CLASS_SELECT} WHERE c.id = $1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }
}

#[async_trait]
impl CustomerStore for PgStore {
    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO customers ({CUSTOMER_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"
        ))
        .bind(customer.id.as_str())
        .bind(&customer.first_name)
        .bind(&customer.surname)
        .bind(&customer.email)
        .bind(&customer.contact_no)
        .bind(customer.date_of_birth)
        .bind(&customer.address)
        .bind(&customer.suburb)
        .bind(&customer.post_code)
        .bind(&customer.next_of_kin_name)
        .bind(&customer.next_of_kin_phone)
        .bind(&customer.medical_conditions)
        .bind(customer.paq.as_ref().map(Json))
        .bind(customer.status.as_str())
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_customer(&self, id: &CustomerId) -> Result<Option<Customer>> {
        let row: Option<CustomerRow> =
            sqlx::query_as(&format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"))
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update_customer(&self, customer: &Customer) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE customers SET
                first_name = $2, surname = $3, email = $4, contact_no = $5,
                date_of_birth = $6, address = $7, suburb = $8, post_code = $9,
                next_of_kin_name = $10, next_of_kin_phone = $11,
                medical_conditions = $12, paq = $13, status = $14, updated_at = $15
             WHERE id = $1",
        )
        .bind(customer.id.as_str())
        .bind(&customer.first_name)
        .bind(&customer.surname)
        .bind(&customer.email)
        .bind(&customer.contact_no)
        .bind(customer.date_of_birth)
        .bind(&customer.address)
        .bind(&customer.suburb)
        .bind(&customer.post_code)
        .bind(&customer.next_of_kin_name)
        .bind(&customer.next_of_kin_phone)
        .bind(&customer.medical_conditions)
        .bind(customer.paq.as_ref().map(Json))
        .bind(customer.status.as_str())
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS}, status, payment_status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(booking.id.as_str())
        .bind(booking.customer_id.as_str())
        .bind(booking.class_id.as_str())
        .bind(booking.term.as_str())
        .bind(booking.is_free_trial)
        .bind(booking.fee_amount)
        .bind(booking.state.as_str())
        .bind(booking.state.cancel_reason().map(|r| r.as_str()))
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .bind(booking.status().as_str())
        .bind(booking.payment_status().as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_booking(&self, id: &BookingId) -> Result<Option<Booking>> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE ($1::text IS NULL OR class_id = $1)
               AND ($2::text IS NULL OR customer_id = $2)
             ORDER BY created_at DESC"
        ))
        .bind(filter.class_id.as_ref().map(ClassId::as_str))
        .bind(filter.customer_id.as_ref().map(CustomerId::as_str))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_booking(&self, booking: &Booking) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE bookings SET
                term = $2, state = $3, cancel_reason = $4,
                status = $5, payment_status = $6, updated_at = $7
             WHERE id = $1",
        )
        .bind(booking.id.as_str())
        .bind(booking.term.as_str())
        .bind(booking.state.as_str())
        .bind(booking.state.cancel_reason().map(|r| r.as_str()))
        .bind(booking.status().as_str())
        .bind(booking.payment_status().as_str())
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_booking(&self, id: &BookingId) -> Result<bool> {
        // payments go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO payments ({PAYMENT_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(payment.id.as_str())
        .bind(payment.booking_id.as_str())
        .bind(payment.amount)
        .bind(payment.payment_method.as_str())
        .bind(payment.payment_status.as_str())
        .bind(&payment.transaction_id)
        .bind(&payment.receipt_number)
        .bind(payment.payment_date)
        .bind(&payment.notes)
        .bind(payment.last_event_at)
        .bind(payment.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_payment(&self, payment: &Payment) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE payments SET payment_status = $2, last_event_at = $3, notes = $4
             WHERE id = $1",
        )
        .bind(payment.id.as_str())
        .bind(payment.payment_status.as_str())
        .bind(payment.last_event_at)
        .bind(&payment.notes)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_payment(&self, id: &PaymentId) -> Result<Option<Payment>> {
        let row: Option<PaymentRow> =
            sqlx::query_as(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn payments_for_booking(&self, booking_id: &BookingId) -> Result<Vec<Payment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = $1
             ORDER BY receipt_number"
        ))
        .bind(booking_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_payment_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments
             WHERE transaction_id = $1 AND payment_method = 'stripe'
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn next_receipt_number(&self) -> Result<String> {
        let (seq,): (i64,) = sqlx::query_as("SELECT nextval('receipt_number_seq')")
            .fetch_one(&self.pool)
            .await?;
        let seq = u64::try_from(seq)
            .map_err(|_| BookingError::Storage(format!("receipt sequence returned {seq}")))?;
        Ok(format_receipt_number(seq))
    }
}

impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }
}

//! Payment receipts
//!
//! A4 layout, positions in millimetres from the top-left corner.

use chrono::NaiveDate;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{BookingError, Result};
use crate::model::{Booking, ClassOccurrence, Customer, Payment};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;

const COMPANY: &str = "SHARE CRM";
const COMPANY_ADDRESS: &str = "123 Exercise Street, Fitness VIC 3000";
const COMPANY_CONTACT: &str = "support@sharecrm.com | 1800 XXX XXX";

/// Everything printed on a receipt
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptData {
    pub receipt_number: String,
    pub payment_date: NaiveDate,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub class_name: String,
    pub instructor_name: String,
    pub term: String,
    pub venue: String,
    pub amount: Decimal,
    pub payment_method: String,
    pub payment_status: String,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
}

impl ReceiptData {
    pub fn new(payment: &Payment, booking: &Booking, customer: &Customer, class: &ClassOccurrence) -> Self {
        Self {
            receipt_number: payment.receipt_number.clone(),
            payment_date: payment.payment_date,
            customer_name: customer.full_name(),
            customer_email: customer.email.clone(),
            customer_phone: customer.contact_no.clone(),
            class_name: class.name.clone(),
            instructor_name: class.instructor.name.clone(),
            term: booking.term.to_string(),
            venue: class.venue.clone(),
            amount: payment.amount,
            payment_method: payment.payment_method.as_str().to_string(),
            payment_status: payment.payment_status.as_str().to_string(),
            transaction_id: payment.transaction_id.clone(),
            notes: payment.notes.clone(),
        }
    }
}

struct Page {
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl Page {
    fn text(&self, text: &str, size: f32, x: f32, y: f32) {
        self.layer
            .use_text(text, size, Mm(x), Mm(PAGE_HEIGHT - y), &self.regular);
    }

    fn heading(&self, text: &str, size: f32, x: f32, y: f32) {
        self.layer
            .use_text(text, size, Mm(x), Mm(PAGE_HEIGHT - y), &self.bold);
    }
}

fn pdf_err(err: impl std::fmt::Display) -> BookingError {
    BookingError::Receipt(err.to_string())
}

/// Render a receipt as PDF bytes
pub fn render_pdf(data: &ReceiptData) -> Result<Vec<u8>> {
    let title = format!("Receipt {}", data.receipt_number);
    let (doc, page, layer) = PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Receipt");

    let page = Page {
        layer: doc.get_page(page).get_layer(layer),
        regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?,
        bold: doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?,
    };

    page.heading(COMPANY, 24.0, 20.0, 20.0);
    page.text(&format!("Receipt #{}", data.receipt_number), 12.0, 20.0, 35.0);
    page.text(&data.payment_date.format("%d.%m.%Y").to_string(), 12.0, 140.0, 35.0);

    page.heading("Customer:", 12.0, 20.0, 60.0);
    page.text(&data.customer_name, 11.0, 20.0, 67.0);
    page.text(&data.customer_email, 11.0, 20.0, 74.0);
    page.text(&data.customer_phone, 11.0, 20.0, 81.0);

    page.heading("Class Details:", 12.0, 20.0, 100.0);
    page.text(&format!("Class: {}", data.class_name), 11.0, 20.0, 107.0);
    page.text(&format!("Instructor: {}", data.instructor_name), 11.0, 20.0, 114.0);
    page.text(&format!("Term: {}", data.term), 11.0, 20.0, 121.0);
    page.text(&format!("Venue: {}", data.venue), 11.0, 20.0, 128.0);

    page.heading("Payment Details:", 12.0, 20.0, 147.0);
    let mut rows = vec![
        ("Amount:", format!("${:.2}", data.amount)),
        ("Method:", data.payment_method.clone()),
        ("Status:", data.payment_status.clone()),
    ];
    if let Some(txn) = &data.transaction_id {
        rows.push(("Transaction ID:", txn.clone()));
    }
    let mut y = 154.0;
    for (label, value) in &rows {
        page.text(label, 11.0, 20.0, y);
        page.text(value, 11.0, 70.0, y);
        y += 7.0;
    }

    if let Some(notes) = &data.notes {
        page.heading("Notes:", 12.0, 20.0, y + 10.0);
        page.text(notes, 11.0, 20.0, y + 17.0);
    }

    page.text(&format!("Thank you for choosing {COMPANY}!"), 11.0, 20.0, 270.0);
    page.text(COMPANY, 9.0, 20.0, 280.0);
    page.text(COMPANY_ADDRESS, 9.0, 20.0, 285.0);
    page.text(COMPANY_CONTACT, 9.0, 20.0, 290.0);

    doc.save_to_bytes().map_err(pdf_err)
}

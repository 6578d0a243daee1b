//! Delivery challan and its payment ledger.
//!
//! Status and paid amount are derived from the payment history. Outside the
//! crate a challan can only be read; it changes through the challan ledger.

use super::{CustomerRef, Entity, QuantityUnit, TaxSplit, VendorRef};
use crate::ids;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Challan status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallanStatus {
    Pending,
    Partial,
    Paid,
    Cancelled,
    Converted,
}

impl ChallanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallanStatus::Pending => "pending",
            ChallanStatus::Partial => "partial",
            ChallanStatus::Paid => "paid",
            ChallanStatus::Cancelled => "cancelled",
            ChallanStatus::Converted => "converted",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ChallanStatus::Cancelled | ChallanStatus::Converted)
    }

    /// Status implied by the amounts alone.
    pub fn derive(paid_amount: Decimal, total_amount: Decimal) -> Self {
        if paid_amount >= total_amount {
            ChallanStatus::Paid
        } else if paid_amount > Decimal::ZERO {
            ChallanStatus::Partial
        } else {
            ChallanStatus::Pending
        }
    }
}

impl std::fmt::Display for ChallanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of document a challan was issued from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Order,
    Request,
    ManufacturingOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallanSourceRef {
    pub source_type: SourceType,
    pub source_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Upi,
    Cheque,
    Card,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::Card => "card",
            PaymentMethod::Other => "other",
        }
    }
}

/// A recorded payment. Never removed, even when the challan is cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub note: Option<String>,
    pub recorded_utc: DateTime<Utc>,
}

/// Input for recording a payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub note: Option<String>,
}

impl NewPayment {
    pub fn new(date: NaiveDate, amount: Decimal, method: PaymentMethod) -> Self {
        Self {
            date,
            amount,
            method,
            note: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallanLine {
    pub name: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit: QuantityUnit,
    pub rate: Decimal,
    pub amount: Decimal,
    pub tax_code: Option<String>,
}

/// Delivery challan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ChallanRecord")]
pub struct Challan {
    id: String,
    challan_number: String,
    date: NaiveDate,
    customer: CustomerRef,
    counterparty: VendorRef,
    line_items: Vec<ChallanLine>,
    subtotal: Decimal,
    tax: TaxSplit,
    tax_amount: Decimal,
    total_amount: Decimal,
    paid_amount: Decimal,
    payment_history: Vec<PaymentRecord>,
    status: ChallanStatus,
    source: ChallanSourceRef,
    invoice_id: Option<String>,
    pub notes: Option<String>,
    created_utc: DateTime<Utc>,
}

/// Persisted shape, checked before it becomes a [`Challan`].
#[derive(Deserialize)]
struct ChallanRecord {
    id: String,
    challan_number: String,
    date: NaiveDate,
    customer: CustomerRef,
    #[serde(default)]
    counterparty: VendorRef,
    line_items: Vec<ChallanLine>,
    subtotal: Decimal,
    #[serde(default)]
    tax: TaxSplit,
    tax_amount: Decimal,
    total_amount: Decimal,
    paid_amount: Decimal,
    #[serde(default)]
    payment_history: Vec<PaymentRecord>,
    status: ChallanStatus,
    source: ChallanSourceRef,
    invoice_id: Option<String>,
    notes: Option<String>,
    created_utc: DateTime<Utc>,
}

impl TryFrom<ChallanRecord> for Challan {
    type Error = String;

    fn try_from(record: ChallanRecord) -> Result<Self, Self::Error> {
        let history_total: Decimal = record.payment_history.iter().map(|p| p.amount).sum();
        if history_total != record.paid_amount {
            return Err(format!(
                "challan {}: paid amount {} does not match payment history total {}",
                record.id, record.paid_amount, history_total
            ));
        }
        if record.total_amount <= Decimal::ZERO {
            return Err(format!(
                "challan {}: total amount {} must be greater than zero",
                record.id, record.total_amount
            ));
        }
        if record.status == ChallanStatus::Converted && record.invoice_id.is_none() {
            return Err(format!(
                "challan {}: converted without an invoice id",
                record.id
            ));
        }

        let status = if record.status.is_closed() {
            record.status
        } else {
            ChallanStatus::derive(record.paid_amount, record.total_amount)
        };

        Ok(Challan {
            id: record.id,
            challan_number: record.challan_number,
            date: record.date,
            customer: record.customer,
            counterparty: record.counterparty,
            line_items: record.line_items,
            subtotal: record.subtotal,
            tax: record.tax,
            tax_amount: record.tax_amount,
            total_amount: record.total_amount,
            paid_amount: record.paid_amount,
            payment_history: record.payment_history,
            status,
            source: record.source,
            invoice_id: record.invoice_id,
            notes: record.notes,
            created_utc: record.created_utc,
        })
    }
}

/// Snapshot values a new challan starts from.
pub(crate) struct ChallanDraft {
    pub challan_number: String,
    pub date: NaiveDate,
    pub customer: CustomerRef,
    pub counterparty: VendorRef,
    pub line_items: Vec<ChallanLine>,
    pub subtotal: Decimal,
    pub tax: TaxSplit,
    pub source: ChallanSourceRef,
}

impl Challan {
    pub(crate) fn open(draft: ChallanDraft) -> Self {
        let tax_amount = draft.tax.total_tax();
        let total_amount = draft.subtotal + tax_amount;
        Self {
            id: String::new(),
            challan_number: draft.challan_number,
            date: draft.date,
            customer: draft.customer,
            counterparty: draft.counterparty,
            line_items: draft.line_items,
            subtotal: draft.subtotal,
            tax: draft.tax,
            tax_amount,
            total_amount,
            paid_amount: Decimal::ZERO,
            payment_history: Vec::new(),
            status: ChallanStatus::derive(Decimal::ZERO, total_amount),
            source: draft.source,
            invoice_id: None,
            notes: None,
            created_utc: Utc::now(),
        }
    }

    pub(crate) fn push_payment(&mut self, record: PaymentRecord) {
        self.payment_history.push(record);
        self.paid_amount = self.payment_history.iter().map(|p| p.amount).sum();
        self.status = ChallanStatus::derive(self.paid_amount, self.total_amount);
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.status = ChallanStatus::Cancelled;
    }

    pub(crate) fn mark_converted(&mut self, invoice_id: String) {
        self.status = ChallanStatus::Converted;
        self.invoice_id = Some(invoice_id);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn challan_number(&self) -> &str {
        &self.challan_number
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn customer(&self) -> &CustomerRef {
        &self.customer
    }

    pub fn counterparty(&self) -> &VendorRef {
        &self.counterparty
    }

    pub fn line_items(&self) -> &[ChallanLine] {
        &self.line_items
    }

    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    pub fn tax(&self) -> &TaxSplit {
        &self.tax
    }

    pub fn tax_amount(&self) -> Decimal {
        self.tax_amount
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn paid_amount(&self) -> Decimal {
        self.paid_amount
    }

    /// Balance still owed, never negative.
    pub fn remaining(&self) -> Decimal {
        (self.total_amount - self.paid_amount).max(Decimal::ZERO)
    }

    pub fn payment_history(&self) -> &[PaymentRecord] {
        &self.payment_history
    }

    pub fn status(&self) -> ChallanStatus {
        self.status
    }

    pub fn source(&self) -> &ChallanSourceRef {
        &self.source
    }

    pub fn invoice_id(&self) -> Option<&str> {
        self.invoice_id.as_deref()
    }

    pub fn created_utc(&self) -> DateTime<Utc> {
        self.created_utc
    }
}

impl Entity for Challan {
    const KIND: &'static str = "challan";
    const COLLECTION: &'static str = "challans";
    const ID_PREFIX: &'static str = ids::CHALLAN_PREFIX;
    const PROTECTED_FIELDS: &'static [&'static str] = &[
        "status",
        "paid_amount",
        "payment_history",
        "invoice_id",
        "total_amount",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn sample() -> Challan {
        let mut challan = Challan::open(ChallanDraft {
            challan_number: "DC-20260105-0001".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            customer: CustomerRef::new("CUST-9", "Mehta Textiles"),
            counterparty: VendorRef::House,
            line_items: vec![ChallanLine {
                name: "Denim 12oz".to_string(),
                quantity: d("10"),
                unit: QuantityUnit::Meter,
                rate: d("100"),
                amount: d("1000"),
                tax_code: Some("5209".to_string()),
            }],
            subtotal: d("1000"),
            tax: TaxSplit::default(),
            source: ChallanSourceRef {
                source_type: SourceType::Request,
                source_id: "REQ-1".to_string(),
            },
        });
        challan.set_id("CHL-1".to_string());
        challan
    }

    fn payment(amount: &str) -> PaymentRecord {
        PaymentRecord {
            date: NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(),
            amount: d(amount),
            method: PaymentMethod::Cash,
            note: None,
            recorded_utc: Utc::now(),
        }
    }

    #[test]
    fn status_follows_payments() {
        let mut challan = sample();
        assert_eq!(challan.status(), ChallanStatus::Pending);
        challan.push_payment(payment("250"));
        assert_eq!(challan.status(), ChallanStatus::Partial);
        challan.push_payment(payment("750"));
        assert_eq!(challan.status(), ChallanStatus::Paid);
        assert_eq!(challan.paid_amount(), d("1000"));
    }

    #[test]
    fn stored_status_is_rederived_on_load() {
        let mut challan = sample();
        challan.push_payment(payment("100"));
        let mut value = serde_json::to_value(&challan).unwrap();
        value["status"] = serde_json::json!("paid");

        let loaded: Challan = serde_json::from_value(value).unwrap();
        assert_eq!(loaded.status(), ChallanStatus::Partial);
    }

    #[test]
    fn tampered_paid_amount_is_rejected_on_load() {
        let mut challan = sample();
        challan.push_payment(payment("100"));
        let mut value = serde_json::to_value(&challan).unwrap();
        value["paid_amount"] = serde_json::json!("900");

        assert!(serde_json::from_value::<Challan>(value).is_err());
    }

    #[test]
    fn zero_total_is_rejected_on_load() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["subtotal"] = serde_json::json!("0");
        value["total_amount"] = serde_json::json!("0");

        assert!(serde_json::from_value::<Challan>(value).is_err());
    }

    #[test]
    fn converted_without_invoice_is_rejected_on_load() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["status"] = serde_json::json!("converted");

        assert!(serde_json::from_value::<Challan>(value).is_err());
    }
}

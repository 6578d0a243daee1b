//! Document export for finalized challans and orders.

use crate::models::{Challan, Order};
use serde_json::{json, Value};
use service_core::error::AppError;

/// Renders finalized documents for printing or accounting import. The
/// output never flows back into the ledger.
pub trait DocumentExporter: Send + Sync {
    fn content_type(&self) -> &'static str;
    fn export_challan(&self, challan: &Challan) -> Result<Vec<u8>, AppError>;
    fn export_order(&self, order: &Order) -> Result<Vec<u8>, AppError>;
}

#[derive(Debug, Clone, Default)]
pub struct JsonExporter {
    pub pretty: bool,
}

impl JsonExporter {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, AppError> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        Ok(bytes)
    }
}

impl DocumentExporter for JsonExporter {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn export_challan(&self, challan: &Challan) -> Result<Vec<u8>, AppError> {
        let tax = challan.tax();
        self.encode(&json!({
            "document": "delivery_challan",
            "number": challan.challan_number(),
            "date": challan.date(),
            "customer": challan.customer(),
            "lines": challan.line_items(),
            "subtotal": challan.subtotal(),
            "igst": tax.igst,
            "cgst": tax.cgst,
            "sgst": tax.sgst,
            "tax_amount": challan.tax_amount(),
            "total_amount": challan.total_amount(),
            "paid_amount": challan.paid_amount(),
            "balance": challan.remaining(),
            "payments": challan.payment_history(),
            "status": challan.status(),
            "invoice_id": challan.invoice_id(),
        }))
    }

    fn export_order(&self, order: &Order) -> Result<Vec<u8>, AppError> {
        self.encode(&json!({
            "document": "order",
            "id": order.id,
            "buyer": order.buyer,
            "vendor": order.vendor,
            "lines": order.line_items,
            "subtotal": order.subtotal,
            "tax_amount": order.tax_amount,
            "total": order.total,
            "status": order.status,
            "payment_status": order.payment_status,
            "created_utc": order.created_utc,
        }))
    }
}

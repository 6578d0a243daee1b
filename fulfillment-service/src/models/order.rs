//! Vendor-scoped commercial order.

use super::{CustomerRef, Entity, FabricSpec, QuantityUnit, VendorRef};
use crate::ids;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Confirmed,
    Finalized,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Finalized => "finalized",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

/// Order line. Cost and selling price are kept apart per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub request_item_id: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit: QuantityUnit,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    #[serde(default)]
    pub fabric: FabricSpec,
    pub tax_code: Option<String>,
}

impl OrderLine {
    /// Unrounded selling value of the line.
    pub fn selling_value(&self) -> Decimal {
        self.selling_price * self.quantity
    }

    /// Unrounded cost value of the line.
    pub fn cost_value(&self) -> Decimal {
        self.cost_price * self.quantity
    }
}

/// Order document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub buyer: CustomerRef,
    pub vendor: VendorRef,
    pub line_items: Vec<OrderLine>,
    /// Customer-facing subtotal, from selling prices.
    pub subtotal: Decimal,
    /// Vendor-facing total, from cost prices.
    pub cost_total: Decimal,
    pub tax_rate: Option<Decimal>,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub source_request_id: Option<String>,
    pub source_challan_id: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Order {
    pub fn margin(&self) -> Decimal {
        self.subtotal - self.cost_total
    }
}

impl Entity for Order {
    const KIND: &'static str = "order";
    const COLLECTION: &'static str = "orders";
    const ID_PREFIX: &'static str = ids::ORDER_PREFIX;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

//! Domain errors for fulfillment-service.

use crate::models::{ChallanStatus, ItemStatus, Order, Request};
use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::retry::Retryable;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FulfillmentError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: ItemStatus, to: ItemStatus },

    #[error("Nothing to convert: no customer-approved items")]
    NothingToConvert,

    /// Some vendor groups were persisted and others were not. Items of the
    /// failed groups are left untouched in `request`.
    #[error("Partial conversion failure: {} vendor group(s) failed", .failed_vendors.len())]
    PartialConversionFailure {
        failed_vendors: Vec<String>,
        succeeded_order_ids: Vec<String>,
        orders: Vec<Order>,
        request: Box<Request>,
    },

    #[error("Overpayment rejected: attempted {attempted}, remaining {remaining}")]
    OverpaymentRejected {
        attempted: Decimal,
        remaining: Decimal,
    },

    #[error("Challan not fully paid: paid {paid} of {total}")]
    NotFullyPaid { paid: Decimal, total: Decimal },

    #[error("Cannot cancel a challan in status {status}")]
    CannotCancelPaid { status: ChallanStatus },

    #[error("Challan is closed ({status})")]
    ChallanClosed { status: ChallanStatus },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Color number {number} already exists in quality {quality}")]
    DuplicateColorNumber { quality: String, number: u32 },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl FulfillmentError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        FulfillmentError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FulfillmentError::InvalidTransition { .. } => "invalid_transition",
            FulfillmentError::NothingToConvert => "nothing_to_convert",
            FulfillmentError::PartialConversionFailure { .. } => "partial_conversion_failure",
            FulfillmentError::OverpaymentRejected { .. } => "overpayment_rejected",
            FulfillmentError::NotFullyPaid { .. } => "not_fully_paid",
            FulfillmentError::CannotCancelPaid { .. } => "cannot_cancel_paid",
            FulfillmentError::ChallanClosed { .. } => "challan_closed",
            FulfillmentError::NotFound { .. } => "not_found",
            FulfillmentError::DuplicateColorNumber { .. } => "duplicate_color_number",
            FulfillmentError::ValidationError(_) => "validation_error",
            FulfillmentError::Store(e) => e.kind(),
        }
    }
}

impl Retryable for FulfillmentError {
    fn is_retryable(&self) -> bool {
        match self {
            FulfillmentError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FulfillmentError>;

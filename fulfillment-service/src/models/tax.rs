//! Tax split values.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// GST split of a taxable value. Monetary fields are rounded to two places.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSplit {
    pub taxable_value: Decimal,
    pub igst: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub total_value: Decimal,
}

impl TaxSplit {
    pub fn total_tax(&self) -> Decimal {
        self.igst + self.cgst + self.sgst
    }

    pub fn is_interstate(&self) -> bool {
        self.igst > Decimal::ZERO
    }
}

/// Aggregated tax figures for a reporting period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub document_count: usize,
    pub taxable_value: Decimal,
    pub igst: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
}

impl TaxSummary {
    pub fn total_tax(&self) -> Decimal {
        self.igst + self.cgst + self.sgst
    }
}

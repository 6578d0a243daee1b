//! Production order snapshot, one of the challan sources.

use super::{CustomerRef, QuantityUnit};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Line produced in-house.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManufacturingLine {
    pub name: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit: QuantityUnit,
    pub rate: Decimal,
    pub tax_code: Option<String>,
}

/// Manufacturing order as handed over by the production module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManufacturingOrder {
    pub id: String,
    pub customer: CustomerRef,
    pub lines: Vec<ManufacturingLine>,
    pub tax_rate: Option<Decimal>,
}

//! GST split calculation.
//!
//! Inter-state supplies carry IGST; intra-state supplies split the same
//! amount evenly into CGST and SGST. Values are rounded half-up to two
//! places only when a [`TaxSplit`] is produced.

use crate::error::{FulfillmentError, Result};
use crate::models::{Challan, ChallanStatus, TaxSplit, TaxSummary};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

/// Tax calculation service.
#[derive(Debug, Clone)]
pub struct TaxCalculator;

impl TaxCalculator {
    /// Round a monetary value to two places, half away from zero.
    pub fn round_money(value: Decimal) -> Decimal {
        value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    /// A rate is a fraction between 0 and 1 inclusive.
    pub fn validate_rate(rate: Decimal) -> Result<()> {
        if rate < Decimal::ZERO {
            return Err(FulfillmentError::ValidationError(
                "tax rate cannot be negative".to_string(),
            ));
        }
        if rate > Decimal::ONE {
            return Err(FulfillmentError::ValidationError(
                "tax rate cannot exceed 1.0".to_string(),
            ));
        }
        Ok(())
    }

    /// A buyer without a declared region is treated as local.
    pub fn is_interstate(buyer_region: Option<&str>, seller_region: &str) -> bool {
        match buyer_region.map(str::trim).filter(|r| !r.is_empty()) {
            Some(buyer) => !buyer.eq_ignore_ascii_case(seller_region.trim()),
            None => false,
        }
    }

    pub fn split(
        taxable_value: Decimal,
        buyer_region: Option<&str>,
        seller_region: &str,
        rate: Decimal,
    ) -> Result<TaxSplit> {
        Self::validate_rate(rate)?;

        let tax = taxable_value * rate;
        let mut split = TaxSplit {
            taxable_value: Self::round_money(taxable_value),
            total_value: Self::round_money(taxable_value + tax),
            ..TaxSplit::default()
        };

        if Self::is_interstate(buyer_region, seller_region) {
            split.igst = Self::round_money(tax);
        } else {
            let half = Self::round_money(tax / Decimal::TWO);
            split.cgst = half;
            split.sgst = half;
        }

        Ok(split)
    }

    /// Split the sum of several line values. The sum is taken before any
    /// rounding.
    pub fn split_lines<I>(
        line_values: I,
        buyer_region: Option<&str>,
        seller_region: &str,
        rate: Decimal,
    ) -> Result<TaxSplit>
    where
        I: IntoIterator<Item = Decimal>,
    {
        let taxable: Decimal = line_values.into_iter().sum();
        Self::split(taxable, buyer_region, seller_region, rate)
    }

    /// Aggregate tax over challans dated within `from..=to`. Cancelled
    /// challans are left out.
    pub fn summarize(challans: &[Challan], from: NaiveDate, to: NaiveDate) -> TaxSummary {
        let mut summary = TaxSummary {
            from,
            to,
            document_count: 0,
            taxable_value: Decimal::ZERO,
            igst: Decimal::ZERO,
            cgst: Decimal::ZERO,
            sgst: Decimal::ZERO,
        };

        for challan in challans
            .iter()
            .filter(|c| c.status() != ChallanStatus::Cancelled)
            .filter(|c| c.date() >= from && c.date() <= to)
        {
            let tax = challan.tax();
            summary.document_count += 1;
            summary.taxable_value += tax.taxable_value;
            summary.igst += tax.igst;
            summary.cgst += tax.cgst;
            summary.sgst += tax.sgst;
        }

        summary
    }
}

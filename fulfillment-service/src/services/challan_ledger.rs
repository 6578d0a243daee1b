//! Challan lifecycle: issue from a source document, record payments,
//! convert to an invoice order, cancel.
//!
//! Every operation takes a challan by reference and returns the updated
//! value. Persisting it is up to the caller.

use crate::error::{FulfillmentError, Result};
use crate::ids;
use crate::models::{
    Challan, ChallanDraft, ChallanLine, ChallanLink, ChallanSourceRef, ChallanStatus,
    CustomerRef, ItemStatus, ManufacturingOrder, NewPayment, Order, OrderLine, OrderStatus,
    PaymentRecord, PaymentStatus, QuantityUnit, Request, SourceType, VendorRef,
};
use crate::services::metrics::{CHALLANS_TOTAL, PAYMENTS_TOTAL, PAYMENT_AMOUNT_TOTAL};
use crate::services::tax::TaxCalculator;
use chrono::{NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Document a challan can be issued from.
#[derive(Debug, Clone, Copy)]
pub enum ChallanSource<'a> {
    Order(&'a Order),
    Request(&'a Request),
    ManufacturingOrder(&'a ManufacturingOrder),
}

impl ChallanSource<'_> {
    pub fn source_ref(&self) -> ChallanSourceRef {
        let (source_type, source_id) = match self {
            ChallanSource::Order(o) => (SourceType::Order, &o.id),
            ChallanSource::Request(r) => (SourceType::Request, &r.id),
            ChallanSource::ManufacturingOrder(m) => (SourceType::ManufacturingOrder, &m.id),
        };
        ChallanSourceRef {
            source_type,
            source_id: source_id.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Region the business is registered in.
    pub seller_region: String,
    /// Amount a payment may exceed the balance by before it is rejected.
    pub overpayment_tolerance: Decimal,
}

impl LedgerSettings {
    pub fn new(seller_region: impl Into<String>) -> Self {
        Self {
            seller_region: seller_region.into(),
            overpayment_tolerance: Decimal::new(1, 2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChallanLedger {
    settings: LedgerSettings,
}

impl ChallanLedger {
    pub fn new(settings: LedgerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Next number in the `DC-YYYYMMDD-NNNN` sequence for `date`.
    pub fn next_challan_number(existing: &[Challan], date: NaiveDate) -> String {
        let prefix = format!("DC-{}-", date.format("%Y%m%d"));
        let last = existing
            .iter()
            .filter_map(|c| c.challan_number().strip_prefix(&prefix))
            .filter_map(|seq| seq.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("{}{:04}", prefix, last + 1)
    }

    /// Snapshot `source` into a new pending challan.
    pub fn create_from_source(
        &self,
        source: ChallanSource<'_>,
        challan_number: String,
        date: NaiveDate,
    ) -> Result<Challan> {
        let (customer, counterparty, lines, rate) = Self::snapshot(&source);
        if lines.is_empty() {
            return Err(FulfillmentError::ValidationError(
                "source has no deliverable lines".to_string(),
            ));
        }

        let exact: Vec<Decimal> = lines.iter().map(|(_, value)| *value).collect();
        let subtotal = TaxCalculator::round_money(exact.iter().copied().sum());
        let tax = TaxCalculator::split_lines(
            exact,
            customer.region.as_deref(),
            &self.settings.seller_region,
            rate.unwrap_or_default(),
        )?;

        let challan = Challan::open(ChallanDraft {
            challan_number,
            date,
            customer,
            counterparty,
            line_items: lines.into_iter().map(|(line, _)| line).collect(),
            subtotal,
            tax,
            source: source.source_ref(),
        });
        if challan.total_amount() <= Decimal::ZERO {
            return Err(FulfillmentError::ValidationError(format!(
                "challan total must be greater than zero, got {}",
                challan.total_amount()
            )));
        }

        CHALLANS_TOTAL.with_label_values(&["issued"]).inc();
        info!(
            challan_number = %challan.challan_number(),
            source_id = %challan.source().source_id,
            total_amount = %challan.total_amount(),
            "Challan created"
        );
        Ok(challan)
    }

    /// Lines paired with their unrounded amount.
    #[allow(clippy::type_complexity)]
    fn snapshot(
        source: &ChallanSource<'_>,
    ) -> (CustomerRef, VendorRef, Vec<(ChallanLine, Decimal)>, Option<Decimal>) {
        fn line(
            name: &str,
            quantity: Decimal,
            unit: QuantityUnit,
            rate: Decimal,
            tax_code: Option<String>,
        ) -> (ChallanLine, Decimal) {
            let value = rate * quantity;
            (
                ChallanLine {
                    name: name.to_string(),
                    quantity,
                    unit,
                    rate,
                    amount: TaxCalculator::round_money(value),
                    tax_code,
                },
                value,
            )
        }

        match source {
            ChallanSource::Order(order) => (
                order.buyer.clone(),
                order.vendor.clone(),
                order
                    .line_items
                    .iter()
                    .map(|l| {
                        line(
                            &l.description,
                            l.quantity,
                            l.unit,
                            l.selling_price,
                            l.tax_code.clone(),
                        )
                    })
                    .collect(),
                order.tax_rate,
            ),
            ChallanSource::Request(request) => (
                request.customer.clone(),
                VendorRef::House,
                request
                    .items
                    .iter()
                    .filter(|i| {
                        !matches!(
                            i.status,
                            ItemStatus::Cancelled
                                | ItemStatus::VendorUnavailable
                                | ItemStatus::Converted
                        )
                    })
                    .map(|i| {
                        line(
                            i.product.label(),
                            i.quantity,
                            i.unit,
                            i.target_price.unwrap_or_default(),
                            None,
                        )
                    })
                    .collect(),
                None,
            ),
            ChallanSource::ManufacturingOrder(mo) => (
                mo.customer.clone(),
                VendorRef::House,
                mo.lines
                    .iter()
                    .map(|l| line(&l.name, l.quantity, l.unit, l.rate, l.tax_code.clone()))
                    .collect(),
                mo.tax_rate,
            ),
        }
    }

    pub fn record_payment(&self, challan: &Challan, payment: NewPayment) -> Result<Challan> {
        let status = challan.status();
        if status.is_closed() {
            return Err(FulfillmentError::ChallanClosed { status });
        }
        if payment.amount <= Decimal::ZERO {
            return Err(FulfillmentError::ValidationError(
                "payment amount must be greater than zero".to_string(),
            ));
        }

        let remaining = challan.total_amount() - challan.paid_amount();
        if payment.amount > remaining + self.settings.overpayment_tolerance {
            warn!(
                challan_id = %challan.id(),
                attempted = %payment.amount,
                remaining = %remaining,
                "Overpayment rejected"
            );
            return Err(FulfillmentError::OverpaymentRejected {
                attempted: payment.amount,
                remaining: remaining.max(Decimal::ZERO),
            });
        }

        let mut next = challan.clone();
        next.push_payment(PaymentRecord {
            date: payment.date,
            amount: payment.amount,
            method: payment.method,
            note: payment.note,
            recorded_utc: Utc::now(),
        });

        PAYMENTS_TOTAL
            .with_label_values(&[payment.method.as_str()])
            .inc();
        PAYMENT_AMOUNT_TOTAL
            .with_label_values(&[payment.method.as_str()])
            .inc_by(payment.amount.to_f64().unwrap_or(0.0));
        if next.status() == ChallanStatus::Paid {
            CHALLANS_TOTAL.with_label_values(&["paid"]).inc();
        }

        info!(
            challan_id = %next.id(),
            amount = %payment.amount,
            paid_amount = %next.paid_amount(),
            status = %next.status(),
            "Payment recorded"
        );
        Ok(next)
    }

    /// Turn a fully paid challan into a finalized order.
    pub fn convert_to_invoice(&self, challan: &Challan) -> Result<(Challan, Order)> {
        match challan.status() {
            ChallanStatus::Paid => {}
            ChallanStatus::Pending | ChallanStatus::Partial => {
                return Err(FulfillmentError::NotFullyPaid {
                    paid: challan.paid_amount(),
                    total: challan.total_amount(),
                })
            }
            status @ (ChallanStatus::Cancelled | ChallanStatus::Converted) => {
                return Err(FulfillmentError::ChallanClosed { status })
            }
        }

        let source = challan.source();
        let order = Order {
            id: ids::next_id(ids::ORDER_PREFIX),
            buyer: challan.customer().clone(),
            vendor: challan.counterparty().clone(),
            line_items: challan
                .line_items()
                .iter()
                .map(|l| OrderLine {
                    request_item_id: None,
                    description: l.name.clone(),
                    quantity: l.quantity,
                    unit: l.unit,
                    cost_price: l.rate,
                    selling_price: l.rate,
                    fabric: Default::default(),
                    tax_code: l.tax_code.clone(),
                })
                .collect(),
            subtotal: challan.subtotal(),
            cost_total: challan.subtotal(),
            tax_rate: None,
            tax_amount: challan.tax_amount(),
            total: challan.total_amount(),
            status: OrderStatus::Finalized,
            payment_status: PaymentStatus::Paid,
            source_request_id: (source.source_type == SourceType::Request)
                .then(|| source.source_id.clone()),
            source_challan_id: Some(challan.id().to_string()),
            created_utc: Utc::now(),
        };

        let mut next = challan.clone();
        next.mark_converted(order.id.clone());

        CHALLANS_TOTAL.with_label_values(&["converted"]).inc();
        info!(challan_id = %next.id(), order_id = %order.id, "Challan converted to invoice");
        Ok((next, order))
    }

    /// Cancel an unpaid or partly paid challan. Recorded payments stay.
    pub fn cancel(&self, challan: &Challan) -> Result<Challan> {
        match challan.status() {
            ChallanStatus::Pending | ChallanStatus::Partial => {}
            status @ (ChallanStatus::Paid | ChallanStatus::Converted) => {
                return Err(FulfillmentError::CannotCancelPaid { status })
            }
            status @ ChallanStatus::Cancelled => {
                return Err(FulfillmentError::ChallanClosed { status })
            }
        }

        let mut next = challan.clone();
        next.mark_cancelled();

        CHALLANS_TOTAL.with_label_values(&["cancelled"]).inc();
        info!(
            challan_id = %next.id(),
            paid_amount = %next.paid_amount(),
            "Challan cancelled"
        );
        Ok(next)
    }

    /// Record `challan` on the request it was issued from.
    pub fn link_request(request: &Request, challan: &Challan) -> Result<Request> {
        let source = challan.source();
        if source.source_type != SourceType::Request || source.source_id != request.id {
            return Err(FulfillmentError::ValidationError(format!(
                "challan {} was not issued from request {}",
                challan.challan_number(),
                request.id
            )));
        }

        let mut next = request.clone();
        next.challan = Some(ChallanLink {
            challan_id: challan.id().to_string(),
            challan_number: challan.challan_number().to_string(),
            challan_date: challan.date(),
        });
        next.updated_utc = Utc::now();
        Ok(next)
    }
}

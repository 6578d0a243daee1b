//! Converts customer-approved request items into one draft order per
//! vendor.

use crate::error::{FulfillmentError, Result};
use crate::models::{
    ItemStatus, Order, OrderLine, OrderStatus, PaymentStatus, Request, RequestItem, VendorRef,
};
use crate::services::item_state::{ItemStateMachine, TransitionPayload};
use crate::services::metrics::{CONVERSIONS_TOTAL, ORDERS_TOTAL};
use crate::services::repository::Repository;
use crate::services::tax::TaxCalculator;
use chrono::Utc;
use rust_decimal::Decimal;
use service_core::retry::{retry_async, RetryConfig};
use tracing::{info, instrument, warn};

/// Approved items that share a vendor, and the order drafted for them.
#[derive(Debug, Clone)]
pub struct VendorGroup {
    pub vendor: VendorRef,
    pub item_ids: Vec<String>,
    pub order: Order,
}

#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub orders: Vec<Order>,
    pub request: Request,
    /// True if any order was only written to the local cache.
    pub degraded: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConversionEngine {
    retry: RetryConfig,
}

impl ConversionEngine {
    pub fn new(retry: RetryConfig) -> Self {
        Self { retry }
    }

    /// Group approved items by vendor, in order of first appearance.
    pub fn plan(request: &Request) -> Result<Vec<VendorGroup>> {
        let mut buckets: Vec<(VendorRef, Vec<&RequestItem>)> = Vec::new();
        for item in request.items_with_status(ItemStatus::CustomerApproved) {
            match buckets.iter_mut().find(|(vendor, _)| *vendor == item.vendor) {
                Some((_, items)) => items.push(item),
                None => buckets.push((item.vendor.clone(), vec![item])),
            }
        }

        if buckets.is_empty() {
            return Err(FulfillmentError::NothingToConvert);
        }

        Ok(buckets
            .into_iter()
            .map(|(vendor, items)| VendorGroup {
                item_ids: items.iter().map(|i| i.id.clone()).collect(),
                order: Self::draft_order(request, &vendor, &items),
                vendor,
            })
            .collect())
    }

    /// Draft order for one vendor group. The id is left for the repository
    /// to assign.
    pub fn draft_order(request: &Request, vendor: &VendorRef, items: &[&RequestItem]) -> Order {
        let line_items: Vec<OrderLine> = items
            .iter()
            .map(|item| OrderLine {
                request_item_id: Some(item.id.clone()),
                description: item.product.label().to_string(),
                quantity: item.quantity,
                unit: item.unit,
                cost_price: item.offered_price.or(item.target_price).unwrap_or_default(),
                selling_price: item.target_price.unwrap_or_default(),
                fabric: item.fabric.clone(),
                tax_code: None,
            })
            .collect();

        let subtotal =
            TaxCalculator::round_money(line_items.iter().map(OrderLine::selling_value).sum());
        let cost_total =
            TaxCalculator::round_money(line_items.iter().map(OrderLine::cost_value).sum());

        Order {
            id: String::new(),
            buyer: request.customer.clone(),
            vendor: vendor.clone(),
            line_items,
            subtotal,
            cost_total,
            tax_rate: None,
            tax_amount: Decimal::ZERO,
            total: subtotal,
            status: OrderStatus::Draft,
            payment_status: PaymentStatus::Unpaid,
            source_request_id: Some(request.id.clone()),
            source_challan_id: None,
            created_utc: Utc::now(),
        }
    }

    /// Persist one order per vendor group and mark the persisted groups'
    /// items converted.
    ///
    /// Each group is retried on transient store failures. If any group still
    /// fails, its items are left as they were and the error carries both the
    /// persisted orders and the updated request.
    #[instrument(skip(self, request, orders), fields(request_id = %request.id))]
    pub async fn convert_approved(
        &self,
        request: &Request,
        orders: &dyn Repository<Order>,
    ) -> Result<ConversionOutcome> {
        let groups = match Self::plan(request) {
            Ok(groups) => groups,
            Err(e) => {
                CONVERSIONS_TOTAL
                    .with_label_values(&["nothing_to_convert"])
                    .inc();
                return Err(e);
            }
        };

        let mut updated = request.clone();
        let mut created = Vec::with_capacity(groups.len());
        let mut failed_vendors = Vec::new();
        let mut degraded = false;

        for group in groups {
            let persisted = retry_async(&self.retry, "create_order", || {
                orders.create(group.order.clone())
            })
            .await;

            match persisted {
                Ok(fetched) => {
                    degraded |= fetched.is_degraded();
                    ORDERS_TOTAL
                        .with_label_values(&[group.vendor.kind(), "conversion"])
                        .inc();
                    for item_id in &group.item_ids {
                        if let Some(item) = updated.item(item_id) {
                            let converted = ItemStateMachine::transition(
                                item,
                                ItemStatus::Converted,
                                &TransitionPayload::default(),
                            )?;
                            updated.replace_item(converted);
                        }
                    }
                    created.push(fetched.value);
                }
                Err(e) => {
                    warn!(
                        vendor = %group.vendor,
                        error = %e,
                        "Failed to persist order for vendor group"
                    );
                    failed_vendors.push(group.vendor.key().to_string());
                }
            }
        }

        if !failed_vendors.is_empty() {
            CONVERSIONS_TOTAL
                .with_label_values(&["partial_failure"])
                .inc();
            return Err(FulfillmentError::PartialConversionFailure {
                failed_vendors,
                succeeded_order_ids: created.iter().map(|o| o.id.clone()).collect(),
                orders: created,
                request: Box::new(updated),
            });
        }

        CONVERSIONS_TOTAL.with_label_values(&["converted"]).inc();
        info!(
            order_count = created.len(),
            status = %updated.status(),
            "Request items converted"
        );

        Ok(ConversionOutcome {
            orders: created,
            request: updated,
            degraded,
        })
    }
}

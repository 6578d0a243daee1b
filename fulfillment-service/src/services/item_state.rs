//! Request item status transitions.
//!
//! Forward edges are encoded as a match table. Backward moves are only
//! possible through [`ItemStateMachine::override_transition`], which is
//! logged with the operator who asked for it.

use crate::error::{FulfillmentError, Result};
use crate::models::{ItemStatus, RequestItem};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// Fields a transition may carry. Only the fields relevant to the target
/// status are applied.
#[derive(Debug, Clone, Default)]
pub struct TransitionPayload {
    pub offered_price: Option<Decimal>,
    pub vendor_notes: Option<String>,
    pub customer_notes: Option<String>,
}

impl TransitionPayload {
    pub fn offered(price: Decimal) -> Self {
        Self {
            offered_price: Some(price),
            ..Default::default()
        }
    }

    pub fn with_vendor_notes(mut self, notes: impl Into<String>) -> Self {
        self.vendor_notes = Some(notes.into());
        self
    }

    pub fn with_customer_notes(mut self, notes: impl Into<String>) -> Self {
        self.customer_notes = Some(notes.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ItemStateMachine;

impl ItemStateMachine {
    /// Statuses reachable from `from` without an override.
    pub fn successors(from: ItemStatus) -> &'static [ItemStatus] {
        use ItemStatus::*;
        match from {
            PendingVendor => &[VendorChecked, Cancelled],
            VendorChecked => &[VendorConfirmed, VendorUnavailable, Cancelled],
            VendorConfirmed => &[CustomerNotified, Cancelled],
            CustomerNotified => &[CustomerApproved, Cancelled],
            CustomerApproved => &[Converted, Cancelled],
            VendorUnavailable | Converted | Cancelled => &[],
        }
    }

    pub fn can_transition(from: ItemStatus, to: ItemStatus) -> bool {
        Self::successors(from).contains(&to)
    }

    /// Move `item` along a forward edge and return the updated item.
    pub fn transition(
        item: &RequestItem,
        target: ItemStatus,
        payload: &TransitionPayload,
    ) -> Result<RequestItem> {
        if !Self::can_transition(item.status, target) {
            return Err(FulfillmentError::InvalidTransition {
                from: item.status,
                to: target,
            });
        }

        let mut next = item.clone();
        Self::apply_payload(&mut next, target, payload)?;
        next.status = target;
        next.updated_utc = Utc::now();

        if next.offered_price.is_none()
            && matches!(
                target,
                ItemStatus::VendorConfirmed
                    | ItemStatus::CustomerNotified
                    | ItemStatus::CustomerApproved
            )
        {
            warn!(item_id = %next.id, status = %target, "Item has no offered price");
        }

        debug!(item_id = %next.id, from = %item.status, to = %target, "Item transitioned");
        Ok(next)
    }

    /// Move `item` back to an earlier status on an operator's say-so.
    ///
    /// Converted items stay converted, and nothing is ever moved into
    /// `converted` this way.
    pub fn override_transition(
        item: &RequestItem,
        target: ItemStatus,
        operator: &str,
        payload: &TransitionPayload,
    ) -> Result<RequestItem> {
        if operator.trim().is_empty() {
            return Err(FulfillmentError::ValidationError(
                "operator is required for an override".to_string(),
            ));
        }

        let backward = target.stage() < item.status.stage();
        if item.status == ItemStatus::Converted || target == ItemStatus::Converted || !backward {
            return Err(FulfillmentError::InvalidTransition {
                from: item.status,
                to: target,
            });
        }

        let mut next = item.clone();
        Self::apply_payload(&mut next, target, payload)?;
        next.status = target;
        next.updated_utc = Utc::now();

        warn!(
            item_id = %next.id,
            from = %item.status,
            to = %target,
            operator = %operator,
            "Backward item transition by operator override"
        );
        Ok(next)
    }

    fn apply_payload(
        item: &mut RequestItem,
        target: ItemStatus,
        payload: &TransitionPayload,
    ) -> Result<()> {
        match target {
            ItemStatus::VendorConfirmed => {
                if let Some(price) = payload.offered_price {
                    if price < Decimal::ZERO {
                        return Err(FulfillmentError::ValidationError(
                            "offered price cannot be negative".to_string(),
                        ));
                    }
                    item.offered_price = Some(price);
                }
                if payload.vendor_notes.is_some() {
                    item.vendor_notes = payload.vendor_notes.clone();
                }
            }
            ItemStatus::VendorChecked | ItemStatus::VendorUnavailable => {
                if payload.vendor_notes.is_some() {
                    item.vendor_notes = payload.vendor_notes.clone();
                }
            }
            ItemStatus::CustomerNotified | ItemStatus::CustomerApproved => {
                if payload.customer_notes.is_some() {
                    item.customer_notes = payload.customer_notes.clone();
                }
            }
            ItemStatus::PendingVendor | ItemStatus::Converted | ItemStatus::Cancelled => {}
        }
        Ok(())
    }
}

//! Fulfillment request and its line items.

use super::{CustomerRef, Entity, VendorRef};
use crate::error::FulfillmentError;
use crate::ids;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Line item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    PendingVendor,
    VendorChecked,
    VendorConfirmed,
    VendorUnavailable,
    CustomerNotified,
    CustomerApproved,
    Converted,
    Cancelled,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 8] = [
        ItemStatus::PendingVendor,
        ItemStatus::VendorChecked,
        ItemStatus::VendorConfirmed,
        ItemStatus::VendorUnavailable,
        ItemStatus::CustomerNotified,
        ItemStatus::CustomerApproved,
        ItemStatus::Converted,
        ItemStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::PendingVendor => "pending_vendor",
            ItemStatus::VendorChecked => "vendor_checked",
            ItemStatus::VendorConfirmed => "vendor_confirmed",
            ItemStatus::VendorUnavailable => "vendor_unavailable",
            ItemStatus::CustomerNotified => "customer_notified",
            ItemStatus::CustomerApproved => "customer_approved",
            ItemStatus::Converted => "converted",
            ItemStatus::Cancelled => "cancelled",
        }
    }

    /// No transition leaves a terminal status without an operator override.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ItemStatus::VendorUnavailable | ItemStatus::Converted | ItemStatus::Cancelled
        )
    }

    /// Position along the workflow, used to tell backward moves apart.
    pub fn stage(&self) -> u8 {
        match self {
            ItemStatus::PendingVendor => 0,
            ItemStatus::VendorChecked => 1,
            ItemStatus::VendorConfirmed | ItemStatus::VendorUnavailable => 2,
            ItemStatus::CustomerNotified => 3,
            ItemStatus::CustomerApproved => 4,
            ItemStatus::Converted => 5,
            ItemStatus::Cancelled => 6,
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = FulfillmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                FulfillmentError::ValidationError(format!("unknown item status '{}'", s))
            })
    }
}

/// Unit a quantity is measured in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityUnit {
    #[default]
    Piece,
    Meter,
}

/// What is being requested: a catalog product or a free-text description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductRef {
    Catalog { product_id: String, name: String },
    Custom { description: String },
}

impl ProductRef {
    pub fn label(&self) -> &str {
        match self {
            ProductRef::Catalog { name, .. } => name.as_str(),
            ProductRef::Custom { description } => description.as_str(),
        }
    }
}

/// Optional fabric attributes of a line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricSpec {
    pub color: Option<String>,
    pub quality: Option<String>,
    pub width: Option<String>,
    pub embellishment: Option<String>,
    pub interlining: Option<String>,
}

/// One line of a fulfillment request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestItem {
    pub id: String,
    pub product: ProductRef,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit: QuantityUnit,
    pub target_price: Option<Decimal>,
    pub offered_price: Option<Decimal>,
    #[serde(default)]
    pub fabric: FabricSpec,
    #[serde(default)]
    pub vendor: VendorRef,
    #[serde(default)]
    pub images: Vec<String>,
    pub vendor_notes: Option<String>,
    pub customer_notes: Option<String>,
    pub status: ItemStatus,
    pub updated_utc: DateTime<Utc>,
}

/// Input for adding an item to a request.
#[derive(Debug, Clone)]
pub struct CreateRequestItem {
    pub product: ProductRef,
    pub quantity: Decimal,
    pub unit: QuantityUnit,
    pub target_price: Option<Decimal>,
    pub fabric: FabricSpec,
    pub vendor: VendorRef,
    pub images: Vec<String>,
    pub customer_notes: Option<String>,
}

impl CreateRequestItem {
    pub fn custom(description: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            product: ProductRef::Custom {
                description: description.into(),
            },
            quantity,
            unit: QuantityUnit::Piece,
            target_price: None,
            fabric: FabricSpec::default(),
            vendor: VendorRef::House,
            images: Vec::new(),
            customer_notes: None,
        }
    }

    pub fn with_target_price(mut self, price: Decimal) -> Self {
        self.target_price = Some(price);
        self
    }

    pub fn with_vendor(mut self, vendor: VendorRef) -> Self {
        self.vendor = vendor;
        self
    }
}

impl RequestItem {
    /// Build a validated item in `pending_vendor`.
    pub fn new(input: CreateRequestItem) -> Result<Self, FulfillmentError> {
        if input.quantity <= Decimal::ZERO {
            return Err(FulfillmentError::ValidationError(
                "quantity must be greater than zero".to_string(),
            ));
        }
        if input.product.label().trim().is_empty() {
            return Err(FulfillmentError::ValidationError(
                "product description is required".to_string(),
            ));
        }
        if input.target_price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(FulfillmentError::ValidationError(
                "target price cannot be negative".to_string(),
            ));
        }
        if let VendorRef::External(id) = &input.vendor {
            if id.trim().is_empty() {
                return Err(FulfillmentError::ValidationError(
                    "vendor id cannot be blank".to_string(),
                ));
            }
        }

        Ok(Self {
            id: ids::next_id(ids::ITEM_PREFIX),
            product: input.product,
            quantity: input.quantity,
            unit: input.unit,
            target_price: input.target_price,
            offered_price: None,
            fabric: input.fabric,
            vendor: input.vendor,
            images: input.images,
            vendor_notes: None,
            customer_notes: input.customer_notes,
            status: ItemStatus::PendingVendor,
            updated_utc: Utc::now(),
        })
    }
}

/// Overall request status, derived from its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    InProgress,
    PartiallyConverted,
    Converted,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Draft => "draft",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::PartiallyConverted => "partially_converted",
            RequestStatus::Converted => "converted",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Challan issued against a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallanLink {
    pub challan_id: String,
    pub challan_number: String,
    pub challan_date: NaiveDate,
}

/// A customer fulfillment inquiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub customer: CustomerRef,
    #[serde(default)]
    pub items: Vec<RequestItem>,
    pub reference_image: Option<String>,
    pub internal_notes: Option<String>,
    #[serde(default)]
    pub challan: Option<ChallanLink>,
    #[serde(default)]
    pub archived: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Request {
    pub fn new(customer: CustomerRef) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            customer,
            items: Vec::new(),
            reference_image: None,
            internal_notes: None,
            challan: None,
            archived: false,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// `converted` iff every item is converted or cancelled;
    /// `partially_converted` iff some, but not all, are converted.
    pub fn status(&self) -> RequestStatus {
        if self.items.is_empty() {
            return RequestStatus::Draft;
        }

        let converted = self
            .items
            .iter()
            .filter(|i| i.status == ItemStatus::Converted)
            .count();
        let settled = self
            .items
            .iter()
            .filter(|i| matches!(i.status, ItemStatus::Converted | ItemStatus::Cancelled))
            .count();

        if settled == self.items.len() {
            RequestStatus::Converted
        } else if converted > 0 {
            RequestStatus::PartiallyConverted
        } else if self
            .items
            .iter()
            .all(|i| i.status == ItemStatus::PendingVendor)
        {
            RequestStatus::Draft
        } else {
            RequestStatus::InProgress
        }
    }

    pub fn has_challan(&self) -> bool {
        self.challan.is_some()
    }

    pub fn item(&self, item_id: &str) -> Option<&RequestItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn items_with_status(&self, status: ItemStatus) -> impl Iterator<Item = &RequestItem> {
        self.items.iter().filter(move |i| i.status == status)
    }

    /// Swap in a new value for an existing item. Returns false if absent.
    pub fn replace_item(&mut self, item: RequestItem) -> bool {
        match self.items.iter_mut().find(|i| i.id == item.id) {
            Some(slot) => {
                *slot = item;
                self.updated_utc = Utc::now();
                true
            }
            None => false,
        }
    }
}

impl Entity for Request {
    const KIND: &'static str = "request";
    const COLLECTION: &'static str = "requests";
    const ID_PREFIX: &'static str = ids::REQUEST_PREFIX;

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

    fn item_with(status: ItemStatus) -> RequestItem {
        let mut item =
            RequestItem::new(CreateRequestItem::custom("Cotton shirting", Decimal::ONE)).unwrap();
        item.status = status;
        item
    }

    fn request_with(statuses: &[ItemStatus]) -> Request {
        let mut request = Request::new(CustomerRef::new("CUST-1", "Acme Garments"));
        request.items = statuses.iter().copied().map(item_with).collect();
        request
    }

    #[test]
    fn empty_request_is_draft() {
        assert_eq!(request_with(&[]).status(), RequestStatus::Draft);
    }

    #[test]
    fn all_converted_or_cancelled_is_converted() {
        let request = request_with(&[ItemStatus::Converted, ItemStatus::Cancelled]);
        assert_eq!(request.status(), RequestStatus::Converted);
    }

    #[test]
    fn some_converted_is_partially_converted() {
        let request = request_with(&[ItemStatus::Converted, ItemStatus::CustomerApproved]);
        assert_eq!(request.status(), RequestStatus::PartiallyConverted);
    }

    #[test]
    fn untouched_items_are_draft_and_moving_items_in_progress() {
        assert_eq!(
            request_with(&[ItemStatus::PendingVendor]).status(),
            RequestStatus::Draft
        );
        assert_eq!(
            request_with(&[ItemStatus::PendingVendor, ItemStatus::VendorChecked]).status(),
            RequestStatus::InProgress
        );
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let result = RequestItem::new(CreateRequestItem::custom("Linen", Decimal::ZERO));
        assert!(matches!(result, Err(FulfillmentError::ValidationError(_))));
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("pending_vendor".parse::<ItemStatus>().is_ok());
        assert!("shipped".parse::<ItemStatus>().is_err());
        assert!(serde_json::from_str::<ItemStatus>("\"shipped\"").is_err());
    }
}

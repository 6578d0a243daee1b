//! Domain models for fulfillment-service.

mod challan;
mod customer;
mod manufacturing;
mod order;
mod quality;
mod request;
mod tax;
mod vendor;

use serde::{de::DeserializeOwned, Serialize};

pub use challan::{
    Challan, ChallanLine, ChallanSourceRef, ChallanStatus, NewPayment, PaymentMethod,
    PaymentRecord, SourceType,
};
pub(crate) use challan::ChallanDraft;
pub use customer::CustomerRef;
pub use manufacturing::{ManufacturingLine, ManufacturingOrder};
pub use order::{Order, OrderLine, OrderStatus, PaymentStatus};
pub use quality::{Color, Quality};
pub use request::{
    ChallanLink, CreateRequestItem, FabricSpec, ItemStatus, ProductRef, QuantityUnit, Request,
    RequestItem, RequestStatus,
};
pub use tax::{TaxSplit, TaxSummary};
pub use vendor::VendorRef;

/// A record kept in one persisted collection.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Singular name used in errors and logs.
    const KIND: &'static str;
    /// Collection name, part of the storage key.
    const COLLECTION: &'static str;
    /// Prefix of generated identifiers.
    const ID_PREFIX: &'static str;
    /// Fields a partial update may not touch. `id` is always protected.
    const PROTECTED_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}

//! Services module for fulfillment-service.

pub mod challan_ledger;
pub mod conversion;
pub mod export;
pub mod images;
pub mod item_state;
pub mod metrics;
pub mod repository;
pub mod store;
pub mod tax;
pub mod workflow;

pub use challan_ledger::{ChallanLedger, ChallanSource, LedgerSettings};
pub use conversion::{ConversionEngine, ConversionOutcome, VendorGroup};
pub use export::{DocumentExporter, JsonExporter};
pub use images::{ImageStore, ImageUpload, LocalImageStore};
pub use item_state::{ItemStateMachine, TransitionPayload};
pub use metrics::{get_metrics, init_metrics};
pub use repository::{CachedRepository, Fetched, Freshness, Repository};
pub use store::{InMemoryStore, KeyValueStore, RedisStore};
pub use tax::TaxCalculator;
pub use workflow::{FulfillmentService, Repositories};

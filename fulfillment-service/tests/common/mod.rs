#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use fulfillment_service::config::FulfillmentConfig;
use fulfillment_service::error::FulfillmentError;
use fulfillment_service::models::{
    CreateRequestItem, CustomerRef, ItemStatus, Order, Request, VendorRef,
};
use fulfillment_service::services::{
    Fetched, FulfillmentService, InMemoryStore, KeyValueStore, Repository, TransitionPayload,
};
use fulfillment_service::startup::Application;
use rust_decimal::Decimal;
use serde_json::Value;
use service_core::error::AppError;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use tempfile::TempDir;

pub const SELLER_REGION: &str = "MH";

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

pub fn d(s: &str) -> Decimal {
    Decimal::from_str(s).expect("valid decimal")
}

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, day).expect("valid date")
}

pub fn local_customer() -> CustomerRef {
    CustomerRef::new("CUST-100", "Kapoor Garments").with_region(SELLER_REGION)
}

pub fn item(description: &str, qty: &str, target: &str, vendor: VendorRef) -> CreateRequestItem {
    CreateRequestItem::custom(description, d(qty))
        .with_target_price(d(target))
        .with_vendor(vendor)
}

/// Remote store that can be switched off, made to hang, or made to refuse
/// writes.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    down: AtomicBool,
    hang: AtomicBool,
    read_only: AtomicBool,
    pub writes: AtomicU32,
}

impl FlakyStore {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    async fn check(&self) -> Result<(), AppError> {
        if self.hang.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(AppError::ServiceUnavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.check().await?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), AppError> {
        self.check().await?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(AppError::ServiceUnavailable);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value).await
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

/// Order repository that refuses orders for one vendor.
pub struct FailingOrders {
    pub inner: Arc<dyn Repository<Order>>,
    pub failing_vendor: VendorRef,
    pub attempts: AtomicU32,
}

impl FailingOrders {
    pub fn new(inner: Arc<dyn Repository<Order>>, failing_vendor: VendorRef) -> Self {
        Self {
            inner,
            failing_vendor,
            attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Repository<Order> for FailingOrders {
    async fn load_all(&self) -> Result<Fetched<Vec<Order>>, FulfillmentError> {
        self.inner.load_all().await
    }

    async fn create(&self, entity: Order) -> Result<Fetched<Order>, FulfillmentError> {
        if entity.vendor == self.failing_vendor {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            return Err(FulfillmentError::Store(AppError::ServiceUnavailable));
        }
        self.inner.create(entity).await
    }

    async fn update(&self, id: &str, patch: Value) -> Result<Fetched<Order>, FulfillmentError> {
        self.inner.update(id, patch).await
    }

    async fn replace(&self, entity: Order) -> Result<Fetched<Order>, FulfillmentError> {
        self.inner.replace(entity).await
    }

    async fn delete(&self, id: &str) -> Result<Fetched<()>, FulfillmentError> {
        self.inner.delete(id).await
    }
}

pub struct TestApp {
    pub app: Application,
    pub remote: Arc<FlakyStore>,
    pub cache: Arc<InMemoryStore>,
    pub image_dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        init_tracing();

        let image_dir = TempDir::new().expect("Failed to create image dir");
        let mut config = FulfillmentConfig::default();
        config.tax.seller_region = SELLER_REGION.to_string();
        config.store.timeout_ms = 100;
        config.retry.initial_backoff_ms = 1;
        config.images.root = image_dir.path().to_string_lossy().to_string();
        config.images.base_url = "http://img.test/images".to_string();

        let remote = Arc::new(FlakyStore::default());
        let cache = Arc::new(InMemoryStore::new());
        let app = Application::with_stores(config, remote.clone(), cache.clone())
            .await
            .expect("Failed to build test application");

        TestApp {
            app,
            remote,
            cache,
            image_dir,
        }
    }

    pub fn service(&self) -> &FulfillmentService {
        self.app.service()
    }

    /// Create a request and walk every item up to `customer_approved`.
    pub async fn approved_request(&self, items: Vec<CreateRequestItem>) -> Request {
        let request = self
            .service()
            .create_request(local_customer(), items)
            .await
            .expect("Failed to create request")
            .value;

        let mut current = request.clone();
        for item in &request.items {
            current = self.approve_item(&request.id, &item.id).await;
        }
        current
    }

    pub async fn approve_item(&self, request_id: &str, item_id: &str) -> Request {
        let steps = [
            (ItemStatus::VendorChecked, TransitionPayload::default()),
            (
                ItemStatus::VendorConfirmed,
                TransitionPayload::offered(d("1")).with_vendor_notes("in stock"),
            ),
            (ItemStatus::CustomerNotified, TransitionPayload::default()),
            (
                ItemStatus::CustomerApproved,
                TransitionPayload::default().with_customer_notes("go ahead"),
            ),
        ];

        let mut latest = None;
        for (target, payload) in steps {
            latest = Some(
                self.service()
                    .transition_item(request_id, item_id, target, payload)
                    .await
                    .expect("Failed to transition item")
                    .value,
            );
        }
        latest.expect("at least one step")
    }
}

use crate::config::FulfillmentConfig;
use crate::models::{Challan, Entity, Order, Quality, Request};
use crate::services::{
    CachedRepository, ChallanLedger, ConversionEngine, Freshness, FulfillmentService, ImageStore,
    InMemoryStore, JsonExporter, KeyValueStore, LocalImageStore, RedisStore, Repositories,
    Repository,
};
use service_core::error::AppError;
use std::sync::Arc;

pub struct Application {
    config: FulfillmentConfig,
    service: FulfillmentService,
}

impl Application {
    /// Wire the service from configuration. Without a Redis URL the
    /// in-process store serves as both remote and cache.
    pub async fn build(config: FulfillmentConfig) -> Result<Self, AppError> {
        let cache: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let remote: Arc<dyn KeyValueStore> = match &config.store.redis_url {
            Some(url) => Arc::new(RedisStore::open(url).map_err(|e| {
                tracing::error!("Failed to open Redis client: {}", e);
                e
            })?),
            None => {
                tracing::warn!("No remote store configured, using in-process store only");
                cache.clone()
            }
        };

        Self::with_stores(config, remote, cache).await
    }

    pub async fn with_stores(
        config: FulfillmentConfig,
        remote: Arc<dyn KeyValueStore>,
        cache: Arc<dyn KeyValueStore>,
    ) -> Result<Self, AppError> {
        let images: Arc<dyn ImageStore> = Arc::new(
            LocalImageStore::new(
                &config.images.root,
                &config.images.base_url,
                config.images.max_bytes,
            )
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to initialize image storage at {}: {}",
                    config.images.root,
                    e
                );
                e
            })?,
        );

        let prefix = config.store.key_prefix.as_str();
        let timeout = config.store_timeout();
        let repos = Repositories {
            requests: Arc::new(CachedRepository::<Request>::new(
                remote.clone(),
                cache.clone(),
                prefix,
                timeout,
            )),
            orders: Arc::new(CachedRepository::<Order>::new(
                remote.clone(),
                cache.clone(),
                prefix,
                timeout,
            )),
            challans: Arc::new(CachedRepository::<Challan>::new(
                remote.clone(),
                cache.clone(),
                prefix,
                timeout,
            )),
            qualities: Arc::new(CachedRepository::<Quality>::new(
                remote, cache, prefix, timeout,
            )),
        };

        Self::warm_caches(&repos).await?;

        let service = FulfillmentService::new(
            repos,
            ChallanLedger::new(config.ledger_settings()),
            ConversionEngine::new(config.retry_config()),
            images,
            Arc::new(JsonExporter::default()),
        );

        tracing::info!(
            store = config.store.redis_url.as_deref().map_or("memory", |_| "redis"),
            seller_region = %config.tax.seller_region,
            "Fulfillment service ready"
        );

        Ok(Self { config, service })
    }

    /// Read every collection once so the local cache can serve reads if
    /// the remote store goes away later.
    async fn warm_caches(repos: &Repositories) -> Result<(), AppError> {
        let warmed = [
            (
                Request::COLLECTION,
                repos.requests.load_all().await.map(|f| f.freshness),
            ),
            (
                Order::COLLECTION,
                repos.orders.load_all().await.map(|f| f.freshness),
            ),
            (
                Challan::COLLECTION,
                repos.challans.load_all().await.map(|f| f.freshness),
            ),
            (
                Quality::COLLECTION,
                repos.qualities.load_all().await.map(|f| f.freshness),
            ),
        ];

        for (collection, freshness) in warmed {
            match freshness {
                Ok(Freshness::Fresh) => {}
                Ok(other) => tracing::warn!(
                    collection,
                    freshness = ?other,
                    "Remote store unreachable at startup"
                ),
                Err(e) => {
                    tracing::error!(collection, error = %e, "Failed to load collection");
                    return Err(AppError::InternalError(anyhow::Error::new(e)));
                }
            }
        }
        Ok(())
    }

    pub fn config(&self) -> &FulfillmentConfig {
        &self.config
    }

    pub fn service(&self) -> &FulfillmentService {
        &self.service
    }
}

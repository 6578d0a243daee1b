//! Repositories over persisted collections.
//!
//! A collection is stored as one JSON array under `<prefix>:<collection>`.
//! Reads go to the remote store first and fall back to the local cache;
//! every result says which of the two it came from. Writes the remote
//! missed are pushed back to it by the first read that reaches it again.

use crate::error::{FulfillmentError, Result};
use crate::ids;
use crate::models::Entity;
use crate::services::metrics::{STORE_FALLBACKS_TOTAL, STORE_OPERATION_DURATION};
use crate::services::store::KeyValueStore;
use async_trait::async_trait;
use serde_json::Value;
use service_core::error::AppError;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Read from or written through to the remote store.
    Fresh,
    /// Served by or written only to the local cache.
    Cached,
    /// Neither store could serve the read.
    Unavailable,
}

impl Freshness {
    /// The more degraded of two freshness values.
    pub fn combine(self, other: Freshness) -> Freshness {
        fn rank(f: Freshness) -> u8 {
            match f {
                Freshness::Fresh => 0,
                Freshness::Cached => 1,
                Freshness::Unavailable => 2,
            }
        }
        if rank(other) > rank(self) {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    pub freshness: Freshness,
}

impl<T> Fetched<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            freshness: Freshness::Fresh,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.freshness == Freshness::Fresh
    }

    pub fn is_degraded(&self) -> bool {
        !self.is_fresh()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            value: f(self.value),
            freshness: self.freshness,
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Every entity in the collection. A failed read yields an empty list
    /// marked [`Freshness::Unavailable`].
    async fn load_all(&self) -> Result<Fetched<Vec<T>>>;

    /// Insert `entity`, assigning an id when it has none.
    async fn create(&self, entity: T) -> Result<Fetched<T>>;

    /// Apply a JSON merge patch to the entity with `id`.
    async fn update(&self, id: &str, patch: Value) -> Result<Fetched<T>>;

    /// Overwrite the stored entity that has the same id.
    async fn replace(&self, entity: T) -> Result<Fetched<T>>;

    /// Remove the entity with `id`. Removing a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<Fetched<()>>;

    async fn find(&self, id: &str) -> Result<Fetched<T>> {
        let all = self.load_all().await?;
        let freshness = all.freshness;
        all.value
            .into_iter()
            .find(|e| e.id() == id)
            .map(|value| Fetched { value, freshness })
            .ok_or_else(|| FulfillmentError::not_found(T::KIND, id))
    }
}

/// Repository backed by a remote store with a local cache in front of
/// failures.
pub struct CachedRepository<T> {
    remote: Arc<dyn KeyValueStore>,
    cache: Arc<dyn KeyValueStore>,
    key: String,
    timeout: Duration,
    /// Set while the cache holds writes the remote has not seen.
    unsynced: AtomicBool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> CachedRepository<T> {
    pub fn new(
        remote: Arc<dyn KeyValueStore>,
        cache: Arc<dyn KeyValueStore>,
        key_prefix: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            remote,
            cache,
            key: format!("{}:{}", key_prefix, T::COLLECTION),
            timeout,
            unsynced: AtomicBool::new(false),
            _entity: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the cache holds writes the remote has not accepted yet.
    pub fn has_unsynced_writes(&self) -> bool {
        self.unsynced.load(Ordering::SeqCst)
    }

    async fn remote_get(&self) -> std::result::Result<Option<String>, AppError> {
        match timeout(self.timeout, self.remote.get(&self.key)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(self.timeout)),
        }
    }

    async fn remote_set(&self, raw: String) -> std::result::Result<(), AppError> {
        match timeout(self.timeout, self.remote.set(&self.key, raw)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(self.timeout)),
        }
    }

    fn decode(&self, raw: &str) -> Result<Vec<T>> {
        serde_json::from_str(raw).map_err(|e| {
            error!(key = %self.key, error = %e, "Stored collection is corrupted");
            FulfillmentError::Store(AppError::from(e))
        })
    }

    async fn read(&self) -> Result<Fetched<Vec<T>>> {
        let remote = self.remote_get().await;
        if remote.is_ok() && self.unsynced.swap(false, Ordering::SeqCst) {
            return self.push_unsynced().await;
        }

        match remote {
            Ok(Some(raw)) => {
                let items = self.decode(&raw)?;
                if let Err(e) = self.cache.set(&self.key, raw).await {
                    warn!(key = %self.key, error = %e, "Failed to refresh local cache");
                }
                Ok(Fetched::fresh(items))
            }
            Ok(None) => {
                if let Err(e) = self.cache.set(&self.key, "[]".to_string()).await {
                    warn!(key = %self.key, error = %e, "Failed to prime local cache");
                }
                Ok(Fetched::fresh(Vec::new()))
            }
            Err(remote_err) => {
                warn!(
                    key = %self.key,
                    store = self.remote.name(),
                    error = %remote_err,
                    "Remote read failed, falling back to local cache"
                );
                STORE_FALLBACKS_TOTAL
                    .with_label_values(&[T::COLLECTION, "read"])
                    .inc();

                match self.cache.get(&self.key).await {
                    Ok(Some(raw)) => Ok(Fetched {
                        value: self.decode(&raw)?,
                        freshness: Freshness::Cached,
                    }),
                    Ok(None) => Ok(Fetched {
                        value: Vec::new(),
                        freshness: Freshness::Unavailable,
                    }),
                    Err(cache_err) => {
                        warn!(key = %self.key, error = %cache_err, "Local cache read failed");
                        Ok(Fetched {
                            value: Vec::new(),
                            freshness: Freshness::Unavailable,
                        })
                    }
                }
            }
        }
    }

    /// Write the cached collection back to the remote. The cache is the
    /// newer copy here, so it wins over whatever the remote holds.
    async fn push_unsynced(&self) -> Result<Fetched<Vec<T>>> {
        let raw = match self.cache.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => "[]".to_string(),
            Err(e) => {
                self.unsynced.store(true, Ordering::SeqCst);
                warn!(key = %self.key, error = %e, "Local cache read failed before sync");
                return Ok(Fetched {
                    value: Vec::new(),
                    freshness: Freshness::Unavailable,
                });
            }
        };
        let items = self.decode(&raw)?;

        match self.remote_set(raw).await {
            Ok(()) => {
                info!(key = %self.key, count = items.len(), "Pushed cache-only writes to remote");
                Ok(Fetched::fresh(items))
            }
            Err(e) => {
                self.unsynced.store(true, Ordering::SeqCst);
                warn!(
                    key = %self.key,
                    store = self.remote.name(),
                    error = %e,
                    "Remote sync failed, cache-only writes still pending"
                );
                STORE_FALLBACKS_TOTAL
                    .with_label_values(&[T::COLLECTION, "sync"])
                    .inc();
                Ok(Fetched {
                    value: items,
                    freshness: Freshness::Cached,
                })
            }
        }
    }

    /// Read for a write. Writing over an unavailable read would replace the
    /// stored collection with a partial one.
    async fn read_for_write(&self) -> Result<Vec<T>> {
        let current = self.read().await?;
        if current.freshness == Freshness::Unavailable {
            return Err(FulfillmentError::Store(AppError::ServiceUnavailable));
        }
        Ok(current.value)
    }

    async fn write(&self, items: &[T], operation: &str) -> Result<Freshness> {
        let raw = serde_json::to_string(items).map_err(AppError::from)?;
        self.cache.set(&self.key, raw.clone()).await?;

        match self.remote_set(raw).await {
            Ok(()) => {
                self.unsynced.store(false, Ordering::SeqCst);
                Ok(Freshness::Fresh)
            }
            Err(e) => {
                self.unsynced.store(true, Ordering::SeqCst);
                warn!(
                    key = %self.key,
                    store = self.remote.name(),
                    operation,
                    error = %e,
                    "Remote write failed, kept in local cache only"
                );
                STORE_FALLBACKS_TOTAL
                    .with_label_values(&[T::COLLECTION, operation])
                    .inc();
                Ok(Freshness::Cached)
            }
        }
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for CachedRepository<T> {
    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    async fn load_all(&self) -> Result<Fetched<Vec<T>>> {
        let _timer = STORE_OPERATION_DURATION
            .with_label_values(&[T::COLLECTION, "load_all"])
            .start_timer();
        self.read().await
    }

    #[instrument(skip(self, entity), fields(collection = T::COLLECTION))]
    async fn create(&self, mut entity: T) -> Result<Fetched<T>> {
        let _timer = STORE_OPERATION_DURATION
            .with_label_values(&[T::COLLECTION, "create"])
            .start_timer();

        let mut items = self.read_for_write().await?;
        if entity.id().is_empty() {
            entity.set_id(ids::next_id(T::ID_PREFIX));
        }
        if items.iter().any(|e| e.id() == entity.id()) {
            return Err(FulfillmentError::Store(AppError::Conflict(anyhow::anyhow!(
                "{} {} already exists",
                T::KIND,
                entity.id()
            ))));
        }

        items.push(entity.clone());
        let freshness = self.write(&items, "create").await?;
        debug!(id = %entity.id(), "Entity created");
        Ok(Fetched {
            value: entity,
            freshness,
        })
    }

    #[instrument(skip(self, patch), fields(collection = T::COLLECTION))]
    async fn update(&self, id: &str, patch: Value) -> Result<Fetched<T>> {
        let _timer = STORE_OPERATION_DURATION
            .with_label_values(&[T::COLLECTION, "update"])
            .start_timer();

        check_patch::<T>(&patch)?;
        let mut items = self.read_for_write().await?;
        let index = items
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| FulfillmentError::not_found(T::KIND, id))?;

        let mut doc = serde_json::to_value(&items[index]).map_err(AppError::from)?;
        merge_patch(&mut doc, &patch);
        let mut updated: T = serde_json::from_value(doc).map_err(|e| {
            FulfillmentError::ValidationError(format!("invalid {} update: {}", T::KIND, e))
        })?;
        updated.set_id(id.to_string());

        items[index] = updated.clone();
        let freshness = self.write(&items, "update").await?;
        Ok(Fetched {
            value: updated,
            freshness,
        })
    }

    #[instrument(skip(self, entity), fields(collection = T::COLLECTION, id = %entity.id()))]
    async fn replace(&self, entity: T) -> Result<Fetched<T>> {
        let _timer = STORE_OPERATION_DURATION
            .with_label_values(&[T::COLLECTION, "replace"])
            .start_timer();

        let mut items = self.read_for_write().await?;
        let slot = items
            .iter_mut()
            .find(|e| e.id() == entity.id())
            .ok_or_else(|| FulfillmentError::not_found(T::KIND, entity.id()))?;
        *slot = entity.clone();

        let freshness = self.write(&items, "replace").await?;
        Ok(Fetched {
            value: entity,
            freshness,
        })
    }

    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    async fn delete(&self, id: &str) -> Result<Fetched<()>> {
        let _timer = STORE_OPERATION_DURATION
            .with_label_values(&[T::COLLECTION, "delete"])
            .start_timer();

        let mut items = self.read_for_write().await?;
        let before = items.len();
        items.retain(|e| e.id() != id);
        if items.len() == before {
            debug!(id, "Nothing to delete");
            return Ok(Fetched::fresh(()));
        }

        let freshness = self.write(&items, "delete").await?;
        Ok(Fetched {
            value: (),
            freshness,
        })
    }
}

fn check_patch<T: Entity>(patch: &Value) -> Result<()> {
    let fields = patch.as_object().ok_or_else(|| {
        FulfillmentError::ValidationError("update patch must be a JSON object".to_string())
    })?;
    if let Some(field) = fields
        .keys()
        .find(|k| k.as_str() == "id" || T::PROTECTED_FIELDS.contains(&k.as_str()))
    {
        return Err(FulfillmentError::ValidationError(format!(
            "field '{}' of {} cannot be updated directly",
            field,
            T::KIND
        )));
    }
    Ok(())
}

/// JSON merge patch: objects merge recursively, `null` removes a key, any
/// other value replaces the target.
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_fields) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(target_fields) = target {
        for (key, value) in patch_fields {
            if value.is_null() {
                target_fields.remove(key);
            } else {
                merge_patch(
                    target_fields.entry(key.clone()).or_insert(Value::Null),
                    value,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_patch() {
        let mut doc = json!({"a": 1, "b": {"c": 2, "d": 3}, "e": [1, 2]});
        merge_patch(&mut doc, &json!({"a": 5, "b": {"c": null, "x": 9}, "e": [3]}));
        assert_eq!(doc, json!({"a": 5, "b": {"d": 3, "x": 9}, "e": [3]}));
    }

    #[test]
    fn test_combine_keeps_worst() {
        assert_eq!(Freshness::Fresh.combine(Freshness::Cached), Freshness::Cached);
        assert_eq!(
            Freshness::Unavailable.combine(Freshness::Cached),
            Freshness::Unavailable
        );
        assert_eq!(Freshness::Fresh.combine(Freshness::Fresh), Freshness::Fresh);
    }

    #[test]
    fn test_fetched_map_keeps_freshness() {
        let fetched = Fetched {
            value: vec![1, 2, 3],
            freshness: Freshness::Cached,
        };
        let mapped = fetched.map(|v| v.len());
        assert_eq!(mapped.value, 3);
        assert!(mapped.is_degraded());
    }
}

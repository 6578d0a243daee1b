use config::{Config as Cfg, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::retry::RetryConfig;
use std::time::Duration;

use crate::services::images::DEFAULT_MAX_IMAGE_BYTES;
use crate::services::LedgerSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct FulfillmentConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub tax: TaxConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default)]
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Remote store. Without it, the in-process store is used alone.
    pub redis_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaxConfig {
    #[serde(default = "default_seller_region")]
    pub seller_region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_overpayment_tolerance")]
    pub overpayment_tolerance: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_image_root")]
    pub root: String,
    #[serde(default = "default_image_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_key_prefix() -> String {
    "fulfillment".to_string()
}

fn default_seller_region() -> String {
    "MH".to_string()
}

fn default_overpayment_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

fn default_image_root() -> String {
    "storage/images".to_string()
}

fn default_image_base_url() -> String {
    "/images".to_string()
}

fn default_max_bytes() -> usize {
    DEFAULT_MAX_IMAGE_BYTES
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    50
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            timeout_ms: default_timeout_ms(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            seller_region: default_seller_region(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            overpayment_tolerance: default_overpayment_tolerance(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            root: default_image_root(),
            base_url: default_image_base_url(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            store: StoreConfig::default(),
            tax: TaxConfig::default(),
            ledger: LedgerConfig::default(),
            images: ImageConfig::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl FulfillmentConfig {
    /// Load from an optional `configuration` file and `APP__` variables,
    /// e.g. `APP__STORE__REDIS_URL` or `APP__TAX__SELLER_REGION`.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config: FulfillmentConfig = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.tax.seller_region.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "tax.seller_region must be set"
            )));
        }
        if self.ledger.overpayment_tolerance < Decimal::ZERO {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ledger.overpayment_tolerance cannot be negative"
            )));
        }
        if self.store.timeout_ms == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "store.timeout_ms must be greater than zero"
            )));
        }
        if self.common.is_production() && self.store.redis_url.is_none() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "store.redis_url is required in production but not set"
            )));
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store.timeout_ms)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry.max_retries,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            ..RetryConfig::quick()
        }
    }

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            seller_region: self.tax.seller_region.clone(),
            overpayment_tolerance: self.ledger.overpayment_tolerance,
        }
    }
}

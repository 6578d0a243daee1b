//! Customer snapshot.

use serde::{Deserialize, Serialize};

/// Customer reference with the fields printed on fiscal documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub customer_id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// GST state code or region name. `None` is billed as intra-state.
    #[serde(default)]
    pub region: Option<String>,
}

impl CustomerRef {
    pub fn new(customer_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            name: name.into(),
            address: None,
            phone: None,
            region: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

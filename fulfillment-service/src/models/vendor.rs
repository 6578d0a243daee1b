//! Vendor reference.

use serde::{Deserialize, Serialize};

/// Who fulfils a line: an external vendor or the house itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "vendor_id", rename_all = "snake_case")]
pub enum VendorRef {
    External(String),
    #[default]
    House,
}

impl VendorRef {
    pub fn external(vendor_id: impl Into<String>) -> Self {
        VendorRef::External(vendor_id.into())
    }

    pub fn is_house(&self) -> bool {
        matches!(self, VendorRef::House)
    }

    /// Grouping key; house items share the reserved "house" key.
    pub fn key(&self) -> &str {
        match self {
            VendorRef::External(id) => id.as_str(),
            VendorRef::House => "house",
        }
    }

    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            VendorRef::External(_) => "external",
            VendorRef::House => "house",
        }
    }
}

impl std::fmt::Display for VendorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

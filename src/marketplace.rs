// 🛒 Marketplaces and their catalog scope codes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Marketplace a sale was reported on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Marketplace {
    Flipkart,
    Amazon,
    /// Any marketplace added through a custom adapter
    Other(String),
}

impl Marketplace {
    /// Human-readable name, also the value written to the output table
    pub fn name(&self) -> &str {
        match self {
            Marketplace::Flipkart => "Flipkart",
            Marketplace::Amazon => "Amazon",
            Marketplace::Other(name) => name,
        }
    }

    /// Parse a marketplace name; unknown names become `Other`.
    pub fn from_name(name: &str) -> Self {
        let trimmed = name.trim();
        match trimmed.to_lowercase().as_str() {
            "flipkart" | "fk" => Marketplace::Flipkart,
            "amazon" | "amz" => Marketplace::Amazon,
            _ => Marketplace::Other(trimmed.to_string()),
        }
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Marketplace {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Marketplace::from_name(s))
    }
}

// ============================================================================
// SCOPE CODES
// ============================================================================

/// Maps a marketplace to the scope tag used in the single-SKU catalog.
///
/// Marketplaces without a code get no scope filtering during lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeCodes(BTreeMap<String, String>);

impl ScopeCodes {
    pub fn empty() -> Self {
        ScopeCodes(BTreeMap::new())
    }

    pub fn with(mut self, marketplace: &Marketplace, code: impl Into<String>) -> Self {
        self.0.insert(marketplace.name().to_string(), code.into());
        self
    }

    pub fn code_for(&self, marketplace: &Marketplace) -> Option<&str> {
        self.0.get(marketplace.name()).map(|s| s.as_str())
    }
}

impl Default for ScopeCodes {
    fn default() -> Self {
        ScopeCodes::empty()
            .with(&Marketplace::Flipkart, "CSTE FK")
            .with(&Marketplace::Amazon, "CSTE AMAZON")
    }
}

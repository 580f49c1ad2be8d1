// 🚨 Error Taxonomy
// Fatal errors abort a run; warnings are recorded and the row keeps flowing.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// FATAL ERRORS
// ============================================================================

/// A required column is absent from a catalog or export.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("required column '{column}' not found in {source_name}")]
pub struct SchemaError {
    /// Name of the offending file or upload (e.g. "Combos_skus.csv")
    pub source_name: String,
    pub column: String,
}

impl SchemaError {
    pub fn new(source_name: impl Into<String>, column: impl Into<String>) -> Self {
        SchemaError {
            source_name: source_name.into(),
            column: column.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {source_name}: {source}")]
    Csv {
        source_name: String,
        #[source]
        source: csv::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ReconcileError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        ReconcileError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(source_name: impl Into<String>, source: csv::Error) -> Self {
        ReconcileError::Csv {
            source_name: source_name.into(),
            source,
        }
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, ReconcileError::Schema(_))
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

// ============================================================================
// NON-FATAL WARNINGS
// ============================================================================

/// Per-row conditions that never abort a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Warning {
    /// Several single mappings match one (SKU, marketplace) pair
    AmbiguousMapping,
    /// No catalog entry matches; SKU passed through unchanged
    UnmappedSku,
    /// Date could not be normalized; record kept with a null date
    DateParse,
    /// Quantity could not be read; row skipped
    QuantityParse,
}

impl Warning {
    pub fn name(&self) -> &'static str {
        match self {
            Warning::AmbiguousMapping => "AmbiguousMappingWarning",
            Warning::UnmappedSku => "UnmappedSkuWarning",
            Warning::DateParse => "DateParseWarning",
            Warning::QuantityParse => "QuantityParseWarning",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_names_source_and_column() {
        let err = SchemaError::new("Combos_skus.csv", "Combo");
        assert_eq!(
            err.to_string(),
            "required column 'Combo' not found in Combos_skus.csv"
        );
    }

    #[test]
    fn test_schema_error_converts_into_reconcile_error() {
        let err: ReconcileError = SchemaError::new("flipkart.csv", "Order State").into();
        assert!(err.is_schema());
        assert!(err.to_string().contains("Order State"));
    }

    #[test]
    fn test_warning_display() {
        assert_eq!(Warning::UnmappedSku.to_string(), "UnmappedSkuWarning");
        assert_eq!(Warning::DateParse.name(), "DateParseWarning");
    }
}

// 🏗️ Marketplace Adapters
// One adapter per marketplace export format, all producing the same SalesRecord.

use crate::error::{Result, Warning};
use crate::marketplace::Marketplace;
use crate::table::{RawRow, RawTable};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

// ============================================================================
// CORE TYPES
// ============================================================================

/// A sale as reported by a marketplace, before any catalog lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub sku: String,
    pub quantity: f64,
    /// Date exactly as it appeared in the export
    pub date: String,
    pub marketplace: Marketplace,

    // Provenance
    pub source_file: String,
    pub line_number: usize,
}

impl SalesRecord {
    pub fn new(sku: String, quantity: f64, date: String, marketplace: Marketplace) -> Self {
        SalesRecord {
            sku,
            quantity,
            date,
            marketplace,
            source_file: String::new(),
            line_number: 0,
        }
    }

    /// Builder pattern: attach where the row came from
    pub fn with_provenance(mut self, source_file: &str, line_number: usize) -> Self {
        self.source_file = source_file.to_string();
        self.line_number = line_number;
        self
    }
}

/// What an adapter pulled out of one export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub records: Vec<SalesRecord>,
    /// Rows that passed the filter but had an unreadable quantity
    pub skipped_quantity: usize,
}

impl Extraction {
    fn push(&mut self, quantity: Option<f64>, build: impl FnOnce(f64) -> SalesRecord) {
        match quantity {
            Some(q) => self.records.push(build(q)),
            None => self.skipped_quantity += 1,
        }
    }
}

// ============================================================================
// ADAPTER TRAIT
// ============================================================================

/// Turns one raw marketplace export into sales records.
///
/// Adding a marketplace means implementing this trait; the pipeline takes any
/// number of `(adapter, export)` pairs.
pub trait MarketplaceAdapter: Send + Sync {
    /// Filter and project the export. Missing required columns are fatal.
    fn extract(&self, export: &RawTable) -> Result<Extraction>;

    fn marketplace(&self) -> Marketplace;

    /// Columns the export must carry
    fn required_columns(&self) -> &'static [&'static str];

    /// Read an export from disk and extract it
    fn extract_file(&self, path: &Path) -> Result<Extraction> {
        let table = RawTable::from_path(path)?;
        self.extract(&table)
    }
}

/// Parse a quantity cell. Unreadable quantities skip the row with a warning.
fn read_quantity(export: &RawTable, row: &RawRow<'_>, idx: usize) -> Option<f64> {
    let raw = row.text(idx);
    match raw.replace(',', "").parse::<f64>() {
        Ok(q) if q.is_finite() => Some(q),
        _ => {
            warn!(
                warning = %Warning::QuantityParse,
                source = export.name(),
                line = row.line_number,
                quantity = raw,
                "unreadable quantity, row skipped"
            );
            None
        }
    }
}

// ============================================================================
// FLIPKART
// ============================================================================

/// Flipkart order export: SKU, Quantity, Ordered On, Order State
pub struct FlipkartAdapter {
    /// Order states that count as a completed sale
    pub included_states: Vec<String>,
}

impl FlipkartAdapter {
    pub const SKU: &'static str = "SKU";
    pub const QUANTITY: &'static str = "Quantity";
    pub const DATE: &'static str = "Ordered On";
    pub const STATE: &'static str = "Order State";

    pub fn new() -> Self {
        FlipkartAdapter {
            included_states: vec!["Delivered".to_string(), "Shipped".to_string()],
        }
    }
}

impl Default for FlipkartAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketplaceAdapter for FlipkartAdapter {
    fn extract(&self, export: &RawTable) -> Result<Extraction> {
        let sku_idx = export.column(Self::SKU)?;
        let qty_idx = export.column(Self::QUANTITY)?;
        let date_idx = export.column(Self::DATE)?;
        let state_idx = export.column(Self::STATE)?;

        let mut extraction = Extraction::default();
        for row in export.rows() {
            let state = row.text(state_idx);
            if !self.included_states.iter().any(|s| s == state) {
                continue;
            }

            extraction.push(read_quantity(export, &row, qty_idx), |quantity| {
                SalesRecord::new(
                    row.text(sku_idx).to_string(),
                    quantity,
                    row.text(date_idx).to_string(),
                    Marketplace::Flipkart,
                )
                .with_provenance(export.name(), row.line_number)
            });
        }

        Ok(extraction)
    }

    fn marketplace(&self) -> Marketplace {
        Marketplace::Flipkart
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &[Self::SKU, Self::QUANTITY, Self::DATE, Self::STATE]
    }
}

// ============================================================================
// AMAZON
// ============================================================================

/// Amazon inventory-ledger export: MSKU, Quantity, Date, Event Type
///
/// The MSKU column is already canonical in most rows; it still goes through
/// the resolver so combo listings get exploded.
pub struct AmazonAdapter {
    pub included_event: String,
}

impl AmazonAdapter {
    pub const SKU: &'static str = "MSKU";
    pub const QUANTITY: &'static str = "Quantity";
    pub const DATE: &'static str = "Date";
    pub const EVENT: &'static str = "Event Type";

    pub fn new() -> Self {
        AmazonAdapter {
            included_event: "Shipments".to_string(),
        }
    }
}

impl Default for AmazonAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketplaceAdapter for AmazonAdapter {
    fn extract(&self, export: &RawTable) -> Result<Extraction> {
        let sku_idx = export.column(Self::SKU)?;
        let qty_idx = export.column(Self::QUANTITY)?;
        let date_idx = export.column(Self::DATE)?;
        let event_idx = export.column(Self::EVENT)?;

        let mut extraction = Extraction::default();
        for row in export.rows() {
            if row.text(event_idx) != self.included_event {
                continue;
            }

            // Shipment events are recorded as negative stock movements
            let quantity = read_quantity(export, &row, qty_idx).map(f64::abs);
            extraction.push(quantity, |quantity| {
                SalesRecord::new(
                    row.text(sku_idx).to_string(),
                    quantity,
                    row.text(date_idx).to_string(),
                    Marketplace::Amazon,
                )
                .with_provenance(export.name(), row.line_number)
            });
        }

        Ok(extraction)
    }

    fn marketplace(&self) -> Marketplace {
        Marketplace::Amazon
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &[Self::SKU, Self::QUANTITY, Self::DATE, Self::EVENT]
    }
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Get the adapter for a marketplace, if one is built in
pub fn adapter_for(marketplace: &Marketplace) -> Option<Box<dyn MarketplaceAdapter>> {
    match marketplace {
        Marketplace::Flipkart => Some(Box::new(FlipkartAdapter::new())),
        Marketplace::Amazon => Some(Box::new(AmazonAdapter::new())),
        Marketplace::Other(_) => None,
    }
}

/// Detect which marketplace produced an export from its header row.
///
/// The marker columns (`Order State`, `Event Type`) are unique to each format.
pub fn detect_marketplace(export: &RawTable) -> Option<Marketplace> {
    let candidates: [Box<dyn MarketplaceAdapter>; 2] =
        [Box::new(FlipkartAdapter::new()), Box::new(AmazonAdapter::new())];

    candidates
        .iter()
        .find(|adapter| {
            adapter
                .required_columns()
                .iter()
                .all(|col| export.has_column(col))
        })
        .map(|adapter| adapter.marketplace())
}

// ============================================================================
// TESTS
// ============================================================================

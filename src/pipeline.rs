// ⚖️ Reconciliation Pipeline - sales exports → one MSKU-level table
//
// adapters → resolve → explode → (split quantity) → normalize dates → emit
//
// Nothing is written until every source has been extracted and resolved, so a
// schema failure in any export leaves no partial output behind.

use crate::adapters::{MarketplaceAdapter, SalesRecord};
use crate::dates::{format_date, parse_date};
use crate::error::{ReconcileError, Result, Warning};
use crate::marketplace::Marketplace;
use crate::resolver::{MappingResolver, MatchSource, Resolution};
use crate::table::RawTable;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Output header, in column order
pub const OUTPUT_COLUMNS: [&str; 4] = ["SKU", "Quantity", "Date", "Marketplace"];

// ============================================================================
// RECONCILED RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRecord {
    /// Canonical identifier (MSKU)
    pub sku: String,
    pub quantity: f64,
    /// `None` when the reported date could not be parsed
    pub date: Option<NaiveDate>,
    pub marketplace: Marketplace,
}

impl ReconciledRecord {
    pub fn date_text(&self) -> String {
        self.date.as_ref().map(format_date).unwrap_or_default()
    }

    /// Shortest round-trip form: `2`, `0.6666666666666666`
    pub fn quantity_text(&self) -> String {
        format!("{}", self.quantity)
    }
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunCounts {
    pub input_rows: usize,
    pub output_rows: usize,
    pub combo: usize,
    pub single: usize,
    pub ambiguous: usize,
    pub fallback: usize,
    pub undated: usize,
    /// Export rows dropped for an unreadable quantity
    #[serde(default)]
    pub skipped_quantity: usize,
}

impl RunCounts {
    fn record(&mut self, resolution: &Resolution) {
        match resolution {
            Resolution::Resolved {
                source: MatchSource::Combo,
                ..
            } => self.combo += 1,
            Resolution::Resolved {
                source: MatchSource::Single,
                ..
            } => self.single += 1,
            Resolution::Ambiguous { .. } => self.ambiguous += 1,
            Resolution::Fallback { .. } => self.fallback += 1,
        }
    }

    pub fn warnings(&self, warning: Warning) -> usize {
        match warning {
            Warning::AmbiguousMapping => self.ambiguous,
            Warning::UnmappedSku => self.fallback,
            Warning::DateParse => self.undated,
            Warning::QuantityParse => self.skipped_quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceTotal {
    pub marketplace: Marketplace,
    pub input_rows: usize,
    pub output_rows: usize,
    pub quantity: f64,
}

/// Everything about a run except the records themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub reconciled_at: DateTime<Utc>,
    pub split_quantity: bool,
    pub counts: RunCounts,
    pub by_marketplace: Vec<MarketplaceTotal>,
    /// SHA-256 of the rendered output CSV
    pub output_digest: String,
}

#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    pub run_id: String,
    pub reconciled_at: DateTime<Utc>,
    pub split_quantity: bool,
    pub counts: RunCounts,
    pub by_marketplace: Vec<MarketplaceTotal>,
    pub records: Vec<ReconciledRecord>,
}

impl ReconciliationReport {
    /// Render the output table. Run metadata stays out of it, so identical
    /// inputs give byte-identical files.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        let to_err = |e: csv::Error| ReconcileError::csv("output", e);

        wtr.write_record(OUTPUT_COLUMNS).map_err(to_err)?;
        for record in &self.records {
            wtr.write_record([
                record.sku.as_str(),
                record.quantity_text().as_str(),
                record.date_text().as_str(),
                record.marketplace.name(),
            ])
            .map_err(to_err)?;
        }

        wtr.into_inner().map_err(|e| {
            ReconcileError::io("output", std::io::Error::new(e.error().kind(), e.to_string()))
        })
    }

    /// Write the whole output file in one go.
    pub fn write_csv(&self, path: &Path) -> Result<String> {
        let bytes = self.to_csv_bytes()?;
        std::fs::write(path, &bytes).map_err(|e| ReconcileError::io(path.display().to_string(), e))?;
        info!(
            path = %path.display(),
            rows = self.records.len(),
            "wrote reconciled sales table"
        );
        Ok(digest(&bytes))
    }

    pub fn summary(&self) -> Result<RunSummary> {
        let bytes = self.to_csv_bytes()?;
        Ok(RunSummary {
            run_id: self.run_id.clone(),
            reconciled_at: self.reconciled_at,
            split_quantity: self.split_quantity,
            counts: self.counts.clone(),
            by_marketplace: self.by_marketplace.clone(),
            output_digest: digest(&bytes),
        })
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Processed {} rows, expanded to {} rows with MSKUs ({} combo, {} single, {} ambiguous, {} unmapped, {} undated, {} skipped)",
            self.counts.input_rows,
            self.counts.output_rows,
            self.counts.combo,
            self.counts.single,
            self.counts.ambiguous,
            self.counts.fallback,
            self.counts.undated,
            self.counts.skipped_quantity
        )
    }
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct ReconciliationPipeline<'a> {
    resolver: &'a MappingResolver,

    /// Divide a combo sale's quantity evenly across its constituents.
    /// When off, every constituent gets the full quantity.
    pub split_quantity: bool,
}

impl<'a> ReconciliationPipeline<'a> {
    pub fn new(resolver: &'a MappingResolver) -> Self {
        ReconciliationPipeline {
            resolver,
            split_quantity: false,
        }
    }

    pub fn with_split_quantity(mut self, split_quantity: bool) -> Self {
        self.split_quantity = split_quantity;
        self
    }

    /// Run every adapter over its export, then reconcile the combined rows.
    pub fn run(&self, sources: &[(&dyn MarketplaceAdapter, &RawTable)]) -> Result<ReconciliationReport> {
        let mut sales = Vec::new();
        let mut skipped_quantity = 0;
        for (adapter, export) in sources {
            let extracted = adapter.extract(export)?;
            info!(
                marketplace = %adapter.marketplace(),
                source = export.name(),
                rows = extracted.records.len(),
                skipped = extracted.skipped_quantity,
                "extracted sales rows"
            );
            skipped_quantity += extracted.skipped_quantity;
            sales.extend(extracted.records);
        }

        Ok(self.reconcile_counted(&sales, skipped_quantity))
    }

    /// Resolve, explode, split and date-normalize already-extracted sales.
    pub fn reconcile(&self, sales: &[SalesRecord]) -> ReconciliationReport {
        self.reconcile_counted(sales, 0)
    }

    fn reconcile_counted(&self, sales: &[SalesRecord], skipped_quantity: usize) -> ReconciliationReport {
        let mut counts = RunCounts {
            input_rows: sales.len(),
            skipped_quantity,
            ..RunCounts::default()
        };
        let mut records = Vec::with_capacity(sales.len());
        let mut totals: BTreeMap<Marketplace, MarketplaceTotal> = BTreeMap::new();

        for sale in sales {
            let resolution = self.resolver.resolve(&sale.sku, Some(&sale.marketplace));
            counts.record(&resolution);
            self.log_resolution(sale, &resolution);

            let date = parse_date(&sale.date);
            if date.is_none() {
                counts.undated += 1;
                warn!(
                    warning = %Warning::DateParse,
                    date = sale.date.as_str(),
                    source = sale.source_file.as_str(),
                    line = sale.line_number,
                    "unparseable date, keeping record with null date"
                );
            }

            let identifiers: Vec<String> = resolution
                .into_identifiers()
                .into_iter()
                .filter(|id| !id.trim().is_empty())
                .collect();

            let k = identifiers.len();
            let quantity = if self.split_quantity && k > 0 {
                sale.quantity / k as f64
            } else {
                sale.quantity
            };

            let total = totals
                .entry(sale.marketplace.clone())
                .or_insert_with(|| MarketplaceTotal {
                    marketplace: sale.marketplace.clone(),
                    input_rows: 0,
                    output_rows: 0,
                    quantity: 0.0,
                });
            total.input_rows += 1;
            total.output_rows += k;
            total.quantity += quantity * k as f64;

            records.extend(identifiers.into_iter().map(|sku| ReconciledRecord {
                sku,
                quantity,
                date,
                marketplace: sale.marketplace.clone(),
            }));
        }

        counts.output_rows = records.len();
        let report = ReconciliationReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            reconciled_at: Utc::now(),
            split_quantity: self.split_quantity,
            counts,
            by_marketplace: totals.into_values().collect(),
            records,
        };

        info!(
            input_rows = report.counts.input_rows,
            output_rows = report.counts.output_rows,
            "{}",
            report.summary_line()
        );
        report
    }

    fn log_resolution(&self, sale: &SalesRecord, resolution: &Resolution) {
        match resolution {
            Resolution::Fallback { identifier } => warn!(
                warning = %Warning::UnmappedSku,
                sku = identifier.as_str(),
                marketplace = %sale.marketplace,
                "No mapping for SKU, assuming single MSKU"
            ),
            Resolution::Ambiguous {
                identifier,
                candidates,
            } => warn!(
                warning = %Warning::AmbiguousMapping,
                sku = sale.sku.trim(),
                marketplace = %sale.marketplace,
                chosen = identifier.as_str(),
                candidates = ?candidates,
                "several single mappings match, using the first"
            ),
            Resolution::Resolved { .. } => {}
        }
    }
}

// ============================================================================
// READING AN OUTPUT TABLE BACK
// ============================================================================

/// Load a previously written output table (for review or comparison).
pub fn load_output(path: &Path) -> Result<Vec<ReconciledRecord>> {
    let table = RawTable::from_path(path)?;
    read_output(&table)
}

pub fn read_output(table: &RawTable) -> Result<Vec<ReconciledRecord>> {
    let sku_idx = table.column(OUTPUT_COLUMNS[0])?;
    let qty_idx = table.column(OUTPUT_COLUMNS[1])?;
    let date_idx = table.column(OUTPUT_COLUMNS[2])?;
    let market_idx = table.column(OUTPUT_COLUMNS[3])?;

    let records = table
        .rows()
        .filter_map(|row| {
            let quantity = match row.text(qty_idx).parse::<f64>() {
                Ok(q) if q.is_finite() => q,
                _ => {
                    warn!(
                        warning = %Warning::QuantityParse,
                        source = table.name(),
                        line = row.line_number,
                        quantity = row.text(qty_idx),
                        "unreadable quantity in output table, row skipped"
                    );
                    return None;
                }
            };

            Some(ReconciledRecord {
                sku: row.text(sku_idx).to_string(),
                quantity,
                date: row.get(date_idx).and_then(parse_date),
                marketplace: Marketplace::from_name(row.text(market_idx)),
            })
        })
        .collect();

    Ok(records)
}

// ============================================================================
// TESTS
// ============================================================================

// 📚 Catalog Loader - combo bundles and single-SKU mappings
//
// Two inputs, two lookup tables:
//   combo catalog  → ComboTable  (combo id → ordered constituent MSKUs)
//   single catalog → SingleTable (sku → scoped MSKU candidates, load order)
//
// Column names are never guessed: the CatalogSchema descriptor says which
// columns hold what, including how constituent slot columns are named.

use crate::error::Result;
use crate::table::RawTable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

// ============================================================================
// SCHEMA DESCRIPTOR
// ============================================================================

/// How constituent slot columns are named in the combo catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotColumns {
    /// Alphabetic prefix followed by an all-digit suffix, e.g. `SKU1`, `SKU2`
    Prefixed(String),
    /// Exact column names, in slot order
    Named(Vec<String>),
}

impl SlotColumns {
    pub fn matches(&self, column: &str) -> bool {
        match self {
            SlotColumns::Prefixed(prefix) => column
                .strip_prefix(prefix.as_str())
                .map(|suffix| !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()))
                .unwrap_or(false),
            SlotColumns::Named(names) => names.iter().any(|n| n == column),
        }
    }

    /// Indices of slot columns present in `headers`, in header order.
    fn select(&self, headers: &[String]) -> Vec<usize> {
        match self {
            SlotColumns::Prefixed(_) => headers
                .iter()
                .enumerate()
                .filter(|(_, h)| self.matches(h))
                .map(|(idx, _)| idx)
                .collect(),
            SlotColumns::Named(names) => names
                .iter()
                .filter_map(|name| headers.iter().position(|h| h == name))
                .collect(),
        }
    }
}

/// Column layout of both catalog files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSchema {
    pub combo_column: String,
    pub status_column: String,
    /// Substring of the status cell that marks a row as a combo
    pub combo_marker: String,
    pub slot_columns: SlotColumns,
    pub sku_column: String,
    pub msku_column: String,
    pub scope_column: String,
}

impl Default for CatalogSchema {
    fn default() -> Self {
        CatalogSchema {
            combo_column: "Combo".to_string(),
            status_column: "Status".to_string(),
            combo_marker: "Combo".to_string(),
            slot_columns: SlotColumns::Prefixed("SKU".to_string()),
            sku_column: "sku".to_string(),
            msku_column: "msku".to_string(),
            scope_column: "panels".to_string(),
        }
    }
}

// ============================================================================
// ENTRIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboEntry {
    pub combo_id: String,
    /// Constituent MSKUs in slot order; never empty, duplicates kept
    pub constituents: Vec<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleMapping {
    pub sku: String,
    pub msku: String,
    pub scope: String,
}

// ============================================================================
// LOOKUP TABLES
// ============================================================================

/// Combo id → constituents. Immutable once loaded.
#[derive(Debug, Clone, Default)]
pub struct ComboTable {
    entries: HashMap<String, ComboEntry>,
}

impl ComboTable {
    pub fn from_entries(entries: impl IntoIterator<Item = ComboEntry>) -> Self {
        let mut table = ComboTable::default();
        for entry in entries {
            table.insert(entry);
        }
        table
    }

    /// Same combo id in several entries: later constituents append.
    /// The loader has already merged catalog rows slot by slot.
    fn insert(&mut self, entry: ComboEntry) {
        match self.entries.get_mut(&entry.combo_id) {
            Some(existing) => {
                debug!(combo = %entry.combo_id, "combo id repeated, appending constituents");
                existing.constituents.extend(entry.constituents);
            }
            None => {
                self.entries.insert(entry.combo_id.clone(), entry);
            }
        }
    }

    pub fn get(&self, combo_id: &str) -> Option<&ComboEntry> {
        self.entries.get(combo_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// SKU → every single mapping for it, in load order.
#[derive(Debug, Clone, Default)]
pub struct SingleTable {
    by_sku: HashMap<String, Vec<SingleMapping>>,
    count: usize,
}

impl SingleTable {
    pub fn from_mappings(mappings: impl IntoIterator<Item = SingleMapping>) -> Self {
        let mut table = SingleTable::default();
        for mapping in mappings {
            table.count += 1;
            table.by_sku.entry(mapping.sku.clone()).or_default().push(mapping);
        }
        table
    }

    pub fn candidates(&self, sku: &str) -> &[SingleMapping] {
        self.by_sku.get(sku).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Every retained catalog row for one combo id, slot values still positional.
struct ComboRows {
    combo_id: String,
    status: Option<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl ComboRows {
    /// Flatten slot-major: every row's first slot, then every row's second
    /// slot, and so on. Empty slots drop out.
    fn into_entry(self) -> ComboEntry {
        let width = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut constituents = Vec::new();
        for slot in 0..width {
            for row in &self.rows {
                if let Some(Some(value)) = row.get(slot) {
                    constituents.push(value.clone());
                }
            }
        }

        ComboEntry {
            combo_id: self.combo_id,
            constituents,
            status: self.status,
        }
    }
}

// ============================================================================
// LOADER
// ============================================================================

pub struct CatalogLoader {
    schema: CatalogSchema,
}

impl CatalogLoader {
    pub fn new(schema: CatalogSchema) -> Self {
        CatalogLoader { schema }
    }

    pub fn schema(&self) -> &CatalogSchema {
        &self.schema
    }

    /// Build both lookup tables. The single catalog is optional.
    pub fn load(
        &self,
        combos: &RawTable,
        singles: Option<&RawTable>,
    ) -> Result<(ComboTable, Option<SingleTable>)> {
        let combo_table = self.load_combos(combos)?;
        let single_table = singles.map(|t| self.load_singles(t)).transpose()?;
        Ok((combo_table, single_table))
    }

    /// Convenience wrapper reading both catalogs from disk.
    pub fn load_files(
        &self,
        combo_path: &Path,
        single_path: Option<&Path>,
    ) -> Result<(ComboTable, Option<SingleTable>)> {
        let combos = RawTable::from_path(combo_path)?;
        let singles = single_path.map(RawTable::from_path).transpose()?;
        self.load(&combos, singles.as_ref())
    }

    pub fn load_combos(&self, table: &RawTable) -> Result<ComboTable> {
        let combo_idx = table.column(&self.schema.combo_column)?;
        let status_idx = table.find_column(&self.schema.status_column);
        let slot_idx = self.schema.slot_columns.select(table.headers());

        if slot_idx.is_empty() {
            warn!(source = table.name(), "combo catalog has no constituent slot columns");
        }

        // Rows sharing a combo id, grouped in first-seen order
        let mut groups: Vec<ComboRows> = Vec::new();
        let mut group_of: HashMap<String, usize> = HashMap::new();

        for row in table.rows() {
            let status = status_idx.and_then(|idx| row.get(idx));
            if status_idx.is_some() {
                match status {
                    Some(s) if s.contains(self.schema.combo_marker.as_str()) => {}
                    _ => continue,
                }
            }

            let combo_id = match row.get(combo_idx) {
                Some(id) => id,
                None => continue,
            };

            let slots: Vec<Option<String>> = slot_idx
                .iter()
                .map(|&idx| row.get(idx).map(|v| v.to_string()))
                .collect();

            if slots.iter().all(Option::is_none) {
                warn!(
                    combo = combo_id,
                    line = row.line_number,
                    "combo row has no constituents, skipping"
                );
                continue;
            }

            match group_of.get(combo_id) {
                Some(&i) => {
                    debug!(combo = combo_id, line = row.line_number, "combo id repeated, merging slots");
                    groups[i].rows.push(slots);
                }
                None => {
                    group_of.insert(combo_id.to_string(), groups.len());
                    groups.push(ComboRows {
                        combo_id: combo_id.to_string(),
                        status: status.map(|s| s.to_string()),
                        rows: vec![slots],
                    });
                }
            }
        }

        let entries: Vec<ComboEntry> = groups.into_iter().map(ComboRows::into_entry).collect();

        let combo_table = ComboTable::from_entries(entries);
        info!("Loaded {} combo mappings from {}", combo_table.len(), table.name());
        Ok(combo_table)
    }

    pub fn load_singles(&self, table: &RawTable) -> Result<SingleTable> {
        let sku_idx = table.column(&self.schema.sku_column)?;
        let msku_idx = table.column(&self.schema.msku_column)?;
        let scope_idx = table.column(&self.schema.scope_column)?;

        let mappings = table.rows().filter_map(|row| {
            let sku = row.get(sku_idx)?;
            let msku = row.get(msku_idx)?;
            Some(SingleMapping {
                sku: sku.to_string(),
                msku: msku.to_string(),
                scope: row.text(scope_idx).to_string(),
            })
        });

        let single_table = SingleTable::from_mappings(mappings);
        info!(
            "Loaded {} single SKU mappings from {}",
            single_table.len(),
            table.name()
        );
        Ok(single_table)
    }
}

impl Default for CatalogLoader {
    fn default() -> Self {
        Self::new(CatalogSchema::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================

// SKU Reconciliation Engine - Core Library
// Exposes all modules for use in the CLI, the upload server, and tests

pub mod error;
pub mod table;
pub mod marketplace;
pub mod catalog;        // Catalog Loader - combo + single-SKU tables
pub mod resolver;       // Mapping Resolver - SKU → MSKUs
pub mod adapters;       // Marketplace Adapters - exports → SalesRecords
pub mod dates;
pub mod pipeline;       // Reconciliation Pipeline - explode, split, normalize
pub mod config;

// Re-export commonly used types
pub use error::{ReconcileError, Result, SchemaError, Warning};
pub use table::{RawRow, RawTable};
pub use marketplace::{Marketplace, ScopeCodes};
pub use catalog::{
    CatalogLoader, CatalogSchema, ComboEntry, ComboTable, SingleMapping, SingleTable,
    SlotColumns,
};
pub use resolver::{MappingResolver, MatchSource, Resolution};
pub use adapters::{
    adapter_for, detect_marketplace, AmazonAdapter, Extraction, FlipkartAdapter,
    MarketplaceAdapter, SalesRecord,
};
pub use dates::{normalize_date, parse_date};
pub use pipeline::{
    load_output, read_output, MarketplaceTotal, ReconciledRecord, ReconciliationPipeline,
    ReconciliationReport, RunCounts, RunSummary, OUTPUT_COLUMNS,
};
pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build a resolver from the catalogs named in `config`.
pub fn resolver_from_config(config: &Config) -> Result<MappingResolver> {
    let loader = CatalogLoader::new(config.catalog.schema.clone());
    let (combos, singles) = loader.load_files(
        &config.catalog.combo_file,
        config.catalog.single_file.as_deref(),
    )?;
    Ok(MappingResolver::with_scopes(combos, singles, config.scopes.clone()))
}

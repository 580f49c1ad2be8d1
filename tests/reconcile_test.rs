// End-to-end runs over catalog and export files on disk

use sku_reconcile::{
    adapter_for, detect_marketplace, load_output, resolver_from_config, AmazonAdapter, Config,
    FlipkartAdapter, Marketplace, MarketplaceAdapter, RawTable, ReconciliationPipeline,
    ReconciliationReport, Resolution,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const COMBOS: &str = "\u{feff}Combo, SKU1, SKU2, SKU3, Status\n\
                      BUNDLE1, A, A, B, Combo\n\
                      BUNDLE2, C, D, , Combo Active\n\
                      RETIRED, X, Y, , Discontinued\n";

const SINGLES: &str = "sku,msku,panels\n\
                       FK-RED,MSKU-RED,CSTE FK\n\
                       AMZ-RED,MSKU-RED,CSTE AMAZON\n\
                       SHARED,MSKU-FK,CSTE FK\n\
                       SHARED,MSKU-AMZ,CSTE AMAZON\n";

const FLIPKART: &str = "Order Id,SKU,Quantity,Ordered On,Order State\n\
                        OD1,BUNDLE1,2,2024-02-05,Delivered\n\
                        OD2,FK-RED,1,02/06/2024,Shipped\n\
                        OD3,BUNDLE2,5,2024-02-07,Cancelled\n\
                        OD4,SHARED,1,not a date,Delivered\n";

const AMAZON: &str = "Date,MSKU,Quantity,Event Type,Fulfillment Center\n\
                      2024-02-08,BUNDLE2,-4,Shipments,BLR7\n\
                      2024-02-08,AMZ-RED,-1,CustomerReturns,BLR7\n\
                      2024-02-09,SHARED,-3,Shipments,BLR7\n\
                      2024-02-09,LOOSE-1,-1,Shipments,BLR7\n";

struct Fixture {
    dir: TempDir,
    config: Config,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, content: &str| -> PathBuf {
            let path = dir.path().join(name);
            fs::write(&path, content).unwrap();
            path
        };

        let mut config = Config::default();
        config.catalog.combo_file = write("Combos_skus.csv", COMBOS);
        config.catalog.single_file = Some(write("mskus_with_sku.csv", SINGLES));
        config.pipeline.output = dir.path().join("cleaned_sales_data.csv");
        write("flipkart.csv", FLIPKART);
        write("amazon.csv", AMAZON);

        Fixture { dir, config }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn run(&self, flipkart: &Path, amazon: &Path) -> sku_reconcile::Result<ReconciliationReport> {
        let resolver = resolver_from_config(&self.config)?;
        let flipkart_table = RawTable::from_path(flipkart)?;
        let amazon_table = RawTable::from_path(amazon)?;

        let fk = FlipkartAdapter::new();
        let amz = AmazonAdapter::new();
        let sources: Vec<(&dyn MarketplaceAdapter, &RawTable)> =
            vec![(&fk, &flipkart_table), (&amz, &amazon_table)];

        let report = ReconciliationPipeline::new(&resolver)
            .with_split_quantity(self.config.pipeline.split_quantity)
            .run(&sources)?;
        report.write_csv(&self.config.pipeline.output)?;
        Ok(report)
    }

    fn run_default(&self) -> ReconciliationReport {
        self.run(&self.path("flipkart.csv"), &self.path("amazon.csv")).unwrap()
    }

    fn output(&self) -> String {
        fs::read_to_string(&self.config.pipeline.output).unwrap()
    }
}

#[test]
fn test_full_run_writes_expected_table() {
    let fixture = Fixture::new();
    let report = fixture.run_default();

    assert_eq!(
        fixture.output(),
        "SKU,Quantity,Date,Marketplace\n\
         A,2,2024-02-05,Flipkart\n\
         A,2,2024-02-05,Flipkart\n\
         B,2,2024-02-05,Flipkart\n\
         MSKU-RED,1,2024-02-06,Flipkart\n\
         MSKU-FK,1,,Flipkart\n\
         C,4,2024-02-08,Amazon\n\
         D,4,2024-02-08,Amazon\n\
         MSKU-AMZ,3,2024-02-09,Amazon\n\
         LOOSE-1,1,2024-02-09,Amazon\n"
    );

    assert_eq!(report.counts.input_rows, 6);
    assert_eq!(report.counts.output_rows, 9);
    assert_eq!(report.counts.combo, 2);
    assert_eq!(report.counts.single, 3);
    assert_eq!(report.counts.fallback, 1);
    assert_eq!(report.counts.undated, 1);
    println!("✅ {}", report.summary_line());
}

#[test]
fn test_split_quantity_conserves_each_sale() {
    let mut fixture = Fixture::new();
    fixture.config.pipeline.split_quantity = true;
    let report = fixture.run_default();

    let bundle1: Vec<_> = report.records.iter().take(3).collect();
    assert!(bundle1.iter().all(|r| (r.quantity - 2.0 / 3.0).abs() < 1e-12));

    let amazon_total: f64 = report
        .records
        .iter()
        .filter(|r| r.marketplace == Marketplace::Amazon)
        .map(|r| r.quantity)
        .sum();
    assert!((amazon_total - 8.0).abs() < 1e-9);

    let totals: Vec<f64> = report.by_marketplace.iter().map(|t| t.quantity).collect();
    assert!((totals[0] - 4.0).abs() < 1e-9);
    assert!((totals[1] - 8.0).abs() < 1e-9);
}

#[test]
fn test_repeat_runs_are_byte_identical() {
    let fixture = Fixture::new();

    let first = fixture.run_default();
    let first_bytes = fs::read(&fixture.config.pipeline.output).unwrap();
    let second = fixture.run_default();
    let second_bytes = fs::read(&fixture.config.pipeline.output).unwrap();

    assert_eq!(first_bytes, second_bytes);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(
        first.summary().unwrap().output_digest,
        second.summary().unwrap().output_digest
    );
}

#[test]
fn test_schema_error_leaves_no_output() {
    let fixture = Fixture::new();
    let broken = fixture.path("broken_amazon.csv");
    fs::write(&broken, "Date,MSKU,Quantity\n2024-02-08,A,-1\n").unwrap();

    let err = fixture.run(&fixture.path("flipkart.csv"), &broken).unwrap_err();

    assert!(err.is_schema());
    assert!(err.to_string().contains("Event Type"));
    assert!(!fixture.config.pipeline.output.exists());
}

#[test]
fn test_combos_only_when_singles_omitted() {
    let mut fixture = Fixture::new();
    fixture.config.catalog.single_file = None;
    fixture.run_default();

    let records = load_output(&fixture.config.pipeline.output).unwrap();
    let skus: Vec<&str> = records.iter().map(|r| r.sku.as_str()).collect();
    assert_eq!(
        skus,
        vec!["A", "A", "B", "FK-RED", "SHARED", "C", "D", "SHARED", "LOOSE-1"]
    );
}

#[test]
fn test_missing_combo_catalog_is_io_error() {
    let mut fixture = Fixture::new();
    fixture.config.catalog.combo_file = fixture.path("nope.csv");

    let err = resolver_from_config(&fixture.config).unwrap_err();
    assert!(!err.is_schema());
    assert!(err.to_string().contains("nope.csv"));
}

#[test]
fn test_resolver_from_files_is_marketplace_aware() {
    let fixture = Fixture::new();
    let resolver = resolver_from_config(&fixture.config).unwrap();

    assert_eq!(
        resolver.resolve(" SHARED ", Some(&Marketplace::Amazon)).identifiers(),
        vec!["MSKU-AMZ"]
    );
    assert!(resolver.resolve("SHARED", None).is_ambiguous());
    assert!(resolver.resolve("RETIRED", Some(&Marketplace::Flipkart)).is_fallback());
    assert!(matches!(
        resolver.resolve("BUNDLE2", Some(&Marketplace::Flipkart)),
        Resolution::Resolved { .. }
    ));
}

#[test]
fn test_config_file_drives_the_run() {
    let fixture = Fixture::new();
    let config_path = fixture.path("sku-reconcile.toml");
    fs::write(
        &config_path,
        format!(
            "[catalog]\ncombo_file = {:?}\n\n[pipeline]\nsplit_quantity = true\noutput = {:?}\n",
            fixture.config.catalog.combo_file.display().to_string(),
            fixture.path("split.csv").display().to_string()
        ),
    )
    .unwrap();

    let config = Config::load_or_default(&config_path).unwrap();
    assert!(config.pipeline.split_quantity);
    assert_eq!(config.pipeline.output, fixture.path("split.csv"));
    // single_file falls back to its default
    assert!(config.catalog.single_file.is_some());
}

#[test]
fn test_exports_are_detected_from_headers() {
    let fixture = Fixture::new();

    let flipkart = RawTable::from_path(&fixture.path("flipkart.csv")).unwrap();
    let amazon = RawTable::from_path(&fixture.path("amazon.csv")).unwrap();
    let catalog = RawTable::from_path(&fixture.config.catalog.combo_file).unwrap();

    assert_eq!(detect_marketplace(&flipkart), Some(Marketplace::Flipkart));
    assert_eq!(detect_marketplace(&amazon), Some(Marketplace::Amazon));
    assert_eq!(detect_marketplace(&catalog), None);

    let adapter = adapter_for(&Marketplace::Amazon).unwrap();
    let extraction = adapter.extract(&amazon).unwrap();
    assert_eq!(extraction.skipped_quantity, 0);
    let sales = extraction.records;
    assert_eq!(sales.len(), 3);
    assert_eq!(sales[0].source_file, "amazon.csv");
    assert_eq!(sales[0].line_number, 2);
}

// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use sku_reconcile::{
    adapter_for, config::DEFAULT_CONFIG_FILE, detect_marketplace, resolver_from_config, Config,
    Marketplace, MarketplaceAdapter, RawTable, ReconciliationPipeline, Resolution,
};

#[derive(Parser)]
#[command(name = "sku-reconcile")]
#[command(about = "Reconcile marketplace sales exports against the MSKU catalog")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, env = "SKU_RECONCILE_CONFIG")]
    config: PathBuf,

    /// Combo catalog (overrides config file)
    #[arg(long, env = "SKU_RECONCILE_COMBOS", global = true)]
    combos: Option<PathBuf>,

    /// Single-SKU catalog (overrides config file)
    #[arg(long, env = "SKU_RECONCILE_SINGLES", global = true)]
    singles: Option<PathBuf>,

    /// Resolve through combos only, ignoring any single-SKU catalog
    #[arg(long, global = true)]
    no_singles: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline and write the reconciled table
    Reconcile {
        /// Flipkart order export(s)
        #[arg(long)]
        flipkart: Vec<PathBuf>,

        /// Amazon inventory-ledger export(s)
        #[arg(long)]
        amazon: Vec<PathBuf>,

        /// Exports whose marketplace is detected from their headers
        exports: Vec<PathBuf>,

        /// Output file (overrides config file)
        #[arg(short, long, env = "SKU_RECONCILE_OUTPUT")]
        output: Option<PathBuf>,

        /// Divide combo quantities evenly across constituents
        #[arg(long)]
        split_quantity: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how a single SKU resolves
    Resolve {
        sku: String,

        /// Marketplace the SKU was reported on (Flipkart, Amazon, ...)
        #[arg(short, long)]
        marketplace: Option<String>,
    },

    /// Browse a reconciled output file
    Review {
        /// Output file (defaults to the configured output)
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sku_reconcile=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;

    // Apply CLI overrides
    if let Some(combos) = cli.combos {
        config.catalog.combo_file = combos;
    }
    if let Some(singles) = cli.singles {
        config.catalog.single_file = Some(singles);
    }
    if cli.no_singles {
        config.catalog.single_file = None;
    }

    match cli.command {
        Command::Reconcile {
            flipkart,
            amazon,
            exports,
            output,
            split_quantity,
            json,
        } => {
            if let Some(output) = output {
                config.pipeline.output = output;
            }
            if split_quantity {
                config.pipeline.split_quantity = true;
            }
            run_reconcile(&config, &flipkart, &amazon, &exports, json)
        }
        Command::Resolve { sku, marketplace } => run_resolve(&config, &sku, marketplace.as_deref()),
        Command::Review { file } => {
            let path = file.unwrap_or_else(|| config.pipeline.output.clone());
            run_review(&path)
        }
    }
}

fn run_reconcile(
    config: &Config,
    flipkart: &[PathBuf],
    amazon: &[PathBuf],
    exports: &[PathBuf],
    json: bool,
) -> Result<()> {
    let resolver = resolver_from_config(config).context("Failed to load catalogs")?;

    // Collect (marketplace, export) pairs: tagged first, then detected
    let mut tables: Vec<(Marketplace, RawTable)> = Vec::new();
    for path in flipkart {
        tables.push((Marketplace::Flipkart, read_export(path)?));
    }
    for path in amazon {
        tables.push((Marketplace::Amazon, read_export(path)?));
    }
    for path in exports {
        let table = read_export(path)?;
        let marketplace = detect_marketplace(&table).with_context(|| {
            format!(
                "Could not detect marketplace from headers of {}",
                path.display()
            )
        })?;
        info!(file = %path.display(), %marketplace, "detected marketplace");
        tables.push((marketplace, table));
    }

    if tables.is_empty() {
        bail!("No sales exports given (use --flipkart, --amazon or positional files)");
    }

    let adapters: Vec<Box<dyn MarketplaceAdapter>> = tables
        .iter()
        .map(|(marketplace, _)| {
            adapter_for(marketplace)
                .with_context(|| format!("No adapter for marketplace {}", marketplace))
        })
        .collect::<Result<_>>()?;

    let sources: Vec<(&dyn MarketplaceAdapter, &RawTable)> = adapters
        .iter()
        .zip(tables.iter())
        .map(|(adapter, (_, table))| (adapter.as_ref(), table))
        .collect();

    let report = ReconciliationPipeline::new(&resolver)
        .with_split_quantity(config.pipeline.split_quantity)
        .run(&sources)
        .context("Reconciliation failed")?;

    let digest = report
        .write_csv(&config.pipeline.output)
        .with_context(|| format!("Failed to write {}", config.pipeline.output.display()))?;

    if json {
        let summary = report.summary()?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("✓ {}", report.summary_line());
        for total in &report.by_marketplace {
            println!(
                "  {:<10} {:>6} rows → {:>6} rows, quantity {:.2}",
                total.marketplace.name(),
                total.input_rows,
                total.output_rows,
                total.quantity
            );
        }
        println!("✓ Wrote {} (sha256 {})", config.pipeline.output.display(), digest);
    }

    Ok(())
}

fn read_export(path: &Path) -> Result<RawTable> {
    RawTable::from_path(path).with_context(|| format!("Failed to read export: {}", path.display()))
}

fn run_resolve(config: &Config, sku: &str, marketplace: Option<&str>) -> Result<()> {
    let resolver = resolver_from_config(config).context("Failed to load catalogs")?;
    let marketplace = marketplace.map(Marketplace::from_name);

    let resolution = resolver.resolve(sku, marketplace.as_ref());
    println!("{} [{}]", sku.trim(), resolution.tag());
    for id in resolution.identifiers() {
        println!("  → {}", id);
    }
    if let Resolution::Ambiguous { candidates, .. } = &resolution {
        println!("  candidates: {}", candidates.join(", "));
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_review(path: &Path) -> Result<()> {
    let records = sku_reconcile::load_output(path)
        .with_context(|| format!("Failed to load output file: {}", path.display()))?;

    println!("✓ Loaded {} reconciled rows", records.len());
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(records, path.display().to_string());
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_review(_path: &Path) -> Result<()> {
    bail!("TUI mode not available, rebuild with: cargo build --features tui")
}

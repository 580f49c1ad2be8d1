//! Reconciler configuration
//!
//! Loaded from `sku-reconcile.toml` when present; every section has defaults
//! matching the standard catalog layout, so an empty file is valid.

use crate::catalog::CatalogSchema;
use crate::error::{ReconcileError, Result};
use crate::marketplace::ScopeCodes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "sku-reconcile.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Marketplace name → scope tag in the single-SKU catalog
    #[serde(default)]
    pub scopes: ScopeCodes,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Combo catalog (required at run time)
    #[serde(default = "default_combo_file")]
    pub combo_file: PathBuf,

    /// Single-SKU catalog; omit to resolve through combos only
    #[serde(default = "default_single_file")]
    pub single_file: Option<PathBuf>,

    #[serde(default)]
    pub schema: CatalogSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub split_quantity: bool,

    #[serde(default = "default_output")]
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Largest accepted upload body, in bytes
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,
}

// Defaults
fn default_combo_file() -> PathBuf { PathBuf::from("data/Combos_skus.csv") }
fn default_single_file() -> Option<PathBuf> { Some(PathBuf::from("data/mskus_with_sku.csv")) }
fn default_output() -> PathBuf { PathBuf::from("cleaned_sales_data.csv") }
fn default_bind() -> String { "0.0.0.0:3000".to_string() }
fn default_max_upload() -> usize { 50 * 1024 * 1024 } // 50MB

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            combo_file: default_combo_file(),
            single_file: default_single_file(),
            schema: CatalogSchema::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            split_quantity: false,
            output: default_output(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload(),
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ReconcileError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReconcileError::io(path.display().to_string(), e))?;
        Self::from_toml(&content)
    }

    /// Read `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }
}

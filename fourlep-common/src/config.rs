use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::DATA_CATEGORY;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_num_bins")]
    pub num_bins: usize,
    #[serde(default = "default_bin_low")]
    pub bin_low: f64, // GeV
    #[serde(default = "default_bin_high")]
    pub bin_high: f64, // GeV
    #[serde(default = "default_luminosity")]
    pub luminosity_pb: f64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_num_bins() -> usize {
    34
}
fn default_bin_low() -> f64 {
    80.0
}
fn default_bin_high() -> f64 {
    250.0
}
fn default_luminosity() -> f64 {
    10_000.0 // pb^-1
}
fn default_batch_size() -> usize {
    65536
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            num_bins: default_num_bins(),
            bin_low: default_bin_low(),
            bin_high: default_bin_high(),
            luminosity_pb: default_luminosity(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WeightsConfig {
    pub table_path: Option<String>,
}

/// one named group of input files; `category = "Data"` marks real data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetConfig {
    pub category: String,
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct S3Config {
    /// custom endpoint (MinIO and friends); region and credentials come from the AWS environment
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_format() -> String {
    "json".into()
}
fn default_output_dir() -> String {
    ".".into()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub weights: WeightsConfig,
    #[serde(default, rename = "dataset")]
    pub datasets: Vec<DatasetConfig>,
    #[serde(default)]
    pub s3: S3Config,
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fourlep")
            .join("config.toml")
    }

    pub fn load() -> crate::Result<Self> {
        let path = if let Ok(env_path) = std::env::var("FOURLEP_CONFIG") {
            PathBuf::from(env_path) // $FOURLEP_CONFIG overrides default config path
        } else {
            Self::config_path()
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::FourLepError::Config(e.to_string()))
    }

    pub fn save(&self) -> crate::Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::FourLepError::Config(e.to_string()))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// simulated categories in fileset order, deduplicated; these label the MC dataset axis
    pub fn mc_categories(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for ds in &self.datasets {
            if ds.category != DATA_CATEGORY && !out.contains(&ds.category) {
                out.push(ds.category.clone());
            }
        }
        out
    }
}

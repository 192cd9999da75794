pub mod config;
pub use config::{AnalysisConfig, Config, DatasetConfig, ExportConfig, S3Config, WeightsConfig};

use thiserror::Error;

/// category label carried by real (non-simulated) data
pub const DATA_CATEGORY: &str = "Data";

#[derive(Error, Debug)]
pub enum FourLepError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("sample '{0}' not found in weight table")]
    UnknownSample(String),
    #[error("filename '{0}' does not match mc_<digits>.<name>.4lep")]
    BadFilename(String),
    #[error("failure while processing {category}")]
    SourceFailure {
        category: String,
        #[source]
        source: Box<FourLepError>,
    },
    #[error("executor stream finished without producing a result")]
    EmptyStream,
    #[error("histogram binning mismatch: {0}")]
    BinningMismatch(String),
    #[error("unknown {axis} label '{label}'")]
    UnknownCategory { axis: String, label: String },
    #[error("missing column '{0}'")]
    MissingColumn(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("{0}")]
    Other(String),
}

impl FourLepError {
    /// wrap an error raised while consuming one data source
    pub fn source_failure(category: impl Into<String>, err: FourLepError) -> Self {
        FourLepError::SourceFailure { category: category.into(), source: Box::new(err) }
    }
}

pub type Result<T> = std::result::Result<T, FourLepError>;

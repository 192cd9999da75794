use std::collections::HashMap;
use std::path::Path;

use fourlep_common::{FourLepError, Result};
use serde::{Deserialize, Serialize};

/// integrated luminosity of the reference dataset, pb^-1
pub const DEFAULT_LUMINOSITY_PB: f64 = 10_000.0;

/// per-sample normalisation record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleInfo {
    pub xsec: f64,
    pub sumw: f64,
    pub red_eff: f64,
}

/// Immutable lookup from sample name to cross-section weighting information.
///
/// Built once at startup and shared read-only (wrap it in an `Arc`) between
/// every processor instance.
#[derive(Debug, Clone)]
pub struct WeightTable {
    luminosity_pb: f64,
    samples: HashMap<String, SampleInfo>,
}

impl WeightTable {
    pub fn new(luminosity_pb: f64, samples: HashMap<String, SampleInfo>) -> Self {
        Self { luminosity_pb, samples }
    }

    /// load a table keyed by sample name; `.json` files are parsed as JSON, anything else as TOML
    pub fn load(path: &Path, luminosity_pb: f64) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let samples: HashMap<String, SampleInfo> = if is_json {
            serde_json::from_str(&content).map_err(|e| {
                FourLepError::Config(format!("weight table {}: {e}", path.display()))
            })?
        } else {
            toml::from_str(&content).map_err(|e| {
                FourLepError::Config(format!("weight table {}: {e}", path.display()))
            })?
        };
        tracing::debug!(path = %path.display(), samples = samples.len(), "loaded weight table");
        Ok(Self::new(luminosity_pb, samples))
    }

    pub fn luminosity_pb(&self) -> f64 {
        self.luminosity_pb
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, sample: &str) -> Option<&SampleInfo> {
        self.samples.get(sample)
    }

    /// normalisation weight `(L * xsec) / (sumw * red_eff)` for one simulated sample
    pub fn resolve(&self, sample: &str) -> Result<f64> {
        let info = self
            .samples
            .get(sample)
            .ok_or_else(|| FourLepError::UnknownSample(sample.to_owned()))?;
        Ok((self.luminosity_pb * info.xsec) / (info.sumw * info.red_eff))
    }
}

use std::sync::{Arc, OnceLock};

use fourlep_common::{AnalysisConfig, Config, FourLepError, Result, DATA_CATEGORY};
use regex::Regex;

use crate::event::{Event, EventBatch};
use crate::histogram::{HistogramPair, Variation};
use crate::kinematics::invariant_mass_gev;
use crate::selection::event_passes;
use crate::weights::WeightTable;

/// relative shift applied to m4l for the mass-scale variations
pub const M4L_SHIFT: f64 = 0.01;

static RE_SAMPLE: OnceLock<Regex> = OnceLock::new();

fn re_sample() -> &'static Regex {
    RE_SAMPLE.get_or_init(|| Regex::new(r"mc_\d+\.(.+)\.4lep").unwrap())
}

/// extract the sample name from a simulated file name, e.g. `mc_361106.Zee.4lep.parquet` -> `Zee`
pub fn sample_from_filename(filename: &str) -> Result<String> {
    re_sample()
        .captures(filename)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
        .ok_or_else(|| FourLepError::BadFilename(filename.to_owned()))
}

/// Unit of work handed to an executor: one event batch in, one partial result out.
pub trait Processor: Send + Sync {
    fn process(&self, batch: &EventBatch) -> Result<HistogramPair>;

    /// zero-filled output with the same binning as `process` produces
    fn empty_output(&self) -> Result<HistogramPair>;
}

/// Four-lepton selection, m4l reconstruction and histogram filling.
///
/// Data batches fill the 1-D histogram with unit weight. Simulated batches are
/// weighted by `xsec weight * mcWeight * scale factor` and fill the MC histogram
/// once per [`Variation`]: scale-factor variations change the weight, m4l
/// variations shift the observable by `1 +/- M4L_SHIFT` with nominal weight.
#[derive(Debug, Clone)]
pub struct HzzAnalysis {
    analysis: AnalysisConfig,
    mc_categories: Vec<String>,
    weights: Arc<WeightTable>,
}

impl HzzAnalysis {
    pub fn new(analysis: AnalysisConfig, mc_categories: Vec<String>, weights: Arc<WeightTable>) -> Self {
        Self { analysis, mc_categories, weights }
    }

    pub fn from_config(cfg: &Config, weights: Arc<WeightTable>) -> Self {
        Self::new(cfg.analysis.clone(), cfg.mc_categories(), weights)
    }

    pub fn mc_categories(&self) -> &[String] {
        &self.mc_categories
    }

    /// fill fresh histograms from `events` belonging to `category`
    pub fn accumulate(&self, events: &[Event], category: &str, filename: &str) -> Result<HistogramPair> {
        let mut out = self.empty_output()?;
        let selected: Vec<&Event> = events.iter().filter(|e| event_passes(&e.leptons)).collect();

        if category == DATA_CATEGORY {
            for ev in selected {
                out.data.fill(invariant_mass_gev(&ev.leptons));
            }
            return Ok(out);
        }

        // resolve before filling so a bad name leaves nothing half-filled
        let sample = sample_from_filename(filename)?;
        let xsec_weight = self.weights.resolve(&sample)?;
        for ev in selected {
            let m4l = invariant_mass_gev(&ev.leptons);
            let basic_weight = xsec_weight * ev.mc_weight;
            let total = basic_weight * ev.scale_factor;
            let total_up = basic_weight * ev.scale_factor_up;
            let total_down = basic_weight * ev.scale_factor_down;

            out.mc.fill(m4l, category, Variation::Nominal, total)?;
            out.mc.fill(m4l, category, Variation::ScaleFactorUp, total_up)?;
            out.mc.fill(m4l, category, Variation::ScaleFactorDown, total_down)?;
            out.mc.fill(m4l * (1.0 + M4L_SHIFT), category, Variation::M4lUp, total)?;
            out.mc.fill(m4l * (1.0 - M4L_SHIFT), category, Variation::M4lDown, total)?;
        }
        Ok(out)
    }
}

impl Processor for HzzAnalysis {
    fn process(&self, batch: &EventBatch) -> Result<HistogramPair> {
        let meta = &batch.metadata;
        let out = self.accumulate(&batch.events, &meta.dataset_category, &meta.filename)?;
        tracing::debug!(
            category = %meta.dataset_category,
            file = %meta.filename,
            events = batch.len(),
            "processed batch"
        );
        Ok(out)
    }

    fn empty_output(&self) -> Result<HistogramPair> {
        HistogramPair::empty(&self.analysis, &self.mc_categories)
    }
}

//! Binned accumulators with weighted storage.
//!
//! Regular axes keep an underflow and an overflow slot next to the in-range
//! bins: `x < low` lands in underflow, `x >= high` and NaN land in overflow.
//! Every slot stores the sum of weights and the sum of squared weights.

use std::fmt;

use fourlep_common::{AnalysisConfig, FourLepError, Result};
use serde::{Deserialize, Serialize};

pub const MASS_AXIS_NAME: &str = "mllll";
pub const MASS_AXIS_LABEL: &str = "m4l [GeV]";

/// Accumulated weight and squared weight of one bin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WeightedSum {
    pub sum_w: f64,
    pub sum_w2: f64,
}

impl WeightedSum {
    pub fn fill(&mut self, weight: f64) {
        self.sum_w += weight;
        self.sum_w2 += weight * weight;
    }

    pub fn add(&mut self, other: &WeightedSum) {
        self.sum_w += other.sum_w;
        self.sum_w2 += other.sum_w2;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegularAxis {
    pub name: String,
    pub label: String,
    pub bins: usize,
    pub low: f64,
    pub high: f64,
}

impl RegularAxis {
    pub fn new(name: &str, label: &str, bins: usize, low: f64, high: f64) -> Result<Self> {
        if bins == 0 {
            return Err(FourLepError::Config(format!("axis {name}: bin count must be positive")));
        }
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(FourLepError::Config(format!(
                "axis {name}: invalid range [{low}, {high})"
            )));
        }
        Ok(Self { name: name.into(), label: label.into(), bins, low, high })
    }

    /// four-lepton mass axis from the analysis binning
    pub fn mass(cfg: &AnalysisConfig) -> Result<Self> {
        Self::new(MASS_AXIS_NAME, MASS_AXIS_LABEL, cfg.num_bins, cfg.bin_low, cfg.bin_high)
    }

    pub fn width(&self) -> f64 {
        (self.high - self.low) / self.bins as f64
    }

    /// slots including underflow (0) and overflow (bins + 1)
    pub fn extent(&self) -> usize {
        self.bins + 2
    }

    pub fn edges(&self) -> Vec<f64> {
        let w = self.width();
        (0..=self.bins).map(|i| self.low + i as f64 * w).collect()
    }

    /// storage slot for `x`: 0 underflow, `1..=bins` in range, `bins + 1` overflow
    pub fn index(&self, x: f64) -> usize {
        if x.is_nan() || x >= self.high {
            return self.bins + 1;
        }
        if x < self.low {
            return 0;
        }
        let i = ((x - self.low) / self.width()) as usize;
        1 + i.min(self.bins - 1)
    }

    fn check_binning(&self, other: &RegularAxis) -> Result<()> {
        if self.bins == other.bins && self.low == other.low && self.high == other.high {
            return Ok(());
        }
        Err(FourLepError::BinningMismatch(format!(
            "{}: {} bins [{}, {}) vs {} bins [{}, {})",
            self.name, self.bins, self.low, self.high, other.bins, other.low, other.high
        )))
    }
}

/// Fixed list of string labels; filling an unlisted label is an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAxis {
    pub name: String,
    pub labels: Vec<String>,
}

impl CategoryAxis {
    pub fn new(name: &str, labels: Vec<String>) -> Self {
        Self { name: name.into(), labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn index(&self, label: &str) -> Result<usize> {
        self.labels
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| FourLepError::UnknownCategory {
                axis: self.name.clone(),
                label: label.to_owned(),
            })
    }
}

/// Systematic variations booked for simulated samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variation {
    #[serde(rename = "nominal")]
    Nominal,
    #[serde(rename = "scaleFactorUP")]
    ScaleFactorUp,
    #[serde(rename = "scaleFactorDOWN")]
    ScaleFactorDown,
    #[serde(rename = "m4lUP")]
    M4lUp,
    #[serde(rename = "m4lDOWN")]
    M4lDown,
}

impl Variation {
    pub const ALL: [Variation; 5] = [
        Variation::Nominal,
        Variation::ScaleFactorUp,
        Variation::ScaleFactorDown,
        Variation::M4lUp,
        Variation::M4lDown,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Variation::Nominal => "nominal",
            Variation::ScaleFactorUp => "scaleFactorUP",
            Variation::ScaleFactorDown => "scaleFactorDOWN",
            Variation::M4lUp => "m4lUP",
            Variation::M4lDown => "m4lDOWN",
        }
    }

    pub fn from_label(label: &str) -> Option<Variation> {
        Variation::ALL.into_iter().find(|v| v.label() == label)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Variation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One-dimensional weighted histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist1D {
    pub axis: RegularAxis,
    /// length `axis.extent()`, flow slots included
    pub bins: Vec<WeightedSum>,
}

impl Hist1D {
    pub fn new(axis: RegularAxis) -> Self {
        let n = axis.extent();
        Self { axis, bins: vec![WeightedSum::default(); n] }
    }

    /// unit-weight fill
    pub fn fill(&mut self, x: f64) {
        self.fill_weighted(x, 1.0);
    }

    pub fn fill_weighted(&mut self, x: f64, weight: f64) {
        let i = self.axis.index(x);
        self.bins[i].fill(weight);
    }

    /// in-range bin `i` (0-based)
    pub fn bin(&self, i: usize) -> WeightedSum {
        self.bins[i + 1]
    }

    pub fn underflow(&self) -> WeightedSum {
        self.bins[0]
    }

    pub fn overflow(&self) -> WeightedSum {
        self.bins[self.axis.bins + 1]
    }

    pub fn values(&self) -> Vec<f64> {
        self.bins[1..=self.axis.bins].iter().map(|b| b.sum_w).collect()
    }

    pub fn variances(&self) -> Vec<f64> {
        self.bins[1..=self.axis.bins].iter().map(|b| b.sum_w2).collect()
    }

    /// sum of weights over every slot, flow included
    pub fn total(&self) -> f64 {
        self.bins.iter().map(|b| b.sum_w).sum()
    }

    pub fn merge(&mut self, other: &Hist1D) -> Result<()> {
        self.axis.check_binning(&other.axis)?;
        for (a, b) in self.bins.iter_mut().zip(&other.bins) {
            a.add(b);
        }
        Ok(())
    }
}

/// Observable x dataset category x variation histogram for simulated samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist3D {
    pub axis: RegularAxis,
    pub dataset: CategoryAxis,
    pub variations: Vec<Variation>,
    /// row-major over (axis slot, dataset, variation)
    pub bins: Vec<WeightedSum>,
}

impl Hist3D {
    pub fn new(axis: RegularAxis, datasets: Vec<String>) -> Self {
        let dataset = CategoryAxis::new("dataset", datasets);
        let n = axis.extent() * dataset.len() * Variation::ALL.len();
        Self {
            axis,
            dataset,
            variations: Variation::ALL.to_vec(),
            bins: vec![WeightedSum::default(); n],
        }
    }

    fn offset(&self, slot: usize, dataset: usize, variation: Variation) -> usize {
        (slot * self.dataset.len() + dataset) * Variation::ALL.len() + variation.index()
    }

    pub fn fill(&mut self, x: f64, dataset: &str, variation: Variation, weight: f64) -> Result<()> {
        let d = self.dataset.index(dataset)?;
        let slot = self.axis.index(x);
        let o = self.offset(slot, d, variation);
        self.bins[o].fill(weight);
        Ok(())
    }

    /// slice out one (dataset, variation) pair as a 1-D histogram
    pub fn project(&self, dataset: &str, variation: Variation) -> Result<Hist1D> {
        let d = self.dataset.index(dataset)?;
        let mut h = Hist1D::new(self.axis.clone());
        for slot in 0..self.axis.extent() {
            h.bins[slot] = self.bins[self.offset(slot, d, variation)];
        }
        Ok(h)
    }

    /// one variation summed over every dataset category
    pub fn total(&self, variation: Variation) -> Hist1D {
        let mut h = Hist1D::new(self.axis.clone());
        for slot in 0..self.axis.extent() {
            for d in 0..self.dataset.len() {
                h.bins[slot].add(&self.bins[self.offset(slot, d, variation)]);
            }
        }
        h
    }

    /// entries recorded for a variation across all datasets and slots
    pub fn sum_weights(&self, variation: Variation) -> f64 {
        self.total(variation).total()
    }

    pub fn merge(&mut self, other: &Hist3D) -> Result<()> {
        self.axis.check_binning(&other.axis)?;
        if self.dataset != other.dataset {
            return Err(FourLepError::BinningMismatch(format!(
                "dataset axis {:?} vs {:?}",
                self.dataset.labels, other.dataset.labels
            )));
        }
        for (a, b) in self.bins.iter_mut().zip(&other.bins) {
            a.add(b);
        }
        Ok(())
    }
}

/// The two outputs of one processing step: real data and simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramPair {
    pub data: Hist1D,
    #[serde(rename = "MC")]
    pub mc: Hist3D,
}

impl HistogramPair {
    pub fn empty(cfg: &AnalysisConfig, mc_categories: &[String]) -> Result<Self> {
        let axis = RegularAxis::mass(cfg)?;
        Ok(Self {
            data: Hist1D::new(axis.clone()),
            mc: Hist3D::new(axis, mc_categories.to_vec()),
        })
    }

    pub fn merge(&mut self, other: &HistogramPair) -> Result<()> {
        self.data.merge(&other.data)?;
        self.mc.merge(&other.mc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> RegularAxis {
        RegularAxis::mass(&AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn axis_edges_and_index() {
        let a = axis();
        assert_eq!(a.extent(), 36);
        assert!((a.width() - 5.0).abs() < 1e-12);
        let e = a.edges();
        assert_eq!(e.len(), 35);
        assert_eq!(e[0], 80.0);
        assert!((e[34] - 250.0).abs() < 1e-9);
        assert_eq!(a.index(79.999), 0);
        assert_eq!(a.index(80.0), 1);
        assert_eq!(a.index(125.0), 10); // [125, 130) is in-range bin 9
        assert_eq!(a.index(249.999), 34);
        assert_eq!(a.index(250.0), 35);
        assert_eq!(a.index(f64::NAN), 35);
        assert_eq!(a.index(f64::NEG_INFINITY), 0);
    }

    #[test]
    fn invalid_axes_rejected() {
        assert!(RegularAxis::new("x", "", 0, 0.0, 1.0).is_err());
        assert!(RegularAxis::new("x", "", 3, 1.0, 1.0).is_err());
        assert!(RegularAxis::new("x", "", 3, 0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn flow_is_kept_not_dropped() {
        let mut h = Hist1D::new(axis());
        h.fill(10.0);
        h.fill(300.0);
        h.fill_weighted(300.0, 2.0);
        h.fill(100.0);
        assert_eq!(h.underflow().sum_w, 1.0);
        assert_eq!(h.overflow().sum_w, 3.0);
        assert_eq!(h.overflow().sum_w2, 5.0);
        assert_eq!(h.values().iter().sum::<f64>(), 1.0);
        assert_eq!(h.total(), 5.0);
    }

    #[test]
    fn hist3d_fill_and_project() {
        let mut h = Hist3D::new(axis(), vec!["Background".into(), "Signal".into()]);
        h.fill(125.0, "Signal", Variation::Nominal, 0.5).unwrap();
        h.fill(125.0, "Signal", Variation::Nominal, 0.25).unwrap();
        h.fill(125.0, "Background", Variation::M4lUp, 2.0).unwrap();
        let sig = h.project("Signal", Variation::Nominal).unwrap();
        assert_eq!(sig.bin(9).sum_w, 0.75);
        assert_eq!(sig.bin(9).sum_w2, 0.3125);
        assert_eq!(h.project("Background", Variation::Nominal).unwrap().total(), 0.0);
        assert_eq!(h.total(Variation::M4lUp).bin(9).sum_w, 2.0);
        assert!(matches!(
            h.fill(125.0, "Data", Variation::Nominal, 1.0),
            Err(FourLepError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn merge_requires_identical_binning() {
        let mut a = Hist1D::new(axis());
        let b = Hist1D::new(RegularAxis::new(MASS_AXIS_NAME, MASS_AXIS_LABEL, 17, 80.0, 250.0).unwrap());
        assert!(matches!(a.merge(&b), Err(FourLepError::BinningMismatch(_))));

        let mut c = Hist3D::new(axis(), vec!["A".into()]);
        let d = Hist3D::new(axis(), vec!["B".into()]);
        assert!(matches!(c.merge(&d), Err(FourLepError::BinningMismatch(_))));
    }

    #[test]
    fn merge_is_order_independent() {
        let cats = vec!["A".to_string(), "B".to_string()];
        let mut parts = Vec::new();
        for (i, x) in [90.0, 125.0, 300.0].into_iter().enumerate() {
            let mut p = HistogramPair::empty(&AnalysisConfig::default(), &cats).unwrap();
            p.data.fill(x);
            p.mc.fill(x, &cats[i % 2], Variation::ScaleFactorUp, 0.1 * (i + 1) as f64).unwrap();
            parts.push(p);
        }
        let mut fwd = parts[0].clone();
        fwd.merge(&parts[1]).unwrap();
        fwd.merge(&parts[2]).unwrap();
        let mut rev = parts[2].clone();
        rev.merge(&parts[0]).unwrap();
        rev.merge(&parts[1]).unwrap();
        assert_eq!(fwd.data, rev.data);
        for (a, b) in fwd.mc.bins.iter().zip(&rev.mc.bins) {
            assert!((a.sum_w - b.sum_w).abs() < 1e-12);
            assert!((a.sum_w2 - b.sum_w2).abs() < 1e-12);
        }
    }

    #[test]
    fn variation_labels_round_trip() {
        for v in Variation::ALL {
            assert_eq!(Variation::from_label(v.label()), Some(v));
        }
        assert_eq!(serde_json::to_string(&Variation::M4lDown).unwrap(), "\"m4lDOWN\"");
        assert_eq!(Variation::from_label("bogus"), None);
    }

    #[test]
    fn pair_serialises_mc_key() {
        let p = HistogramPair::empty(&AnalysisConfig::default(), &[]).unwrap();
        let v = serde_json::to_value(&p).unwrap();
        assert!(v.get("MC").is_some());
        assert!(v.get("data").is_some());
    }
}

use fourlep_common::{FourLepError, Result};

use crate::event::{Event, Lepton};

/// Charge-neutral type sums for 4e (44), 2e2mu (48) and 4mu (52).
pub const VALID_TYPE_SUMS: [i64; 3] = [44, 48, 52];

pub const ELECTRON_TYPE: i32 = 11;
pub const MUON_TYPE: i32 = 13;

/// sums are taken in i64 so corrupt codes cannot overflow
fn code_sum(codes: impl Iterator<Item = i32>) -> i64 {
    codes.map(i64::from).sum()
}

fn passes(charge_sum: i64, type_sum: i64) -> bool {
    charge_sum == 0 && VALID_TYPE_SUMS.contains(&type_sum)
}

/// Per-event mask over ragged lepton charge/type lists: charges must sum to zero
/// and types to one of [`VALID_TYPE_SUMS`]. Lepton counts may differ per event.
pub fn lepton_filter<C, T>(charges: &[C], types: &[T]) -> Result<Vec<bool>>
where
    C: AsRef<[i32]>,
    T: AsRef<[i32]>,
{
    if charges.len() != types.len() {
        return Err(FourLepError::Other(format!(
            "lepton_filter: {} charge lists vs {} type lists",
            charges.len(),
            types.len()
        )));
    }
    Ok(charges
        .iter()
        .zip(types)
        .map(|(c, t)| passes(code_sum(c.as_ref().iter().copied()), code_sum(t.as_ref().iter().copied())))
        .collect())
}

pub fn event_passes(leptons: &[Lepton]) -> bool {
    passes(
        code_sum(leptons.iter().map(|l| l.charge)),
        code_sum(leptons.iter().map(|l| l.type_id)),
    )
}

pub fn select_mask(events: &[Event]) -> Vec<bool> {
    events.iter().map(|e| event_passes(&e.leptons)).collect()
}

// --- query-level filter and projection ---

pub const COL_LEP_N: &str = "lep_n";
pub const COL_LEP_PT: &str = "lep_pt";
pub const COL_LEP_ETA: &str = "lep_eta";
pub const COL_LEP_PHI: &str = "lep_phi";
pub const COL_LEP_E: &str = "lep_E";
pub const COL_LEP_CHARGE: &str = "lep_charge";
pub const COL_LEP_TYPE: &str = "lep_type";
pub const COL_MC_WEIGHT: &str = "mcWeight";
pub const COL_SF_ELE: &str = "scaleFactor_ELE";
pub const COL_SF_MUON: &str = "scaleFactor_MUON";
pub const COL_SF_TRIGGER: &str = "scaleFactor_LepTRIGGER";
pub const COL_SF_PILEUP: &str = "scaleFactor_PILEUP";
pub const COL_SF: &str = "scaleFactor";
pub const COL_SF_UP: &str = "scaleFactorUP";
pub const COL_SF_DOWN: &str = "scaleFactorDOWN";

pub const LEPTON_COLUMNS: [&str; 6] = [
    COL_LEP_PT,
    COL_LEP_ETA,
    COL_LEP_PHI,
    COL_LEP_E,
    COL_LEP_CHARGE,
    COL_LEP_TYPE,
];

/// scale-factor components multiplied into the nominal per-event scale factor
pub const SCALE_FACTOR_COMPONENTS: [&str; 4] = [COL_SF_ELE, COL_SF_MUON, COL_SF_TRIGGER, COL_SF_PILEUP];

/// Declarative per-event filter and projection applied while reading:
/// keep events with exactly `lepton_count` leptons and only the columns the
/// histogramming needs. Scale-factor variations are derived as `nominal * up_factor`
/// and `nominal * down_factor`.
#[derive(Debug, Clone, PartialEq)]
pub struct LeptonQuery {
    pub lepton_count: usize,
    pub up_factor: f64,
    pub down_factor: f64,
}

impl Default for LeptonQuery {
    fn default() -> Self {
        Self {
            lepton_count: 4,
            up_factor: 1.1,
            down_factor: 0.9,
        }
    }
}

impl LeptonQuery {
    pub fn accepts(&self, lepton_count: usize) -> bool {
        lepton_count == self.lepton_count
    }

    /// columns to read when present in the file; everything else is projected away
    pub fn columns(&self) -> Vec<&'static str> {
        let mut cols = vec![COL_LEP_N];
        cols.extend(LEPTON_COLUMNS);
        cols.push(COL_MC_WEIGHT);
        cols.extend(SCALE_FACTOR_COMPONENTS);
        cols.extend([COL_SF, COL_SF_UP, COL_SF_DOWN]);
        cols
    }

    /// (nominal, up, down) from the product of scale-factor components
    pub fn scale_factors(&self, components: &[f64]) -> (f64, f64, f64) {
        let nominal: f64 = components.iter().product();
        (nominal, nominal * self.up_factor, nominal * self.down_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lep(charge: i32, type_id: i32) -> Lepton {
        Lepton { pt: 1.0, eta: 0.0, phi: 0.0, energy: 1.0, charge, type_id }
    }

    #[test]
    fn accepts_valid_flavour_combinations() {
        let charges = vec![vec![1, -1, 1, -1]; 3];
        let types = vec![vec![11, 11, 11, 11], vec![11, 11, 13, 13], vec![13, 13, 13, 13]];
        assert_eq!(lepton_filter(&charges, &types).unwrap(), vec![true, true, true]);
    }

    #[test]
    fn nonzero_charge_always_rejected() {
        let types = vec![vec![11, 11, 13, 13]; 4];
        let charges = vec![vec![1, 1, 1, -1], vec![1, 1, 1, 1], vec![-1, -1, 1, -1], vec![1, 0, 0, 0]];
        assert_eq!(lepton_filter(&charges, &types).unwrap(), vec![false; 4]);
    }

    #[test]
    fn bad_type_sum_always_rejected() {
        let charges = vec![vec![1, -1, 1, -1]; 3];
        // 11+13+13+13 = 50, 11+11+11+13 = 46, tau-like 15s
        let types = vec![vec![11, 13, 13, 13], vec![11, 11, 11, 13], vec![15, 15, 11, 11]];
        assert_eq!(lepton_filter(&charges, &types).unwrap(), vec![false; 3]);
    }

    #[test]
    fn ragged_and_empty_input() {
        let empty: Vec<Vec<i32>> = Vec::new();
        assert!(lepton_filter(&empty, &empty).unwrap().is_empty());
        // only the sums are checked, not the lepton count
        let charges: Vec<Vec<i32>> = vec![vec![1, -1], vec![1, -1, 0, 1, -1], vec![]];
        let types: Vec<Vec<i32>> = vec![vec![22, 22], vec![13, 13, 0, 13, 13], vec![]];
        assert_eq!(lepton_filter(&charges, &types).unwrap(), vec![true, true, false]);
    }

    #[test]
    fn huge_codes_do_not_overflow() {
        let charges = vec![vec![i32::MAX, i32::MAX, 1, -1]];
        let types = vec![vec![i32::MAX, i32::MAX, 11, 11]];
        assert_eq!(lepton_filter(&charges, &types).unwrap(), vec![false]);
        let ev = Event::unweighted(vec![lep(1, i32::MAX), lep(-1, i32::MAX), lep(1, 13), lep(-1, 13)]);
        assert!(!event_passes(&ev.leptons));
    }

    #[test]
    fn mismatched_lengths_error() {
        let charges = vec![vec![1, -1]];
        let types: Vec<Vec<i32>> = Vec::new();
        assert!(lepton_filter(&charges, &types).is_err());
    }

    #[test]
    fn event_mask_matches_columnar_filter() {
        let events = vec![
            Event::unweighted(vec![lep(1, 11), lep(-1, 11), lep(1, 13), lep(-1, 13)]),
            Event::unweighted(vec![lep(1, 11), lep(1, 11), lep(1, 13), lep(-1, 13)]),
        ];
        assert_eq!(select_mask(&events), vec![true, false]);
    }

    #[test]
    fn query_scale_factor_variations() {
        let q = LeptonQuery::default();
        let (n, up, down) = q.scale_factors(&[0.5, 2.0, 1.0, 0.8]);
        assert!((n - 0.8).abs() < 1e-12);
        assert!((up - 0.88).abs() < 1e-12);
        assert!((down - 0.72).abs() < 1e-12);
        assert!(q.accepts(4));
        assert!(!q.accepts(3));
        assert!(q.columns().contains(&COL_LEP_N));
    }
}

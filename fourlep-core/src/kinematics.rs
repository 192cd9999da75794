use std::ops::{Add, AddAssign};

use crate::event::Lepton;

const MEV_PER_GEV: f64 = 1000.0;

/// Lorentz four-vector `(E, px, py, pz)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FourVector {
    pub e: f64,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
}

impl FourVector {
    pub fn new(e: f64, px: f64, py: f64, pz: f64) -> Self {
        Self { e, px, py, pz }
    }

    /// build from collider coordinates (transverse momentum, pseudorapidity, azimuth, energy)
    pub fn from_pt_eta_phi_e(pt: f64, eta: f64, phi: f64, e: f64) -> Self {
        Self {
            e,
            px: pt * phi.cos(),
            py: pt * phi.sin(),
            pz: pt * eta.sinh(),
        }
    }

    pub fn p2(&self) -> f64 {
        self.px * self.px + self.py * self.py + self.pz * self.pz
    }

    pub fn mass2(&self) -> f64 {
        self.e * self.e - self.p2()
    }

    /// invariant mass; a spacelike vector yields `-sqrt(-m2)`
    pub fn mass(&self) -> f64 {
        let m2 = self.mass2();
        if m2 < 0.0 {
            -(-m2).sqrt()
        } else {
            m2.sqrt()
        }
    }
}

impl Add for FourVector {
    type Output = FourVector;
    fn add(self, rhs: FourVector) -> FourVector {
        FourVector {
            e: self.e + rhs.e,
            px: self.px + rhs.px,
            py: self.py + rhs.py,
            pz: self.pz + rhs.pz,
        }
    }
}

impl AddAssign for FourVector {
    fn add_assign(&mut self, rhs: FourVector) {
        *self = *self + rhs;
    }
}

impl Lepton {
    pub fn p4(&self) -> FourVector {
        FourVector::from_pt_eta_phi_e(self.pt, self.eta, self.phi, self.energy)
    }
}

/// Invariant mass of the summed leptons, converted from MeV to GeV.
///
/// The selection upstream guarantees four leptons; this sums however many are given.
pub fn invariant_mass_gev(leptons: &[Lepton]) -> f64 {
    let total = leptons
        .iter()
        .fold(FourVector::default(), |acc, l| acc + l.p4());
    total.mass() / MEV_PER_GEV
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lepton(pt: f64, eta: f64, phi: f64, m: f64) -> Lepton {
        let p = pt * eta.cosh();
        Lepton { pt, eta, phi, energy: (p * p + m * m).sqrt(), charge: 0, type_id: 11 }
    }

    #[test]
    fn single_particle_mass() {
        let l = lepton(40_000.0, 0.7, 1.1, 105.66);
        assert!((l.p4().mass() - 105.66).abs() < 1e-3);
    }

    #[test]
    fn back_to_back_pair() {
        // two massless legs at rest-frame angle 180 deg: m = 2 * E
        let a = lepton(50_000.0, 0.0, 0.0, 0.0);
        let b = lepton(50_000.0, 0.0, std::f64::consts::PI, 0.0);
        assert!((invariant_mass_gev(&[a, b]) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn four_legs_at_rest_frame() {
        let ls = [
            lepton(31_250.0, 0.0, 0.0, 0.0),
            lepton(31_250.0, 0.0, std::f64::consts::FRAC_PI_2, 0.0),
            lepton(31_250.0, 0.0, std::f64::consts::PI, 0.0),
            lepton(31_250.0, 0.0, -std::f64::consts::FRAC_PI_2, 0.0),
        ];
        assert!((invariant_mass_gev(&ls) - 125.0).abs() < 1e-9);
    }

    #[test]
    fn spacelike_is_negative() {
        let v = FourVector::new(1.0, 2.0, 0.0, 0.0);
        assert!(v.mass() < 0.0);
        assert!((v.mass() + 3f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn add_assign_matches_add() {
        let a = FourVector::new(5.0, 1.0, 2.0, 3.0);
        let b = FourVector::new(7.0, -1.0, 0.5, 1.0);
        let mut c = a;
        c += b;
        assert_eq!(c, a + b);
    }
}

//! Time-binned induced-current pulses and their per-pixel aggregation.
//!
//! A [`Pulse`] is the per-carrier-group record of induced charge as a function of time
//! for a single pixel (Ramo's theorem, see [`crate::field::FieldStore::get_weighting_potential`]).
//! The [`PulseAggregator`] accumulates [`Pulse`]s across carrier groups into the map that
//! ends up on a `PropagatedCharge`.

use crate::error::PulseIncompatibleError;
use crate::geometry::PixelIndex;
use std::collections::HashMap;

/// An ordered sequence of induced-charge bins of uniform width `bin_ns`.
///
/// Zero-length and uninitialized (`bin_ns` unset) until the first [`Pulse::add_charge`].
/// An uninitialized pulse stores everything in bin 0, matching legacy behaviour for
/// pulses that are never given an explicit binning before their first charge arrives.
#[derive(Clone, Debug, Default)]
pub struct Pulse {
    bins: Vec<f64>,
    bin_ns: Option<f64>,
}

impl Pulse {
    /// Creates a pulse with an explicit, immediately-valid bin width.
    pub fn new(bin_ns: f64) -> Self {
        assert!(bin_ns > 0.0, "Pulse.bin_ns must be > 0");
        Self { bins: Vec::new(), bin_ns: Some(bin_ns) }
    }

    /// Creates an uninitialized pulse (bin width adopted from the first merge, or left
    /// as bin-0-only accumulation if charge is added before any merge).
    pub fn uninitialized() -> Self {
        Self { bins: Vec::new(), bin_ns: None }
    }

    pub fn bin_ns(&self) -> Option<f64> {
        self.bin_ns
    }

    pub fn is_initialized(&self) -> bool {
        self.bin_ns.is_some()
    }

    pub fn bins(&self) -> &[f64] {
        &self.bins
    }

    /// Adds `charge` induced at time `t` (ns) into its bin, growing the bin vector as needed.
    pub fn add_charge(&mut self, charge: f64, t: f64) {
        let bin = match self.bin_ns {
            Some(w) => (t / w).floor().max(0.0) as usize,
            None => 0,
        };
        if bin >= self.bins.len() {
            self.bins.resize(bin + 1, 0.0);
        }
        self.bins[bin] += charge;
    }

    /// Rounded sum of all bins (net induced charge in elementary charge units).
    pub fn integral(&self) -> i64 {
        self.bins.iter().sum::<f64>().round() as i64
    }

    /// Compound merge: `self += other`. Requires matching `bin_ns` once both sides are
    /// initialized; an uninitialized `self` adopts `other`'s binning.
    pub fn merge(&mut self, other: &Pulse) -> Result<(), PulseIncompatibleError> {
        if !self.is_initialized() {
            self.bin_ns = other.bin_ns;
        } else if let Some(rhs) = other.bin_ns {
            let lhs = self.bin_ns.unwrap();
            if (lhs - rhs).abs() > f64::EPSILON * lhs.max(rhs).max(1.0) {
                return Err(PulseIncompatibleError { lhs, rhs });
            }
        }

        if self.bins.len() < other.bins.len() {
            self.bins.resize(other.bins.len(), 0.0);
        }
        for (i, v) in other.bins.iter().enumerate() {
            self.bins[i] += v;
        }
        Ok(())
    }
}

impl std::ops::AddAssign<&Pulse> for Pulse {
    fn add_assign(&mut self, rhs: &Pulse) {
        self.merge(rhs).expect("Pulse::add_assign requires matching bin widths; use merge() to handle the error");
    }
}

/// Per-event, per-pixel accumulator for induced current. Strictly scoped to one carrier
/// group during propagation; per-pixel aggregation across groups happens by merging each
/// group's map into the enclosing `PropagatedCharge`'s map (see [`PulseAggregator::merge_into`]).
#[derive(Clone, Debug, Default)]
pub struct PulseAggregator {
    pulses: HashMap<PixelIndex, Pulse>,
    bin_ns: f64,
}

impl PulseAggregator {
    pub fn new(bin_ns: f64) -> Self {
        Self { pulses: HashMap::new(), bin_ns }
    }

    pub fn bin_ns(&self) -> f64 {
        self.bin_ns
    }

    /// Adds induced charge `q` at time `t` to `pixel`'s pulse, creating it lazily.
    pub fn add_charge(&mut self, pixel: PixelIndex, q: f64, t: f64) {
        self.pulses.entry(pixel).or_insert_with(|| Pulse::new(self.bin_ns)).add_charge(q, t);
    }

    pub fn pulses(&self) -> &HashMap<PixelIndex, Pulse> {
        &self.pulses
    }

    pub fn into_pulses(self) -> HashMap<PixelIndex, Pulse> {
        self.pulses
    }

    /// Merges `self`'s pixel pulses into `target`, growing/creating entries as needed.
    pub fn merge_into(&self, target: &mut HashMap<PixelIndex, Pulse>) -> Result<(), PulseIncompatibleError> {
        for (pixel, pulse) in &self.pulses {
            target.entry(*pixel).or_insert_with(Pulse::uninitialized).merge(pulse)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_extends_and_sums() {
        let mut a = Pulse::new(0.1);
        for (i, v) in [1.0, 2.0, 3.0].into_iter().enumerate() {
            a.add_charge(v, i as f64 * 0.1);
        }
        let mut b = Pulse::new(0.1);
        for (i, v) in [0.0, 0.0, 0.0, 4.0, 5.0].into_iter().enumerate() {
            b.add_charge(v, i as f64 * 0.1);
        }
        a.merge(&b).unwrap();
        assert_eq!(a.bins(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(a.integral(), 15);
    }

    #[test]
    fn merge_rejects_mismatched_binning() {
        let mut a = Pulse::new(0.1);
        a.add_charge(1.0, 0.0);
        let mut b = Pulse::new(0.2);
        b.add_charge(1.0, 0.0);
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn merge_is_commutative_and_associative() {
        let mk = |vals: &[f64]| {
            let mut p = Pulse::new(0.1);
            for (i, v) in vals.iter().enumerate() {
                p.add_charge(*v, i as f64 * 0.1);
            }
            p
        };
        let a = mk(&[1.0, 2.0]);
        let b = mk(&[3.0, 4.0, 5.0]);
        let c = mk(&[1.0]);

        let mut ab_c = a.clone();
        ab_c.merge(&b).unwrap();
        ab_c.merge(&c).unwrap();

        let mut ba_c = b.clone();
        ba_c.merge(&a).unwrap();
        ba_c.merge(&c).unwrap();

        assert_eq!(ab_c.integral(), ba_c.integral());

        let mut a_bc = b.clone();
        a_bc.merge(&c).unwrap();
        let mut a_then_bc = a.clone();
        a_then_bc.merge(&a_bc).unwrap();
        assert_eq!(a_then_bc.integral(), ab_c.integral());
    }

    #[test]
    fn uninitialized_pulse_stores_in_bin_zero() {
        let mut p = Pulse::uninitialized();
        p.add_charge(3.0, 17.0);
        p.add_charge(4.0, 0.2);
        assert_eq!(p.bins(), &[7.0]);
    }
}

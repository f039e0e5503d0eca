//! Canonical unit system used throughout the core.
//!
//! The framework's configuration layer owns parsing configuration strings; the core only
//! needs to know the conversion factors into its internal base units (mm, ns, K, MeV, e, T,
//! rad, 1-MeV-neq) so that values arriving from readers (field files, TCAD meshes) or used
//! in closed-form physics expressions land in the same frame. Compound units of the form
//! `numerator/denominator` (e.g. `"V/um"`) are supported since the electric field is carried
//! internally in V*um^-1.

use std::collections::HashMap;
use std::sync::OnceLock;

fn base_units() -> &'static HashMap<&'static str, f64> {
    static UNITS: OnceLock<HashMap<&'static str, f64>> = OnceLock::new();
    UNITS.get_or_init(|| {
        let mut m = HashMap::new();
        // length, base: mm
        m.insert("nm", 1e-6);
        m.insert("um", 1e-3);
        m.insert("mm", 1.0);
        m.insert("cm", 1e1);
        m.insert("dm", 1e2);
        m.insert("m", 1e3);
        m.insert("km", 1e6);
        // time, base: ns
        m.insert("ps", 1e-3);
        m.insert("ns", 1.0);
        m.insert("us", 1e3);
        m.insert("ms", 1e6);
        m.insert("s", 1e9);
        // temperature, base: K
        m.insert("K", 1.0);
        // energy, base: MeV
        m.insert("eV", 1e-6);
        m.insert("keV", 1e-3);
        m.insert("MeV", 1.0);
        m.insert("GeV", 1e3);
        // charge, base: e
        m.insert("e", 1.0);
        m.insert("ke", 1e3);
        m.insert("fC", 1.0 / 1.602176634e-4);
        m.insert("C", 1.0 / 1.602176634e-19);
        // voltage, derived from energy/charge, base: MeV/e
        m.insert("mV", 1e-9);
        m.insert("V", 1e-6);
        m.insert("kV", 1e-3);
        // magnetic field, base: T
        m.insert("kT", 1e3);
        m.insert("T", 1.0);
        m.insert("mT", 1e-3);
        // angle, base: rad (pseudo-unit)
        m.insert("deg", std::f64::consts::PI / 180.0);
        m.insert("rad", 1.0);
        m.insert("mrad", 1e-3);
        // fluence, base: neq (pseudo-unit)
        m.insert("neq", 1.0);
        m
    })
}

/// Converts `value` expressed in `unit` into the core's internal base units.
///
/// Accepts a single unit (`"mm"`, `"ns"`) or a `numerator/denominator` compound
/// (`"V/um"`). Returns `None` if either component is not a registered unit.
pub fn to_internal(value: f64, unit: &str) -> Option<f64> {
    let units = base_units();
    match unit.split_once('/') {
        Some((num, den)) => {
            let n = *units.get(num)?;
            let d = *units.get(den)?;
            Some(value * n / d)
        }
        None => Some(value * *units.get(unit)?),
    }
}

/// Converts `value` in internal base units back into `unit` for display/export.
pub fn from_internal(value: f64, unit: &str) -> Option<f64> {
    let units = base_units();
    match unit.split_once('/') {
        Some((num, den)) => {
            let n = *units.get(num)?;
            let d = *units.get(den)?;
            Some(value * d / n)
        }
        None => Some(value / *units.get(unit)?),
    }
}

/// Speed of light in vacuum, mm/ns (= 1e-3 * m/s in SI... expressed in framework units: 299.792458 mm/ns).
pub const C_LIGHT_MM_NS: f64 = 299.792458;
/// Boltzmann constant in MeV/K.
pub const K_BOLTZMANN_MEV_K: f64 = 8.617_333_262e-11;
/// Elementary charge is identically 1 in the `e` unit by construction.
pub const Q_E: f64 = 1.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_round_trip() {
        let mm = to_internal(300.0, "um").unwrap();
        assert!((mm - 0.3).abs() < 1e-12);
        let back = from_internal(mm, "um").unwrap();
        assert!((back - 300.0).abs() < 1e-9);
    }

    #[test]
    fn compound_field_unit() {
        // 10 V/um in internal mm/ns/MeV/e frame
        let v = to_internal(10.0, "V/um").unwrap();
        assert!(v.is_finite());
        let back = from_internal(v, "V/um").unwrap();
        assert!((back - 10.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_unit_is_none() {
        assert!(to_internal(1.0, "parsec").is_none());
    }
}

//! Carrier mobility models: field- and temperature-dependent drift velocity saturation.
//!
//! Modelled as a tagged enum rather than a trait object hierarchy, per the "prefer
//! tagged variants" design note — every variant is a closed-form expression with no
//! state beyond its own constants, so a dispatch match is all the indirection needed.

use crate::error::ModelError;
use crate::geometry::CarrierType;

/// Temperature-scaled saturation-velocity mobility models from the Jacoboni/Canali
/// family. `evaluate` returns mobility in mm^2 / (V*ns) given the local field magnitude
/// (V/um) and lattice temperature (K).
#[derive(Clone, Copy, Debug)]
pub enum MobilityModel {
    JacoboniCanali,
    Canali,
    CanaliFast { beta_electron: f64, beta_hole: f64 },
}

impl MobilityModel {
    /// Builds a model from its configuration-string name, per the "construct by
    /// configuration string" model-loading convention; `CanaliFast`'s per-carrier betas
    /// are a parameterised variant, not reachable by name alone.
    pub fn from_config(name: &str) -> Result<Self, ModelError> {
        match name {
            "jacoboni_canali" => Ok(MobilityModel::JacoboniCanali),
            "canali" => Ok(MobilityModel::Canali),
            other => Err(ModelError::UnknownVariant(other.to_string())),
        }
    }

    pub fn evaluate(&self, carrier: CarrierType, efield_mag: f64, temperature: f64) -> f64 {
        match self {
            MobilityModel::JacoboniCanali => canali_family(carrier, efield_mag, temperature, 1.53e9, 1.62e8),
            MobilityModel::Canali => canali_family(carrier, efield_mag, temperature, 1.43e9, 1.62e8),
            MobilityModel::CanaliFast { beta_electron, beta_hole } => {
                let beta = match carrier {
                    CarrierType::Electron => *beta_electron,
                    CarrierType::Hole => *beta_hole,
                };
                canali_family_beta(carrier, efield_mag, temperature, 1.53e9, 1.62e8, beta)
            }
        }
    }
}

/// Shared Jacoboni/Canali closed form: `v = (vm/ec) / (1 + (E/ec)^beta)^(1/beta)`, with
/// `vm` and `ec` scaled by temperature per carrier type.
fn canali_family(carrier: CarrierType, efield_mag: f64, temperature: f64, electron_vm_coeff: f64, hole_vm_coeff: f64) -> f64 {
    let beta = match carrier {
        CarrierType::Electron => beta_electron(temperature),
        CarrierType::Hole => beta_hole(temperature),
    };
    canali_family_beta(carrier, efield_mag, temperature, electron_vm_coeff, hole_vm_coeff, beta)
}

fn beta_electron(temperature: f64) -> f64 {
    1.109 * (temperature / 300.0).powf(0.66)
}

fn beta_hole(temperature: f64) -> f64 {
    1.213 * (temperature / 300.0).powf(0.17)
}

fn canali_family_beta(carrier: CarrierType, efield_mag: f64, temperature: f64, electron_vm_coeff: f64, hole_vm_coeff: f64, beta: f64) -> f64 {
    let (vm, ec) = match carrier {
        CarrierType::Electron => (electron_vm_coeff * temperature.powf(-0.87), 1.01 * temperature.powf(1.55)),
        CarrierType::Hole => (hole_vm_coeff * temperature.powf(-0.52), 1.24 * temperature.powf(1.68)),
    };
    let e_over_ec = efield_mag / ec;
    (vm / ec) / (1.0 + e_over_ec.powf(beta)).powf(1.0 / beta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobility_decreases_with_field() {
        let model = MobilityModel::JacoboniCanali;
        let low = model.evaluate(CarrierType::Electron, 0.1, 293.15);
        let high = model.evaluate(CarrierType::Electron, 10.0, 293.15);
        assert!(high < low);
    }

    #[test]
    fn mobility_is_positive_for_both_carriers() {
        let model = MobilityModel::Canali;
        assert!(model.evaluate(CarrierType::Electron, 1.0, 293.15) > 0.0);
        assert!(model.evaluate(CarrierType::Hole, 1.0, 293.15) > 0.0);
    }

    #[test]
    fn from_config_rejects_unknown_name() {
        let err = MobilityModel::from_config("masetti").unwrap_err();
        assert!(matches!(err, crate::error::ModelError::UnknownVariant(name) if name == "masetti"));
    }

    #[test]
    fn from_config_accepts_known_names() {
        assert!(matches!(MobilityModel::from_config("jacoboni_canali").unwrap(), MobilityModel::JacoboniCanali));
        assert!(matches!(MobilityModel::from_config("canali").unwrap(), MobilityModel::Canali));
    }
}

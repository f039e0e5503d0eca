//! Recombination-lifetime models governing the MOTION->RECOMBINED transition.

use crate::error::ModelError;
use crate::geometry::CarrierType;

/// `evaluate` returns the carrier lifetime in ns for the given local doping
/// concentration (cm^-3, signed) and temperature; a non-finite (infinite) lifetime
/// means "never recombines" under this model.
#[derive(Clone, Copy, Debug)]
pub enum RecombinationModel {
    None,
    ConstantLifetime { tau_ns: f64 },
    ShockleyReadHall,
    Auger,
    ShockleyReadHallAuger,
}

impl RecombinationModel {
    /// Builds a model from its configuration-string name. The doping-dependent variants
    /// are unsuitable without a doping profile: their lifetime would silently fall back
    /// to the `doping = 0` intrinsic limit rather than the sensor's real concentration.
    pub fn from_config(name: &str, doping_available: bool) -> Result<Self, ModelError> {
        let model = match name {
            "none" => RecombinationModel::None,
            "shockley_read_hall" => RecombinationModel::ShockleyReadHall,
            "auger" => RecombinationModel::Auger,
            "shockley_read_hall_auger" => RecombinationModel::ShockleyReadHallAuger,
            other => return Err(ModelError::UnknownVariant(other.to_string())),
        };
        if model.requires_doping() && !doping_available {
            return Err(ModelError::Unsuitable { model: name.to_string(), reason: "requires a doping profile but none is configured".into() });
        }
        Ok(model)
    }

    fn requires_doping(&self) -> bool {
        !matches!(self, RecombinationModel::None | RecombinationModel::ConstantLifetime { .. })
    }

    pub fn lifetime(&self, carrier: CarrierType, doping: f64, temperature: f64) -> f64 {
        match self {
            RecombinationModel::None => f64::INFINITY,
            RecombinationModel::ConstantLifetime { tau_ns } => *tau_ns,
            RecombinationModel::ShockleyReadHall => srh_lifetime(carrier, doping, temperature),
            RecombinationModel::Auger => auger_lifetime(carrier, doping),
            RecombinationModel::ShockleyReadHallAuger => {
                let srh = srh_lifetime(carrier, doping, temperature);
                let auger = auger_lifetime(carrier, doping);
                1.0 / (1.0 / srh + 1.0 / auger)
            }
        }
    }

    /// Samples whether the carrier recombines over `dt_ns`: true if `u < 1 - exp(-dt/tau)`.
    pub fn samples_recombination(&self, carrier: CarrierType, doping: f64, temperature: f64, dt_ns: f64, u: f64) -> bool {
        let tau = self.lifetime(carrier, doping, temperature);
        if !tau.is_finite() {
            return false;
        }
        u < 1.0 - (-dt_ns / tau).exp()
    }
}

/// Doping-dependent Shockley-Read-Hall lifetime, reference lifetimes and doping scales
/// per carrier type, temperature-scaled by `(300/T)^1.5`.
fn srh_lifetime(carrier: CarrierType, doping: f64, temperature: f64) -> f64 {
    let n = doping.abs().max(1.0);
    let (tau_ref_s, n_ref) = match carrier {
        CarrierType::Electron => (1e-5, 1e16),
        CarrierType::Hole => (4e-4, 7.1e15),
    };
    let tau_s = tau_ref_s / (1.0 + n / n_ref);
    let scaled = tau_s * (300.0 / temperature).powf(1.5);
    scaled * 1e9 // s -> ns
}

/// Auger recombination, minority-carrier-only: `tau = 1 / (C * n^2)` with `C = 3.8e-31 cm^6/s`.
fn auger_lifetime(_carrier: CarrierType, doping: f64) -> f64 {
    const C_AUGER: f64 = 3.8e-31;
    let n = doping.abs().max(1.0);
    let tau_s = 1.0 / (C_AUGER * n * n);
    tau_s * 1e9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_never_recombines() {
        let model = RecombinationModel::None;
        assert!(!model.samples_recombination(CarrierType::Electron, 1e15, 293.15, 1000.0, 0.9999));
    }

    #[test]
    fn higher_doping_shortens_srh_lifetime() {
        let low = srh_lifetime(CarrierType::Electron, 1e14, 293.15);
        let high = srh_lifetime(CarrierType::Electron, 1e18, 293.15);
        assert!(high < low);
    }

    #[test]
    fn combined_model_has_shorter_lifetime_than_either_alone() {
        let combined = RecombinationModel::ShockleyReadHallAuger.lifetime(CarrierType::Electron, 1e17, 293.15);
        let srh = RecombinationModel::ShockleyReadHall.lifetime(CarrierType::Electron, 1e17, 293.15);
        let auger = RecombinationModel::Auger.lifetime(CarrierType::Electron, 1e17, 293.15);
        assert!(combined < srh && combined < auger);
    }

    #[test]
    fn from_config_rejects_doping_dependent_model_without_doping() {
        let err = RecombinationModel::from_config("shockley_read_hall", false).unwrap_err();
        assert!(matches!(err, crate::error::ModelError::Unsuitable { model, .. } if model == "shockley_read_hall"));
    }

    #[test]
    fn from_config_accepts_doping_dependent_model_with_doping() {
        assert!(matches!(RecombinationModel::from_config("auger", true).unwrap(), RecombinationModel::Auger));
    }

    #[test]
    fn from_config_accepts_none_without_doping() {
        assert!(matches!(RecombinationModel::from_config("none", false).unwrap(), RecombinationModel::None));
    }

    #[test]
    fn from_config_rejects_unknown_name() {
        assert!(matches!(RecombinationModel::from_config("bogus", true), Err(crate::error::ModelError::UnknownVariant(_))));
    }
}

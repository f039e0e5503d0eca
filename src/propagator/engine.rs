//! The carrier propagator: advances every deposited-charge group through the sensor to
//! a terminal state, running events concurrently on a work-stealing pool with a seeded,
//! splittable per-event RNG.

use crate::error::{ConfigError, CoreError, ModelError};
use crate::field::FieldStore;
use crate::geometry::{CarrierType, PixelDetectorModel, PixelIndex, Point3D};
use crate::physics::{DetrappingModel, ImpactIonizationModel, MobilityModel, RecombinationModel, TrappingModel};
use crate::propagator::boundary;
use crate::propagator::carrier::{CarrierGroup, CarrierState, DepositedCharge, PropagatedCharge};
use crate::rk::{AdaptiveStepControl, RungeKutta, Tableau};
use crate::units::K_BOLTZMANN_MEV_K;
use glam::DVec3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Physics model bundle a propagator run is configured with.
#[derive(Clone, Debug)]
pub struct PropagatorModels {
    pub mobility: MobilityModel,
    pub recombination: RecombinationModel,
    pub trapping: TrappingModel,
    pub detrapping: DetrappingModel,
    pub impact_ionization: ImpactIonizationModel,
}

/// Configuration-string names (and the few parameters not nameable by string alone)
/// driving [`PropagatorModels::from_config`].
pub struct ModelConfig<'a> {
    pub mobility: &'a str,
    pub recombination: &'a str,
    pub trapping: &'a str,
    pub detrapping: &'a str,
    pub impact_ionization: &'a str,
    pub impact_ionization_threshold_v_per_um: f64,
    pub impact_ionization_max_multiplication_level: u32,
    pub doping_available: bool,
    pub fluence: f64,
}

impl PropagatorModels {
    /// Builds the model bundle by configuration string, rejecting unknown variant names
    /// and combinations a model declares itself unsuitable for (e.g. a doping-dependent
    /// recombination model with no doping profile configured).
    pub fn from_config(cfg: &ModelConfig) -> Result<Self, ModelError> {
        Ok(Self {
            mobility: MobilityModel::from_config(cfg.mobility)?,
            recombination: RecombinationModel::from_config(cfg.recombination, cfg.doping_available)?,
            trapping: TrappingModel::from_config(cfg.trapping, cfg.fluence)?,
            detrapping: DetrappingModel::from_config(cfg.detrapping)?,
            impact_ionization: ImpactIonizationModel::from_config(
                cfg.impact_ionization,
                cfg.impact_ionization_threshold_v_per_um,
                cfg.impact_ionization_max_multiplication_level,
            )?,
        })
    }

    /// Builds the model bundle from the framework's in-memory configuration map,
    /// reporting a missing required key before falling through to the per-model
    /// unsuitability checks in [`Self::from_config`].
    pub fn from_config_map(map: &HashMap<String, String>, doping_available: bool, fluence: f64) -> Result<Self, CoreError> {
        let required = |key: &str| -> Result<&str, ConfigError> { map.get(key).map(String::as_str).ok_or_else(|| ConfigError::MissingKey(key.to_string())) };

        let cfg = ModelConfig {
            mobility: required("mobility_model")?,
            recombination: required("recombination_model")?,
            trapping: required("trapping_model")?,
            detrapping: required("detrapping_model")?,
            impact_ionization: required("impact_ionization_model")?,
            impact_ionization_threshold_v_per_um: 0.0,
            impact_ionization_max_multiplication_level: 0,
            doping_available,
            fluence,
        };
        Ok(Self::from_config(&cfg)?)
    }
}

/// Tunables governing time-stepping, diffusion, surface physics, and charge-group
/// subdivision.
#[derive(Clone)]
pub struct PropagatorConfig {
    pub temperature: f64,
    pub t_integration: f64,
    pub initial_time_step: f64,
    pub h_min: f64,
    pub h_max: f64,
    pub target_precision: f64,
    pub use_adaptive_rk: bool,
    pub surface_reflectivity: f64,
    pub induction_matrix_k: i32,
    pub charge_per_step: i64,
    pub max_charge_groups: usize,
    pub fluence: f64,
    pub pulse_bin_ns: f64,
}

impl Default for PropagatorConfig {
    fn default() -> Self {
        Self {
            temperature: 293.15,
            t_integration: 25.0,
            initial_time_step: 0.01,
            h_min: 1e-4,
            h_max: 0.5,
            target_precision: 1e-4,
            use_adaptive_rk: true,
            surface_reflectivity: 0.0,
            induction_matrix_k: 1,
            charge_per_step: 10,
            max_charge_groups: 1000,
            fluence: 0.0,
            pulse_bin_ns: 0.1,
        }
    }
}

impl PropagatorConfig {
    /// Validates the tunables the propagator takes on faith once event processing
    /// starts; raised at load time so a bad value aborts the run rather than producing
    /// silently wrong physics mid-event.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature <= 0.0 {
            return Err(ConfigError::InvalidValue { key: "temperature".into(), reason: "must be > 0 K".into() });
        }
        if self.t_integration <= 0.0 {
            return Err(ConfigError::InvalidValue { key: "t_integration".into(), reason: "must be > 0".into() });
        }
        if self.initial_time_step <= 0.0 {
            return Err(ConfigError::InvalidValue { key: "initial_time_step".into(), reason: "must be > 0".into() });
        }
        if self.h_min <= 0.0 {
            return Err(ConfigError::InvalidValue { key: "h_min".into(), reason: "must be > 0".into() });
        }
        if self.h_max <= 0.0 {
            return Err(ConfigError::InvalidValue { key: "h_max".into(), reason: "must be > 0".into() });
        }
        if self.h_min > self.h_max {
            return Err(ConfigError::InvalidCombination("h_min must be <= h_max".into()));
        }
        if self.target_precision <= 0.0 {
            return Err(ConfigError::InvalidValue { key: "target_precision".into(), reason: "must be > 0".into() });
        }
        if !(0.0..=1.0).contains(&self.surface_reflectivity) {
            return Err(ConfigError::InvalidValue { key: "surface_reflectivity".into(), reason: "must be within [0, 1]".into() });
        }
        if self.induction_matrix_k < 0 {
            return Err(ConfigError::InvalidValue { key: "induction_matrix_k".into(), reason: "must be >= 0".into() });
        }
        if self.charge_per_step < 1 {
            return Err(ConfigError::InvalidValue { key: "charge_per_step".into(), reason: "must be >= 1".into() });
        }
        if self.max_charge_groups < 1 {
            return Err(ConfigError::InvalidValue { key: "max_charge_groups".into(), reason: "must be >= 1".into() });
        }
        if self.pulse_bin_ns <= 0.0 {
            return Err(ConfigError::InvalidValue { key: "pulse_bin_ns".into(), reason: "must be > 0".into() });
        }
        Ok(())
    }
}

/// Splits an event's deposit batch into charge groups, capping the group count at
/// `max_charge_groups` by widening `charge_per_step` as needed, per §4.4.3.
pub fn split_into_groups(deposit: &DepositedCharge, config: &PropagatorConfig) -> Vec<i64> {
    let n = deposit.charge.abs();
    if n == 0 {
        return Vec::new();
    }
    let mut per_group = config.charge_per_step.max(1);
    let mut count = ((n + per_group - 1) / per_group) as usize;
    if count > config.max_charge_groups {
        let max_groups = config.max_charge_groups as i64;
        per_group = (n + max_groups - 1) / max_groups;
        count = ((n + per_group - 1) / per_group) as usize;
        debug!(deposit_charge = n, new_charge_per_step = per_group, "charge_per_step widened to respect max_charge_groups");
    }
    let mut groups = Vec::with_capacity(count);
    let mut remaining = n;
    for _ in 0..count {
        let g = remaining.min(per_group);
        groups.push(g);
        remaining -= g;
    }
    groups
}

/// Propagates one event's deposit batch to completion, running one carrier group per
/// rayon task. `seed` is this event's already-split RNG seed (see [`split_event_seed`]).
pub fn propagate_event(deposits: &[DepositedCharge], field: &FieldStore, detector: &PixelDetectorModel, models: &PropagatorModels, config: &PropagatorConfig, seed: u64) -> Vec<PropagatedCharge> {
    let tasks: Vec<(usize, usize, i64)> = deposits
        .iter()
        .enumerate()
        .flat_map(|(di, d)| split_into_groups(d, config).into_iter().enumerate().map(move |(gi, charge)| (di, gi, charge)))
        .collect();

    tasks
        .into_par_iter()
        .map(|(di, gi, charge)| {
            let mut rng = split_group_seed(seed, di, gi);
            let group = CarrierGroup::new(&deposits[di], charge, config.pulse_bin_ns);
            propagate_group(group, field, detector, models, config, &mut rng)
        })
        .collect()
}

/// Splits the event-level seed further per (deposit, group) so every group draws from
/// its own independent stream regardless of scheduling order.
fn split_group_seed(event_seed: u64, deposit_index: usize, group_index: usize) -> ChaCha8Rng {
    use rand::SeedableRng;
    let mixed = event_seed ^ ((deposit_index as u64) << 32) ^ (group_index as u64);
    ChaCha8Rng::seed_from_u64(mixed)
}

/// Splits the master seed per event number, the top of the splitting chain described by
/// the "random number generation" design note.
pub fn split_event_seed(master_seed: u64, event_number: u64) -> u64 {
    master_seed ^ event_number.wrapping_mul(0x9E3779B97F4A7C15)
}

fn propagate_group<R: Rng>(mut group: CarrierGroup, field: &FieldStore, detector: &PixelDetectorModel, models: &PropagatorModels, config: &PropagatorConfig, rng: &mut R) -> PropagatedCharge {
    let sign = group.carrier_type.sign();
    let mut rk = RungeKutta::new(
        if config.use_adaptive_rk { Tableau::rkf5() } else { Tableau::rk4() },
        move |_t, _y| DVec3::ZERO, // overwritten per-step below via set_value/velocity recompute
        config.initial_time_step,
        group.local_position.as_vec3(),
        group.local_time,
    );
    let adaptive = AdaptiveStepControl { target_precision: config.target_precision, h_min: config.h_min, h_max: config.h_max };

    while group.state == CarrierState::Motion && rk.time() < config.t_integration {
        let pos_before = Point3D::from_vec3(rk.value());
        let e = field.get_electric(pos_before);
        let b = field.get_magnetic();
        let doping = field.get_doping(pos_before);
        let efield = DVec3::new(e.0, e.1, e.2);
        let efield_mag = efield.length();
        let mobility = models.mobility.evaluate(group.carrier_type, efield_mag, config.temperature);
        let velocity = drift_velocity(sign, mobility, efield, b, group.carrier_type);

        let dt = rk.time_step().min(config.t_integration - rk.time());
        rk.set_time_step(dt);
        let tableau = if config.use_adaptive_rk { Tableau::rkf5() } else { Tableau::rk4() };
        // Evaluated at every stage's position, not just pos_before: with a constant RHS
        // every stage collapses to the same value and RK4/RKF5 degenerate to forward
        // Euler with a zero embedded error, which would make the adaptive step control
        // inert.
        let carrier_type = group.carrier_type;
        let temperature = config.temperature;
        let stage_velocity = |_t: f64, y: DVec3| {
            let pos = Point3D::from_vec3(y);
            let e = field.get_electric(pos);
            let efield = DVec3::new(e.0, e.1, e.2);
            let mobility = models.mobility.evaluate(carrier_type, efield.length(), temperature);
            drift_velocity(sign, mobility, efield, b, carrier_type)
        };
        let mut stepper = RungeKutta::new(tableau, stage_velocity, dt, rk.value(), rk.time());
        let result = stepper.step();
        let mut pos_after = Point3D::from_vec3(stepper.value());

        // Diffusion kick: sigma = sqrt(2*D*dt), D = (kB*T/q) * mobility.
        let diffusion_coeff = K_BOLTZMANN_MEV_K * config.temperature * mobility;
        let sigma = (2.0 * diffusion_coeff * dt).max(0.0).sqrt();
        let kick = DVec3::new(sample_normal(rng) * sigma, sample_normal(rng) * sigma, sample_normal(rng) * sigma);
        pos_after = Point3D::from_vec3(pos_after.as_vec3() + kick);

        if config.use_adaptive_rk {
            let mut next_h = adaptive.next_step(dt, result.error);
            let half_t = detector.sensor_thickness / 2.0;
            next_h = adaptive.clamp_for_z_edge(next_h, pos_before.z, velocity.z, half_t);
            next_h = adaptive.clamp_for_z_edge(next_h, pos_before.z, -velocity.z, -half_t);
            rk.set_time_step(next_h);
        }

        let outcome = boundary::enforce(detector, pos_before, pos_after, config.surface_reflectivity, rng);
        let pre_pixel = detector.pixel_at(pos_before);
        let post_pixel = detector.pixel_at(outcome.position);

        induce_charge(&mut group, detector, field, pos_before, outcome.position, pre_pixel, post_pixel, config, sign, rk.time() + dt);

        rk.set_value(outcome.position.as_vec3());
        rk.advance_time(dt);
        group.local_time = rk.time();
        group.local_position = outcome.position;
        group.state = outcome.state;

        if group.state == CarrierState::Motion {
            let path_length = pos_before.distance(outcome.position);
            apply_transitions(&mut group, field, models, config, rng, dt, doping, efield_mag, path_length);
        }
    }

    if rk.time() >= config.t_integration && group.state == CarrierState::Motion {
        group.local_time = config.t_integration;
    }

    PropagatedCharge::from_group(group)
}

fn drift_velocity(sign: f64, mobility: f64, efield: DVec3, b: Option<(f64, f64, f64)>, carrier: CarrierType) -> DVec3 {
    match b {
        None => sign * mobility * efield,
        Some((bx, by, bz)) => {
            let bvec = DVec3::new(bx, by, bz);
            let r = carrier.hall_factor();
            let mu_r = mobility * r;
            let numerator = efield + sign * mu_r * efield.cross(bvec) + mobility * mu_r * efield.dot(bvec) * bvec;
            let denominator = 1.0 + mu_r * mu_r * bvec.length_squared();
            sign * mobility * numerator / denominator
        }
    }
}

fn sample_normal<R: Rng>(rng: &mut R) -> f64 {
    StandardNormal.sample(rng)
}

#[allow(clippy::too_many_arguments)]
fn induce_charge(
    group: &mut CarrierGroup,
    detector: &PixelDetectorModel,
    field: &FieldStore,
    pos_before: Point3D,
    pos_after: Point3D,
    pre_pixel: PixelIndex,
    post_pixel: PixelIndex,
    config: &PropagatorConfig,
    sign: f64,
    t_after: f64,
) {
    let mut pixels: Vec<PixelIndex> = detector.induction_matrix(pre_pixel, config.induction_matrix_k);
    if post_pixel != pre_pixel {
        for p in detector.induction_matrix(post_pixel, config.induction_matrix_k) {
            if !pixels.contains(&p) {
                pixels.push(p);
            }
        }
    }
    for pixel in pixels {
        let center = detector.pixel_center(pixel);
        let phi_before = field.get_weighting_potential(pos_before, center);
        let phi_after = field.get_weighting_potential(pos_after, center);
        let delta_q = group.charge as f64 * sign * (phi_after - phi_before);
        group.add_induced_charge(pixel, delta_q, t_after);
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_transitions<R: Rng>(group: &mut CarrierGroup, field: &FieldStore, models: &PropagatorModels, config: &PropagatorConfig, rng: &mut R, dt: f64, doping: f64, efield_mag: f64, path_length: f64) {
    let u: f64 = rng.gen_range(0.0..1.0);
    if models.recombination.samples_recombination(group.carrier_type, doping, config.temperature, dt, u) {
        group.state = CarrierState::Recombined;
        return;
    }

    let u: f64 = rng.gen_range(0.0..1.0);
    if models.trapping.samples_trapping(group.carrier_type, efield_mag, config.temperature, config.fluence, dt, u) {
        group.state = CarrierState::Trapped;
        let u2: f64 = rng.gen_range(0.0..1.0);
        let t_detrap = models.detrapping.sample_interval(group.carrier_type, u2);
        if group.local_time + t_detrap < config.t_integration {
            group.local_time += t_detrap;
            group.state = CarrierState::Motion;
        }
        return;
    }

    if models.impact_ionization.is_enabled() && group.multiplication_level < models.impact_ionization.max_multiplication_level() {
        let e = field.get_electric(group.local_position);
        let efield_now = DVec3::new(e.0, e.1, e.2).length();
        let expected = models.impact_ionization.expected_pairs(group.carrier_type, efield_now, config.temperature, path_length);
        let n = sample_poisson(rng, expected);
        if n > 0 {
            group.charge += n as i64;
            group.multiplication_level += 1;
            warn!(group_charge = group.charge, level = group.multiplication_level, "impact ionisation added carriers to group");
        }
    }
}

/// Samples a Poisson-distributed count via Knuth's algorithm; adequate for the small
/// expected values impact ionisation produces per step.
fn sample_poisson<R: Rng>(rng: &mut R, lambda: f64) -> u32 {
    if lambda <= 0.0 {
        return 0;
    }
    let l = (-lambda).exp();
    let mut k = 0;
    let mut p = 1.0;
    loop {
        k += 1;
        p *= rng.gen_range(0.0..1.0_f64);
        if p <= l {
            return k - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> PixelDetectorModel {
        PixelDetectorModel::new((0.05, 0.05), (20, 20), 0.3, (0.03, 0.03))
    }

    #[test]
    fn validate_rejects_inverted_step_bounds() {
        let config = PropagatorConfig { h_min: 1.0, h_max: 0.1, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCombination(_))));
    }

    #[test]
    fn validate_rejects_reflectivity_out_of_range() {
        let config = PropagatorConfig { surface_reflectivity: 1.5, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { key, .. }) if key == "surface_reflectivity"));
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(PropagatorConfig::default().validate().is_ok());
    }

    #[test]
    fn models_from_config_builds_the_requested_bundle() {
        let cfg = ModelConfig {
            mobility: "jacoboni_canali",
            recombination: "none",
            trapping: "none",
            detrapping: "none",
            impact_ionization: "none",
            impact_ionization_threshold_v_per_um: 20.0,
            impact_ionization_max_multiplication_level: 0,
            doping_available: false,
            fluence: 0.0,
        };
        let models = PropagatorModels::from_config(&cfg).unwrap();
        assert!(matches!(models.mobility, MobilityModel::JacoboniCanali));
    }

    #[test]
    fn from_config_map_reports_missing_required_key() {
        let map = HashMap::new();
        let err = PropagatorModels::from_config_map(&map, false, 0.0).unwrap_err();
        assert!(matches!(err, crate::error::CoreError::Config(ConfigError::MissingKey(key)) if key == "mobility_model"));
    }

    #[test]
    fn from_config_map_builds_bundle_when_all_keys_present() {
        let map = HashMap::from([
            ("mobility_model".to_string(), "canali".to_string()),
            ("recombination_model".to_string(), "none".to_string()),
            ("trapping_model".to_string(), "none".to_string()),
            ("detrapping_model".to_string(), "none".to_string()),
            ("impact_ionization_model".to_string(), "none".to_string()),
        ]);
        assert!(PropagatorModels::from_config_map(&map, false, 0.0).is_ok());
    }

    #[test]
    fn models_from_config_propagates_unsuitable_recombination() {
        let cfg = ModelConfig {
            mobility: "jacoboni_canali",
            recombination: "shockley_read_hall",
            trapping: "none",
            detrapping: "none",
            impact_ionization: "none",
            impact_ionization_threshold_v_per_um: 20.0,
            impact_ionization_max_multiplication_level: 0,
            doping_available: false,
            fluence: 0.0,
        };
        assert!(matches!(PropagatorModels::from_config(&cfg), Err(ModelError::Unsuitable { .. })));
    }

    #[test]
    fn split_into_groups_respects_charge_per_step() {
        let deposit = DepositedCharge { local_position: Point3D::ZERO, global_position: Point3D::ZERO, carrier_type: CarrierType::Electron, charge: 1000, local_time: 0.0, global_time: 0.0 };
        let config = PropagatorConfig { charge_per_step: 100, max_charge_groups: 1000, ..Default::default() };
        let groups = split_into_groups(&deposit, &config);
        assert_eq!(groups.len(), 10);
        assert_eq!(groups.iter().sum::<i64>(), 1000);
    }

    #[test]
    fn split_into_groups_widens_step_to_respect_cap() {
        let deposit = DepositedCharge { local_position: Point3D::ZERO, global_position: Point3D::ZERO, carrier_type: CarrierType::Electron, charge: 1000, local_time: 0.0, global_time: 0.0 };
        let config = PropagatorConfig { charge_per_step: 1, max_charge_groups: 10, ..Default::default() };
        let groups = split_into_groups(&deposit, &config);
        assert!(groups.len() <= 10);
        assert_eq!(groups.iter().sum::<i64>(), 1000);
    }

    #[test]
    fn event_seed_splitting_is_deterministic() {
        assert_eq!(split_event_seed(42, 3), split_event_seed(42, 3));
        assert_ne!(split_event_seed(42, 3), split_event_seed(42, 4));
    }

    #[test]
    fn zero_field_drift_stays_near_origin_and_ends_in_motion() {
        use crate::field::{FieldGrid, FieldStore, MappingPolicy, PadPotential, WeightingPotential};
        let e = FieldGrid::<3>::new((1, 1, 1), (1.0, 1.0, 0.3), MappingPolicy::Sensor, vec![0.0, 0.0, 0.0]).unwrap();
        let field = FieldStore::new(e, WeightingPotential::Analytic(PadPotential::new((0.05, 0.05), 0.3)));
        let detector = detector();
        let models = PropagatorModels {
            mobility: MobilityModel::JacoboniCanali,
            recombination: RecombinationModel::None,
            trapping: TrappingModel::None,
            detrapping: DetrappingModel::None,
            impact_ionization: ImpactIonizationModel::None,
        };
        let config = PropagatorConfig { t_integration: 1.0, charge_per_step: 1000, use_adaptive_rk: false, initial_time_step: 0.05, ..Default::default() };
        let deposit = DepositedCharge { local_position: Point3D::ZERO, global_position: Point3D::ZERO, carrier_type: CarrierType::Electron, charge: 1000, local_time: 0.0, global_time: 0.0 };
        let result = propagate_event(&[deposit], &field, &detector, &models, &config, 7);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].state, CarrierState::Motion);
        assert!(result[0].local_position.distance(Point3D::ZERO) < 0.05);
    }
}

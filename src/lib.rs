//! # apx-core
//!
//! The charge-carrier transport engine for a silicon-pixel-detector Monte Carlo
//! framework. This crate owns the three hardest-engineering subsystems of such a
//! framework: the [`propagator`] (a time-stepped Runge-Kutta integrator with diffusion,
//! impact ionisation, trapping/de-trapping, recombination, surface handling, and
//! transient signal induction), the [`mesh`] converter (a parallel barycentric
//! interpolator that resamples an unstructured TCAD mesh onto a regular grid), and the
//! [`field`] lookup subsystem the propagator runs over.
//!
//! Configuration parsing, the module loader, the event loop, output writers, the CLI,
//! and the unit registry's string-parsing front end belong to the surrounding
//! framework; this crate consumes already-validated configuration values and produces
//! [`propagator::PropagatedCharge`] batches.
//!
//! ## Quick start
//!
//! ```ignore
//! use apx_core::field::{FieldGrid, FieldStore, MappingPolicy, PadPotential, WeightingPotential};
//! use apx_core::geometry::PixelDetectorModel;
//! use apx_core::propagator::{propagate_event, DepositedCharge, PropagatorConfig, PropagatorModels};
//! use apx_core::physics::{DetrappingModel, ImpactIonizationModel, MobilityModel, RecombinationModel, TrappingModel};
//!
//! let electric = FieldGrid::<3>::new((2, 2, 2), (1.0, 1.0, 0.3), MappingPolicy::Sensor, vec![0.0; 24])?;
//! let field = FieldStore::new(electric, WeightingPotential::Analytic(PadPotential::new((0.05, 0.05), 0.3)));
//! let detector = PixelDetectorModel::new((0.05, 0.05), (100, 100), 0.3, (0.03, 0.03));
//! let models = PropagatorModels {
//!     mobility: MobilityModel::JacoboniCanali,
//!     recombination: RecombinationModel::None,
//!     trapping: TrappingModel::None,
//!     detrapping: DetrappingModel::None,
//!     impact_ionization: ImpactIonizationModel::None,
//! };
//! let config = PropagatorConfig::default();
//! # Ok::<(), apx_core::error::FieldError>(())
//! ```

pub mod error;
pub mod field;
pub mod geometry;
pub mod mesh;
pub mod physics;
pub mod propagator;
pub mod pulse;
pub mod rk;
pub mod units;

pub use error::CoreError;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::error::{CoreError, FieldError, MeshError, ModelError};
    pub use crate::field::{FieldGrid, FieldStore, MappingPolicy, PadPotential, WeightingPotential};
    pub use crate::geometry::{CarrierType, PixelDetectorModel, PixelIndex, Point3D};
    pub use crate::physics::{DetrappingModel, ImpactIonizationModel, MobilityModel, RecombinationModel, TrappingModel};
    pub use crate::propagator::{propagate_event, CarrierState, DepositedCharge, PropagatedCharge, PropagatorConfig, PropagatorModels};
    pub use crate::pulse::{Pulse, PulseAggregator};
}

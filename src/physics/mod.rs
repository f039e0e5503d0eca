//! Polymorphic physics models the propagator dispatches on every step: mobility,
//! recombination, trapping/detrapping, and impact ionisation. Each is a tagged enum with
//! a small `evaluate`-style surface rather than a trait-object hierarchy.

mod impact_ionization;
mod mobility;
mod recombination;
mod trapping;

pub use impact_ionization::ImpactIonizationModel;
pub use mobility::MobilityModel;
pub use recombination::RecombinationModel;
pub use trapping::{DetrappingModel, TrappingModel};

//! The charge-carrier propagator: per-step drift, diffusion, boundary handling, pulse
//! induction, and the recombination/trapping/impact-ionisation state machine, run with
//! event-level parallelism over a seeded, splittable RNG.

mod boundary;
mod carrier;
mod engine;

pub use carrier::{CarrierGroup, CarrierState, DepositedCharge, PropagatedCharge};
pub use engine::{propagate_event, split_event_seed, split_into_groups, ModelConfig, PropagatorConfig, PropagatorModels};

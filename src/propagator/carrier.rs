//! The input/output records the propagator consumes and produces, and the in-flight
//! carrier-group state it steps between them.

use crate::geometry::{CarrierType, Point3D};
use crate::pulse::PulseAggregator;
use std::collections::HashMap;

use crate::geometry::PixelIndex;
use crate::pulse::Pulse;

/// One input deposit: an external module's record of where and when a bundle of
/// carriers of one type appeared. Immutable to the core.
#[derive(Clone, Debug)]
pub struct DepositedCharge {
    pub local_position: Point3D,
    pub global_position: Point3D,
    pub carrier_type: CarrierType,
    pub charge: i64,
    pub local_time: f64,
    pub global_time: f64,
}

/// Terminal (or in-flight) state of a carrier group. Once a terminal state is entered it
/// never reverts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CarrierState {
    Motion,
    Halted,
    Recombined,
    Trapped,
    Unknown,
}

impl CarrierState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, CarrierState::Motion | CarrierState::Trapped)
    }
}

/// One subdivision of a deposit, propagated independently with its own stochastic draws.
#[derive(Clone, Debug)]
pub struct CarrierGroup {
    pub local_position: Point3D,
    pub global_offset: Point3D,
    pub carrier_type: CarrierType,
    pub charge: i64,
    pub local_time: f64,
    pub global_time_offset: f64,
    pub state: CarrierState,
    pub multiplication_level: u32,
    pulses: PulseAggregator,
}

impl CarrierGroup {
    pub fn new(deposit: &DepositedCharge, charge: i64, bin_ns: f64) -> Self {
        Self {
            local_position: deposit.local_position,
            global_offset: deposit.global_position - deposit.local_position,
            carrier_type: deposit.carrier_type,
            charge,
            local_time: deposit.local_time,
            global_time_offset: deposit.global_time - deposit.local_time,
            state: CarrierState::Motion,
            multiplication_level: 0,
            pulses: PulseAggregator::new(bin_ns),
        }
    }

    pub fn global_position(&self) -> Point3D {
        self.local_position + self.global_offset
    }

    pub fn global_time(&self) -> f64 {
        self.local_time + self.global_time_offset
    }

    pub fn add_induced_charge(&mut self, pixel: PixelIndex, q: f64, t: f64) {
        self.pulses.add_charge(pixel, q, t);
    }

    pub fn into_pulses(self) -> HashMap<PixelIndex, Pulse> {
        self.pulses.into_pulses()
    }
}

/// The propagator's output record for one fully-propagated carrier group.
#[derive(Clone, Debug)]
pub struct PropagatedCharge {
    pub local_position: Point3D,
    pub global_position: Point3D,
    pub carrier_type: CarrierType,
    pub charge: i64,
    pub local_time: f64,
    pub global_time: f64,
    pub state: CarrierState,
    pub pulses: HashMap<PixelIndex, Pulse>,
}

impl PropagatedCharge {
    pub fn from_group(group: CarrierGroup) -> Self {
        let (local_position, global_position, carrier_type, charge, local_time, global_time, state) =
            (group.local_position, group.global_position(), group.carrier_type, group.charge, group.local_time, group.global_time(), group.state);
        Self { local_position, global_position, carrier_type, charge, local_time, global_time, state, pulses: group.pulses.into_pulses() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deposit() -> DepositedCharge {
        DepositedCharge {
            local_position: Point3D::new(0.0, 0.0, 0.0),
            global_position: Point3D::new(1.0, 1.0, 1.0),
            carrier_type: CarrierType::Electron,
            charge: 1000,
            local_time: 0.0,
            global_time: 5.0,
        }
    }

    #[test]
    fn group_preserves_global_offset() {
        let d = deposit();
        let mut group = CarrierGroup::new(&d, 100, 0.1);
        group.local_position = Point3D::new(0.01, 0.0, 0.0);
        assert_eq!(group.global_position(), Point3D::new(1.01, 1.0, 1.0));
        assert_eq!(group.global_time(), 5.0);
    }

    #[test]
    fn terminal_states_are_recognised() {
        assert!(!CarrierState::Motion.is_terminal());
        assert!(!CarrierState::Trapped.is_terminal());
        assert!(CarrierState::Halted.is_terminal());
        assert!(CarrierState::Recombined.is_terminal());
        assert!(CarrierState::Unknown.is_terminal());
    }
}

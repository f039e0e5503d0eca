//! Boundary enforcement for one propagation step: implant capture, sensor-surface
//! reflection/halting, and sidewall handling.

use crate::geometry::{PixelDetectorModel, Point3D};
use crate::propagator::carrier::CarrierState;
use rand::Rng;

/// Outcome of enforcing boundaries on a proposed `[pos_before, pos_after]` segment.
pub struct BoundaryOutcome {
    pub position: Point3D,
    pub state: CarrierState,
}

/// Applies the implant/sensor/sidewall rules of the boundary model to one step's
/// proposed motion, in the fixed precedence implant-check first, then sensor surface.
pub fn enforce<R: Rng>(model: &PixelDetectorModel, pos_before: Point3D, pos_after: Point3D, surface_reflectivity: f64, rng: &mut R) -> BoundaryOutcome {
    if model.inside_implant(pos_after) {
        let intersection = implant_intersection(model, pos_before, pos_after);
        return BoundaryOutcome { position: intersection, state: CarrierState::Halted };
    }

    if model.inside_sensor(pos_after) {
        return BoundaryOutcome { position: pos_after, state: CarrierState::Motion };
    }

    let intercept = sensor_intercept(model, pos_before, pos_after);
    let crossed_z_face = (pos_before.z <= model.sensor_thickness / 2.0 && pos_after.z > model.sensor_thickness / 2.0)
        || (pos_before.z >= -model.sensor_thickness / 2.0 && pos_after.z < -model.sensor_thickness / 2.0);

    if !crossed_z_face && !model.reflective_sidewalls {
        return BoundaryOutcome { position: intercept, state: CarrierState::Halted };
    }

    let u: f64 = rng.gen_range(0.0..1.0);
    if u > surface_reflectivity {
        return BoundaryOutcome { position: intercept, state: CarrierState::Halted };
    }

    let reflected = reflect_z(intercept, pos_after);
    if model.inside_implant(reflected) {
        return BoundaryOutcome { position: intercept, state: CarrierState::Halted };
    }
    if !model.inside_sensor(reflected) {
        return BoundaryOutcome { position: intercept, state: CarrierState::Halted };
    }
    BoundaryOutcome { position: reflected, state: CarrierState::Motion }
}

/// Linear interpolation of the segment's intersection with the pixel's implant surface
/// plane, `z = sensor_thickness / 2`.
fn implant_intersection(model: &PixelDetectorModel, pos_before: Point3D, pos_after: Point3D) -> Point3D {
    let plane_z = model.sensor_thickness / 2.0;
    intersect_plane_z(pos_before, pos_after, plane_z)
}

/// Intersection of the segment with whichever sensor face it exited through: the z
/// faces are checked first (the common case), falling back to the segment midpoint at
/// the first x/y boundary crossing for sidewall exits.
fn sensor_intercept(model: &PixelDetectorModel, pos_before: Point3D, pos_after: Point3D) -> Point3D {
    let half_t = model.sensor_thickness / 2.0;
    if pos_after.z > half_t {
        return intersect_plane_z(pos_before, pos_after, half_t);
    }
    if pos_after.z < -half_t {
        return intersect_plane_z(pos_before, pos_after, -half_t);
    }
    let (hx, hy) = model.sensor_half_extent();
    if pos_after.x.abs() > hx {
        let plane_x = hx * pos_after.x.signum();
        return intersect_plane_x(pos_before, pos_after, plane_x);
    }
    intersect_plane_y(pos_before, pos_after, hy * pos_after.y.signum())
}

fn intersect_plane_z(a: Point3D, b: Point3D, z: f64) -> Point3D {
    let dz = b.z - a.z;
    if dz.abs() < 1e-15 {
        return Point3D::new(b.x, b.y, z);
    }
    let t = (z - a.z) / dz;
    Point3D::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y), z)
}

fn intersect_plane_x(a: Point3D, b: Point3D, x: f64) -> Point3D {
    let dx = b.x - a.x;
    if dx.abs() < 1e-15 {
        return Point3D::new(x, b.y, b.z);
    }
    let t = (x - a.x) / dx;
    Point3D::new(x, a.y + t * (b.y - a.y), a.z + t * (b.z - a.z))
}

fn intersect_plane_y(a: Point3D, b: Point3D, y: f64) -> Point3D {
    let dy = b.y - a.y;
    if dy.abs() < 1e-15 {
        return Point3D::new(b.x, y, b.z);
    }
    let t = (y - a.y) / dy;
    Point3D::new(a.x + t * (b.x - a.x), y, a.z + t * (b.z - a.z))
}

/// Reflects `pos`'s z-component across the intercept's z, leaving x/y untouched.
fn reflect_z(intercept: Point3D, pos: Point3D) -> Point3D {
    Point3D::new(pos.x, pos.y, 2.0 * intercept.z - pos.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn model() -> PixelDetectorModel {
        PixelDetectorModel::new((0.05, 0.05), (10, 10), 0.3, (0.03, 0.03))
    }

    #[test]
    fn halts_on_implant_entry() {
        let m = model();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let before = Point3D::new(0.0, 0.0, 0.14);
        let after = Point3D::new(0.0, 0.0, 0.16);
        let outcome = enforce(&m, before, after, 0.0, &mut rng);
        assert_eq!(outcome.state, CarrierState::Halted);
        assert!((outcome.position.z - 0.15).abs() < 1e-9);
    }

    #[test]
    fn halts_at_non_reflective_sidewall() {
        let m = model();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (hx, _) = m.sensor_half_extent();
        let before = Point3D::new(hx - 0.01, 0.0, 0.0);
        let after = Point3D::new(hx + 0.01, 0.0, 0.0);
        let outcome = enforce(&m, before, after, 1.0, &mut rng);
        assert_eq!(outcome.state, CarrierState::Halted);
    }

    #[test]
    fn stays_in_motion_inside_sensor() {
        let m = model();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let before = Point3D::new(0.0, 0.0, 0.0);
        let after = Point3D::new(0.001, 0.0, 0.001);
        let outcome = enforce(&m, before, after, 1.0, &mut rng);
        assert_eq!(outcome.state, CarrierState::Motion);
        assert_eq!(outcome.position, after);
    }
}

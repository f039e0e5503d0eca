//! Closed-form pad weighting potential (Ramo's theorem for a rectangular implant on a
//! plane condenser), following the truncated image-charge series used when no weighting
//! field mesh is supplied.

use crate::geometry::Point3D;

/// Analytic weighting potential for a rectangular pad of size `(wx, wy)` on a sensor of
/// thickness `thickness`, evaluated at a local-frame position whose origin sits at the
/// pad's x/y center and whose z runs from the back contact (z=0) to the implant (z=thickness).
#[derive(Clone, Copy, Debug)]
pub struct PadPotential {
    pub width: (f64, f64),
    pub thickness: f64,
}

/// Number of image-charge terms kept in the truncated series. The series converges fast
/// (each term falls off as the image distance grows) but is cut off at a fixed count
/// rather than by an error tolerance, matching the closed-form reference this models.
const SERIES_TERMS: u32 = 100;

impl PadPotential {
    pub fn new(width: (f64, f64), thickness: f64) -> Self {
        Self { width, thickness }
    }

    /// Evaluates the weighting potential at `pos` (local sensor frame, origin at the pad
    /// center on the sensor mid-plane, z toward the implant).
    pub fn evaluate(&self, pos: Point3D) -> f64 {
        let zmax = self.thickness;
        let zp = zmax - (pos.z + self.thickness / 2.0);
        let mut sum = f(pos.x, pos.y, zp, self.width);
        for n in 1..=SERIES_TERMS {
            let nd = n as f64 * 2.0 * self.thickness;
            sum -= f(pos.x, pos.y, nd - zp, self.width) - f(pos.x, pos.y, nd + zp, self.width);
        }
        sum / (2.0 * std::f64::consts::PI)
    }
}

/// The four-arctangent kernel for a rectangular pad of size `(wx, wy)` at depth `u`.
fn f(x: f64, y: f64, u: f64, (wx, wy): (f64, f64)) -> f64 {
    let x1 = x - wx / 2.0;
    let x2 = x + wx / 2.0;
    let y1 = y - wy / 2.0;
    let y2 = y + wy / 2.0;
    atan_term(x1, y1, u) + atan_term(x2, y2, u) - atan_term(x1, y2, u) - atan_term(x2, y1, u)
}

fn atan_term(a: f64, b: f64, u: f64) -> f64 {
    if u.abs() < 1e-12 {
        // On the condenser plane itself the kernel has a removable singularity; the
        // potential there is governed by the boundary condition (1 inside the pad, 0
        // outside), which callers handle before reaching the analytic series.
        return 0.0;
    }
    (a * b / (u * (a * a + b * b + u * u).sqrt())).atan()
}

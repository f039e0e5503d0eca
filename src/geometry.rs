//! Core geometric primitives and the minimal pixel-detector model the propagator
//! needs to evaluate implant and sensor boundaries.
//!
//! The full geometry stack (global/local frame transforms, module placement, detector
//! factories) belongs to the framework's detector description; the core only consumes
//! the handful of quantities listed in [`PixelDetectorModel`].

use glam::DVec3;

/// A point (or displacement) in the local sensor frame, in mm.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3D {
    pub const ZERO: Point3D = Point3D { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn as_vec3(self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }

    #[inline]
    pub fn from_vec3(v: DVec3) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }

    pub fn distance(self, other: Point3D) -> f64 {
        (self.as_vec3() - other.as_vec3()).length()
    }
}

impl std::ops::Sub for Point3D {
    type Output = Point3D;
    fn sub(self, rhs: Point3D) -> Point3D {
        Point3D::from_vec3(self.as_vec3() - rhs.as_vec3())
    }
}

impl std::ops::Add for Point3D {
    type Output = Point3D;
    fn add(self, rhs: Point3D) -> Point3D {
        Point3D::from_vec3(self.as_vec3() + rhs.as_vec3())
    }
}

impl From<DVec3> for Point3D {
    fn from(v: DVec3) -> Self {
        Point3D::from_vec3(v)
    }
}

impl From<Point3D> for DVec3 {
    fn from(p: Point3D) -> Self {
        p.as_vec3()
    }
}

/// Identifies a pixel in the detector's column/row matrix. Equality defines identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PixelIndex {
    pub x: i32,
    pub y: i32,
}

impl PixelIndex {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Charge carrier species. `sign()` gives the signed drift-direction factor used
/// throughout the propagator (electrons drift against `E`, holes drift along it).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CarrierType {
    Electron,
    Hole,
}

impl CarrierType {
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            CarrierType::Electron => -1.0,
            CarrierType::Hole => 1.0,
        }
    }

    /// Hall-effect scaling factor `r` used in the magnetic-field drift correction.
    #[inline]
    pub fn hall_factor(self) -> f64 {
        match self {
            CarrierType::Electron => 1.15,
            CarrierType::Hole => 0.9,
        }
    }

    pub fn minority_of(self, doping_sign: f64) -> bool {
        // A region is n-doped (doping > 0) when donors dominate; holes are then minority.
        match self {
            CarrierType::Electron => doping_sign < 0.0,
            CarrierType::Hole => doping_sign > 0.0,
        }
    }
}

/// The subset of a pixel-detector geometric model the propagator needs: sensor extent,
/// pixel pitch/count, and implant footprint used for the HALTED boundary condition.
#[derive(Clone, Debug)]
pub struct PixelDetectorModel {
    /// Pixel pitch (x, y) in mm.
    pub pitch: (f64, f64),
    /// Number of pixels (columns, rows).
    pub number_of_pixels: (u32, u32),
    /// Sensor thickness in mm (z extent, centered: z in [-t/2, t/2] in the local frame
    /// used by the propagator, implants sitting at z = +t/2).
    pub sensor_thickness: f64,
    /// Implant footprint (width, height) in mm, centered on each pixel.
    pub implant_size: (f64, f64),
    /// Whether sidewalls reflect carriers (vs. always halting them).
    pub reflective_sidewalls: bool,
}

impl PixelDetectorModel {
    pub fn new(pitch: (f64, f64), number_of_pixels: (u32, u32), sensor_thickness: f64, implant_size: (f64, f64)) -> Self {
        Self {
            pitch,
            number_of_pixels,
            sensor_thickness,
            implant_size,
            reflective_sidewalls: false,
        }
    }

    /// Half-extent of the sensor footprint in x and y (local frame, pixel matrix centered
    /// on the origin).
    pub fn sensor_half_extent(&self) -> (f64, f64) {
        (
            self.pitch.0 * self.number_of_pixels.0 as f64 / 2.0,
            self.pitch.1 * self.number_of_pixels.1 as f64 / 2.0,
        )
    }

    /// Maps a local position to the pixel index whose cell contains it (no bounds clamping).
    pub fn pixel_at(&self, pos: Point3D) -> PixelIndex {
        let (hx, hy) = self.sensor_half_extent();
        let px = ((pos.x + hx) / self.pitch.0).floor() as i32;
        let py = ((pos.y + hy) / self.pitch.1).floor() as i32;
        PixelIndex::new(px, py)
    }

    /// Center of the given pixel's cell, in the local x/y frame, z = 0.
    pub fn pixel_center(&self, pixel: PixelIndex) -> Point3D {
        let (hx, hy) = self.sensor_half_extent();
        Point3D::new(
            (pixel.x as f64 + 0.5) * self.pitch.0 - hx,
            (pixel.y as f64 + 0.5) * self.pitch.1 - hy,
            0.0,
        )
    }

    /// Whether `pos` lies inside the sensor volume (x/y matrix extent, full thickness).
    pub fn inside_sensor(&self, pos: Point3D) -> bool {
        let (hx, hy) = self.sensor_half_extent();
        let ht = self.sensor_thickness / 2.0;
        pos.x.abs() <= hx && pos.y.abs() <= hy && pos.z.abs() <= ht
    }

    /// Whether `pos` lies inside the implant footprint of the pixel it currently occupies.
    /// Implants sit at the +z sensor surface; only positions at-or-beyond that surface can
    /// be inside an implant.
    pub fn inside_implant(&self, pos: Point3D) -> bool {
        let ht = self.sensor_thickness / 2.0;
        if pos.z < ht - 1e-9 {
            return false;
        }
        let pixel = self.pixel_at(pos);
        let center = self.pixel_center(pixel);
        let dx = pos.x - center.x;
        let dy = pos.y - center.y;
        dx.abs() <= self.implant_size.0 / 2.0 && dy.abs() <= self.implant_size.1 / 2.0
    }

    /// Pixels in the `(2k+1) x (2k+1)` induction matrix centered on `pixel`.
    pub fn induction_matrix(&self, pixel: PixelIndex, k: i32) -> Vec<PixelIndex> {
        let mut out = Vec::with_capacity(((2 * k + 1) * (2 * k + 1)) as usize);
        for dy in -k..=k {
            for dx in -k..=k {
                out.push(PixelIndex::new(pixel.x + dx, pixel.y + dy));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> PixelDetectorModel {
        PixelDetectorModel::new((0.05, 0.05), (100, 100), 0.3, (0.03, 0.03))
    }

    #[test]
    fn pixel_at_center_is_zero_indexed_middle() {
        let m = model();
        let idx = m.pixel_at(Point3D::new(0.0, 0.0, 0.0));
        assert_eq!(idx, PixelIndex::new(50, 50));
    }

    #[test]
    fn implant_only_at_top_surface() {
        let m = model();
        let mid = Point3D::new(0.0, 0.0, 0.0);
        assert!(!m.inside_implant(mid));
        let top_center = Point3D::new(0.0, 0.0, 0.15);
        assert!(m.inside_implant(top_center));
        let top_edge = Point3D::new(0.02, 0.0, 0.15);
        assert!(!m.inside_implant(top_edge));
    }

    #[test]
    fn induction_matrix_size() {
        let m = model();
        let ind = m.induction_matrix(PixelIndex::new(5, 5), 1);
        assert_eq!(ind.len(), 9);
    }
}

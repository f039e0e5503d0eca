//! Regular 3D sample grids, the common storage backing every field the
//! [`crate::field::FieldStore`] serves.

use crate::error::FieldError;
use crate::geometry::Point3D;
use std::sync::Arc;

/// How out-of-cell x/y lookups are resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MappingPolicy {
    /// No folding: positions outside the grid extent return zero.
    Sensor,
    /// Fold the position into a single pixel cell, reflecting across cell boundaries,
    /// for fields periodic in the pixel matrix (e.g. per-pixel weighting potentials).
    PixelFull,
}

/// A regular grid of shape `(nx, ny, nz)` storing `N` real components per cell.
///
/// Immutable after construction. The backing sample vector is held by [`Arc`] so that
/// multiple grids (e.g. a `FieldGrid<3>` view and a scalar magnitude view) can share the
/// same underlying data without copying, per the "ownership of field data" design note.
#[derive(Clone, Debug)]
pub struct FieldGrid<const N: usize> {
    dims: (usize, usize, usize),
    /// Physical size (sx, sy, sz) of the sampled volume, mm.
    size: (f64, f64, f64),
    mapping: MappingPolicy,
    /// Per-axis scale applied to a position before mapping to grid-cell coordinates.
    scale: (f64, f64, f64),
    /// Per-axis offset applied to a position before mapping to grid-cell coordinates.
    offset: (f64, f64, f64),
    /// z-range outside which lookups return zero.
    z_domain: (f64, f64),
    data: Arc<Vec<f64>>,
}

impl<const N: usize> FieldGrid<N> {
    pub fn new(
        dims: (usize, usize, usize),
        size: (f64, f64, f64),
        mapping: MappingPolicy,
        data: Vec<f64>,
    ) -> Result<Self, FieldError> {
        let expected = dims.0 * dims.1 * dims.2 * N;
        if data.len() != expected {
            return Err(FieldError::InvalidSize { expected, got: data.len() });
        }
        let z_domain = (-size.2 / 2.0, size.2 / 2.0);
        Ok(Self {
            dims,
            size,
            mapping,
            scale: (1.0, 1.0, 1.0),
            offset: (size.0 / 2.0, size.1 / 2.0, size.2 / 2.0),
            z_domain,
            data: Arc::new(data),
        })
    }

    pub fn with_scale_offset(mut self, scale: (f64, f64, f64), offset: (f64, f64, f64)) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    pub fn with_z_domain(mut self, zmin: f64, zmax: f64) -> Self {
        self.z_domain = (zmin, zmax);
        self
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        self.dims
    }

    pub fn size(&self) -> (f64, f64, f64) {
        self.size
    }

    pub fn mapping(&self) -> MappingPolicy {
        self.mapping
    }

    pub fn z_domain(&self) -> (f64, f64) {
        self.z_domain
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Shares the underlying sample buffer with a grid re-parameterised by a different
    /// mapping/scale/offset, without copying.
    pub fn reparameterize(&self, mapping: MappingPolicy, scale: (f64, f64, f64), offset: (f64, f64, f64)) -> Self {
        Self { mapping, scale, offset, data: Arc::clone(&self.data), ..*self }
    }

    #[inline]
    fn cell_index(&self, ix: usize, iy: usize, iz: usize, c: usize) -> usize {
        ((ix * self.dims.1 + iy) * self.dims.2 + iz) * N + c
    }

    fn sample_cell(&self, ix: i64, iy: i64, iz: i64) -> Option<[f64; N]> {
        let (nx, ny, nz) = (self.dims.0 as i64, self.dims.1 as i64, self.dims.2 as i64);
        let (fx, fy) = self.fold_xy(ix, iy, nx, ny)?;
        if iz < 0 || iz >= nz {
            return None;
        }
        let mut out = [0.0; N];
        for c in 0..N {
            out[c] = self.data[self.cell_index(fx as usize, fy as usize, iz as usize, c)];
        }
        Some(out)
    }

    /// Applies the mapping policy to out-of-range x/y cell indices.
    fn fold_xy(&self, ix: i64, iy: i64, nx: i64, ny: i64) -> Option<(i64, i64)> {
        match self.mapping {
            MappingPolicy::Sensor => {
                if ix < 0 || ix >= nx || iy < 0 || iy >= ny {
                    None
                } else {
                    Some((ix, iy))
                }
            }
            MappingPolicy::PixelFull => Some((reflect_index(ix, nx), reflect_index(iy, ny))),
        }
    }

    /// Trilinear interpolation at `pos` (local frame, mm). Returns zero outside the
    /// z thickness domain.
    pub fn interpolate(&self, pos: Point3D) -> [f64; N] {
        if pos.z < self.z_domain.0 || pos.z > self.z_domain.1 {
            return [0.0; N];
        }

        let (cx, cy, cz) = self.cell_size();
        let gx = (pos.x * self.scale.0 + self.offset.0) / cx;
        let gy = (pos.y * self.scale.1 + self.offset.1) / cy;
        let gz = (pos.z * self.scale.2 + self.offset.2) / cz;

        let ix0 = gx.floor() as i64;
        let iy0 = gy.floor() as i64;
        let iz0 = gz.floor() as i64;
        let tx = gx - ix0 as f64;
        let ty = gy - iy0 as f64;
        let tz = (gz - iz0 as f64).clamp(0.0, 1.0);

        let mut acc = [0.0f64; N];
        let mut total_weight = 0.0;
        for (dx, dy, dz) in corners() {
            let w = (if dx == 0 { 1.0 - tx } else { tx }) * (if dy == 0 { 1.0 - ty } else { ty }) * (if dz == 0 { 1.0 - tz } else { tz });
            if w == 0.0 {
                continue;
            }
            if let Some(vals) = self.sample_cell(ix0 + dx, iy0 + dy, iz0 + dz) {
                for c in 0..N {
                    acc[c] += w * vals[c];
                }
                total_weight += w;
            }
        }
        // For SENSOR mapping, cells that fall outside the grid contribute zero rather
        // than being renormalised away: the caller asked for "zero outside the grid".
        let _ = total_weight;
        acc
    }

    fn cell_size(&self) -> (f64, f64, f64) {
        (
            self.size.0 / self.dims.0.max(1) as f64,
            self.size.1 / self.dims.1.max(1) as f64,
            self.size.2 / self.dims.2.max(1) as f64,
        )
    }
}

fn corners() -> impl Iterator<Item = (i64, i64, i64)> {
    (0..8).map(|i| ((i & 1) as i64, ((i >> 1) & 1) as i64, ((i >> 2) & 1) as i64))
}

/// Folds an out-of-range index into `[0, n)` by reflecting at the boundaries, the
/// behaviour `PIXEL_FULL` uses to wrap a position into a single periodic pixel cell.
fn reflect_index(i: i64, n: i64) -> i64 {
    if n <= 0 {
        return 0;
    }
    let period = 2 * n;
    let m = i.rem_euclid(period);
    if m < n {
        m
    } else {
        period - 1 - m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_data_length() {
        let result = FieldGrid::<3>::new((2, 2, 2), (1.0, 1.0, 1.0), MappingPolicy::Sensor, vec![0.0; 10]);
        assert!(matches!(result, Err(FieldError::InvalidSize { expected: 24, got: 10 })));
    }

    #[test]
    fn trilinear_interpolates_between_nodes() {
        // Two grid nodes along x at -0.5 and 0.0 (cellsize = sx/nx = 0.5), values 0.0 and 1.0.
        let grid = FieldGrid::<1>::new((2, 1, 1), (1.0, 1.0, 1.0), MappingPolicy::Sensor, vec![0.0, 1.0]).unwrap();
        let v_node0 = grid.interpolate(Point3D::new(-0.5, 0.0, 0.0));
        assert!((v_node0[0] - 0.0).abs() < 1e-9);
        let v_node1 = grid.interpolate(Point3D::new(0.0, 0.0, 0.0));
        assert!((v_node1[0] - 1.0).abs() < 1e-9);
        let v_mid = grid.interpolate(Point3D::new(-0.25, 0.0, 0.0));
        assert!((v_mid[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn zero_outside_z_domain() {
        let grid = FieldGrid::<1>::new((1, 1, 1), (1.0, 1.0, 1.0), MappingPolicy::Sensor, vec![5.0]).unwrap();
        let v = grid.interpolate(Point3D::new(0.0, 0.0, 10.0));
        assert_eq!(v[0], 0.0);
    }

    #[test]
    fn pixel_full_reflects_at_boundary() {
        assert_eq!(reflect_index(-1, 4), 0);
        assert_eq!(reflect_index(4, 4), 3);
        assert_eq!(reflect_index(0, 4), 0);
        assert_eq!(reflect_index(7, 4), 0);
    }
}

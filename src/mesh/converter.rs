//! Offline TCAD-mesh-to-grid resampler: octree neighbour search, candidate simplex
//! enumeration, and barycentric interpolation, parallelised one worker per x-slice.

use crate::error::MeshError;
use crate::geometry::Point3D;
use crate::mesh::element::MeshElement;
use crate::mesh::octree::Octree;
use rayon::prelude::*;
use tracing::warn;

/// An axis permutation/sign-flip remap applied to mesh coordinates before resampling.
/// `axes[i]` names which mesh coordinate (0=x, 1=y, 2=z) supplies output axis `i`, and
/// `signs[i]` flips both that coordinate and the corresponding vector field component.
#[derive(Clone, Copy, Debug)]
pub struct CoordinateRemap {
    pub axes: [usize; 3],
    pub signs: [f64; 3],
}

impl CoordinateRemap {
    pub fn identity() -> Self {
        Self { axes: [0, 1, 2], signs: [1.0, 1.0, 1.0] }
    }

    fn apply_point(&self, p: Point3D) -> Point3D {
        let src = [p.x, p.y, p.z];
        Point3D::new(src[self.axes[0]] * self.signs[0], src[self.axes[1]] * self.signs[1], src[self.axes[2]] * self.signs[2])
    }

    /// A 2D input mesh's vertices carry `x = 0` (no third mesh coordinate exists to
    /// populate it); the first output coordinate must therefore keep drawing from that
    /// placeholder rather than being remapped onto one of the two real axes (y, z),
    /// which would silently drop one of them instead of leaving x unmapped.
    fn validate(&self, dimension: usize) -> Result<(), MeshError> {
        if dimension == 2 && self.axes[0] != 0 {
            return Err(MeshError::UnmappedCoordinate);
        }
        Ok(())
    }

    /// Applies the same axis remap to a vector-valued field sample; scalar fields pass
    /// a slice of length 1 and only the first `signs` entry matters if at all.
    fn apply_vector(&self, v: &[f64]) -> Vec<f64> {
        if v.len() != 3 {
            return v.to_vec();
        }
        let mut out = vec![0.0; 3];
        for i in 0..3 {
            out[i] = v[self.axes[i]] * self.signs[i];
        }
        out
    }
}

/// Tunables governing the neighbour search and simplex acceptance described in the
/// converter's algorithm.
#[derive(Clone, Debug)]
pub struct ConverterConfig {
    pub initial_radius: f64,
    pub radius_step: f64,
    pub max_radius: f64,
    pub volume_cut: f64,
    pub allow_coplanar_interpolation: bool,
    pub allow_failure: bool,
    /// Neighbour count at the initial radius above which a WARN is logged (suggests an
    /// under-resolved output grid, not a correctness problem).
    pub neighbour_warn_threshold: usize,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            initial_radius: 0.01,
            radius_step: 0.01,
            max_radius: 1.0,
            volume_cut: 1e-12,
            allow_coplanar_interpolation: false,
            allow_failure: false,
            neighbour_warn_threshold: 200,
        }
    }
}

/// Unstructured input: mesh vertex positions with one field-value vector per vertex
/// (dimensionality `dimension`, per-vertex value length `components`).
pub struct UnstructuredField {
    pub dimension: usize,
    pub vertices: Vec<Point3D>,
    pub values: Vec<Vec<f64>>,
}

impl UnstructuredField {
    fn validate(&self) -> Result<(), MeshError> {
        if self.vertices.len() != self.values.len() {
            return Err(MeshError::InvalidGrid { vertices: self.vertices.len(), values: self.values.len() });
        }
        Ok(())
    }
}

/// Resamples `field` onto a regular `(nx, ny, nz)` grid spanning `size` centered at the
/// origin, returning the flat row-major `nx*ny*nz*components` sample vector the
/// [`crate::field::FieldGrid`] constructor expects.
pub fn convert(
    field: &UnstructuredField,
    dims: (usize, usize, usize),
    size: (f64, f64, f64),
    remap: CoordinateRemap,
    config: &ConverterConfig,
) -> Result<Vec<f64>, MeshError> {
    field.validate()?;
    remap.validate(field.dimension)?;
    let components = field.values.first().map(|v| v.len()).unwrap_or(0);

    let remapped_vertices: Vec<Point3D> = field.vertices.iter().map(|p| remap.apply_point(*p)).collect();
    let remapped_values: Vec<Vec<f64>> = field.values.iter().map(|v| remap.apply_vector(v)).collect();
    let octree = Octree::build(remapped_vertices.clone());

    let (nx, ny, nz) = dims;
    let (sx, sy, sz) = size;
    let cell = (sx / nx.max(1) as f64, sy / ny.max(1) as f64, sz / nz.max(1) as f64);
    let origin = (-sx / 2.0, -sy / 2.0, -sz / 2.0);

    let slices: Result<Vec<Vec<f64>>, MeshError> = (0..nx)
        .into_par_iter()
        .map(|ix| {
            let x = origin.0 + (ix as f64 + 0.5) * cell.0;
            let mut slice = Vec::with_capacity(ny * nz * components.max(1));
            for iy in 0..ny {
                let y = origin.1 + (iy as f64 + 0.5) * cell.1;
                for iz in 0..nz {
                    let z = origin.2 + (iz as f64 + 0.5) * cell.2;
                    let q = Point3D::new(x, y, z);
                    let sample = interpolate_point(&octree, &remapped_vertices, &remapped_values, field.dimension, q, config)?;
                    slice.extend(sample);
                }
            }
            Ok(slice)
        })
        .collect();

    Ok(slices?.into_iter().flatten().collect())
}

fn interpolate_point(
    octree: &Octree,
    vertices: &[Point3D],
    values: &[Vec<f64>],
    dimension: usize,
    q: Point3D,
    config: &ConverterConfig,
) -> Result<Vec<f64>, MeshError> {
    let needed = dimension + 1;
    let mut radius = config.initial_radius;
    let mut logged_warn = false;

    let mut last_degenerate: Option<(f64, f64)> = None;

    loop {
        let neighbours = octree.neighbours_within(q, radius);
        if !logged_warn && neighbours.len() > config.neighbour_warn_threshold {
            warn!(count = neighbours.len(), "mesh converter found an unusually large neighbour set at the initial radius; output grid may be under-resolved");
            logged_warn = true;
        }

        match try_candidates(vertices, values, dimension, q, &neighbours, config.volume_cut) {
            Ok(result) => return Ok(result),
            Err(degenerate) => last_degenerate = degenerate.or(last_degenerate),
        }

        if radius >= config.max_radius {
            if config.allow_coplanar_interpolation {
                if let Ok(result) = try_candidates(vertices, values, dimension, q, &neighbours, 0.0) {
                    return Ok(result);
                }
            }
            if config.allow_failure {
                return Ok(vec![0.0; values.first().map(|v| v.len()).unwrap_or(1)]);
            }
            if let Some((volume, cut)) = last_degenerate {
                return Err(MeshError::DegenerateElement { volume, cut });
            }
            return Err(MeshError::InterpolationFailure { r_max: config.max_radius });
        }
        radius = (radius + config.radius_step).min(config.max_radius);
        if neighbours.len() < needed && radius >= config.max_radius {
            radius = config.max_radius;
        }
    }
}

/// Tries every candidate simplex, closest vertices first. `Ok` carries the interpolated
/// result; `Err` carries the `(volume, cut)` of the last rejected degenerate candidate,
/// if any, so the caller can report why nothing qualified instead of just "not found".
fn try_candidates(vertices: &[Point3D], values: &[Vec<f64>], dimension: usize, q: Point3D, neighbours: &[(usize, f64)], volume_cut: f64) -> Result<Vec<f64>, Option<(f64, f64)>> {
    let needed = dimension + 1;
    if neighbours.len() < needed {
        return Err(None);
    }
    let mut degenerate = None;
    for combo in combinations(neighbours.len(), needed) {
        let idxs: Vec<usize> = combo.iter().map(|&i| neighbours[i].0).collect();
        let verts: Vec<Point3D> = idxs.iter().map(|&i| vertices[i]).collect();
        let vals: Vec<Vec<f64>> = idxs.iter().map(|&i| values[i].clone()).collect();
        let elem = MeshElement::new(dimension, verts, vals);
        let volume = elem.volume();
        if volume.abs() <= volume_cut {
            degenerate = Some((volume.abs(), volume_cut));
            continue;
        }
        if elem.contains(q, volume) {
            return Ok(elem.interpolate(q, volume));
        }
    }
    Err(degenerate)
}

/// Enumerates index combinations of size `k` from `0..n`, in lexicographic (proximity)
/// order, matching "closest vertices first".
fn combinations(n: usize, k: usize) -> impl Iterator<Item = Vec<usize>> {
    let mut state: Vec<usize> = (0..k).collect();
    let mut done = n < k;
    std::iter::from_fn(move || {
        if done {
            return None;
        }
        let current = state.clone();
        let mut i = k;
        loop {
            if i == 0 {
                done = true;
                break;
            }
            i -= 1;
            if state[i] != i + n - k {
                state[i] += 1;
                for j in i + 1..k {
                    state[j] = state[j - 1] + 1;
                }
                break;
            }
        }
        Some(current)
    })
}

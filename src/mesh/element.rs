//! Mesh simplices and the barycentric interpolation built on their signed volumes.

use crate::geometry::Point3D;

/// A `D`-simplex (`D` = 2 or 3) with `D+1` vertex positions and one field value per
/// vertex. Degenerate (coplanar/colinear) elements are rejected by the caller via
/// [`MeshElement::volume`] against a configured cut, not by this type.
#[derive(Clone, Debug)]
pub struct MeshElement {
    pub dimension: usize,
    pub vertices: Vec<Point3D>,
    pub values: Vec<Vec<f64>>,
}

impl MeshElement {
    pub fn new(dimension: usize, vertices: Vec<Point3D>, values: Vec<Vec<f64>>) -> Self {
        debug_assert_eq!(vertices.len(), dimension + 1);
        debug_assert_eq!(values.len(), dimension + 1);
        Self { dimension, vertices, values }
    }

    /// Signed volume of the simplex: the determinant of the edge matrix (vertex i minus
    /// vertex 0, for i = 1..D) divided by D!.
    pub fn volume(&self) -> f64 {
        signed_volume(self.dimension, &self.vertices)
    }

    /// Signed volume of the simplex formed by replacing vertex `i` with `q`.
    pub fn sub_volume(&self, i: usize, q: Point3D) -> f64 {
        let mut verts = self.vertices.clone();
        verts[i] = q;
        signed_volume(self.dimension, &verts)
    }

    /// Whether `q` lies inside the simplex: every sub-volume formed by replacing one
    /// vertex with `q` shares the sign of the whole.
    pub fn contains(&self, q: Point3D, volume: f64) -> bool {
        (0..=self.dimension).all(|i| same_sign(self.sub_volume(i, q), volume))
    }

    /// Barycentric interpolation of the per-vertex field values at `q`, given the
    /// simplex's own `volume` (passed in so callers that already computed it once don't
    /// pay for a second determinant).
    pub fn interpolate(&self, q: Point3D, volume: f64) -> Vec<f64> {
        let n = self.values[0].len();
        let mut out = vec![0.0; n];
        for i in 0..=self.dimension {
            let w = self.sub_volume(i, q) / volume;
            for c in 0..n {
                out[c] += w * self.values[i][c];
            }
        }
        out
    }
}

fn same_sign(a: f64, b: f64) -> bool {
    (a >= 0.0) == (b >= 0.0)
}

fn signed_volume(dimension: usize, vertices: &[Point3D]) -> f64 {
    let p0 = vertices[0];
    match dimension {
        2 => {
            // Colinear-rejection case: signed area of the triangle (p0, p1, p2) in the
            // plane spanned by the two edges, divided by 2!.
            let e1 = vertices[1] - p0;
            let e2 = vertices[2] - p0;
            let cross = e1.as_vec3().cross(e2.as_vec3());
            cross.length() / 2.0 * cross_sign(cross)
        }
        3 => {
            let e1 = vertices[1] - p0;
            let e2 = vertices[2] - p0;
            let e3 = vertices[3] - p0;
            e1.as_vec3().dot(e2.as_vec3().cross(e3.as_vec3())) / 6.0
        }
        _ => panic!("MeshElement dimension must be 2 or 3"),
    }
}

fn cross_sign(cross: glam::DVec3) -> f64 {
    // Orientation sign of a 2D triangle embedded in 3D: use the component of the cross
    // product along the dominant axis of the plane it lies in.
    let abs = cross.abs();
    if abs.x >= abs.y && abs.x >= abs.z {
        cross.x.signum()
    } else if abs.y >= abs.z {
        cross.y.signum()
    } else {
        cross.z.signum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tetrahedron_sub_volumes_sum_to_total() {
        let verts = vec![
            Point3D::new(0.0, 0.0, 0.0),
            Point3D::new(1.0, 0.0, 0.0),
            Point3D::new(0.0, 1.0, 0.0),
            Point3D::new(0.0, 0.0, 1.0),
        ];
        let values = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
        let elem = MeshElement::new(3, verts, values);
        let vol = elem.volume();
        assert!(vol.abs() > 1e-12);
        let q = Point3D::new(0.25, 0.25, 0.25);
        let sub_sum: f64 = (0..=3).map(|i| elem.sub_volume(i, q)).sum();
        assert!((sub_sum - vol).abs() < 1e-9);
    }

    #[test]
    fn interpolation_at_vertex_is_exact() {
        let verts = vec![
            Point3D::new(0.0, 0.0, 0.0),
            Point3D::new(1.0, 0.0, 0.0),
            Point3D::new(0.0, 1.0, 0.0),
            Point3D::new(0.0, 0.0, 1.0),
        ];
        let values = vec![vec![10.0], vec![20.0], vec![30.0], vec![40.0]];
        let elem = MeshElement::new(3, verts.clone(), values);
        let vol = elem.volume();
        let result = elem.interpolate(verts[2], vol);
        assert!((result[0] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_triangle_has_near_zero_volume() {
        let verts = vec![Point3D::new(0.0, 0.0, 0.0), Point3D::new(1.0, 0.0, 0.0), Point3D::new(2.0, 0.0, 0.0)];
        let values = vec![vec![0.0], vec![0.0], vec![0.0]];
        let elem = MeshElement::new(2, verts, values);
        assert!(elem.volume().abs() < 1e-9);
    }
}

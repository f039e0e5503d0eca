//! A static spatial index over a point cloud, supporting radius neighbour queries
//! sorted by distance. Built once from the mesh vertex set and never mutated afterward.

use crate::geometry::Point3D;

const LEAF_CAPACITY: usize = 16;

struct Node {
    bounds: Bounds,
    /// Either a leaf holding point indices, or an internal node with 8 children.
    payload: NodePayload,
}

enum NodePayload {
    Leaf(Vec<usize>),
    Internal(Box<[Node; 8]>),
}

#[derive(Clone, Copy)]
struct Bounds {
    min: Point3D,
    max: Point3D,
}

impl Bounds {
    fn center(&self) -> Point3D {
        Point3D::new((self.min.x + self.max.x) / 2.0, (self.min.y + self.max.y) / 2.0, (self.min.z + self.max.z) / 2.0)
    }

    /// Minimum distance from `p` to this box (zero if `p` is inside).
    fn distance_to(&self, p: Point3D) -> f64 {
        let dx = (self.min.x - p.x).max(0.0).max(p.x - self.max.x);
        let dy = (self.min.y - p.y).max(0.0).max(p.y - self.max.y);
        let dz = (self.min.z - p.z).max(0.0).max(p.z - self.max.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    fn octant_of(&self, p: Point3D) -> usize {
        let c = self.center();
        (if p.x >= c.x { 1 } else { 0 }) | (if p.y >= c.y { 2 } else { 0 }) | (if p.z >= c.z { 4 } else { 0 })
    }

    fn child_bounds(&self, octant: usize) -> Bounds {
        let c = self.center();
        let (xmin, xmax) = if octant & 1 != 0 { (c.x, self.max.x) } else { (self.min.x, c.x) };
        let (ymin, ymax) = if octant & 2 != 0 { (c.y, self.max.y) } else { (self.min.y, c.y) };
        let (zmin, zmax) = if octant & 4 != 0 { (c.z, self.max.z) } else { (self.min.z, c.z) };
        Bounds { min: Point3D::new(xmin, ymin, zmin), max: Point3D::new(xmax, ymax, zmax) }
    }
}

/// Immutable spatial index over a vertex set. Vertices are a strict subset reference of
/// the input point cloud: the tree stores indices into `points`, never copies of it.
pub struct Octree {
    points: Vec<Point3D>,
    root: Node,
}

impl Octree {
    /// Builds the tree from `points`. Empty input yields a degenerate single-leaf tree.
    pub fn build(points: Vec<Point3D>) -> Self {
        let bounds = bounding_box(&points);
        let indices: Vec<usize> = (0..points.len()).collect();
        let root = build_node(&points, indices, bounds, 0);
        Self { points, root }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> Point3D {
        self.points[index]
    }

    /// Indices of every point within `radius` of `query`, ascending by distance.
    pub fn neighbours_within(&self, query: Point3D, radius: f64) -> Vec<(usize, f64)> {
        let mut out = Vec::new();
        collect(&self.root, &self.points, query, radius, &mut out);
        out.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        out
    }
}

fn bounding_box(points: &[Point3D]) -> Bounds {
    if points.is_empty() {
        return Bounds { min: Point3D::ZERO, max: Point3D::ZERO };
    }
    let mut min = points[0];
    let mut max = points[0];
    for p in points {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        min.z = min.z.min(p.z);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
        max.z = max.z.max(p.z);
    }
    Bounds { min, max }
}

fn build_node(points: &[Point3D], indices: Vec<usize>, bounds: Bounds, depth: u32) -> Node {
    if indices.len() <= LEAF_CAPACITY || depth > 16 {
        return Node { bounds, payload: NodePayload::Leaf(indices) };
    }
    let mut buckets: [Vec<usize>; 8] = Default::default();
    for idx in indices {
        let octant = bounds.octant_of(points[idx]);
        buckets[octant].push(idx);
    }
    let children: Vec<Node> = buckets.into_iter().enumerate().map(|(i, bucket)| build_node(points, bucket, bounds.child_bounds(i), depth + 1)).collect();
    let children: [Node; 8] = children.try_into().unwrap_or_else(|_| unreachable!());
    Node { bounds, payload: NodePayload::Internal(Box::new(children)) }
}

fn collect(node: &Node, points: &[Point3D], query: Point3D, radius: f64, out: &mut Vec<(usize, f64)>) {
    if node.bounds.distance_to(query) > radius {
        return;
    }
    match &node.payload {
        NodePayload::Leaf(indices) => {
            for &idx in indices {
                let d = points[idx].distance(query);
                if d <= radius {
                    out.push((idx, d));
                }
            }
        }
        NodePayload::Internal(children) => {
            for child in children.iter() {
                collect(child, points, query, radius, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_points_within_radius_sorted() {
        let points = vec![Point3D::new(0.0, 0.0, 0.0), Point3D::new(1.0, 0.0, 0.0), Point3D::new(2.0, 0.0, 0.0), Point3D::new(10.0, 0.0, 0.0)];
        let tree = Octree::build(points);
        let hits = tree.neighbours_within(Point3D::ZERO, 1.5);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].1 <= hits[1].1);
    }

    #[test]
    fn empty_tree_returns_no_neighbours() {
        let tree = Octree::build(vec![]);
        assert!(tree.neighbours_within(Point3D::ZERO, 10.0).is_empty());
    }

    #[test]
    fn large_point_set_matches_brute_force() {
        let mut points = Vec::new();
        for i in 0..500 {
            let f = i as f64;
            points.push(Point3D::new((f * 0.37).sin() * 10.0, (f * 0.71).cos() * 10.0, (f * 0.13).sin() * 5.0));
        }
        let query = Point3D::new(1.0, -2.0, 0.5);
        let radius = 3.0;
        let brute: usize = points.iter().filter(|p| p.distance(query) <= radius).count();
        let tree = Octree::build(points);
        let hits = tree.neighbours_within(query, radius);
        assert_eq!(hits.len(), brute);
    }
}

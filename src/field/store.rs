//! The public field lookup surface a detector exposes to the propagator: electric field,
//! doping concentration, weighting potential, and an optional static magnetic field.

use crate::error::FieldError;
use crate::field::grid::{FieldGrid, MappingPolicy};
use crate::field::pad::PadPotential;
use crate::geometry::Point3D;

/// How the weighting potential is supplied: either a closed-form pad formula or a
/// sampled grid (typically converted from a TCAD weighting-field mesh).
#[derive(Clone, Debug)]
pub enum WeightingPotential {
    Analytic(PadPotential),
    Grid(FieldGrid<1>),
}

impl WeightingPotential {
    /// Builds a grid-backed weighting potential, rejecting values outside `[0, 1]`
    /// (unphysical for a weighting potential) and, unless `allow_low_dimensionality` is
    /// set, a mesh sampled in fewer than three dimensions (a collapsed axis, `dims.i == 1`,
    /// usually signals a 2D weighting-field mesh that was never meant to stand in for the
    /// full 3D potential).
    pub fn from_grid(grid: FieldGrid<1>, allow_low_dimensionality: bool) -> Result<Self, FieldError> {
        let (nx, ny, nz) = grid.dims();
        let sampled_dimensions = [nx, ny, nz].iter().filter(|&&n| n > 1).count();
        if sampled_dimensions < 3 && !allow_low_dimensionality {
            return Err(FieldError::InsufficientDimensionality { found: sampled_dimensions });
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in grid.data() {
            min = min.min(v);
            max = max.max(v);
        }
        if min < 0.0 || max > 1.0 {
            return Err(FieldError::UnphysicalWeightingPotential { min, max });
        }

        Ok(WeightingPotential::Grid(grid))
    }

    /// `pos` must already be expressed relative to the target pixel's center: the
    /// analytic model is pixel-centered by construction, and the grid model relies on
    /// `PIXEL_FULL` folding to treat any pixel as the canonical one.
    fn evaluate(&self, pos_relative_to_pixel: Point3D) -> f64 {
        match self {
            WeightingPotential::Analytic(pad) => pad.evaluate(pos_relative_to_pixel),
            WeightingPotential::Grid(grid) => grid.interpolate(pos_relative_to_pixel)[0],
        }
    }
}

/// A doping profile given as a list of step regions rather than a sampled mesh, the
/// shape the original `DopingProfileReaderModule`'s "regional" mode produces: each
/// region names a depth measured from the sensor's +z (implant) surface and the signed
/// doping concentration that holds from that depth down to the next region's.
#[derive(Clone, Debug)]
pub struct DopingRegions {
    /// `(depth, value)` pairs, sorted ascending by depth.
    regions: Vec<(f64, f64)>,
}

impl DopingRegions {
    pub fn new(mut regions: Vec<(f64, f64)>) -> Self {
        regions.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        Self { regions }
    }

    /// The value of the region with the smallest depth `>= depth`, or the deepest
    /// region's value if `depth` exceeds every region's depth.
    fn value_at_depth(&self, depth: f64) -> f64 {
        self.regions
            .iter()
            .find(|(d, _)| *d >= depth)
            .or_else(|| self.regions.last())
            .map(|(_, v)| *v)
            .unwrap_or(0.0)
    }
}

/// How the doping concentration is supplied: a sampled mesh, or a depth-keyed list of
/// constant-value regions.
#[derive(Clone, Debug)]
pub enum DopingProfile {
    Mesh(FieldGrid<1>),
    Regions(DopingRegions),
}

impl DopingProfile {
    fn evaluate(&self, pos: Point3D, sensor_thickness: f64) -> f64 {
        match self {
            DopingProfile::Mesh(grid) => grid.interpolate(pos)[0],
            DopingProfile::Regions(regions) => regions.value_at_depth(sensor_thickness / 2.0 - pos.z),
        }
    }
}

/// Composes the field grids a single detector needs: drift `E`, `doping`, weighting
/// potential, and (optionally) a uniform static `B`. Immutable once built; shared across
/// worker threads behind an `Arc` by callers, per the event-level parallelism model.
#[derive(Clone, Debug)]
pub struct FieldStore {
    electric: FieldGrid<3>,
    doping: Option<DopingProfile>,
    weighting: WeightingPotential,
    magnetic: Option<(f64, f64, f64)>,
}

impl FieldStore {
    pub fn new(electric: FieldGrid<3>, weighting: WeightingPotential) -> Self {
        Self { electric, doping: None, weighting, magnetic: None }
    }

    pub fn with_doping(mut self, doping: DopingProfile) -> Self {
        self.doping = Some(doping);
        self
    }

    pub fn with_magnetic(mut self, b: (f64, f64, f64)) -> Self {
        self.magnetic = Some(b);
        self
    }

    /// Electric field vector (V/um internally) at `pos`.
    pub fn get_electric(&self, pos: Point3D) -> (f64, f64, f64) {
        let v = self.electric.interpolate(pos);
        (v[0], v[1], v[2])
    }

    /// Net doping concentration (signed, donors positive) at `pos`, or `0.0` if the
    /// detector carries no doping profile. Region depth, for the [`DopingProfile::Regions`]
    /// variant, is measured against the electric field grid's own sensor thickness.
    pub fn get_doping(&self, pos: Point3D) -> f64 {
        self.doping.as_ref().map(|profile| profile.evaluate(pos, self.electric.size().2)).unwrap_or(0.0)
    }

    /// Weighting potential of `pixel` at `pos`, used by the pulse aggregator via Ramo's
    /// theorem. `pixel_center` is the target pixel's center in the local frame; `pos` is
    /// translated into that pixel's frame before evaluation so the same analytic/grid
    /// model serves every pixel in the matrix.
    pub fn get_weighting_potential(&self, pos: Point3D, pixel_center: Point3D) -> f64 {
        self.weighting.evaluate(pos - pixel_center)
    }

    /// Static magnetic field, if configured.
    pub fn get_magnetic(&self) -> Option<(f64, f64, f64)> {
        self.magnetic
    }

    pub fn electric_grid(&self) -> &FieldGrid<3> {
        &self.electric
    }

    pub fn mapping(&self) -> MappingPolicy {
        self.electric.mapping()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doping_defaults_to_zero_without_profile() {
        let e = FieldGrid::<3>::new((1, 1, 1), (1.0, 1.0, 1.0), MappingPolicy::Sensor, vec![0.0, 0.0, 1.0]).unwrap();
        let store = FieldStore::new(e, WeightingPotential::Analytic(PadPotential::new((0.05, 0.05), 0.3)));
        assert_eq!(store.get_doping(Point3D::ZERO), 0.0);
    }

    #[test]
    fn magnetic_field_none_until_configured() {
        let e = FieldGrid::<3>::new((1, 1, 1), (1.0, 1.0, 1.0), MappingPolicy::Sensor, vec![0.0, 0.0, 1.0]).unwrap();
        let store = FieldStore::new(e, WeightingPotential::Analytic(PadPotential::new((0.05, 0.05), 0.3)));
        assert!(store.get_magnetic().is_none());
        let store = store.with_magnetic((0.0, 0.0, 4.0));
        assert_eq!(store.get_magnetic(), Some((0.0, 0.0, 4.0)));
    }

    #[test]
    fn doping_regions_picks_smallest_depth_at_or_beyond_query() {
        let regions = DopingRegions::new(vec![(1.0, -1e12), (5.0, 1e15), (20.0, 5e14)]);
        assert_eq!(regions.value_at_depth(0.5), -1e12);
        assert_eq!(regions.value_at_depth(1.0), -1e12);
        assert_eq!(regions.value_at_depth(3.0), 1e15);
        // Deeper than every listed region: falls back to the deepest region's value.
        assert_eq!(regions.value_at_depth(100.0), 5e14);
    }

    #[test]
    fn field_store_evaluates_stepwise_doping_from_sensor_thickness() {
        let e = FieldGrid::<3>::new((1, 1, 1), (1.0, 1.0, 0.3), MappingPolicy::Sensor, vec![0.0, 0.0, 1.0]).unwrap();
        let store = FieldStore::new(e, WeightingPotential::Analytic(PadPotential::new((0.05, 0.05), 0.3)))
            .with_doping(DopingProfile::Regions(DopingRegions::new(vec![(0.01, -1e12), (0.3, 1e15)])));
        // thickness/2 - pos.z = 0.15 - 0.14 = 0.01 um of depth -> the 0.01 region.
        assert_eq!(store.get_doping(Point3D::new(0.0, 0.0, 0.14)), -1e12);
        // thickness/2 - pos.z = 0.15 - (-0.14) = 0.29 um of depth -> the 0.3 region.
        assert_eq!(store.get_doping(Point3D::new(0.0, 0.0, -0.14)), 1e15);
    }

    #[test]
    fn from_grid_rejects_out_of_range_values() {
        let grid = FieldGrid::<1>::new((2, 2, 2), (1.0, 1.0, 1.0), MappingPolicy::Sensor, vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.5]).unwrap();
        let err = WeightingPotential::from_grid(grid, false).unwrap_err();
        assert!(matches!(err, FieldError::UnphysicalWeightingPotential { max, .. } if max == 1.5));
    }

    #[test]
    fn from_grid_rejects_low_dimensionality_unless_overridden() {
        let grid = FieldGrid::<1>::new((1, 2, 2), (1.0, 1.0, 1.0), MappingPolicy::Sensor, vec![0.0, 0.5, 0.5, 1.0]).unwrap();
        let err = WeightingPotential::from_grid(grid.clone(), false).unwrap_err();
        assert!(matches!(err, FieldError::InsufficientDimensionality { found: 2 }));
        assert!(WeightingPotential::from_grid(grid, true).is_ok());
    }

    #[test]
    fn from_grid_accepts_valid_three_dimensional_mesh() {
        let grid = FieldGrid::<1>::new((2, 2, 2), (1.0, 1.0, 1.0), MappingPolicy::Sensor, vec![0.0, 0.2, 0.4, 0.6, 0.2, 0.4, 0.6, 1.0]).unwrap();
        assert!(WeightingPotential::from_grid(grid, false).is_ok());
    }
}

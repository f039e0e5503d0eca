//! Offline TCAD-mesh-to-grid conversion: spatial index, simplex interpolation, and the
//! DF-ISE file parser that supplies the unstructured input.

mod converter;
mod dfise;
mod element;
mod octree;

pub use converter::{convert, CoordinateRemap, ConverterConfig, UnstructuredField};
pub use dfise::{load_field, parse_dat_observable, parse_grd_vertices, Observable};
pub use element::MeshElement;
pub use octree::Octree;

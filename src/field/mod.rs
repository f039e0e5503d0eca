//! Field storage and lookup: regular sample grids, the analytic pad weighting potential,
//! and the binary/text file formats fields are loaded from.

mod grid;
mod io;
mod pad;
mod store;

pub use grid::{FieldGrid, MappingPolicy};
pub use io::{parse_apf, parse_init, write_apf, FieldData};
pub use pad::PadPotential;
pub use store::{DopingProfile, DopingRegions, FieldStore, WeightingPotential};

//! Error taxonomy for the core engine.
//!
//! Configuration, model and field/grid errors are raised at load time and are meant to
//! abort the run; interpolation failures and pulse incompatibilities are raised during
//! event processing and are handled by the caller according to the policy described in
//! the component that raises them.

use thiserror::Error;

/// Errors raised while constructing or validating a [`crate::field::FieldGrid`] or
/// [`crate::field::FieldStore`].
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("field data has {got} values, expected {expected} (nx*ny*nz*n)")]
    InvalidSize { expected: usize, got: usize },

    #[error("weighting potential out of [0, 1] range: min={min}, max={max}")]
    UnphysicalWeightingPotential { min: f64, max: f64 },

    #[error("weighting potential mesh has {found} sampled dimensions, at least 3 required (override with allow_low_dimensionality)")]
    InsufficientDimensionality { found: usize },

    #[error("malformed field file: {0}")]
    MalformedFile(String),

    #[error("field index ({ix}, {iy}, {iz}) out of bounds for grid ({nx}, {ny}, {nz})")]
    IndexOutOfBounds { ix: i64, iy: i64, iz: i64, nx: usize, ny: usize, nz: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by the mesh converter.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("mesh has {vertices} vertices but field data has {values} entries")]
    InvalidGrid { vertices: usize, values: usize },

    #[error("no valid enclosing simplex found for query point within r_max={r_max}")]
    InterpolationFailure { r_max: f64 },

    #[error("degenerate mesh element rejected: |volume|={volume} below cut {cut}")]
    DegenerateElement { volume: f64, cut: f64 },

    #[error("2D mesh cannot supply the unmapped output coordinate")]
    UnmappedCoordinate,

    #[error("malformed TCAD DF-ISE {section}: {detail}")]
    DfiseParse { section: String, detail: String },
}

/// Errors raised when a requested physics model cannot be built from the supplied
/// configuration, e.g. a doping-dependent model with no doping profile available.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model '{model}' unsuitable: {reason}")]
    Unsuitable { model: String, reason: String },

    #[error("unknown model variant '{0}'")]
    UnknownVariant(String),
}

/// Errors raised by configuration validation that is the core's responsibility
/// (as opposed to key parsing, which belongs to the external configuration layer).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("invalid combination of keys: {0}")]
    InvalidCombination(String),

    #[error("missing required key '{0}'")]
    MissingKey(String),
}

/// Raised when merging two [`crate::pulse::Pulse`] instances with different bin widths.
#[derive(Debug, Error)]
#[error("cannot merge pulses with different bin widths: {lhs} ns vs {rhs} ns")]
pub struct PulseIncompatibleError {
    pub lhs: f64,
    pub rhs: f64,
}

/// Top-level error type returned by fallible core entry points.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    PulseIncompatible(#[from] PulseIncompatibleError),
}

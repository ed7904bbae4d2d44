use thiserror::Error;

/// Top-level error type for case generation.
#[derive(Debug, Error)]
pub enum CaseError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Tessellation(#[from] TessellationError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Export(#[from] ExportError),

    /// A carving step aborted; the scene was rolled back to its last commit.
    #[error("{stage} failed")]
    Stage {
        stage: &'static str,
        source: Box<CaseError>,
    },
}

/// Errors related to geometric computations.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("parameter {parameter} = {value} is out of range [{min}, {max}]")]
    ParameterOutOfRange {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("zero-length vector")]
    ZeroVector,

    #[error("ray missed the target: {0}")]
    RayMissed(String),
}

/// Errors related to mesh topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("{context}: {count} non-manifold edges")]
    NonManifold { context: String, count: usize },

    #[error("{context}: result is not closed ({boundary} boundary, {non_manifold} non-manifold, {inconsistent} inconsistent edges)")]
    OpenResult {
        context: String,
        boundary: usize,
        non_manifold: usize,
        inconsistent: usize,
    },

    #[error("{context}: expected {expected} boundary loops, found {found}")]
    BoundaryLoops {
        context: String,
        expected: usize,
        found: usize,
    },
}

/// Errors related to mesh operations.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("operation failed: {0}")]
    Failed(String),

    #[error("{0} produced an empty mesh")]
    EmptyResult(String),
}

/// Errors related to tessellation.
#[derive(Debug, Error)]
pub enum TessellationError {
    #[error("invalid tessellation parameters: {0}")]
    InvalidParameters(String),

    #[error("tessellation failed: {0}")]
    Failed(String),
}

/// Errors raised when a required tag or scene object is missing.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("tag {0} has no members")]
    EmptyTag(String),

    #[error("scene object {0} not found")]
    MissingObject(String),
}

/// Errors related to parameter loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid parameter {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to parse parameters: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize parameters: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while writing meshes out.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{0} has no triangles")]
    EmptyMesh(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Convenience type alias for results using [`CaseError`].
pub type Result<T> = std::result::Result<T, CaseError>;

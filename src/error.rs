use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type. Each pipeline stage surfaces its own error
/// family; nothing is recovered internally except a single relaxed
/// retry of the sizing solve.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Sizing(#[from] SizingError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Malformed diagram definition files.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("unknown key '{key}' in {context}")]
    UnknownKey { key: String, context: String },

    #[error("{context}: expected {expected}")]
    TypeMismatch {
        context: String,
        expected: &'static str,
    },

    #[error("connection definition is missing '{field}'")]
    MissingField { field: &'static str },

    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse '{path}': {message}")]
    Parse { path: PathBuf, message: String },
}

/// Inconsistent grid or block definitions.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("duplicate block name '{name}'")]
    DuplicateBlock { name: String },

    #[error("tag '{tag}' of block '{block}' is also the name of another block")]
    TagConflict { tag: String, block: String },

    #[error(
        "block '{block}' does not cover a rectangle: \
         cell ({row}, {column}) belongs to '{other}'"
    )]
    NonRectangularCover {
        block: String,
        other: String,
        row: usize,
        column: usize,
    },

    #[error("block '{name}' does not cover any cells")]
    EmptyBlock { name: String },

    #[error("connection references unknown block '{name}'")]
    UnknownBlock { name: String },

    #[error("no cell tagged '{tag}' inside block '{block}'")]
    UnknownCell { block: String, tag: String },
}

/// A connection that cannot be routed aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("no route from '{start}' to '{end}' satisfies the entry/exit constraints")]
    Unroutable { start: String, end: String },
}

/// The constraint system could not be satisfied, even after retrying
/// with the built-in minimum sizes.
#[derive(Debug, thiserror::Error)]
pub enum SizingError {
    #[error("layout constraints are infeasible: {detail}")]
    InfeasibleLayout { detail: String },
}

/// Failures of the drawing back-end.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("cannot write '{path}': {message}")]
    Output { path: PathBuf, message: String },

    #[error("failed to rasterize drawing: {message}")]
    Raster { message: String },
}

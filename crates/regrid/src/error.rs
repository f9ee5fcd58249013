use thiserror::Error;

/// Errors from grid construction.
///
/// These only cover malformed input. A grid where no cell found a sample is
/// still a valid (all no-data) grid.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResampleError {
    #[error("grid dimension {axis} is zero")]
    EmptyDimension { axis: char },

    #[error("line variable `{name}` has {actual} values, index holds {expected} samples")]
    VariableLength {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("search half-width must be finite and non-negative, got {0:?}")]
    InvalidSearchRadius([f32; 3]),
}

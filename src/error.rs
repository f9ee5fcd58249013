//! Error types for the rendering stack.

use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the compute device.
///
/// All of these are fatal for a batch run: the caller is expected to log them
/// and exit non-zero.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no compute adapters available")]
    NoPlatform,

    #[error("no suitable compute device: {0}")]
    NoDevice(String),

    #[error("could not create device context: {0}")]
    Context(String),

    #[error("kernel build failed:\n{diagnostics}")]
    Build { diagnostics: String },

    #[error("buffer `{label}` needs {requested} bytes, device allows {limit}")]
    Buffer {
        label: &'static str,
        requested: u64,
        limit: u64,
    },

    #[error("readback of `{label}` failed: {reason}")]
    Map { label: &'static str, reason: String },

    #[error("uniform encoding failed: {0}")]
    Encode(String),

    #[error("{0} called before the required resources exist")]
    NotReady(&'static str),
}

/// Renderer-level failures.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Operation called out of order. The renderer is left untouched.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("invalid render settings: {0}")]
    InvalidSettings(String),

    #[error("chunk size must be at least one pixel")]
    InvalidChunkSize,

    #[error("output buffer holds {actual} elements, frame needs {expected}")]
    SinkSize { expected: usize, actual: usize },

    #[error(transparent)]
    Resample(#[from] regrid::ResampleError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Cube(#[from] CubeError),
}

impl RenderError {
    /// True for precondition violations that leave the renderer usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RenderError::InvalidState { .. }
                | RenderError::InvalidSettings(_)
                | RenderError::SinkSize { .. }
        )
    }
}

/// Input dataset failures.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("dataset dimension must be 2 or 3, got {0}")]
    Dimension(usize),

    #[error("column `{name}` has {actual} values, expected {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Cube serialization failures.
#[derive(Debug, Error)]
pub enum CubeError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

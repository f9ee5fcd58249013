//! Synthetic spectral-line imaging from scattered simulation samples.
//!
//! The scattered samples are resampled onto a regular grid by the `regrid`
//! crate; [`render`] uploads that grid to a compute device and integrates
//! line-of-sight spectra per pixel for any viewing angle.

pub mod config;
pub mod cube;
pub mod dataset;
pub mod error;
pub mod render;
pub mod util;

pub use config::SweepConfig;
pub use cube::RenderCube;
pub use dataset::PhysicalData;
pub use error::{BackendError, CubeError, DatasetError, RenderError};
pub use render::{
    render_with_gpu_regular_grid, ComputeBackend, DisplayMode, RenderSettings, Renderer,
    RendererState, View, WgpuBackend,
};
pub use util::Reporter;

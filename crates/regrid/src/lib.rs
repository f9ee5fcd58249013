//! Nearest-within-box resampling of scattered 3-D samples onto a regular grid.
//!
//! The crate has two halves:
//!
//! 1. [`SpatialIndex`]: a bulk-loaded R-tree over sample positions answering
//!    "nearest sample that also lies inside this axis-aligned box".
//! 2. [`resample`]: walks every cell of a regular grid in parallel, queries
//!    the index with a box of caller-supplied half-widths and copies the
//!    line variables of the hit (or writes a no-data cell).
//!
//! # Example
//!
//! ```
//! use glam::Vec3;
//! use regrid::{resample, Bounds, EmissivityCalibration, GridDims, LineVariables, SpatialIndex};
//!
//! let positions = vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0)];
//! let index = SpatialIndex::from_positions(&positions);
//! let peak = [1.0, 2.0];
//! let width = [0.1, 0.1];
//! let zeros = [0.0, 0.0];
//! let vars = LineVariables::new(&peak, &width, [&zeros, &zeros, &zeros]);
//! let bounds = Bounds::from_points(positions.iter().copied()).unwrap();
//!
//! let grid = resample(
//!     &index,
//!     &vars,
//!     bounds,
//!     GridDims::new(2, 2, 1),
//!     Vec3::splat(0.25),
//!     EmissivityCalibration::default(),
//! )
//! .expect("resample should succeed");
//! assert_eq!(grid.cells.len(), 4);
//! assert_eq!(grid.hits, 2);
//! ```

mod error;
mod grid;
mod index;
mod resample;

pub use error::ResampleError;
pub use grid::{Bounds, GridCell, GridDims, GridGeometry, RegularGrid};
pub use index::{SearchBox, SpatialIndex};
pub use resample::{resample, EmissivityCalibration, LineVariables, GAUSSIAN_AREA_FACTOR};

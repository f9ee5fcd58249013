//! Regular grid construction from the spatial index.
//!
//! Every cell is independent: it computes its own world position, queries
//! the index with a box of the caller's half-widths and writes only its own
//! slot. The whole grid is therefore one `par_iter_mut` over the cell and
//! emissivity arrays with no synchronization.

use glam::Vec3;
use rayon::prelude::*;

use crate::error::ResampleError;
use crate::grid::{Bounds, GridCell, GridDims, GridGeometry, RegularGrid};
use crate::index::{SearchBox, SpatialIndex};


/// Integral of a unit-peak Gaussian divided by its FWHM: `sqrt(pi / (4 ln 2))`.
pub const GAUSSIAN_AREA_FACTOR: f32 = 1.064_467_02;

/// Conversion from sample variables to kernel inputs.
///
/// Emissivity is `unit_scale * peak * width * area_factor`. The defaults map
/// per-cm peak values onto the Mm length scale of the simulation grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmissivityCalibration {
    pub unit_scale: f32,
    pub area_factor: f32,
}

impl Default for EmissivityCalibration {
    fn default() -> Self {
        Self {
            unit_scale: 1e8,
            area_factor: GAUSSIAN_AREA_FACTOR,
        }
    }
}

/// Borrowed per-sample line variables, indexed by sample id.
#[derive(Debug, Clone, Copy)]
pub struct LineVariables<'a> {
    pub peak: &'a [f32],
    pub width: &'a [f32],
    pub velocity: [&'a [f32]; 3],
}

impl<'a> LineVariables<'a> {
    pub fn new(peak: &'a [f32], width: &'a [f32], velocity: [&'a [f32]; 3]) -> Self {
        Self {
            peak,
            width,
            velocity,
        }
    }

    fn check_len(&self, required: usize) -> Result<(), ResampleError> {
        let columns = [
            ("peak", self.peak),
            ("width", self.width),
            ("vx", self.velocity[0]),
            ("vy", self.velocity[1]),
            ("vz", self.velocity[2]),
        ];
        for (name, column) in columns {
            if column.len() < required {
                return Err(ResampleError::VariableLength {
                    name,
                    expected: required,
                    actual: column.len(),
                });
            }
        }
        Ok(())
    }

    #[inline]
    fn cell(&self, id: usize, calibration: &EmissivityCalibration) -> (GridCell, f32) {
        let intensity = calibration.unit_scale * self.peak[id];
        let width = self.width[id];
        let cell = GridCell {
            intensity,
            width,
            velocity: [
                self.velocity[0][id],
                self.velocity[1][id],
                self.velocity[2][id],
            ],
            _padding: [0.0; 3],
        };
        (cell, intensity * width * calibration.area_factor)
    }
}

/// Build a regular grid of `dims` cells spanning `bounds`.
///
/// `max_distance` holds the per-axis half-widths of the search box around
/// each cell position. Cells with no sample in their box get
/// [`GridCell::NO_DATA`] and zero emissivity.
pub fn resample(
    index: &SpatialIndex,
    vars: &LineVariables<'_>,
    bounds: Bounds,
    dims: GridDims,
    max_distance: Vec3,
    calibration: EmissivityCalibration,
) -> Result<RegularGrid, ResampleError> {
    for (axis, n) in ['x', 'y', 'z'].into_iter().zip(dims.as_array()) {
        if n == 0 {
            return Err(ResampleError::EmptyDimension { axis });
        }
    }
    if !max_distance.is_finite() || max_distance.cmplt(Vec3::ZERO).any() {
        return Err(ResampleError::InvalidSearchRadius(max_distance.to_array()));
    }
    if let Some(max_id) = index.max_id() {
        vars.check_len(max_id + 1)?;
    }

    let total = dims.cell_count();
    let mut cells = vec![GridCell::NO_DATA; total];
    let mut emissivity = vec![0.0f32; total];

    let hits: usize = cells
        .par_iter_mut()
        .zip(emissivity.par_iter_mut())
        .enumerate()
        .map(|(i, (cell, emis))| {
            let (ix, iy, iz) = dims.unflatten(i);
            let position = RegularGrid::cell_position(&bounds, dims, ix, iy, iz);
            let search = SearchBox::new(position, max_distance);
            match index.nearest_within(position, &search) {
                Some(id) => {
                    let (filled, e) = vars.cell(id, &calibration);
                    *cell = filled;
                    *emis = e;
                    1
                }
                None => 0,
            }
        })
        .sum();

    log::trace!("resample: {hits}/{total} cells matched a sample");

    Ok(RegularGrid {
        dims,
        bounds,
        geometry: GridGeometry::new(&bounds, dims),
        cells,
        emissivity,
        hits,
    })
}

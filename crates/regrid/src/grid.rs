//! Regular grid storage and derived geometry.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Axis-aligned bounds of the input samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Tight bounds around `points`, or `None` when there are no points.
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Self { min, max })
    }

    pub fn mid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Cell counts along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridDims {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl GridDims {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    pub fn cell_count(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Flattened index, y-major then x then z.
    #[inline]
    pub fn flat_index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        iy * self.nx * self.nz + ix * self.nz + iz
    }

    /// Inverse of [`flat_index`](Self::flat_index): returns `(ix, iy, iz)`.
    #[inline]
    pub fn unflatten(&self, index: usize) -> (usize, usize, usize) {
        let plane = self.nx * self.nz;
        let iy = index / plane;
        let rem = index % plane;
        (rem / self.nz, iy, rem % self.nz)
    }

    pub fn as_array(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }
}

/// One resampled cell as the kernel reads it (8 x f32, 32 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GridCell {
    /// Rescaled peak intensity.
    pub intensity: f32,
    /// Line width.
    pub width: f32,
    pub velocity: [f32; 3],
    pub _padding: [f32; 3],
}

impl GridCell {
    /// Fill for cells without a sample in range. Width is 1 so the kernel
    /// never divides by zero on empty cells.
    pub const NO_DATA: GridCell = GridCell {
        intensity: 0.0,
        width: 1.0,
        velocity: [0.0; 3],
        _padding: [0.0; 3],
    };

    pub fn is_no_data(&self) -> bool {
        *self == Self::NO_DATA
    }
}

/// Physical layout of the grid as the kernel sees it.
///
/// `size` spans the bounds inclusively: with `n` cells per axis the outer
/// cell centres sit on the bounds, so the full extent is `(max-min)*n/(n-1)`.
/// Axes with a single plane, or with zero extent (2-D input), get unit
/// thickness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub mid: Vec3,
    pub size: Vec3,
    pub spacing: Vec3,
}

impl GridGeometry {
    pub fn new(bounds: &Bounds, dims: GridDims) -> Self {
        let extent = bounds.extent().to_array();
        let counts = dims.as_array();
        let mut size = [1.0f32; 3];
        for axis in 0..3 {
            let n = counts[axis];
            if n > 1 && extent[axis] > 0.0 {
                size[axis] = extent[axis] * n as f32 / (n - 1) as f32;
            }
        }
        let size = Vec3::from_array(size);
        let spacing = size
            / Vec3::new(
                counts[0].max(1) as f32,
                counts[1].max(1) as f32,
                counts[2].max(1) as f32,
            );
        Self {
            mid: bounds.mid(),
            size,
            spacing,
        }
    }

    /// True when the z axis collapsed to unit thickness.
    pub fn is_planar(bounds: &Bounds, dims: GridDims) -> bool {
        dims.nz <= 1 || bounds.extent().z <= 0.0
    }
}

/// Dense regular grid with one [`GridCell`] and one emissivity per cell.
#[derive(Debug, Clone)]
pub struct RegularGrid {
    pub dims: GridDims,
    pub bounds: Bounds,
    pub geometry: GridGeometry,
    pub cells: Vec<GridCell>,
    pub emissivity: Vec<f32>,
    /// Number of cells that found a sample in range.
    pub hits: usize,
}

impl RegularGrid {
    /// World position of cell `(ix, iy, iz)`.
    ///
    /// Cells span the bounds inclusively. A single x or y column sits on the
    /// bounds mid-point; a single z plane sits on `min.z`.
    pub fn cell_position(bounds: &Bounds, dims: GridDims, ix: usize, iy: usize, iz: usize) -> Vec3 {
        let lerp = |i: usize, n: usize, lo: f32, hi: f32| i as f32 / (n - 1) as f32 * (hi - lo) + lo;
        let x = if dims.nx > 1 {
            lerp(ix, dims.nx, bounds.min.x, bounds.max.x)
        } else {
            0.5 * (bounds.min.x + bounds.max.x)
        };
        let y = if dims.ny > 1 {
            lerp(iy, dims.ny, bounds.min.y, bounds.max.y)
        } else {
            0.5 * (bounds.min.y + bounds.max.y)
        };
        let z = if dims.nz > 1 {
            lerp(iz, dims.nz, bounds.min.z, bounds.max.z)
        } else {
            bounds.min.z
        };
        Vec3::new(x, y, z)
    }

    pub fn cell(&self, ix: usize, iy: usize, iz: usize) -> &GridCell {
        &self.cells[self.dims.flat_index(ix, iy, iz)]
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

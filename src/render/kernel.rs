//! Kernel specialization.
//!
//! The ray kernel is compiled per display mode with the grid layout, frame
//! size and mode flags baked in as WGSL `const`s. [`KernelBuildParams`] is the
//! full set of those constants; [`generate_kernel_source`] turns it into a
//! complete shader module: constant prelude, shared helpers, mode body.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use regrid::{GridDims, GridGeometry};

use crate::error::BackendError;

/// Kernel entry point name, shared by every mode.
pub const ENTRY_POINT: &str = "calculate_ray";

/// Threads per workgroup (must match `@workgroup_size` in the shaders).
pub const WORKGROUP_SIZE: u32 = 64;

/// Width of one output element in the byte modes: an RGBA8 word.
pub const BYTES_PER_PIXEL: usize = 4;

const COMMON_WGSL: &str = include_str!("../shaders/common.wgsl");
const SPECTRUM_WGSL: &str = include_str!("../shaders/spectrum.wgsl");
const INTEGRATED_WGSL: &str = include_str!("../shaders/integrated.wgsl");
const CLASSIFIED_WGSL: &str = include_str!("../shaders/classified.wgsl");

/// What the kernel writes per pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayMode {
    /// One RGBA8 word per pixel, colour keyed on line-of-sight velocity.
    ClassifiedByte,
    /// One RGBA8 word per pixel, grey level from integrated emissivity.
    IntegratedIntensityByte,
    /// `lambda_pixel` floats per pixel: the full line profile.
    AllIntensitiesFloat,
}

impl DisplayMode {
    pub fn is_byte_mode(self) -> bool {
        !matches!(self, DisplayMode::AllIntensitiesFloat)
    }

    fn body(self) -> &'static str {
        match self {
            DisplayMode::ClassifiedByte => CLASSIFIED_WGSL,
            DisplayMode::IntegratedIntensityByte => INTEGRATED_WGSL,
            DisplayMode::AllIntensitiesFloat => SPECTRUM_WGSL,
        }
    }
}

/// Compile-time constants for one kernel build.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelBuildParams {
    pub mode: DisplayMode,
    pub max_intensity: f32,
    pub x_pixel: u32,
    pub y_pixel: u32,
    pub lambda_pixel: u32,
    /// Rest wavelength in Angstrom.
    pub lambda0: f32,
    pub grid_counts: [u32; 3],
    /// Physical grid size per axis; the kernel sees the grid centred on 0.
    pub grid_size: [f32; 3],
    /// Pixel coordinates of the view centre.
    pub origin: [f32; 2],
    pub debug: bool,
}

/// A single baked constant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KernelConst {
    Bool(bool),
    U32(u32),
    F32(f32),
}

impl KernelBuildParams {
    pub fn new(
        mode: DisplayMode,
        max_intensity: f32,
        pixels: (usize, usize),
        lambda_pixel: usize,
        lambda0: f64,
        dims: GridDims,
        geometry: &GridGeometry,
    ) -> Self {
        let (x_pixel, y_pixel) = pixels;
        Self {
            mode,
            max_intensity,
            x_pixel: x_pixel as u32,
            y_pixel: y_pixel as u32,
            lambda_pixel: lambda_pixel as u32,
            lambda0: lambda0 as f32,
            grid_counts: [dims.nx as u32, dims.ny as u32, dims.nz as u32],
            grid_size: geometry.size.to_array(),
            origin: [x_pixel as f32 / 2.0, y_pixel as f32 / 2.0],
            debug: false,
        }
    }

    /// Named constants in prelude order.
    pub fn constants(&self) -> Vec<(&'static str, KernelConst)> {
        use KernelConst::*;
        let [sx, sy, sz] = self.grid_size;
        let [nx, ny, nz] = self.grid_counts;
        vec![
            ("DEBUG", Bool(self.debug)),
            ("ALL_INTENSITIES", Bool(self.mode == DisplayMode::AllIntensitiesFloat)),
            (
                "INTEGRATED_INTENSITY",
                Bool(self.mode == DisplayMode::IntegratedIntensityByte),
            ),
            ("MAX_INTENSITY", F32(self.max_intensity)),
            ("X_PIXEL", U32(self.x_pixel)),
            ("Y_PIXEL", U32(self.y_pixel)),
            ("LAMBDA_PIXEL", U32(self.lambda_pixel)),
            ("LAMBDA0", F32(self.lambda0)),
            ("MINX", F32(-sx / 2.0)),
            ("MAXX", F32(sx / 2.0)),
            ("MINY", F32(-sy / 2.0)),
            ("MAXY", F32(sy / 2.0)),
            ("MINZ", F32(-sz / 2.0)),
            ("MAXZ", F32(sz / 2.0)),
            ("GX", F32(sx / nx.max(1) as f32)),
            ("GSX", U32(nx)),
            ("GY", F32(sy / ny.max(1) as f32)),
            ("GSY", U32(ny)),
            ("GZ", F32(sz / nz.max(1) as f32)),
            ("GSZ", U32(nz)),
            ("OX", F32(self.origin[0])),
            ("OY", F32(self.origin[1])),
        ]
    }
}

fn wgsl_const(out: &mut String, name: &str, value: KernelConst) -> Result<(), BackendError> {
    let written = match value {
        KernelConst::Bool(v) => writeln!(out, "const {name}: bool = {v};"),
        KernelConst::U32(v) => writeln!(out, "const {name}: u32 = {v}u;"),
        KernelConst::F32(v) => {
            if !v.is_finite() {
                return Err(BackendError::Build {
                    diagnostics: format!("constant {name} is not finite ({v})"),
                });
            }
            // Debug formatting always keeps a decimal point or exponent.
            writeln!(out, "const {name}: f32 = {v:?};")
        }
    };
    written.map_err(|e| BackendError::Build {
        diagnostics: e.to_string(),
    })
}

/// Full WGSL module for `params`.
pub fn generate_kernel_source(params: &KernelBuildParams) -> Result<String, BackendError> {
    if params.lambda_pixel == 0 || params.x_pixel == 0 || params.y_pixel == 0 {
        return Err(BackendError::Build {
            diagnostics: "pixel and wavelength counts must be non-zero".to_string(),
        });
    }
    if params.grid_counts.contains(&0) {
        return Err(BackendError::Build {
            diagnostics: "grid counts must be non-zero".to_string(),
        });
    }

    let mut source = String::with_capacity(8 * 1024);
    source.push_str("// generated constants\n");
    for (name, value) in params.constants() {
        wgsl_const(&mut source, name, value)?;
    }
    source.push('\n');
    source.push_str(COMMON_WGSL);
    source.push('\n');
    source.push_str(params.mode.body());
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use regrid::Bounds;

    fn params(mode: DisplayMode) -> KernelBuildParams {
        let bounds = Bounds::new(Vec3::ZERO, Vec3::new(9.0, 4.0, 0.0));
        let dims = GridDims::new(10, 5, 1);
        let geometry = GridGeometry::new(&bounds, dims);
        KernelBuildParams::new(mode, 2.5, (32, 16), 12, 171.073, dims, &geometry)
    }

    #[test]
    fn test_constants_follow_geometry() {
        let p = params(DisplayMode::ClassifiedByte);
        let consts = p.constants();
        let get = |name: &str| consts.iter().find(|(n, _)| *n == name).map(|(_, v)| *v);

        assert_eq!(get("GSX"), Some(KernelConst::U32(10)));
        assert_eq!(get("MINX"), Some(KernelConst::F32(-5.0)));
        assert_eq!(get("GX"), Some(KernelConst::F32(1.0)));
        assert_eq!(get("MAXZ"), Some(KernelConst::F32(0.5)));
        assert_eq!(get("OX"), Some(KernelConst::F32(16.0)));
        assert_eq!(get("ALL_INTENSITIES"), Some(KernelConst::Bool(false)));
    }

    #[test]
    fn test_source_contains_prelude_and_body() {
        let src = generate_kernel_source(&params(DisplayMode::AllIntensitiesFloat)).unwrap();
        assert!(src.contains("const ALL_INTENSITIES: bool = true;"));
        assert!(src.contains("const LAMBDA_PIXEL: u32 = 12u;"));
        assert!(src.contains("const MINX: f32 = -5.0;"));
        assert!(src.contains(&format!("fn {ENTRY_POINT}")));

        let bytes = generate_kernel_source(&params(DisplayMode::IntegratedIntensityByte)).unwrap();
        assert!(bytes.contains("const INTEGRATED_INTENSITY: bool = true;"));
        assert_ne!(src, bytes);
    }

    #[test]
    fn test_non_finite_constant_is_rejected() {
        let mut p = params(DisplayMode::ClassifiedByte);
        p.max_intensity = f32::NAN;
        let err = generate_kernel_source(&p).unwrap_err();
        assert!(matches!(err, BackendError::Build { ref diagnostics } if diagnostics.contains("MAX_INTENSITY")));
    }

    #[test]
    fn test_zero_counts_are_rejected() {
        let mut p = params(DisplayMode::ClassifiedByte);
        p.lambda_pixel = 0;
        assert!(generate_kernel_source(&p).is_err());
    }
}

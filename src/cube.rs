//! Rendered cubes and their on-disk formats.
//!
//! A cube holds one intensity per (y, x, wavelength) sample together with
//! the coordinates of that sample. Two formats are written:
//!
//! - text (default): a five-line header followed by `x y lambda intensity`
//!   rows. The point count is on the second line.
//! - JSON (`.json`, or `.json.gz` for gzip).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::CubeError;

/// Tag stored in every cube this renderer produces.
pub const RENDER_METHOD: &str = "GPURegularGrid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservationType {
    /// Single wavelength sample per pixel.
    Imaging,
    /// Resolved spectrum per pixel.
    Spectroscopic,
}

impl ObservationType {
    pub fn for_samples(lambda_pixel: usize) -> Self {
        if lambda_pixel == 1 {
            ObservationType::Imaging
        } else {
            ObservationType::Spectroscopic
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubeResolution {
    pub x_pixel: usize,
    pub y_pixel: usize,
    /// Depth of the regular grid the cube was rendered from.
    pub z_pixel: usize,
    pub lambda_pixel: usize,
    /// Wavelength window width in m/s.
    pub lambda_width: f32,
}

/// One rendered view.
///
/// All per-sample vectors share the flattened `(y, x, lambda)` index.
/// `lambda` is absent for single-sample (imaging) cubes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderCube {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda: Option<Vec<f32>>,
    pub intensity: Vec<f32>,
    pub resolution: CubeResolution,
    pub observation: ObservationType,
    /// Viewing angles in radians.
    pub l: f32,
    pub b: f32,
    pub render_method: String,
    /// Rest wavelength in Angstrom.
    pub lambda0: f64,
}

impl RenderCube {
    pub fn len(&self) -> usize {
        self.intensity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intensity.is_empty()
    }

    /// Write as JSON when the name ends in `.json`/`.json.gz`, text otherwise.
    pub fn write(&self, path: &Path) -> Result<(), CubeError> {
        let name = path.to_string_lossy();
        if name.ends_with(".json") || name.ends_with(".json.gz") {
            self.write_json(path)
        } else {
            self.write_text(path)
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<(), CubeError> {
        let io_err = |source| CubeError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;

        let is_gzip = path.extension().map(|ext| ext == "gz").unwrap_or(false);
        let encode_err = |source| CubeError::Encode {
            path: path.to_path_buf(),
            source,
        };
        if is_gzip {
            let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
            serde_json::to_writer(&mut encoder, self).map_err(encode_err)?;
            encoder.finish().map_err(io_err)?.flush().map_err(io_err)
        } else {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, self).map_err(encode_err)?;
            writer.flush().map_err(io_err)
        }
    }

    pub fn write_text(&self, path: &Path) -> Result<(), CubeError> {
        let io_err = |source| CubeError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;
        let mut w = BufWriter::new(file);
        self.write_text_to(&mut w).map_err(io_err)?;
        w.flush().map_err(io_err)
    }

    fn write_text_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        let r = &self.resolution;
        writeln!(w, "{}", self.render_method)?;
        writeln!(w, "{}", self.len())?;
        writeln!(
            w,
            "{} {} {} {} {}",
            r.x_pixel, r.y_pixel, r.z_pixel, r.lambda_pixel, r.lambda_width
        )?;
        writeln!(w, "{} {} {:?} {}", self.l, self.b, self.observation, self.lambda0)?;
        writeln!(w, "x y lambda intensity")?;
        for i in 0..self.len() {
            let lambda = match &self.lambda {
                Some(axis) => axis[i] as f64,
                None => self.lambda0,
            };
            writeln!(w, "{} {} {} {}", self.x[i], self.y[i], lambda, self.intensity[i])?;
        }
        Ok(())
    }
}

/// File name for the cube rendered at `(l, b)` radians: `{prefix}lLLLbBBB.txt`
/// with angles rounded to whole degrees.
pub fn angle_file_name(prefix: &str, l: f64, b: f64) -> String {
    let deg = |a: f64| a.to_degrees().round() as i64;
    format!("{prefix}l{:03}b{:03}.txt", deg(l), deg(b))
}

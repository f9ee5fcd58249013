//! Scattered simulation samples and their line variables.
//!
//! A dataset is a column store: one coordinate column per spatial axis and
//! one column per physical variable, all indexed by sample id. Files are JSON,
//! gzipped when the name ends in `.gz`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;
use regrid::{Bounds, LineVariables};

/// Rest wavelength of the Fe IX 171 line, in Angstrom.
pub const DEFAULT_LAMBDA0: f64 = 171.073;

/// Scattered samples with the five line variables per sample.
///
/// `z` and `vz` may be empty for 2-D input; [`PhysicalData::prepare`] fills
/// them with zeros.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalData {
    /// Spatial dimension of the simulation (2 or 3).
    pub dim: usize,
    /// Rest wavelength in Angstrom.
    pub lambda0: f64,
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    #[serde(default)]
    pub z: Vec<f32>,
    /// Peak line emission per sample.
    pub peak: Vec<f32>,
    /// Line width (FWHM, Angstrom) per sample.
    pub fwhm: Vec<f32>,
    pub vx: Vec<f32>,
    pub vy: Vec<f32>,
    #[serde(default)]
    pub vz: Vec<f32>,
}

impl PhysicalData {
    /// Load a dataset from `.json` or `.json.gz`.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let file = File::open(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_gzip = path.extension().map(|ext| ext == "gz").unwrap_or(false);
        let reader: Box<dyn Read> = if is_gzip {
            Box::new(GzDecoder::new(BufReader::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        let mut data: PhysicalData =
            serde_json::from_reader(reader).map_err(|source| DatasetError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        data.prepare()?;
        Ok(data)
    }

    /// Write the dataset as `.json` or `.json.gz`.
    pub fn save(&self, path: &Path) -> Result<(), DatasetError> {
        let io_err = |source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        };
        let encode_err = |source| DatasetError::Parse {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;

        let is_gzip = path.extension().map(|ext| ext == "gz").unwrap_or(false);
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

    /// Fill optional 2-D columns and check that every column has one value
    /// per sample.
    pub fn prepare(&mut self) -> Result<(), DatasetError> {
        if self.dim != 2 && self.dim != 3 {
            return Err(DatasetError::Dimension(self.dim));
        }
        let n = self.x.len();
        if self.dim == 2 {
            if self.z.is_empty() {
                self.z = vec![0.0; n];
            }
            if self.vz.is_empty() {
                self.vz = vec![0.0; n];
            }
        }
        let columns: [(&str, usize); 8] = [
            ("y", self.y.len()),
            ("z", self.z.len()),
            ("peak", self.peak.len()),
            ("fwhm", self.fwhm.len()),
            ("vx", self.vx.len()),
            ("vy", self.vy.len()),
            ("vz", self.vz.len()),
            ("x", n),
        ];
        for (name, actual) in columns {
            if actual != n {
                return Err(DatasetError::ColumnLength {
                    name: name.to_string(),
                    expected: n,
                    actual,
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn position(&self, i: usize) -> Vec3 {
        Vec3::new(self.x[i], self.y[i], self.z.get(i).copied().unwrap_or(0.0))
    }

    pub fn positions(&self) -> Vec<Vec3> {
        (0..self.len()).map(|i| self.position(i)).collect()
    }

    /// Bounds of the sample positions; 2-D data gets a flat z range at 0.
    pub fn bounds(&self) -> Bounds {
        Bounds::from_points((0..self.len()).map(|i| self.position(i)))
            .unwrap_or_else(|| Bounds::new(Vec3::ZERO, Vec3::ZERO))
    }

    pub fn line_variables(&self) -> LineVariables<'_> {
        LineVariables::new(&self.peak, &self.fwhm, [&self.vx, &self.vy, &self.vz])
    }

    /// Seeded synthetic coronal loop for demos and tests.
    ///
    /// Samples are scattered through a `10 x 10 x 4` Mm box. Emission peaks
    /// along a tube through the box centre, and the plasma flows along the
    /// tube axis with a sign flip at the midpoint.
    pub fn synthetic(n: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let extent = Vec3::new(10.0, 10.0, 4.0);
        let centre = extent * 0.5;
        let tube_radius = 1.5f32;

        let mut data = PhysicalData {
            dim: 3,
            lambda0: DEFAULT_LAMBDA0,
            x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            z: Vec::with_capacity(n),
            peak: Vec::with_capacity(n),
            fwhm: Vec::with_capacity(n),
            vx: Vec::with_capacity(n),
            vy: Vec::with_capacity(n),
            vz: Vec::with_capacity(n),
        };

        for _ in 0..n {
            let p = Vec3::new(
                rng.gen_range(0.0..extent.x),
                rng.gen_range(0.0..extent.y),
                rng.gen_range(0.0..extent.z),
            );
            // Tube runs along x.
            let r2 = (p.y - centre.y).powi(2) + (p.z - centre.z).powi(2);
            let emission = (-r2 / (tube_radius * tube_radius)).exp();
            let flow = if p.x < centre.x { 4.0e4 } else { -4.0e4 };

            data.x.push(p.x);
            data.y.push(p.y);
            data.z.push(p.z);
            data.peak.push(1e-8 * emission);
            data.fwhm.push(0.02 + 0.01 * rng.gen::<f32>());
            data.vx.push(flow * emission);
            data.vy.push(rng.gen_range(-2.0e3..2.0e3));
            data.vz.push(rng.gen_range(-2.0e3..2.0e3));
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_is_seeded() {
        let a = PhysicalData::synthetic(64, 7);
        let b = PhysicalData::synthetic(64, 7);
        let c = PhysicalData::synthetic(64, 8);
        assert_eq!(a.x, b.x);
        assert_eq!(a.peak, b.peak);
        assert_ne!(a.x, c.x);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_prepare_fills_planar_columns() {
        let mut data = PhysicalData {
            dim: 2,
            lambda0: DEFAULT_LAMBDA0,
            x: vec![0.0, 1.0],
            y: vec![0.0, 2.0],
            z: Vec::new(),
            peak: vec![1.0, 1.0],
            fwhm: vec![0.1, 0.1],
            vx: vec![0.0, 0.0],
            vy: vec![0.0, 0.0],
            vz: Vec::new(),
        };
        data.prepare().unwrap();
        assert_eq!(data.z, vec![0.0, 0.0]);
        assert_eq!(data.vz, vec![0.0, 0.0]);
        assert_eq!(data.bounds().max, Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_prepare_rejects_ragged_columns() {
        let mut data = PhysicalData::synthetic(4, 1);
        data.fwhm.pop();
        let err = data.prepare().unwrap_err();
        assert!(matches!(err, DatasetError::ColumnLength { ref name, .. } if name == "fwhm"));

        let mut data = PhysicalData::synthetic(4, 1);
        data.dim = 4;
        assert!(matches!(data.prepare(), Err(DatasetError::Dimension(4))));
    }

    #[test]
    fn test_save_and_load_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.json.gz");
        let data = PhysicalData::synthetic(32, 3);
        data.save(&path).unwrap();

        let loaded = PhysicalData::load(&path).unwrap();
        assert_eq!(loaded.len(), 32);
        assert_eq!(loaded.peak, data.peak);
        assert_eq!(loaded.vz, data.vz);
    }
}

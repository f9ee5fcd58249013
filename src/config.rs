//! Batch sweep configuration.

use serde::{Deserialize, Serialize};

use regrid::Bounds;

/// Pixels per kernel submission in the ping-pong loop.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Settings for a multi-angle sweep.
///
/// Angles are in radians. Missing JSON fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub x_pixel: usize,
    pub y_pixel: usize,
    /// Grid depth along z.
    pub z_pixel: usize,
    pub lambda_pixel: usize,
    /// Wavelength window in m/s.
    pub lambda_width: f32,
    /// Per-axis search half-widths; derived from the pixel pitch when unset.
    pub max_distance: Option<[f32; 3]>,
    pub max_intensity: f32,
    pub chunk_size: usize,
    pub l: Vec<f64>,
    pub b: Vec<f64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            x_pixel: 128,
            y_pixel: 128,
            z_pixel: 64,
            lambda_pixel: 30,
            lambda_width: 2.0e5,
            max_distance: None,
            max_intensity: 1.0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            l: vec![0.0],
            b: vec![0.0],
        }
    }
}

impl SweepConfig {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Search half-widths to use for `bounds`.
    pub fn search_radius(&self, bounds: &Bounds) -> [f32; 3] {
        self.max_distance.unwrap_or_else(|| {
            let d = default_max_distance(bounds, self.x_pixel, self.y_pixel);
            [d; 3]
        })
    }

    /// Every `(l, b)` pair in sweep order (l outer, b inner).
    pub fn angles(&self) -> Vec<(f64, f64)> {
        self.l
            .iter()
            .flat_map(|&l| self.b.iter().map(move |&b| (l, b)))
            .collect()
    }
}

/// Search radius wide enough that neighbouring rays share samples:
/// `2 * max(dx / (nx - 1), dy / (ny - 1)) / 0.3`.
pub fn default_max_distance(bounds: &Bounds, x_pixel: usize, y_pixel: usize) -> f32 {
    let extent = bounds.extent();
    let pitch_x = extent.x / x_pixel.saturating_sub(1).max(1) as f32;
    let pitch_y = extent.y / y_pixel.saturating_sub(1).max(1) as f32;
    2.0 * pitch_x.max(pitch_y) / 0.3
}

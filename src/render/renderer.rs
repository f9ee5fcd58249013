//! The renderer: scattered data in, images and cubes out.
//!
//! A [`Renderer`] owns the physical data, its spatial index and a compute
//! backend. It moves through three states:
//!
//! ```text
//! Empty --construct_regular_grid--> GridReady --set_rendering_settings--> SettingsReady
//!   ^                                   ^                                      |
//!   +--- (backend failure) -------------+-------- construct_regular_grid ------+
//! ```
//!
//! Calling an operation before its prerequisite logs a warning and returns
//! [`RenderError::InvalidState`] without touching anything.

use std::path::Path;

use glam::{Vec2, Vec3};

use regrid::{resample, Bounds, EmissivityCalibration, GridDims, GridGeometry, SpatialIndex};

use super::backend::{BufferShape, ComputeBackend, FrameSink};
use super::camera::{View, ViewBasis};
use super::kernel::{DisplayMode, KernelBuildParams, BYTES_PER_PIXEL};
use super::pipeline::render_frame;
use super::uniform::FrameParameters;
use crate::config::{SweepConfig, DEFAULT_CHUNK_SIZE};
use crate::cube::{angle_file_name, CubeResolution, ObservationType, RenderCube, RENDER_METHOD};
use crate::dataset::PhysicalData;
use crate::error::RenderError;
use crate::util::Reporter;

/// Speed of light in m/s.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Frame and kernel settings for [`Renderer::set_rendering_settings`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderSettings {
    pub x_pixel: usize,
    pub y_pixel: usize,
    pub lambda_pixel: usize,
    /// Wavelength window in m/s around the rest wavelength.
    pub lambda_width: f32,
    pub mode: DisplayMode,
    /// Intensity mapped to full brightness in the byte modes.
    pub max_intensity: f32,
    pub chunk_size: usize,
}

impl RenderSettings {
    pub fn new(
        x_pixel: usize,
        y_pixel: usize,
        lambda_pixel: usize,
        lambda_width: f32,
        mode: DisplayMode,
    ) -> Self {
        Self {
            x_pixel,
            y_pixel,
            lambda_pixel,
            lambda_width,
            mode,
            max_intensity: 1.0,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn total_pixels(&self) -> usize {
        self.x_pixel * self.y_pixel
    }

    fn validate(&self) -> Result<(), RenderError> {
        if self.x_pixel == 0 || self.y_pixel == 0 || self.lambda_pixel == 0 {
            return Err(RenderError::InvalidSettings(format!(
                "pixel counts must be positive, got {}x{}x{}",
                self.x_pixel, self.y_pixel, self.lambda_pixel
            )));
        }
        if self.chunk_size == 0 {
            return Err(RenderError::InvalidChunkSize);
        }
        if !self.lambda_width.is_finite() || self.lambda_width < 0.0 {
            return Err(RenderError::InvalidSettings(format!(
                "wavelength window must be finite and non-negative, got {}",
                self.lambda_width
            )));
        }
        if !(self.max_intensity.is_finite() && self.max_intensity > 0.0) {
            return Err(RenderError::InvalidSettings(format!(
                "max intensity must be positive, got {}",
                self.max_intensity
            )));
        }
        Ok(())
    }
}

/// Externally visible renderer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RendererState {
    Empty,
    GridReady,
    SettingsReady,
}

impl RendererState {
    fn describe(self) -> &'static str {
        match self {
            RendererState::Empty => "no regular grid has been constructed",
            RendererState::GridReady => "no rendering settings are set",
            RendererState::SettingsReady => "rendering settings are set",
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct GridInfo {
    dims: GridDims,
    geometry: GridGeometry,
    hits: usize,
}

#[derive(Clone, Copy, Debug)]
struct FrameSetup {
    settings: RenderSettings,
    /// Mode the currently built kernel was compiled for.
    mode: DisplayMode,
}

enum Stage {
    Empty,
    GridReady(GridInfo),
    SettingsReady(GridInfo, FrameSetup),
}

/// Wavelength offsets (Angstrom) sampled across a `width` m/s window.
///
/// Sample `i` of `n` is `i/(n-1) * w - w/2` with `w = width * lambda0 / c`;
/// a single sample sits at 0.
pub fn wavelength_samples(n: usize, width: f32, lambda0: f64) -> Vec<f32> {
    if n <= 1 {
        return vec![0.0; n];
    }
    let w = width as f64 * lambda0 / SPEED_OF_LIGHT;
    (0..n)
        .map(|i| (i as f64 / (n - 1) as f64 * w - w / 2.0) as f32)
        .collect()
}

pub struct Renderer<B: ComputeBackend> {
    data: PhysicalData,
    index: SpatialIndex,
    bounds: Bounds,
    backend: B,
    reporter: Reporter,
    calibration: EmissivityCalibration,
    stage: Stage,
}

impl<B: ComputeBackend> Renderer<B> {
    /// Index `data` for resampling. `data` must already be validated.
    pub fn new(data: PhysicalData, backend: B, reporter: Reporter) -> Self {
        let (index, bounds) = {
            let _t = reporter.info("Building spatial index");
            (SpatialIndex::from_positions(&data.positions()), data.bounds())
        };
        Self {
            data,
            index,
            bounds,
            backend,
            reporter,
            calibration: EmissivityCalibration::default(),
            stage: Stage::Empty,
        }
    }

    pub fn with_calibration(mut self, calibration: EmissivityCalibration) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn state(&self) -> RendererState {
        match self.stage {
            Stage::Empty => RendererState::Empty,
            Stage::GridReady(_) => RendererState::GridReady,
            Stage::SettingsReady(..) => RendererState::SettingsReady,
        }
    }

    /// Bounds of the input samples.
    pub fn read_bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn data(&self) -> &PhysicalData {
        &self.data
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Mode of the currently built kernel, if any.
    pub fn display_mode(&self) -> Option<DisplayMode> {
        match &self.stage {
            Stage::SettingsReady(_, setup) => Some(setup.mode),
            _ => None,
        }
    }

    /// Cells that found a sample during the last grid construction.
    pub fn grid_hits(&self) -> Option<usize> {
        match &self.stage {
            Stage::Empty => None,
            Stage::GridReady(grid) | Stage::SettingsReady(grid, _) => Some(grid.hits),
        }
    }

    fn reject(&self, operation: &'static str) -> RenderError {
        let state = self.state().describe();
        log::warn!("Cannot {operation} while {state}; ignoring");
        RenderError::InvalidState { operation, state }
    }

    /// Resample the data onto a `dims` grid and upload it.
    ///
    /// Any previous settings are dropped; call
    /// [`set_rendering_settings`](Self::set_rendering_settings) again.
    pub fn construct_regular_grid(
        &mut self,
        dims: GridDims,
        max_distance: Vec3,
    ) -> Result<(), RenderError> {
        let _t = self.reporter.info("Constructing regular grid");

        let grid = resample(
            &self.index,
            &self.data.line_variables(),
            self.bounds,
            dims,
            max_distance,
            self.calibration,
        )?;
        self.reporter.progress(format_args!(
            "Found matching data point within range for {} out of {} grid cells",
            grid.hits,
            grid.cell_count()
        ));
        if GridGeometry::is_planar(&self.bounds, dims) {
            self.reporter.progress(format_args!(
                "Assuming 2-D input: grid thickness set to {}",
                grid.geometry.size.z
            ));
        }

        self.stage = Stage::Empty;
        self.backend.upload_grid(&grid)?;
        self.stage = Stage::GridReady(GridInfo {
            dims: grid.dims,
            geometry: grid.geometry,
            hits: grid.hits,
        });
        Ok(())
    }

    /// Size the frame buffers, upload wavelengths and build the kernel.
    pub fn set_rendering_settings(&mut self, settings: RenderSettings) -> Result<(), RenderError> {
        let grid = match self.stage {
            Stage::Empty => return Err(self.reject("set rendering settings")),
            Stage::GridReady(grid) | Stage::SettingsReady(grid, _) => grid,
        };
        if let Err(err) = settings.validate() {
            log::warn!("Rejecting rendering settings: {err}");
            return Err(err);
        }

        let _t = self.reporter.debug("Applying rendering settings");
        self.stage = Stage::GridReady(grid);

        self.backend.allocate(BufferShape {
            chunk_pixels: settings.chunk_size.min(settings.total_pixels()),
            lambda_pixel: settings.lambda_pixel,
        })?;
        let wavelengths =
            wavelength_samples(settings.lambda_pixel, settings.lambda_width, self.data.lambda0);
        self.backend.write_wavelengths(&wavelengths)?;
        self.build_kernel(&grid, &settings, settings.mode)?;

        self.stage = Stage::SettingsReady(
            grid,
            FrameSetup {
                settings,
                mode: settings.mode,
            },
        );
        Ok(())
    }

    fn build_kernel(
        &mut self,
        grid: &GridInfo,
        settings: &RenderSettings,
        mode: DisplayMode,
    ) -> Result<(), RenderError> {
        let _t = self.reporter.debug("Building kernel");
        let params = KernelBuildParams::new(
            mode,
            settings.max_intensity,
            (settings.x_pixel, settings.y_pixel),
            settings.lambda_pixel,
            self.data.lambda0,
            grid.dims,
            &grid.geometry,
        );
        self.backend.build(&params)?;
        Ok(())
    }

    /// Rebuild the kernel for `mode`, keeping buffers and settings.
    fn switch_mode(
        &mut self,
        grid: &GridInfo,
        settings: &RenderSettings,
        mode: DisplayMode,
    ) -> Result<(), RenderError> {
        if let Err(err) = self.build_kernel(grid, settings, mode) {
            self.stage = Stage::GridReady(*grid);
            return Err(err);
        }
        if let Stage::SettingsReady(_, setup) = &mut self.stage {
            setup.mode = mode;
        }
        Ok(())
    }

    fn ready(&self, operation: &'static str) -> Result<(GridInfo, FrameSetup), RenderError> {
        match self.stage {
            Stage::SettingsReady(grid, setup) => Ok((grid, setup)),
            _ => Err(self.reject(operation)),
        }
    }

    fn frame_parameters(&self, grid: &GridInfo, settings: &RenderSettings, view: &View) -> FrameParameters {
        let basis = ViewBasis::new(view.l, view.b);
        let pixel_size = Vec2::new(
            view.width / settings.x_pixel as f32,
            view.height / settings.y_pixel as f32,
        );
        FrameParameters::new(&basis, pixel_size, basis.plane_offset(grid.geometry.mid))
    }

    /// Render one packed RGBA8 word per pixel, rows of `x_pixel` words.
    ///
    /// Only valid in the byte modes.
    pub fn render_to_buffer(&mut self, view: &View) -> Result<Vec<u8>, RenderError> {
        let (grid, setup) = self.ready("render to buffer")?;
        if !setup.mode.is_byte_mode() {
            let operation = "render to buffer";
            let state = "the full-spectrum display mode is active";
            log::warn!("Cannot {operation} while {state}; ignoring");
            return Err(RenderError::InvalidState { operation, state });
        }

        let settings = setup.settings;
        let params = self.frame_parameters(&grid, &settings, view);
        let total = settings.total_pixels();
        let mut out = vec![0u8; total * BYTES_PER_PIXEL];

        let _t = self.reporter.debug("Rendering frame");
        render_frame(
            &mut self.backend,
            &params,
            total,
            settings.chunk_size,
            &mut FrameSink::Bytes(&mut out),
        )?;
        Ok(out)
    }

    /// Render the full spectrum per pixel and assemble a cube.
    ///
    /// The kernel is switched to the spectrum mode for the duration of the
    /// call and switched back afterwards, also when rendering fails. The cube
    /// is written to `output` when given.
    pub fn render_to_cube(
        &mut self,
        view: &View,
        output: Option<&Path>,
    ) -> Result<RenderCube, RenderError> {
        let (grid, setup) = self.ready("render to cube")?;
        let previous = setup.mode;
        let spectrum = DisplayMode::AllIntensitiesFloat;

        if previous != spectrum {
            self.switch_mode(&grid, &setup.settings, spectrum)?;
        }
        let rendered = self.render_spectra(&grid, &setup.settings, view);
        let restored = if previous != spectrum {
            self.switch_mode(&grid, &setup.settings, previous)
        } else {
            Ok(())
        };
        let cube = rendered?;
        restored?;

        if let Some(path) = output {
            let _t = self.reporter.info("Writing cube");
            cube.write(path)?;
        }
        Ok(cube)
    }

    fn render_spectra(
        &mut self,
        grid: &GridInfo,
        settings: &RenderSettings,
        view: &View,
    ) -> Result<RenderCube, RenderError> {
        let params = self.frame_parameters(grid, settings, view);
        let total = settings.total_pixels();
        let lambda_pixel = settings.lambda_pixel;
        let mut intensity = vec![0.0f32; total * lambda_pixel];

        {
            let _t = self.reporter.info("Rendering frame");
            render_frame(
                &mut self.backend,
                &params,
                total,
                settings.chunk_size,
                &mut FrameSink::Floats {
                    data: &mut intensity,
                    per_pixel: lambda_pixel,
                },
            )?;
        }

        let offset = Vec2::new(params.x_offset, params.y_offset);
        let pixel_size = Vec2::new(params.pixel_width, params.pixel_height);
        let samples =
            wavelength_samples(lambda_pixel, settings.lambda_width, self.data.lambda0);
        Ok(assemble_cube(
            intensity,
            settings,
            grid.dims.nz,
            view,
            pixel_size,
            offset,
            &samples,
            self.data.lambda0,
        ))
    }
}

#[allow(clippy::too_many_arguments)]
fn assemble_cube(
    intensity: Vec<f32>,
    settings: &RenderSettings,
    z_pixel: usize,
    view: &View,
    pixel_size: Vec2,
    offset: Vec2,
    samples: &[f32],
    lambda0: f64,
) -> RenderCube {
    let (xp, yp, lp) = (settings.x_pixel, settings.y_pixel, settings.lambda_pixel);
    let ox = xp as f32 / 2.0;
    let oy = yp as f32 / 2.0;
    let xs: Vec<f32> = (0..xp)
        .map(|x| (x as f32 + 0.5 - ox) * pixel_size.x + offset.x)
        .collect();
    let ys: Vec<f32> = (0..yp)
        .map(|y| (y as f32 + 0.5 - oy) * pixel_size.y + offset.y)
        .collect();
    let lambdas: Vec<f32> = samples.iter().map(|&s| (lambda0 + s as f64) as f32).collect();

    let len = xp * yp * lp;
    let mut x = Vec::with_capacity(len);
    let mut y = Vec::with_capacity(len);
    let mut lambda = Vec::with_capacity(if lp > 1 { len } else { 0 });
    for &py in &ys {
        for &px in &xs {
            x.extend(std::iter::repeat(px).take(lp));
            y.extend(std::iter::repeat(py).take(lp));
            if lp > 1 {
                lambda.extend_from_slice(&lambdas);
            }
        }
    }

    RenderCube {
        x,
        y,
        lambda: (lp > 1).then_some(lambda),
        intensity,
        resolution: CubeResolution {
            x_pixel: xp,
            y_pixel: yp,
            z_pixel,
            lambda_pixel: lp,
            lambda_width: settings.lambda_width,
        },
        observation: ObservationType::for_samples(lp),
        l: view.l,
        b: view.b,
        render_method: RENDER_METHOD.to_string(),
        lambda0,
    }
}

/// Render every `(l, b)` pair of `config` as a full-spectrum cube.
///
/// The grid has `x_pixel x y_pixel x z_pixel` cells and the view covers the
/// data's x/y extent. With `output_prefix`, each cube is written to
/// `{prefix}lLLLbBBB.txt`. Only the last cube is returned; `None` when the
/// angle lists are empty.
pub fn render_with_gpu_regular_grid<B: ComputeBackend>(
    data: PhysicalData,
    backend: B,
    config: &SweepConfig,
    output_prefix: Option<&str>,
    reporter: Reporter,
) -> Result<Option<RenderCube>, RenderError> {
    let _t = reporter.info("Sweep");
    let mut renderer = Renderer::new(data, backend, reporter);
    let bounds = renderer.read_bounds();

    let radius = config.search_radius(&bounds);
    reporter.progress(format_args!(
        "Maximum distance to interpolated point set to {:?}",
        radius
    ));
    renderer.construct_regular_grid(
        GridDims::new(config.x_pixel, config.y_pixel, config.z_pixel),
        Vec3::from_array(radius),
    )?;

    let settings = RenderSettings {
        max_intensity: config.max_intensity,
        chunk_size: config.chunk_size,
        ..RenderSettings::new(
            config.x_pixel,
            config.y_pixel,
            config.lambda_pixel,
            config.lambda_width,
            DisplayMode::AllIntensitiesFloat,
        )
    };
    renderer.set_rendering_settings(settings)?;

    let extent = bounds.extent();
    let angles = config.angles();
    let mut last = None;
    for (frame, &(l, b)) in angles.iter().enumerate() {
        reporter.progress(format_args!(
            "Rendering frame {} of {} (l = {:.1} deg, b = {:.1} deg)",
            frame + 1,
            angles.len(),
            l.to_degrees(),
            b.to_degrees()
        ));
        let view = View::new(l as f32, b as f32, extent.x, extent.y);
        let path = output_prefix.map(|prefix| angle_file_name(prefix, l, b));
        last = Some(renderer.render_to_cube(&view, path.as_deref().map(Path::new))?);
    }
    Ok(last)
}

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use spectral_regrid::{render_with_gpu_regular_grid, PhysicalData, Reporter, SweepConfig, WgpuBackend};

/// Render synthetic spectral-line cubes from scattered simulation samples.
#[derive(Parser, Debug)]
#[command(name = "spectral-regrid", version, about)]
struct Cli {
    /// Input samples (.json or .json.gz)
    #[arg(long, value_name = "FILE", conflicts_with = "synthetic")]
    input: Option<PathBuf>,

    /// Generate N synthetic samples instead of reading a file
    #[arg(long, value_name = "N")]
    synthetic: Option<usize>,

    /// Seed for synthetic samples
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Sweep configuration (JSON). Flags below override its fields.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Regular grid size; x and y also set the image size
    #[arg(long, num_args = 3, value_names = ["NX", "NY", "NZ"])]
    grid: Option<Vec<usize>>,

    /// Image size, overriding the grid's x and y
    #[arg(long, num_args = 2, value_names = ["X", "Y"])]
    pixels: Option<Vec<usize>>,

    /// Wavelength samples per pixel
    #[arg(long)]
    lambda_pixels: Option<usize>,

    /// Wavelength window width in m/s
    #[arg(long)]
    lambda_width: Option<f32>,

    #[arg(long)]
    max_intensity: Option<f32>,

    /// Pixels per kernel submission
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Longitudes in degrees, comma separated
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    l: Vec<f64>,

    /// Latitudes in degrees, comma separated
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    b: Vec<f64>,

    /// Output prefix; each view is written to PREFIXlLLLbBBB.txt
    #[arg(long, value_name = "PREFIX")]
    output: Option<String>,

    /// Do not report progress
    #[arg(long)]
    quiet: bool,
}

impl Cli {
    fn sweep_config(&self) -> Result<SweepConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                SweepConfig::from_json(&text)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => SweepConfig::default(),
        };

        if let Some(grid) = &self.grid {
            config.x_pixel = grid[0];
            config.y_pixel = grid[1];
            config.z_pixel = grid[2];
        }
        if let Some(pixels) = &self.pixels {
            config.x_pixel = pixels[0];
            config.y_pixel = pixels[1];
        }
        if let Some(n) = self.lambda_pixels {
            config.lambda_pixel = n;
        }
        if let Some(width) = self.lambda_width {
            config.lambda_width = width;
        }
        if let Some(max) = self.max_intensity {
            config.max_intensity = max;
        }
        if let Some(chunk) = self.chunk_size {
            config.chunk_size = chunk;
        }
        if !self.l.is_empty() {
            config.l = self.l.iter().map(|d| d.to_radians()).collect();
        }
        if !self.b.is_empty() {
            config.b = self.b.iter().map(|d| d.to_radians()).collect();
        }
        Ok(config)
    }

    fn dataset(&self) -> Result<PhysicalData> {
        match (&self.input, self.synthetic) {
            (Some(path), _) => {
                PhysicalData::load(path).with_context(|| format!("loading {}", path.display()))
            }
            (None, Some(n)) => Ok(PhysicalData::synthetic(n, self.seed)),
            (None, None) => bail!("either --input or --synthetic is required"),
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let reporter = Reporter::new(!cli.quiet);
    let config = cli.sweep_config()?;
    let data = cli.dataset()?;
    reporter.progress(format_args!(
        "Loaded {} samples ({}-D), rendering {} view(s)",
        data.len(),
        data.dim,
        config.angles().len()
    ));

    let backend = WgpuBackend::new().context("initializing compute device")?;
    reporter.progress(format_args!("Using adapter {}", backend.adapter_name()));

    let last = render_with_gpu_regular_grid(
        data,
        backend,
        &config,
        cli.output.as_deref(),
        reporter,
    )?;
    match last {
        Some(cube) => reporter.progress(format_args!(
            "Last cube: l = {}, b = {}, {} samples",
            cube.l,
            cube.b,
            cube.len()
        )),
        None => log::warn!("No viewing angles given, nothing rendered"),
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

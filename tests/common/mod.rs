//! A `ComputeBackend` that runs on the host and records every call.

#![allow(dead_code)]

use regrid::RegularGrid;

use spectral_regrid::error::BackendError;
use spectral_regrid::render::{
    BackendLayout, BufferShape, Chunk, ComputeBackend, FrameParameters, FrameSink,
    KernelBindings, KernelBuildParams, Lane, BYTES_PER_PIXEL,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    UploadGrid { cells: usize },
    Allocate(BufferShape),
    WriteWavelengths(Vec<f32>),
    Build(KernelBuildParams),
    WriteParameters,
    Enqueue(Lane, Chunk),
    Extract(Lane, Chunk),
}

/// Writes a known pattern instead of tracing rays.
///
/// Byte sinks get the pixel index as a little-endian `u32`; float sinks get
/// `pixel * per_pixel + k` for wavelength sample `k`.
#[derive(Default)]
pub struct RecordingBackend {
    pub calls: Vec<Call>,
    /// Last grid handed to `upload_grid`.
    pub uploaded: Option<RegularGrid>,
    cells: Option<usize>,
    shape: Option<BufferShape>,
    bindings: Option<KernelBindings>,
    pending: [Option<Chunk>; 2],
    /// Fail every `build` with this message.
    pub fail_build: Option<String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builds(&self) -> Vec<&KernelBuildParams> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Build(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn enqueues(&self) -> Vec<(Lane, Chunk)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Enqueue(lane, chunk) => Some((*lane, *chunk)),
                _ => None,
            })
            .collect()
    }

    pub fn extracts(&self) -> Vec<(Lane, Chunk)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Extract(lane, chunk) => Some((*lane, *chunk)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl ComputeBackend for RecordingBackend {
    fn upload_grid(&mut self, grid: &RegularGrid) -> Result<(), BackendError> {
        self.calls.push(Call::UploadGrid {
            cells: grid.cell_count(),
        });
        self.cells = Some(grid.cell_count());
        self.uploaded = Some(grid.clone());
        self.bindings = None;
        Ok(())
    }

    fn allocate(&mut self, shape: BufferShape) -> Result<(), BackendError> {
        self.calls.push(Call::Allocate(shape));
        self.shape = Some(shape);
        self.bindings = None;
        Ok(())
    }

    fn write_wavelengths(&mut self, samples: &[f32]) -> Result<(), BackendError> {
        self.calls.push(Call::WriteWavelengths(samples.to_vec()));
        match self.shape {
            Some(shape) if shape.lambda_pixel == samples.len() => Ok(()),
            _ => Err(BackendError::NotReady("write_wavelengths")),
        }
    }

    fn build(&mut self, params: &KernelBuildParams) -> Result<(), BackendError> {
        self.calls.push(Call::Build(params.clone()));
        if let Some(diagnostics) = &self.fail_build {
            self.bindings = None;
            return Err(BackendError::Build {
                diagnostics: diagnostics.clone(),
            });
        }
        if self.cells.is_none() || self.shape.is_none() {
            return Err(BackendError::NotReady("build"));
        }
        self.bindings = Some(KernelBindings::for_mode(params.mode));
        Ok(())
    }

    fn write_parameters(&mut self, _params: &FrameParameters) -> Result<(), BackendError> {
        self.calls.push(Call::WriteParameters);
        Ok(())
    }

    fn enqueue(&mut self, lane: Lane, chunk: Chunk) -> Result<(), BackendError> {
        self.calls.push(Call::Enqueue(lane, chunk));
        let shape = self.shape.ok_or(BackendError::NotReady("enqueue"))?;
        if self.bindings.is_none() || chunk.len > shape.chunk_pixels {
            return Err(BackendError::NotReady("enqueue"));
        }
        if self.pending[lane.index()].replace(chunk).is_some() {
            panic!("lane {lane:?} submitted twice without extraction");
        }
        Ok(())
    }

    fn extract(
        &mut self,
        lane: Lane,
        chunk: Chunk,
        sink: &mut FrameSink<'_>,
    ) -> Result<(), BackendError> {
        self.calls.push(Call::Extract(lane, chunk));
        assert_eq!(
            self.pending[lane.index()].take(),
            Some(chunk),
            "extracted a chunk that was not pending on {lane:?}"
        );

        match sink {
            FrameSink::Bytes(data) => {
                for pixel in chunk.offset..chunk.end() {
                    let at = pixel * BYTES_PER_PIXEL;
                    data[at..at + BYTES_PER_PIXEL].copy_from_slice(&(pixel as u32).to_le_bytes());
                }
            }
            FrameSink::Floats { data, per_pixel } => {
                let per_pixel = *per_pixel;
                for pixel in chunk.offset..chunk.end() {
                    for k in 0..per_pixel {
                        data[pixel * per_pixel + k] = (pixel * per_pixel + k) as f32;
                    }
                }
            }
        }
        Ok(())
    }

    fn layout(&self) -> BackendLayout {
        let cells = self.cells.unwrap_or(0) as u64;
        let (bytes, floats, wavelengths) = match self.shape {
            Some(shape) => (
                shape.byte_output_len(),
                shape.float_output_len(),
                (shape.lambda_pixel * 4) as u64,
            ),
            None => (0, 0, 0),
        };
        BackendLayout {
            cell_bytes: cells * 32,
            emissivity_bytes: cells * 4,
            wavelength_bytes: wavelengths,
            byte_output_bytes: [bytes; 2],
            float_output_bytes: [floats; 2],
            bindings: self.bindings,
        }
    }
}

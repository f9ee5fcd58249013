//! The seam between the render pipeline and a compute device.
//!
//! [`ComputeBackend`] is everything the pipeline and the renderer need from
//! a device: grid upload, per-chunk output buffers on two lanes, a kernel
//! build per display mode, and non-blocking submission with blocking
//! extraction. [`super::WgpuBackend`] is the real implementation.

use regrid::RegularGrid;

use super::kernel::{DisplayMode, KernelBuildParams, BYTES_PER_PIXEL};
use super::uniform::FrameParameters;
use crate::error::BackendError;

/// One of the two submission lanes used for ping-pong rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lane {
    A,
    B,
}

impl Lane {
    pub const BOTH: [Lane; 2] = [Lane::A, Lane::B];

    pub fn other(self) -> Lane {
        match self {
            Lane::A => Lane::B,
            Lane::B => Lane::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Lane::A => 0,
            Lane::B => 1,
        }
    }
}

/// Contiguous pixel range `[offset, offset + len)` of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub offset: usize,
    pub len: usize,
}

impl Chunk {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Host destination for a whole frame.
pub enum FrameSink<'a> {
    /// Byte modes: `BYTES_PER_PIXEL` bytes per pixel.
    Bytes(&'a mut [u8]),
    /// Spectrum mode: `per_pixel` floats per pixel.
    Floats { data: &'a mut [f32], per_pixel: usize },
}

impl FrameSink<'_> {
    /// Elements per pixel in this sink.
    pub fn stride(&self) -> usize {
        match self {
            FrameSink::Bytes(_) => BYTES_PER_PIXEL,
            FrameSink::Floats { per_pixel, .. } => *per_pixel,
        }
    }

    /// Number of elements (bytes or floats) the sink holds.
    pub fn len(&self) -> usize {
        match self {
            FrameSink::Bytes(data) => data.len(),
            FrameSink::Floats { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes backing `chunk`.
    pub fn chunk_bytes_mut(&mut self, chunk: Chunk) -> &mut [u8] {
        let stride = self.stride();
        let range = chunk.offset * stride..chunk.end() * stride;
        match self {
            FrameSink::Bytes(data) => &mut data[range],
            FrameSink::Floats { data, .. } => bytemuck::cast_slice_mut(&mut data[range]),
        }
    }
}

/// Sizes needed for the wavelength and per-lane output buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferShape {
    /// Pixels per chunk (never more than a frame).
    pub chunk_pixels: usize,
    pub lambda_pixel: usize,
}

impl BufferShape {
    pub fn byte_output_len(&self) -> u64 {
        (self.chunk_pixels * BYTES_PER_PIXEL) as u64
    }

    pub fn float_output_len(&self) -> u64 {
        (self.chunk_pixels * self.lambda_pixel * std::mem::size_of::<f32>()) as u64
    }
}

/// Which grid array feeds binding 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputBinding {
    Cells,
    Emissivity,
}

/// Which output buffer is bound at binding 3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputBinding {
    Bytes,
    Floats,
}

/// Argument bindings of a built kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelBindings {
    pub mode: DisplayMode,
    pub input: InputBinding,
    pub output: OutputBinding,
}

impl KernelBindings {
    pub fn for_mode(mode: DisplayMode) -> Self {
        let input = match mode {
            DisplayMode::IntegratedIntensityByte => InputBinding::Emissivity,
            DisplayMode::ClassifiedByte | DisplayMode::AllIntensitiesFloat => InputBinding::Cells,
        };
        let output = if mode.is_byte_mode() {
            OutputBinding::Bytes
        } else {
            OutputBinding::Floats
        };
        Self {
            mode,
            input,
            output,
        }
    }
}

/// Buffer sizes (bytes) and current bindings, for inspection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendLayout {
    pub cell_bytes: u64,
    pub emissivity_bytes: u64,
    pub wavelength_bytes: u64,
    pub byte_output_bytes: [u64; 2],
    pub float_output_bytes: [u64; 2],
    pub bindings: Option<KernelBindings>,
}

/// A compute device able to run the ray kernel in chunks on two lanes.
///
/// Call order: `upload_grid`, `allocate`, `write_wavelengths`, `build`, then
/// per frame `write_parameters` followed by `enqueue`/`extract` pairs.
/// `upload_grid` and `allocate` invalidate the built kernel.
pub trait ComputeBackend {
    fn upload_grid(&mut self, grid: &RegularGrid) -> Result<(), BackendError>;

    fn allocate(&mut self, shape: BufferShape) -> Result<(), BackendError>;

    fn write_wavelengths(&mut self, samples: &[f32]) -> Result<(), BackendError>;

    /// Compile the kernel for `params` and bind buffers for its mode.
    fn build(&mut self, params: &KernelBuildParams) -> Result<(), BackendError>;

    fn write_parameters(&mut self, params: &FrameParameters) -> Result<(), BackendError>;

    /// Submit `chunk` on `lane` without waiting.
    fn enqueue(&mut self, lane: Lane, chunk: Chunk) -> Result<(), BackendError>;

    /// Wait for `lane`'s pending chunk and copy its output into `sink`.
    fn extract(
        &mut self,
        lane: Lane,
        chunk: Chunk,
        sink: &mut FrameSink<'_>,
    ) -> Result<(), BackendError>;

    fn layout(&self) -> BackendLayout;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lanes_alternate() {
        assert_eq!(Lane::A.other(), Lane::B);
        assert_eq!(Lane::B.other().other(), Lane::B);
        assert_eq!(Lane::BOTH.map(Lane::index), [0, 1]);
    }

    #[test]
    fn test_bindings_per_mode() {
        let classified = KernelBindings::for_mode(DisplayMode::ClassifiedByte);
        assert_eq!(classified.input, InputBinding::Cells);
        assert_eq!(classified.output, OutputBinding::Bytes);

        let integrated = KernelBindings::for_mode(DisplayMode::IntegratedIntensityByte);
        assert_eq!(integrated.input, InputBinding::Emissivity);

        let spectrum = KernelBindings::for_mode(DisplayMode::AllIntensitiesFloat);
        assert_eq!(spectrum.output, OutputBinding::Floats);
    }

    #[test]
    fn test_sink_chunk_views() {
        let mut floats = vec![0.0f32; 12];
        let mut sink = FrameSink::Floats {
            data: &mut floats,
            per_pixel: 3,
        };
        let bytes = sink.chunk_bytes_mut(Chunk { offset: 2, len: 2 });
        assert_eq!(bytes.len(), 2 * 3 * 4);
        bytes[..4].copy_from_slice(&1.5f32.to_ne_bytes());
        assert_eq!(floats[6], 1.5);

        let mut raw = vec![0u8; 16];
        let mut sink = FrameSink::Bytes(&mut raw);
        assert_eq!(sink.chunk_bytes_mut(Chunk { offset: 3, len: 1 }).len(), 4);
    }
}

//! Double-buffered frame loop.
//!
//! A frame is cut into chunks of at most `chunk_size` pixels. While one lane
//! is being drained into the host sink, the next chunk is already running on
//! the other lane.

use super::backend::{Chunk, ComputeBackend, FrameSink, Lane};
use super::uniform::FrameParameters;
use crate::error::RenderError;

/// Chunks covering `[0, total)` in order, each at most `chunk_size` long.
#[derive(Clone, Debug)]
pub struct ChunkPlan {
    total: usize,
    chunk_size: usize,
    next: usize,
}

impl ChunkPlan {
    pub fn new(total: usize, chunk_size: usize) -> Result<Self, RenderError> {
        if chunk_size == 0 {
            return Err(RenderError::InvalidChunkSize);
        }
        Ok(Self {
            total,
            chunk_size,
            next: 0,
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.total.div_ceil(self.chunk_size)
    }
}

impl Iterator for ChunkPlan {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.next >= self.total {
            return None;
        }
        let len = self.chunk_size.min(self.total - self.next);
        let chunk = Chunk {
            offset: self.next,
            len,
        };
        self.next += len;
        Some(chunk)
    }
}

/// Render `total_pixels` pixels with `params` into `sink`.
///
/// The sink must hold exactly `total_pixels * sink.stride()` elements.
pub fn render_frame<B: ComputeBackend + ?Sized>(
    backend: &mut B,
    params: &FrameParameters,
    total_pixels: usize,
    chunk_size: usize,
    sink: &mut FrameSink<'_>,
) -> Result<(), RenderError> {
    let mut plan = ChunkPlan::new(total_pixels, chunk_size)?;
    let expected = total_pixels * sink.stride();
    if sink.len() != expected {
        return Err(RenderError::SinkSize {
            expected,
            actual: sink.len(),
        });
    }

    backend.write_parameters(params)?;

    let Some(first) = plan.next() else {
        return Ok(());
    };
    let mut draining = (Lane::A, first);
    backend.enqueue(Lane::A, first)?;

    for chunk in plan {
        let submitting = draining.0.other();
        backend.enqueue(submitting, chunk)?;
        backend.extract(draining.0, draining.1, sink)?;
        draining = (submitting, chunk);
    }

    backend.extract(draining.0, draining.1, sink)?;
    Ok(())
}

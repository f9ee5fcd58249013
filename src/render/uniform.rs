use encase::{ShaderType, UniformBuffer};
use glam::{Vec2, Vec3};

use super::camera::ViewBasis;
use crate::error::BackendError;

/// Per-frame view parameters (binding 2).
///
/// 64 bytes: three basis vectors padded to vec4, then four scalars.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameParameters {
    /// View-plane x axis in grid space.
    pub rx: [f32; 4],
    /// View-plane y axis in grid space.
    pub ry: [f32; 4],
    /// Line of sight in grid space.
    pub rz: [f32; 4],
    pub pixel_width: f32,
    pub pixel_height: f32,
    /// View-plane coordinates of the grid centre.
    pub x_offset: f32,
    pub y_offset: f32,
}

impl FrameParameters {
    pub fn new(basis: &ViewBasis, pixel_size: Vec2, offset: Vec2) -> Self {
        let pad = |v: Vec3| [v.x, v.y, v.z, 0.0];
        Self {
            rx: pad(basis.rx),
            ry: pad(basis.ry),
            rz: pad(basis.rz),
            pixel_width: pixel_size.x,
            pixel_height: pixel_size.y,
            x_offset: offset.x,
            y_offset: offset.y,
        }
    }
}

/// Pixel range of one submission (binding 4). One per lane.
#[derive(ShaderType, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkParams {
    pub offset: u32,
    pub count: u32,
    pub _pad0: u32,
    pub _pad1: u32,
}

impl ChunkParams {
    pub fn new(offset: usize, count: usize) -> Self {
        Self {
            offset: offset as u32,
            count: count as u32,
            _pad0: 0,
            _pad1: 0,
        }
    }

    /// Uniform-layout bytes for upload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BackendError> {
        let mut buffer = UniformBuffer::new(Vec::new());
        buffer.write(self).map_err(|e| BackendError::Encode(e.to_string()))?;
        Ok(buffer.into_inner())
    }
}

use wgpu::{util::DeviceExt, Buffer, BufferUsages, Device, Limits};

use crate::error::BackendError;

/// Fail early when a storage binding would exceed the device limits.
pub fn check_storage_size(limits: &Limits, label: &'static str, size: u64) -> Result<(), BackendError> {
    let limit = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    if size > limit {
        return Err(BackendError::Buffer {
            label,
            requested: size,
            limit,
        });
    }
    Ok(())
}

/// Create a read-only storage buffer from data.
pub fn create_storage_buffer_init<T: bytemuck::Pod>(device: &Device, data: &[T], label: &str) -> Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(data),
        usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
    })
}

/// Create a kernel output buffer that can be copied out.
pub fn create_output_buffer(device: &Device, size: u64, label: &str) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    })
}

/// Create a host-mappable buffer for reading output back.
pub fn create_readback_buffer(device: &Device, size: u64, label: &str) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Create an empty storage buffer filled later via `Queue::write_buffer`.
pub fn create_storage_buffer(device: &Device, size: u64, label: &str) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Create a uniform buffer from data.
pub fn create_uniform_buffer<T: bytemuck::Pod>(device: &Device, data: &T, label: &str) -> Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(data),
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
    })
}

/// Create a uniform buffer from already-encoded bytes.
pub fn create_uniform_buffer_bytes(device: &Device, bytes: &[u8], label: &str) -> Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytes,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
    })
}

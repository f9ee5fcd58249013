use wgpu::{
    Adapter, Backends, Device, DeviceDescriptor, Features, Instance, InstanceDescriptor, Limits,
    PowerPreference, Queue, RequestAdapterOptions,
};

use crate::error::BackendError;

/// Headless GPU context holding the device and its single queue.
pub struct GpuContext {
    pub device: Device,
    pub queue: Queue,
    pub limits: Limits,
    pub adapter_name: String,
}

impl GpuContext {
    /// Create a compute-only context on the highest-performance adapter.
    pub async fn headless() -> Result<Self, BackendError> {
        let instance = Instance::new(&InstanceDescriptor {
            backends: Backends::all(),
            ..Default::default()
        });

        if instance.enumerate_adapters(Backends::all()).is_empty() {
            return Err(BackendError::NoPlatform);
        }

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| BackendError::NoDevice(e.to_string()))?;

        Self::from_adapter(&adapter).await
    }

    async fn from_adapter(adapter: &Adapter) -> Result<Self, BackendError> {
        let info = adapter.get_info();
        // Storage binding limits bound the grid size.
        let limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("regrid_device"),
                required_features: Features::empty(),
                required_limits: limits.clone(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await
            .map_err(|e| BackendError::Context(e.to_string()))?;

        log::debug!("using adapter {} ({:?})", info.name, info.backend);

        Ok(Self {
            device,
            queue,
            limits,
            adapter_name: info.name,
        })
    }
}

//! wgpu implementation of [`ComputeBackend`].
//!
//! # Lanes
//!
//! wgpu exposes a single queue per device, so the two lanes are two sets of
//! per-chunk resources (chunk uniform, output buffers, readback buffers, bind
//! group) plus the `SubmissionIndex` of whatever the lane has in flight.
//! Overlap comes from submitting chunk `i + 1` before blocking on chunk `i`:
//! the device keeps working while the host copies the previous chunk out.

use regrid::{GridCell, RegularGrid};

use super::backend::{
    BackendLayout, BufferShape, Chunk, ComputeBackend, FrameSink, InputBinding, KernelBindings,
    Lane, OutputBinding,
};
use super::buffer::{
    check_storage_size, create_output_buffer, create_readback_buffer, create_storage_buffer,
    create_storage_buffer_init, create_uniform_buffer, create_uniform_buffer_bytes,
};
use super::context::GpuContext;
use super::kernel::{
    generate_kernel_source, KernelBuildParams, BYTES_PER_PIXEL, ENTRY_POINT, WORKGROUP_SIZE,
};
use super::uniform::{ChunkParams, FrameParameters};
use crate::error::BackendError;

struct GridBuffers {
    cells: wgpu::Buffer,
    emissivity: wgpu::Buffer,
}

struct LaneResources {
    chunk_uniform: wgpu::Buffer,
    bytes_out: wgpu::Buffer,
    floats_out: wgpu::Buffer,
    bytes_readback: wgpu::Buffer,
    floats_readback: wgpu::Buffer,
    pending: Option<(wgpu::SubmissionIndex, Chunk)>,
}

struct Kernel {
    pipeline: wgpu::ComputePipeline,
    bind_groups: [wgpu::BindGroup; 2],
    bindings: KernelBindings,
    lambda_pixel: usize,
}

/// Compute backend on a headless wgpu device.
pub struct WgpuBackend {
    ctx: GpuContext,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    frame_uniform: wgpu::Buffer,
    grid: Option<GridBuffers>,
    wavelengths: Option<wgpu::Buffer>,
    lanes: Option<[LaneResources; 2]>,
    kernel: Option<Kernel>,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl WgpuBackend {
    /// Open the default adapter and set up the mode-independent resources.
    pub fn new() -> Result<Self, BackendError> {
        let ctx = pollster::block_on(GpuContext::headless())?;
        Ok(Self::with_context(ctx))
    }

    pub fn with_context(ctx: GpuContext) -> Self {
        let device = &ctx.device;

        // Same layout for every mode: only the element types behind bindings
        // 0 and 3 change, and both stay storage buffers.
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ray_bind_group_layout"),
            entries: &[
                // Grid input: cells or emissivity
                storage_entry(0, true),
                // Wavelength samples
                storage_entry(1, true),
                // Frame parameters
                uniform_entry(2),
                // Output: packed pixels or spectra
                storage_entry(3, false),
                // Chunk range
                uniform_entry(4),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ray_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let frame_uniform = create_uniform_buffer(
            device,
            &<FrameParameters as bytemuck::Zeroable>::zeroed(),
            "frame_parameters_buffer",
        );

        Self {
            ctx,
            bind_group_layout,
            pipeline_layout,
            frame_uniform,
            grid: None,
            wavelengths: None,
            lanes: None,
            kernel: None,
        }
    }

    pub fn adapter_name(&self) -> &str {
        &self.ctx.adapter_name
    }

    fn lane_resources(&self, shape: BufferShape, lane: Lane) -> Result<LaneResources, BackendError> {
        let device = &self.ctx.device;
        let (bytes_label, floats_label) = match lane {
            Lane::A => ("bytes_out_a", "floats_out_a"),
            Lane::B => ("bytes_out_b", "floats_out_b"),
        };
        let bytes_len = shape.byte_output_len();
        let floats_len = shape.float_output_len();
        check_storage_size(&self.ctx.limits, bytes_label, bytes_len)?;
        check_storage_size(&self.ctx.limits, floats_label, floats_len)?;

        let chunk_bytes = ChunkParams::new(0, 0).to_bytes()?;
        Ok(LaneResources {
            chunk_uniform: create_uniform_buffer_bytes(device, &chunk_bytes, "chunk_params_buffer"),
            bytes_out: create_output_buffer(device, bytes_len, bytes_label),
            floats_out: create_output_buffer(device, floats_len, floats_label),
            bytes_readback: create_readback_buffer(device, bytes_len, "bytes_readback_buffer"),
            floats_readback: create_readback_buffer(device, floats_len, "floats_readback_buffer"),
            pending: None,
        })
    }

    fn compile(&self, source: String) -> Result<wgpu::ComputePipeline, BackendError> {
        let device = &self.ctx.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ray_kernel_shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("ray_kernel_pipeline"),
            layout: Some(&self.pipeline_layout),
            module: &module,
            entry_point: Some(ENTRY_POINT),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(BackendError::Build {
                diagnostics: err.to_string(),
            });
        }
        Ok(pipeline)
    }
}

impl ComputeBackend for WgpuBackend {
    fn upload_grid(&mut self, grid: &RegularGrid) -> Result<(), BackendError> {
        let cell_bytes = std::mem::size_of_val(grid.cells.as_slice()) as u64;
        let emissivity_bytes = std::mem::size_of_val(grid.emissivity.as_slice()) as u64;
        check_storage_size(&self.ctx.limits, "grid_cells", cell_bytes)?;
        check_storage_size(&self.ctx.limits, "grid_emissivity", emissivity_bytes)?;

        let device = &self.ctx.device;
        self.kernel = None;
        self.grid = Some(GridBuffers {
            cells: create_storage_buffer_init::<GridCell>(
                device,
                grid.cells.as_slice(),
                "grid_cells",
            ),
            emissivity: create_storage_buffer_init::<f32>(
                device,
                grid.emissivity.as_slice(),
                "grid_emissivity",
            ),
        });
        Ok(())
    }

    fn allocate(&mut self, shape: BufferShape) -> Result<(), BackendError> {
        let max_groups = self.ctx.limits.max_compute_workgroups_per_dimension as usize;
        if shape.chunk_pixels.div_ceil(WORKGROUP_SIZE as usize) > max_groups {
            return Err(BackendError::Buffer {
                label: "chunk_dispatch",
                requested: shape.chunk_pixels as u64,
                limit: (max_groups * WORKGROUP_SIZE as usize) as u64,
            });
        }

        let wavelength_bytes = (shape.lambda_pixel * std::mem::size_of::<f32>()) as u64;
        check_storage_size(&self.ctx.limits, "wavelengths", wavelength_bytes)?;

        let lanes = [
            self.lane_resources(shape, Lane::A)?,
            self.lane_resources(shape, Lane::B)?,
        ];
        self.kernel = None;
        self.wavelengths = Some(create_storage_buffer(
            &self.ctx.device,
            wavelength_bytes,
            "wavelengths",
        ));
        self.lanes = Some(lanes);
        Ok(())
    }

    fn write_wavelengths(&mut self, samples: &[f32]) -> Result<(), BackendError> {
        let buffer = self
            .wavelengths
            .as_ref()
            .ok_or(BackendError::NotReady("write_wavelengths"))?;
        self.ctx
            .queue
            .write_buffer(buffer, 0, bytemuck::cast_slice(samples));
        Ok(())
    }

    fn build(&mut self, params: &KernelBuildParams) -> Result<(), BackendError> {
        let (grid, wavelengths, lanes) = match (&self.grid, &self.wavelengths, &self.lanes) {
            (Some(g), Some(w), Some(l)) => (g, w, l),
            _ => return Err(BackendError::NotReady("build")),
        };

        let source = generate_kernel_source(params)?;
        log::debug!("kernel source for {:?}:\n{}", params.mode, source);
        let pipeline = self.compile(source)?;

        let bindings = KernelBindings::for_mode(params.mode);
        let input = match bindings.input {
            InputBinding::Cells => &grid.cells,
            InputBinding::Emissivity => &grid.emissivity,
        };
        let bind_group = |lane: &LaneResources, label: &str| {
            let output = match bindings.output {
                OutputBinding::Bytes => &lane.bytes_out,
                OutputBinding::Floats => &lane.floats_out,
            };
            self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: input.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wavelengths.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.frame_uniform.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: output.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: lane.chunk_uniform.as_entire_binding(),
                    },
                ],
            })
        };
        let bind_groups = [
            bind_group(&lanes[0], "ray_bind_group_a"),
            bind_group(&lanes[1], "ray_bind_group_b"),
        ];

        self.kernel = Some(Kernel {
            pipeline,
            bind_groups,
            bindings,
            lambda_pixel: params.lambda_pixel as usize,
        });
        Ok(())
    }

    fn write_parameters(&mut self, params: &FrameParameters) -> Result<(), BackendError> {
        self.ctx
            .queue
            .write_buffer(&self.frame_uniform, 0, bytemuck::bytes_of(params));
        Ok(())
    }

    fn enqueue(&mut self, lane: Lane, chunk: Chunk) -> Result<(), BackendError> {
        let (kernel, lanes) = match (&self.kernel, &mut self.lanes) {
            (Some(k), Some(l)) => (k, l),
            _ => return Err(BackendError::NotReady("enqueue")),
        };
        let res = &mut lanes[lane.index()];

        let chunk_bytes = ChunkParams::new(chunk.offset, chunk.len).to_bytes()?;
        self.ctx.queue.write_buffer(&res.chunk_uniform, 0, &chunk_bytes);

        let (output, readback, len) = match kernel.bindings.output {
            OutputBinding::Bytes => (
                &res.bytes_out,
                &res.bytes_readback,
                (chunk.len * BYTES_PER_PIXEL) as u64,
            ),
            OutputBinding::Floats => (
                &res.floats_out,
                &res.floats_readback,
                (chunk.len * kernel.lambda_pixel * std::mem::size_of::<f32>()) as u64,
            ),
        };

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("ray_chunk_encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("ray_chunk_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, &kernel.bind_groups[lane.index()], &[]);
            pass.dispatch_workgroups((chunk.len as u32).div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        encoder.copy_buffer_to_buffer(output, 0, readback, 0, len);

        let submission = self.ctx.queue.submit(std::iter::once(encoder.finish()));
        res.pending = Some((submission, chunk));
        Ok(())
    }

    fn extract(
        &mut self,
        lane: Lane,
        chunk: Chunk,
        sink: &mut FrameSink<'_>,
    ) -> Result<(), BackendError> {
        let (kernel, lanes) = match (&self.kernel, &mut self.lanes) {
            (Some(k), Some(l)) => (k, l),
            _ => return Err(BackendError::NotReady("extract")),
        };
        let res = &mut lanes[lane.index()];
        let submission = match res.pending.take() {
            Some((submission, pending)) if pending == chunk => submission,
            _ => return Err(BackendError::NotReady("extract")),
        };

        let (readback, label) = match kernel.bindings.output {
            OutputBinding::Bytes => (&res.bytes_readback, "bytes_readback_buffer"),
            OutputBinding::Floats => (&res.floats_readback, "floats_readback_buffer"),
        };
        let dst = sink.chunk_bytes_mut(chunk);
        let slice = readback.slice(..dst.len() as u64);

        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.ctx
            .device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(submission),
                timeout: None,
            })
            .map_err(|e| BackendError::Map {
                label,
                reason: e.to_string(),
            })?;
        rx.recv()
            .map_err(|e| BackendError::Map {
                label,
                reason: e.to_string(),
            })?
            .map_err(|e| BackendError::Map {
                label,
                reason: e.to_string(),
            })?;

        {
            let data = slice.get_mapped_range();
            dst.copy_from_slice(&data);
        }
        readback.unmap();
        Ok(())
    }

    fn layout(&self) -> BackendLayout {
        let (byte_output_bytes, float_output_bytes) = match &self.lanes {
            Some([a, b]) => (
                [a.bytes_out.size(), b.bytes_out.size()],
                [a.floats_out.size(), b.floats_out.size()],
            ),
            None => ([0; 2], [0; 2]),
        };
        BackendLayout {
            cell_bytes: self.grid.as_ref().map_or(0, |g| g.cells.size()),
            emissivity_bytes: self.grid.as_ref().map_or(0, |g| g.emissivity.size()),
            wavelength_bytes: self.wavelengths.as_ref().map_or(0, |w| w.size()),
            byte_output_bytes,
            float_output_bytes,
            bindings: self.kernel.as_ref().map(|k| k.bindings),
        }
    }
}

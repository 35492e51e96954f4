//! WebGPU compute kernel for RGB to NV12 conversion
//!
//! The kernel is dispatched over a 2-D grid of 4x4-pixel blocks. Each
//! invocation writes only whole 32-bit words of the packed output (four luma
//! words, two chroma words per block), which is why the accelerated path is
//! limited to dimensions divisible by 4.

use std::collections::HashMap;

use color_eyre::{eyre::eyre, Result};
use tracing::info;
use wgpu::*;

use super::ConvertError;
use crate::frame::Nv12Frame;

/// One invocation per 4x4 pixel block
const BLOCK: u32 = 4;
const WORKGROUP: u32 = 8;

const KERNEL_SOURCE: &str = r#"
override width: u32;
override height: u32;
override rgb_stride: u32;
override uv_width: u32;
override rgb_size: u32;

@group(0) @binding(0) var<storage, read> rgb: array<u32>;
@group(0) @binding(1) var<storage, read_write> nv12: array<u32>;

fn rgb_byte(i: u32) -> f32 {
    return f32((rgb[i >> 2u] >> ((i & 3u) * 8u)) & 0xffu);
}

fn clamp8(v: f32) -> u32 {
    return u32(clamp(round(v), 0.0, 255.0));
}

fn luma_at(x: u32, y: u32) -> u32 {
    let p = y * rgb_stride + x * 3u;
    return clamp8(0.299 * rgb_byte(p) + 0.587 * rgb_byte(p + 1u) + 0.114 * rgb_byte(p + 2u));
}

@compute @workgroup_size(8, 8)
fn rgb_to_nv12(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= width / 4u || gid.y >= height / 4u) {
        return;
    }
    let x0 = gid.x * 4u;
    let y0 = gid.y * 4u;

    // Four aligned luma words, one per block row
    for (var row = 0u; row < 4u; row = row + 1u) {
        let y = y0 + row;
        var word = 0u;
        for (var i = 0u; i < 4u; i = i + 1u) {
            word = word | (luma_at(x0 + i, y) << (i * 8u));
        }
        nv12[(y * width + x0) >> 2u] = word;
    }

    // Two chroma words, one per chroma row, packed [U0, V0, U1, V1].
    // Chroma samples are decimated from the even source row/column.
    for (var crow = 0u; crow < 2u; crow = crow + 1u) {
        let cy = y0 / 2u + crow;
        let sy = cy * 2u;
        var word = 0u;
        for (var i = 0u; i < 2u; i = i + 1u) {
            let sx = (gid.x * 2u + i) * 2u;
            let p = sy * rgb_stride + sx * 3u;
            let r = rgb_byte(p);
            let g = rgb_byte(p + 1u);
            let b = rgb_byte(p + 2u);
            let u = clamp8(-0.169 * r - 0.331 * g + 0.500 * b + 128.0);
            let v = clamp8(0.500 * r - 0.419 * g - 0.081 * b + 128.0);
            word = word | (u << (i * 16u)) | (v << (i * 16u + 8u));
        }
        nv12[(rgb_size + cy * uv_width * 2u + x0) >> 2u] = word;
    }
}
"#;

/// Compiled conversion kernel bound to fixed frame dimensions
pub struct GpuKernel {
    device: Device,
    queue: Queue,
    pipeline: ComputePipeline,
    bind_group: BindGroup,
    input: Buffer,
    output: Buffer,
    staging: Buffer,
    nv12_len: u64,
    groups_x: u32,
    groups_y: u32,
}

impl GpuKernel {
    /// Acquire a compute device and compile the kernel for `width` x `height`.
    ///
    /// Any failure here (no adapter, device request, shader or pipeline
    /// validation) leaves the converter on the software path.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width % BLOCK != 0 || height % BLOCK != 0 {
            return Err(eyre!(
                "kernel requires dimensions divisible by {BLOCK}, got {width}x{height}"
            ));
        }

        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::all(),
            ..Default::default()
        });

        // Prefer a discrete GPU; headless, so no surface to be compatible with
        let adapter = pollster::block_on(instance.request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| eyre!("no suitable GPU adapter found"))?;

        info!("GPU: {}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &DeviceDescriptor {
                label: Some("Camsim Convert Device"),
                required_features: Features::empty(),
                required_limits: Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        // Validation errors from shader or pipeline creation surface through
        // the error scope instead of the uncaptured-error handler
        device.push_error_scope(ErrorFilter::Validation);

        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("RGB to NV12 Kernel"),
            source: ShaderSource::Wgsl(KERNEL_SOURCE.into()),
        });

        // Derived stride constants baked in at pipeline creation, the WGSL
        // equivalent of compile-time kernel defines
        let constants = HashMap::from([
            ("width".to_string(), width as f64),
            ("height".to_string(), height as f64),
            ("rgb_stride".to_string(), (width * 3) as f64),
            ("uv_width".to_string(), (width / 2) as f64),
            ("rgb_size".to_string(), (width * height) as f64),
        ]);

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Convert Bind Group Layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Convert Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("Convert Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("rgb_to_nv12"),
            compilation_options: PipelineCompilationOptions {
                constants: &constants,
                ..Default::default()
            },
            cache: None,
        });

        let rgb_len = (width * height * 3) as u64;
        let nv12_len = Nv12Frame::byte_len(width, height) as u64;

        let input = device.create_buffer(&BufferDescriptor {
            label: Some("RGB Input"),
            size: rgb_len,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let output = device.create_buffer(&BufferDescriptor {
            label: Some("NV12 Output"),
            size: nv12_len,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = device.create_buffer(&BufferDescriptor {
            label: Some("NV12 Readback"),
            size: nv12_len,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Convert Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: input.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: output.as_entire_binding(),
                },
            ],
        });

        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(eyre!("kernel compilation failed: {e}"));
        }

        let groups_x = (width / BLOCK).div_ceil(WORKGROUP);
        let groups_y = (height / BLOCK).div_ceil(WORKGROUP);

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group,
            input,
            output,
            staging,
            nv12_len,
            groups_x,
            groups_y,
        })
    }

    /// Run one conversion: upload, dispatch, block until completion, read back.
    ///
    /// Device failures after successful initialization are surfaced to the
    /// caller; there is no per-call fallback to the software path.
    pub fn convert(&self, rgb: &[u8]) -> Result<Vec<u8>, ConvertError> {
        self.queue.write_buffer(&self.input, 0, rgb);

        self.device.push_error_scope(ErrorFilter::Validation);

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Convert Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("Convert Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(self.groups_x, self.groups_y, 1);
        }
        encoder.copy_buffer_to_buffer(&self.output, 0, &self.staging, 0, self.nv12_len);
        self.queue.submit(std::iter::once(encoder.finish()));

        if let Some(e) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ConvertError::Conversion(e.to_string()));
        }

        // Explicit blocking wait for device completion
        let slice = self.staging.slice(..);
        let (tx, rx) = flume::bounded(1);
        slice.map_async(MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        let _ = self.device.poll(Maintain::Wait);

        rx.recv()
            .map_err(|e| ConvertError::Conversion(format!("readback channel closed: {e}")))?
            .map_err(|e| ConvertError::Conversion(format!("readback map failed: {e}")))?;

        let data = slice.get_mapped_range().to_vec();
        self.staging.unmap();
        Ok(data)
    }
}

//! wgpu implementation of the GPU backend
//!
//! One render pipeline is shared by every mark drawn through the backend.
//! Each channel's attribute buffer is a plain `array<f32>` storage buffer
//! bound at a fixed binding, the style uniforms sit at binding 0 and the
//! colormap texture with its sampler at bindings 1 and 2. Marks take turns: each draw rewrites the
//! uniforms, rebuilds the bind group and records its own render pass.

use std::collections::HashMap;
use std::rc::Rc;

use gpu_scatter_shared::{ScatterError, ScatterResult};

use crate::backend::{storage_buffers, AttributeSlot, BufferId, DrawCall, GpuBackend, TextureId};
use crate::buffer_pool::{BufferPool, BufferPoolStats};
use crate::clock::Timer;
use crate::uniforms::ScatterUniforms;

/// First binding index of the attribute storage buffers
const STORAGE_BINDING_BASE: u32 = 3;

/// Storage buffers the vertex stage reads; within the WebGPU default of 8
const STORAGE_BUFFERS_PER_STAGE: u32 = AttributeSlot::STORAGE_BINDINGS as u32;

/// Smallest buffer handed to the driver
const MIN_BUFFER_BYTES: u64 = 16;

/// Request a device able to run the scatter pipeline
pub async fn request_device() -> ScatterResult<(wgpu::Device, wgpu::Queue)> {
    let start_time = Timer::now();

    let backends = if cfg!(target_arch = "wasm32") {
        wgpu::Backends::BROWSER_WEBGPU
    } else {
        wgpu::Backends::all()
    };

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends,
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| ScatterError::Gpu {
            message: format!("Failed to find suitable GPU adapter: {e:?}"),
        })?;

    let supported = adapter.limits().max_storage_buffers_per_shader_stage;
    if supported < STORAGE_BUFFERS_PER_STAGE {
        return Err(ScatterError::Gpu {
            message: format!(
                "Adapter supports {supported} storage buffers per shader stage, \
                 scatter marks need {STORAGE_BUFFERS_PER_STAGE}"
            ),
        });
    }

    let limits = wgpu::Limits {
        max_storage_buffers_per_shader_stage: STORAGE_BUFFERS_PER_STAGE,
        ..wgpu::Limits::downlevel_defaults()
    };
    log::info!("[WgpuBackend] Requesting device with limits: {limits:?}");

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("Scatter Device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: Default::default(),
            trace: Default::default(),
        })
        .await
        .map_err(|e| {
            log::error!("[WgpuBackend] Device request failed: {e:?}");
            ScatterError::Gpu {
                message: format!("Failed to create GPU device: {e:?}"),
            }
        })?;

    log::info!(
        "[WgpuBackend] Device created in {:.2}ms",
        start_time.elapsed_millis()
    );
    Ok((device, queue))
}

struct AttributeBuffer {
    buffer: wgpu::Buffer,
    /// Capacity in floats
    capacity: usize,
}

struct Colormap {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Backend drawing scatter marks with wgpu
pub struct WgpuBackend {
    device: Rc<wgpu::Device>,
    queue: Rc<wgpu::Queue>,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    /// Bound to slots a draw leaves empty
    fallback_buffer: wgpu::Buffer,
    fallback_colormap: Colormap,
    buffers: HashMap<BufferId, AttributeBuffer>,
    colormaps: HashMap<TextureId, Colormap>,
    pool: BufferPool,
    target: Option<wgpu::TextureView>,
    next_id: u64,
}

impl WgpuBackend {
    pub fn new(
        device: Rc<wgpu::Device>,
        queue: Rc<wgpu::Queue>,
        format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::include_wgsl!("scatter.wgsl"));

        let mut layout_entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ];
        layout_entries.extend((0..STORAGE_BUFFERS_PER_STAGE).map(|slot| {
            wgpu::BindGroupLayoutEntry {
                binding: STORAGE_BINDING_BASE + slot,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }
        }));

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scatter Bind Group Layout"),
            entries: &layout_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scatter Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Scatter Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scatter Uniforms"),
            size: std::mem::size_of::<ScatterUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Colormap Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let fallback_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scatter Fallback Attribute"),
            size: MIN_BUFFER_BYTES,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let fallback_colormap = create_colormap_texture(
            &device,
            &queue,
            "Scatter Fallback Colormap",
            &[[255, 255, 255]],
        );

        log::info!("[WgpuBackend] Scatter pipeline created for {format:?}");

        Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            uniform_buffer,
            sampler,
            fallback_buffer,
            fallback_colormap,
            buffers: HashMap::new(),
            colormaps: HashMap::new(),
            pool: BufferPool::new(wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST),
            target: None,
            next_id: 0,
        }
    }

    /// Set the view the following draws render into; called once per frame
    pub fn begin_frame(&mut self, target: wgpu::TextureView) {
        self.target = Some(target);
        self.pool.cleanup();
    }

    /// Drop the render target at the end of a frame
    pub fn end_frame(&mut self) {
        self.target = None;
    }

    pub fn pool_stats(&self) -> BufferPoolStats {
        self.pool.get_stats()
    }

    pub fn device(&self) -> &Rc<wgpu::Device> {
        &self.device
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

fn create_colormap_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    texels: &[[u8; 3]],
) -> Colormap {
    let width = texels.len().max(1) as u32;
    let size = wgpu::Extent3d {
        width,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let mut rgba: Vec<u8> = texels.iter().flat_map(|&[r, g, b]| [r, g, b, 255]).collect();
    rgba.resize(width as usize * 4, 255);

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(1),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Colormap {
        _texture: texture,
        view,
    }
}

impl GpuBackend for WgpuBackend {
    fn create_buffer(&mut self, label: &str, contents: &[f32]) -> ScatterResult<BufferId> {
        let bytes = (std::mem::size_of_val(contents) as u64).max(MIN_BUFFER_BYTES);
        let buffer = self.pool.acquire(&self.device, bytes, Some(label));
        if !contents.is_empty() {
            self.queue
                .write_buffer(&buffer, 0, bytemuck::cast_slice(contents));
        }

        let id = BufferId(self.next_id());
        self.buffers.insert(
            id,
            AttributeBuffer {
                buffer,
                capacity: contents.len(),
            },
        );
        log::debug!("[WgpuBackend] Created buffer '{label}' for {} values", contents.len());
        Ok(id)
    }

    fn write_buffer(
        &mut self,
        buffer: BufferId,
        offset: usize,
        contents: &[f32],
    ) -> ScatterResult<()> {
        let entry = self.buffers.get(&buffer).ok_or_else(|| ScatterError::Gpu {
            message: format!("write to unknown buffer {buffer:?}"),
        })?;
        if offset + contents.len() > entry.capacity {
            return Err(ScatterError::Gpu {
                message: format!(
                    "write of {} values at {} overflows buffer of {} values",
                    contents.len(),
                    offset,
                    entry.capacity
                ),
            });
        }
        if !contents.is_empty() {
            let byte_offset = (offset * std::mem::size_of::<f32>()) as u64;
            self.queue
                .write_buffer(&entry.buffer, byte_offset, bytemuck::cast_slice(contents));
        }
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if let Some(entry) = self.buffers.remove(&buffer) {
            self.pool.release(entry.buffer);
        }
    }

    fn create_colormap(&mut self, label: &str, texels: &[[u8; 3]]) -> ScatterResult<TextureId> {
        if texels.is_empty() {
            return Err(ScatterError::Gpu {
                message: format!("colormap '{label}' has no texels"),
            });
        }
        let colormap = create_colormap_texture(&self.device, &self.queue, label, texels);
        let id = TextureId(self.next_id());
        self.colormaps.insert(id, colormap);
        Ok(id)
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.colormaps.remove(&texture);
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> ScatterResult<()> {
        if call.instances == 0 {
            return Ok(());
        }
        let target = self.target.as_ref().ok_or_else(|| ScatterError::Gpu {
            message: format!("draw of '{}' outside of a frame", call.label),
        })?;

        let mut slots: [&wgpu::Buffer; AttributeSlot::STORAGE_BINDINGS] =
            [&self.fallback_buffer; AttributeSlot::STORAGE_BINDINGS];
        for (slot, id) in storage_buffers(call.bindings)?.iter().enumerate() {
            let Some(id) = id else {
                continue;
            };
            let entry = self.buffers.get(id).ok_or_else(|| ScatterError::Gpu {
                message: format!("draw binds destroyed buffer {id:?}"),
            })?;
            slots[slot] = &entry.buffer;
        }

        let colormap = match call.colormap {
            Some(id) => self.colormaps.get(&id).ok_or_else(|| ScatterError::Gpu {
                message: format!("draw binds destroyed colormap {id:?}"),
            })?,
            None => &self.fallback_colormap,
        };

        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(call.uniforms));

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: self.uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&colormap.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        entries.extend(slots.iter().enumerate().map(|(slot, buffer)| {
            wgpu::BindGroupEntry {
                binding: STORAGE_BINDING_BASE + slot as u32,
                resource: buffer.as_entire_binding(),
            }
        }));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(call.label),
            layout: &self.bind_group_layout,
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(call.label),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(call.label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw(0..6, 0..call.instances);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}

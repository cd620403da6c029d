//! [`RenderBackend`] implementation on top of wgpu.
//!
//! Resource mapping:
//! - mesh: a `VERTEX | COPY_DST` buffer sized for the canvas maximum
//! - program: the canvas shader module plus its pipeline layout
//! - draw state: a render pipeline for a program, bound to a mesh
//! - texture: an RGBA8 sheet texture with its sampler bind group
//!
//! Draw calls are queued and encoded into a single render pass by
//! [`WgpuBackend::encode_frame`], once per frame.

use std::collections::HashMap;

use spritecanvas_core::backend::{
    DrawCall, DrawStateId, MeshId, MeshSetup, ProgramId, RenderBackend, Resource, TextureId,
};
use spritecanvas_core::{BackendError, SheetImage, Vertex};

// ---------------------------------------------------------------------------
// GPU resources
// ---------------------------------------------------------------------------

struct Mesh {
    buffer: wgpu::Buffer,
}

struct Program {
    shader: wgpu::ShaderModule,
    layout: wgpu::PipelineLayout,
}

struct DrawState {
    pipeline: wgpu::RenderPipeline,
    mesh: MeshId,
}

struct Texture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

// ---------------------------------------------------------------------------
// DrawQueue
// ---------------------------------------------------------------------------

/// Draw calls waiting for the next frame encode.
#[derive(Clone, Debug, Default)]
pub struct DrawQueue {
    calls: Vec<DrawCall>,
}

impl DrawQueue {
    pub fn push(&mut self, call: DrawCall) {
        self.calls.push(call);
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Queued calls that actually draw something, in submission order.
    pub fn visible(&self) -> impl Iterator<Item = &DrawCall> {
        self.calls.iter().filter(|c| c.num_vertices > 0)
    }

    /// Forget every queued call. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.calls.len();
        self.calls.clear();
        n
    }
}

// ---------------------------------------------------------------------------
// Viewport
// ---------------------------------------------------------------------------

/// Pixel rectangle of the surface the canvas is drawn into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Largest integer multiple of the canvas size that fits the surface,
    /// centered. Falls back to an aspect-preserving fractional fit when the
    /// surface is smaller than the canvas.
    pub fn fit(surface_w: u32, surface_h: u32, canvas_w: u32, canvas_h: u32) -> Self {
        if canvas_w == 0 || canvas_h == 0 || surface_w == 0 || surface_h == 0 {
            return Self {
                x: 0,
                y: 0,
                width: surface_w,
                height: surface_h,
            };
        }
        let scale = (surface_w / canvas_w).min(surface_h / canvas_h);
        let (width, height) = if scale >= 1 {
            (canvas_w * scale, canvas_h * scale)
        } else {
            let s = (surface_w as f32 / canvas_w as f32).min(surface_h as f32 / canvas_h as f32);
            (
                ((canvas_w as f32 * s) as u32).max(1),
                ((canvas_h as f32 * s) as u32).max(1),
            )
        };
        Self {
            x: (surface_w - width) / 2,
            y: (surface_h - height) / 2,
            width,
            height,
        }
    }
}

// ---------------------------------------------------------------------------
// WgpuBackend
// ---------------------------------------------------------------------------

/// wgpu rendering backend for a `TileCanvas`.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target_format: wgpu::TextureFormat,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    next_id: u32,
    meshes: HashMap<MeshId, Mesh>,
    programs: HashMap<ProgramId, Program>,
    draw_states: HashMap<DrawStateId, DrawState>,
    textures: HashMap<TextureId, Texture>,
    pending: DrawQueue,
}

impl WgpuBackend {
    /// Create a backend drawing into targets of `target_format`.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, target_format: wgpu::TextureFormat) -> Self {
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sheet bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sheet sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            device,
            queue,
            target_format,
            texture_layout,
            sampler,
            next_id: 0,
            meshes: HashMap::new(),
            programs: HashMap::new(),
            draw_states: HashMap::new(),
            textures: HashMap::new(),
            pending: DrawQueue::default(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Drop queued draws without encoding them, for frames whose surface
    /// texture could not be acquired.
    pub fn discard_pending(&mut self) {
        let n = self.pending.clear();
        if n > 0 {
            log::debug!("dropped {n} queued draws");
        }
    }

    /// Encode all queued draws into one render pass targeting `view`,
    /// clearing it to `clear` first, and submit it.
    pub fn encode_frame(&mut self, view: &wgpu::TextureView, clear: wgpu::Color, viewport: Viewport) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("spritecanvas encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("spritecanvas pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            pass.set_viewport(
                viewport.x as f32,
                viewport.y as f32,
                viewport.width as f32,
                viewport.height as f32,
                0.0,
                1.0,
            );

            for call in self.pending.visible() {
                let Some(state) = self.draw_states.get(&call.draw_state) else {
                    log::warn!("draw with unknown draw-state#{}", call.draw_state.0);
                    continue;
                };
                let Some(texture) = self.textures.get(&call.texture) else {
                    log::warn!("draw with unknown texture#{}", call.texture.0);
                    continue;
                };
                let Some(mesh) = self.meshes.get(&state.mesh) else {
                    log::warn!("draw-state#{} refers to a released mesh", call.draw_state.0);
                    continue;
                };
                pass.set_pipeline(&state.pipeline);
                pass.set_bind_group(0, &texture.bind_group, &[]);
                pass.set_vertex_buffer(0, mesh.buffer.slice(..));
                pass.draw(0..call.num_vertices as u32, 0..1);
            }
        }

        self.pending.clear();
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn alloc_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl RenderBackend for WgpuBackend {
    fn create_mesh(&mut self, setup: &MeshSetup) -> Result<MeshId, BackendError> {
        let size = setup.byte_size() as u64;
        if size > self.device.limits().max_buffer_size {
            return Err(BackendError::Other(format!(
                "vertex buffer of {size} bytes exceeds device limit"
            )));
        }
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("canvas vertices"),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let id = MeshId(self.alloc_id());
        log::debug!("created mesh#{} ({size} bytes)", id.0);
        self.meshes.insert(id, Mesh { buffer });
        Ok(id)
    }

    fn create_program(&mut self) -> Result<ProgramId, BackendError> {
        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("canvas shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("canvas.wgsl").into()),
            });
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("canvas pipeline layout"),
                bind_group_layouts: &[&self.texture_layout],
                immediate_size: 0,
            });
        let id = ProgramId(self.alloc_id());
        log::debug!("created program#{}", id.0);
        self.programs.insert(id, Program { shader, layout });
        Ok(id)
    }

    fn create_draw_state(
        &mut self,
        mesh: MeshId,
        program: ProgramId,
    ) -> Result<DrawStateId, BackendError> {
        if !self.meshes.contains_key(&mesh) {
            return Err(BackendError::UnknownHandle("mesh", mesh.0));
        }
        let Some(prog) = self.programs.get(&program) else {
            return Err(BackendError::UnknownHandle("program", program.0));
        };

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("canvas pipeline"),
                layout: Some(&prog.layout),
                vertex: wgpu::VertexState {
                    module: &prog.shader,
                    entry_point: Some("vs_main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[
                            // x, y
                            wgpu::VertexAttribute {
                                format: wgpu::VertexFormat::Float32x2,
                                offset: 0,
                                shader_location: 0,
                            },
                            // u, v
                            wgpu::VertexAttribute {
                                format: wgpu::VertexFormat::Float32x2,
                                offset: 8,
                                shader_location: 1,
                            },
                        ],
                    }],
                    compilation_options: Default::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Cw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &prog.shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.target_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                multiview_mask: None,
                cache: None,
            });

        let id = DrawStateId(self.alloc_id());
        log::debug!("created draw-state#{} (mesh#{}, program#{})", id.0, mesh.0, program.0);
        self.draw_states.insert(id, DrawState { pipeline, mesh });
        Ok(id)
    }

    fn create_texture(&mut self, image: &SheetImage) -> Result<TextureId, BackendError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if image.width() > max || image.height() > max {
            return Err(BackendError::Other(format!(
                "sheet of {}x{} exceeds texture limit {max}",
                image.width(),
                image.height()
            )));
        }

        let extent = wgpu::Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("sprite sheet"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.pixels(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(image.width() * 4),
                rows_per_image: Some(image.height()),
            },
            extent,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sheet bg"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let id = TextureId(self.alloc_id());
        log::debug!(
            "created texture#{} ({}x{})",
            id.0,
            image.width(),
            image.height()
        );
        self.textures.insert(
            id,
            Texture {
                _texture: texture,
                bind_group,
            },
        );
        Ok(id)
    }

    fn destroy(&mut self, resource: Resource) {
        let removed = match resource {
            Resource::Mesh(id) => self.meshes.remove(&id).map(|m| m.buffer.destroy()).is_some(),
            Resource::Program(id) => self.programs.remove(&id).is_some(),
            Resource::DrawState(id) => self.draw_states.remove(&id).is_some(),
            Resource::Texture(id) => self.textures.remove(&id).is_some(),
        };
        if removed {
            log::debug!("destroyed {resource}");
        } else {
            log::warn!("destroy of unknown {resource}");
        }
    }

    fn update_vertices(&mut self, mesh: MeshId, data: &[u8]) {
        let Some(m) = self.meshes.get(&mesh) else {
            log::warn!("update of unknown mesh#{}", mesh.0);
            return;
        };
        if data.is_empty() {
            return;
        }
        if data.len() as u64 > m.buffer.size() {
            log::warn!(
                "vertex upload of {} bytes exceeds mesh capacity {}",
                data.len(),
                m.buffer.size()
            );
            return;
        }
        self.queue.write_buffer(&m.buffer, 0, data);
    }

    fn draw(&mut self, call: &DrawCall) {
        self.pending.push(*call);
    }
}

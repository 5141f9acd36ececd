// GPU rendering using wgpu with a raw Wayland surface
// Draws the current texture on a fixed quad scaled by the viewport transform

use crate::error::ViewerError;
use crate::image_loader::DecodedBitmap;
use crate::navigation::TextureSink;
use crate::texture::{GpuContext, GpuTexture, TextureManager};
use crate::viewport::ViewportTransform;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::ptr::NonNull;
use wgpu::rwh::{
    RawDisplayHandle, RawWindowHandle, WaylandDisplayHandle, WaylandWindowHandle,
};
use wgpu::util::DeviceExt;

// Maximum surface size to prevent GPU memory issues
const MAX_SURFACE_SIZE: u32 = 8192;

pub struct WgpuRenderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    render_pipeline: wgpu::RenderPipeline,
    texture_bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    textures: TextureManager<GpuTexture>,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
    max_surface_size: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 2],
    tex_coords: [f32; 2],
}

impl Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

// Texture rows run top to bottom, so V is flipped against clip space
const VERTICES: &[Vertex] = &[
    Vertex {
        position: [-1.0, -1.0],
        tex_coords: [0.0, 1.0],
    }, // Bottom-left
    Vertex {
        position: [1.0, -1.0],
        tex_coords: [1.0, 1.0],
    }, // Bottom-right
    Vertex {
        position: [1.0, 1.0],
        tex_coords: [1.0, 0.0],
    }, // Top-right
    Vertex {
        position: [-1.0, 1.0],
        tex_coords: [0.0, 0.0],
    }, // Top-left
];

const INDICES: &[u16] = &[0, 1, 2, 2, 3, 0];

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    transform: [[f32; 4]; 4],
}

impl Uniforms {
    fn identity() -> Self {
        Self {
            transform: ViewportTransform {
                scale_x: 1.0,
                scale_y: 1.0,
            }
            .to_matrix(),
        }
    }
}

impl WgpuRenderer {
    /// Create a new WgpuRenderer from raw Wayland display and surface pointers
    ///
    /// # Safety
    /// - `display_ptr` must be a valid pointer to a wl_display
    /// - `surface_ptr` must be a valid pointer to a wl_surface
    /// - The display and surface must remain valid for the lifetime of the renderer
    pub fn new(
        display_ptr: *mut std::ffi::c_void,
        surface_ptr: *mut std::ffi::c_void,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        info!("Initializing wgpu renderer with size {}x{}", width, height);

        let display_non_null = NonNull::new(display_ptr)
            .context("Display pointer is null")?;
        let surface_non_null = NonNull::new(surface_ptr)
            .context("Surface pointer is null")?;

        let raw_display_handle =
            RawDisplayHandle::Wayland(WaylandDisplayHandle::new(display_non_null));
        let raw_window_handle =
            RawWindowHandle::Wayland(WaylandWindowHandle::new(surface_non_null));

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::VULKAN | wgpu::Backends::GL,
            ..Default::default()
        });

        // Create surface from raw handles
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle,
                raw_window_handle,
            })?
        };

        pollster::block_on(Self::init_async(surface, instance, width, height))
    }

    async fn init_async(
        surface: wgpu::Surface<'static>,
        instance: wgpu::Instance,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("Failed to find an appropriate adapter")?;

        info!("Using adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("Failed to create device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        debug!("Surface capabilities: {:?}", surface_caps);

        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("Surface reports no supported formats")?;

        // A plain window: prefer an opaque surface
        let alpha_mode = if surface_caps
            .alpha_modes
            .contains(&wgpu::CompositeAlphaMode::Opaque)
        {
            wgpu::CompositeAlphaMode::Opaque
        } else {
            surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };
        info!("Using alpha mode: {:?}", alpha_mode);

        let max_texture_size = device.limits().max_texture_dimension_2d;
        info!("Max texture size: {}", max_texture_size);
        let max_surface_size = max_texture_size.min(MAX_SURFACE_SIZE);

        let (safe_width, safe_height) = fit_surface_size(width, height, max_surface_size);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: safe_width,
            height: safe_height,
            present_mode: wgpu::PresentMode::Fifo, // VSync, stable
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);

        // Shader
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        // Texture bind group layout
        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
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
                label: Some("texture_bind_group_layout"),
            });

        // Trilinear minification, bilinear magnification
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // Uniform bind group layout
        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("uniform_bind_group_layout"),
            });

        // Uniform buffer
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[Uniforms::identity()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("uniform_bind_group"),
        });

        let render_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts: &[&texture_bind_group_layout, &uniform_bind_group_layout],
                push_constant_ranges: &[],
            });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[Vertex::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: bytemuck::cast_slice(INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            render_pipeline,
            texture_bind_group_layout,
            sampler,
            textures: TextureManager::new(max_texture_size),
            vertex_buffer,
            index_buffer,
            uniform_buffer,
            uniform_bind_group,
            width: safe_width,
            height: safe_height,
            max_surface_size,
        })
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) {
        if new_width > 0 && new_height > 0 {
            let (safe_width, safe_height) =
                fit_surface_size(new_width, new_height, self.max_surface_size);

            if safe_width != self.width || safe_height != self.height {
                self.width = safe_width;
                self.height = safe_height;
                self.config.width = safe_width;
                self.config.height = safe_height;

                // Reconfigure surface with new size
                self.surface.configure(&self.device, &self.config);
                debug!("Resized to {}x{}", safe_width, safe_height);
            }
        }
    }

    /// Drop the current texture; rendering shows an empty frame afterwards
    pub fn release_texture(&mut self) {
        let mut ctx = GpuContext {
            device: &self.device,
            queue: &self.queue,
            bind_group_layout: &self.texture_bind_group_layout,
            sampler: &self.sampler,
        };
        self.textures.destroy(&mut ctx);
    }

    pub fn has_texture(&self) -> bool {
        self.textures.is_created()
    }

    /// Render a frame and return whether it was presented.
    ///
    /// Without a texture the frame is cleared and presented with no draw call.
    pub fn render(&mut self, zoom: f32) -> Result<bool> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Timeout) => {
                debug!("Surface timeout, skipping frame");
                return Ok(false);
            }
            Err(wgpu::SurfaceError::Outdated) => {
                debug!("Surface outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(false);
            }
            Err(wgpu::SurfaceError::Lost) => {
                debug!("Surface lost, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(false);
            }
            Err(e) => {
                warn!("Surface error: {:?}", e);
                return Err(e.into());
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        if let Some(texture) = self.textures.current() {
            let (image_width, image_height) = texture.image_size();
            let transform =
                ViewportTransform::fit(image_width, image_height, self.width, self.height, zoom);
            let uniforms = Uniforms {
                transform: transform.to_matrix(),
            };
            self.queue
                .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let Some(texture) = self.textures.current() {
                render_pass.set_pipeline(&self.render_pipeline);
                render_pass.set_bind_group(0, texture.handle().bind_group(), &[]);
                render_pass.set_bind_group(1, &self.uniform_bind_group, &[]);
                render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                render_pass
                    .set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                render_pass.draw_indexed(0..INDICES.len() as u32, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(true)
    }
}

impl TextureSink for WgpuRenderer {
    fn replace_texture(&mut self, bitmap: DecodedBitmap) -> Result<(), ViewerError> {
        let mut ctx = GpuContext {
            device: &self.device,
            queue: &self.queue,
            bind_group_layout: &self.texture_bind_group_layout,
            sampler: &self.sampler,
        };
        self.textures.replace(&mut ctx, bitmap)
    }
}

/// Clamp a window size to `max` on its longer side, keeping the aspect ratio
fn fit_surface_size(width: u32, height: u32, max: u32) -> (u32, u32) {
    let (width, height) = (width.max(1), height.max(1));
    let longest = width.max(height);
    if longest <= max {
        return (width, height);
    }
    let scale = |side: u32| ((side as u64 * max as u64) / longest as u64).max(1) as u32;
    (scale(width), scale(height))
}

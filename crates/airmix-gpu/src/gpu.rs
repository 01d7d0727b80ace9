//! Headless wgpu implementation of [`GraphicsDevice`].

use anyhow::Result;
use std::collections::HashMap;
use std::sync::mpsc;
use wgpu::util::DeviceExt;

use airmix_core::{AirmixError, AirmixResult};

use crate::device::{GraphicsDevice, ReadbackId, TargetId, TextureId};

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 2],
    uv: [f32; 2],
}

// Full-target quad, two triangles.
const VERTICES: &[Vertex] = &[
    Vertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
    Vertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    Vertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
    Vertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
    Vertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
    Vertex { position: [1.0, 1.0], uv: [1.0, 0.0] },
];

struct SourceTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

struct Target {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct Readback {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    padded_bytes_per_row: u32,
    pending: Option<mpsc::Receiver<Result<(), wgpu::BufferAsyncError>>>,
}

/// A wgpu device opened without a surface.
///
/// Clears and draws are recorded into one command encoder that is submitted
/// together with the readback copy, so a whole composite costs one submit.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    vertex_buffer: wgpu::Buffer,
    encoder: Option<wgpu::CommandEncoder>,
    next_id: u64,
    textures: HashMap<TextureId, SourceTexture>,
    targets: HashMap<TargetId, Target>,
    readbacks: HashMap<ReadbackId, Readback>,
}

fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

impl WgpuDevice {
    /// Initializes WGPU, selecting the best available backend (Metal, Vulkan, DX12, etc.)
    pub fn init() -> AirmixResult<Self> {
        Self::try_init().map_err(|e| AirmixError::device(format!("wgpu init failed: {e:#}")))
    }

    fn try_init() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow::anyhow!("no suitable wgpu adapter"))?;
        let adapter_name = adapter.get_info().name;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Airmix Compositor Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))?;

        let shader = device.create_shader_module(wgpu::include_wgsl!("compositor.wgsl"));

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("airmix_frame_bind_group_layout"),
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

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("airmix_composite_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("airmix_composite_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: FORMAT,
                    blend: Some(wgpu::BlendState {
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::SrcAlpha,
                            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent::OVER,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        // Nearest sampling keeps same-size draws bit-exact with the software device.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("airmix_frame_sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("airmix_quad_vertex_buffer"),
            contents: bytemuck::cast_slice(VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        tracing::info!("opened wgpu device on adapter '{}'", adapter_name);

        Ok(Self {
            device,
            queue,
            adapter_name,
            pipeline,
            bind_group_layout,
            sampler,
            vertex_buffer,
            encoder: None,
            next_id: 1,
            textures: HashMap::new(),
            targets: HashMap::new(),
            readbacks: HashMap::new(),
        })
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("airmix_composite_encoder"),
            })
        })
    }
}

fn unknown(kind: &str, raw: u64) -> AirmixError {
    AirmixError::device(format!("unknown {} {}", kind, raw))
}

impl GraphicsDevice for WgpuDevice {
    fn name(&self) -> &str {
        &self.adapter_name
    }

    fn create_texture(&mut self, width: u32, height: u32) -> AirmixResult<TextureId> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("airmix_frame_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("airmix_frame_bind_group"),
            layout: &self.bind_group_layout,
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
        let id = TextureId::new(self.allocate_id());
        self.textures.insert(
            id,
            SourceTexture {
                texture,
                bind_group,
                width,
                height,
            },
        );
        Ok(id)
    }

    fn write_texture(&mut self, texture: TextureId, pixels: &[u8]) -> AirmixResult<()> {
        let tex = self
            .textures
            .get(&texture)
            .ok_or_else(|| unknown("texture", texture.raw()))?;
        let expected = (tex.width as usize) * (tex.height as usize) * 4;
        if pixels.len() != expected {
            return Err(AirmixError::device(format!(
                "texture upload expects {} bytes, got {}",
                expected,
                pixels.len()
            )));
        }
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &tex.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(tex.width * 4),
                rows_per_image: Some(tex.height),
            },
            wgpu::Extent3d {
                width: tex.width,
                height: tex.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn create_render_target(&mut self, width: u32, height: u32) -> AirmixResult<TargetId> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("airmix_render_target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = TargetId::new(self.allocate_id());
        self.targets.insert(
            id,
            Target {
                texture,
                view,
                width,
                height,
            },
        );
        Ok(id)
    }

    fn clear(&mut self, target: TargetId) -> AirmixResult<()> {
        if !self.targets.contains_key(&target) {
            return Err(unknown("render target", target.raw()));
        }
        self.encoder();
        let (Some(encoder), Some(tgt)) = (self.encoder.as_mut(), self.targets.get(&target)) else {
            return Err(unknown("render target", target.raw()));
        };
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("airmix_clear_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &tgt.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        Ok(())
    }

    fn draw(&mut self, target: TargetId, texture: TextureId) -> AirmixResult<()> {
        if !self.targets.contains_key(&target) {
            return Err(unknown("render target", target.raw()));
        }
        if !self.textures.contains_key(&texture) {
            return Err(unknown("texture", texture.raw()));
        }
        self.encoder();
        let (Some(encoder), Some(tgt), Some(src)) = (
            self.encoder.as_mut(),
            self.targets.get(&target),
            self.textures.get(&texture),
        ) else {
            return Err(unknown("render target", target.raw()));
        };
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("airmix_draw_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &tgt.view,
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
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &src.bind_group, &[]);
        rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        rpass.draw(0..6, 0..1);
        Ok(())
    }

    fn create_readback(&mut self, width: u32, height: u32) -> AirmixResult<ReadbackId> {
        let padded = padded_bytes_per_row(width);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("airmix_readback"),
            size: (padded as wgpu::BufferAddress) * (height as wgpu::BufferAddress),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let id = ReadbackId::new(self.allocate_id());
        self.readbacks.insert(
            id,
            Readback {
                buffer,
                width,
                height,
                padded_bytes_per_row: padded,
                pending: None,
            },
        );
        Ok(id)
    }

    fn begin_readback(&mut self, target: TargetId, readback: ReadbackId) -> AirmixResult<()> {
        let mut encoder = self.encoder.take().unwrap_or_else(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("airmix_readback_encoder"),
                })
        });
        let tgt = self
            .targets
            .get(&target)
            .ok_or_else(|| unknown("render target", target.raw()))?;
        let rb = self
            .readbacks
            .get_mut(&readback)
            .ok_or_else(|| unknown("readback", readback.raw()))?;
        if (rb.width, rb.height) != (tgt.width, tgt.height) {
            return Err(AirmixError::device(format!(
                "readback is {}x{} but render target is {}x{}",
                rb.width, rb.height, tgt.width, tgt.height
            )));
        }

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &tgt.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &rb.buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(rb.padded_bytes_per_row),
                    rows_per_image: Some(rb.height),
                },
            },
            wgpu::Extent3d {
                width: rb.width,
                height: rb.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let (tx, rx) = mpsc::channel();
        rb.buffer.slice(..).map_async(wgpu::MapMode::Read, move |v| {
            let _ = tx.send(v);
        });
        rb.pending = Some(rx);
        Ok(())
    }

    fn finish_readback(&mut self, readback: ReadbackId, out: &mut [u8]) -> AirmixResult<()> {
        let rb = self
            .readbacks
            .get_mut(&readback)
            .ok_or_else(|| unknown("readback", readback.raw()))?;
        let row = rb.width as usize * 4;
        if out.len() != row * rb.height as usize {
            return Err(AirmixError::device(format!(
                "readback destination expects {} bytes, got {}",
                row * rb.height as usize,
                out.len()
            )));
        }
        let rx = rb
            .pending
            .take()
            .ok_or_else(|| AirmixError::device("readback finished before it was begun"))?;

        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| AirmixError::device("readback map callback dropped"))?
            .map_err(|e| AirmixError::device(format!("failed to map readback buffer: {e}")))?;

        {
            let mapped = rb.buffer.slice(..).get_mapped_range();
            let padded = rb.padded_bytes_per_row as usize;
            for (dst, src) in out.chunks_exact_mut(row).zip(mapped.chunks_exact(padded)) {
                dst.copy_from_slice(&src[..row]);
            }
        }
        rb.buffer.unmap();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(1920), 7680);
        assert_eq!(padded_bytes_per_row(1), 256);
    }
}

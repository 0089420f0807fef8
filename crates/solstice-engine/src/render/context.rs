use std::path::{Path, PathBuf};
use std::sync::mpsc;

use wgpu::util::DeviceExt;

use crate::coords::{SunDirection, Viewport};
use crate::device::{Gpu, GpuInit};
use crate::error::{ConfigurationError, RenderError, ShaderStage};

use super::common::{
    align_to, copy_tight_rows, frame_ubo_min_binding_size, FrameUniforms, QuadVertex,
    FULLSCREEN_QUAD, SUN_DIR_OFFSET, TWILIGHT_BAND,
};
use super::shader::{self, LinkedProgram, ShaderSource};
use super::texture::{map_sampler, MapTexture};
use super::PixelBuffer;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Everything needed to bring up a [`RenderContext`].
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Output width in pixels; height is `width / 2`.
    pub width: u32,
    pub vertex_shader: ShaderSource,
    pub fragment_shader: ShaderSource,
    pub day_texture: PathBuf,
    pub night_texture: PathBuf,
    pub gpu: GpuInit,
}

impl RenderSettings {
    /// Built-in shaders on the default adapter.
    pub fn new(width: u32, day_texture: impl Into<PathBuf>, night_texture: impl Into<PathBuf>) -> Self {
        Self {
            width,
            vertex_shader: ShaderSource::Builtin,
            fragment_shader: ShaderSource::Builtin,
            day_texture: day_texture.into(),
            night_texture: night_texture.into(),
            gpu: GpuInit::default(),
        }
    }
}

/// GPU-side state for the planet draw.
///
/// Owns the device, the linked pipeline, the quad vertex buffer, both map
/// textures and the offscreen target with its readback buffer. Created on
/// the render worker thread and never moved off it.
pub struct RenderContext {
    gpu: Gpu,
    viewport: Viewport,

    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    frame_ubo: wgpu::Buffer,
    quad_vbo: wgpu::Buffer,

    day: MapTexture,
    night: MapTexture,

    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    readback: wgpu::Buffer,
    unpadded_bytes_per_row: u32,
    padded_bytes_per_row: u32,
}

impl RenderContext {
    /// Resolves shader sources, acquires a device and initializes.
    pub async fn create(settings: &RenderSettings) -> Result<Self, ConfigurationError> {
        let viewport = Viewport::from_width(settings.width).ok_or(
            ConfigurationError::InvalidViewport {
                width: settings.width,
            },
        )?;

        log::info!("reading shader sources");
        let vertex_source = settings.vertex_shader.load(ShaderStage::Vertex)?;
        let fragment_source = settings.fragment_shader.load(ShaderStage::Fragment)?;

        log::info!("creating {}x{} headless GPU context", viewport.width, viewport.height);
        let gpu = Gpu::new(settings.gpu.clone())
            .await
            .map_err(|e| ConfigurationError::Device {
                reason: format!("{e:#}"),
            })?;

        Self::initialize(
            gpu,
            viewport,
            &vertex_source,
            &fragment_source,
            &settings.day_texture,
            &settings.night_texture,
        )
    }

    /// Compiles and links both stages, uploads the quad and both maps, and
    /// writes the uniforms that stay fixed for the context's lifetime.
    pub fn initialize(
        gpu: Gpu,
        viewport: Viewport,
        vertex_source: &str,
        fragment_source: &str,
        day_texture: &Path,
        night_texture: &Path,
    ) -> Result<Self, ConfigurationError> {
        let max_dimension = gpu.max_texture_dimension();
        if viewport.width > max_dimension {
            return Err(ConfigurationError::InvalidViewport {
                width: viewport.width,
            });
        }

        log::info!("compiling and linking shader program");
        let vertex = shader::compile(ShaderStage::Vertex, vertex_source)?;
        let fragment = shader::compile(ShaderStage::Fragment, fragment_source)?;
        let program = shader::link(vertex, fragment)?;
        log::info!("shader program linked");

        let device = gpu.device();
        let queue = gpu.queue();

        let unpadded_bytes_per_row = viewport.width * 4;
        let padded_bytes_per_row =
            align_to(unpadded_bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let readback_size = u64::from(padded_bytes_per_row) * u64::from(viewport.height);
        if readback_size > device.limits().max_buffer_size {
            return Err(ConfigurationError::InvalidViewport {
                width: viewport.width,
            });
        }

        let pipeline_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("solstice planet bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: Some(frame_ubo_min_binding_size()),
                    },
                    count: None,
                },
                map_layout_entry(1),
                map_layout_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline = create_pipeline(device, &bgl, &program);
        if let Some(err) = pollster::block_on(pipeline_scope.pop()) {
            let log = err.to_string();
            log::error!("render pipeline rejected by the device: {log}");
            return Err(ConfigurationError::ProgramLink { log });
        }

        let resource_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let quad_vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("solstice quad vbo"),
            contents: bytemuck::cast_slice(&FULLSCREEN_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let day = MapTexture::load(device, queue, "solstice day map", day_texture, max_dimension)?;
        let night =
            MapTexture::load(device, queue, "solstice night map", night_texture, max_dimension)?;

        let uniforms = FrameUniforms {
            sun_dir: [1.0, 0.0, 0.0],
            twilight: TWILIGHT_BAND,
            resolution: viewport.resolution(),
            _pad: [0.0; 2],
        };
        let frame_ubo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("solstice frame ubo"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let sampler = map_sampler(device);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("solstice planet bind group"),
            layout: &bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_ubo.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&day.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&night.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("solstice render target"),
            size: wgpu::Extent3d {
                width: viewport.width,
                height: viewport.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("solstice readback"),
            size: readback_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        if let Some(err) = pollster::block_on(resource_scope.pop()) {
            return Err(ConfigurationError::Device {
                reason: format!("failed to allocate render resources: {err}"),
            });
        }

        log::debug!(
            "maps bound: day {}x{}, night {}x{}",
            day.width,
            day.height,
            night.width,
            night.height
        );

        Ok(Self {
            gpu,
            viewport,
            pipeline,
            bind_group,
            frame_ubo,
            quad_vbo,
            day,
            night,
            target,
            target_view,
            readback,
            unpadded_bytes_per_row,
            padded_bytes_per_row,
        })
    }

    /// Source map sizes as `((day_w, day_h), (night_w, night_h))`.
    pub fn map_sizes(&self) -> ((u32, u32), (u32, u32)) {
        (
            (self.day.width, self.day.height),
            (self.night.width, self.night.height),
        )
    }

    /// Draws one frame lit from `sun` and reads it back.
    ///
    /// Only the sun-direction uniform changes; the same direction always
    /// yields the same pixels for a given device.
    pub fn render_frame(&mut self, sun: SunDirection) -> Result<PixelBuffer, RenderError> {
        let device = self.gpu.device();
        let queue = self.gpu.queue();

        let sun_dir = sun.vector().to_f32_array();
        queue.write_buffer(&self.frame_ubo, SUN_DIR_OFFSET, bytemuck::cast_slice(&sun_dir));

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("solstice frame encoder"),
        });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("solstice planet pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.bind_group, &[]);
            rpass.set_vertex_buffer(0, self.quad_vbo.slice(..));
            rpass.draw(0..FULLSCREEN_QUAD.len() as u32, 0..1);
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.viewport.height),
                },
            },
            wgpu::Extent3d {
                width: self.viewport.width,
                height: self.viewport.height,
                depth_or_array_layers: 1,
            },
        );

        queue.submit(std::iter::once(encoder.finish()));

        let data = self.read_back()?;
        PixelBuffer::from_rgba8(self.viewport, data)
    }

    fn read_back(&self) -> Result<Vec<u8>, RenderError> {
        let slice = self.readback.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        self.gpu
            .wait_idle()
            .map_err(|e| RenderError::Poll(e.to_string()))?;

        rx.recv()
            .map_err(|_| RenderError::BufferMap("map callback dropped".into()))?
            .map_err(|e| RenderError::BufferMap(e.to_string()))?;

        let frame = {
            let mapped = slice.get_mapped_range();
            copy_tight_rows(
                &mapped,
                self.unpadded_bytes_per_row,
                self.padded_bytes_per_row,
                self.viewport.height,
            )
        };
        self.readback.unmap();

        frame.ok_or(RenderError::SizeMismatch {
            expected: self.padded_bytes_per_row as usize * self.viewport.height as usize,
            actual: self.readback.size() as usize,
        })
    }
}

fn map_layout_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    bgl: &wgpu::BindGroupLayout,
    program: &LinkedProgram,
) -> wgpu::RenderPipeline {
    let vs_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("solstice vertex shader"),
        source: wgpu::ShaderSource::Wgsl(program.vertex.source.as_str().into()),
    });
    let fs_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("solstice fragment shader"),
        source: wgpu::ShaderSource::Wgsl(program.fragment.source.as_str().into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("solstice planet pipeline layout"),
        bind_group_layouts: &[bgl],
        immediate_size: 0,
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("solstice planet pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &vs_module,
            entry_point: Some(ShaderStage::Vertex.entry_point()),
            compilation_options: Default::default(),
            buffers: &[QuadVertex::layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: &fs_module,
            entry_point: Some(ShaderStage::Fragment.entry_point()),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: TARGET_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: image::Rgba<u8> = image::Rgba([255, 0, 0, 255]);
    const NIGHT: image::Rgba<u8> = image::Rgba([0, 0, 255, 255]);

    /// Builds a context over solid-color maps, or `None` when the machine has no adapter.
    fn context_or_skip(width: u32) -> Option<(RenderContext, tempfile::TempDir)> {
        let dir = tempfile::tempdir().unwrap();
        let day = dir.path().join("earth_day.png");
        let night = dir.path().join("earth_night.png");
        image::RgbaImage::from_pixel(64, 32, DAY).save(&day).unwrap();
        image::RgbaImage::from_pixel(64, 32, NIGHT).save(&night).unwrap();

        let settings = RenderSettings::new(width, &day, &night);
        match pollster::block_on(RenderContext::create(&settings)) {
            Ok(ctx) => Some((ctx, dir)),
            Err(ConfigurationError::Device { reason }) => {
                eprintln!("skipping GPU test: {reason}");
                None
            }
            Err(other) => panic!("render context failed: {other}"),
        }
    }

    #[test]
    fn frame_has_full_rgba_size() {
        let Some((mut ctx, _dir)) = context_or_skip(64) else { return };
        let frame = ctx.render_frame(SunDirection::from_lat_lon(0.0, 0.0)).unwrap();
        assert_eq!((frame.width(), frame.height()), (64, 32));
        assert_eq!(frame.as_bytes().len(), 64 * 32 * 4);
        assert_eq!(ctx.map_sizes(), ((64, 32), (64, 32)));
    }

    #[test]
    fn same_sun_renders_identical_bytes() {
        let Some((mut ctx, _dir)) = context_or_skip(128) else { return };
        let sun = SunDirection::from_lat_lon(23.4, -45.0);
        let a = ctx.render_frame(sun).unwrap();
        let _other = ctx.render_frame(SunDirection::from_lat_lon(-10.0, 120.0)).unwrap();
        let b = ctx.render_frame(sun).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn sub_solar_point_is_day_and_antipode_is_night() {
        let Some((mut ctx, _dir)) = context_or_skip(64) else { return };
        let frame = ctx.render_frame(SunDirection::from_lat_lon(0.0, 0.0)).unwrap();

        // Center of the image is lat 0, lon 0; the left edge is lon -180.
        let noon = frame.pixel(32, 16).unwrap();
        let midnight = frame.pixel(0, 16).unwrap();
        assert!(noon[0] > 200 && noon[2] < 55, "noon pixel {noon:?}");
        assert!(midnight[2] > 200 && midnight[0] < 55, "midnight pixel {midnight:?}");
        assert_eq!(noon[3], 255);
    }

    #[test]
    fn odd_width_is_rejected_before_touching_the_gpu() {
        let settings = RenderSettings::new(63, "day.png", "night.png");
        let err = pollster::block_on(RenderContext::create(&settings)).err().unwrap();
        assert_eq!(err, ConfigurationError::InvalidViewport { width: 63 });
    }

    #[test]
    fn missing_texture_fails_initialization() {
        let Some((_ctx, dir)) = context_or_skip(16) else { return };
        let settings = RenderSettings::new(16, dir.path().join("missing.png"), dir.path().join("earth_night.png"));
        let err = pollster::block_on(RenderContext::create(&settings)).err().unwrap();
        assert!(matches!(err, ConfigurationError::TextureLoad { .. }));
    }
}

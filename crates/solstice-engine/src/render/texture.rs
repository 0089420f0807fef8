//! Source map textures (day / night).

use std::path::Path;

use crate::error::ConfigurationError;

/// A decoded image uploaded to the GPU and bound by the planet pipeline.
pub(crate) struct MapTexture {
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    // Kept so the texture outlives every bind group built from `view`.
    _texture: wgpu::Texture,
}

/// Opens and decodes `path` into tightly packed RGBA8.
///
/// Any image format the `image` crate was built with is accepted; the result
/// is always converted to 8-bit RGBA.
pub(crate) fn decode_rgba(path: &Path) -> Result<image::RgbaImage, ConfigurationError> {
    log::info!("loading texture from {}", path.display());
    let image = image::open(path).map_err(|e| ConfigurationError::TextureLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(image.to_rgba8())
}

impl MapTexture {
    /// Decodes `path` and uploads it as a sampled `Rgba8Unorm` texture.
    pub fn load(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        path: &Path,
        max_dimension: u32,
    ) -> Result<Self, ConfigurationError> {
        let rgba = decode_rgba(path)?;
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 || width > max_dimension || height > max_dimension {
            return Err(ConfigurationError::TextureLoad {
                path: path.to_path_buf(),
                reason: format!(
                    "{width}x{height} is outside the device texture limit of {max_dimension}"
                ),
            });
        }

        let size = wgpu::Extent3d {
            width,
            height,
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

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            size,
        );

        log::info!("texture loaded: {} ({width}x{height})", path.display());

        Ok(Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            width,
            height,
            _texture: texture,
        })
    }
}

/// Linear filtering, edge-clamped on every axis.
pub(crate) fn map_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("solstice map sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    })
}

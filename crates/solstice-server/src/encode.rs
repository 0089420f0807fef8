//! PNG encoding of rendered frames.

use anyhow::Context;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use solstice_engine::{PixelBuffer, Viewport};

/// Encodes a frame as an 8-bit RGBA PNG.
pub fn encode_png(pixels: &PixelBuffer) -> Result<Vec<u8>, image::ImageError> {
    let Viewport { width, height } = pixels.viewport();
    let mut out = Vec::with_capacity(pixels.as_bytes().len() / 4);
    PngEncoder::new(&mut out).write_image(pixels.as_bytes(), width, height, ExtendedColorType::Rgba8)?;
    Ok(out)
}

/// [`encode_png`] on the blocking pool.
pub async fn encode_png_blocking(pixels: PixelBuffer) -> anyhow::Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || encode_png(&pixels))
        .await
        .context("png encoder task panicked")?
        .context("png encoding failed")
}

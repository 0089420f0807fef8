//! Offscreen planet rendering.
//!
//! A single full-screen quad is drawn into an RGBA8 target the size of the
//! output image; the fragment stage maps each pixel to a point on the sphere
//! and blends the night map into the day map across the terminator. The
//! target is copied into a mappable buffer and read back row by row.
//!
//! Convention:
//! - framebuffer row 0 is the top of the image (latitude +90)
//! - texture v = 0 is the first row of the source image

mod common;
mod context;
mod pixels;
pub(crate) mod shader;
pub(crate) mod texture;

pub use context::{RenderContext, RenderSettings};
pub use pixels::PixelBuffer;
pub use shader::ShaderSource;

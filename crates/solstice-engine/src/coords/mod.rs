//! Coordinate and geometry types used by the planet renderer.
//!
//! Model space:
//! - +X points at latitude 0, longitude 0
//! - +Y points at latitude 0, longitude 90°E
//! - +Z points at the north pole
//!
//! Output images are equirectangular: x spans longitude -180..180 left to
//! right, y spans latitude 90..-90 top to bottom.

mod sun;
mod vec3;
mod viewport;

pub use sun::SunDirection;
pub use vec3::Vec3;
pub use viewport::Viewport;

//! Solstice engine crate.
//!
//! This crate owns every GPU-facing piece of the planet renderer: the headless
//! device, shader compile/link, texture upload, the full-screen draw with
//! readback, and the dedicated worker thread that is the only place any of
//! those resources are ever touched.

pub mod coords;
pub mod device;
pub mod error;
pub mod logging;
pub mod render;
pub mod worker;

pub use coords::{SunDirection, Vec3, Viewport};
pub use error::{ConfigurationError, RenderError, ShaderStage};
pub use render::{PixelBuffer, RenderContext, RenderSettings, ShaderSource};
pub use worker::{FrameRenderer, JobId, RenderJob, RenderWorker, WorkerMessage};

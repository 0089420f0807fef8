//! Headless GPU device management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue without any surface
//! - exposing device limits needed to validate the output size

mod gpu;
mod init;

pub use gpu::Gpu;
pub use init::GpuInit;

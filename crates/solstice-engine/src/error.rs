use std::fmt;
use std::path::PathBuf;

/// Pipeline stage a shader source unit compiles to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Entry point each stage must export.
    pub const fn entry_point(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Fragment => "fs_main",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Failure while bringing up the render context.
///
/// Every variant is fatal: there is no degraded mode, and the hosting process
/// is expected to log the cause and exit.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// No usable adapter/device.
    Device { reason: String },
    /// Output width is zero, odd, or exceeds the device texture limit.
    InvalidViewport { width: u32 },
    /// A shader override file could not be read.
    ShaderRead { path: PathBuf, reason: String },
    /// A shader stage failed to parse or validate. `log` carries the compiler diagnostics.
    ShaderCompile { stage: ShaderStage, log: String },
    /// The two stages do not form a valid program.
    ProgramLink { log: String },
    /// A texture image could not be opened or decoded.
    TextureLoad { path: PathBuf, reason: String },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::Device { reason } => {
                write!(f, "GPU device unavailable: {reason}")
            }
            ConfigurationError::InvalidViewport { width } => {
                write!(f, "invalid output width {width}: must be even, non-zero and within device limits")
            }
            ConfigurationError::ShaderRead { path, reason } => {
                write!(f, "failed to read shader {}: {reason}", path.display())
            }
            ConfigurationError::ShaderCompile { stage, log } => {
                write!(f, "Shader compile error ({stage}): {log}")
            }
            ConfigurationError::ProgramLink { log } => write!(f, "Program link error: {log}"),
            ConfigurationError::TextureLoad { path, reason } => {
                write!(f, "failed to load texture {}: {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Failure while rendering a single frame after initialization succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// Waiting for the GPU to finish the submitted work failed.
    Poll(String),
    /// Mapping the readback buffer failed.
    BufferMap(String),
    /// Pixel data does not match `width * height * 4`.
    SizeMismatch { expected: usize, actual: usize },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Poll(reason) => write!(f, "device poll failed: {reason}"),
            RenderError::BufferMap(reason) => write!(f, "readback mapping failed: {reason}"),
            RenderError::SizeMismatch { expected, actual } => {
                write!(f, "pixel buffer has {actual} bytes, expected {expected}")
            }
        }
    }
}

impl std::error::Error for RenderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_names_stage() {
        let err = ConfigurationError::ShaderCompile {
            stage: ShaderStage::Fragment,
            log: "unknown identifier `foo`".into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Shader compile error (fragment)"));
        assert!(msg.contains("unknown identifier"));
    }

    #[test]
    fn entry_points_match_stage() {
        assert_eq!(ShaderStage::Vertex.entry_point(), "vs_main");
        assert_eq!(ShaderStage::Fragment.entry_point(), "fs_main");
    }
}

use crate::coords::SunDirection;
use crate::error::{ConfigurationError, RenderError};
use crate::render::{PixelBuffer, RenderContext};

/// Correlates a job with its result. Allocated by the submitter.
pub type JobId = u64;

/// One frame to render, lit from a sub-solar point given in degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RenderJob {
    pub id: JobId,
    pub latitude_degrees: f64,
    pub longitude_degrees: f64,
}

impl RenderJob {
    pub fn new(id: JobId, latitude_degrees: f64, longitude_degrees: f64) -> Self {
        Self {
            id,
            latitude_degrees,
            longitude_degrees,
        }
    }

    pub fn sun(&self) -> SunDirection {
        SunDirection::from_lat_lon(self.latitude_degrees, self.longitude_degrees)
    }
}

/// Everything the worker reports back.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Initialization finished; jobs are now being rendered.
    Ready,
    /// Initialization failed. The worker has exited.
    Failed { error: ConfigurationError },
    /// A job finished.
    Rendered { id: JobId, pixels: PixelBuffer },
    /// A job could not be rendered. The worker keeps going.
    JobFailed { id: JobId, error: RenderError },
}

/// Something that turns a sun direction into a frame.
///
/// [`RenderContext`] is the real implementation; tests drive the worker with
/// CPU fakes.
pub trait FrameRenderer {
    fn render_frame(&mut self, sun: SunDirection) -> Result<PixelBuffer, RenderError>;
}

impl FrameRenderer for RenderContext {
    fn render_frame(&mut self, sun: SunDirection) -> Result<PixelBuffer, RenderError> {
        RenderContext::render_frame(self, sun)
    }
}

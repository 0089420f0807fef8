use std::fmt;

use solstice_engine::JobId;

/// Why a submitted job did not produce a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// Too many jobs outstanding; nothing was submitted.
    Overloaded { limit: usize },
    /// The render worker failed or exited.
    WorkerGone,
    /// The worker could not render this job.
    RenderFailed { id: JobId, reason: String },
    /// The correlation was dropped before a result arrived.
    Cancelled,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Overloaded { limit } => {
                write!(f, "renderer is overloaded ({limit} jobs outstanding)")
            }
            DispatchError::WorkerGone => f.write_str("render worker is not running"),
            DispatchError::RenderFailed { id, reason } => {
                write!(f, "job {id} failed to render: {reason}")
            }
            DispatchError::Cancelled => f.write_str("job result was abandoned"),
        }
    }
}

impl std::error::Error for DispatchError {}

//! The render worker thread.
//!
//! All GPU state lives on one dedicated OS thread. The worker builds its
//! renderer on that thread, reports readiness (or the fatal reason it could
//! not start), then renders jobs strictly in arrival order until every job
//! sender has been dropped.
//!
//! Jobs go in over a std channel, since the worker blocks on it; results come
//! out over a tokio channel so async code can await them without a bridge.

mod job;
mod thread;

pub use job::{FrameRenderer, JobId, RenderJob, WorkerMessage};
pub use thread::RenderWorker;

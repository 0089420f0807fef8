use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::Arc;

use parking_lot::Mutex;
use solstice_engine::{ConfigurationError, JobId, PixelBuffer, RenderJob, WorkerMessage};
use tokio::sync::oneshot;

use super::correlator::{Completion, ResultCorrelator};
use super::DispatchError;

/// Render worker lifecycle as seen from the coordinating side.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Readiness {
    Initializing,
    Ready,
    Failed,
}

struct State {
    next_id: JobId,
    readiness: Readiness,
    backlog: VecDeque<RenderJob>,
    correlator: ResultCorrelator,
}

/// Assigns ids, gates delivery on worker readiness and routes results back.
///
/// Id allocation and the forward-or-queue decision happen under one lock,
/// so the worker receives jobs in id order.
pub struct Dispatcher {
    jobs: mpsc::Sender<RenderJob>,
    max_pending: usize,
    state: Mutex<State>,
}

impl Dispatcher {
    /// `jobs` is the worker's inbound channel. At most `max_pending` jobs may
    /// be queued or in flight at once.
    pub fn new(jobs: mpsc::Sender<RenderJob>, max_pending: usize) -> Self {
        Self {
            jobs,
            max_pending,
            state: Mutex::new(State {
                next_id: 0,
                readiness: Readiness::Initializing,
                backlog: VecDeque::new(),
                correlator: ResultCorrelator::new(),
            }),
        }
    }

    pub fn readiness(&self) -> Readiness {
        self.state.lock().readiness
    }

    /// Jobs submitted and not yet completed or abandoned.
    pub fn pending(&self) -> usize {
        self.state.lock().correlator.len()
    }

    /// Submits a job and returns the ticket its frame will arrive on.
    ///
    /// The job goes straight to the worker once it is ready; before that it
    /// waits in the backlog.
    pub fn submit(
        self: &Arc<Self>,
        latitude_degrees: f64,
        longitude_degrees: f64,
    ) -> Result<Ticket, DispatchError> {
        let mut state = self.state.lock();

        match state.readiness {
            Readiness::Failed => return Err(DispatchError::WorkerGone),
            _ if state.correlator.len() >= self.max_pending => {
                log::warn!("rejecting job: {} already outstanding", state.correlator.len());
                return Err(DispatchError::Overloaded {
                    limit: self.max_pending,
                });
            }
            _ => {}
        }

        let id = state.next_id;
        state.next_id += 1;
        let completion = state.correlator.register(id);
        let job = RenderJob::new(id, latitude_degrees, longitude_degrees);

        if state.readiness == Readiness::Ready {
            if self.jobs.send(job).is_err() {
                state.correlator.forget(id);
                Self::worker_lost(&mut state);
                return Err(DispatchError::WorkerGone);
            }
            log::debug!("job {id} forwarded");
        } else {
            state.backlog.push_back(job);
            log::debug!("job {id} queued until the worker is ready");
        }

        Ok(Ticket {
            id,
            completion: Some(completion),
            dispatcher: Arc::clone(self),
        })
    }

    /// Applies one message from the worker.
    ///
    /// Returns the worker's initialization error when it reports one; every
    /// pending caller has been rejected by then.
    pub fn handle(&self, message: WorkerMessage) -> Result<(), ConfigurationError> {
        match message {
            WorkerMessage::Ready => self.mark_ready(),
            WorkerMessage::Failed { error } => {
                Self::worker_lost(&mut self.state.lock());
                return Err(error);
            }
            WorkerMessage::Rendered { id, pixels } => self.complete(id, Ok(pixels)),
            WorkerMessage::JobFailed { id, error } => self.complete(
                id,
                Err(DispatchError::RenderFailed {
                    id,
                    reason: error.to_string(),
                }),
            ),
        }
        Ok(())
    }

    /// Marks the worker as gone after its message channel closed.
    pub fn worker_exited(&self) {
        Self::worker_lost(&mut self.state.lock());
    }

    fn mark_ready(&self) {
        let mut state = self.state.lock();
        if state.readiness != Readiness::Initializing {
            log::warn!("ignoring readiness signal in state {:?}", state.readiness);
            return;
        }

        state.readiness = Readiness::Ready;
        let queued = state.backlog.len();
        while let Some(job) = state.backlog.pop_front() {
            if self.jobs.send(job).is_err() {
                Self::worker_lost(&mut state);
                return;
            }
        }
        log::info!("render worker ready; flushed {queued} queued jobs");
    }

    fn complete(&self, id: JobId, completion: Completion) {
        self.state.lock().correlator.resolve(id, completion);
    }

    fn forget(&self, id: JobId) {
        if self.state.lock().correlator.forget(id) {
            log::debug!("job {id} abandoned by its caller");
        }
    }

    fn worker_lost(state: &mut State) {
        state.readiness = Readiness::Failed;
        state.backlog.clear();
        state.correlator.fail_all(&DispatchError::WorkerGone);
    }
}

/// A submitted job's claim on its frame.
///
/// Dropping a ticket before its frame arrives removes the correlation, and a
/// late result for it is discarded.
pub struct Ticket {
    id: JobId,
    completion: Option<oneshot::Receiver<Completion>>,
    dispatcher: Arc<Dispatcher>,
}

impl Ticket {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Waits for the frame.
    pub async fn wait(mut self) -> Result<PixelBuffer, DispatchError> {
        let Some(completion) = self.completion.take() else {
            return Err(DispatchError::Cancelled);
        };
        completion.await.unwrap_or(Err(DispatchError::Cancelled))
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.dispatcher.forget(self.id);
    }
}

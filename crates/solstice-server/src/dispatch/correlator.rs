use std::collections::HashMap;

use solstice_engine::{JobId, PixelBuffer};
use tokio::sync::oneshot;

use super::DispatchError;

pub(crate) type Completion = Result<PixelBuffer, DispatchError>;

/// Maps job ids to the one-shot completion their caller is waiting on.
///
/// An entry is inserted before its job can reach the worker and removed
/// exactly once: by a result, by the caller giving up, or by a worker failure.
#[derive(Default)]
pub struct ResultCorrelator {
    pending: HashMap<JobId, oneshot::Sender<Completion>>,
}

impl ResultCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` and returns the receiving half of its completion.
    pub(crate) fn register(&mut self, id: JobId) -> oneshot::Receiver<Completion> {
        let (tx, rx) = oneshot::channel();
        let previous = self.pending.insert(id, tx);
        debug_assert!(previous.is_none(), "job id {id} registered twice");
        rx
    }

    /// Completes and removes `id`. Returns `false` for an unknown id, in
    /// which case `completion` is dropped.
    pub(crate) fn resolve(&mut self, id: JobId, completion: Completion) -> bool {
        match self.pending.remove(&id) {
            Some(tx) => {
                if tx.send(completion).is_err() {
                    log::debug!("caller for job {id} went away before its result");
                }
                true
            }
            None => {
                log::debug!("dropping result for unknown job {id}");
                false
            }
        }
    }

    /// Removes `id` without completing it.
    pub fn forget(&mut self, id: JobId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Completes every pending entry with `error`.
    pub fn fail_all(&mut self, error: &DispatchError) {
        for (_, tx) in self.pending.drain() {
            let _ = tx.send(Err(error.clone()));
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.pending.contains_key(&id)
    }
}

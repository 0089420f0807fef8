//! Job dispatch and result correlation.
//!
//! The [`Dispatcher`] is the single owner of the coordinating side's mutable
//! state: the id counter, worker readiness, the backlog of jobs submitted
//! before the worker was ready, and the [`ResultCorrelator`].

mod correlator;
mod dispatcher;
mod error;

pub use correlator::ResultCorrelator;
pub use dispatcher::{Dispatcher, Readiness, Ticket};
pub use error::DispatchError;

//! Cooperative cancellation for runs.
//!
//! A [`CancellationToken`] plays the role of the run's execution context:
//! cancelling it stops the scheduling loop from launching new stages.

mod token;

pub use token::{CancelCallback, CancellationToken};

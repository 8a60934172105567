//! Stage change notification.
//!
//! The executor reports every state transition to a single change callback.
//! The callback runs synchronously inside the scheduling path, so it must not
//! block and must not call back into the executor.

mod change;

pub use change::{logging_callback, noop_callback, ChangeCallback, StageChange};

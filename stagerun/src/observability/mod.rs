//! Logging setup.
//!
//! The executor itself only emits `tracing` events; installing a subscriber
//! is left to the application. [`init_tracing`] is a convenience for binaries
//! and demos.

mod logging;

pub use logging::{init_tracing, LoggingConfig};

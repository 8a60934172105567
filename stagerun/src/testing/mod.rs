//! Testing utilities for stagerun graphs.
//!
//! This module provides:
//! - A recorder for the order in which stage actions ran
//! - A recorder for the change callback stream

mod recorders;

pub use recorders::{ChangeRecorder, VisitRecorder};

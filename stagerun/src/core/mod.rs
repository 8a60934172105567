//! Core domain model types for stagerun.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage names, including the reserved `start`, `end` and `final` markers
//! - The stage state machine
//! - Recorded stage failures

mod failure;
mod name;
mod status;

pub use failure::StageFailure;
pub use name::StageName;
pub use status::StageState;

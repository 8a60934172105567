//! Stage graph declaration and execution.
//!
//! This module provides:
//! - Stage records and the registry that validates them
//! - The scheduling loop that runs independent stages concurrently
//! - The public [`Executor`] handle

mod dag;
mod executor;
mod registry;
mod spec;

pub use executor::Executor;
pub use registry::Registry;
pub use spec::StageSpec;

//! # Stagerun
//!
//! An in-process executor for named stages ordered by a dependency graph.
//!
//! Stagerun provides:
//!
//! - **Dependency-ordered execution**: a stage starts as soon as every stage it
//!   depends on has finished successfully, so independent stages run
//!   concurrently
//! - **Skip propagation**: when a stage fails or is skipped, everything that
//!   depends on it is skipped instead of run
//! - **Cooperative cancellation**: cancelling the run stops new launches and
//!   skips whatever has not started
//! - **Change notification**: every state transition is reported to a single
//!   callback
//! - **Finalizer**: one action that runs after the graph, whatever the outcome
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagerun::prelude::*;
//!
//! let mut executor = Executor::new();
//! executor
//!     .declare("load", load_users, [StageName::START])
//!     .declare("enrich", enrich_users, ["load"])
//!     .declare("payments", load_payments, ["load"])
//!     .set_terminal(["enrich", "payments"]);
//!
//! executor.start(CancellationToken::shared())?;
//! executor.wait().await?;
//!
//! for failure in executor.errors() {
//!     eprintln!("{failure}");
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::ExecutorConfig;
    pub use crate::context::StageContext;
    pub use crate::core::{StageFailure, StageName, StageState};
    pub use crate::errors::StagerunError;
    pub use crate::events::{logging_callback, ChangeCallback, StageChange};
    pub use crate::observability::{init_tracing, LoggingConfig};
    pub use crate::pipeline::{Executor, Registry, StageSpec};
    pub use crate::stages::{NoOpAction, StageAction, StageResult};
}

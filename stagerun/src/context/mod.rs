//! Per-stage execution context.

mod stage;

pub use stage::StageContext;

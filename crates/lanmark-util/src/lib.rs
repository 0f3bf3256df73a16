//! Shared utilities for lanmark.
//!
//! - Logging setup with tracing
//! - RAII-based timing for processing steps

pub mod log;
pub mod timing;

pub use log::{LogConfig, LogLevel};
pub use timing::TimingGuard;

//! RAII-based timing for processing steps.
//!
//! # Example
//!
//! ```rust,ignore
//! use lanmark_util::timing::TimingGuard;
//!
//! fn process(token: u64) {
//!     let _timing = TimingGuard::process(token.to_string());
//!     // ... drain native results, run continuations ...
//!     // Duration is logged when _timing is dropped
//! }
//! ```

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// RAII guard that measures and logs the duration of an operation.
///
/// Fast steps are logged at debug level, steps over the info threshold at
/// info, and anything over the warn threshold at warn. Continuations run
/// inside processing steps, so a slow step usually means a slow continuation.
pub struct TimingGuard {
    operation_type: &'static str,
    operation_name: String,
    start: Instant,
    info_threshold_ms: u64,
    warn_threshold_ms: u64,
}

impl TimingGuard {
    pub fn new(operation_type: &'static str, operation_name: impl Into<String>) -> Self {
        Self {
            operation_type,
            operation_name: operation_name.into(),
            start: Instant::now(),
            info_threshold_ms: 50,
            warn_threshold_ms: 500,
        }
    }

    /// Guard for one pump processing step.
    pub fn process(name: impl Into<String>) -> Self {
        Self::new("process", name)
    }

    pub fn with_info_threshold(mut self, ms: u64) -> Self {
        self.info_threshold_ms = ms;
        self
    }

    pub fn with_warn_threshold(mut self, ms: u64) -> Self {
        self.warn_threshold_ms = ms;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }
}

fn format_duration(duration_ms: u128) -> String {
    if duration_ms < 1000 {
        format!("{duration_ms}ms")
    } else {
        format!("{:.2}s", duration_ms as f64 / 1000.0)
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let duration_ms = self.start.elapsed().as_millis();
        let duration = format_duration(duration_ms);

        if duration_ms >= u128::from(self.warn_threshold_ms) {
            warn!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration_ms = duration_ms as u64,
                duration = %duration,
                "Slow operation completed"
            );
        } else if duration_ms >= u128::from(self.info_threshold_ms) {
            info!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration_ms = duration_ms as u64,
                duration = %duration,
                "Operation completed"
            );
        } else {
            debug!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration_ms = duration_ms as u64,
                "Operation completed"
            );
        }
    }
}

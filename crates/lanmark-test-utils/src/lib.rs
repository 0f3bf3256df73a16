//! Testing utilities for lanmark.
//!
//! - **Facility**: an in-process [`SimulatedFacility`] whose operations are
//!   backed by real socket pairs, so the event pump polls them like native ones
//! - **Recorder**: collects what continuations receive
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use lanmark_discover::{EventPump, RegisterParams, ServiceHandle};
//! use lanmark_test_utils::{Recorder, SimulatedFacility};
//! use std::time::Duration;
//!
//! let facility = SimulatedFacility::new();
//! let pump = EventPump::new(facility.clone());
//! let handle = ServiceHandle::new();
//! let results = Recorder::new();
//!
//! pump.registrar()
//!     .register(&handle, &RegisterParams::new("_http._tcp", 8080), results.once_sink())
//!     .unwrap();
//! facility.last_operation().unwrap().acknowledge_registration();
//! pump.poll(Duration::from_millis(100)).unwrap();
//! assert_eq!(results.len(), 1);
//! ```

pub mod facility;
pub mod recorder;

pub use facility::{SimulatedFacility, SimulatedOperation};
pub use recorder::Recorder;

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_logging() {
    let config = lanmark_util::LogConfig::default().with_level(lanmark_util::LogLevel::Warn);
    let _ = lanmark_util::log::init(&config);
}

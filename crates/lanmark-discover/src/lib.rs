//! DNS-SD service registration and resolution for lanmark.
//!
//! This crate publishes services on the local network and resolves named
//! service instances to a host, port and TXT metadata through a native DNS-SD
//! facility (Bonjour, or the avahi compatibility library).
//!
//! Everything runs on one thread. An [`EventPump`] watches the socket of each
//! active [`ServiceHandle`] and, when it turns readable, has the native side
//! process pending results. Results are delivered to the continuation the
//! caller supplied when starting the handle.
//!
//! # Example: Registering a Service
//!
//! ```rust,ignore
//! use lanmark_discover::{BonjourFacility, EventPump, RegisterParams, ServiceHandle};
//!
//! let pump = EventPump::new(BonjourFacility::new());
//! let handle = ServiceHandle::new();
//!
//! pump.registrar().register(
//!     &handle,
//!     &RegisterParams::new("_http._tcp", 8080).with_name("My Web Server"),
//!     |result| match result {
//!         Ok(registration) => println!("Registered {registration}"),
//!         Err(err) => eprintln!("Registration failed: {err}"),
//!     },
//! )?;
//!
//! // The service stays published while the handle is active.
//! pump.run_for(std::time::Duration::from_secs(30))?;
//! handle.stop();
//! ```
//!
//! # Example: Resolving a Service
//!
//! ```rust,ignore
//! use lanmark_discover::{BonjourFacility, EventPump, ResolveParams, ServiceHandle};
//!
//! let pump = EventPump::new(BonjourFacility::new());
//! let handle = ServiceHandle::new();
//!
//! let params = ResolveParams::new("My Web Server", "_http._tcp", "local.");
//! pump.resolver().resolve(&handle, &params, |result| {
//!     if let Ok(service) = result {
//!         println!("Found: {} at {}:{}", service.fullname, service.host_target, service.port);
//!     }
//! })?;
//!
//! pump.run_for(std::time::Duration::from_secs(3))?;
//! handle.stop();
//! ```
//!
//! The native binding is behind the `native` feature. Without it the crate
//! builds against any [`DnsSdFacility`] implementation.

mod config;
mod error;
mod facility;
mod flags;
mod handle;
#[cfg(feature = "native")]
mod native;
mod pump;
mod registrar;
mod request;
mod resolver;
mod service;
mod txt;

pub use config::{ConfigError, DiscoverConfig};
pub use error::{
    check_native, map_native_error, DiscoverError, NativeError, NativeErrorKind,
    ValidationError, NO_ERROR,
};
pub use facility::{
    DnsSdFacility, NativeOperation, NativeReply, PROCESS_OPERATION, REGISTER_OPERATION,
    RESOLVE_OPERATION,
};
pub use flags::{InterfaceIndex, ServiceFlags};
pub use handle::{
    Continuation, HandleState, RegisterCallback, ResolveCallback, ServiceHandle,
};
#[cfg(feature = "native")]
pub use native::BonjourFacility;
pub use pump::{EventPump, HandleToken};
pub use registrar::Registrar;
pub use request::{
    OperationKind, OperationRequest, RegisterParams, RegisterRequest, ResolveParams,
    ResolveRequest,
};
pub use resolver::{ResolveReceiver, Resolver};
pub use service::{Registration, ResolvedService};
pub use txt::{TxtError, TxtRecord, MAX_ENTRY_LEN, MAX_RECORD_LEN};

/// Config constants (`FILE_NAME`, `ENV_*`).
pub mod config_keys {
    pub use crate::config::{ENV_LOG_LEVEL, ENV_MAX_HANDLES, ENV_POLL_INTERVAL_MS, FILE_NAME};
}

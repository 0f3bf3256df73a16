//! The seam to the native discovery facility.
//!
//! The facility speaks the wire protocol. This crate only starts operations on
//! it, watches each operation's socket, and asks it to process pending results
//! when the socket turns readable.

use std::os::unix::io::RawFd;

use crate::flags::{InterfaceIndex, ServiceFlags};
use crate::request::{RegisterRequest, ResolveRequest};

/// Native call names used in error messages.
pub const REGISTER_OPERATION: &str = "DNSServiceRegister()";
pub const RESOLVE_OPERATION: &str = "DNSServiceResolve()";
pub const PROCESS_OPERATION: &str = "DNSServiceProcessResult()";

/// One notification produced by the native facility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeReply {
    /// Outcome of a registration.
    Registered {
        flags: ServiceFlags,
        error_code: i32,
        name: String,
        service_type: String,
        domain: String,
    },
    /// One resolve result.
    Resolved {
        flags: ServiceFlags,
        interface_index: InterfaceIndex,
        error_code: i32,
        fullname: String,
        host_target: String,
        /// Host byte order.
        port: u16,
        txt: Vec<u8>,
    },
}

impl NativeReply {
    pub fn error_code(&self) -> i32 {
        match self {
            NativeReply::Registered { error_code, .. } | NativeReply::Resolved { error_code, .. } => {
                *error_code
            }
        }
    }
}

/// A started native operation.
///
/// Dropping it releases the native resource and closes its socket.
pub trait NativeOperation {
    /// Descriptor that turns readable when results are pending.
    fn socket(&self) -> RawFd;

    /// Process pending results, calling `deliver` once per queued notification
    /// in native order before returning. `Err` carries a native result code.
    fn process_result(&mut self, deliver: &mut dyn FnMut(NativeReply)) -> Result<(), i32>;
}

/// Starts native operations. `Err` carries the native result code.
pub trait DnsSdFacility {
    fn register(&self, request: &RegisterRequest) -> Result<Box<dyn NativeOperation>, i32>;

    fn resolve(&self, request: &ResolveRequest) -> Result<Box<dyn NativeOperation>, i32>;
}

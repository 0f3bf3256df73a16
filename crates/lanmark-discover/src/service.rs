//! Records delivered to continuations.

use std::fmt;

use crate::flags::{InterfaceIndex, ServiceFlags};
use crate::txt::{TxtError, TxtRecord};

/// A resolved service instance, produced fresh for every native notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedService {
    /// Full DNS name of the instance (e.g. `My Printer._ipp._tcp.local.`).
    pub fullname: String,
    /// Host name to connect to.
    pub host_target: String,
    /// Port in host byte order.
    pub port: u16,
    /// Raw TXT metadata.
    pub txt: Vec<u8>,
    pub interface_index: InterfaceIndex,
    pub flags: ServiceFlags,
}

impl ResolvedService {
    /// Decode the TXT metadata.
    pub fn txt_record(&self) -> Result<TxtRecord, TxtError> {
        TxtRecord::from_bytes(&self.txt)
    }

    /// Whether the native facility had more notifications queued behind this one.
    pub fn more_coming(&self) -> bool {
        self.flags.contains(ServiceFlags::MORE_COMING)
    }
}

impl fmt::Display for ResolvedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}:{})",
            self.fullname,
            self.host_target.trim_end_matches('.'),
            self.port
        )
    }
}

/// What the native facility actually published.
///
/// The name can differ from the requested one after an automatic rename, and
/// the domain is filled in when the request left it to the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub service_type: String,
    pub domain: String,
    pub flags: ServiceFlags,
}

impl Registration {
    /// `name.service_type.domain.`
    pub fn fullname(&self) -> String {
        format!(
            "{}.{}.{}.",
            self.name,
            self.service_type.trim_end_matches('.'),
            self.domain.trim_end_matches('.')
        )
    }
}

impl fmt::Display for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fullname())
    }
}

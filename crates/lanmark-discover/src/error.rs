//! Error types for the discover crate.
//!
//! Synchronous failures surface as [`DiscoverError`]. Failures reported by the
//! native facility after an operation has started are delivered to the
//! operation's continuation as a [`NativeError`], built by [`map_native_error`].

use thiserror::Error;

/// Errors returned directly from handle, registrar, resolver and pump calls.
#[derive(Debug, Error)]
pub enum DiscoverError {
    /// An argument was malformed or out of range. Nothing was started.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The handle has already been started (or stopped).
    #[error("Service handle is already initialized")]
    AlreadyInitialized,

    /// The native facility refused to start the operation.
    #[error("Native error: {0}")]
    Native(#[from] NativeError),

    /// A socket or capacity problem outside the native facility.
    #[error("Resource error: {0}")]
    Resource(String),
}

impl DiscoverError {
    /// Create a resource error.
    pub fn resource(message: impl Into<String>) -> Self {
        Self::Resource(message.into())
    }

    /// The native error, if this is one.
    pub fn as_native(&self) -> Option<&NativeError> {
        match self {
            Self::Native(err) => Some(err),
            _ => None,
        }
    }
}

/// A rejected argument.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("argument `{field}`: {reason}")]
pub struct ValidationError {
    /// Name of the offending parameter.
    pub field: &'static str,
    /// Why it was rejected.
    pub reason: String,
}

impl ValidationError {
    /// Reject `field` for `reason`.
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// The DNS-SD "no error" result code.
pub const NO_ERROR: i32 = 0;

/// Classification of a native DNS-SD result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeErrorKind {
    Unknown,
    NoSuchName,
    NoMemory,
    BadParam,
    BadReference,
    BadState,
    BadFlags,
    Unsupported,
    NotInitialized,
    AlreadyRegistered,
    NameConflict,
    Invalid,
    Firewall,
    Incompatible,
    BadInterfaceIndex,
    Refused,
    NoSuchRecord,
    NoAuth,
    NoSuchKey,
    NatTraversal,
    DoubleNat,
    BadTime,
    BadSignature,
    BadKey,
    Transient,
    ServiceNotRunning,
    NatPortMappingUnsupported,
    NatPortMappingDisabled,
    NoRouter,
    PollingMode,
    Timeout,
    /// A code outside the known table. The raw code is kept on the error.
    Unrecognized,
}

/// Known codes, in the order the native header declares them.
const KNOWN_CODES: &[(i32, NativeErrorKind)] = &[
    (-65537, NativeErrorKind::Unknown),
    (-65538, NativeErrorKind::NoSuchName),
    (-65539, NativeErrorKind::NoMemory),
    (-65540, NativeErrorKind::BadParam),
    (-65541, NativeErrorKind::BadReference),
    (-65542, NativeErrorKind::BadState),
    (-65543, NativeErrorKind::BadFlags),
    (-65544, NativeErrorKind::Unsupported),
    (-65545, NativeErrorKind::NotInitialized),
    (-65547, NativeErrorKind::AlreadyRegistered),
    (-65548, NativeErrorKind::NameConflict),
    (-65549, NativeErrorKind::Invalid),
    (-65550, NativeErrorKind::Firewall),
    (-65551, NativeErrorKind::Incompatible),
    (-65552, NativeErrorKind::BadInterfaceIndex),
    (-65553, NativeErrorKind::Refused),
    (-65554, NativeErrorKind::NoSuchRecord),
    (-65555, NativeErrorKind::NoAuth),
    (-65556, NativeErrorKind::NoSuchKey),
    (-65557, NativeErrorKind::NatTraversal),
    (-65558, NativeErrorKind::DoubleNat),
    (-65559, NativeErrorKind::BadTime),
    (-65560, NativeErrorKind::BadSignature),
    (-65561, NativeErrorKind::BadKey),
    (-65562, NativeErrorKind::Transient),
    (-65563, NativeErrorKind::ServiceNotRunning),
    (-65564, NativeErrorKind::NatPortMappingUnsupported),
    (-65565, NativeErrorKind::NatPortMappingDisabled),
    (-65566, NativeErrorKind::NoRouter),
    (-65567, NativeErrorKind::PollingMode),
    (-65568, NativeErrorKind::Timeout),
];

impl NativeErrorKind {
    /// Classify a native result code.
    pub fn from_code(code: i32) -> Self {
        KNOWN_CODES
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, kind)| *kind)
            .unwrap_or(NativeErrorKind::Unrecognized)
    }

    /// The native code for this kind, if it has exactly one.
    pub fn code(self) -> Option<i32> {
        KNOWN_CODES
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(code, _)| *code)
    }

    pub fn description(self) -> &'static str {
        match self {
            NativeErrorKind::Unknown => "unknown error",
            NativeErrorKind::NoSuchName => "no such name",
            NativeErrorKind::NoMemory => "out of memory",
            NativeErrorKind::BadParam => "bad parameter",
            NativeErrorKind::BadReference => "bad service reference",
            NativeErrorKind::BadState => "bad state",
            NativeErrorKind::BadFlags => "bad flags",
            NativeErrorKind::Unsupported => "unsupported operation",
            NativeErrorKind::NotInitialized => "service reference not initialized",
            NativeErrorKind::AlreadyRegistered => "already registered",
            NativeErrorKind::NameConflict => "name conflict",
            NativeErrorKind::Invalid => "invalid",
            NativeErrorKind::Firewall => "blocked by firewall",
            NativeErrorKind::Incompatible => "client library incompatible with daemon",
            NativeErrorKind::BadInterfaceIndex => "bad interface index",
            NativeErrorKind::Refused => "refused",
            NativeErrorKind::NoSuchRecord => "no such record",
            NativeErrorKind::NoAuth => "not authorized",
            NativeErrorKind::NoSuchKey => "no such key",
            NativeErrorKind::NatTraversal => "NAT traversal failed",
            NativeErrorKind::DoubleNat => "double NAT",
            NativeErrorKind::BadTime => "bad time",
            NativeErrorKind::BadSignature => "bad signature",
            NativeErrorKind::BadKey => "bad key",
            NativeErrorKind::Transient => "transient failure",
            NativeErrorKind::ServiceNotRunning => "discovery daemon not running",
            NativeErrorKind::NatPortMappingUnsupported => "NAT port mapping unsupported",
            NativeErrorKind::NatPortMappingDisabled => "NAT port mapping disabled",
            NativeErrorKind::NoRouter => "no router",
            NativeErrorKind::PollingMode => "polling mode",
            NativeErrorKind::Timeout => "timed out",
            NativeErrorKind::Unrecognized => "unrecognized error",
        }
    }
}

/// A classified native failure: `{kind, code, message}`.
///
/// Immutable once built; the only constructor is [`map_native_error`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct NativeError {
    kind: NativeErrorKind,
    code: i32,
    message: String,
}

impl NativeError {
    pub fn kind(&self) -> NativeErrorKind {
        self.kind
    }

    /// The raw native result code.
    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Map a native result code returned by `operation` into a [`NativeError`].
///
/// `operation` names the failing native call (e.g. `DNSServiceRegister()`)
/// and ends up in the message together with the raw code.
pub fn map_native_error(operation: &str, code: i32) -> NativeError {
    let kind = NativeErrorKind::from_code(code);
    let message = match kind {
        NativeErrorKind::Unrecognized => {
            format!("{operation} failed with native error code {code}")
        }
        known => format!("{operation}: {} ({code})", known.description()),
    };
    NativeError {
        kind,
        code,
        message,
    }
}

/// `Ok(())` for [`NO_ERROR`], the mapped error otherwise.
pub fn check_native(operation: &str, code: i32) -> Result<(), NativeError> {
    if code == NO_ERROR {
        Ok(())
    } else {
        Err(map_native_error(operation, code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_map_to_specific_kinds() {
        assert_eq!(
            NativeErrorKind::from_code(-65548),
            NativeErrorKind::NameConflict
        );
        assert_eq!(NativeErrorKind::from_code(-65568), NativeErrorKind::Timeout);
        assert_eq!(
            NativeErrorKind::from_code(-65538),
            NativeErrorKind::NoSuchName
        );
        assert_eq!(NativeErrorKind::from_code(-65537), NativeErrorKind::Unknown);
    }

    #[test]
    fn test_unrecognized_code_keeps_code_and_names_operation() {
        let err = map_native_error("DNSServiceResolve()", -42);
        assert_eq!(err.kind(), NativeErrorKind::Unrecognized);
        assert_eq!(err.code(), -42);
        assert!(err.message().contains("DNSServiceResolve()"));
        assert!(err.message().contains("-42"));
    }

    #[test]
    fn test_known_code_message_combines_operation_and_code() {
        let err = map_native_error("DNSServiceRegister()", -65548);
        assert_eq!(err.kind(), NativeErrorKind::NameConflict);
        assert_eq!(
            err.to_string(),
            "DNSServiceRegister(): name conflict (-65548)"
        );
    }

    #[test]
    fn test_gap_in_code_table_is_unrecognized() {
        // -65546 is not assigned in the native header.
        assert_eq!(
            NativeErrorKind::from_code(-65546),
            NativeErrorKind::Unrecognized
        );
    }

    #[test]
    fn test_kind_code_round_trips_through_table() {
        for (code, kind) in KNOWN_CODES {
            assert_eq!(kind.code(), Some(*code));
        }
        assert_eq!(NativeErrorKind::Unrecognized.code(), None);
    }

    #[test]
    fn test_check_native_accepts_no_error() {
        assert!(check_native("DNSServiceProcessResult()", NO_ERROR).is_ok());
        let err = check_native("DNSServiceProcessResult()", -65563).unwrap_err();
        assert_eq!(err.kind(), NativeErrorKind::ServiceNotRunning);
    }

    #[test]
    fn test_discover_error_display() {
        let err = DiscoverError::from(ValidationError::new("port", "out of range"));
        assert_eq!(
            err.to_string(),
            "Validation error: argument `port`: out of range"
        );
        assert_eq!(
            DiscoverError::AlreadyInitialized.to_string(),
            "Service handle is already initialized"
        );
        assert_eq!(
            DiscoverError::resource("poll failed").to_string(),
            "Resource error: poll failed"
        );
    }

    #[test]
    fn test_as_native_only_matches_native_variant() {
        let native = DiscoverError::from(map_native_error("DNSServiceRegister()", -65540));
        assert_eq!(
            native.as_native().map(NativeError::kind),
            Some(NativeErrorKind::BadParam)
        );
        assert!(DiscoverError::AlreadyInitialized.as_native().is_none());
    }
}

//! Operation parameters and their validation.
//!
//! Callers fill in [`RegisterParams`] or [`ResolveParams`], whose numeric
//! fields are wide enough to hold out-of-range input. Validation turns them
//! into an immutable [`RegisterRequest`] or [`ResolveRequest`] before any
//! native call is made.

use crate::error::ValidationError;
use crate::flags::{InterfaceIndex, ServiceFlags};
use crate::txt::{TxtRecord, MAX_RECORD_LEN};

/// Which native operation a handle runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Register,
    Resolve,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Register => write!(f, "register"),
            OperationKind::Resolve => write!(f, "resolve"),
        }
    }
}

/// Caller-supplied registration parameters.
#[derive(Debug, Clone, Default)]
pub struct RegisterParams {
    pub flags: i64,
    pub interface_index: i64,
    /// Instance name. `None` lets the native facility pick the machine name.
    pub name: Option<String>,
    pub service_type: String,
    /// `None` registers in the default domain(s).
    pub domain: Option<String>,
    /// `None` uses this machine's host name.
    pub host: Option<String>,
    pub port: i64,
    /// Encoded TXT metadata.
    pub metadata: Option<Vec<u8>>,
}

impl RegisterParams {
    pub fn new(service_type: impl Into<String>, port: i64) -> Self {
        Self {
            service_type: service_type.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_flags(mut self, flags: i64) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_interface_index(mut self, interface_index: i64) -> Self {
        self.interface_index = interface_index;
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<Vec<u8>>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn with_txt(self, txt: TxtRecord) -> Self {
        self.with_metadata(txt)
    }

    /// Check every field and produce the request handed to the native facility.
    pub fn validate(&self) -> Result<RegisterRequest, ValidationError> {
        let flags = validate_flags(self.flags)?;
        let interface_index = validate_interface_index(self.interface_index)?;
        let name = validate_optional("name", self.name.as_deref())?;
        let service_type = validate_required("service_type", &self.service_type)?;
        let domain = validate_optional("domain", self.domain.as_deref())?;
        let host = validate_optional("host", self.host.as_deref())?;
        let port = validate_port(self.port)?;
        let metadata = self
            .metadata
            .as_deref()
            .map(validate_metadata)
            .transpose()?;

        Ok(RegisterRequest {
            flags,
            interface_index,
            name,
            service_type,
            domain,
            host,
            port,
            metadata,
        })
    }
}

/// A validated, immutable registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    flags: ServiceFlags,
    interface_index: InterfaceIndex,
    name: Option<String>,
    service_type: String,
    domain: Option<String>,
    host: Option<String>,
    port: u16,
    metadata: Option<Vec<u8>>,
}

impl RegisterRequest {
    pub fn flags(&self) -> ServiceFlags {
        self.flags
    }

    pub fn interface_index(&self) -> InterfaceIndex {
        self.interface_index
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Port in host byte order.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn metadata(&self) -> Option<&[u8]> {
        self.metadata.as_deref()
    }
}

/// Caller-supplied resolve parameters.
#[derive(Debug, Clone, Default)]
pub struct ResolveParams {
    pub name: String,
    pub service_type: String,
    pub domain: String,
    pub interface_index: i64,
    pub flags: i64,
}

impl ResolveParams {
    pub fn new(
        name: impl Into<String>,
        service_type: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
            domain: domain.into(),
            ..Self::default()
        }
    }

    pub fn with_interface_index(mut self, interface_index: i64) -> Self {
        self.interface_index = interface_index;
        self
    }

    pub fn with_flags(mut self, flags: i64) -> Self {
        self.flags = flags;
        self
    }

    pub fn validate(&self) -> Result<ResolveRequest, ValidationError> {
        Ok(ResolveRequest {
            name: validate_required("name", &self.name)?,
            service_type: validate_required("service_type", &self.service_type)?,
            domain: validate_required("domain", &self.domain)?,
            interface_index: validate_interface_index(self.interface_index)?,
            flags: validate_flags(self.flags)?,
        })
    }
}

/// A validated, immutable resolve request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    name: String,
    service_type: String,
    domain: String,
    interface_index: InterfaceIndex,
    flags: ServiceFlags,
}

impl ResolveRequest {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn interface_index(&self) -> InterfaceIndex {
        self.interface_index
    }

    pub fn flags(&self) -> ServiceFlags {
        self.flags
    }
}

/// A validated request of either kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    Register(RegisterRequest),
    Resolve(ResolveRequest),
}

impl OperationRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationRequest::Register(_) => OperationKind::Register,
            OperationRequest::Resolve(_) => OperationKind::Resolve,
        }
    }

    pub fn service_type(&self) -> &str {
        match self {
            OperationRequest::Register(r) => r.service_type(),
            OperationRequest::Resolve(r) => r.service_type(),
        }
    }
}

fn validate_flags(flags: i64) -> Result<ServiceFlags, ValidationError> {
    u32::try_from(flags)
        .map(ServiceFlags::from_bits)
        .map_err(|_| ValidationError::new("flags", format!("{flags} is not a valid flag set")))
}

fn validate_interface_index(index: i64) -> Result<InterfaceIndex, ValidationError> {
    InterfaceIndex::from_signed(index).ok_or_else(|| {
        ValidationError::new(
            "interface_index",
            format!("{index} is not a valid interface index"),
        )
    })
}

fn validate_port(port: i64) -> Result<u16, ValidationError> {
    u16::try_from(port).map_err(|_| {
        ValidationError::new("port", format!("port number {port} is out of bounds"))
    })
}

fn validate_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.contains('\0') {
        return Err(ValidationError::new(field, "must not contain NUL bytes"));
    }
    Ok(())
}

fn validate_required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new(field, "must be a non-empty string"));
    }
    validate_text(field, value)?;
    Ok(value.to_string())
}

fn validate_optional(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<String>, ValidationError> {
    value
        .map(|v| validate_text(field, v).map(|()| v.to_string()))
        .transpose()
}

fn validate_metadata(metadata: &[u8]) -> Result<Vec<u8>, ValidationError> {
    if metadata.len() > MAX_RECORD_LEN {
        return Err(ValidationError::new(
            "metadata",
            format!("{} bytes exceeds the 65535 byte limit", metadata.len()),
        ));
    }
    TxtRecord::from_bytes(metadata).map_err(|e| ValidationError::new("metadata", e.to_string()))?;
    Ok(metadata.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_defaults_validate() {
        let request = RegisterParams::new("_http._tcp", 8080).validate().unwrap();
        assert_eq!(request.flags(), ServiceFlags::NONE);
        assert_eq!(request.interface_index(), InterfaceIndex::ANY);
        assert_eq!(request.name(), None);
        assert_eq!(request.service_type(), "_http._tcp");
        assert_eq!(request.domain(), None);
        assert_eq!(request.host(), None);
        assert_eq!(request.port(), 8080);
        assert_eq!(request.metadata(), None);
    }

    #[test]
    fn test_port_bounds() {
        for port in [0, 1, 65535] {
            assert!(RegisterParams::new("_http._tcp", port).validate().is_ok());
        }
        for port in [-1, 65536, 70000] {
            let err = RegisterParams::new("_http._tcp", port)
                .validate()
                .unwrap_err();
            assert_eq!(err.field, "port");
        }
    }

    #[test]
    fn test_service_type_must_be_non_empty() {
        let err = RegisterParams::new("", 80).validate().unwrap_err();
        assert_eq!(err.field, "service_type");
    }

    #[test]
    fn test_host_and_domain_stay_in_their_own_fields() {
        let request = RegisterParams::new("_http._tcp", 80)
            .with_domain("example.com.")
            .with_host("printer.local.")
            .validate()
            .unwrap();
        assert_eq!(request.domain(), Some("example.com."));
        assert_eq!(request.host(), Some("printer.local."));
    }

    #[test]
    fn test_rejects_nul_in_strings() {
        let err = RegisterParams::new("_http._tcp", 80)
            .with_name("bad\0name")
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "name");

        let err = ResolveParams::new("x", "_http._tcp", "local.\0")
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "domain");
    }

    #[test]
    fn test_flags_and_interface_ranges() {
        assert_eq!(
            RegisterParams::new("_http._tcp", 80)
                .with_flags(-1)
                .validate()
                .unwrap_err()
                .field,
            "flags"
        );
        assert_eq!(
            RegisterParams::new("_http._tcp", 80)
                .with_flags(i64::from(u32::MAX) + 1)
                .validate()
                .unwrap_err()
                .field,
            "flags"
        );
        let request = RegisterParams::new("_http._tcp", 80)
            .with_interface_index(-1)
            .with_flags(0x8)
            .validate()
            .unwrap();
        assert_eq!(request.interface_index(), InterfaceIndex::LOCAL_ONLY);
        assert!(request.flags().contains(ServiceFlags::NO_AUTO_RENAME));
        assert_eq!(
            ResolveParams::new("x", "_http._tcp", "local.")
                .with_interface_index(-9)
                .validate()
                .unwrap_err()
                .field,
            "interface_index"
        );
    }

    #[test]
    fn test_metadata_must_be_well_formed() {
        let mut txt = TxtRecord::new();
        txt.insert("path", "/").unwrap();
        let request = RegisterParams::new("_http._tcp", 80)
            .with_txt(txt.clone())
            .validate()
            .unwrap();
        assert_eq!(request.metadata(), Some(txt.to_bytes().as_slice()));

        let err = RegisterParams::new("_http._tcp", 80)
            .with_metadata(vec![9, b'a'])
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "metadata");
    }

    #[test]
    fn test_resolve_requires_all_strings() {
        assert!(ResolveParams::new("printer", "_ipp._tcp", "local.")
            .validate()
            .is_ok());
        assert_eq!(
            ResolveParams::new("", "_ipp._tcp", "local.")
                .validate()
                .unwrap_err()
                .field,
            "name"
        );
        assert_eq!(
            ResolveParams::new("printer", "_ipp._tcp", "")
                .validate()
                .unwrap_err()
                .field,
            "domain"
        );
    }

    #[test]
    fn test_operation_request_kind() {
        let register = OperationRequest::Register(
            RegisterParams::new("_http._tcp", 80).validate().unwrap(),
        );
        let resolve = OperationRequest::Resolve(
            ResolveParams::new("a", "_ipp._tcp", "local.")
                .validate()
                .unwrap(),
        );
        assert_eq!(register.kind(), OperationKind::Register);
        assert_eq!(resolve.kind(), OperationKind::Resolve);
        assert_eq!(resolve.service_type(), "_ipp._tcp");
    }
}

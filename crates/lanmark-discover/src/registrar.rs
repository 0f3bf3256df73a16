//! Service registration.

use tracing::debug;

use crate::error::{DiscoverError, NativeError};
use crate::handle::{Continuation, ServiceHandle};
use crate::pump::EventPump;
use crate::request::{OperationRequest, RegisterParams};
use crate::service::Registration;

/// Publishes services through an [`EventPump`].
#[derive(Debug, Clone, Copy)]
pub struct Registrar<'a> {
    pump: &'a EventPump,
}

impl<'a> Registrar<'a> {
    /// Create a registrar that starts operations on `pump`.
    pub fn new(pump: &'a EventPump) -> Self {
        Self { pump }
    }

    /// Register a service on `handle`.
    ///
    /// A handle that was already started (or stopped) is refused with
    /// [`DiscoverError::AlreadyInitialized`] before the parameters are looked
    /// at. Parameters are then validated before anything is started; a
    /// rejected argument leaves the handle untouched. On success the handle is active
    /// and `continuation` runs exactly once, from [`EventPump::poll`], with
    /// either the published [`Registration`] or the native failure (for
    /// example a name conflict). The registration stays published until the
    /// handle is stopped.
    pub fn register<F>(
        &self,
        handle: &ServiceHandle,
        params: &RegisterParams,
        continuation: F,
    ) -> Result<(), DiscoverError>
    where
        F: FnOnce(Result<Registration, NativeError>) + 'static,
    {
        if handle.is_initialized() {
            return Err(DiscoverError::AlreadyInitialized);
        }
        let request = params.validate()?;

        debug!(
            service_type = request.service_type(),
            port = request.port(),
            name = ?request.name(),
            domain = ?request.domain(),
            "Registering service"
        );

        handle.start(
            self.pump,
            OperationRequest::Register(request),
            Continuation::register(continuation),
        )
    }
}

//! Service resolution.

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{DiscoverError, NativeError};
use crate::handle::{Continuation, ServiceHandle};
use crate::pump::EventPump;
use crate::request::{OperationRequest, ResolveParams};
use crate::service::ResolvedService;

/// Items yielded by [`Resolver::resolve_channel`].
pub type ResolveReceiver = mpsc::UnboundedReceiver<Result<ResolvedService, NativeError>>;

/// Resolves named service instances through an [`EventPump`].
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    pump: &'a EventPump,
}

impl<'a> Resolver<'a> {
    /// Create a resolver that starts operations on `pump`.
    pub fn new(pump: &'a EventPump) -> Self {
        Self { pump }
    }

    /// Resolve `name.service_type.domain` on `handle`.
    ///
    /// Fails with [`DiscoverError::AlreadyInitialized`] on a handle that was
    /// already started, whatever the parameters. `continuation` runs once per
    /// native notification, in native order, until the handle is stopped.
    /// Every invocation gets a fresh [`ResolvedService`].
    pub fn resolve<F>(
        &self,
        handle: &ServiceHandle,
        params: &ResolveParams,
        continuation: F,
    ) -> Result<(), DiscoverError>
    where
        F: FnMut(Result<ResolvedService, NativeError>) + 'static,
    {
        if handle.is_initialized() {
            return Err(DiscoverError::AlreadyInitialized);
        }
        let request = params.validate()?;

        debug!(
            name = request.name(),
            service_type = request.service_type(),
            domain = request.domain(),
            interface = %request.interface_index(),
            "Resolving service"
        );

        handle.start(
            self.pump,
            OperationRequest::Resolve(request),
            Continuation::resolve(continuation),
        )
    }

    /// Like [`resolve`](Self::resolve), but results are sent to a channel.
    ///
    /// The sender lives in the continuation, so the channel closes once the
    /// handle is stopped. Results still only arrive while someone is calling
    /// [`EventPump::poll`].
    pub fn resolve_channel(
        &self,
        handle: &ServiceHandle,
        params: &ResolveParams,
    ) -> Result<ResolveReceiver, DiscoverError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.resolve(handle, params, move |result| {
            if tx.send(result).is_err() {
                trace!("Resolve receiver dropped, discarding result");
            }
        })?;
        Ok(rx)
    }
}

//! Service operation handles.
//!
//! A [`ServiceHandle`] owns one native operation for its whole active life:
//! the native resource, its socket and the caller's continuation. Starting it
//! pins a clone inside the [`EventPump`]; stopping it unpins that clone before
//! the native resource (and with it the socket) is released.

use std::cell::RefCell;
use std::fmt;
use std::os::unix::io::RawFd;
use std::rc::{Rc, Weak};

use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use tracing::{debug, info, trace, warn};

use crate::error::{check_native, DiscoverError, NativeError, ValidationError};
use crate::facility::{NativeOperation, NativeReply, REGISTER_OPERATION, RESOLVE_OPERATION};
use crate::pump::{EventPump, HandleToken, PumpShared};
use crate::request::{OperationKind, OperationRequest};
use crate::service::{Registration, ResolvedService};

/// Lifecycle state of a handle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Uninitialized,
    Active,
    Stopped,
}

/// Called once with the outcome of a registration.
pub type RegisterCallback = Box<dyn FnOnce(Result<Registration, NativeError>)>;

/// Called once per resolve notification until the handle is stopped.
pub type ResolveCallback = Box<dyn FnMut(Result<ResolvedService, NativeError>)>;

/// The caller's continuation, stored on the handle while it is active.
pub enum Continuation {
    Register(RegisterCallback),
    Resolve(ResolveCallback),
}

impl Continuation {
    /// Wrap a one-shot registration callback.
    pub fn register<F>(callback: F) -> Self
    where
        F: FnOnce(Result<Registration, NativeError>) + 'static,
    {
        Self::Register(Box::new(callback))
    }

    /// Wrap a repeatable resolve callback.
    pub fn resolve<F>(callback: F) -> Self
    where
        F: FnMut(Result<ResolvedService, NativeError>) + 'static,
    {
        Self::Resolve(Box::new(callback))
    }

    /// The operation this continuation can receive results for.
    pub fn kind(&self) -> OperationKind {
        match self {
            Continuation::Register(_) => OperationKind::Register,
            Continuation::Resolve(_) => OperationKind::Resolve,
        }
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Continuation").field(&self.kind()).finish()
    }
}

/// A native notification decoded for delivery.
pub(crate) enum Outcome {
    Registered(Result<Registration, NativeError>),
    Resolved(Result<ResolvedService, NativeError>),
    /// Processing itself failed; goes to whichever continuation is waiting.
    Failed(NativeError),
}

impl Outcome {
    pub(crate) fn from_reply(reply: NativeReply) -> Self {
        match reply {
            NativeReply::Registered {
                flags,
                error_code,
                name,
                service_type,
                domain,
            } => Outcome::Registered(check_native(REGISTER_OPERATION, error_code).map(|()| {
                Registration {
                    name,
                    service_type,
                    domain,
                    flags,
                }
            })),
            NativeReply::Resolved {
                flags,
                interface_index,
                error_code,
                fullname,
                host_target,
                port,
                txt,
            } => Outcome::Resolved(check_native(RESOLVE_OPERATION, error_code).map(|()| {
                ResolvedService {
                    fullname,
                    host_target,
                    port,
                    txt,
                    interface_index,
                    flags,
                }
            })),
        }
    }
}

struct HandleInner {
    state: HandleState,
    kind: Option<OperationKind>,
    continuation: Option<Continuation>,
    /// `None` while the pump is processing results (or once stopped).
    native: Option<Box<dyn NativeOperation>>,
    socket: Option<RawFd>,
    token: Option<HandleToken>,
    /// Cleared when socket configuration failed after a native start.
    usable: bool,
    in_flight: bool,
    pump: Weak<PumpShared>,
}

/// Caller-side reference to one native discovery or registration operation.
///
/// Clones refer to the same operation. The handle is `!Send`: it lives on the
/// thread that runs its [`EventPump`].
#[derive(Clone)]
pub struct ServiceHandle {
    inner: Rc<RefCell<HandleInner>>,
}

impl ServiceHandle {
    /// Create an unattached handle.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(HandleInner {
                state: HandleState::Uninitialized,
                kind: None,
                continuation: None,
                native: None,
                socket: None,
                token: None,
                usable: false,
                in_flight: false,
                pump: Weak::new(),
            })),
        }
    }

    /// Whether the handle has left the `Uninitialized` state.
    pub fn is_initialized(&self) -> bool {
        self.state() != HandleState::Uninitialized
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HandleState {
        self.inner.borrow().state
    }

    /// Operation kind, once started.
    pub fn kind(&self) -> Option<OperationKind> {
        self.inner.borrow().kind
    }

    /// Active and watched by the pump.
    pub fn is_usable(&self) -> bool {
        let inner = self.inner.borrow();
        inner.state == HandleState::Active && inner.usable
    }

    /// The native socket while active.
    pub fn socket(&self) -> Option<RawFd> {
        self.inner.borrow().socket
    }

    /// Registry token in the pump while active.
    pub fn token(&self) -> Option<HandleToken> {
        self.inner.borrow().token
    }

    /// Start `request` on the pump's native facility.
    ///
    /// Fails with [`DiscoverError::AlreadyInitialized`] unless the handle is
    /// `Uninitialized`, leaving it untouched. A native refusal is returned as
    /// [`DiscoverError::Native`] and also leaves the handle untouched. If the
    /// native start succeeds but the socket cannot be made non-blocking and
    /// close-on-exec, [`DiscoverError::Resource`] is returned and the handle
    /// stays `Active` but unusable until [`stop`](Self::stop) is called.
    pub fn start(
        &self,
        pump: &EventPump,
        request: OperationRequest,
        continuation: Continuation,
    ) -> Result<(), DiscoverError> {
        if self.is_initialized() {
            return Err(DiscoverError::AlreadyInitialized);
        }
        let kind = request.kind();
        if continuation.kind() != kind {
            return Err(ValidationError::new(
                "continuation",
                format!("expected a {kind} continuation"),
            )
            .into());
        }
        pump.ensure_capacity()?;

        debug!(
            kind = %kind,
            service_type = request.service_type(),
            "Starting native operation"
        );
        let native = pump.start_native(&request)?;
        let fd = native.socket();
        let token = pump.next_token();

        {
            let mut inner = self.inner.borrow_mut();
            inner.state = HandleState::Active;
            inner.kind = Some(kind);
            inner.continuation = Some(continuation);
            inner.native = Some(native);
            inner.socket = Some(fd);
            inner.token = Some(token);
            inner.usable = true;
            inner.pump = pump.downgrade();
        }
        pump.pin(token, self.clone());

        if let Err(errno) = configure_socket(fd) {
            self.inner.borrow_mut().usable = false;
            warn!(
                token = %token,
                fd,
                error = %errno,
                "Failed to configure native socket"
            );
            return Err(DiscoverError::resource(format!(
                "failed to set socket flags (O_NONBLOCK, FD_CLOEXEC): {errno}"
            )));
        }

        info!(token = %token, kind = %kind, fd, "Native operation started");
        Ok(())
    }

    /// Stop the operation.
    ///
    /// Deregisters from the pump, then releases the native resource, which
    /// closes the socket. Calling it again is a no-op. When called from inside
    /// this handle's own continuation the native resource is released as soon
    /// as the current processing step returns, and the rest of that step's
    /// notifications are discarded.
    pub fn stop(&self) {
        let (native, continuation, token, pump) = {
            let mut inner = self.inner.borrow_mut();
            match inner.state {
                HandleState::Stopped => return,
                HandleState::Uninitialized => {
                    inner.state = HandleState::Stopped;
                    return;
                }
                HandleState::Active => {}
            }
            inner.state = HandleState::Stopped;
            inner.socket = None;
            (
                inner.native.take(),
                inner.continuation.take(),
                inner.token.take(),
                inner.pump.clone(),
            )
        };

        if let (Some(token), Some(pump)) = (token, pump.upgrade()) {
            pump.unpin(token);
        }
        let in_flight = native.is_none();
        drop(native);
        drop(continuation);

        info!(token = ?token, in_flight, "Native operation stopped");
    }

    /// Socket to watch, if the pump should poll this handle now.
    pub(crate) fn watch_fd(&self) -> Option<RawFd> {
        let inner = self.inner.borrow();
        if inner.state == HandleState::Active && inner.usable && !inner.in_flight {
            inner.socket
        } else {
            None
        }
    }

    /// Take the native operation out for one processing step.
    pub(crate) fn begin_processing(&self) -> Option<Box<dyn NativeOperation>> {
        let mut inner = self.inner.borrow_mut();
        if inner.state != HandleState::Active || !inner.usable || inner.in_flight {
            return None;
        }
        let native = inner.native.take()?;
        inner.in_flight = true;
        Some(native)
    }

    /// Return the native operation after processing, or release it if the
    /// handle was stopped in the meantime.
    pub(crate) fn finish_processing(&self, native: Box<dyn NativeOperation>) {
        let released = {
            let mut inner = self.inner.borrow_mut();
            inner.in_flight = false;
            if inner.state == HandleState::Active {
                inner.native = Some(native);
                None
            } else {
                Some(native)
            }
        };
        if released.is_some() {
            debug!("Releasing native operation stopped during processing");
        }
    }

    /// Deliver one outcome to the continuation. Returns whether it was delivered.
    pub(crate) fn dispatch(&self, outcome: Outcome) -> bool {
        let (token, continuation) = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != HandleState::Active {
                trace!(token = ?inner.token, "Discarding notification for stopped handle");
                return false;
            }
            match inner.continuation.take() {
                Some(continuation) => (inner.token, continuation),
                None => {
                    trace!(
                        token = ?inner.token,
                        "Discarding notification, registration already completed"
                    );
                    return false;
                }
            }
        };

        let remaining = match (continuation, outcome) {
            (Continuation::Register(callback), Outcome::Registered(result)) => {
                match &result {
                    Ok(registration) => {
                        info!(token = ?token, service = %registration, "Service registered")
                    }
                    Err(err) => warn!(token = ?token, error = %err, "Registration failed"),
                }
                callback(result);
                None
            }
            (Continuation::Register(callback), Outcome::Failed(err)) => {
                callback(Err(err));
                None
            }
            (Continuation::Resolve(mut callback), Outcome::Resolved(result)) => {
                if let Err(ref err) = result {
                    warn!(token = ?token, error = %err, "Resolve notification carried an error");
                }
                callback(result);
                Some(Continuation::Resolve(callback))
            }
            (Continuation::Resolve(mut callback), Outcome::Failed(err)) => {
                callback(Err(err));
                Some(Continuation::Resolve(callback))
            }
            (continuation, _) => {
                warn!(
                    token = ?token,
                    expected = %continuation.kind(),
                    "Discarding notification of the wrong kind"
                );
                self.restore(continuation);
                return false;
            }
        };

        if let Some(continuation) = remaining {
            self.restore(continuation);
        }
        true
    }

    fn restore(&self, continuation: Continuation) {
        let dropped = {
            let mut inner = self.inner.borrow_mut();
            if inner.state == HandleState::Active && inner.continuation.is_none() {
                inner.continuation = Some(continuation);
                None
            } else {
                Some(continuation)
            }
        };
        drop(dropped);
    }
}

impl Default for ServiceHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ServiceHandle")
            .field("state", &inner.state)
            .field("kind", &inner.kind)
            .field("token", &inner.token)
            .field("usable", &inner.usable)
            .finish()
    }
}

fn configure_socket(fd: RawFd) -> nix::Result<()> {
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    let fd_flags = FdFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFD)?);
    fcntl(fd, FcntlArg::F_SETFD(fd_flags | FdFlag::FD_CLOEXEC))?;
    Ok(())
}

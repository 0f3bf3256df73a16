//! The single-threaded event pump.
//!
//! The pump owns the native facility, watches the socket of every active
//! handle, and asks a handle's native operation to process pending results
//! when its socket turns readable. Continuations run on the pump's thread,
//! inside [`EventPump::poll`].
//!
//! Every active handle is pinned in the pump's registry under a
//! [`HandleToken`]. The registry keeps the handle (and so its continuation)
//! alive while the native side may still call back, even if the caller has
//! dropped every other reference.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::os::unix::io::RawFd;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use lanmark_util::timing::TimingGuard;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};
use tracing::{debug, trace, warn};

use crate::config::{ConfigError, DiscoverConfig};
use crate::error::{map_native_error, DiscoverError, NativeError};
use crate::facility::{
    DnsSdFacility, NativeOperation, PROCESS_OPERATION, REGISTER_OPERATION, RESOLVE_OPERATION,
};
use crate::handle::{Outcome, ServiceHandle};
use crate::registrar::Registrar;
use crate::request::OperationRequest;
use crate::resolver::Resolver;

/// Registry key of an active handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleToken(u64);

impl HandleToken {
    /// Numeric value of the token.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) struct PumpShared {
    facility: Box<dyn DnsSdFacility>,
    handles: RefCell<BTreeMap<HandleToken, ServiceHandle>>,
    next_token: Cell<u64>,
}

impl PumpShared {
    pub(crate) fn unpin(&self, token: HandleToken) {
        let removed = self.handles.borrow_mut().remove(&token);
        if removed.is_some() {
            trace!(token = %token, "Handle unpinned");
        }
    }
}

/// Drives native operations on the current thread.
///
/// Dropping the pump stops every handle still active on it.
pub struct EventPump {
    shared: Rc<PumpShared>,
    config: DiscoverConfig,
}

impl EventPump {
    /// Create a pump over `facility` with default configuration.
    pub fn new(facility: impl DnsSdFacility + 'static) -> Self {
        Self::build(Box::new(facility), DiscoverConfig::default())
    }

    /// Create a pump with explicit settings.
    ///
    /// Fails if `config` does not pass [`DiscoverConfig::validate`], so a
    /// zero poll interval or a zero handle limit never reaches the loop.
    pub fn with_config(
        facility: impl DnsSdFacility + 'static,
        config: DiscoverConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(Box::new(facility), config))
    }

    fn build(facility: Box<dyn DnsSdFacility>, config: DiscoverConfig) -> Self {
        debug!(
            poll_interval_ms = config.poll_interval_ms,
            max_handles = ?config.max_handles,
            "Creating event pump"
        );
        Self {
            shared: Rc::new(PumpShared {
                facility,
                handles: RefCell::new(BTreeMap::new()),
                next_token: Cell::new(1),
            }),
            config,
        }
    }

    /// Settings this pump runs with.
    pub fn config(&self) -> &DiscoverConfig {
        &self.config
    }

    /// A registrar bound to this pump.
    pub fn registrar(&self) -> Registrar<'_> {
        Registrar::new(self)
    }

    /// A resolver bound to this pump.
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self)
    }

    /// Number of handles currently pinned.
    pub fn active_count(&self) -> usize {
        self.shared.handles.borrow().len()
    }

    /// Wait up to `timeout` for readable sockets and process them.
    ///
    /// Returns the number of notifications delivered to continuations. Only a
    /// failure of the wait itself is returned as an error; processing failures
    /// go to the affected handle's continuation.
    pub fn poll(&self, timeout: Duration) -> Result<usize, DiscoverError> {
        let watched: Vec<(HandleToken, RawFd)> = self
            .shared
            .handles
            .borrow()
            .iter()
            .filter_map(|(token, handle)| handle.watch_fd().map(|fd| (*token, fd)))
            .collect();

        let mut fds: Vec<PollFd> = watched
            .iter()
            .map(|(_, fd)| PollFd::new(*fd, PollFlags::POLLIN))
            .collect();
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);

        let ready = match poll(&mut fds, timeout_ms) {
            Ok(n) => n,
            Err(Errno::EINTR) => 0,
            Err(errno) => {
                warn!(error = %errno, watched = watched.len(), "poll() failed");
                return Err(DiscoverError::resource(format!("poll() failed: {errno}")));
            }
        };
        if ready <= 0 {
            return Ok(0);
        }

        let readable = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;
        let ready_tokens: Vec<HandleToken> = watched
            .iter()
            .zip(fds.iter())
            .filter(|(_, pfd)| pfd.revents().map_or(false, |r| r.intersects(readable)))
            .map(|((token, _), _)| *token)
            .collect();

        let mut delivered = 0;
        for token in ready_tokens {
            delivered += self.process(token);
        }
        Ok(delivered)
    }

    /// Poll until `done` returns true, waiting at most the configured poll
    /// interval per round.
    pub fn run_until<P>(&self, mut done: P) -> Result<(), DiscoverError>
    where
        P: FnMut() -> bool,
    {
        let interval = self.config.poll_interval();
        while !done() {
            self.poll(interval)?;
        }
        Ok(())
    }

    /// Poll for `duration`, returning the total number of deliveries.
    pub fn run_for(&self, duration: Duration) -> Result<usize, DiscoverError> {
        let deadline = Instant::now() + duration;
        let interval = self.config.poll_interval();
        let mut delivered = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            delivered += self.poll(remaining.min(interval))?;
        }
        Ok(delivered)
    }

    /// Stop every pinned handle.
    pub fn shutdown(&self) {
        let handles: Vec<ServiceHandle> =
            std::mem::take(&mut *self.shared.handles.borrow_mut())
                .into_values()
                .collect();
        if handles.is_empty() {
            return;
        }
        debug!(count = handles.len(), "Stopping active handles");
        for handle in handles {
            handle.stop();
        }
    }

    pub(crate) fn ensure_capacity(&self) -> Result<(), DiscoverError> {
        match self.config.max_handles {
            Some(max) if self.active_count() >= max => Err(DiscoverError::resource(format!(
                "handle limit of {max} reached"
            ))),
            _ => Ok(()),
        }
    }

    pub(crate) fn start_native(
        &self,
        request: &OperationRequest,
    ) -> Result<Box<dyn NativeOperation>, NativeError> {
        let facility = &self.shared.facility;
        let (operation, started) = match request {
            OperationRequest::Register(r) => (REGISTER_OPERATION, facility.register(r)),
            OperationRequest::Resolve(r) => (RESOLVE_OPERATION, facility.resolve(r)),
        };
        started.map_err(|code| {
            let err = map_native_error(operation, code);
            warn!(code, error = %err, "Native start failed");
            err
        })
    }

    pub(crate) fn next_token(&self) -> HandleToken {
        let token = self.shared.next_token.get();
        self.shared.next_token.set(token + 1);
        HandleToken(token)
    }

    pub(crate) fn pin(&self, token: HandleToken, handle: ServiceHandle) {
        self.shared.handles.borrow_mut().insert(token, handle);
        trace!(token = %token, "Handle pinned");
    }

    pub(crate) fn downgrade(&self) -> Weak<PumpShared> {
        Rc::downgrade(&self.shared)
    }

    /// One processing step for a readable handle.
    fn process(&self, token: HandleToken) -> usize {
        let handle = match self.shared.handles.borrow().get(&token) {
            Some(handle) => handle.clone(),
            None => return 0,
        };
        let Some(mut native) = handle.begin_processing() else {
            return 0;
        };

        let _span = lanmark_util::operation_span!(token).entered();
        let _timing = TimingGuard::process(token.to_string());

        let mut delivered = 0;
        let result = native.process_result(&mut |reply| {
            trace!(code = reply.error_code(), "Native notification");
            if handle.dispatch(Outcome::from_reply(reply)) {
                delivered += 1;
            }
        });
        if let Err(code) = result {
            let err = map_native_error(PROCESS_OPERATION, code);
            warn!(code, error = %err, "Processing pending results failed");
            if handle.dispatch(Outcome::Failed(err)) {
                delivered += 1;
            }
        }

        handle.finish_processing(native);
        delivered
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for EventPump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPump")
            .field("config", &self.config)
            .field("active", &self.active_count())
            .finish()
    }
}

//! A simulated DNS-SD facility.
//!
//! Each started operation gets a Unix socket pair. The native side keeps the
//! reading end and hands its descriptor to the pump; the test keeps a
//! [`SimulatedOperation`] controller that queues replies and writes a wake-up
//! byte so the pump sees the socket turn readable.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use lanmark_discover::{
    DnsSdFacility, InterfaceIndex, NativeOperation, NativeReply, OperationKind,
    OperationRequest, RegisterRequest, ResolveRequest, ServiceFlags,
};

/// Result code the simulated facility uses when a socket pair can't be created.
const NO_MEMORY: i32 = -65539;

#[derive(Default)]
struct FacilityState {
    register_requests: Vec<RegisterRequest>,
    resolve_requests: Vec<ResolveRequest>,
    operations: Vec<SimulatedOperation>,
    fail_next_start: Option<i32>,
    invalid_socket: bool,
}

/// An in-process [`DnsSdFacility`] for tests.
///
/// Clones share state, so a test can keep one clone for inspection after
/// handing another to the pump.
///
/// # Example
///
/// ```rust,ignore
/// let facility = SimulatedFacility::new();
/// facility.fail_next_start(-65540);
/// let pump = EventPump::new(facility.clone());
/// ```
#[derive(Clone, Default)]
pub struct SimulatedFacility {
    state: Arc<Mutex<FacilityState>>,
}

impl SimulatedFacility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next start with `code`.
    pub fn fail_next_start(&self, code: i32) {
        self.state.lock().unwrap().fail_next_start = Some(code);
    }

    /// Hand out `-1` as the socket of every later operation, so socket
    /// configuration fails.
    pub fn with_invalid_socket(self) -> Self {
        self.state.lock().unwrap().invalid_socket = true;
        self
    }

    /// Every register request that reached the facility, including refused ones.
    pub fn register_requests(&self) -> Vec<RegisterRequest> {
        self.state.lock().unwrap().register_requests.clone()
    }

    /// Every resolve request that reached the facility, including refused ones.
    pub fn resolve_requests(&self) -> Vec<ResolveRequest> {
        self.state.lock().unwrap().resolve_requests.clone()
    }

    /// Number of start calls of either kind.
    pub fn start_calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.register_requests.len() + state.resolve_requests.len()
    }

    /// Controllers for every successfully started operation, in start order.
    pub fn operations(&self) -> Vec<SimulatedOperation> {
        self.state.lock().unwrap().operations.clone()
    }

    pub fn last_operation(&self) -> Option<SimulatedOperation> {
        self.state.lock().unwrap().operations.last().cloned()
    }

    fn start(&self, request: OperationRequest) -> Result<Box<dyn NativeOperation>, i32> {
        let mut state = self.state.lock().unwrap();
        match &request {
            OperationRequest::Register(r) => state.register_requests.push(r.clone()),
            OperationRequest::Resolve(r) => state.resolve_requests.push(r.clone()),
        }
        if let Some(code) = state.fail_next_start.take() {
            return Err(code);
        }

        let (reader, writer) = UnixStream::pair().map_err(|_| NO_MEMORY)?;
        let shared = Arc::new(OperationShared {
            request,
            queue: Mutex::new(VecDeque::new()),
            writer: Mutex::new(writer),
            fail_next_process: Mutex::new(None),
            released: AtomicBool::new(false),
            process_calls: AtomicUsize::new(0),
        });
        state.operations.push(SimulatedOperation {
            shared: Arc::clone(&shared),
        });

        Ok(Box::new(SimulatedNative {
            reader,
            invalid_socket: state.invalid_socket,
            shared,
        }))
    }
}

impl DnsSdFacility for SimulatedFacility {
    fn register(&self, request: &RegisterRequest) -> Result<Box<dyn NativeOperation>, i32> {
        self.start(OperationRequest::Register(request.clone()))
    }

    fn resolve(&self, request: &ResolveRequest) -> Result<Box<dyn NativeOperation>, i32> {
        self.start(OperationRequest::Resolve(request.clone()))
    }
}

struct OperationShared {
    request: OperationRequest,
    queue: Mutex<VecDeque<NativeReply>>,
    writer: Mutex<UnixStream>,
    fail_next_process: Mutex<Option<i32>>,
    released: AtomicBool,
    process_calls: AtomicUsize,
}

/// Test-side controller for one started operation.
#[derive(Clone)]
pub struct SimulatedOperation {
    shared: Arc<OperationShared>,
}

impl SimulatedOperation {
    pub fn kind(&self) -> OperationKind {
        self.shared.request.kind()
    }

    /// The request this operation was started with.
    pub fn request(&self) -> &OperationRequest {
        &self.shared.request
    }

    /// Whether the native side has been dropped (socket closed).
    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }

    /// How many times the pump asked this operation to process results.
    pub fn process_calls(&self) -> usize {
        self.shared.process_calls.load(Ordering::SeqCst)
    }

    /// Queue a reply and make the socket readable.
    pub fn inject(&self, reply: NativeReply) {
        self.shared.queue.lock().unwrap().push_back(reply);
        self.wake();
    }

    /// Make the next processing step fail with `code` before delivering anything.
    pub fn fail_next_process(&self, code: i32) {
        *self.shared.fail_next_process.lock().unwrap() = Some(code);
        self.wake();
    }

    pub fn inject_registered(&self, name: &str, service_type: &str, domain: &str) {
        self.inject(NativeReply::Registered {
            flags: ServiceFlags::ADD,
            error_code: 0,
            name: name.to_string(),
            service_type: service_type.to_string(),
            domain: domain.to_string(),
        });
    }

    /// Acknowledge a registration the way the daemon would: with the requested
    /// name (or this machine's host name), the type, and `local.` unless a
    /// domain was requested.
    pub fn acknowledge_registration(&self) {
        let OperationRequest::Register(request) = &self.shared.request else {
            return;
        };
        let name = request.name().map(str::to_string).unwrap_or_else(|| {
            hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "localhost".to_string())
        });
        let service_type = format!("{}.", request.service_type().trim_end_matches('.'));
        let domain = request.domain().unwrap_or("local.").to_string();
        self.inject_registered(&name, &service_type, &domain);
    }

    pub fn inject_register_error(&self, code: i32) {
        self.inject(NativeReply::Registered {
            flags: ServiceFlags::NONE,
            error_code: code,
            name: String::new(),
            service_type: String::new(),
            domain: String::new(),
        });
    }

    pub fn inject_resolved(&self, fullname: &str, host_target: &str, port: u16, txt: &[u8]) {
        self.inject(NativeReply::Resolved {
            flags: ServiceFlags::NONE,
            interface_index: InterfaceIndex::new(1),
            error_code: 0,
            fullname: fullname.to_string(),
            host_target: host_target.to_string(),
            port,
            txt: txt.to_vec(),
        });
    }

    pub fn inject_resolve_error(&self, code: i32) {
        self.inject(NativeReply::Resolved {
            flags: ServiceFlags::NONE,
            interface_index: InterfaceIndex::ANY,
            error_code: code,
            fullname: String::new(),
            host_target: String::new(),
            port: 0,
            txt: Vec::new(),
        });
    }

    fn wake(&self) {
        if self.is_released() {
            return;
        }
        // A full buffer is already readable.
        let _ = self.shared.writer.lock().unwrap().write(&[1]);
    }
}

struct SimulatedNative {
    reader: UnixStream,
    invalid_socket: bool,
    shared: Arc<OperationShared>,
}

impl SimulatedNative {
    fn drain(&mut self) {
        let mut buf = [0u8; 64];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    }
}

impl NativeOperation for SimulatedNative {
    fn socket(&self) -> RawFd {
        if self.invalid_socket {
            -1
        } else {
            self.reader.as_raw_fd()
        }
    }

    fn process_result(&mut self, deliver: &mut dyn FnMut(NativeReply)) -> Result<(), i32> {
        self.shared.process_calls.fetch_add(1, Ordering::SeqCst);
        self.drain();

        if let Some(code) = self.shared.fail_next_process.lock().unwrap().take() {
            return Err(code);
        }

        loop {
            let next = self.shared.queue.lock().unwrap().pop_front();
            match next {
                Some(reply) => deliver(reply),
                None => break,
            }
        }
        Ok(())
    }
}

impl Drop for SimulatedNative {
    fn drop(&mut self) {
        self.shared.released.store(true, Ordering::SeqCst);
    }
}

//! Binding to the system `dns_sd` library.
//!
//! Bonjour ships it on Apple platforms; elsewhere it comes from
//! avahi-compat-libdns_sd or mDNSResponder's `libdns_sd`.

#![allow(unsafe_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_uchar, c_void};
use std::os::unix::io::RawFd;
use std::ptr;

use tracing::{debug, trace};

use crate::error::NativeErrorKind;
use crate::facility::{DnsSdFacility, NativeOperation, NativeReply};
use crate::flags::{InterfaceIndex, ServiceFlags};
use crate::request::{RegisterRequest, ResolveRequest};

#[repr(C)]
struct DnsServiceOpaque {
    _private: [u8; 0],
}

type DnsServiceRef = *mut DnsServiceOpaque;

type RegisterReply = extern "C" fn(
    sd_ref: DnsServiceRef,
    flags: u32,
    error_code: i32,
    name: *const c_char,
    regtype: *const c_char,
    domain: *const c_char,
    context: *mut c_void,
);

type ResolveReply = extern "C" fn(
    sd_ref: DnsServiceRef,
    flags: u32,
    interface_index: u32,
    error_code: i32,
    fullname: *const c_char,
    hosttarget: *const c_char,
    port: u16,
    txt_len: u16,
    txt_record: *const c_uchar,
    context: *mut c_void,
);

#[cfg_attr(not(target_vendor = "apple"), link(name = "dns_sd"))]
extern "C" {
    fn DNSServiceRegister(
        sd_ref: *mut DnsServiceRef,
        flags: u32,
        interface_index: u32,
        name: *const c_char,
        regtype: *const c_char,
        domain: *const c_char,
        host: *const c_char,
        port: u16,
        txt_len: u16,
        txt_record: *const c_void,
        callback: RegisterReply,
        context: *mut c_void,
    ) -> i32;

    fn DNSServiceResolve(
        sd_ref: *mut DnsServiceRef,
        flags: u32,
        interface_index: u32,
        name: *const c_char,
        regtype: *const c_char,
        domain: *const c_char,
        callback: ResolveReply,
        context: *mut c_void,
    ) -> i32;

    fn DNSServiceRefSockFD(sd_ref: DnsServiceRef) -> c_int;

    fn DNSServiceProcessResult(sd_ref: DnsServiceRef) -> i32;

    fn DNSServiceRefDeallocate(sd_ref: DnsServiceRef);
}

type ReplyQueue = RefCell<VecDeque<NativeReply>>;

/// The system DNS-SD daemon, reached through `libdns_sd`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BonjourFacility;

impl BonjourFacility {
    pub fn new() -> Self {
        Self
    }
}

impl DnsSdFacility for BonjourFacility {
    fn register(&self, request: &RegisterRequest) -> Result<Box<dyn NativeOperation>, i32> {
        let name = optional_cstring(request.name())?;
        let regtype = cstring(request.service_type())?;
        let domain = optional_cstring(request.domain())?;
        let host = optional_cstring(request.host())?;
        let txt = request.metadata().unwrap_or(&[]);
        let txt_len = u16::try_from(txt.len()).map_err(|_| bad_param())?;

        let queue: Box<ReplyQueue> = Box::default();
        let mut sd_ref: DnsServiceRef = ptr::null_mut();
        // SAFETY: every pointer outlives the call; the queue box outlives the
        // service ref because BonjourOperation deallocates the ref first.
        let code = unsafe {
            DNSServiceRegister(
                &mut sd_ref,
                request.flags().bits(),
                request.interface_index().get(),
                opt_ptr(&name),
                regtype.as_ptr(),
                opt_ptr(&domain),
                opt_ptr(&host),
                request.port().to_be(),
                txt_len,
                if txt.is_empty() {
                    ptr::null()
                } else {
                    txt.as_ptr().cast()
                },
                on_registered,
                queue_context(&queue),
            )
        };
        BonjourOperation::started(code, sd_ref, queue)
    }

    fn resolve(&self, request: &ResolveRequest) -> Result<Box<dyn NativeOperation>, i32> {
        let name = cstring(request.name())?;
        let regtype = cstring(request.service_type())?;
        let domain = cstring(request.domain())?;

        let queue: Box<ReplyQueue> = Box::default();
        let mut sd_ref: DnsServiceRef = ptr::null_mut();
        // SAFETY: see register.
        let code = unsafe {
            DNSServiceResolve(
                &mut sd_ref,
                request.flags().bits(),
                request.interface_index().get(),
                name.as_ptr(),
                regtype.as_ptr(),
                domain.as_ptr(),
                on_resolved,
                queue_context(&queue),
            )
        };
        BonjourOperation::started(code, sd_ref, queue)
    }
}

struct BonjourOperation {
    sd_ref: DnsServiceRef,
    queue: Box<ReplyQueue>,
}

impl BonjourOperation {
    fn started(
        code: i32,
        sd_ref: DnsServiceRef,
        queue: Box<ReplyQueue>,
    ) -> Result<Box<dyn NativeOperation>, i32> {
        if code != 0 {
            return Err(code);
        }
        if sd_ref.is_null() {
            return Err(NativeErrorKind::Unknown.code().unwrap_or(-65537));
        }
        debug!("dns_sd service ref allocated");
        Ok(Box::new(BonjourOperation { sd_ref, queue }))
    }
}

impl NativeOperation for BonjourOperation {
    fn socket(&self) -> RawFd {
        // SAFETY: sd_ref is live until drop.
        unsafe { DNSServiceRefSockFD(self.sd_ref) }
    }

    fn process_result(&mut self, deliver: &mut dyn FnMut(NativeReply)) -> Result<(), i32> {
        // SAFETY: sd_ref is live; callbacks only touch the queue.
        let code = unsafe { DNSServiceProcessResult(self.sd_ref) };
        loop {
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(reply) => deliver(reply),
                None => break,
            }
        }
        if code == 0 {
            Ok(())
        } else {
            Err(code)
        }
    }
}

impl Drop for BonjourOperation {
    fn drop(&mut self) {
        // SAFETY: deallocated exactly once, before the queue box is freed.
        unsafe { DNSServiceRefDeallocate(self.sd_ref) };
        trace!("dns_sd service ref deallocated");
    }
}

extern "C" fn on_registered(
    _sd_ref: DnsServiceRef,
    flags: u32,
    error_code: i32,
    name: *const c_char,
    regtype: *const c_char,
    domain: *const c_char,
    context: *mut c_void,
) {
    let reply = NativeReply::Registered {
        flags: ServiceFlags::from_bits(flags),
        error_code,
        name: lossy(name),
        service_type: lossy(regtype),
        domain: lossy(domain),
    };
    push(context, reply);
}

extern "C" fn on_resolved(
    _sd_ref: DnsServiceRef,
    flags: u32,
    interface_index: u32,
    error_code: i32,
    fullname: *const c_char,
    hosttarget: *const c_char,
    port: u16,
    txt_len: u16,
    txt_record: *const c_uchar,
    context: *mut c_void,
) {
    let txt = if txt_record.is_null() || txt_len == 0 {
        Vec::new()
    } else {
        // SAFETY: the library hands us txt_len readable bytes.
        unsafe { std::slice::from_raw_parts(txt_record, usize::from(txt_len)) }.to_vec()
    };
    let reply = NativeReply::Resolved {
        flags: ServiceFlags::from_bits(flags),
        interface_index: InterfaceIndex::new(interface_index),
        error_code,
        fullname: lossy(fullname),
        host_target: lossy(hosttarget),
        port: u16::from_be(port),
        txt,
    };
    push(context, reply);
}

fn push(context: *mut c_void, reply: NativeReply) {
    if context.is_null() {
        return;
    }
    // SAFETY: context is the ReplyQueue owned by the live BonjourOperation.
    let queue = unsafe { &*(context as *const ReplyQueue) };
    if let Ok(mut queue) = queue.try_borrow_mut() {
        queue.push_back(reply);
    }
}

fn queue_context(queue: &ReplyQueue) -> *mut c_void {
    queue as *const ReplyQueue as *mut c_void
}

fn lossy(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // SAFETY: non-null strings from the library are NUL-terminated.
    unsafe { CStr::from_ptr(ptr) }
        .to_string_lossy()
        .into_owned()
}

fn bad_param() -> i32 {
    NativeErrorKind::BadParam.code().unwrap_or(-65540)
}

fn cstring(value: &str) -> Result<CString, i32> {
    CString::new(value).map_err(|_| bad_param())
}

fn optional_cstring(value: Option<&str>) -> Result<Option<CString>, i32> {
    value.map(cstring).transpose()
}

fn opt_ptr(value: &Option<CString>) -> *const c_char {
    value.as_ref().map_or(ptr::null(), |v| v.as_ptr())
}

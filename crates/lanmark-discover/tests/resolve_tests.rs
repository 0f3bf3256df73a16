//! Resolve lifecycle tests against the simulated facility.

use std::time::Duration;

use lanmark_discover::{
    DiscoverError, EventPump, HandleState, InterfaceIndex, NativeError, NativeErrorKind,
    NativeReply, OperationKind, ResolveParams, ResolvedService, ServiceFlags, ServiceHandle,
};
use lanmark_test_utils::{init_test_logging, Recorder, SimulatedFacility};

const WAIT: Duration = Duration::from_millis(200);

type ResolveResult = Result<ResolvedService, NativeError>;

fn setup() -> (SimulatedFacility, EventPump) {
    init_test_logging();
    let facility = SimulatedFacility::new();
    let pump = EventPump::new(facility.clone());
    (facility, pump)
}

fn printer() -> ResolveParams {
    ResolveParams::new("Office", "_ipp._tcp", "local.")
}

#[test]
fn test_resolve_delivers_results_in_order() {
    let (facility, pump) = setup();
    let handle = ServiceHandle::new();
    let results: Recorder<ResolveResult> = Recorder::new();

    pump.resolver()
        .resolve(&handle, &printer(), results.sink())
        .expect("resolve should start");
    assert_eq!(handle.kind(), Some(OperationKind::Resolve));

    let request = facility.resolve_requests().remove(0);
    assert_eq!(request.name(), "Office");
    assert_eq!(request.service_type(), "_ipp._tcp");
    assert_eq!(request.domain(), "local.");

    let operation = facility.last_operation().unwrap();
    operation.inject_resolved("Office._ipp._tcp.local.", "a.local.", 631, b"");
    operation.inject_resolved("Office._ipp._tcp.local.", "b.local.", 632, b"");
    operation.inject_resolved("Office._ipp._tcp.local.", "c.local.", 633, b"");
    assert_eq!(pump.poll(WAIT).unwrap(), 3);

    let ports: Vec<u16> = results
        .take()
        .into_iter()
        .map(|r| r.expect("resolved").port)
        .collect();
    assert_eq!(ports, vec![631, 632, 633]);
    assert_eq!(handle.state(), HandleState::Active);
}

#[test]
fn test_more_coming_batch_is_delivered_one_by_one() {
    let (facility, pump) = setup();
    let handle = ServiceHandle::new();
    let results: Recorder<ResolveResult> = Recorder::new();

    pump.resolver()
        .resolve(&handle, &printer(), results.sink())
        .unwrap();
    let operation = facility.last_operation().unwrap();
    let flags = [ServiceFlags::MORE_COMING, ServiceFlags::MORE_COMING, ServiceFlags::NONE];
    for (port, flags) in flags.into_iter().enumerate() {
        operation.inject(NativeReply::Resolved {
            flags,
            interface_index: InterfaceIndex::new(1),
            error_code: 0,
            fullname: "Office._ipp._tcp.local.".to_string(),
            host_target: "office.local.".to_string(),
            port: port as u16,
            txt: Vec::new(),
        });
    }
    assert_eq!(pump.poll(WAIT).unwrap(), 3);

    let services: Vec<ResolvedService> = results
        .take()
        .into_iter()
        .map(|r| r.expect("resolved"))
        .collect();
    let ports: Vec<u16> = services.iter().map(|s| s.port).collect();
    let more: Vec<bool> = services.iter().map(|s| s.more_coming()).collect();
    assert_eq!(ports, vec![0, 1, 2]);
    assert_eq!(more, vec![true, true, false]);
    assert_eq!(handle.state(), HandleState::Active);
}

#[test]
fn test_resolve_keeps_delivering_until_stopped() {
    let (facility, pump) = setup();
    let handle = ServiceHandle::new();
    let results: Recorder<ResolveResult> = Recorder::new();

    pump.resolver()
        .resolve(&handle, &printer(), results.sink())
        .unwrap();
    let operation = facility.last_operation().unwrap();

    operation.inject_resolved("Office._ipp._tcp.local.", "a.local.", 631, b"");
    assert_eq!(pump.poll(WAIT).unwrap(), 1);
    operation.inject_resolved("Office._ipp._tcp.local.", "a.local.", 631, b"");
    assert_eq!(pump.poll(WAIT).unwrap(), 1);
    assert_eq!(results.len(), 2);

    operation.inject_resolved("Office._ipp._tcp.local.", "a.local.", 631, b"");
    handle.stop();
    assert!(operation.is_released());
    assert_eq!(pump.poll(Duration::from_millis(10)).unwrap(), 0);
    assert_eq!(results.len(), 2);
}

#[test]
fn test_resolved_txt_metadata() {
    let (facility, pump) = setup();
    let handle = ServiceHandle::new();
    let results: Recorder<ResolveResult> = Recorder::new();

    pump.resolver()
        .resolve(&handle, &printer(), results.sink())
        .unwrap();
    facility.last_operation().unwrap().inject_resolved(
        "Office._ipp._tcp.local.",
        "office.local.",
        631,
        b"\x06rp=ipp\x05color",
    );
    pump.poll(WAIT).unwrap();

    let service = results.take().remove(0).unwrap();
    assert_eq!(service.to_string(), "Office._ipp._tcp.local. (office.local:631)");
    let txt = service.txt_record().unwrap();
    assert_eq!(txt.get("rp").as_deref(), Some("ipp"));
    assert!(txt.contains_key("color"));
}

#[test]
fn test_stop_inside_continuation_discards_rest_of_batch() {
    let (facility, pump) = setup();
    let handle = ServiceHandle::new();
    let results: Recorder<ResolveResult> = Recorder::new();

    let stopper = handle.clone();
    let recorder = results.clone();
    pump.resolver()
        .resolve(&handle, &printer(), move |result| {
            recorder.push(result);
            stopper.stop();
        })
        .unwrap();

    let operation = facility.last_operation().unwrap();
    operation.inject_resolved("Office._ipp._tcp.local.", "a.local.", 1, b"");
    operation.inject_resolved("Office._ipp._tcp.local.", "b.local.", 2, b"");
    operation.inject_resolved("Office._ipp._tcp.local.", "c.local.", 3, b"");

    assert_eq!(pump.poll(WAIT).unwrap(), 1);
    assert_eq!(results.len(), 1);
    assert_eq!(handle.state(), HandleState::Stopped);
    assert!(operation.is_released());
    assert_eq!(pump.active_count(), 0);
}

#[test]
fn test_stop_other_handle_inside_continuation() {
    let (facility, pump) = setup();
    let first = ServiceHandle::new();
    let second = ServiceHandle::new();
    let second_results: Recorder<ResolveResult> = Recorder::new();

    let victim = second.clone();
    pump.resolver()
        .resolve(&first, &printer(), move |_| victim.stop())
        .unwrap();
    pump.resolver()
        .resolve(
            &second,
            &ResolveParams::new("Lobby", "_ipp._tcp", "local."),
            second_results.sink(),
        )
        .unwrap();

    let operations = facility.operations();
    operations[1].inject_resolved("Lobby._ipp._tcp.local.", "lobby.local.", 631, b"");
    operations[0].inject_resolved("Office._ipp._tcp.local.", "office.local.", 631, b"");

    assert_eq!(pump.poll(WAIT).unwrap(), 1);
    assert!(second_results.is_empty());
    assert_eq!(second.state(), HandleState::Stopped);
    assert!(operations[1].is_released());
    assert_eq!(first.state(), HandleState::Active);
}

#[test]
fn test_resolve_error_reply_keeps_handle_active() {
    let (facility, pump) = setup();
    let handle = ServiceHandle::new();
    let results: Recorder<ResolveResult> = Recorder::new();

    pump.resolver()
        .resolve(&handle, &printer(), results.sink())
        .unwrap();
    let operation = facility.last_operation().unwrap();
    operation.inject_resolve_error(-65563);
    operation.inject_resolved("Office._ipp._tcp.local.", "a.local.", 631, b"");
    assert_eq!(pump.poll(WAIT).unwrap(), 2);

    let items = results.take();
    let err = items[0].as_ref().unwrap_err();
    assert_eq!(err.kind(), NativeErrorKind::ServiceNotRunning);
    assert!(err.message().contains("DNSServiceResolve()"));
    assert!(items[1].is_ok());
    assert_eq!(handle.state(), HandleState::Active);
}

#[test]
fn test_process_failure_is_delivered() {
    let (facility, pump) = setup();
    let handle = ServiceHandle::new();
    let results: Recorder<ResolveResult> = Recorder::new();

    pump.resolver()
        .resolve(&handle, &printer(), results.sink())
        .unwrap();
    let operation = facility.last_operation().unwrap();
    operation.fail_next_process(-65563);
    assert_eq!(pump.poll(WAIT).unwrap(), 1);

    let items = results.take();
    let err = items[0].as_ref().unwrap_err();
    assert_eq!(err.code(), -65563);
    assert!(err.message().contains("DNSServiceProcessResult()"));
    assert_eq!(handle.state(), HandleState::Active);
}

#[test]
fn test_resolve_validation() {
    let (facility, pump) = setup();
    let handle = ServiceHandle::new();

    let err = pump
        .resolver()
        .resolve(&handle, &ResolveParams::new("", "_ipp._tcp", "local."), |_| {})
        .unwrap_err();
    assert!(matches!(err, DiscoverError::Validation(ref e) if e.field == "name"));

    let err = pump
        .resolver()
        .resolve(&handle, &printer().with_interface_index(-42), |_| {})
        .unwrap_err();
    assert!(matches!(err, DiscoverError::Validation(ref e) if e.field == "interface_index"));

    assert_eq!(facility.start_calls(), 0);
    assert_eq!(handle.state(), HandleState::Uninitialized);
}

#[test]
fn test_resolve_on_active_handle_is_rejected() {
    let (facility, pump) = setup();
    let handle = ServiceHandle::new();

    pump.resolver().resolve(&handle, &printer(), |_| {}).unwrap();
    let err = pump
        .resolver()
        .resolve(&handle, &printer(), |_| {})
        .unwrap_err();
    assert!(matches!(err, DiscoverError::AlreadyInitialized));
    assert_eq!(facility.start_calls(), 1);
}

#[test]
fn test_resolve_on_initialized_handle_ignores_bad_params() {
    let (facility, pump) = setup();
    let handle = ServiceHandle::new();

    pump.resolver().resolve(&handle, &printer(), |_| {}).unwrap();
    let err = pump
        .resolver()
        .resolve(&handle, &ResolveParams::new("", "_ipp._tcp", "local."), |_| {})
        .unwrap_err();
    assert!(matches!(err, DiscoverError::AlreadyInitialized));
    assert_eq!(facility.start_calls(), 1);
    assert_eq!(handle.state(), HandleState::Active);
}

#[tokio::test]
async fn test_resolve_channel() {
    let (facility, pump) = setup();
    let handle = ServiceHandle::new();

    let mut rx = pump
        .resolver()
        .resolve_channel(&handle, &printer())
        .expect("resolve should start");
    let operation = facility.last_operation().unwrap();
    operation.inject_resolved("Office._ipp._tcp.local.", "a.local.", 631, b"");
    operation.inject_resolved("Office._ipp._tcp.local.", "b.local.", 632, b"");
    assert_eq!(pump.poll(WAIT).unwrap(), 2);

    assert_eq!(rx.recv().await.unwrap().unwrap().host_target, "a.local.");
    assert_eq!(rx.recv().await.unwrap().unwrap().host_target, "b.local.");

    handle.stop();
    assert!(rx.recv().await.is_none());
}

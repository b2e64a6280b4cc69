// CLASSIFICATION: COMMUNITY
// Filename: launch_sequence.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

use hipbyptr::device::{RecordedCall, RecordingRuntime, RuntimeError, StreamHandle};
use hipbyptr::registry::KernelMetadata;
use hipbyptr::{
    Dim3, ErrorKind, FatbinBuilder, FatbinImage, KernelEntry, LaunchIdentity, Shim, ShimConfig,
    ShimError,
};
use std::ffi::CString;

const A: LaunchIdentity = LaunchIdentity(0x4010);
const B: LaunchIdentity = LaunchIdentity(0x4020);
const C: LaunchIdentity = LaunchIdentity(0x4030);

fn config() -> ShimConfig {
    ShimConfig {
        max_kernels: 8,
        max_arg_bytes: 256,
        honor_stream: false,
        ..ShimConfig::default()
    }
}

fn kernel(identity: LaunchIdentity, name: &str) -> KernelEntry {
    KernelEntry::new(
        identity,
        format!("_Z{}{}v", name.len(), name),
        CString::new(name).unwrap(),
        1024,
        KernelMetadata::default(),
    )
}

fn registered(recorder: &RecordingRuntime) -> Shim<RecordingRuntime> {
    let _ = env_logger::builder().is_test(true).try_init();
    let bytes = FatbinBuilder::new()
        .part(803, b"old")
        .part(906, b"code object")
        .build();
    let image = FatbinImage::parse(&bytes).unwrap();
    let mut shim = Shim::new(recorder.clone(), config());
    let handle = shim.register_fat_binary(&image).unwrap();
    shim.register_kernel_function(handle, kernel(A, "alpha")).unwrap();
    shim.register_kernel_function(handle, kernel(B, "beta")).unwrap();
    shim.register_kernel_function(handle, kernel(C, "gamma")).unwrap();
    shim
}

#[test]
fn launch_resolves_exact_identity() {
    let recorder = RecordingRuntime::new(906);
    let mut shim = registered(&recorder);
    shim.configure_launch(Dim3::new(1, 1, 1), Dim3::new(64, 1, 1), 0, StreamHandle::DEFAULT)
        .unwrap();
    shim.launch_by_identity(B).unwrap();
    let launches = recorder.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].kernel, "beta");
    let looked_up: Vec<_> = recorder
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            RecordedCall::ModuleFunction { name, .. } => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(looked_up, vec![String::from("beta")]);
}

#[test]
fn arguments_arrive_packed() {
    let recorder = RecordingRuntime::new(906);
    let mut shim = registered(&recorder);
    shim.configure_launch(Dim3::new(8, 1, 1), Dim3::new(256, 1, 1), 0, StreamHandle::DEFAULT)
        .unwrap();
    let pointer = 0x7f00_dead_beef_u64.to_ne_bytes();
    let count = 1024u32.to_ne_bytes();
    let scale = 0.5f32.to_ne_bytes();
    shim.setup_argument(&pointer, 0).unwrap();
    shim.setup_argument(&count, 8).unwrap();
    shim.setup_argument(&scale, 12).unwrap();
    shim.launch_by_identity(A).unwrap();

    let launch = &recorder.launches()[0];
    let expected: Vec<u8> = [&pointer[..], &count[..], &scale[..]].concat();
    assert_eq!(launch.extra_size, 16);
    assert_eq!(launch.args, expected);
}

#[test]
fn second_configure_wins() {
    let recorder = RecordingRuntime::new(906);
    let mut shim = registered(&recorder);
    shim.configure_launch(Dim3::new(4, 4, 1), Dim3::new(16, 16, 1), 512, StreamHandle(9))
        .unwrap();
    shim.setup_argument(&[1; 8], 0).unwrap();
    shim.configure_launch(Dim3::new(2, 1, 1), Dim3::new(32, 1, 1), 64, StreamHandle(9))
        .unwrap();
    shim.setup_argument(&[2; 4], 0).unwrap();
    shim.launch_by_identity(C).unwrap();

    let launch = &recorder.launches()[0];
    assert_eq!(launch.grid, Dim3::new(2, 1, 1));
    assert_eq!(launch.block, Dim3::new(32, 1, 1));
    assert_eq!(launch.shared_mem_bytes, 64);
    assert_eq!(launch.args, vec![2; 4]);
    // The configured stream is not forwarded unless asked for.
    assert_eq!(launch.stream, StreamHandle::DEFAULT);
}

#[test]
fn launch_is_followed_by_synchronize() {
    let recorder = RecordingRuntime::new(906);
    let mut shim = registered(&recorder);
    shim.configure_launch(Dim3::default(), Dim3::default(), 0, StreamHandle::DEFAULT)
        .unwrap();
    shim.launch_by_identity(A).unwrap();
    let calls = recorder.calls();
    let tail = &calls[calls.len() - 2..];
    assert!(matches!(tail[0], RecordedCall::Launch(_)));
    assert_eq!(tail[1], RecordedCall::Synchronize);
}

#[test]
fn honored_stream_is_forwarded() {
    let recorder = RecordingRuntime::new(906);
    let bytes = FatbinBuilder::new().part(906, b"code").build();
    let image = FatbinImage::parse(&bytes).unwrap();
    let mut shim = Shim::new(
        recorder.clone(),
        ShimConfig {
            honor_stream: true,
            ..config()
        },
    );
    let handle = shim.register_fat_binary(&image).unwrap();
    shim.register_kernel_function(handle, kernel(A, "alpha")).unwrap();
    shim.configure_launch(Dim3::default(), Dim3::default(), 0, StreamHandle(0x55))
        .unwrap();
    shim.launch_by_identity(A).unwrap();
    assert_eq!(recorder.launches()[0].stream, StreamHandle(0x55));
}

#[test]
fn unknown_identity_is_a_lookup_error() {
    let recorder = RecordingRuntime::new(906);
    let mut shim = registered(&recorder);
    let err = shim.launch_by_identity(LaunchIdentity(0x9999)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lookup);
    assert!(recorder.launches().is_empty());
}

#[test]
fn launch_failure_is_returned_with_status() {
    let recorder = RecordingRuntime::new(906)
        .with_launch_failure(RuntimeError::new("hipModuleLaunchKernel", 719, "launch failure"));
    let mut shim = registered(&recorder);
    shim.configure_launch(Dim3::default(), Dim3::default(), 0, StreamHandle::DEFAULT)
        .unwrap();
    let err = shim.launch_by_identity(B).unwrap_err();
    assert_eq!(err.status(), 719);
    assert!(!recorder.calls().contains(&RecordedCall::Synchronize));
}

#[test]
fn no_matching_part_skips_module_load() {
    let recorder = RecordingRuntime::new(1100);
    let bytes = FatbinBuilder::new().part(906, b"code").build();
    let image = FatbinImage::parse(&bytes).unwrap();
    let mut shim = Shim::new(recorder.clone(), config());
    let err = shim.register_fat_binary(&image).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(!recorder
        .calls()
        .iter()
        .any(|call| matches!(call, RecordedCall::LoadModule { .. })));
}

#[test]
fn kernel_table_fails_closed() {
    let recorder = RecordingRuntime::new(906);
    let bytes = FatbinBuilder::new().part(906, b"code").build();
    let image = FatbinImage::parse(&bytes).unwrap();
    let mut shim = Shim::new(
        recorder,
        ShimConfig {
            max_kernels: 1,
            ..config()
        },
    );
    let handle = shim.register_fat_binary(&image).unwrap();
    shim.register_kernel_function(handle, kernel(A, "alpha")).unwrap();
    let err = shim
        .register_kernel_function(handle, kernel(B, "beta"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capacity);
}

#[test]
fn argument_buffer_fails_closed() {
    let recorder = RecordingRuntime::new(906);
    let mut shim = registered(&recorder);
    shim.configure_launch(Dim3::default(), Dim3::default(), 0, StreamHandle::DEFAULT)
        .unwrap();
    let err = shim.setup_argument(&[0; 16], 248).unwrap_err();
    assert!(matches!(err, ShimError::ArgumentCapacity { capacity: 256, .. }));
}

#[test]
fn unregister_then_registry_use_is_reported() {
    let recorder = RecordingRuntime::new(906);
    let mut shim = registered(&recorder);
    let handle = shim.state().unwrap().handle();
    shim.unregister_fat_binary(handle).unwrap();
    assert!(!shim.is_registered());
    assert!(recorder
        .calls()
        .iter()
        .any(|call| matches!(call, RecordedCall::UnloadModule(_))));

    let err = shim
        .register_kernel_function(handle, kernel(A, "alpha"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lifecycle);
    assert!(matches!(
        shim.configure_launch(Dim3::default(), Dim3::default(), 0, StreamHandle::DEFAULT),
        Err(ShimError::NotRegistered)
    ));
    assert!(matches!(
        shim.unregister_fat_binary(handle),
        Err(ShimError::NotRegistered)
    ));
}

#[test]
fn registration_after_teardown_starts_fresh() {
    let recorder = RecordingRuntime::new(906);
    let mut shim = registered(&recorder);
    let first = shim.state().unwrap().handle();
    shim.unregister_fat_binary(first).unwrap();

    let bytes = FatbinBuilder::new().part(906, b"again").build();
    let image = FatbinImage::parse(&bytes).unwrap();
    let second = shim.register_fat_binary(&image).unwrap();
    assert_ne!(first, second);
    assert!(shim.state().unwrap().registry().is_empty());
}

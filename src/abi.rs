// CLASSIFICATION: COMMUNITY
// Filename: abi.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! C entry points called by compiler-generated host code.
//!
//! One process-wide [`Shim`] sits behind a mutex. The HIP runtime is loaded
//! lazily by the first fat-binary registration unless a runtime was
//! installed beforehand with [`install_runtime`]. Errors from the core are
//! handled according to [`ErrorPolicy`]: fatal exits the process, otherwise
//! the HIP status code is returned (or a null handle from registration).
//! `hipi_GetDeviceProperties` always returns its status.

#![allow(non_snake_case)]

use std::ffi::{c_char, c_int, c_uint, c_void, CStr};
use std::process;
use std::sync::Mutex;

use log::{debug, error, warn};
use once_cell::sync::Lazy;

use crate::config::{self, ErrorPolicy, ShimConfig};
use crate::device::{DeviceRuntime, HipRuntime, HipiDeviceProp, StreamHandle};
use crate::error::{status, ShimError, ShimResult};
use crate::fatbin::{FatbinImage, FatbinWrapper};
use crate::gate::LaunchGate;
use crate::logging;
use crate::registry::{KernelEntry, KernelMetadata, LaunchIdentity};
use crate::shim::{FatbinHandle, Shim, VariableInfo};
use crate::staging::Dim3;

type DynShim = Shim<Box<dyn DeviceRuntime>>;

struct Global {
    shim: Mutex<Option<DynShim>>,
    gate: LaunchGate,
}

static GLOBAL: Lazy<Global> = Lazy::new(|| Global {
    shim: Mutex::new(None),
    gate: LaunchGate::new(),
});

fn current_config() -> ShimConfig {
    config::get_config().unwrap_or_else(|err| {
        warn!("{err}; using environment defaults");
        ShimConfig::default()
    })
}

/// Use `runtime` instead of loading the HIP library.
///
/// Any registered state is dropped without calling into the old runtime.
pub fn install_runtime(runtime: Box<dyn DeviceRuntime>) -> ShimResult<()> {
    let mut guard = GLOBAL.shim.lock().map_err(|_| ShimError::LockPoisoned)?;
    *guard = Some(Shim::new(runtime, current_config()));
    Ok(())
}

/// Drop the process-wide shim and free the launch gate; the next
/// registration starts from scratch.
pub fn reset() -> ShimResult<()> {
    GLOBAL.gate.clear();
    let mut guard = GLOBAL.shim.lock().map_err(|_| ShimError::LockPoisoned)?;
    *guard = None;
    Ok(())
}

/// Whether a fat binary is currently registered.
pub fn is_registered() -> bool {
    GLOBAL
        .shim
        .lock()
        .map(|guard| guard.as_ref().is_some_and(Shim::is_registered))
        .unwrap_or(false)
}

fn with_shim<T>(f: impl FnOnce(&mut DynShim) -> ShimResult<T>) -> ShimResult<T> {
    let mut guard = GLOBAL.shim.lock().map_err(|_| ShimError::LockPoisoned)?;
    let shim = guard.as_mut().ok_or(ShimError::NotRegistered)?;
    f(shim)
}

/// Like [`with_shim`], loading the HIP runtime first if needed.
fn with_loaded_shim<T>(f: impl FnOnce(&mut DynShim) -> ShimResult<T>) -> ShimResult<T> {
    let mut guard = GLOBAL.shim.lock().map_err(|_| ShimError::LockPoisoned)?;
    if guard.is_none() {
        let cfg = current_config();
        let runtime = HipRuntime::load(&cfg)?;
        *guard = Some(Shim::new(Box::new(runtime), cfg));
    }
    let shim = guard.as_mut().ok_or(ShimError::NotRegistered)?;
    f(shim)
}

/// Report `err` for `call` and apply the error policy.
fn fail(call: &str, err: &ShimError) -> c_int {
    error!("{call}: {err}");
    if current_config().error_policy == ErrorPolicy::Fatal {
        process::exit(1);
    }
    err.status()
}

fn handle_from_raw(raw: *mut *mut c_void) -> ShimResult<FatbinHandle> {
    FatbinHandle::from_raw(raw as usize).ok_or(ShimError::StaleHandle(0))
}

unsafe fn optional_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

/// Register the fat binary behind the compiler-emitted wrapper `data`.
///
/// # Safety
///
/// `data` must be null or point at a wrapper whose binary pointer addresses
/// a complete fat binary that outlives the registration.
#[no_mangle]
pub unsafe extern "C" fn __hipRegisterFatBinary(data: *const c_void) -> *mut *mut c_void {
    let cfg = current_config();
    logging::init(cfg.debug);
    debug!("__hipRegisterFatBinary wrapper {:p}", data);
    let registered = FatbinWrapper::from_raw(data)
        .and_then(|wrapper| FatbinImage::from_wrapper(&wrapper))
        .map_err(ShimError::from)
        .and_then(|image| with_loaded_shim(|shim| shim.register_fat_binary(&image)));
    match registered {
        Ok(handle) => handle.as_raw() as *mut *mut c_void,
        Err(err) => {
            fail("__hipRegisterFatBinary", &err);
            std::ptr::null_mut()
        }
    }
}

/// Record one kernel of the registered fat binary.
///
/// # Safety
///
/// `kernel_name` must be a NUL-terminated string; `host_name` must be null
/// or NUL-terminated. The metadata pointers are stored, never dereferenced.
#[no_mangle]
pub unsafe extern "C" fn __hipRegisterFunction(
    modules: *mut *mut c_void,
    host_function: *const c_void,
    host_name: *const c_char,
    kernel_name: *const c_char,
    thread_limit: c_uint,
    thread_idx: *mut c_void,
    block_idx: *mut c_void,
    block_dim: *mut Dim3,
    grid_dim: *mut Dim3,
    warp_size: *mut c_int,
) {
    let registered = (|| {
        let handle = handle_from_raw(modules)?;
        if kernel_name.is_null() {
            return Err(ShimError::InvalidArgument(String::from(
                "kernel name is null",
            )));
        }
        let entry = KernelEntry::new(
            LaunchIdentity(host_function as usize),
            optional_str(host_name),
            CStr::from_ptr(kernel_name).to_owned(),
            thread_limit,
            KernelMetadata {
                thread_idx: thread_idx as usize,
                block_idx: block_idx as usize,
                block_dim: block_dim as usize,
                grid_dim: grid_dim as usize,
                warp_size: warp_size as usize,
            },
        );
        with_shim(|shim| shim.register_kernel_function(handle, entry))
    })();
    if let Err(err) = registered {
        fail("__hipRegisterFunction", &err);
    }
}

/// Accept a host-variable registration. Nothing is mirrored.
///
/// # Safety
///
/// `device_name` must be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn __hipRegisterVar(
    modules: *mut *mut c_void,
    host_var: *mut c_char,
    device_address: *mut c_char,
    device_name: *const c_char,
    ext: c_int,
    size: c_int,
    constant: c_int,
    global: c_int,
) {
    let var = VariableInfo {
        host_var: host_var as usize,
        device_address: device_address as usize,
        device_name: optional_str(device_name),
        external: ext != 0,
        size: usize::try_from(size).unwrap_or(0),
        constant: constant != 0,
        global: global != 0,
    };
    let registered =
        handle_from_raw(modules).and_then(|handle| with_shim(|shim| shim.register_variable(handle, &var)));
    if let Err(err) = registered {
        warn!("__hipRegisterVar: {err}");
    }
}

/// Tear down the registration named by `modules`.
///
/// # Safety
///
/// Callable with any pointer value; it is compared, never dereferenced.
#[no_mangle]
pub unsafe extern "C" fn __hipUnregisterFatBinary(modules: *mut *mut c_void) {
    debug!("__hipUnregisterFatBinary called for {:p}", modules);
    let unregistered =
        handle_from_raw(modules).and_then(|handle| with_shim(|shim| shim.unregister_fat_binary(handle)));
    if let Err(err) = unregistered {
        warn!("__hipUnregisterFatBinary: {err}");
    }
}

/// Stage geometry for the next launch; takes the launch gate.
///
/// # Safety
///
/// `stream` is carried as an opaque value and never dereferenced.
#[no_mangle]
pub unsafe extern "C" fn hipConfigureCall(
    grid_dim: Dim3,
    block_dim: Dim3,
    shared_mem: i64,
    stream: *mut c_void,
) -> c_int {
    let configured = GLOBAL.gate.acquire().map_err(ShimError::from).and_then(|()| {
        let shared = usize::try_from(shared_mem).map_err(|_| {
            ShimError::InvalidArgument(format!("negative shared memory size {shared_mem}"))
        })?;
        with_shim(|shim| {
            shim.configure_launch(grid_dim, block_dim, shared, StreamHandle(stream as usize))
        })
    });
    match configured {
        Ok(()) => status::SUCCESS,
        Err(err) => {
            release_gate();
            fail("hipConfigureCall", &err)
        }
    }
}

/// Copy `size` bytes from `arg` to `offset` in the staged argument buffer.
///
/// # Safety
///
/// `arg` must point at `size` readable bytes unless `size` is zero.
#[no_mangle]
pub unsafe extern "C" fn hipSetupArgument(arg: *const c_void, size: usize, offset: usize) -> c_int {
    let staged = GLOBAL.gate.acquire().map_err(ShimError::from).and_then(|()| {
        let bytes: &[u8] = if size == 0 {
            &[]
        } else if arg.is_null() {
            return Err(ShimError::InvalidArgument(String::from(
                "argument pointer is null",
            )));
        } else {
            std::slice::from_raw_parts(arg.cast::<u8>(), size)
        };
        with_shim(|shim| shim.setup_argument(bytes, offset))
    });
    match staged {
        Ok(()) => status::SUCCESS,
        Err(err) => {
            release_gate();
            fail("hipSetupArgument", &err)
        }
    }
}

/// Launch the kernel registered under `host_function` and wait for it.
///
/// # Safety
///
/// `host_function` is compared against registered identities, never
/// dereferenced.
#[no_mangle]
pub unsafe extern "C" fn hipLaunchByPtr(host_function: *const c_void) -> c_int {
    let identity = LaunchIdentity(host_function as usize);
    let launched = GLOBAL
        .gate
        .acquire()
        .map_err(ShimError::from)
        .and_then(|()| with_shim(|shim| shim.launch_by_identity(identity)));
    release_gate();
    match launched {
        Ok(()) => status::SUCCESS,
        Err(err) => fail("hipLaunchByPtr", &err),
    }
}

fn release_gate() {
    if let Err(err) = GLOBAL.gate.release() {
        warn!("{err}");
    }
}

/// Flat copy of the properties of `device`.
///
/// Failures are returned as a HIP status under either error policy; this
/// query never exits the process.
///
/// # Safety
///
/// `props` must be null or point at a writable [`HipiDeviceProp`].
#[no_mangle]
pub unsafe extern "C" fn hipi_GetDeviceProperties(props: *mut HipiDeviceProp, device: c_int) -> c_int {
    if props.is_null() {
        error!("hipi_GetDeviceProperties: property record is null");
        return status::INVALID_VALUE;
    }
    match with_loaded_shim(|shim| shim.device_properties(device)) {
        Ok(found) => {
            props.write(HipiDeviceProp::from(&found));
            status::SUCCESS
        }
        Err(err) => {
            error!("hipi_GetDeviceProperties: {err}");
            err.status()
        }
    }
}

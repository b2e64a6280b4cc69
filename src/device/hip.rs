// CLASSIFICATION: COMMUNITY
// Filename: hip.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! HIP runtime bound at load time through `libloading`.
//!
//! The shim never links against the vendor runtime directly. The shared
//! library is opened on first registration and every entry point is
//! resolved into a plain function pointer.

use std::ffi::{c_char, c_int, c_uint, c_void, CStr};
use std::mem::MaybeUninit;
use std::path::PathBuf;
use std::ptr;

use libloading::{Library, Symbol};
use log::{debug, info, warn};

use super::props::{name_from_c, DeviceProperties, DEVICE_NAME_LEN};
use super::{
    ContextHandle, DeviceHandle, DeviceRuntime, DeviceSession, FunctionHandle, ModuleHandle,
    RuntimeError, RuntimeResult,
};
use crate::config::ShimConfig;
use crate::dispatch::KernelLaunch;
use crate::error::status;

/// Sonames tried when no explicit library is configured.
pub const DEFAULT_LIBRARIES: &[&str] = &["libamdhip64.so.6", "libamdhip64.so.5", "libamdhip64.so"];

type HipError = c_int;
type HipCtx = *mut c_void;
type HipModule = *mut c_void;
type HipFunction = *mut c_void;
type HipStream = *mut c_void;

type FnHipInit = unsafe extern "C" fn(flags: c_uint) -> HipError;
type FnHipDeviceGet = unsafe extern "C" fn(device: *mut c_int, ordinal: c_int) -> HipError;
type FnHipCtxCreate = unsafe extern "C" fn(ctx: *mut HipCtx, flags: c_uint, device: c_int) -> HipError;
type FnHipCtxDestroy = unsafe extern "C" fn(ctx: HipCtx) -> HipError;
type FnHipGetDeviceProperties =
    unsafe extern "C" fn(props: *mut HipDevicePropR0000, device: c_int) -> HipError;
type FnHipModuleLoadData =
    unsafe extern "C" fn(module: *mut HipModule, image: *const c_void) -> HipError;
type FnHipModuleUnload = unsafe extern "C" fn(module: HipModule) -> HipError;
type FnHipModuleGetFunction =
    unsafe extern "C" fn(function: *mut HipFunction, module: HipModule, name: *const c_char) -> HipError;
type FnHipModuleLaunchKernel = unsafe extern "C" fn(
    function: HipFunction,
    grid_x: c_uint,
    grid_y: c_uint,
    grid_z: c_uint,
    block_x: c_uint,
    block_y: c_uint,
    block_z: c_uint,
    shared_mem_bytes: c_uint,
    stream: HipStream,
    kernel_params: *mut *mut c_void,
    extra: *mut *mut c_void,
) -> HipError;
type FnHipDeviceSynchronize = unsafe extern "C" fn() -> HipError;
type FnHipGetErrorString = unsafe extern "C" fn(error: HipError) -> *const c_char;

/// Leading fields of the legacy `hipDeviceProp_t` layout.
///
/// Only the prefix up to `gcnArch` is read; the tail reserves room for the
/// remainder of the record, which grows between runtime releases.
#[repr(C)]
#[allow(dead_code)]
struct HipDevicePropR0000 {
    name: [c_char; DEVICE_NAME_LEN],
    total_global_mem: usize,
    shared_mem_per_block: usize,
    regs_per_block: c_int,
    warp_size: c_int,
    max_threads_per_block: c_int,
    max_threads_dim: [c_int; 3],
    max_grid_size: [c_int; 3],
    clock_rate: c_int,
    memory_clock_rate: c_int,
    memory_bus_width: c_int,
    total_const_mem: usize,
    major: c_int,
    minor: c_int,
    multi_processor_count: c_int,
    l2_cache_size: c_int,
    max_threads_per_multi_processor: c_int,
    compute_mode: c_int,
    clock_instruction_rate: c_int,
    arch: c_uint,
    concurrent_kernels: c_int,
    pci_domain_id: c_int,
    pci_bus_id: c_int,
    pci_device_id: c_int,
    max_shared_memory_per_multi_processor: usize,
    is_multi_gpu_board: c_int,
    can_map_host_memory: c_int,
    gcn_arch: c_int,
    tail: [u8; 1024],
}

impl From<&HipDevicePropR0000> for DeviceProperties {
    fn from(raw: &HipDevicePropR0000) -> Self {
        Self {
            name: name_from_c(&raw.name),
            total_global_mem: raw.total_global_mem,
            shared_mem_per_block: raw.shared_mem_per_block,
            regs_per_block: raw.regs_per_block,
            warp_size: raw.warp_size,
            max_threads_per_block: raw.max_threads_per_block,
            max_threads_dim: raw.max_threads_dim,
            max_grid_size: raw.max_grid_size,
            clock_rate: raw.clock_rate,
            memory_clock_rate: raw.memory_clock_rate,
            total_const_mem: raw.total_const_mem,
            major: raw.major,
            minor: raw.minor,
            multi_processor_count: raw.multi_processor_count,
            l2_cache_size: raw.l2_cache_size,
            max_threads_per_multi_processor: raw.max_threads_per_multi_processor,
            compute_mode: raw.compute_mode,
            concurrent_kernels: raw.concurrent_kernels,
            pci_bus_id: raw.pci_bus_id,
            pci_device_id: raw.pci_device_id,
            is_multi_gpu_board: raw.is_multi_gpu_board,
            can_map_host_memory: raw.can_map_host_memory,
            gcn_arch: raw.gcn_arch,
        }
    }
}

/// Function table resolved from the HIP runtime library.
pub struct HipRuntime {
    _lib: Library,
    path: String,
    hip_init: FnHipInit,
    hip_device_get: FnHipDeviceGet,
    hip_ctx_create: FnHipCtxCreate,
    hip_ctx_destroy: FnHipCtxDestroy,
    hip_get_device_properties: FnHipGetDeviceProperties,
    hip_module_load_data: FnHipModuleLoadData,
    hip_module_unload: FnHipModuleUnload,
    hip_module_get_function: FnHipModuleGetFunction,
    hip_module_launch_kernel: FnHipModuleLaunchKernel,
    hip_device_synchronize: FnHipDeviceSynchronize,
    hip_get_error_string: Option<FnHipGetErrorString>,
}

// SAFETY: the table holds only the library handle and function pointers;
// the HIP runtime is callable from any thread.
unsafe impl Send for HipRuntime {}

impl std::fmt::Debug for HipRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HipRuntime").field("path", &self.path).finish()
    }
}

impl HipRuntime {
    /// Open the configured library, or the first default soname that loads.
    pub fn load(config: &ShimConfig) -> RuntimeResult<Self> {
        let candidates: Vec<PathBuf> = match &config.library {
            Some(path) => vec![path.clone()],
            None => DEFAULT_LIBRARIES.iter().map(PathBuf::from).collect(),
        };
        let mut last_error = String::from("no candidate libraries");
        for candidate in &candidates {
            match unsafe { Library::new(candidate) } {
                Ok(lib) => {
                    let path = candidate.display().to_string();
                    info!("loaded HIP runtime from {}", path);
                    return unsafe { Self::resolve(lib, path) };
                }
                Err(err) => {
                    debug!("cannot open {}: {}", candidate.display(), err);
                    last_error = err.to_string();
                }
            }
        }
        warn!("HIP runtime library not found");
        Err(RuntimeError::new(
            "dlopen",
            status::SHARED_OBJECT_INIT_FAILED,
            last_error,
        ))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    unsafe fn resolve(lib: Library, path: String) -> RuntimeResult<Self> {
        Ok(Self {
            hip_init: load_fn(&lib, "hipInit")?,
            hip_device_get: load_fn(&lib, "hipDeviceGet")?,
            hip_ctx_create: load_fn(&lib, "hipCtxCreate")?,
            hip_ctx_destroy: load_fn(&lib, "hipCtxDestroy")?,
            hip_get_device_properties: load_fn(&lib, "hipGetDevicePropertiesR0000")
                .or_else(|_| load_fn(&lib, "hipGetDeviceProperties"))?,
            hip_module_load_data: load_fn(&lib, "hipModuleLoadData")?,
            hip_module_unload: load_fn(&lib, "hipModuleUnload")?,
            hip_module_get_function: load_fn(&lib, "hipModuleGetFunction")?,
            hip_module_launch_kernel: load_fn(&lib, "hipModuleLaunchKernel")?,
            hip_device_synchronize: load_fn(&lib, "hipDeviceSynchronize")?,
            hip_get_error_string: load_fn(&lib, "hipGetErrorString").ok(),
            _lib: lib,
            path,
        })
    }

    fn check(&self, call: &'static str, code: HipError) -> RuntimeResult<()> {
        if code == status::SUCCESS {
            debug!("{} succeeded.", call);
            return Ok(());
        }
        let message = self
            .hip_get_error_string
            .map(|describe| unsafe { describe(code) })
            .filter(|text| !text.is_null())
            .map(|text| unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("unknown error"));
        Err(RuntimeError::new(call, code, message))
    }

    fn query_properties(&self, device: c_int) -> RuntimeResult<DeviceProperties> {
        let mut raw = MaybeUninit::<HipDevicePropR0000>::zeroed();
        let code = unsafe { (self.hip_get_device_properties)(raw.as_mut_ptr(), device) };
        self.check("hipGetDeviceProperties", code)?;
        // SAFETY: zero-initialised and filled by the runtime.
        let raw = unsafe { raw.assume_init() };
        Ok(DeviceProperties::from(&raw))
    }
}

unsafe fn load_fn<F: Copy>(lib: &Library, name: &'static str) -> RuntimeResult<F> {
    let symbol: Symbol<F> = lib.get(name.as_bytes()).map_err(|err| {
        RuntimeError::new(
            name,
            status::SHARED_OBJECT_SYMBOL_NOT_FOUND,
            err.to_string(),
        )
    })?;
    Ok(*symbol)
}

impl DeviceRuntime for HipRuntime {
    fn open_device(&mut self, ordinal: i32) -> RuntimeResult<DeviceSession> {
        self.check("hipInit", unsafe { (self.hip_init)(0) })?;
        let mut device: c_int = 0;
        self.check("hipDeviceGet", unsafe {
            (self.hip_device_get)(&mut device, ordinal)
        })?;
        let mut context: HipCtx = ptr::null_mut();
        self.check("hipCtxCreate", unsafe {
            (self.hip_ctx_create)(&mut context, 0, device)
        })?;
        let props = match self.query_properties(device) {
            Ok(props) => props,
            Err(err) => {
                unsafe { (self.hip_ctx_destroy)(context) };
                return Err(err);
            }
        };
        let subarch = u32::try_from(props.gcn_arch).unwrap_or(0);
        debug!("device {} {} subarch {}", ordinal, props.name, subarch);
        Ok(DeviceSession {
            ordinal,
            device: DeviceHandle(device),
            context: ContextHandle(context as usize),
            name: props.name,
            subarch,
        })
    }

    fn load_module(&mut self, image: &[u8]) -> RuntimeResult<ModuleHandle> {
        let mut module: HipModule = ptr::null_mut();
        self.check("hipModuleLoadData", unsafe {
            (self.hip_module_load_data)(&mut module, image.as_ptr().cast())
        })?;
        Ok(ModuleHandle(module as usize))
    }

    fn module_function(
        &mut self,
        module: ModuleHandle,
        name: &CStr,
    ) -> RuntimeResult<FunctionHandle> {
        let mut function: HipFunction = ptr::null_mut();
        self.check("hipModuleGetFunction", unsafe {
            (self.hip_module_get_function)(&mut function, module.0 as HipModule, name.as_ptr())
        })?;
        Ok(FunctionHandle(function as usize))
    }

    fn launch_kernel(
        &mut self,
        function: FunctionHandle,
        launch: &mut KernelLaunch<'_>,
    ) -> RuntimeResult<()> {
        let (grid, block) = (launch.grid, launch.block);
        let shared = launch.shared_mem_bytes;
        let stream = launch.stream.0 as HipStream;
        let mut extra = launch.extra_params();
        let code = unsafe {
            (self.hip_module_launch_kernel)(
                function.0 as HipFunction,
                grid.x,
                grid.y,
                grid.z,
                block.x,
                block.y,
                block.z,
                shared,
                stream,
                ptr::null_mut(),
                extra.as_mut_ptr(),
            )
        };
        self.check("hipModuleLaunchKernel", code)
    }

    fn synchronize(&mut self) -> RuntimeResult<()> {
        self.check("hipDeviceSynchronize", unsafe {
            (self.hip_device_synchronize)()
        })
    }

    fn device_properties(&mut self, ordinal: i32) -> RuntimeResult<DeviceProperties> {
        self.check("hipInit", unsafe { (self.hip_init)(0) })?;
        let mut device: c_int = 0;
        self.check("hipDeviceGet", unsafe {
            (self.hip_device_get)(&mut device, ordinal)
        })?;
        self.query_properties(device)
    }

    fn unload_module(&mut self, module: ModuleHandle) -> RuntimeResult<()> {
        self.check("hipModuleUnload", unsafe {
            (self.hip_module_unload)(module.0 as HipModule)
        })
    }

    fn close_device(&mut self, session: &DeviceSession) -> RuntimeResult<()> {
        self.check("hipCtxDestroy", unsafe {
            (self.hip_ctx_destroy)(session.context.0 as HipCtx)
        })
    }
}

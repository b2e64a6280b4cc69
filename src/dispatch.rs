// CLASSIFICATION: COMMUNITY
// Filename: dispatch.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Launch dispatcher.
//!
//! Turns the staged geometry and argument bytes into a module launch. The
//! arguments travel as one packed buffer through the driver's "extra"
//! parameter list rather than as per-argument pointers.

use std::ffi::c_void;
use std::marker::PhantomData;

use log::debug;

use crate::device::{DeviceRuntime, ModuleHandle, StreamHandle};
use crate::error::ShimResult;
use crate::registry::KernelEntry;
use crate::staging::{Dim3, LaunchStaging};

/// Tag announcing the argument buffer pointer.
pub const LAUNCH_PARAM_BUFFER_POINTER: usize = 0x01;
/// Tag announcing a pointer to the argument buffer size.
pub const LAUNCH_PARAM_BUFFER_SIZE: usize = 0x02;
/// Terminates the list.
pub const LAUNCH_PARAM_END: usize = 0x03;

/// Everything the driver needs for one kernel launch.
#[derive(Debug)]
pub struct KernelLaunch<'a> {
    pub grid: Dim3,
    pub block: Dim3,
    pub shared_mem_bytes: u32,
    pub stream: StreamHandle,
    pub args: &'a mut [u8],
}

impl<'a> KernelLaunch<'a> {
    pub fn extra_params(&mut self) -> ExtraParams<'_> {
        ExtraParams::new(&mut *self.args)
    }
}

/// Sentinel-terminated `[tag, value, tag, value, END]` list.
#[derive(Debug)]
pub struct ExtraParams<'a> {
    slots: [*mut c_void; 5],
    size: usize,
    _args: PhantomData<&'a mut [u8]>,
}

impl<'a> ExtraParams<'a> {
    pub fn new(args: &'a mut [u8]) -> Self {
        Self {
            slots: [
                LAUNCH_PARAM_BUFFER_POINTER as *mut c_void,
                args.as_mut_ptr().cast(),
                LAUNCH_PARAM_BUFFER_SIZE as *mut c_void,
                std::ptr::null_mut(),
                LAUNCH_PARAM_END as *mut c_void,
            ],
            size: args.len(),
            _args: PhantomData,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.size
    }

    pub fn buffer_ptr(&self) -> *const u8 {
        self.slots[1].cast_const().cast()
    }

    /// Pointer handed to the driver; valid while `self` is borrowed.
    pub fn as_mut_ptr(&mut self) -> *mut *mut c_void {
        self.slots[3] = (&mut self.size as *mut usize).cast();
        self.slots.as_mut_ptr()
    }
}

/// Launch `kernel` with the staged configuration and wait for completion.
///
/// The staged stream is used only when `honor_stream` is set; otherwise the
/// launch goes to the default stream.
pub fn dispatch<R: DeviceRuntime + ?Sized>(
    runtime: &mut R,
    module: ModuleHandle,
    kernel: &KernelEntry,
    staging: &mut LaunchStaging,
    honor_stream: bool,
) -> ShimResult<()> {
    let staging_stream = staging.stream();
    let stream = if honor_stream {
        staging_stream
    } else {
        StreamHandle::DEFAULT
    };
    let grid = staging.grid();
    let block = staging.block();
    let shared_mem_bytes = staging.shared_mem_bytes();
    let mut launch = KernelLaunch {
        grid,
        block,
        shared_mem_bytes,
        stream,
        args: staging.args_mut(),
    };

    let function = runtime.module_function(module, kernel.kernel_name())?;
    debug!("Function: {:?}", function);
    debug!("LAUNCHING KERNEL: {}", kernel.kernel_name_lossy());
    debug!("Argument size: {}", launch.args.len());
    debug!("GRID{} BLOCK{} shared {} stream {:?}", grid, block, shared_mem_bytes, stream);
    debug!("{} blocks of {} threads", grid.volume(), block.volume());
    if !honor_stream && !staging_stream.is_default() {
        debug!("staged stream {:?} replaced by the default stream", staging_stream);
    }

    runtime.launch_kernel(function, &mut launch)?;
    runtime.synchronize()?;
    Ok(())
}

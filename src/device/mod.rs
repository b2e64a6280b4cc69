// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Boundary to the GPU driver runtime.
//!
//! Device discovery, context creation, module loading, function lookup and
//! kernel execution are consumed through [`DeviceRuntime`]. Handles are
//! carried as plain integers so the shim state can live in a process-wide
//! `Mutex`.

use std::ffi::CStr;

use thiserror::Error;

use crate::dispatch::KernelLaunch;

pub mod hip;
pub mod props;
#[cfg(any(test, feature = "recording"))]
pub mod recording;

pub use hip::HipRuntime;
pub use props::{DeviceProperties, HipiDeviceProp};
#[cfg(any(test, feature = "recording"))]
pub use recording::{RecordedCall, RecordedLaunch, RecordingRuntime};

/// Failure reported by a driver call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{call} failed ({message}) <{status}>")]
pub struct RuntimeError {
    pub call: &'static str,
    pub status: i32,
    pub message: String,
}

impl RuntimeError {
    pub fn new(call: &'static str, status: i32, message: impl Into<String>) -> Self {
        Self {
            call,
            status,
            message: message.into(),
        }
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionHandle(pub usize);

/// Execution stream; zero is the default stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StreamHandle(pub usize);

impl StreamHandle {
    pub const DEFAULT: Self = Self(0);

    pub fn is_default(&self) -> bool {
        self.0 == 0
    }
}

/// An opened device with its context and sub-architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSession {
    pub ordinal: i32,
    pub device: DeviceHandle,
    pub context: ContextHandle,
    pub name: String,
    /// Sub-architecture tag matched against fat-binary parts.
    pub subarch: u32,
}

/// Driver primitives the shim builds on.
pub trait DeviceRuntime: Send {
    /// Initialise the driver, open device `ordinal`, create a context and
    /// query its sub-architecture.
    fn open_device(&mut self, ordinal: i32) -> RuntimeResult<DeviceSession>;

    /// Load a code object as a module.
    fn load_module(&mut self, image: &[u8]) -> RuntimeResult<ModuleHandle>;

    /// Resolve an exported kernel by name.
    fn module_function(&mut self, module: ModuleHandle, name: &CStr)
        -> RuntimeResult<FunctionHandle>;

    fn launch_kernel(
        &mut self,
        function: FunctionHandle,
        launch: &mut KernelLaunch<'_>,
    ) -> RuntimeResult<()>;

    /// Block until all outstanding device work completes.
    fn synchronize(&mut self) -> RuntimeResult<()>;

    fn device_properties(&mut self, ordinal: i32) -> RuntimeResult<DeviceProperties>;

    fn unload_module(&mut self, module: ModuleHandle) -> RuntimeResult<()>;

    fn close_device(&mut self, session: &DeviceSession) -> RuntimeResult<()>;
}

impl<R: DeviceRuntime + ?Sized> DeviceRuntime for Box<R> {
    fn open_device(&mut self, ordinal: i32) -> RuntimeResult<DeviceSession> {
        (**self).open_device(ordinal)
    }

    fn load_module(&mut self, image: &[u8]) -> RuntimeResult<ModuleHandle> {
        (**self).load_module(image)
    }

    fn module_function(
        &mut self,
        module: ModuleHandle,
        name: &CStr,
    ) -> RuntimeResult<FunctionHandle> {
        (**self).module_function(module, name)
    }

    fn launch_kernel(
        &mut self,
        function: FunctionHandle,
        launch: &mut KernelLaunch<'_>,
    ) -> RuntimeResult<()> {
        (**self).launch_kernel(function, launch)
    }

    fn synchronize(&mut self) -> RuntimeResult<()> {
        (**self).synchronize()
    }

    fn device_properties(&mut self, ordinal: i32) -> RuntimeResult<DeviceProperties> {
        (**self).device_properties(ordinal)
    }

    fn unload_module(&mut self, module: ModuleHandle) -> RuntimeResult<()> {
        (**self).unload_module(module)
    }

    fn close_device(&mut self, session: &DeviceSession) -> RuntimeResult<()> {
        (**self).close_device(session)
    }
}

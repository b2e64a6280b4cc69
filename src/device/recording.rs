// CLASSIFICATION: COMMUNITY
// Filename: recording.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! In-process runtime that records every driver call.
//!
//! Used when no GPU is present. Clones share one journal, so a test can
//! keep a handle after moving the runtime into the shim.

use std::ffi::CStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::trace;

use super::props::DeviceProperties;
use super::{
    ContextHandle, DeviceHandle, DeviceRuntime, DeviceSession, FunctionHandle, ModuleHandle,
    RuntimeError, RuntimeResult, StreamHandle,
};
use crate::dispatch::KernelLaunch;
use crate::staging::Dim3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    OpenDevice(i32),
    LoadModule { len: usize },
    ModuleFunction { module: ModuleHandle, name: String },
    Launch(FunctionHandle),
    Synchronize,
    DeviceProperties(i32),
    UnloadModule(ModuleHandle),
    CloseDevice(i32),
}

/// Snapshot of one launch as the driver would have seen it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLaunch {
    pub function: FunctionHandle,
    pub kernel: String,
    pub grid: Dim3,
    pub block: Dim3,
    pub shared_mem_bytes: u32,
    pub stream: StreamHandle,
    pub args: Vec<u8>,
    /// Size read back through the extra-parameter list.
    pub extra_size: usize,
}

#[derive(Debug, Default)]
struct Journal {
    calls: Vec<RecordedCall>,
    launches: Vec<RecordedLaunch>,
    functions: Vec<String>,
    modules: Vec<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct RecordingRuntime {
    subarch: u32,
    properties: DeviceProperties,
    fail_launch: Option<RuntimeError>,
    fail_load: Option<RuntimeError>,
    journal: Arc<Mutex<Journal>>,
}

impl RecordingRuntime {
    /// Runtime whose device reports `subarch` (zero simulates an unknown device).
    pub fn new(subarch: u32) -> Self {
        let properties = DeviceProperties {
            name: format!("gfx{subarch}"),
            warp_size: 64,
            max_threads_per_block: 1024,
            max_threads_dim: [1024, 1024, 1024],
            max_grid_size: [i32::MAX, i32::MAX, i32::MAX],
            gcn_arch: i32::try_from(subarch).unwrap_or(0),
            ..DeviceProperties::default()
        };
        Self {
            subarch,
            properties,
            fail_launch: None,
            fail_load: None,
            journal: Arc::new(Mutex::new(Journal::default())),
        }
    }

    pub fn with_launch_failure(mut self, error: RuntimeError) -> Self {
        self.fail_launch = Some(error);
        self
    }

    pub fn with_load_failure(mut self, error: RuntimeError) -> Self {
        self.fail_load = Some(error);
        self
    }

    pub fn with_properties(mut self, properties: DeviceProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.journal().calls.clone()
    }

    pub fn launches(&self) -> Vec<RecordedLaunch> {
        self.journal().launches.clone()
    }

    /// Code objects handed to `load_module`, in order.
    pub fn loaded_modules(&self) -> Vec<Vec<u8>> {
        self.journal().modules.clone()
    }

    fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: RecordedCall) {
        trace!("recorded {:?}", call);
        self.journal().calls.push(call);
    }
}

impl DeviceRuntime for RecordingRuntime {
    fn open_device(&mut self, ordinal: i32) -> RuntimeResult<DeviceSession> {
        self.record(RecordedCall::OpenDevice(ordinal));
        Ok(DeviceSession {
            ordinal,
            device: DeviceHandle(ordinal),
            context: ContextHandle(0xc0_usize.wrapping_add(ordinal as usize)),
            name: self.properties.name.clone(),
            subarch: self.subarch,
        })
    }

    fn load_module(&mut self, image: &[u8]) -> RuntimeResult<ModuleHandle> {
        self.record(RecordedCall::LoadModule { len: image.len() });
        if let Some(err) = &self.fail_load {
            return Err(err.clone());
        }
        let mut journal = self.journal();
        journal.modules.push(image.to_vec());
        Ok(ModuleHandle(0x1000 * journal.modules.len()))
    }

    fn module_function(
        &mut self,
        module: ModuleHandle,
        name: &CStr,
    ) -> RuntimeResult<FunctionHandle> {
        let name = name.to_string_lossy().into_owned();
        self.record(RecordedCall::ModuleFunction {
            module,
            name: name.clone(),
        });
        let mut journal = self.journal();
        let index = match journal.functions.iter().position(|known| *known == name) {
            Some(index) => index,
            None => {
                journal.functions.push(name);
                journal.functions.len() - 1
            }
        };
        Ok(FunctionHandle(module.0 + index + 1))
    }

    fn launch_kernel(
        &mut self,
        function: FunctionHandle,
        launch: &mut KernelLaunch<'_>,
    ) -> RuntimeResult<()> {
        self.record(RecordedCall::Launch(function));
        if let Some(err) = &self.fail_launch {
            return Err(err.clone());
        }
        let extra_size = launch.extra_params().buffer_size();
        let mut journal = self.journal();
        let kernel = journal
            .functions
            .iter()
            .enumerate()
            .find(|(index, _)| function.0 % 0x1000 == index + 1)
            .map(|(_, name)| name.clone())
            .unwrap_or_default();
        journal.launches.push(RecordedLaunch {
            function,
            kernel,
            grid: launch.grid,
            block: launch.block,
            shared_mem_bytes: launch.shared_mem_bytes,
            stream: launch.stream,
            args: launch.args.to_vec(),
            extra_size,
        });
        Ok(())
    }

    fn synchronize(&mut self) -> RuntimeResult<()> {
        self.record(RecordedCall::Synchronize);
        Ok(())
    }

    fn device_properties(&mut self, ordinal: i32) -> RuntimeResult<DeviceProperties> {
        self.record(RecordedCall::DeviceProperties(ordinal));
        Ok(self.properties.clone())
    }

    fn unload_module(&mut self, module: ModuleHandle) -> RuntimeResult<()> {
        self.record(RecordedCall::UnloadModule(module));
        Ok(())
    }

    fn close_device(&mut self, session: &DeviceSession) -> RuntimeResult<()> {
        self.record(RecordedCall::CloseDevice(session.ordinal));
        Ok(())
    }
}

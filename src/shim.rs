// CLASSIFICATION: COMMUNITY
// Filename: shim.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Owned runtime state and its register → launch → unregister lifecycle.
//!
//! [`Shim`] is idle until a fat binary is registered. Registration opens the
//! device, selects the code object for its sub-architecture and loads it;
//! the resulting [`RuntimeState`] owns the kernel registry and the launch
//! staging buffer until the binary is unregistered.

use std::fmt;
use std::num::NonZeroUsize;

use log::{debug, info, warn};

use crate::config::ShimConfig;
use crate::device::{DeviceProperties, DeviceRuntime, DeviceSession, ModuleHandle, StreamHandle};
use crate::dispatch;
use crate::error::{ShimError, ShimResult};
use crate::fatbin::FatbinImage;
use crate::registry::{KernelEntry, KernelRegistry, LaunchIdentity};
use crate::staging::{Dim3, LaunchStaging};

/// Opaque token returned by fat-binary registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FatbinHandle(NonZeroUsize);

impl FatbinHandle {
    pub fn as_raw(self) -> usize {
        self.0.get()
    }

    pub fn from_raw(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(Self)
    }
}

impl fmt::Display for FatbinHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Host-variable registration as emitted by the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableInfo {
    pub host_var: usize,
    pub device_address: usize,
    pub device_name: String,
    pub external: bool,
    pub size: usize,
    pub constant: bool,
    pub global: bool,
}

/// State that exists while a fat binary is registered.
#[derive(Debug)]
pub struct RuntimeState {
    handle: FatbinHandle,
    session: DeviceSession,
    module: ModuleHandle,
    code_object_len: usize,
    registry: KernelRegistry,
    staging: LaunchStaging,
}

impl RuntimeState {
    pub fn handle(&self) -> FatbinHandle {
        self.handle
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    pub fn module(&self) -> ModuleHandle {
        self.module
    }

    pub fn code_object_len(&self) -> usize {
        self.code_object_len
    }

    pub fn registry(&self) -> &KernelRegistry {
        &self.registry
    }

    pub fn staging(&self) -> &LaunchStaging {
        &self.staging
    }
}

pub struct Shim<R: DeviceRuntime> {
    runtime: R,
    config: ShimConfig,
    state: Option<RuntimeState>,
    next_handle: usize,
}

impl<R: DeviceRuntime> Shim<R> {
    pub fn new(runtime: R, config: ShimConfig) -> Self {
        Self {
            runtime,
            config,
            state: None,
            next_handle: 1,
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn config(&self) -> &ShimConfig {
        &self.config
    }

    pub fn state(&self) -> Option<&RuntimeState> {
        self.state.as_ref()
    }

    pub fn is_registered(&self) -> bool {
        self.state.is_some()
    }

    /// Open the configured device and load the code object matching it.
    pub fn register_fat_binary(&mut self, image: &FatbinImage<'_>) -> ShimResult<FatbinHandle> {
        if let Some(state) = &self.state {
            return Err(ShimError::AlreadyRegistered(state.handle));
        }
        let session = self.runtime.open_device(self.config.device_ordinal)?;
        let loaded = self.load_code_object(&session, image);
        let (module, code_object_len) = match loaded {
            Ok(loaded) => loaded,
            Err(err) => {
                if let Err(close) = self.runtime.close_device(&session) {
                    warn!("closing device {} after failed registration: {}", session.ordinal, close);
                }
                return Err(err);
            }
        };

        let handle = FatbinHandle::from_raw(self.next_handle).ok_or_else(|| {
            ShimError::InvalidArgument(String::from("fat binary handles exhausted"))
        })?;
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        info!(
            "registered fat binary {} on device {} ({}, subarch {}), code object {} bytes",
            handle, session.ordinal, session.name, session.subarch, code_object_len
        );
        self.state = Some(RuntimeState {
            handle,
            session,
            module,
            code_object_len,
            registry: KernelRegistry::new(self.config.max_kernels),
            staging: LaunchStaging::new(self.config.max_arg_bytes),
        });
        Ok(handle)
    }

    fn load_code_object(
        &mut self,
        session: &DeviceSession,
        image: &FatbinImage<'_>,
    ) -> ShimResult<(ModuleHandle, usize)> {
        if session.subarch == 0 {
            return Err(ShimError::UnknownSubarch {
                ordinal: session.ordinal,
            });
        }
        let code = image
            .find_subarch(session.subarch)?
            .ok_or(ShimError::NoMatchingCodeObject {
                subarch: session.subarch,
            })?;
        match code.elf_summary() {
            Some(elf) => debug!(
                "code object {} at {:#x}: ELF {} machine {} flags {:#x}",
                code.index(),
                code.offset(),
                elf.class,
                elf.machine,
                elf.flags
            ),
            None => debug!(
                "code object {} at {:#x} is not an ELF image",
                code.index(),
                code.offset()
            ),
        }
        let module = self.runtime.load_module(code.bytes())?;
        debug!("module {:?} loaded", module);
        Ok((module, code.len()))
    }

    /// Record one kernel of the registered binary.
    pub fn register_kernel_function(
        &mut self,
        handle: FatbinHandle,
        entry: KernelEntry,
    ) -> ShimResult<usize> {
        self.active(handle)?.registry.register(entry)
    }

    /// Host-variable mirroring is not supported; the call is accepted.
    pub fn register_variable(&mut self, handle: FatbinHandle, var: &VariableInfo) -> ShimResult<()> {
        self.active(handle)?;
        debug!(
            "ignoring variable {} host {:#x} device {:#x} size {}",
            var.device_name, var.host_var, var.device_address, var.size
        );
        Ok(())
    }

    /// Stage geometry for the next launch and drop previously staged arguments.
    pub fn configure_launch(
        &mut self,
        grid: Dim3,
        block: Dim3,
        shared_mem_bytes: usize,
        stream: StreamHandle,
    ) -> ShimResult<()> {
        let shared = u32::try_from(shared_mem_bytes).map_err(|_| {
            ShimError::InvalidArgument(format!(
                "shared memory size {shared_mem_bytes} does not fit the launch descriptor"
            ))
        })?;
        let state = self.current()?;
        debug!(
            "configure GRID{} BLOCK{} shared {} stream {:?}",
            grid, block, shared, stream
        );
        state.staging.configure(grid, block, shared, stream);
        Ok(())
    }

    pub fn setup_argument(&mut self, bytes: &[u8], offset: usize) -> ShimResult<()> {
        let state = self.current()?;
        state.staging.append_argument(bytes, offset)?;
        debug!(
            "argument {} bytes at {} (length {})",
            bytes.len(),
            offset,
            state.staging.len()
        );
        Ok(())
    }

    /// Launch the kernel registered under `identity` and wait for it.
    pub fn launch_by_identity(&mut self, identity: LaunchIdentity) -> ShimResult<()> {
        let state = self.state.as_mut().ok_or(ShimError::NotRegistered)?;
        let (_, kernel) = state
            .registry
            .find(identity)
            .ok_or(ShimError::UnknownKernel(identity))?;
        dispatch::dispatch(
            &mut self.runtime,
            state.module,
            kernel,
            &mut state.staging,
            self.config.honor_stream,
        )
    }

    /// Unload the module, close the device and return to idle.
    pub fn unregister_fat_binary(&mut self, handle: FatbinHandle) -> ShimResult<()> {
        self.active(handle)?;
        let Some(state) = self.state.take() else {
            return Err(ShimError::NotRegistered);
        };
        for kernel in state.registry.iter() {
            debug!("dropping kernel {} ({})", kernel.kernel_name_lossy(), kernel.identity());
        }
        let unloaded = self.runtime.unload_module(state.module);
        let closed = self.runtime.close_device(&state.session);
        info!(
            "unregistered fat binary {} ({} kernels)",
            handle,
            state.registry.len()
        );
        unloaded?;
        closed?;
        Ok(())
    }

    pub fn device_properties(&mut self, ordinal: i32) -> ShimResult<DeviceProperties> {
        Ok(self.runtime.device_properties(ordinal)?)
    }

    fn current(&mut self) -> ShimResult<&mut RuntimeState> {
        self.state.as_mut().ok_or(ShimError::NotRegistered)
    }

    fn active(&mut self, handle: FatbinHandle) -> ShimResult<&mut RuntimeState> {
        let state = self.current()?;
        if state.handle != handle {
            return Err(ShimError::StaleHandle(handle.as_raw()));
        }
        Ok(state)
    }
}

// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v0.1
// Date Modified: 2026-10-19
// Author: Lukas Bower

//! Host-side launch-by-pointer shim for HIP.
//!
//! Compiler-generated host code registers an embedded fat binary and its
//! kernels, then launches kernels through `hipConfigureCall`,
//! `hipSetupArgument` and `hipLaunchByPtr`. This crate resolves those calls
//! onto the HIP module API.

/// C entry points with the symbol names the compiler emits
pub mod abi;

/// Environment-backed configuration
pub mod config;

/// Driver runtime boundary and HIP binding
pub mod device;

/// Launch assembly and submission
pub mod dispatch;

pub mod error;

/// Fat-binary container parsing
pub mod fatbin;

/// Launch-sequence mutual exclusion
pub mod gate;

pub mod logging;

/// Kernel registry keyed by launch identity
pub mod registry;

/// Runtime state lifecycle
pub mod shim;

/// Staged launch geometry and arguments
pub mod staging;

pub use config::{ErrorPolicy, ShimConfig};
pub use device::{DeviceRuntime, HipRuntime};
#[cfg(feature = "recording")]
pub use device::RecordingRuntime;
pub use error::{ErrorKind, ShimError, ShimResult};
pub use fatbin::{FatbinBuilder, FatbinImage};
pub use registry::{KernelEntry, KernelRegistry, LaunchIdentity};
pub use shim::{FatbinHandle, Shim};
pub use staging::{Dim3, LaunchStaging};

// CLASSIFICATION: COMMUNITY
// Filename: error.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Error taxonomy of the shim and its mapping onto HIP status codes.

use thiserror::Error;

use crate::device::RuntimeError;
use crate::fatbin::FatbinError;
use crate::gate::GateError;
use crate::registry::LaunchIdentity;
use crate::shim::FatbinHandle;

/// HIP status codes returned through the C entry points.
pub mod status {
    pub const SUCCESS: i32 = 0;
    pub const INVALID_VALUE: i32 = 1;
    pub const OUT_OF_MEMORY: i32 = 2;
    pub const NOT_INITIALIZED: i32 = 3;
    pub const INVALID_DEVICE_FUNCTION: i32 = 98;
    pub const NO_DEVICE: i32 = 100;
    pub const INVALID_IMAGE: i32 = 200;
    pub const NO_BINARY_FOR_GPU: i32 = 209;
    pub const ALREADY_ACQUIRED: i32 = 210;
    pub const SHARED_OBJECT_SYMBOL_NOT_FOUND: i32 = 302;
    pub const SHARED_OBJECT_INIT_FAILED: i32 = 303;
    pub const INVALID_HANDLE: i32 = 400;
    pub const UNKNOWN: i32 = 999;
}

/// Coarse classification used by callers deciding whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    ExternalRuntime,
    Capacity,
    Lookup,
    /// Call made outside the register/unregister lifecycle.
    Lifecycle,
    InvalidArgument,
}

#[derive(Debug, Error)]
pub enum ShimError {
    #[error(transparent)]
    Format(#[from] FatbinError),
    #[error("no code object for subarch {subarch} in the fat binary")]
    NoMatchingCodeObject { subarch: u32 },
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("device {ordinal} reported no sub-architecture")]
    UnknownSubarch { ordinal: i32 },
    #[error("kernel table full ({capacity} entries)")]
    KernelCapacity { capacity: usize },
    #[error("argument bytes {offset}..{offset}+{size} exceed the {capacity}-byte argument buffer")]
    ArgumentCapacity {
        offset: usize,
        size: usize,
        capacity: usize,
    },
    #[error("no kernel registered for launch identity {0}")]
    UnknownKernel(LaunchIdentity),
    #[error("no fat binary is registered")]
    NotRegistered,
    #[error("fat binary {0} is already registered")]
    AlreadyRegistered(FatbinHandle),
    #[error("handle {0:#x} does not name the registered fat binary")]
    StaleHandle(usize),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error("shim state lock poisoned")]
    LockPoisoned,
}

pub type ShimResult<T> = Result<T, ShimError>;

impl ShimError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Format(_) | Self::NoMatchingCodeObject { .. } => ErrorKind::Format,
            Self::Runtime(_) | Self::UnknownSubarch { .. } => ErrorKind::ExternalRuntime,
            Self::KernelCapacity { .. } | Self::ArgumentCapacity { .. } => ErrorKind::Capacity,
            Self::UnknownKernel(_) => ErrorKind::Lookup,
            Self::NotRegistered
            | Self::AlreadyRegistered(_)
            | Self::StaleHandle(_)
            | Self::Gate(_)
            | Self::LockPoisoned => ErrorKind::Lifecycle,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    /// HIP status code reported to C callers.
    pub fn status(&self) -> i32 {
        match self {
            Self::Format(_) => status::INVALID_IMAGE,
            Self::NoMatchingCodeObject { .. } => status::NO_BINARY_FOR_GPU,
            Self::Runtime(err) => err.status,
            Self::UnknownSubarch { .. } => status::NO_DEVICE,
            Self::KernelCapacity { .. } => status::OUT_OF_MEMORY,
            Self::ArgumentCapacity { .. } | Self::InvalidArgument(_) => status::INVALID_VALUE,
            Self::UnknownKernel(_) => status::INVALID_DEVICE_FUNCTION,
            Self::NotRegistered => status::NOT_INITIALIZED,
            Self::AlreadyRegistered(_) => status::ALREADY_ACQUIRED,
            Self::StaleHandle(_) => status::INVALID_HANDLE,
            Self::Gate(_) | Self::LockPoisoned => status::UNKNOWN,
        }
    }
}

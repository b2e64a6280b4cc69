// CLASSIFICATION: COMMUNITY
// Filename: registry.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Kernel registry keyed by launch-site identity.
//!
//! Entries are appended at module-load time and never mutated. Lookup is a
//! first-match scan; a later entry reusing an identity is unreachable and
//! is recorded as a [`DuplicateIdentity`].

use std::borrow::Cow;
use std::ffi::{CStr, CString};
use std::fmt;

use log::{debug, warn};

use crate::error::{ShimError, ShimResult};

/// Address-like token the compiler passes to both registration and launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaunchIdentity(pub usize);

impl fmt::Display for LaunchIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Addresses of the compiler-supplied index and dimension variables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KernelMetadata {
    pub thread_idx: usize,
    pub block_idx: usize,
    pub block_dim: usize,
    pub grid_dim: usize,
    pub warp_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelEntry {
    identity: LaunchIdentity,
    host_name: String,
    kernel_name: CString,
    thread_limit: u32,
    metadata: KernelMetadata,
}

impl KernelEntry {
    pub fn new(
        identity: LaunchIdentity,
        host_name: impl Into<String>,
        kernel_name: CString,
        thread_limit: u32,
        metadata: KernelMetadata,
    ) -> Self {
        Self {
            identity,
            host_name: host_name.into(),
            kernel_name,
            thread_limit,
            metadata,
        }
    }

    pub fn identity(&self) -> LaunchIdentity {
        self.identity
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Exported symbol resolved in the loaded module.
    pub fn kernel_name(&self) -> &CStr {
        &self.kernel_name
    }

    pub fn kernel_name_lossy(&self) -> Cow<'_, str> {
        self.kernel_name.to_string_lossy()
    }

    pub fn thread_limit(&self) -> u32 {
        self.thread_limit
    }

    pub fn metadata(&self) -> &KernelMetadata {
        &self.metadata
    }
}

/// A registration whose identity was already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateIdentity {
    pub identity: LaunchIdentity,
    /// Index that lookups resolve to.
    pub active: usize,
    /// Index that can never be reached.
    pub shadowed: usize,
}

#[derive(Debug, Clone)]
pub struct KernelRegistry {
    entries: Vec<KernelEntry>,
    capacity: usize,
    duplicates: Vec<DuplicateIdentity>,
}

impl KernelRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
            duplicates: Vec::new(),
        }
    }

    /// Append `entry` and return its index.
    pub fn register(&mut self, entry: KernelEntry) -> ShimResult<usize> {
        if self.entries.len() >= self.capacity {
            return Err(ShimError::KernelCapacity {
                capacity: self.capacity,
            });
        }
        let index = self.entries.len();
        if let Some((active, _)) = self.find(entry.identity) {
            warn!(
                "kernel {} reuses launch identity {} of kernel {}; lookups keep resolving to {}",
                entry.kernel_name_lossy(),
                entry.identity,
                active,
                active
            );
            self.duplicates.push(DuplicateIdentity {
                identity: entry.identity,
                active,
                shadowed: index,
            });
        }
        debug!(
            "register kernel {} host_name {} kernel_name {} thread_limit {}",
            index,
            entry.host_name,
            entry.kernel_name_lossy(),
            entry.thread_limit
        );
        self.entries.push(entry);
        Ok(index)
    }

    /// First entry registered under `identity`.
    pub fn find(&self, identity: LaunchIdentity) -> Option<(usize, &KernelEntry)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.identity == identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &KernelEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn duplicates(&self) -> &[DuplicateIdentity] {
        &self.duplicates
    }
}

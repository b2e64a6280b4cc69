// CLASSIFICATION: COMMUNITY
// Filename: staging.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Launch staging buffer: geometry and packed arguments of the next launch.
//!
//! `configure` overwrites everything and empties the argument buffer.
//! Arguments land at the offset the compiler chose; the logical length is
//! the highest `offset + size` seen since the last `configure`. A launch
//! reads the buffer without resetting it.

use std::fmt;

use crate::device::StreamHandle;
use crate::error::{ShimError, ShimResult};

/// Grid or block extent, laid out like the compiler's `dim3`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dim3 {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Dim3 {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Number of threads or blocks covered.
    pub fn volume(&self) -> u64 {
        u64::from(self.x) * u64::from(self.y) * u64::from(self.z)
    }
}

impl Default for Dim3 {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

impl fmt::Display for Dim3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone)]
pub struct LaunchStaging {
    grid: Dim3,
    block: Dim3,
    shared_mem_bytes: u32,
    stream: StreamHandle,
    args: Vec<u8>,
    capacity: usize,
}

impl LaunchStaging {
    /// Empty staging area holding at most `capacity` argument bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            grid: Dim3::default(),
            block: Dim3::default(),
            shared_mem_bytes: 0,
            stream: StreamHandle::DEFAULT,
            args: Vec::new(),
            capacity,
        }
    }

    pub fn configure(
        &mut self,
        grid: Dim3,
        block: Dim3,
        shared_mem_bytes: u32,
        stream: StreamHandle,
    ) {
        self.grid = grid;
        self.block = block;
        self.shared_mem_bytes = shared_mem_bytes;
        self.stream = stream;
        self.args.clear();
    }

    /// Copy `bytes` to `offset`, growing the logical length to cover them.
    ///
    /// Gaps left by out-of-order offsets read as zero.
    pub fn append_argument(&mut self, bytes: &[u8], offset: usize) -> ShimResult<()> {
        let overflow = || ShimError::ArgumentCapacity {
            offset,
            size: bytes.len(),
            capacity: self.capacity,
        };
        let end = offset.checked_add(bytes.len()).ok_or_else(overflow)?;
        if end > self.capacity {
            return Err(overflow());
        }
        if self.args.len() < end {
            self.args.resize(end, 0);
        }
        self.args[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    pub fn grid(&self) -> Dim3 {
        self.grid
    }

    pub fn block(&self) -> Dim3 {
        self.block
    }

    pub fn shared_mem_bytes(&self) -> u32 {
        self.shared_mem_bytes
    }

    pub fn stream(&self) -> StreamHandle {
        self.stream
    }

    /// Logical argument length.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn args(&self) -> &[u8] {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut [u8] {
        &mut self.args
    }
}

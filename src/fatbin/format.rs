// CLASSIFICATION: COMMUNITY
// Filename: format.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Record layouts of the fat-binary container.
//!
//! Header and part-header fields are little endian. The wrapper is an
//! in-memory record emitted by the compiler, so it is read in native byte
//! order with a pointer-sized `binary` field.

use std::ffi::c_void;
use std::mem::size_of;

use thiserror::Error;

/// Magic tag of the compiler-emitted wrapper record.
pub const WRAPPER_MAGIC: u32 = 0x466243b1;
/// Only wrapper version understood by the walker.
pub const WRAPPER_VERSION: u32 = 1;
/// Magic tag of the fat-binary header.
pub const HEADER_MAGIC: u32 = 0xba55ed50;
/// Only header version understood by the walker.
pub const HEADER_VERSION: u16 = 1;

const PTR_LEN: usize = size_of::<usize>();

/// Size of the wrapper record: magic, version, binary pointer, unused pointer.
pub const WRAPPER_LEN: usize = 8 + 2 * PTR_LEN;
/// Size of the fixed fat-binary header.
pub const HEADER_LEN: usize = 16;
/// Minimum size of a part header.
pub const PART_HEADER_LEN: usize = 32;

/// Part kind tag for textual (PTX-like) parts.
pub const PART_KIND_TEXT: u16 = 1;
/// Part kind tag for ELF code objects.
pub const PART_KIND_ELF: u16 = 2;

/// Errors raised while decoding a fat binary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FatbinError {
    #[error("not a fat binary wrapper (magic {magic:#x}, version {version})")]
    BadWrapper { magic: u32, version: u32 },
    #[error("not a fat binary (magic {magic:#x}, version {version})")]
    BadHeader { magic: u32, version: u16 },
    #[error("fat binary pointer is null")]
    NullBinary,
    #[error("fat binary header size {header_size} is smaller than the 16-byte header")]
    ShortHeader { header_size: u16 },
    #[error("truncated {what} at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        what: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("part header at offset {offset} declares {header_size} header bytes, minimum is 32")]
    ShortPartHeader { offset: usize, header_size: u32 },
    #[error("part at offset {offset} spans bytes {start}..{end} beyond the {limit}-byte image")]
    PartOutOfBounds {
        offset: usize,
        start: u64,
        end: u64,
        limit: usize,
    },
    #[error("fat binary declares {declared} bytes, more than the address space holds")]
    Oversized { declared: u64 },
}

fn field<const N: usize>(
    bytes: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<[u8; N], FatbinError> {
    let truncated = || FatbinError::Truncated {
        what,
        offset,
        needed: N,
        available: bytes.len().saturating_sub(offset),
    };
    let end = offset.checked_add(N).ok_or_else(truncated)?;
    let slice = bytes.get(offset..end).ok_or_else(truncated)?;
    slice.try_into().map_err(|_| truncated())
}

fn le_u16(bytes: &[u8], offset: usize, what: &'static str) -> Result<u16, FatbinError> {
    field::<2>(bytes, offset, what).map(u16::from_le_bytes)
}

fn le_u32(bytes: &[u8], offset: usize, what: &'static str) -> Result<u32, FatbinError> {
    field::<4>(bytes, offset, what).map(u32::from_le_bytes)
}

fn le_u64(bytes: &[u8], offset: usize, what: &'static str) -> Result<u64, FatbinError> {
    field::<8>(bytes, offset, what).map(u64::from_le_bytes)
}

/// Compiler-emitted wrapper pointing at the fat-binary header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatbinWrapper {
    pub magic: u32,
    pub version: u32,
    /// Address of the fat-binary header.
    pub binary: usize,
}

impl FatbinWrapper {
    /// Decode and validate a wrapper record.
    pub fn parse(bytes: &[u8]) -> Result<Self, FatbinError> {
        let magic = field::<4>(bytes, 0, "wrapper").map(u32::from_ne_bytes)?;
        let version = field::<4>(bytes, 4, "wrapper").map(u32::from_ne_bytes)?;
        if magic != WRAPPER_MAGIC || version != WRAPPER_VERSION {
            return Err(FatbinError::BadWrapper { magic, version });
        }
        let binary = field::<PTR_LEN>(bytes, 8, "wrapper").map(usize::from_ne_bytes)?;
        Ok(Self {
            magic,
            version,
            binary,
        })
    }

    /// Decode the wrapper record at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point at [`WRAPPER_LEN`] readable bytes.
    pub unsafe fn from_raw(ptr: *const c_void) -> Result<Self, FatbinError> {
        if ptr.is_null() {
            return Err(FatbinError::NullBinary);
        }
        let bytes = std::slice::from_raw_parts(ptr.cast::<u8>(), WRAPPER_LEN);
        Self::parse(bytes)
    }

    pub fn binary_ptr(&self) -> *const u8 {
        self.binary as *const u8
    }
}

/// Fixed header at the start of a fat binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatbinHeader {
    pub magic: u32,
    pub version: u16,
    /// Offset from the header start to the first part header.
    pub header_size: u16,
    /// Byte length of the part-header region.
    pub fat_size: u64,
}

impl FatbinHeader {
    /// Decode and validate the header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, FatbinError> {
        let magic = le_u32(bytes, 0, "fat binary header")?;
        let version = le_u16(bytes, 4, "fat binary header")?;
        if magic != HEADER_MAGIC || version != HEADER_VERSION {
            return Err(FatbinError::BadHeader { magic, version });
        }
        let header_size = le_u16(bytes, 6, "fat binary header")?;
        if usize::from(header_size) < HEADER_LEN {
            return Err(FatbinError::ShortHeader { header_size });
        }
        let fat_size = le_u64(bytes, 8, "fat binary header")?;
        Ok(Self {
            magic,
            version,
            header_size,
            fat_size,
        })
    }

    /// Total bytes covered by the header and its parts.
    pub fn extent(&self) -> Result<usize, FatbinError> {
        usize::try_from(self.fat_size)
            .ok()
            .and_then(|fat| fat.checked_add(usize::from(self.header_size)))
            .ok_or(FatbinError::Oversized {
                declared: self.fat_size,
            })
    }
}

/// Header describing one architecture-specific code object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartHeader {
    pub kind: u16,
    /// Offset from this header to the code-object bytes.
    pub header_size: u32,
    /// Byte length of the code object.
    pub part_size: u64,
    pub subarch: u32,
}

impl PartHeader {
    /// Decode the part header at `offset` within `bytes`.
    pub fn parse(bytes: &[u8], offset: usize) -> Result<Self, FatbinError> {
        field::<PART_HEADER_LEN>(bytes, offset, "part header")?;
        let kind = le_u16(bytes, offset, "part header")?;
        let header_size = le_u32(bytes, offset + 4, "part header")?;
        let part_size = le_u64(bytes, offset + 8, "part header")?;
        let subarch = le_u32(bytes, offset + 28, "part header")?;
        Ok(Self {
            kind,
            header_size,
            part_size,
            subarch,
        })
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            PART_KIND_TEXT => "text",
            PART_KIND_ELF => "elf",
            _ => "unknown",
        }
    }
}

/// Assembles fat-binary images from code objects.
///
/// Used to package code objects for the inspector and to build fixtures.
#[derive(Debug, Default, Clone)]
pub struct FatbinBuilder {
    parts: Vec<(u16, u32, Vec<u8>)>,
}

impl FatbinBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an ELF code object for `subarch`.
    pub fn part(self, subarch: u32, code: &[u8]) -> Self {
        self.part_with_kind(PART_KIND_ELF, subarch, code)
    }

    pub fn part_with_kind(mut self, kind: u16, subarch: u32, code: &[u8]) -> Self {
        self.parts.push((kind, subarch, code.to_vec()));
        self
    }

    /// Serialize the header followed by every part in insertion order.
    pub fn build(&self) -> Vec<u8> {
        let fat_size: usize = self
            .parts
            .iter()
            .map(|(_, _, code)| PART_HEADER_LEN + code.len())
            .sum();
        let mut out = Vec::with_capacity(HEADER_LEN + fat_size);
        out.extend_from_slice(&HEADER_MAGIC.to_le_bytes());
        out.extend_from_slice(&HEADER_VERSION.to_le_bytes());
        out.extend_from_slice(&(HEADER_LEN as u16).to_le_bytes());
        out.extend_from_slice(&(fat_size as u64).to_le_bytes());
        for (kind, subarch, code) in &self.parts {
            out.extend_from_slice(&kind.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&(PART_HEADER_LEN as u32).to_le_bytes());
            out.extend_from_slice(&(code.len() as u64).to_le_bytes());
            out.extend_from_slice(&0u64.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&subarch.to_le_bytes());
            out.extend_from_slice(code);
        }
        out
    }
}

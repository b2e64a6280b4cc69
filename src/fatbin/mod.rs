// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Embedded fat-binary container support.
//!
//! The compiler embeds one wrapper record per translation unit. The wrapper
//! points at a fat-binary header followed by a contiguous run of part
//! headers, each describing one architecture-specific code object. This
//! module validates that nesting and selects the code object matching the
//! device sub-architecture.

pub mod format;
pub mod walker;

pub use format::{
    FatbinBuilder, FatbinError, FatbinHeader, FatbinWrapper, PartHeader, HEADER_LEN,
    HEADER_MAGIC, HEADER_VERSION, PART_HEADER_LEN, WRAPPER_LEN, WRAPPER_MAGIC, WRAPPER_VERSION,
};
pub use walker::{CodeObject, ElfSummary, FatbinImage, Parts, AMDGPU_MACHINE};

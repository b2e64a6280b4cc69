// CLASSIFICATION: COMMUNITY
// Filename: walker.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Part-header walk over a validated fat-binary image.

use log::debug;
use xmas_elf::header::{HeaderPt2, Machine};
use xmas_elf::ElfFile;

use super::format::{
    FatbinError, FatbinHeader, FatbinWrapper, PartHeader, HEADER_LEN, PART_HEADER_LEN,
};

/// ELF machine number of AMDGPU code objects.
pub const AMDGPU_MACHINE: u16 = 224;

/// A fat binary bounded to the extent its header declares.
#[derive(Debug, Clone, Copy)]
pub struct FatbinImage<'a> {
    header: FatbinHeader,
    bytes: &'a [u8],
}

impl<'a> FatbinImage<'a> {
    /// Validate the header and bound the image to `header_size + fat_size`.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, FatbinError> {
        let header = FatbinHeader::parse(bytes)?;
        let extent = header.extent()?;
        let bytes = bytes.get(..extent).ok_or(FatbinError::Truncated {
            what: "fat binary",
            offset: 0,
            needed: extent,
            available: bytes.len(),
        })?;
        Ok(Self { header, bytes })
    }

    /// Map the fat binary whose header starts at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must point at a fat binary whose declared extent is readable for
    /// the lifetime `'a`.
    pub unsafe fn from_raw(ptr: *const u8) -> Result<Self, FatbinError> {
        if ptr.is_null() {
            return Err(FatbinError::NullBinary);
        }
        let head = std::slice::from_raw_parts(ptr, HEADER_LEN);
        let extent = FatbinHeader::parse(head)?.extent()?;
        Self::parse(std::slice::from_raw_parts(ptr, extent))
    }

    /// Follow a wrapper's binary pointer.
    ///
    /// # Safety
    ///
    /// Same contract as [`FatbinImage::from_raw`] for `wrapper.binary`.
    pub unsafe fn from_wrapper(wrapper: &FatbinWrapper) -> Result<Self, FatbinError> {
        Self::from_raw(wrapper.binary_ptr())
    }

    pub fn header(&self) -> &FatbinHeader {
        &self.header
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn parts(&self) -> Parts<'a> {
        Parts {
            bytes: self.bytes,
            cursor: usize::from(self.header.header_size),
            index: 0,
            failed: false,
        }
    }

    /// Return the first part tagged with `subarch`.
    ///
    /// Parts after the first match are not examined, so a malformed tail
    /// does not hide an earlier match.
    pub fn find_subarch(&self, subarch: u32) -> Result<Option<CodeObject<'a>>, FatbinError> {
        for part in self.parts() {
            let part = part?;
            debug!(
                "fatbin part {} kind {} subarch {} size {}",
                part.index(),
                part.header().kind_name(),
                part.subarch(),
                part.len()
            );
            if part.subarch() == subarch {
                return Ok(Some(part));
            }
        }
        Ok(None)
    }
}

/// Iterator over the parts of a [`FatbinImage`].
///
/// Yields an error once and then stops if a part header is malformed.
#[derive(Debug, Clone)]
pub struct Parts<'a> {
    bytes: &'a [u8],
    cursor: usize,
    index: usize,
    failed: bool,
}

impl<'a> Parts<'a> {
    fn step(&mut self) -> Result<CodeObject<'a>, FatbinError> {
        let offset = self.cursor;
        let header = PartHeader::parse(self.bytes, offset)?;
        if (header.header_size as usize) < PART_HEADER_LEN {
            return Err(FatbinError::ShortPartHeader {
                offset,
                header_size: header.header_size,
            });
        }
        let start = offset as u64 + u64::from(header.header_size);
        let end = start.saturating_add(header.part_size);
        let limit = self.bytes.len();
        if end > limit as u64 {
            return Err(FatbinError::PartOutOfBounds {
                offset,
                start,
                end,
                limit,
            });
        }
        let code = &self.bytes[start as usize..end as usize];
        let object = CodeObject {
            index: self.index,
            header_offset: offset,
            offset: start as usize,
            header,
            bytes: code,
        };
        self.cursor = end as usize;
        self.index += 1;
        Ok(object)
    }
}

impl<'a> Iterator for Parts<'a> {
    type Item = Result<CodeObject<'a>, FatbinError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor >= self.bytes.len() {
            return None;
        }
        let item = self.step();
        self.failed = item.is_err();
        Some(item)
    }
}

/// One architecture-specific code object inside a fat binary.
#[derive(Debug, Clone, Copy)]
pub struct CodeObject<'a> {
    index: usize,
    header_offset: usize,
    offset: usize,
    header: PartHeader,
    bytes: &'a [u8],
}

impl<'a> CodeObject<'a> {
    /// Position of the part in walk order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn header(&self) -> &PartHeader {
        &self.header
    }

    pub fn header_offset(&self) -> usize {
        self.header_offset
    }

    /// Offset of the code-object bytes from the start of the image.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn subarch(&self) -> u32 {
        self.header.subarch
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Summarize the code object if it is an ELF image.
    pub fn elf_summary(&self) -> Option<ElfSummary> {
        let elf = ElfFile::new(self.bytes).ok()?;
        let machine = match elf.header.pt2.machine().as_machine() {
            Machine::Other(number) => number,
            _ => self.raw_machine()?,
        };
        let flags = match &elf.header.pt2 {
            HeaderPt2::Header32(header) => header.flags,
            HeaderPt2::Header64(header) => header.flags,
        };
        Some(ElfSummary {
            class: format!("{:?}", elf.header.pt1.class()),
            machine,
            flags,
        })
    }

    /// `e_machine` read straight from the identification bytes.
    fn raw_machine(&self) -> Option<u16> {
        let field: [u8; 2] = self.bytes.get(18..20)?.try_into().ok()?;
        match self.bytes.get(5) {
            Some(2) => Some(u16::from_be_bytes(field)),
            _ => Some(u16::from_le_bytes(field)),
        }
    }
}

/// ELF identification of a code object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElfSummary {
    pub class: String,
    pub machine: u16,
    /// `e_flags`; carries the target processor for AMDGPU objects.
    pub flags: u32,
}

impl ElfSummary {
    pub fn is_amdgpu(&self) -> bool {
        self.machine == AMDGPU_MACHINE
    }
}

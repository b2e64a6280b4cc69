// CLASSIFICATION: COMMUNITY
// Filename: fatbin_walker.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

use hipbyptr::fatbin::{
    FatbinBuilder, FatbinError, FatbinImage, FatbinWrapper, HEADER_LEN, WRAPPER_MAGIC,
    WRAPPER_VERSION,
};

#[repr(C)]
struct Wrapper {
    magic: u32,
    version: u32,
    binary: *const u8,
    unused: *const u8,
}

fn three_parts() -> Vec<u8> {
    FatbinBuilder::new()
        .part(803, b"gfx803 object")
        .part(906, b"gfx906 object")
        .part(1030, b"gfx1030 object")
        .build()
}

#[test]
fn walk_through_wrapper_pointer() {
    let bytes = three_parts();
    let wrapper = Wrapper {
        magic: WRAPPER_MAGIC,
        version: WRAPPER_VERSION,
        binary: bytes.as_ptr(),
        unused: std::ptr::null(),
    };
    let decoded = unsafe { FatbinWrapper::from_raw((&wrapper as *const Wrapper).cast()) }.unwrap();
    assert_eq!(decoded.binary_ptr(), bytes.as_ptr());
    let image = unsafe { FatbinImage::from_wrapper(&decoded) }.unwrap();
    assert_eq!(image.as_bytes().len(), bytes.len());
    let found = image.find_subarch(906).unwrap().unwrap();
    assert_eq!(found.bytes(), b"gfx906 object");
    assert_eq!(found.index(), 1);
}

#[test]
fn selection_is_idempotent() {
    let bytes = three_parts();
    let image = FatbinImage::parse(&bytes).unwrap();
    let first = image.find_subarch(1030).unwrap().unwrap();
    let second = image.find_subarch(1030).unwrap().unwrap();
    assert_eq!(first.offset(), second.offset());
    assert_eq!(first.bytes(), second.bytes());
}

#[test]
fn absent_subarch_is_not_found() {
    let bytes = three_parts();
    let image = FatbinImage::parse(&bytes).unwrap();
    assert!(image.find_subarch(900).unwrap().is_none());
    assert_eq!(image.parts().count(), 3);
}

#[test]
fn wrong_wrapper_magic_is_rejected() {
    let bytes = three_parts();
    let wrapper = Wrapper {
        magic: 0xdeadbeef,
        version: WRAPPER_VERSION,
        binary: bytes.as_ptr(),
        unused: std::ptr::null(),
    };
    let err = unsafe { FatbinWrapper::from_raw((&wrapper as *const Wrapper).cast()) }.unwrap_err();
    assert_eq!(
        err,
        FatbinError::BadWrapper {
            magic: 0xdeadbeef,
            version: WRAPPER_VERSION
        }
    );
}

#[test]
fn wrong_header_version_is_rejected() {
    let mut bytes = three_parts();
    bytes[4..6].copy_from_slice(&2u16.to_le_bytes());
    assert!(matches!(
        FatbinImage::parse(&bytes),
        Err(FatbinError::BadHeader { version: 2, .. })
    ));
}

#[test]
fn zero_length_part_header_fails_instead_of_looping() {
    let mut bytes = three_parts();
    // header_size of the first part
    bytes[HEADER_LEN + 4..HEADER_LEN + 8].copy_from_slice(&0u32.to_le_bytes());
    let image = FatbinImage::parse(&bytes).unwrap();
    let err = image.find_subarch(906).unwrap_err();
    assert_eq!(
        err,
        FatbinError::ShortPartHeader {
            offset: HEADER_LEN,
            header_size: 0
        }
    );
    let walked: Vec<_> = image.parts().collect();
    assert_eq!(walked.len(), 1);
}

#[test]
fn part_past_declared_extent_is_rejected() {
    let mut bytes = three_parts();
    // part_size of the first part
    bytes[HEADER_LEN + 8..HEADER_LEN + 16].copy_from_slice(&u64::MAX.to_le_bytes());
    let image = FatbinImage::parse(&bytes).unwrap();
    assert!(matches!(
        image.find_subarch(906),
        Err(FatbinError::PartOutOfBounds { .. })
    ));
}

#[test]
fn truncated_blob_is_rejected() {
    let bytes = three_parts();
    let short = &bytes[..bytes.len() - 1];
    assert!(matches!(
        FatbinImage::parse(short),
        Err(FatbinError::Truncated { what: "fat binary", .. })
    ));
}

#[test]
fn match_before_malformed_tail_is_returned() {
    let mut bytes = three_parts();
    let second_header = HEADER_LEN + 32 + b"gfx803 object".len();
    bytes[second_header + 4..second_header + 8].copy_from_slice(&4u32.to_le_bytes());
    let image = FatbinImage::parse(&bytes).unwrap();
    let found = image.find_subarch(803).unwrap().unwrap();
    assert_eq!(found.bytes(), b"gfx803 object");
    assert!(image.find_subarch(1030).is_err());
}

// CLASSIFICATION: COMMUNITY
// Filename: fatbin_properties.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

use hipbyptr::fatbin::{
    FatbinBuilder, FatbinError, FatbinImage, FatbinWrapper, HEADER_MAGIC, HEADER_VERSION,
};
use proptest::prelude::*;
use proptest::sample::Index;

fn parts_strategy() -> impl Strategy<Value = Vec<(u32, Vec<u8>)>> {
    prop::collection::vec(
        (900u32..904, prop::collection::vec(any::<u8>(), 0..48)),
        0..8,
    )
}

fn build(parts: &[(u32, Vec<u8>)]) -> Vec<u8> {
    parts
        .iter()
        .fold(FatbinBuilder::new(), |builder, (subarch, code)| {
            builder.part(*subarch, code)
        })
        .build()
}

/// Walk everything reachable from `bytes`; only the absence of a panic matters.
fn walk_all(bytes: &[u8], subarch: u32) {
    let _ = FatbinWrapper::parse(bytes);
    let Ok(image) = FatbinImage::parse(bytes) else {
        return;
    };
    let mut yielded = 0usize;
    for part in image.parts() {
        yielded += 1;
        assert!(yielded <= bytes.len() + 1, "part walk did not terminate");
        if let Ok(part) = part {
            assert!(part.offset() + part.len() <= bytes.len());
            let _ = part.elf_summary();
        }
    }
    let _ = image.find_subarch(subarch);
}

proptest! {
    #[test]
    fn find_subarch_returns_first_matching_part(
        parts in parts_strategy(),
        target in 900u32..905,
    ) {
        let bytes = build(&parts);
        let image = FatbinImage::parse(&bytes).unwrap();
        prop_assert_eq!(image.parts().count(), parts.len());

        let expected = parts.iter().position(|(subarch, _)| *subarch == target);
        let first = image.find_subarch(target).unwrap();
        let second = image.find_subarch(target).unwrap();
        match expected {
            Some(index) => {
                let first = first.unwrap();
                let second = second.unwrap();
                prop_assert_eq!(first.index(), index);
                prop_assert_eq!(first.bytes(), parts[index].1.as_slice());
                prop_assert_eq!(second.index(), first.index());
                prop_assert_eq!(second.offset(), first.offset());
                prop_assert_eq!(second.bytes(), first.bytes());
            }
            None => {
                prop_assert!(first.is_none());
                prop_assert!(second.is_none());
            }
        }
    }

    #[test]
    fn wrong_header_magic_is_rejected(parts in parts_strategy(), magic in any::<u32>()) {
        prop_assume!(magic != HEADER_MAGIC);
        let mut bytes = build(&parts);
        bytes[..4].copy_from_slice(&magic.to_le_bytes());
        let rejected = matches!(
            FatbinImage::parse(&bytes),
            Err(FatbinError::BadHeader { .. })
        );
        prop_assert!(rejected);
    }

    #[test]
    fn wrong_header_version_is_rejected(parts in parts_strategy(), version in any::<u16>()) {
        prop_assume!(version != HEADER_VERSION);
        let mut bytes = build(&parts);
        bytes[4..6].copy_from_slice(&version.to_le_bytes());
        let rejected = matches!(
            FatbinImage::parse(&bytes),
            Err(FatbinError::BadHeader { .. })
        );
        prop_assert!(rejected);
    }

    #[test]
    fn mutated_images_never_panic(
        parts in parts_strategy(),
        edits in prop::collection::vec((any::<Index>(), any::<u8>()), 1..24),
        target in 900u32..905,
    ) {
        let mut bytes = build(&parts);
        for (at, value) in edits {
            let at = at.index(bytes.len());
            bytes[at] = value;
        }
        walk_all(&bytes, target);
    }

    #[test]
    fn truncated_images_never_panic(
        parts in parts_strategy(),
        cut in any::<Index>(),
        target in 900u32..905,
    ) {
        let bytes = build(&parts);
        let len = cut.index(bytes.len() + 1);
        walk_all(&bytes[..len], target);
    }

    #[test]
    fn arbitrary_bytes_never_panic(
        bytes in prop::collection::vec(any::<u8>(), 0..256),
        target in any::<u32>(),
    ) {
        walk_all(&bytes, target);
    }
}

// CLASSIFICATION: COMMUNITY
// Filename: fatbin_inspect_cli.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

use hipbyptr::fatbin::FatbinBuilder;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn inspect() -> Command {
    Command::new(env!("CARGO_BIN_EXE_fatbin-inspect"))
}

#[test]
fn lists_parts_and_extracts_match() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("kernels.fatbin");
    let output = dir.path().join("gfx906.co");
    let bytes = FatbinBuilder::new()
        .part(803, b"\x01\x02\x03")
        .part(906, b"\xde\xad\xbe\xef")
        .build();
    fs::write(&input, bytes).unwrap();

    let run = inspect()
        .arg(&input)
        .args(["--subarch", "906", "--extract"])
        .arg(&output)
        .output()
        .unwrap();
    assert!(run.status.success());
    let stdout = String::from_utf8_lossy(&run.stdout);
    assert!(stdout.contains("part 0 kind elf subarch 803"));
    assert!(stdout.contains("part 1 kind elf subarch 906"));
    assert!(stdout.contains("[deadbeef]"));
    assert_eq!(fs::read(&output).unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
}

#[test]
fn missing_subarch_exits_with_two() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("kernels.fatbin");
    fs::write(&input, FatbinBuilder::new().part(803, b"x").build()).unwrap();
    let run = inspect()
        .arg(&input)
        .args(["--subarch", "1030"])
        .output()
        .unwrap();
    assert_eq!(run.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&run.stderr).contains("not found"));
}

#[test]
fn malformed_input_fails() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("junk.bin");
    fs::write(&input, b"definitely not a fat binary").unwrap();
    let run = inspect().arg(&input).output().unwrap();
    assert!(!run.status.success());
    assert_ne!(run.status.code(), Some(2));
}

// CLASSIFICATION: COMMUNITY
// Filename: fatbin_inspect.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

use anyhow::Context;
use clap::Parser;
use hipbyptr::fatbin::{CodeObject, FatbinImage};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

/// Leading code-object bytes shown per part.
const PREVIEW_LEN: usize = 8;

#[derive(Parser)]
#[command(name = "fatbin-inspect", about = "List and extract code objects of a fat binary")]
struct Cli {
    /// Raw fat binary image (header followed by parts)
    file: PathBuf,
    /// Select the first part for this sub-architecture
    #[arg(long)]
    subarch: Option<u32>,
    /// Write the selected code object here
    #[arg(long, requires = "subarch")]
    extract: Option<PathBuf>,
}

fn describe(part: &CodeObject<'_>) -> String {
    let elf = match part.elf_summary() {
        Some(elf) => format!("elf {} machine {} flags {:#x}", elf.class, elf.machine, elf.flags),
        None => String::from("raw"),
    };
    let preview = &part.bytes()[..part.len().min(PREVIEW_LEN)];
    format!(
        "part {} kind {} subarch {} offset {:#x} size {} {} [{}]",
        part.index(),
        part.header().kind_name(),
        part.subarch(),
        part.offset(),
        part.len(),
        elf,
        hex::encode(preview)
    )
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let bytes = fs::read(&cli.file).with_context(|| format!("reading {}", cli.file.display()))?;
    let image = FatbinImage::parse(&bytes).context("parsing fat binary")?;
    println!(
        "fat binary version {} header {} bytes, {} bytes of parts",
        image.header().version,
        image.header().header_size,
        image.header().fat_size
    );
    for part in image.parts() {
        println!("{}", describe(&part?));
    }

    let Some(subarch) = cli.subarch else {
        return Ok(ExitCode::SUCCESS);
    };
    let Some(found) = image.find_subarch(subarch)? else {
        eprintln!("subarch {subarch} not found");
        return Ok(ExitCode::from(2));
    };
    println!("selected part {} for subarch {}", found.index(), subarch);
    if let Some(out) = cli.extract {
        fs::write(&out, found.bytes()).with_context(|| format!("writing {}", out.display()))?;
        println!("wrote {} bytes to {}", found.len(), out.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> anyhow::Result<ExitCode> {
    hipbyptr::logging::init(hipbyptr::config::debug_enabled(
        std::env::var("HIP_DEBUG").ok().as_deref(),
    ));
    run(Cli::parse())
}

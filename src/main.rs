//! Unfreeze CLI - Command-line tool for unpacking PyInstaller executables.
//!
//! Extracts every packed file, rebuilds compiled modules into loadable
//! `.pyc` files, optionally decompiles them, and writes the result to a zip.

mod decompile;
mod package;

use std::fs::File;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use memmap2::Mmap;
use tracing_subscriber::EnvFilter;

use unfreeze::prelude::*;

use crate::decompile::Decompiler;

/// Unfreeze - recover Python modules from PyInstaller executables
#[derive(Parser)]
#[command(name = "unfreeze")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// PyInstaller executable to unpack
    #[arg(short, long, env = "UNFREEZE_FILE")]
    file: PathBuf,

    /// Output zip file
    #[arg(short, long, env = "UNFREEZE_OUTPUT", default_value = "extracted.zip")]
    output: PathBuf,

    /// Decompiler executable, invoked as `<decompiler> <file.pyc>`
    #[arg(long, env = "UNFREEZE_DECOMPILER", default_value = "pycdc")]
    decompiler: String,

    /// Package the extracted files without decompiling
    #[arg(long)]
    no_decompile: bool,

    /// Package only the decompiled sources
    #[arg(long, conflicts_with = "no_decompile")]
    sources_only: bool,

    /// Print the table of contents and exit
    #[arg(short, long)]
    list: bool,

    /// Serve extraction over HTTP (not implemented)
    #[arg(long)]
    api: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.api {
        bail!("API mode is not implemented");
    }

    let file = File::open(&cli.file)
        .with_context(|| format!("Failed to open {}", cli.file.display()))?;
    let data = unsafe { Mmap::map(&file) }.context("Failed to map input file")?;

    let archive = CArchive::parse(&data).context("Failed to read PyInstaller archive")?;

    if cli.list {
        cmd_list(&archive);
        return Ok(());
    }

    cmd_extract(&cli, &archive)
}

fn cmd_list(archive: &CArchive<'_>) {
    let header = archive.header();
    println!("PyInstaller version: {}", header.format);
    println!("Python version: {}", header.runtime);
    if let Some(library) = &header.python_library {
        println!("Python library: {library}");
    }
    println!();

    for entry in archive.entries() {
        println!(
            "{:>12} {:>12} {} {} {}",
            entry.data_size,
            entry.uncompressed_size,
            if entry.is_compressed() { "Z" } else { " " },
            char::from(entry.kind.code()),
            entry.name
        );
    }

    println!("\nTotal: {} entries", archive.entries().len());
}

fn cmd_extract(cli: &Cli, archive: &CArchive<'_>) -> Result<()> {
    let start = Instant::now();
    let extraction = archive.extract();
    println!(
        "Extracted {} files in {:?} ({} warnings)",
        extraction.len(),
        start.elapsed(),
        extraction.diagnostics().len()
    );
    if let Some(magic) = extraction.magic() {
        println!("pyc magic: {magic}");
    }

    let sources = if cli.no_decompile {
        Default::default()
    } else {
        match Decompiler::locate(&cli.decompiler) {
            Ok(decompiler) => decompiler.decompile_all(extraction.files())?,
            Err(e) if !cli.sources_only => {
                tracing::warn!("{e:#}, packaging without sources");
                Default::default()
            }
            Err(e) => return Err(e),
        }
    };

    let written = if cli.sources_only {
        package::write_zip(&cli.output, package::entries(&sources))?
    } else {
        let files = package::entries(extraction.files());
        let sources = package::unclaimed(extraction.files(), &sources);
        package::write_zip(&cli.output, files.chain(sources))?
    };

    println!("Wrote {} files to {}", written, cli.output.display());

    Ok(())
}

//! Main entry point for the docpack CLI application.
//!
//! This binary provides a command-line interface for packing a document
//! manifest and its referenced files into an archive, and for unpacking,
//! listing and recompressing such archives.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

use docpack::logging::init_logging;
use docpack::{Cli, Command, DOCUMENT_MANIFEST, DocumentArchiver};

/// Application entry point.
///
/// Parses command-line arguments, installs logging and dispatches to the
/// handler for the chosen subcommand.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    match &cli.command {
        Command::Extract {
            archive,
            extract_dir,
        } => {
            fs::create_dir_all(extract_dir).with_context(|| {
                format!("cannot create output directory {}", extract_dir.display())
            })?;
            DocumentArchiver::new()
                .extract(archive, extract_dir)
                .with_context(|| format!("failed to extract {}", archive.display()))?;
        }
        Command::Create {
            manifest,
            output,
            level,
        } => {
            DocumentArchiver::with_compression_level(*level)
                .create(&manifest_path(manifest), output)
                .with_context(|| format!("failed to create {}", output.display()))?;
        }
        Command::List { archive, verbose } => list_files(archive, *verbose)?,
        Command::Files { manifest } => {
            let files = docpack::document_files(&manifest_path(manifest))
                .with_context(|| format!("failed to scan {}", manifest.display()))?;
            for file in files {
                let marker = if file.is_file() { ' ' } else { '!' };
                println!("{} {}", marker, file.display());
            }
        }
        Command::Rewrite { source, target } => {
            let count = docpack::rewrite_archive(source, target)
                .with_context(|| format!("failed to rewrite {}", source.display()))?;
            if !cli.is_quiet() {
                eprintln!("{} entries written to {}", count, target.display());
            }
        }
    }

    Ok(())
}

/// Accept either a manifest or the directory holding `Document.xml`.
fn manifest_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(DOCUMENT_MANIFEST)
    } else {
        path.to_path_buf()
    }
}

/// List files in a document archive.
///
/// Supports two output formats:
/// - Simple format: Just file names, one per line
/// - Verbose format (`-v`): Detailed table with size, compression ratio, and timestamps
fn list_files(archive: &Path, verbose: bool) -> Result<()> {
    let entries = docpack::list_document(archive)
        .with_context(|| format!("failed to list {}", archive.display()))?;

    if !verbose {
        for entry in &entries {
            println!("{}", entry.file_name);
        }
        return Ok(());
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    // Track totals for summary line
    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in &entries {
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        );

        // Directories do not count towards the totals
        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:>21}  {} files",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        file_count
    );

    Ok(())
}

/// Space saved by compression, as a right-aligned percentage.
///
/// Tiny payloads can grow under DEFLATE; those report 0%.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    let saved = if uncompressed == 0 || compressed >= uncompressed {
        0
    } else {
        100 - (compressed * 100 / uncompressed)
    };
    format!("{:>4}%", saved)
}

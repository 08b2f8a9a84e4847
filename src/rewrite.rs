//! Archive-to-archive recompression.

use flate2::Compression;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::zip::{ZipExtractor, ZipWriter};

/// Copy every entry of `source` into a fresh archive at `target`.
///
/// Payloads are decoded and DEFLATE-compressed again; names, order and
/// timestamps are kept, directory entries stay empty. Returns the number of
/// entries copied.
pub fn rewrite_archive(source: &Path, target: &Path) -> Result<usize> {
    let extractor = ZipExtractor::open(source)?;

    // Truncating the target would destroy the source mid-read
    if let (Ok(a), Ok(b)) = (fs::canonicalize(source), fs::canonicalize(target))
        && a == b
    {
        return Err(Error::io(
            target,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "source and target are the same file",
            ),
        ));
    }

    let entries = extractor.list_files().map_err(|e| e.in_archive(source))?;
    let mut writer = ZipWriter::create(target, Compression::default())?;

    for entry in &entries {
        let timestamp = (entry.last_mod_time, entry.last_mod_date);
        if entry.is_directory {
            writer.add_directory(&entry.file_name, timestamp)?;
            continue;
        }

        let data = extractor
            .extract_to_memory(entry)
            .map_err(|e| e.in_archive(source))?;
        debug!(entry = %entry.file_name, size = data.len(), "rewriting");
        writer.write_deflated(&entry.file_name, &data, timestamp)?;
    }
    writer.finish()?;

    info!(
        source = %source.display(),
        target = %target.display(),
        entries = entries.len(),
        "rewrote archive"
    );
    Ok(entries.len())
}

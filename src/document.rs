//! Document archive assembly.
//!
//! A document archive holds the primary manifest (`Document.xml`), the
//! optional GUI manifest (`GuiDocument.xml`) and every file either of them
//! references, each stored under its path relative to the manifest
//! directory.
//!
//! Creation is lenient: referenced files that no longer exist are skipped.
//! Extraction and scanning are strict: malformed XML or a damaged archive
//! aborts the operation.

use chrono::{DateTime, Local};
use flate2::Compression;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::manifest::scan_references;
use crate::zip::{ZipExtractor, ZipFileEntry, ZipWriter, dos_timestamp};

/// File name of the primary manifest.
pub const DOCUMENT_MANIFEST: &str = "Document.xml";

/// File name of the secondary (GUI) manifest, looked up next to the primary.
pub const GUI_MANIFEST: &str = "GuiDocument.xml";

/// Builds and unpacks document archives.
///
/// The only knob is the DEFLATE level used when creating archives.
#[derive(Debug, Clone, Copy)]
pub struct DocumentArchiver {
    level: Compression,
}

impl Default for DocumentArchiver {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl DocumentArchiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use DEFLATE `level` (0 = fastest, 9 = smallest) for new archives.
    pub fn with_compression_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    pub fn compression_level(&self) -> u32 {
        self.level.level()
    }

    /// Pack the document described by `manifest` into `archive_out`.
    ///
    /// Both manifests are scanned before the output is touched, so a
    /// malformed manifest never leaves a partial archive behind.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if `manifest` does not exist
    /// - [`Error::Parse`] if either manifest is malformed
    /// - [`Error::Io`] if the archive cannot be written or a member cannot be read,
    ///   or if `archive_out` is itself one of the document's files
    pub fn create(&self, manifest: &Path, archive_out: &Path) -> Result<()> {
        let files = document_files(manifest)?;
        let base_dir = manifest.parent().unwrap_or(Path::new(""));

        // Truncating the output must not destroy a member before it is read
        if let Ok(target) = fs::canonicalize(archive_out)
            && files
                .iter()
                .any(|path| fs::canonicalize(path).is_ok_and(|path| path == target))
        {
            return Err(Error::io(
                archive_out,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "output archive is one of the document files",
                ),
            ));
        }

        let mut writer = ZipWriter::create(archive_out, self.level)?;
        let mut written = HashSet::new();

        for path in &files {
            let metadata = match fs::metadata(path) {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => {
                    warn!(path = %path.display(), "skipping referenced path, not a regular file");
                    continue;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping missing referenced file");
                    continue;
                }
            };

            let Some(name) = entry_name(base_dir, path) else {
                warn!(
                    path = %path.display(),
                    "skipping referenced file outside the manifest directory"
                );
                continue;
            };
            if !written.insert(name.clone()) {
                debug!(entry = %name, "already added");
                continue;
            }

            let data = fs::read(path).map_err(|e| Error::io(path, e))?;
            let modified: DateTime<Local> = metadata
                .modified()
                .map(DateTime::from)
                .unwrap_or_else(|_| Local::now());

            debug!(entry = %name, "adding");
            writer.write_deflated(&name, &data, dos_timestamp(&modified.naive_local()))?;
        }

        let entries = writer.len();
        writer.finish()?;

        info!(
            archive = %archive_out.display(),
            entries,
            skipped = files.len() - entries,
            "created document archive"
        );
        Ok(())
    }

    /// Unpack every entry of `archive` under `output_dir`.
    ///
    /// Entries are processed in central directory order. Intermediate
    /// directories are created one segment at a time and may already exist;
    /// `output_dir` itself must exist. There is no rollback: on error the
    /// entries written so far stay on disk.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if `archive` does not exist
    /// - [`Error::CorruptArchive`] if the archive or an entry cannot be decoded
    /// - [`Error::UnsafeEntryPath`] if an entry name would leave `output_dir`
    /// - [`Error::Io`] if a directory or file cannot be created
    pub fn extract(&self, archive: &Path, output_dir: &Path) -> Result<()> {
        let extractor = ZipExtractor::open(archive)?;
        let entries = extractor
            .list_files()
            .map_err(|e| e.in_archive(archive))?;

        for entry in &entries {
            let segments = entry_segments(&entry.file_name)?;
            let Some((last, parents)) = segments.split_last() else {
                debug!(entry = %entry.file_name, "skipping entry without a path");
                continue;
            };

            let data = if entry.is_directory {
                None
            } else {
                Some(
                    extractor
                        .extract_to_memory(entry)
                        .map_err(|e| e.in_archive(archive))?,
                )
            };

            let mut target = output_dir.to_path_buf();
            for dir in parents {
                target.push(dir);
                create_dir_if_missing(&target)?;
            }
            target.push(last);

            match data {
                None => create_dir_if_missing(&target)?,
                Some(data) => {
                    debug!(entry = %entry.file_name, "extracting");
                    fs::write(&target, data).map_err(|e| Error::io(&target, e))?;
                }
            }
        }

        info!(
            archive = %archive.display(),
            output = %output_dir.display(),
            entries = entries.len(),
            "extracted document archive"
        );
        Ok(())
    }
}

/// Pack `manifest` and the files it references into `archive_out`
/// with the default compression level.
pub fn create_document(manifest: &Path, archive_out: &Path) -> Result<()> {
    DocumentArchiver::default().create(manifest, archive_out)
}

/// Unpack `archive` under `output_dir`.
pub fn extract_document(archive: &Path, output_dir: &Path) -> Result<()> {
    DocumentArchiver::default().extract(archive, output_dir)
}

/// The files that make up the document whose primary manifest is `manifest`:
/// the manifest, its references, then the GUI manifest and its references
/// when `GuiDocument.xml` sits next to it.
///
/// Paths are returned whether or not they exist; only the manifests
/// themselves are opened.
pub fn document_files(manifest: &Path) -> Result<Vec<PathBuf>> {
    let mut files = vec![manifest.to_path_buf()];
    files.extend(scan_references(manifest)?);

    let gui = gui_manifest_path(manifest);
    if gui.is_file() && manifest.file_name() != gui.file_name() {
        let references = scan_references(&gui)?;
        files.push(gui);
        files.extend(references);
    }

    Ok(files)
}

/// Entries of `archive` in central directory order.
pub fn list_document(archive: &Path) -> Result<Vec<ZipFileEntry>> {
    ZipExtractor::open(archive)?
        .list_files()
        .map_err(|e| e.in_archive(archive))
}

fn gui_manifest_path(manifest: &Path) -> PathBuf {
    manifest.with_file_name(GUI_MANIFEST)
}

/// Archive name for `path`: its "/"-joined location relative to `base_dir`.
///
/// Both paths are made absolute and `.`/`..` are folded lexically first, so
/// `../doc/a.bin` seen from `doc` still names `a.bin`. `None` when the path
/// does not lie below `base_dir`.
fn entry_name(base_dir: &Path, path: &Path) -> Option<String> {
    let base_dir = normalize(base_dir)?;
    let path = normalize(path)?;
    let relative = path.strip_prefix(&base_dir).ok()?;

    let segments: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Absolute form of `path` with `.` and `..` folded away, without touching
/// the filesystem.
fn normalize(path: &Path) -> Option<PathBuf> {
    let path = if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    };

    let mut normal = PathBuf::new();
    for component in std::path::absolute(path).ok()?.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normal.pop();
            }
            component => normal.push(component),
        }
    }
    Some(normal)
}

/// Split an entry name into the path segments to create below the output
/// directory. Empty and `.` segments are dropped.
fn entry_segments(name: &str) -> Result<Vec<&str>> {
    let unsafe_path = || Error::UnsafeEntryPath(name.to_string());

    if name.starts_with('/') || name.contains('\0') || name.contains('\\') {
        return Err(unsafe_path());
    }

    let mut segments = Vec::new();
    for segment in name.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(unsafe_path()),
            // drive letters and other prefixes
            s if s.contains(':') && cfg!(windows) => return Err(unsafe_path()),
            s => segments.push(s),
        }
    }
    Ok(segments)
}

fn create_dir_if_missing(path: &Path) -> Result<()> {
    match fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

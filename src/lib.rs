//! # docpack
//!
//! Pack and unpack manifest-driven document archives.
//!
//! A document is a directory holding a primary XML manifest
//! (`Document.xml`), an optional GUI manifest (`GuiDocument.xml`) and the
//! auxiliary files those manifests reference through `file="..."`
//! attributes. This library bundles such a document into a single ZIP
//! archive and restores it again.
//!
//! ## Features
//!
//! - Discover a document's files by scanning its manifests
//! - Create DEFLATE-compressed archives, keeping paths relative to the manifest
//! - Extract archives, recreating nested directories
//! - Read ZIP64 archives; STORED and DEFLATE entries with CRC-32 checks
//! - Recompress an existing archive entry by entry
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Pack a document and everything its manifests reference
//!     docpack::create_document(Path::new("work/Document.xml"), Path::new("Part.FCStd"))?;
//!
//!     // List and restore it somewhere else
//!     for entry in docpack::list_document(Path::new("Part.FCStd"))? {
//!         println!("{}", entry.file_name);
//!     }
//!     std::fs::create_dir_all("restored")?;
//!     docpack::extract_document(Path::new("Part.FCStd"), Path::new("restored"))?;
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod document;
pub mod error;
pub mod io;
pub mod logging;
pub mod manifest;
pub mod rewrite;
pub mod zip;

pub use cli::{Cli, Command};
pub use document::{
    DOCUMENT_MANIFEST, DocumentArchiver, GUI_MANIFEST, create_document, document_files,
    extract_document, list_document,
};
pub use error::{Error, Result};
pub use io::{LocalFileReader, ReadAt};
pub use manifest::{scan_references, scan_references_from_reader};
pub use rewrite::rewrite_archive;
pub use zip::{ZipExtractor, ZipFileEntry, ZipWriter};

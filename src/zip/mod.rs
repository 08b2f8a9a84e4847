//! ZIP archive reading and writing.
//!
//! This module provides the container codec for document archives,
//! reading both the standard ZIP format and ZIP64 extensions, and writing
//! standard (32-bit) archives.
//!
//! ## Architecture
//!
//! The module is organized into four components:
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`extractor`]: Entry listing and payload decoding
//! - [`writer`]: Sequential archive writer with STORED and DEFLATE entries
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Reading starts from the EOCD at the end of the file, then the Central
//! Directory, so listing an archive never touches entry payloads.
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods
//! - The writer does not emit ZIP64 records

mod extractor;
mod parser;
mod structures;
mod writer;

pub use extractor::ZipExtractor;
pub use parser::ZipParser;
pub use structures::*;
pub use writer::ZipWriter;

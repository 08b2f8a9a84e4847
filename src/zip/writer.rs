//! ZIP archive writer.
//!
//! Entries are compressed in memory before anything is written, so every
//! Local File Header already carries the final CRC and sizes and no data
//! descriptors are needed. The writer only needs [`Write`]; offsets are
//! counted as bytes go out.

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::structures::{CompressionMethod, EndOfCentralDirectory, LFH_SIZE, ZipFileEntry};

/// Largest value a non-ZIP64 size or offset field can hold.
const MAX_U32_FIELD: u64 = 0xFFFF_FFFE;

/// Entry counts of 0xFFFF announce ZIP64 records.
const MAX_ENTRIES: usize = 0xFFFE;

/// Sequential ZIP archive writer
pub struct ZipWriter<W: Write> {
    out: W,
    /// Where `out` goes, for error messages
    target: PathBuf,
    offset: u64,
    entries: Vec<ZipFileEntry>,
    level: Compression,
}

impl ZipWriter<BufWriter<File>> {
    /// Create (or truncate) an archive file at `path`.
    pub fn create(path: &Path, level: Compression) -> Result<Self> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        Ok(Self::with_target(BufWriter::new(file), path, level))
    }
}

impl<W: Write> ZipWriter<W> {
    pub fn new(out: W) -> Self {
        Self::with_target(out, Path::new("<memory>"), Compression::default())
    }

    pub fn with_target(out: W, target: &Path, level: Compression) -> Self {
        Self {
            out,
            target: target.to_path_buf(),
            offset: 0,
            entries: Vec::new(),
            level,
        }
    }

    /// Number of entries written so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compress `data` with DEFLATE and append it as `name`.
    ///
    /// `timestamp` is the DOS (time, date) pair, see
    /// [`dos_timestamp`](super::dos_timestamp).
    pub fn write_deflated(&mut self, name: &str, data: &[u8], timestamp: (u16, u16)) -> Result<()> {
        self.write_file(name, data, CompressionMethod::Deflate, timestamp)
    }

    /// Append `data` uncompressed as `name`.
    pub fn write_stored(&mut self, name: &str, data: &[u8], timestamp: (u16, u16)) -> Result<()> {
        self.write_file(name, data, CompressionMethod::Stored, timestamp)
    }

    /// Append an empty directory entry. A trailing `/` is added if missing.
    pub fn add_directory(&mut self, name: &str, timestamp: (u16, u16)) -> Result<()> {
        if name.ends_with('/') {
            self.write_file(name, &[], CompressionMethod::Stored, timestamp)
        } else {
            self.write_file(&format!("{}/", name), &[], CompressionMethod::Stored, timestamp)
        }
    }

    fn write_file(
        &mut self,
        name: &str,
        data: &[u8],
        method: CompressionMethod,
        (last_mod_time, last_mod_date): (u16, u16),
    ) -> Result<()> {
        if name.is_empty() || name.len() > u16::MAX as usize {
            return Err(Error::io(
                &self.target,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid entry name length {}", name.len()),
                ),
            ));
        }
        if self.entries.len() >= MAX_ENTRIES {
            return Err(Error::ArchiveTooLarge(format!(
                "more than {} entries",
                MAX_ENTRIES
            )));
        }

        let payload = match method {
            CompressionMethod::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), self.level);
                encoder
                    .write_all(data)
                    .and_then(|_| encoder.finish())
                    .map_err(|e| Error::io(&self.target, e))?
            }
            _ => data.to_vec(),
        };

        if data.len() as u64 > MAX_U32_FIELD
            || payload.len() as u64 > MAX_U32_FIELD
            || self.offset > MAX_U32_FIELD
        {
            return Err(Error::ArchiveTooLarge(format!(
                "entry '{}' does not fit a 32-bit archive",
                name
            )));
        }

        let entry = ZipFileEntry {
            file_name: name.to_string(),
            compression_method: method,
            compressed_size: payload.len() as u64,
            uncompressed_size: data.len() as u64,
            crc32: crc32fast::hash(data),
            lfh_offset: self.offset,
            last_mod_time,
            last_mod_date,
            is_directory: name.ends_with('/'),
        };

        entry
            .write_local_header(&mut self.out)
            .and_then(|_| self.out.write_all(&payload))
            .map_err(|e| Error::io(&self.target, e))?;

        self.offset += (LFH_SIZE + name.len() + payload.len()) as u64;
        self.entries.push(entry);
        Ok(())
    }

    /// Write the Central Directory and End of Central Directory records,
    /// flush, and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        let cd_offset = self.offset;
        let mut central = Vec::new();
        for entry in &self.entries {
            entry
                .write_central_header(&mut central)
                .map_err(|e| Error::io(&self.target, e))?;
        }

        if cd_offset > MAX_U32_FIELD || central.len() as u64 > MAX_U32_FIELD {
            return Err(Error::ArchiveTooLarge(
                "central directory does not fit a 32-bit archive".to_string(),
            ));
        }

        let eocd = EndOfCentralDirectory::new(
            self.entries.len() as u16,
            central.len() as u32,
            cd_offset as u32,
        );

        self.out
            .write_all(&central)
            .and_then(|_| eocd.write_to(&mut self.out))
            .and_then(|_| self.out.flush())
            .map_err(|e| Error::io(&self.target, e))?;

        Ok(self.out)
    }
}

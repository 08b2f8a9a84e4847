use flate2::read::DeflateDecoder;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::io::{LocalFileReader, ReadAt};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl ZipExtractor<LocalFileReader> {
    /// Open an archive on the local filesystem.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(LocalFileReader::new(path)?))
    }
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all files in the archive, in central directory order
    pub fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files()
    }

    /// Extract file data to memory
    ///
    /// STORED and DEFLATE entries are supported. The decoded payload must
    /// match the size and CRC-32 recorded in the central directory.
    pub fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let data_offset = self.parser.get_data_offset(entry)?;

        // Refuse to allocate for data the archive cannot contain
        let end = data_offset.checked_add(entry.compressed_size);
        if end.is_none_or(|end| end > self.parser.reader().size()) {
            return Err(Error::corrupt(format!(
                "entry '{}' extends past the end of the archive",
                entry.file_name
            )));
        }

        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.parser.reader().read_at(data_offset, &mut raw)?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => {
                let mut out = Vec::with_capacity(entry.uncompressed_size.min(1 << 26) as usize);
                // One byte past the declared size is enough to detect a lie
                DeflateDecoder::new(raw.as_slice())
                    .take(entry.uncompressed_size.saturating_add(1))
                    .read_to_end(&mut out)
                    .map_err(|e| {
                        Error::corrupt(format!("cannot inflate '{}': {}", entry.file_name, e))
                    })?;
                out
            }
            CompressionMethod::Unknown(method) => {
                return Err(Error::corrupt(format!(
                    "entry '{}' uses unsupported compression method {}",
                    entry.file_name, method
                )));
            }
        };

        if data.len() as u64 != entry.uncompressed_size {
            return Err(Error::corrupt(format!(
                "entry '{}' decoded to {} bytes, expected {}",
                entry.file_name,
                data.len(),
                entry.uncompressed_size
            )));
        }

        let crc = crc32fast::hash(&data);
        if crc != entry.crc32 {
            return Err(Error::corrupt(format!(
                "CRC mismatch for '{}': {:08x} != {:08x}",
                entry.file_name, crc, entry.crc32
            )));
        }

        Ok(data)
    }
}

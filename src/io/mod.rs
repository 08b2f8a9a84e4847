mod local;

pub use local::LocalFileReader;

use crate::error::{Error, Result};

/// Trait for random access reading from an archive source
pub trait ReadAt {
    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// Running past the end of the source is reported as
    /// [`Error::CorruptArchive`], since every caller reads ranges the
    /// archive itself declared.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}

/// In-memory archives, used when an archive has already been buffered.
impl ReadAt for Vec<u8> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| Error::corrupt("offset out of range"))?;
        let end = start
            .checked_add(buf.len())
            .filter(|end| *end <= self.len())
            .ok_or_else(|| Error::corrupt("unexpected end of archive"))?;
        buf.copy_from_slice(&self[start..end]);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

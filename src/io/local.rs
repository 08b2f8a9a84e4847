use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use super::ReadAt;
use crate::error::{Error, Result};

/// Local file reader with random access support
pub struct LocalFileReader {
    file: File,
    path: PathBuf,
    size: u64,
}

impl LocalFileReader {
    /// Open `path` for positional reads. A missing file is [`Error::NotFound`].
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::open(path, e))?;
        let size = file.metadata().map_err(|e| Error::io(path, e))?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            size,
        })
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_exact_at(buf, offset)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            // seek_read may return short counts, keep going until the buffer is full
            let mut filled = 0;
            while filled < buf.len() {
                let n = self
                    .file
                    .seek_read(&mut buf[filled..], offset + filled as u64)?;
                if n == 0 {
                    return Err(io::ErrorKind::UnexpectedEof.into());
                }
                filled += n;
            }
            Ok(())
        }

        #[cfg(not(any(unix, windows)))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = &self.file;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(buf)
        }
    }
}

impl ReadAt for LocalFileReader {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        match self.read_exact_at(offset, buf) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(Error::corrupt(format!(
                "unexpected end of archive reading {} bytes at offset {}",
                buf.len(),
                offset
            ))),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    fn size(&self) -> u64 {
        self.size
    }
}

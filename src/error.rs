use std::io;
use std::path::{Path, PathBuf};

/// Errors raised while scanning manifests or reading and writing archives.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed manifest '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("'{0}' not found")]
    NotFound(PathBuf),

    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("entry '{0}' escapes the output directory")]
    UnsafeEntryPath(String),

    #[error("archive too large: {0} (ZIP64 output is not supported)")]
    ArchiveTooLarge(String),

    #[error("I/O error on '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },
}

impl Error {
    /// Wrap an error from opening a required input. A missing file becomes
    /// [`Error::NotFound`], anything else stays an I/O error.
    pub fn open(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::io(path, source)
        }
    }

    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptArchive(reason.into())
    }

    /// Prefix a [`Error::CorruptArchive`] reason with the archive it came from.
    pub(crate) fn in_archive(self, archive: &Path) -> Self {
        match self {
            Self::CorruptArchive(reason) => {
                Self::CorruptArchive(format!("{}: {}", archive.display(), reason))
            }
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_maps_missing_file_to_not_found() {
        let err = Error::open(
            Path::new("Document.xml"),
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(matches!(err, Error::NotFound(ref p) if p == Path::new("Document.xml")));

        let err = Error::open(
            Path::new("Document.xml"),
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn in_archive_prefixes_only_corruption() {
        let err = Error::corrupt("bad header").in_archive(Path::new("a.zip"));
        assert_eq!(err.to_string(), "corrupt archive: a.zip: bad header");

        let err = Error::NotFound(PathBuf::from("x")).in_archive(Path::new("a.zip"));
        assert!(matches!(err, Error::NotFound(_)));
    }
}

use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of an [`ArchiveError`], used by callers that need to
/// decide between skipping, degrading and aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidFormat,
    CorruptArchive,
    DecodeFailure,
    Io,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("File not found: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("{what} not found in {}", .archive.display())]
    NotFound { what: String, archive: PathBuf },
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Image decode error: {0}")]
    DecodeFailure(String),
    #[error("Progress store error: {0}")]
    Store(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchiveError::MissingFile(_) | ArchiveError::NotFound { .. } => ErrorKind::NotFound,
            ArchiveError::InvalidFormat(_) | ArchiveError::Store(_) => ErrorKind::InvalidFormat,
            ArchiveError::CorruptArchive(_) => ErrorKind::CorruptArchive,
            ArchiveError::Decode(_) | ArchiveError::DecodeFailure(_) => ErrorKind::DecodeFailure,
            ArchiveError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            ArchiveError::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn not_found(what: impl Into<String>, archive: &std::path::Path) -> Self {
        ArchiveError::NotFound {
            what: what.into(),
            archive: archive.to_path_buf(),
        }
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        use zip::result::ZipError;
        match err {
            ZipError::Io(e) => ArchiveError::Io(e),
            ZipError::FileNotFound => ArchiveError::NotFound {
                what: "zip entry".into(),
                archive: PathBuf::new(),
            },
            ZipError::InvalidArchive(msg) => ArchiveError::CorruptArchive(msg.to_string()),
            ZipError::UnsupportedArchive(msg) => ArchiveError::CorruptArchive(msg.to_string()),
            #[allow(unreachable_patterns)]
            other => ArchiveError::CorruptArchive(other.to_string()),
        }
    }
}

#[cfg(feature = "pdf")]
impl From<lopdf::Error> for ArchiveError {
    fn from(err: lopdf::Error) -> Self {
        ArchiveError::CorruptArchive(format!("PDF: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_reports_not_found_kind() {
        let err = ArchiveError::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = ArchiveError::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn zip_structure_errors_are_corrupt() {
        let err = ArchiveError::from(zip::result::ZipError::InvalidArchive("bad header"));
        assert_eq!(err.kind(), ErrorKind::CorruptArchive);
    }
}

//! Content-based archive format detection.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use zip::read::ZipArchive;

use crate::error::ArchiveError;

const PDF_MAGIC: &[u8] = b"%PDF-";
const RAR4_MAGIC: &[u8] = b"Rar!\x1A\x07\x00";
const RAR5_MAGIC: &[u8] = b"Rar!\x1A\x07\x01\x00";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";
const EPUB_MIMETYPE: &str = "application/epub+zip";

/// The container kind of a comic file, as decided by its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Cbz,
    Cbr,
    Pdf,
    Unsupported,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatKind::Cbz => "CBZ",
            FormatKind::Cbr => "CBR",
            FormatKind::Pdf => "PDF",
            FormatKind::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// Classify a file by sniffing its leading bytes.
///
/// The file extension is never consulted, so a `.cbz` that really holds a RAR
/// container is reported as [`FormatKind::Cbr`]. Read failures are returned
/// as errors rather than folded into [`FormatKind::Unsupported`].
pub fn detect(path: &Path) -> Result<FormatKind, ArchiveError> {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ArchiveError::MissingFile(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    if !meta.is_file() {
        return Err(ArchiveError::InvalidFormat(format!(
            "{} is not a regular file",
            path.display()
        )));
    }

    let mut header = [0u8; 8];
    let read = read_prefix(&mut File::open(path)?, &mut header)?;
    let header = &header[..read];

    let kind = if header.starts_with(PDF_MAGIC) {
        FormatKind::Pdf
    } else if header.starts_with(RAR4_MAGIC) || header.starts_with(RAR5_MAGIC) {
        FormatKind::Cbr
    } else if header.starts_with(ZIP_MAGIC) || header.starts_with(ZIP_EMPTY_MAGIC) {
        if is_epub(path)? {
            log::debug!("{:?} is an EPUB book, not a comic", path);
            FormatKind::Unsupported
        } else {
            FormatKind::Cbz
        }
    } else {
        FormatKind::Unsupported
    };

    log::debug!("Detected {:?} as {}", path, kind);
    Ok(kind)
}

/// Fill as much of `buf` as the file allows; short files are not an error.
fn read_prefix(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// A zip is an EPUB when it carries the OCF `mimetype` marker or container.
/// Zips whose central directory cannot be read are left to the listing step,
/// which reports them as corrupt.
fn is_epub(path: &Path) -> Result<bool, ArchiveError> {
    let mut zip = match ZipArchive::new(File::open(path)?) {
        Ok(z) => z,
        Err(e) => {
            log::debug!("Zip directory of {:?} unreadable during detection: {}", path, e);
            return Ok(false);
        }
    };

    if zip.file_names().any(|n| n == "META-INF/container.xml") {
        return Ok(true);
    }

    let Ok(mut entry) = zip.by_name("mimetype") else {
        return Ok(false);
    };
    let mut contents = String::new();
    if entry.read_to_string(&mut contents).is_err() {
        return Ok(false);
    }
    Ok(contents.trim() == EPUB_MIMETYPE)
}

//! Comic archive ingestion: format detection, page listing and extraction for
//! CBZ, CBR and PDF comics, reading progress persistence and catalog scanning.

pub mod catalog;
pub mod config;
pub mod detect;
pub mod error;
pub mod metadata;
pub mod model;
pub mod prelude;
pub mod progress;

mod zip_archive;
pub use zip_archive::ZipImageArchive;

#[cfg(feature = "rar")]
mod rar_archive;
#[cfg(feature = "rar")]
pub use rar_archive::{RarEntry, RarImageArchive, RarTool, UnrarCommand};

#[cfg(feature = "pdf")]
mod pdf_archive;
#[cfg(feature = "pdf")]
pub use pdf_archive::PdfImageArchive;

#[cfg(test)]
pub(crate) mod test_util;

use std::io::Write;
use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::prelude::*;

/// True when the (case-insensitive) name carries one of the page image suffixes.
#[macro_export]
macro_rules! is_supported_format {
    ($name:expr) => {{
        let lower = $name.to_lowercase();
        $crate::config::IMAGE_EXTENSIONS
            .iter()
            .any(|ext| lower.ends_with(&format!(".{}", ext)))
    }};
}

/// Entries that archivers and operating systems leave behind: macOS resource
/// forks, hidden files and Windows thumbnail caches.
pub fn is_junk_entry(name: &str) -> bool {
    name.split(['/', '\\']).any(|part| {
        part.eq_ignore_ascii_case("__MACOSX")
            || part.eq_ignore_ascii_case("thumbs.db")
            || (part.len() > 1 && part.starts_with('.'))
    })
}

/// The single filter deciding what counts as a page, shared by listing and
/// metadata extraction so both agree on the page count.
pub fn is_page_entry(name: &str, is_dir: bool) -> bool {
    !is_dir && !name.ends_with('/') && !is_junk_entry(name) && is_supported_format!(name)
}

/// Case-insensitive order on the in-archive path, exact bytes as tie-break.
pub fn sort_pages(pages: &mut [PageEntry]) {
    pages.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Capabilities every archive backend provides.
///
/// Listings are recomputed on each call; backends never keep a live handle
/// into the archive between calls.
pub trait ImageArchiveTrait {
    fn path(&self) -> &Path;

    fn list_pages(&self) -> Result<Vec<PageEntry>, ArchiveError>;

    /// Raw bytes of the entry called `name`.
    fn read_entry(&self, name: &str) -> Result<Vec<u8>, ArchiveError>;

    /// Stream the entry into `out`, returning the number of bytes written.
    fn write_entry(&self, name: &str, out: &mut dyn Write) -> Result<u64, ArchiveError> {
        let bytes = self.read_entry(name)?;
        out.write_all(&bytes)?;
        Ok(bytes.len() as u64)
    }

    fn page_count(&self) -> Result<usize, ArchiveError> {
        Ok(self.list_pages()?.len())
    }

    /// Turn a page reference into an in-archive name.
    fn resolve(&self, page: &PageRef) -> Result<String, ArchiveError> {
        match page {
            PageRef::Name(name) => Ok(name.clone()),
            PageRef::Index(index) => {
                let mut pages = self.list_pages()?;
                if *index < pages.len() {
                    Ok(pages.swap_remove(*index).name)
                } else {
                    Err(ArchiveError::not_found(
                        format!("page index {} (archive has {} pages)", index, pages.len()),
                        self.path(),
                    ))
                }
            }
        }
    }

    fn extract_page(&self, page: &PageRef) -> Result<Vec<u8>, ArchiveError> {
        let name = self.resolve(page)?;
        self.read_entry(&name)
    }

    fn write_page(&self, page: &PageRef, out: &mut dyn Write) -> Result<u64, ArchiveError> {
        let name = self.resolve(page)?;
        self.write_entry(&name, out)
    }

    /// Extract and decode. A page that exists but is not a valid image gives
    /// a decode error, never a not-found error.
    fn decode_page(&self, page: &PageRef) -> Result<DynamicImage, ArchiveError> {
        let bytes = self.extract_page(page)?;
        Ok(image::load_from_memory(&bytes)?)
    }
}

/// A comic container, backend chosen once from its detected format.
pub enum ComicArchive {
    Cbz(ZipImageArchive),
    #[cfg(feature = "rar")]
    Cbr(RarImageArchive),
    #[cfg(feature = "pdf")]
    Pdf(PdfImageArchive),
}

impl ComicArchive {
    /// Detect the format of `path` and open the matching backend.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let kind = detect(path)?;
        log::debug!("Opening {:?} as {}", path, kind);
        match kind {
            FormatKind::Cbz => Ok(ComicArchive::Cbz(ZipImageArchive::new(path)?)),
            #[cfg(feature = "rar")]
            FormatKind::Cbr => Ok(ComicArchive::Cbr(RarImageArchive::new(path)?)),
            #[cfg(feature = "pdf")]
            FormatKind::Pdf => Ok(ComicArchive::Pdf(PdfImageArchive::new(path)?)),
            other => Err(ArchiveError::InvalidFormat(format!(
                "{} is not a supported comic archive ({})",
                path.display(),
                other
            ))),
        }
    }

    pub fn format(&self) -> FormatKind {
        match self {
            ComicArchive::Cbz(_) => FormatKind::Cbz,
            #[cfg(feature = "rar")]
            ComicArchive::Cbr(_) => FormatKind::Cbr,
            #[cfg(feature = "pdf")]
            ComicArchive::Pdf(_) => FormatKind::Pdf,
        }
    }

    pub fn as_trait(&self) -> &dyn ImageArchiveTrait {
        match self {
            ComicArchive::Cbz(zip) => zip,
            #[cfg(feature = "rar")]
            ComicArchive::Cbr(rar) => rar,
            #[cfg(feature = "pdf")]
            ComicArchive::Pdf(pdf) => pdf,
        }
    }

    pub fn path(&self) -> &Path {
        self.as_trait().path()
    }

    pub fn path_buf(&self) -> PathBuf {
        self.path().to_path_buf()
    }

    pub fn list_pages(&self) -> Result<Vec<PageEntry>, ArchiveError> {
        self.as_trait().list_pages()
    }

    pub fn page_count(&self) -> Result<usize, ArchiveError> {
        self.as_trait().page_count()
    }

    pub fn extract_page(&self, page: &PageRef) -> Result<Vec<u8>, ArchiveError> {
        self.as_trait().extract_page(page)
    }

    pub fn write_page(&self, page: &PageRef, out: &mut dyn Write) -> Result<u64, ArchiveError> {
        self.as_trait().write_page(page, out)
    }

    pub fn decode_page(&self, page: &PageRef) -> Result<DynamicImage, ArchiveError> {
        self.as_trait().decode_page(page)
    }
}

impl From<ZipImageArchive> for ComicArchive {
    fn from(archive: ZipImageArchive) -> Self {
        ComicArchive::Cbz(archive)
    }
}

#[cfg(feature = "rar")]
impl From<RarImageArchive> for ComicArchive {
    fn from(archive: RarImageArchive) -> Self {
        ComicArchive::Cbr(archive)
    }
}

#[cfg(feature = "pdf")]
impl From<PdfImageArchive> for ComicArchive {
    fn from(archive: PdfImageArchive) -> Self {
        ComicArchive::Pdf(archive)
    }
}

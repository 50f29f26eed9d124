//! Cover and page count of a single comic.

use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::Builder;

use crate::config::COVER_DIR_NAME;
use crate::prelude::*;

/// Where extracted covers are written.
pub fn cover_dir() -> PathBuf {
    std::env::temp_dir().join(COVER_DIR_NAME)
}

/// Name of the cover file for the comic at `comic_path`. The same comic always
/// maps to the same name, so a rescan replaces its previous cover.
pub fn cover_file_name(comic_path: &Path, extension: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(comic_path.to_string_lossy().as_bytes()));
    format!("cover_{}.{}", &digest[..16], extension)
}

/// Open `path`, count its pages and pull out the cover.
pub fn extract_metadata(path: &Path) -> Result<ComicMetadata, ArchiveError> {
    let archive = ComicArchive::open(path)?;
    metadata_for(&archive, true)
}

/// Page count only, cover left as [`CoverImage::Missing`].
pub fn extract_page_count(path: &Path) -> Result<ComicMetadata, ArchiveError> {
    let archive = ComicArchive::open(path)?;
    metadata_for(&archive, false)
}

/// Metadata of an already opened archive.
///
/// The cover is the first page of the listing, for every format. Cover
/// extraction problems are reported inside [`CoverImage::Failed`]; only a
/// listing failure is returned as an error.
pub fn metadata_for(
    archive: &ComicArchive,
    with_cover: bool,
) -> Result<ComicMetadata, ArchiveError> {
    let pages = archive.list_pages()?;
    let page_count = pages.len();

    let cover_image = match pages.first() {
        None => CoverImage::Missing,
        Some(_) if !with_cover => CoverImage::Missing,
        Some(first) => match extract_cover(archive, first, &cover_dir()) {
            Ok(path) => CoverImage::Extracted(path),
            Err(e) => {
                log::warn!("Cover of {:?} unusable: {}", archive.path(), e);
                CoverImage::Failed(e.to_string())
            }
        },
    };

    Ok(ComicMetadata {
        format: archive.format(),
        cover_image,
        page_count,
    })
}

/// Write the page into a temporary file under `dir` and decode it from there.
/// Only a decodable page is moved to its [`cover_file_name`]; on every error
/// path the temporary file is removed when the handle drops.
pub fn extract_cover(
    archive: &ComicArchive,
    page: &PageEntry,
    dir: &Path,
) -> Result<PathBuf, ArchiveError> {
    std::fs::create_dir_all(dir)?;
    let suffix = format!(".{}", page.extension);
    let mut file = Builder::new()
        .prefix("cover_")
        .suffix(&suffix)
        .tempfile_in(dir)?;

    archive.write_page(&PageRef::Name(page.name.clone()), file.as_file_mut())?;
    file.as_file_mut().flush()?;

    // Content decides the decoder; page names do not always match their data.
    image::ImageReader::open(file.path())?
        .with_guessed_format()?
        .decode()?;

    let path = dir.join(cover_file_name(archive.path(), &page.extension));
    file.persist(&path).map_err(|e| ArchiveError::Io(e.error))?;
    log::debug!("Cover of {:?} written to {:?}", archive.path(), path);
    Ok(path)
}

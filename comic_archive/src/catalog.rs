//! Directory scanning into [`Comic`] records.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::COMIC_EXTENSIONS;
use crate::metadata::{extract_metadata, extract_page_count};
use crate::prelude::*;

/// Knobs for [`scan`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Descend into subdirectories instead of skipping them.
    pub recursive: bool,
    /// Extract a cover for every comic; page counts are always read.
    pub extract_covers: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            extract_covers: true,
        }
    }
}

/// True for file names with one of the comic extensions, in any case.
pub fn has_comic_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            COMIC_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Build a catalog of the comics in `dir`.
///
/// Comics come out in directory iteration order, which is not sorted. A file
/// whose metadata cannot be read becomes a degraded record (no pages, failed
/// cover) and the scan moves on.
pub fn scan(
    dir: &Path,
    store: &ProgressStore,
    options: &ScanOptions,
) -> Result<Vec<Comic>, ArchiveError> {
    if !dir.exists() {
        return Err(ArchiveError::MissingFile(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(ArchiveError::InvalidFormat(format!(
            "{} is not a directory",
            dir.display()
        )));
    }
    let dir = dir.canonicalize()?;
    log::info!("Scanning for comics in {:?}", dir);

    let comics: Vec<Comic> = candidates(&dir, options.recursive)?
        .into_iter()
        .map(|path| load_comic(&path, store, options))
        .collect();

    log::info!(
        "Found {} comics ({} degraded)",
        comics.len(),
        comics.iter().filter(|c| c.is_degraded()).count()
    );
    Ok(comics)
}

fn candidates(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut files = Vec::new();
    if recursive {
        for entry in WalkDir::new(dir).min_depth(1) {
            match entry {
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(e) => log::warn!("Skipping unreadable entry under {:?}: {}", dir, e),
            }
        }
    } else {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                log::debug!("Skipping subdirectory {:?}", path);
            } else {
                files.push(path);
            }
        }
    }
    files.retain(|p| has_comic_extension(p));
    Ok(files)
}

/// One catalog record. Never fails: errors produce a degraded comic.
pub fn load_comic(path: &Path, store: &ProgressStore, options: &ScanOptions) -> Comic {
    let result = if options.extract_covers {
        extract_metadata(path)
    } else {
        extract_page_count(path)
    };

    let mut comic = match result {
        Ok(metadata) => Comic::new(path, metadata),
        Err(e) => {
            let format = detect(path).unwrap_or(FormatKind::Unsupported);
            match e.kind() {
                ErrorKind::NotFound | ErrorKind::Io => {
                    log::warn!("Could not read {:?}, listing it without pages: {}", path, e)
                }
                _ => log::warn!("Bad comic {:?}, listing it without pages: {}", path, e),
            }
            Comic::degraded(path, format, e.to_string())
        }
    };
    store.apply_to(&mut comic);
    comic
}

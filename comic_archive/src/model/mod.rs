use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detect::FormatKind;

/// One page inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    /// In-archive path, unique within the archive.
    pub name: String,
    pub is_dir: bool,
    /// Lowercased image extension without the dot, e.g. `"jpg"`.
    pub extension: String,
}

impl PageEntry {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let extension = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        Self {
            name,
            is_dir: false,
            extension,
        }
    }

    pub fn with_extension(name: impl Into<String>, extension: &str) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            extension: extension.to_lowercase(),
        }
    }

    /// Last path component, used when writing the page out to disk.
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub fn mime_type(&self) -> String {
        mime_guess::from_ext(&self.extension)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

/// How a caller names the page it wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRef {
    /// Zero-based position in the page listing.
    Index(usize),
    /// Literal in-archive path.
    Name(String),
}

impl From<usize> for PageRef {
    fn from(index: usize) -> Self {
        PageRef::Index(index)
    }
}

impl From<&str> for PageRef {
    fn from(name: &str) -> Self {
        PageRef::Name(name.to_string())
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRef::Index(i) => write!(f, "page index {}", i),
            PageRef::Name(n) => write!(f, "entry '{}'", n),
        }
    }
}

/// Where a comic's cover ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverImage {
    Extracted(PathBuf),
    Missing,
    Failed(String),
}

impl CoverImage {
    pub fn is_error(&self) -> bool {
        matches!(self, CoverImage::Failed(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            CoverImage::Extracted(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for CoverImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverImage::Extracted(p) => write!(f, "{}", p.display()),
            CoverImage::Missing => f.write_str("No cover image found"),
            CoverImage::Failed(reason) => write!(f, "Error: {}", reason),
        }
    }
}

/// Summary of one archive, computed once per catalog scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ComicMetadata {
    pub format: FormatKind,
    pub cover_image: CoverImage,
    pub page_count: usize,
}

/// Persisted reading position of one comic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub current_page: u32,
    pub progress: f64,
}

impl ProgressRecord {
    pub fn is_valid(&self) -> bool {
        self.progress.is_finite() && (0.0..=1.0).contains(&self.progress)
    }
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Comic {
    pub title: String,
    pub file_path: PathBuf,
    pub format: FormatKind,
    pub cover_image: CoverImage,
    pub page_count: usize,
    /// 1-based; 0 means the comic has not been opened yet.
    pub current_page: u32,
    pub progress: f64,
}

impl Comic {
    pub fn new(file_path: &Path, metadata: ComicMetadata) -> Self {
        Self {
            title: title_from_path(file_path),
            file_path: file_path.to_path_buf(),
            format: metadata.format,
            cover_image: metadata.cover_image,
            page_count: metadata.page_count,
            current_page: 0,
            progress: 0.0,
        }
    }

    /// Record for a file whose metadata could not be read.
    pub fn degraded(file_path: &Path, format: FormatKind, reason: impl Into<String>) -> Self {
        Self::new(
            file_path,
            ComicMetadata {
                format,
                cover_image: CoverImage::Failed(reason.into()),
                page_count: 0,
            },
        )
    }

    /// Key under which progress is persisted.
    pub fn key(&self) -> String {
        self.file_path.to_string_lossy().into_owned()
    }

    pub fn is_degraded(&self) -> bool {
        self.cover_image.is_error()
    }

    /// Move to `page`, clamped to `[1, page_count]`, or to `>= 1` when the page
    /// count is unknown. Progress is recomputed immediately.
    pub fn set_current_page(&mut self, page: i64) {
        let clamped = if self.page_count > 0 {
            page.clamp(1, self.page_count as i64)
        } else {
            page.max(1)
        };
        self.current_page = u32::try_from(clamped).unwrap_or(u32::MAX);
        self.update_progress();
    }

    pub fn next_page(&mut self) {
        self.set_current_page(self.current_page as i64 + 1);
    }

    pub fn previous_page(&mut self) {
        self.set_current_page(self.current_page as i64 - 1);
    }

    /// Seed from a stored record without forcing an unopened comic to page 1.
    pub fn restore(&mut self, record: &ProgressRecord) {
        if record.current_page == 0 {
            self.current_page = 0;
            self.update_progress();
        } else {
            self.set_current_page(record.current_page as i64);
        }
    }

    pub fn update_progress(&mut self) {
        self.progress = if self.page_count > 0 {
            self.current_page as f64 / self.page_count as f64
        } else {
            0.0
        };
    }

    pub fn progress_record(&self) -> ProgressRecord {
        ProgressRecord {
            current_page: self.current_page,
            progress: self.progress,
        }
    }
}

/// File name without its final extension.
pub fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

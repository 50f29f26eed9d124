//! Library-wide constants.

/// Suffixes (lowercase, without the dot) of entries treated as pages.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
/// File extensions the catalog scanner considers as comic candidates.
pub const COMIC_EXTENSIONS: &[&str] = &["cbz", "zip", "cbr", "rar", "pdf"];
/// Directory under the system temp dir where extracted covers are kept.
pub const COVER_DIR_NAME: &str = "comic_shelf_covers";
/// File name of the progress store inside the home directory.
pub const PROGRESS_FILE_NAME: &str = ".comic_shelf_progress.toml";
/// Executable used to read RAR containers.
pub const UNRAR_PROGRAM: &str = "unrar";
/// Minimum digits in generated PDF page names, keeps lexicographic order numeric.
pub const PDF_PAGE_DIGITS: usize = 4;

// std
pub use std::io::{BufRead, Write};
pub use std::num::NonZeroUsize;
pub use std::path::{Path, PathBuf};

// external crates
pub use anyhow::{Context, Result};
pub use comic_archive::catalog::{ScanOptions, scan};
pub use comic_archive::prelude::*;
pub use lru::LruCache;

// crate modules
pub use crate::{
    config::*,
    library::{print_catalog, select_comic},
    reader::run_comic,
};

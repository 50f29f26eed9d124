pub use crate::detect::{FormatKind, detect};
pub use crate::error::{ArchiveError, ErrorKind};
pub use crate::model::{Comic, ComicMetadata, CoverImage, PageEntry, PageRef, ProgressRecord};
pub use crate::progress::{ProgressMap, ProgressStore, StoreState};
pub use crate::{ComicArchive, ImageArchiveTrait, ZipImageArchive};
#[cfg(feature = "pdf")]
pub use crate::PdfImageArchive;
#[cfg(feature = "rar")]
pub use crate::{RarImageArchive, RarTool};

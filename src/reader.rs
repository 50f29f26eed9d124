//! Reading mode: page navigation for one comic, with progress saved after
//! every move.

use std::str::FromStr;

use image::GenericImageView;

use crate::prelude::*;

/// A command typed in reading mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCommand {
    Next,
    Previous,
    Set(i64),
    Quit,
}

impl FromStr for ReadCommand {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or("").to_lowercase();
        let argument = words.next();
        match (command.as_str(), argument) {
            ("n" | "next", None) => Ok(ReadCommand::Next),
            ("p" | "previous", None) => Ok(ReadCommand::Previous),
            ("q" | "quit", None) => Ok(ReadCommand::Quit),
            ("s" | "set", Some(page)) if words.next().is_none() => page
                .parse()
                .map(ReadCommand::Set)
                .map_err(|_| format!("'{}' is not a page number", page)),
            ("s" | "set", _) => Err("Usage: s <page>".to_string()),
            _ => Err(format!(
                "Unknown command '{}'. Use n, p, s <page> or q",
                line.trim()
            )),
        }
    }
}

impl ReadCommand {
    /// Move `comic` accordingly. Returns false for [`ReadCommand::Quit`].
    pub fn apply(self, comic: &mut Comic) -> bool {
        match self {
            ReadCommand::Next => comic.next_page(),
            ReadCommand::Previous => comic.previous_page(),
            ReadCommand::Set(page) => comic.set_current_page(page),
            ReadCommand::Quit => return false,
        }
        true
    }
}

/// What gets shown for a page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageInfo {
    pub name: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

/// An open comic with a small cache of already inspected pages.
pub struct Reader {
    archive: ComicArchive,
    pages: Vec<PageEntry>,
    cache: LruCache<usize, PageInfo>,
}

impl Reader {
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let archive = ComicArchive::open(path)?;
        let pages = archive.list_pages()?;
        let size = NonZeroUsize::new(CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            archive,
            pages,
            cache: LruCache::new(size),
        })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Decode the 1-based `page` and describe it.
    pub fn inspect(&mut self, page: u32) -> Result<PageInfo, ArchiveError> {
        let index = (page as usize).checked_sub(1).ok_or_else(|| {
            ArchiveError::InvalidFormat("page numbers start at 1".to_string())
        })?;
        if let Some(info) = self.cache.get(&index) {
            log::debug!("Page {} served from cache", page);
            return Ok(info.clone());
        }

        let entry = self.pages.get(index).ok_or_else(|| ArchiveError::NotFound {
            what: format!("page {} (comic has {} pages)", page, self.pages.len()),
            archive: self.archive.path_buf(),
        })?;
        let img = self.archive.decode_page(&PageRef::Name(entry.name.clone()))?;
        let (width, height) = img.dimensions();
        let info = PageInfo {
            name: entry.name.clone(),
            mime_type: entry.mime_type(),
            width,
            height,
        };
        self.cache.put(index, info.clone());
        Ok(info)
    }

    pub fn cached_pages(&self) -> usize {
        self.cache.len()
    }
}

/// Reading loop for one comic. Ends on `q` or end of input; the store is
/// saved after every page change and once more on the way out.
pub fn run_comic(
    comic: &mut Comic,
    store: &mut ProgressStore,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<()> {
    let mut reader = match Reader::open(&comic.file_path) {
        Ok(reader) => Some(reader),
        Err(e) => {
            writeln!(out, "Could not open {}: {}", comic.title, e)?;
            log::warn!("Reading {:?} without pages: {}", comic.file_path, e);
            None
        }
    };
    if let Some(reader) = &reader {
        if reader.page_count() != comic.page_count {
            log::info!(
                "{} changed since the scan: {} pages, was {}",
                comic.title,
                reader.page_count(),
                comic.page_count
            );
            comic.page_count = reader.page_count();
            if comic.current_page > 0 {
                comic.set_current_page(comic.current_page as i64);
            } else {
                comic.update_progress();
            }
        }
    }

    writeln!(out, "Reading {}", comic.title)?;
    loop {
        writeln!(
            out,
            "Page {}/{} ({:.1}%). Command [n]ext, [p]revious, [s]et <page>, [q]uit:",
            comic.current_page,
            comic.page_count,
            comic.progress * 100.0
        )?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let command = match line.parse::<ReadCommand>() {
            Ok(command) => command,
            Err(msg) => {
                writeln!(out, "{}", msg)?;
                continue;
            }
        };
        if !command.apply(comic) {
            break;
        }

        store.record_comic(comic);
        if let Err(e) = store.save() {
            writeln!(out, "Could not save progress: {}", e)?;
            log::warn!("Progress save failed: {}", e);
        }

        if let Some(reader) = reader.as_mut() {
            match reader.inspect(comic.current_page) {
                Ok(info) => writeln!(
                    out,
                    "{} ({}, {}x{})",
                    info.name, info.mime_type, info.width, info.height
                )?,
                Err(e) => writeln!(out, "Could not show page {}: {}", comic.current_page, e)?,
            }
        }
    }

    store.record_comic(comic);
    store
        .save()
        .with_context(|| format!("Couldn't save progress to {}", store.path().display()))?;
    Ok(())
}

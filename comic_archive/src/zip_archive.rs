use crate::prelude::*;
use crate::{is_page_entry, sort_pages};

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use zip::read::ZipArchive;
use zip::result::ZipError;

/// An archive backend for CBZ/ZIP comic archives.
///
/// The archive is reopened for every listing or extraction, so the struct
/// holds nothing but the path.
pub struct ZipImageArchive {
    /// Path to the ZIP archive file.
    path: PathBuf,
}

impl ZipImageArchive {
    /// Create a new `ZipImageArchive` from a given path.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the CBZ/ZIP file.
    ///
    /// # Returns
    ///
    /// Returns an `ArchiveError::InvalidFormat` when the file content is not a
    /// zip container, before any attempt is made to parse it.
    pub fn new(path: &Path) -> Result<Self, ArchiveError> {
        let kind = detect(path)?;
        if kind != FormatKind::Cbz {
            return Err(ArchiveError::InvalidFormat(format!(
                "{} is {}, expected CBZ",
                path.display(),
                kind
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn open(&self) -> Result<ZipArchive<File>, ArchiveError> {
        let file = File::open(&self.path)?;
        // A directory that cannot be read, even through an IO error, means the
        // container itself is broken.
        ZipArchive::new(file)
            .map_err(|e| ArchiveError::CorruptArchive(format!("{}: {}", self.path.display(), e)))
    }

    /// Run `f` on the named entry after checking it exists and is a file.
    fn with_entry<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut zip::read::ZipFile<'_>) -> Result<T, ArchiveError>,
    ) -> Result<T, ArchiveError> {
        let mut zip = self.open()?;
        let mut entry = match zip.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(ArchiveError::not_found(format!("entry '{}'", name), &self.path));
            }
            Err(e) => return Err(e.into()),
        };
        if entry.is_dir() {
            return Err(ArchiveError::InvalidFormat(format!(
                "entry '{}' in {} is a directory",
                name,
                self.path.display()
            )));
        }
        f(&mut entry)
    }
}

impl ImageArchiveTrait for ZipImageArchive {
    fn path(&self) -> &Path {
        &self.path
    }

    /// List all page images in the ZIP archive, sorted case-insensitively.
    fn list_pages(&self) -> Result<Vec<PageEntry>, ArchiveError> {
        let mut zip = self.open()?;

        let mut pages = Vec::new();
        for i in 0..zip.len() {
            let file = zip.by_index_raw(i)?;
            let name = file.name().to_string();
            if is_page_entry(&name, file.is_dir()) {
                pages.push(PageEntry::new(name));
            } else {
                log::trace!("Skipping entry: {}", name);
            }
        }
        sort_pages(&mut pages);
        log::debug!("{:?}: {} pages", self.path, pages.len());
        Ok(pages)
    }

    /// Extract and return the raw bytes of an entry by name.
    fn read_entry(&self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        self.with_entry(name, |entry| {
            let mut buf = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut buf)?;
            Ok(buf)
        })
    }

    fn write_entry(&self, name: &str, out: &mut dyn Write) -> Result<u64, ArchiveError> {
        self.with_entry(name, |entry| Ok(std::io::copy(entry, out)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{png_bytes, write_file, write_zip};
    use tempfile::tempdir;

    fn names(pages: &[PageEntry]) -> Vec<&str> {
        pages.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn lists_sorted_images_without_junk() {
        let dir = tempdir().unwrap();
        let path = write_zip(
            dir.path(),
            "comic.cbz",
            &[
                ("b.png", &b"b"[..]),
                ("a.jpg", &b"a"[..]),
                ("__MACOSX/a.jpg", &b"fork"[..]),
                ("dir/", &b""[..]),
            ],
        );
        let archive = ZipImageArchive::new(&path).unwrap();

        let pages = archive.list_pages().unwrap();
        assert_eq!(names(&pages), ["a.jpg", "b.png"]);
        assert_eq!(archive.page_count().unwrap(), 2);
        assert_eq!(archive.list_pages().unwrap(), pages);
    }

    #[test]
    fn dot_prefixed_entries_are_pages() {
        let dir = tempdir().unwrap();
        let path = write_zip(
            dir.path(),
            "comic.cbz",
            &[("./002.jpg", &b"2"[..]), ("./001.jpg", &b"1"[..]), ("./.thumb.jpg", &b"t"[..])],
        );
        let archive = ZipImageArchive::new(&path).unwrap();

        let pages = archive.list_pages().unwrap();
        assert_eq!(names(&pages), ["./001.jpg", "./002.jpg"]);
        assert_eq!(archive.extract_page(&PageRef::Index(0)).unwrap(), b"1");
    }

    #[test]
    fn listing_ignores_physical_order() {
        let dir = tempdir().unwrap();
        let path = write_zip(
            dir.path(),
            "comic.cbz",
            &[
                ("comic_page_02.png", &b"1"[..]),
                ("comic_page_10.webp", &b"2"[..]),
                ("comic_page_01.jpg", &b"3"[..]),
                ("notes/info.txt", &b"text"[..]),
                ("__MACOSX/com.apple.ResourceFork", &b""[..]),
                (".DS_Store", &b""[..]),
                ("an_actual_directory/", &b""[..]),
                ("an_actual_directory/nested_image.png", &b"4"[..]),
                ("another_image_at_root.jpeg", &b"5"[..]),
            ],
        );
        let archive = ZipImageArchive::new(&path).unwrap();
        assert_eq!(
            names(&archive.list_pages().unwrap()),
            [
                "an_actual_directory/nested_image.png",
                "another_image_at_root.jpeg",
                "comic_page_01.jpg",
                "comic_page_02.png",
                "comic_page_10.webp",
            ]
        );
    }

    #[test]
    fn index_and_name_give_same_bytes() {
        let dir = tempdir().unwrap();
        let png = png_bytes(3, 2);
        let path = write_zip(
            dir.path(),
            "comic.cbz",
            &[("b.png", &b"second"[..]), ("a.jpg", png.as_slice())],
        );
        let archive = ZipImageArchive::new(&path).unwrap();

        let by_index = archive.extract_page(&PageRef::Index(0)).unwrap();
        let by_name = archive.extract_page(&PageRef::from("a.jpg")).unwrap();
        assert_eq!(by_index, png);
        assert_eq!(by_index, by_name);

        let mut out = Vec::new();
        let written = archive.write_page(&PageRef::Index(1), &mut out).unwrap();
        assert_eq!(written, 6);
        assert_eq!(out, b"second");
    }

    #[test]
    fn missing_corrupt_and_directory_entries() {
        let dir = tempdir().unwrap();
        let path = write_zip(
            dir.path(),
            "comic.cbz",
            &[("a.png", &b"not an image"[..]), ("dir/", &b""[..])],
        );
        let archive = ZipImageArchive::new(&path).unwrap();

        let err = archive.extract_page(&PageRef::Index(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = archive.extract_page(&PageRef::from("zzz.png")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("zzz.png"));

        let err = archive.extract_page(&PageRef::from("dir/")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);

        let err = archive.decode_page(&PageRef::Index(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    }

    #[test]
    fn rejects_non_zip_before_parsing() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "fake.cbz", b"%PDF-1.4 nope");
        let err = ZipImageArchive::new(&path).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn broken_directory_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "broken.cbz", b"PK\x03\x04garbage");
        let archive = ZipImageArchive::new(&path).unwrap();
        let err = archive.list_pages().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptArchive);
    }

    #[test]
    fn empty_archive_has_no_pages() {
        let dir = tempdir().unwrap();
        let path = write_zip(dir.path(), "empty.cbz", &[("readme.txt", &b"hi"[..])]);
        let archive = ZipImageArchive::new(&path).unwrap();
        assert!(archive.list_pages().unwrap().is_empty());
    }
}

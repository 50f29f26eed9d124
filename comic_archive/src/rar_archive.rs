use crate::config::UNRAR_PROGRAM;
use crate::prelude::*;
use crate::{is_page_entry, sort_pages};

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;

use tempfile::tempdir;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// unrar exit code when the requested file is not in the archive.
const EXIT_NO_FILES: i32 = 10;
/// unrar exit code for CRC errors and damaged archives.
const EXIT_CRC_ERROR: i32 = 3;

/// One entry as reported by a RAR tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RarEntry {
    pub name: String,
    pub is_dir: bool,
}

impl RarEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// The narrow interface the CBR backend needs from whatever reads RAR data.
///
/// RAR is a sequential format: implementations scan from the start of the
/// archive on every call and keep no handle between calls.
pub trait RarTool: Send + Sync {
    fn list_entries(&self, archive: &Path) -> Result<Vec<RarEntry>, ArchiveError>;
    fn extract_entry(&self, archive: &Path, name: &str) -> Result<Vec<u8>, ArchiveError>;
}

/// [`RarTool`] backed by the external `unrar` executable.
#[derive(Debug, Clone)]
pub struct UnrarCommand {
    program: PathBuf,
}

impl UnrarCommand {
    /// Find `unrar` in `PATH`.
    pub fn locate() -> Result<Self, ArchiveError> {
        let program = which::which(UNRAR_PROGRAM).map_err(|e| {
            ArchiveError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("'{}' not found in PATH: {}", UNRAR_PROGRAM, e),
            ))
        })?;
        log::debug!("Using unrar at {:?}", program);
        Ok(Self { program })
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> Command {
        #[allow(unused_mut)]
        let mut cmd = Command::new(&self.program);
        #[cfg(windows)]
        {
            cmd.creation_flags(CREATE_NO_WINDOW);
        }
        cmd
    }

    fn failure(archive: &Path, what: &str, output: &Output) -> ArchiveError {
        let stderr = String::from_utf8_lossy(&output.stderr);
        match output.status.code() {
            Some(EXIT_NO_FILES) => ArchiveError::not_found(what.to_string(), archive),
            Some(EXIT_CRC_ERROR) => ArchiveError::CorruptArchive(format!(
                "{}: CRC error or damaged archive",
                archive.display()
            )),
            code => ArchiveError::CorruptArchive(format!(
                "{}: unrar failed ({:?}): {}",
                archive.display(),
                code,
                stderr.trim()
            )),
        }
    }
}

impl RarTool for UnrarCommand {
    fn list_entries(&self, archive: &Path) -> Result<Vec<RarEntry>, ArchiveError> {
        let output = self
            .command()
            .arg("vt") // technical listing, one field per line
            .arg("-c-") // no comments, cleaner output
            .arg("-p-") // never prompt for a password
            .arg("--")
            .arg(archive)
            .output()?;

        if !output.status.success() {
            return Err(Self::failure(archive, "entries", &output));
        }

        Ok(parse_technical_listing(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }

    fn extract_entry(&self, archive: &Path, name: &str) -> Result<Vec<u8>, ArchiveError> {
        // Dropped on every return path, removing whatever unrar wrote.
        let tmp_dir = tempdir()?;
        let mut dest = tmp_dir.path().as_os_str().to_owned();
        dest.push(std::path::MAIN_SEPARATOR_STR);

        let output = self
            .command()
            .arg("x")
            .arg("-y") // assume yes
            .arg("-idq") // quiet
            .arg("-p-")
            .arg("--")
            .arg(archive)
            .arg(name)
            .arg(&dest)
            .output()?;

        if !output.status.success() {
            return Err(Self::failure(archive, &format!("entry '{}'", name), &output));
        }

        let extracted_path = tmp_dir.path().join(name);
        match fs::read(&extracted_path) {
            Ok(buffer) => Ok(buffer),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArchiveError::not_found(format!("entry '{}'", name), archive))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Parse the `Name:`/`Type:` pairs of `unrar vt` output.
fn parse_technical_listing(stdout: &str) -> Vec<RarEntry> {
    let mut entries: Vec<RarEntry> = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if let Some(name) = line.strip_prefix("Name:") {
            entries.push(RarEntry::file(name.trim()));
        } else if let Some(kind) = line.strip_prefix("Type:") {
            if let Some(last) = entries.last_mut() {
                last.is_dir = kind.trim().eq_ignore_ascii_case("directory");
            }
        }
    }
    entries
}

/// An archive backend for RAR/CBR comic archives.
///
/// Every call goes back to the [`RarTool`], which reads the archive from the
/// start; nothing is cached between calls.
pub struct RarImageArchive {
    /// Path to the RAR archive file.
    path: PathBuf,
    tool: Arc<dyn RarTool>,
}

impl RarImageArchive {
    /// Open a RAR archive using `unrar` from `PATH`.
    pub fn new(path: &Path) -> Result<Self, ArchiveError> {
        Self::check_format(path)?;
        let tool = UnrarCommand::locate()?;
        Ok(Self {
            path: path.to_path_buf(),
            tool: Arc::new(tool),
        })
    }

    /// Open a RAR archive with an explicit tool.
    pub fn with_tool(path: &Path, tool: Arc<dyn RarTool>) -> Result<Self, ArchiveError> {
        Self::check_format(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            tool,
        })
    }

    fn check_format(path: &Path) -> Result<(), ArchiveError> {
        let kind = detect(path)?;
        if kind != FormatKind::Cbr {
            return Err(ArchiveError::InvalidFormat(format!(
                "{} is {}, expected CBR",
                path.display(),
                kind
            )));
        }
        Ok(())
    }

    fn normalize(name: &str) -> String {
        name.replace('\\', "/")
    }
}

impl ImageArchiveTrait for RarImageArchive {
    fn path(&self) -> &Path {
        &self.path
    }

    fn list_pages(&self) -> Result<Vec<PageEntry>, ArchiveError> {
        let mut pages: Vec<PageEntry> = self
            .tool
            .list_entries(&self.path)?
            .into_iter()
            .filter(|e| is_page_entry(&e.name, e.is_dir))
            .map(|e| PageEntry::new(e.name))
            .collect();
        sort_pages(&mut pages);
        log::debug!("{:?}: {} pages", self.path, pages.len());
        Ok(pages)
    }

    /// Extract one entry. The listing is consulted first so that missing and
    /// directory entries are reported precisely.
    fn read_entry(&self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        let wanted = Self::normalize(name);
        let entries = self.tool.list_entries(&self.path)?;
        let Some(entry) = entries
            .iter()
            .find(|e| Self::normalize(&e.name) == wanted)
        else {
            return Err(ArchiveError::not_found(format!("entry '{}'", name), &self.path));
        };
        if entry.is_dir {
            return Err(ArchiveError::InvalidFormat(format!(
                "entry '{}' in {} is a directory",
                name,
                self.path.display()
            )));
        }
        log::debug!("Extracting '{}' from {:?}", entry.name, self.path);
        self.tool.extract_entry(&self.path, &entry.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{png_bytes, write_file};
    use std::collections::HashMap;
    use tempfile::tempdir;

    /// In-memory stand-in for unrar, entries reported in insertion order.
    struct FakeRar {
        entries: Vec<RarEntry>,
        data: HashMap<String, Vec<u8>>,
    }

    impl FakeRar {
        fn new(files: &[(&str, &[u8])]) -> Self {
            let mut entries = Vec::new();
            let mut data = HashMap::new();
            for (name, bytes) in files {
                if let Some(dir) = name.strip_suffix('/') {
                    entries.push(RarEntry::dir(dir));
                } else {
                    entries.push(RarEntry::file(*name));
                    data.insert(name.to_string(), bytes.to_vec());
                }
            }
            Self { entries, data }
        }
    }

    impl RarTool for FakeRar {
        fn list_entries(&self, _archive: &Path) -> Result<Vec<RarEntry>, ArchiveError> {
            Ok(self.entries.clone())
        }

        fn extract_entry(&self, archive: &Path, name: &str) -> Result<Vec<u8>, ArchiveError> {
            self.data
                .get(name)
                .cloned()
                .ok_or_else(|| ArchiveError::not_found(name.to_string(), archive))
        }
    }

    fn open(files: &[(&str, &[u8])]) -> (tempfile::TempDir, RarImageArchive) {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "comic.cbr", b"Rar!\x1A\x07\x00fake");
        let archive = RarImageArchive::with_tool(&path, Arc::new(FakeRar::new(files))).unwrap();
        (dir, archive)
    }

    #[test]
    fn lists_and_extracts_like_zip() {
        let png = png_bytes(2, 2);
        let (_dir, archive) = open(&[
            ("b.png", &b"bbb"[..]),
            ("a.jpg", png.as_slice()),
            ("__MACOSX/a.jpg", &b"fork"[..]),
            ("dir/", &b""[..]),
        ]);

        let pages = archive.list_pages().unwrap();
        let names: Vec<&str> = pages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["a.jpg", "b.png"]);
        assert_eq!(archive.list_pages().unwrap(), pages);

        let by_index = archive.extract_page(&PageRef::Index(0)).unwrap();
        assert_eq!(by_index, archive.extract_page(&PageRef::from("a.jpg")).unwrap());
        assert_eq!(archive.decode_page(&PageRef::Index(0)).unwrap().width(), 2);
    }

    #[test]
    fn reports_missing_directory_and_corrupt_pages() {
        let (_dir, archive) = open(&[("p1.png", &b"junk"[..]), ("scans/", &b""[..])]);

        let err = archive.extract_page(&PageRef::Index(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = archive.extract_page(&PageRef::from("nope.png")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = archive.extract_page(&PageRef::from("scans")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);

        let err = archive.decode_page(&PageRef::Index(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    }

    #[test]
    fn backslash_names_match() {
        let (_dir, archive) = open(&[("Vol1\\p01.png", &b"x"[..])]);
        assert_eq!(
            archive.extract_page(&PageRef::from("Vol1/p01.png")).unwrap(),
            b"x"
        );
    }

    #[test]
    fn rejects_non_rar_content() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "comic.cbr", b"plain text, not a rar");
        let err = RarImageArchive::with_tool(&path, Arc::new(FakeRar::new(&[])))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    /// A shell script standing in for the unrar executable. Any invocation
    /// without `-p-` fails with an exit code no test expects.
    #[cfg(unix)]
    fn fake_unrar(dir: &Path, body: &str) -> UnrarCommand {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("unrar");
        let text = format!(
            "#!/bin/sh\ncase \" $* \" in *\" -p- \"*) ;; *) exit 99 ;; esac\n{}\n",
            body
        );
        fs::write(&script, text).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        UnrarCommand::with_program(script)
    }

    #[cfg(unix)]
    #[test]
    fn unrar_exit_codes() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("comic.cbr");

        let missing = fake_unrar(dir.path(), "exit 10");
        let err = missing.extract_entry(&archive, "p01.png").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let crc = fake_unrar(dir.path(), "exit 3");
        let err = crc.list_entries(&archive).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptArchive);

        let other = fake_unrar(dir.path(), "echo 'cannot open archive' >&2\nexit 2");
        let err = other.list_entries(&archive).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptArchive);
        assert!(err.to_string().contains("cannot open archive"));
    }

    #[cfg(unix)]
    #[test]
    fn unrar_listing_and_extraction() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("comic.cbr");

        let lister = fake_unrar(
            dir.path(),
            "printf '        Name: p02.png\\n        Type: File\\n\\n        Name: p01.png\\n        Type: File\\n'",
        );
        assert_eq!(
            lister.list_entries(&archive).unwrap(),
            vec![RarEntry::file("p02.png"), RarEntry::file("p01.png")]
        );

        let extractor = fake_unrar(
            dir.path(),
            "for arg; do dest=$arg; done\nprintf page-one > \"$dest/p01.png\"",
        );
        assert_eq!(extractor.extract_entry(&archive, "p01.png").unwrap(), b"page-one");

        let silent = fake_unrar(dir.path(), "exit 0");
        let err = silent.extract_entry(&archive, "p01.png").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn parses_unrar_technical_listing() {
        let stdout = "\
UNRAR 6.24 freeware      Copyright (c) 1993-2023 Alexander Roshal

Archive: comic.cbr
Details: RAR 5

        Name: Issue 1/p01.jpg
        Type: File
        Size: 1024

        Name: Issue 1
        Type: Directory

        Name: Issue 1/p02.png
        Type: File
";
        assert_eq!(
            parse_technical_listing(stdout),
            vec![
                RarEntry::file("Issue 1/p01.jpg"),
                RarEntry::dir("Issue 1"),
                RarEntry::file("Issue 1/p02.png"),
            ]
        );
    }
}

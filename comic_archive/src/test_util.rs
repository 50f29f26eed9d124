//! Fixture builders shared by the unit tests.

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use zip::ZipWriter;
use zip::write::FileOptions;

pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Write a zip with entries in the given physical order. Names ending in `/`
/// become directory entries.
pub fn write_zip(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(name);
    let mut zip = ZipWriter::new(File::create(&path).unwrap());
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (entry, data) in entries {
        if entry.ends_with('/') {
            zip.add_directory(*entry, options).unwrap();
        } else {
            zip.start_file(*entry, options).unwrap();
            zip.write_all(data).unwrap();
        }
    }
    zip.finish().unwrap();
    path
}

pub fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 40) as u8, (y * 40) as u8, 128])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

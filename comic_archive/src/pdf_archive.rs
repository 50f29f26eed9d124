//! PDF comics: one page entry per document page, backed by the largest raster
//! image drawn on that page.

use crate::config::PDF_PAGE_DIGITS;
use crate::prelude::*;

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Guard against cyclic `Parent` chains in malformed page trees.
const MAX_PAGE_TREE_DEPTH: usize = 32;

pub struct PdfImageArchive {
    path: PathBuf,
}

impl PdfImageArchive {
    pub fn new(path: &Path) -> Result<Self, ArchiveError> {
        let kind = detect(path)?;
        if kind != FormatKind::Pdf {
            return Err(ArchiveError::InvalidFormat(format!(
                "{} is {}, expected PDF",
                path.display(),
                kind
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn load(&self) -> Result<Document, ArchiveError> {
        Document::load(&self.path).map_err(|e| {
            ArchiveError::CorruptArchive(format!("{}: {}", self.path.display(), e))
        })
    }

    fn page_name(number: u32, total: usize) -> String {
        let width = PDF_PAGE_DIGITS.max(total.to_string().len());
        format!("page-{:0width$}", number, width = width)
    }

    fn page_number(name: &str) -> Option<u32> {
        name.strip_prefix("page-")?.parse().ok()
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Resources of a page, following inheritance through the page tree.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        if let Ok(res) = node.get(b"Resources") {
            return resolve(doc, res)?.as_dict().ok();
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn dimension(stream: &Stream, key: &[u8]) -> i64 {
    stream
        .dict
        .get(key)
        .and_then(|o| o.as_i64())
        .unwrap_or(0)
}

/// Pixel area for ranking images. Non-positive dimensions rank lowest.
fn area(stream: &Stream) -> i128 {
    let (w, h) = (dimension(stream, b"Width"), dimension(stream, b"Height"));
    if w <= 0 || h <= 0 {
        return 0;
    }
    w as i128 * h as i128
}

/// The biggest image XObject referenced by the page, if any.
fn page_image(doc: &Document, page_id: ObjectId) -> Option<&Stream> {
    let resources = page_resources(doc, page_id)?;
    let xobjects = resolve(doc, resources.get(b"XObject").ok()?)?.as_dict().ok()?;

    xobjects
        .iter()
        .filter_map(|(_, obj)| resolve(doc, obj)?.as_stream().ok())
        .filter(|s| {
            s.dict
                .get(b"Subtype")
                .and_then(|o| o.as_name())
                .map(|n| n == b"Image")
                .unwrap_or(false)
        })
        .max_by_key(|s| area(s))
}

fn filters(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().ok().map(|n| n.to_vec()))
            .collect(),
        _ => Vec::new(),
    }
}

fn image_extension(stream: &Stream) -> &'static str {
    match filters(stream).last().map(Vec::as_slice) {
        Some(b"DCTDecode") => "jpg",
        Some(b"JPXDecode") => "jp2",
        _ => "png",
    }
}

/// Bytes of an embedded image: JPEG/JPEG 2000 data is passed through, raw
/// 8-bit pixel data is wrapped into a PNG.
fn image_bytes(stream: &Stream) -> Result<Vec<u8>, ArchiveError> {
    let filters = filters(stream);
    let names: Vec<&[u8]> = filters.iter().map(Vec::as_slice).collect();
    let pixels = match names.as_slice() {
        [b"DCTDecode"] | [b"JPXDecode"] => return Ok(stream.content.clone()),
        [] => stream.content.clone(),
        [b"FlateDecode"] => stream.decompressed_content()?,
        other => {
            let shown: Vec<String> = other
                .iter()
                .map(|n| String::from_utf8_lossy(n).into_owned())
                .collect();
            return Err(ArchiveError::DecodeFailure(format!(
                "unsupported image filter chain {:?}",
                shown
            )));
        }
    };

    let bits = stream
        .dict
        .get(b"BitsPerComponent")
        .and_then(|o| o.as_i64())
        .unwrap_or(8);
    let (w, h) = (dimension(stream, b"Width"), dimension(stream, b"Height"));
    if bits != 8 || w <= 0 || h <= 0 || w > u32::MAX as i64 || h > u32::MAX as i64 {
        return Err(ArchiveError::DecodeFailure(format!(
            "unsupported raw image {}x{} at {} bits per component",
            w, h, bits
        )));
    }
    let (w, h) = (w as u32, h as u32);
    let area = (w as usize).checked_mul(h as usize).ok_or_else(|| {
        ArchiveError::DecodeFailure(format!("raw image {}x{} is too large", w, h))
    })?;

    // Channel count is taken from the data size rather than the colour space,
    // which may be an indirect ICC profile.
    let img = match pixels.len() / area.max(1) {
        1 => GrayImage::from_raw(w, h, pixels[..area].to_vec()).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(w, h, pixels[..area * 3].to_vec()).map(DynamicImage::ImageRgb8),
        4 => {
            let rgb: Vec<u8> = pixels[..area * 4]
                .chunks_exact(4)
                .flat_map(|cmyk| {
                    let k = 255 - cmyk[3] as u32;
                    [0, 1, 2].map(|i| ((255 - cmyk[i] as u32) * k / 255) as u8)
                })
                .collect();
            RgbImage::from_raw(w, h, rgb).map(DynamicImage::ImageRgb8)
        }
        _ => None,
    }
    .ok_or_else(|| {
        ArchiveError::DecodeFailure(format!(
            "raw image data of {} bytes does not fit {}x{}",
            pixels.len(),
            w,
            h
        ))
    })?;

    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

impl ImageArchiveTrait for PdfImageArchive {
    fn path(&self) -> &Path {
        &self.path
    }

    fn list_pages(&self) -> Result<Vec<PageEntry>, ArchiveError> {
        let doc = self.load()?;
        let pages = doc.get_pages();
        let total = pages.len();
        // Page numbers are already ordered and zero-padded names keep that order.
        let entries: Vec<PageEntry> = pages
            .iter()
            .map(|(number, id)| {
                let ext = page_image(&doc, *id).map(image_extension).unwrap_or("png");
                PageEntry::with_extension(Self::page_name(*number, total), ext)
            })
            .collect();
        log::debug!("{:?}: {} pages", self.path, entries.len());
        Ok(entries)
    }

    fn read_entry(&self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        let doc = self.load()?;
        let pages = doc.get_pages();
        let total = pages.len();

        let page_id = Self::page_number(name)
            .filter(|n| Self::page_name(*n, total) == name)
            .and_then(|n| pages.get(&n))
            .ok_or_else(|| ArchiveError::not_found(format!("entry '{}'", name), &self.path))?;

        let stream = page_image(&doc, *page_id).ok_or_else(|| {
            ArchiveError::DecodeFailure(format!("{} has no embedded raster image", name))
        })?;
        image_bytes(stream)
    }
}

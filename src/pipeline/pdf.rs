//! lopdf-backed [`DocumentSource`]: geometry, content, images, metadata.
//!
//! The document is parsed once with lopdf. Each [`PdfPage`] interprets its
//! content stream lazily and only once, then serves both the text runs and
//! the drawing-instruction stream from that single pass. Rasterisation goes
//! to pdfium through [`crate::pipeline::render`]; a prepared batch is held
//! in memory until each of its pages takes its raster.

use crate::error::Pdf2PptxError;
use crate::geometry::Viewport;
use crate::output::DocumentMetadata;
use crate::pipeline::content::{interpret_page, num, ImageSource, PageContent};
use crate::pipeline::render::{render_pdf_pages, text_suppressed_copy, PageRender};
use crate::source::{
    DocumentSource, DrawOp, ImageLookup, ImageObject, PageSource, PixelData, RenderMode, TextRun,
};
use image::DynamicImage;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::{debug, info, warn};

/// A parsed PDF plus everything needed to rasterise it.
pub struct PdfDocument {
    doc: Document,
    bytes: Vec<u8>,
    password: Option<String>,
    path: PathBuf,
    /// Page object ids; index 0 is page 1.
    pages: Vec<ObjectId>,
    encrypted: bool,
    text_free: OnceLock<Result<Vec<u8>, String>>,
    /// Rasters rendered by [`DocumentSource::prepare_rasters`], not yet taken.
    rasters: Mutex<HashMap<(RenderMode, PageRender), DynamicImage>>,
}

impl PdfDocument {
    /// Parse `bytes`, decrypting with `password` (or the empty user password).
    pub fn load(bytes: Vec<u8>, password: Option<&str>, path: &Path) -> Result<Self, Pdf2PptxError> {
        let mut doc = Document::load_mem(&bytes).map_err(|e| {
            let detail = e.to_string();
            if detail.to_lowercase().contains("password") || detail.to_lowercase().contains("decrypt") {
                Pdf2PptxError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            } else {
                Pdf2PptxError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail,
                }
            }
        })?;

        let encrypted = doc.is_encrypted();
        if encrypted {
            doc.decrypt(password.unwrap_or(""))
                .map_err(|_| Pdf2PptxError::PasswordRequired {
                    path: path.to_path_buf(),
                })?;
            debug!("Decrypted {}", path.display());
        }

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        info!("PDF loaded: {} pages (version {})", pages.len(), doc.version);

        Ok(Self {
            doc,
            bytes,
            password: password.map(str::to_string),
            path: path.to_path_buf(),
            pages,
            encrypted,
            text_free: OnceLock::new(),
            rasters: Mutex::new(HashMap::new()),
        })
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Bytes of the text-free copy, built on first use.
    fn text_free_bytes(&self) -> Result<&[u8], Pdf2PptxError> {
        self.text_free
            .get_or_init(|| text_suppressed_copy(&self.doc).map_err(|e| e.to_string()))
            .as_deref()
            .map_err(|e| Pdf2PptxError::Internal(e.clone()))
    }

    fn render(&self, mode: RenderMode, requests: &[PageRender]) -> Result<Vec<DynamicImage>, Pdf2PptxError> {
        match mode {
            RenderMode::Full => render_pdf_pages(&self.bytes, self.password.as_deref(), requests),
            RenderMode::TextSuppressed => render_pdf_pages(self.text_free_bytes()?, None, requests),
        }
        .map_err(|e| match e {
            Pdf2PptxError::RasterisationFailed { page, detail } => Pdf2PptxError::RasterisationFailed {
                page,
                detail: format!("{} ({})", detail, self.path.display()),
            },
            other => other,
        })
    }

    fn take_raster(&self, mode: RenderMode, request: &PageRender) -> Option<DynamicImage> {
        self.rasters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(mode, *request))
    }

    fn page_id(&self, page_number: usize) -> Result<ObjectId, Pdf2PptxError> {
        page_number
            .checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .copied()
            .ok_or(Pdf2PptxError::PageOutOfRange {
                page: page_number,
                total: self.pages.len(),
            })
    }

    /// Page box (CropBox, else MediaBox) and rotation, following inheritance.
    fn page_box(&self, page_number: usize, page_id: ObjectId) -> Result<([f64; 4], i32), Pdf2PptxError> {
        let unavailable = |detail: &str| Pdf2PptxError::PageGeometryUnavailable {
            page: page_number,
            detail: detail.to_string(),
        };
        let page = self
            .doc
            .get_dictionary(page_id)
            .map_err(|e| unavailable(&e.to_string()))?;

        let rect = inherited(&self.doc, page, b"CropBox")
            .and_then(|o| rect_of(&self.doc, o))
            .or_else(|| inherited(&self.doc, page, b"MediaBox").and_then(|o| rect_of(&self.doc, o)))
            .ok_or_else(|| unavailable("no usable /CropBox or /MediaBox"))?;

        if (rect[2] - rect[0]).abs() < f64::EPSILON || (rect[3] - rect[1]).abs() < f64::EPSILON {
            return Err(unavailable("page box has zero area"));
        }

        let rotate = inherited(&self.doc, page, b"Rotate")
            .and_then(|o| deref_num(&self.doc, o))
            .map(|r| r as i32)
            .unwrap_or(0);

        Ok((rect, rotate.rem_euclid(360) / 90 * 90))
    }
}

impl DocumentSource for PdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn metadata(&self) -> DocumentMetadata {
        let info = self
            .doc
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|o| self.doc.dereference(o).ok())
            .and_then(|(_, o)| o.as_dict().ok());
        let field = |key: &[u8]| info.and_then(|d| d.get(key).ok()).and_then(text_string);

        let first_page = self.pages.first().and_then(|&id| {
            self.page_box(1, id)
                .ok()
                .map(|(rect, rot)| Viewport::reference(rect, rot).geometry())
        });

        DocumentMetadata {
            title: field(b"Title"),
            author: field(b"Author"),
            subject: field(b"Subject"),
            creator: field(b"Creator"),
            producer: field(b"Producer"),
            page_count: self.pages.len(),
            pdf_version: self.doc.version.clone(),
            first_page,
            is_encrypted: self.encrypted,
        }
    }

    fn page(&self, page_number: usize) -> Result<Box<dyn PageSource + '_>, Pdf2PptxError> {
        let id = self.page_id(page_number)?;
        let (page_box, rotation) = self.page_box(page_number, id)?;
        Ok(Box::new(PdfPage {
            owner: self,
            number: page_number,
            id,
            page_box,
            rotation,
            content: OnceCell::new(),
        }))
    }

    fn prepare_rasters(&self, page_numbers: &[usize], scale: f64, mode: RenderMode) -> Result<(), Pdf2PptxError> {
        let requests = page_numbers
            .iter()
            .map(|&n| {
                let (page_box, rotation) = self.page_box(n, self.page_id(n)?)?;
                Ok(raster_request(n, page_box, rotation, scale))
            })
            .collect::<Result<Vec<_>, Pdf2PptxError>>()?;
        if requests.is_empty() {
            return Ok(());
        }

        let images = self.render(mode, &requests)?;
        let mut rasters = self.rasters.lock().unwrap_or_else(PoisonError::into_inner);
        for (request, image) in requests.into_iter().zip(images) {
            rasters.insert((mode, request), image);
        }
        debug!("Prepared {} {:?} rasters at {}×", page_numbers.len(), mode, scale);
        Ok(())
    }
}

/// One page of a [`PdfDocument`].
pub struct PdfPage<'a> {
    owner: &'a PdfDocument,
    number: usize,
    id: ObjectId,
    page_box: [f64; 4],
    rotation: i32,
    content: OnceCell<PageContent>,
}

impl PdfPage<'_> {
    fn content(&self) -> Result<&PageContent, Pdf2PptxError> {
        if let Some(content) = self.content.get() {
            return Ok(content);
        }
        let doc = &self.owner.doc;
        let bytes = doc
            .get_page_content(self.id)
            .map_err(|e| Pdf2PptxError::ContentStream {
                page: self.number,
                detail: e.to_string(),
            })?;
        let resources = page_resources(doc, self.id);
        let parsed = interpret_page(doc, &bytes, resources).map_err(|e| Pdf2PptxError::ContentStream {
            page: self.number,
            detail: e.to_string(),
        })?;
        Ok(self.content.get_or_init(|| parsed))
    }
}

impl PageSource for PdfPage<'_> {
    fn page_number(&self) -> usize {
        self.number
    }

    fn viewport(&self) -> Viewport {
        Viewport::reference(self.page_box, self.rotation)
    }

    fn text_runs(&self) -> Result<Vec<TextRun>, Pdf2PptxError> {
        Ok(self.content()?.runs.clone())
    }

    fn draw_ops(&self) -> Result<Vec<DrawOp>, Pdf2PptxError> {
        Ok(self.content()?.ops.clone())
    }

    fn resolve_image(&self, name: &str) -> ImageLookup {
        let Ok(content) = self.content() else {
            return ImageLookup::Missing;
        };
        let doc = &self.owner.doc;
        match content.images.get(name) {
            Some(ImageSource::Inline(stream)) => ImageLookup::Ready(image_object(doc, stream)),
            Some(ImageSource::Object(id)) => match doc.get_object(*id).and_then(Object::as_stream) {
                Ok(stream) => ImageLookup::Ready(image_object(doc, stream)),
                Err(e) => {
                    warn!("Page {}: image '{}' unreadable: {}", self.number, name, e);
                    ImageLookup::Missing
                }
            },
            None => ImageLookup::Missing,
        }
    }

    fn rasterize(&self, scale: f64, mode: RenderMode) -> Result<DynamicImage, Pdf2PptxError> {
        let request = raster_request(self.number, self.page_box, self.rotation, scale);
        if let Some(image) = self.owner.take_raster(mode, &request) {
            return Ok(image);
        }
        self.owner
            .render(mode, &[request])?
            .pop()
            .ok_or_else(|| Pdf2PptxError::RasterisationFailed {
                page: self.number,
                detail: "pdfium returned no image".into(),
            })
    }
}

/// Pixel size of a page rendered at `scale`.
fn raster_request(page_number: usize, page_box: [f64; 4], rotation: i32, scale: f64) -> PageRender {
    let viewport = Viewport::new(page_box, rotation, scale);
    PageRender {
        page_number,
        width_px: viewport.width().round().max(1.0) as u32,
        height_px: viewport.height().round().max(1.0) as u32,
    }
}

/// Look up `key` on a page dictionary or any ancestor in the page tree.
fn inherited<'a>(doc: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut node = page;
    for _ in 0..32 {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").ok()?;
        node = doc.dereference(parent).ok()?.1.as_dict().ok()?;
    }
    None
}

/// Resources of a page, following inheritance.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let page = doc.get_dictionary(page_id).ok()?;
    let res = inherited(doc, page, b"Resources")?;
    doc.dereference(res).ok()?.1.as_dict().ok()
}

fn deref_num(doc: &Document, obj: &Object) -> Option<f64> {
    doc.dereference(obj).ok().and_then(|(_, o)| num(o))
}

fn rect_of(doc: &Document, obj: &Object) -> Option<[f64; 4]> {
    let arr = doc.dereference(obj).ok()?.1.as_array().ok()?;
    let vals: Vec<f64> = arr.iter().map(|o| deref_num(doc, o)).collect::<Option<_>>()?;
    match vals.as_slice() {
        [x1, y1, x2, y2] if [x1, y1, x2, y2].iter().all(|v| v.is_finite()) => Some([*x1, *y1, *x2, *y2]),
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, otherwise byte-per-char.
fn text_string(obj: &Object) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };
    let text = if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|p| u16::from_be_bytes([p[0], p[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| char::from(b)).collect()
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Build the image object for an image XObject stream.
///
/// Never fails: anything outside the supported encodings comes back as
/// [`PixelData::Unsupported`] naming what was found.
pub fn image_object(doc: &Document, stream: &Stream) -> ImageObject {
    let dict = &stream.dict;
    let dim = |key: &[u8]| {
        dict.get(key)
            .ok()
            .and_then(|o| deref_num(doc, o))
            .filter(|v| *v > 0.0)
            .map(|v| v as u32)
            .unwrap_or(0)
    };
    let width = dim(b"Width");
    let height = dim(b"Height");
    let unsupported = |what: String| ImageObject {
        width,
        height,
        pixels: PixelData::Unsupported(what),
    };

    if matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true))) {
        return unsupported("ImageMask".into());
    }

    let filters = filter_names(doc, dict);
    let pixels = match filters.as_slice() {
        [only] if only == "DCTDecode" => {
            match image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg) {
                Ok(img) if dict.has(b"SMask") => PixelData::Rgb24(img.to_rgb8().into_raw()),
                Ok(img) => PixelData::Bitmap(img),
                Err(e) => PixelData::Unsupported(format!("DCTDecode ({e})")),
            }
        }
        [] => raw_pixels(doc, dict, stream.content.clone(), width, height),
        fs if fs.iter().all(|f| f == "FlateDecode" || f == "LZWDecode") => match stream.decompressed_content() {
            Ok(raw) => raw_pixels(doc, dict, raw, width, height),
            Err(e) => PixelData::Unsupported(format!("{} ({e})", fs.join("+"))),
        },
        fs => PixelData::Unsupported(fs.join("+")),
    };

    let pixels = match pixels {
        PixelData::Rgb24(rgb) => apply_soft_mask(doc, dict, rgb, width, height),
        other => other,
    };

    ImageObject { width, height, pixels }
}

fn filter_names(doc: &Document, dict: &Dictionary) -> Vec<String> {
    let Some(filter) = dict.get(b"Filter").ok().and_then(|f| doc.dereference(f).ok()).map(|(_, f)| f) else {
        return Vec::new();
    };
    match filter {
        Object::Name(n) => vec![String::from_utf8_lossy(n).into_owned()],
        Object::Array(items) => items
            .iter()
            .filter_map(|i| i.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .collect(),
        _ => Vec::new(),
    }
}

/// Number of colour components for a colour space, if it is one we decode.
fn components(doc: &Document, dict: &Dictionary) -> Result<usize, String> {
    let Some(cs) = dict.get(b"ColorSpace").ok().and_then(|c| doc.dereference(c).ok()).map(|(_, c)| c) else {
        return Err("no ColorSpace".into());
    };
    let family = match cs {
        Object::Name(n) => n.as_slice(),
        Object::Array(items) => items.first().and_then(|i| i.as_name().ok()).unwrap_or_default(),
        _ => &[],
    };
    match family {
        b"DeviceRGB" | b"CalRGB" => Ok(3),
        b"DeviceGray" | b"CalGray" => Ok(1),
        b"DeviceCMYK" => Ok(4),
        b"ICCBased" => {
            let n = match cs {
                Object::Array(items) => items
                    .get(1)
                    .and_then(|s| doc.dereference(s).ok())
                    .and_then(|(_, s)| s.as_stream().ok())
                    .and_then(|s| s.dict.get(b"N").ok())
                    .and_then(|n| deref_num(doc, n)),
                _ => None,
            };
            match n {
                Some(n) if n == 1.0 || n == 3.0 || n == 4.0 => Ok(n as usize),
                _ => Err("ICCBased with unknown N".into()),
            }
        }
        other => Err(String::from_utf8_lossy(other).into_owned()),
    }
}

/// Unfiltered samples → packed RGB for 8-bit gray, RGB and CMYK.
fn raw_pixels(doc: &Document, dict: &Dictionary, raw: Vec<u8>, width: u32, height: u32) -> PixelData {
    let bpc = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| deref_num(doc, o))
        .unwrap_or(8.0) as u32;
    if bpc != 8 {
        return PixelData::Unsupported(format!("{bpc}-bit samples"));
    }
    let n = match components(doc, dict) {
        Ok(n) => n,
        Err(cs) => return PixelData::Unsupported(format!("colour space {cs}")),
    };
    let pixels = width as usize * height as usize;
    if raw.len() < pixels * n {
        // Let the extractor report the size mismatch.
        return PixelData::Rgb24(raw);
    }
    match n {
        3 => PixelData::Rgb24(raw),
        1 => PixelData::Rgb24(raw[..pixels].iter().flat_map(|&g| [g, g, g]).collect()),
        _ => PixelData::Rgb24(
            raw[..pixels * 4]
                .chunks_exact(4)
                .flat_map(|p| {
                    let k = 255 - u16::from(p[3]);
                    let ch = |c: u8| ((255 - u16::from(c)) * k / 255) as u8;
                    [ch(p[0]), ch(p[1]), ch(p[2])]
                })
                .collect(),
        ),
    }
}

/// Combine RGB samples with an 8-bit `/SMask` of the same size.
fn apply_soft_mask(doc: &Document, dict: &Dictionary, rgb: Vec<u8>, width: u32, height: u32) -> PixelData {
    let pixels = width as usize * height as usize;
    let mask = dict
        .get(b"SMask")
        .ok()
        .and_then(|m| doc.dereference(m).ok())
        .and_then(|(_, m)| m.as_stream().ok())
        .filter(|m| {
            let same = |key: &[u8], v: u32| {
                m.dict.get(key).ok().and_then(|o| deref_num(doc, o)) == Some(f64::from(v))
            };
            same(b"Width", width) && same(b"Height", height)
        })
        .and_then(|m| match filter_names(doc, &m.dict).as_slice() {
            [] => Some(m.content.clone()),
            _ => m.decompressed_content().ok(),
        })
        .filter(|alpha| alpha.len() >= pixels && rgb.len() >= pixels * 3);

    match mask {
        Some(alpha) => PixelData::Rgba32(
            rgb.chunks_exact(3)
                .zip(alpha.iter())
                .take(pixels)
                .flat_map(|(p, &a)| [p[0], p[1], p[2], a])
                .collect(),
        ),
        None => PixelData::Rgb24(rgb),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn ints(v: &[i64]) -> Vec<Object> {
        v.iter().map(|i| Object::Integer(*i)).collect()
    }

    fn one_page_pdf(content: &[u8], page_extra: Dictionary) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        for (k, v) in page_extra.iter() {
            page.set(k.clone(), v.clone());
        }
        let page_id = doc.add_object(page);
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
                "MediaBox" => ints(&[0, 0, 612, 792]),
            }),
        );
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Quarterly Review"),
        });
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn geometry_is_inherited_from_page_tree() {
        let pdf = PdfDocument::load(one_page_pdf(b"", dictionary! {}), None, Path::new("t.pdf")).unwrap();
        assert_eq!(pdf.page_count(), 1);
        let page = pdf.page(1).unwrap();
        let g = page.viewport().geometry();
        assert!((g.width - 8.5).abs() < 1e-9 && (g.height - 11.0).abs() < 1e-9);
    }

    #[test]
    fn crop_box_and_rotation_win() {
        let extra = dictionary! {
            "CropBox" => ints(&[0, 0, 720, 540]),
            "Rotate" => 90,
        };
        let pdf = PdfDocument::load(one_page_pdf(b"", extra), None, Path::new("t.pdf")).unwrap();
        let g = pdf.page(1).unwrap().viewport().geometry();
        assert!((g.width - 7.5).abs() < 1e-9 && (g.height - 10.0).abs() < 1e-9);
    }

    #[test]
    fn metadata_reads_info_dictionary() {
        let pdf = PdfDocument::load(one_page_pdf(b"", dictionary! {}), None, Path::new("t.pdf")).unwrap();
        let meta = pdf.metadata();
        assert_eq!(meta.title.as_deref(), Some("Quarterly Review"));
        assert_eq!(meta.page_count, 1);
        assert_eq!(meta.pdf_version, "1.7");
        assert!(!meta.is_encrypted);
        assert!(meta.first_page.is_some());
    }

    #[test]
    fn out_of_range_page_is_an_error() {
        let pdf = PdfDocument::load(one_page_pdf(b"", dictionary! {}), None, Path::new("t.pdf")).unwrap();
        assert!(matches!(
            pdf.page(2).err(),
            Some(Pdf2PptxError::PageOutOfRange { page: 2, total: 1 })
        ));
        assert!(pdf.page(0).is_err());
    }

    #[test]
    fn garbage_is_corrupt() {
        let err = PdfDocument::load(b"%PDF-1.7 garbage".to_vec(), None, Path::new("bad.pdf"))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Pdf2PptxError::CorruptPdf { .. } | Pdf2PptxError::PasswordRequired { .. }
        ));
    }

    #[test]
    fn gray_image_is_expanded_to_rgb() {
        let doc = Document::with_version("1.7");
        let stream = Stream::new(
            dictionary! {
                "Subtype" => "Image", "Width" => 2, "Height" => 1,
                "ColorSpace" => "DeviceGray", "BitsPerComponent" => 8,
            },
            vec![10, 200],
        );
        let img = image_object(&doc, &stream);
        match img.pixels {
            PixelData::Rgb24(rgb) => assert_eq!(rgb, vec![10, 10, 10, 200, 200, 200]),
            other => panic!("unexpected {:?}", other.kind()),
        }
    }

    #[test]
    fn unsupported_filters_and_depths_fail_closed() {
        let doc = Document::with_version("1.7");
        let jbig2 = Stream::new(
            dictionary! { "Subtype" => "Image", "Width" => 8, "Height" => 8, "Filter" => "JBIG2Decode" },
            vec![0; 8],
        );
        assert_eq!(image_object(&doc, &jbig2).pixels.kind(), "JBIG2Decode");

        let one_bit = Stream::new(
            dictionary! {
                "Subtype" => "Image", "Width" => 8, "Height" => 1,
                "ColorSpace" => "DeviceGray", "BitsPerComponent" => 1,
            },
            vec![0xAA],
        );
        assert_eq!(image_object(&doc, &one_bit).pixels.kind(), "1-bit samples");

        let indexed = Stream::new(
            dictionary! {
                "Subtype" => "Image", "Width" => 1, "Height" => 1, "BitsPerComponent" => 8,
                "ColorSpace" => vec![Object::Name(b"Indexed".to_vec())],
            },
            vec![0],
        );
        assert_eq!(image_object(&doc, &indexed).pixels.kind(), "colour space Indexed");
    }

    #[test]
    fn soft_mask_yields_rgba() {
        let mut doc = Document::with_version("1.7");
        let mask_id = doc.add_object(Stream::new(
            dictionary! {
                "Subtype" => "Image", "Width" => 1, "Height" => 1,
                "ColorSpace" => "DeviceGray", "BitsPerComponent" => 8,
            },
            vec![77],
        ));
        let stream = Stream::new(
            dictionary! {
                "Subtype" => "Image", "Width" => 1, "Height" => 1,
                "ColorSpace" => "DeviceRGB", "BitsPerComponent" => 8, "SMask" => mask_id,
            },
            vec![1, 2, 3],
        );
        match image_object(&doc, &stream).pixels {
            PixelData::Rgba32(px) => assert_eq!(px, vec![1, 2, 3, 77]),
            other => panic!("unexpected {:?}", other.kind()),
        }
    }

    #[test]
    fn jpeg_with_soft_mask_yields_rgba() {
        use crate::pipeline::encode::encode_jpeg;

        let mut doc = Document::with_version("1.7");
        let jpeg = encode_jpeg(&DynamicImage::new_rgb8(2, 2), 90).unwrap();
        let mask_id = doc.add_object(Stream::new(
            dictionary! {
                "Subtype" => "Image", "Width" => 2, "Height" => 2,
                "ColorSpace" => "DeviceGray", "BitsPerComponent" => 8,
            },
            vec![0, 64, 128, 255],
        ));
        let stream = Stream::new(
            dictionary! {
                "Subtype" => "Image", "Width" => 2, "Height" => 2,
                "ColorSpace" => "DeviceRGB", "BitsPerComponent" => 8,
                "Filter" => "DCTDecode", "SMask" => mask_id,
            },
            jpeg.clone(),
        );
        match image_object(&doc, &stream).pixels {
            PixelData::Rgba32(px) => {
                let alpha: Vec<u8> = px.chunks_exact(4).map(|p| p[3]).collect();
                assert_eq!(alpha, vec![0, 64, 128, 255]);
            }
            other => panic!("unexpected {:?}", other.kind()),
        }

        // Without a mask the decoded bitmap is passed through.
        let plain = Stream::new(
            dictionary! {
                "Subtype" => "Image", "Width" => 2, "Height" => 2,
                "ColorSpace" => "DeviceRGB", "BitsPerComponent" => 8, "Filter" => "DCTDecode",
            },
            jpeg,
        );
        assert!(matches!(image_object(&doc, &plain).pixels, PixelData::Bitmap(_)));
    }

    #[test]
    fn image_stored_directly_in_resources_resolves() {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"q 20 0 0 10 0 0 cm /Im0 Do Q".to_vec()));
        let image = Stream::new(
            dictionary! {
                "Type" => "XObject", "Subtype" => "Image", "Width" => 2, "Height" => 1,
                "ColorSpace" => "DeviceGray", "BitsPerComponent" => 8,
            },
            vec![0, 255],
        );
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => dictionary! { "Im0" => Object::Stream(image) } },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
                "MediaBox" => ints(&[0, 0, 612, 792]),
            }),
        );
        let pdf = PdfDocument {
            pages: vec![page_id],
            doc,
            bytes: Vec::new(),
            password: None,
            path: PathBuf::from("direct.pdf"),
            encrypted: false,
            text_free: OnceLock::new(),
            rasters: Mutex::new(HashMap::new()),
        };

        let page = pdf.page(1).unwrap();
        assert!(page
            .draw_ops()
            .unwrap()
            .contains(&DrawOp::PaintImage { name: "Im0".into() }));
        match page.resolve_image("Im0") {
            ImageLookup::Ready(img) => {
                assert_eq!((img.width, img.height), (2, 1));
                assert!(matches!(img.pixels, PixelData::Rgb24(ref rgb) if rgb == &vec![0, 0, 0, 255, 255, 255]));
            }
            _ => panic!("direct image stream did not resolve"),
        }
    }

    #[test]
    fn prepared_raster_is_taken_once() {
        let pdf = PdfDocument::load(one_page_pdf(b"", dictionary! {}), None, Path::new("t.pdf")).unwrap();
        pdf.prepare_rasters(&[], 2.0, RenderMode::TextSuppressed).unwrap();
        assert!(pdf.rasters.lock().unwrap().is_empty());

        let request = raster_request(1, [0.0, 0.0, 612.0, 792.0], 0, 2.0);
        assert_eq!((request.width_px, request.height_px), (1224, 1584));
        pdf.rasters.lock().unwrap().insert(
            (RenderMode::TextSuppressed, request),
            DynamicImage::new_rgb8(request.width_px, request.height_px),
        );

        let page = pdf.page(1).unwrap();
        let plate = page.rasterize(2.0, RenderMode::TextSuppressed).unwrap();
        assert_eq!((plate.width(), plate.height()), (1224, 1584));
        assert!(pdf.rasters.lock().unwrap().is_empty());
    }

    #[test]
    fn prepared_raster_is_keyed_by_mode_and_size() {
        let pdf = PdfDocument::load(one_page_pdf(b"", dictionary! {}), None, Path::new("t.pdf")).unwrap();
        let request = raster_request(1, [0.0, 0.0, 612.0, 792.0], 0, 2.0);
        pdf.rasters
            .lock()
            .unwrap()
            .insert((RenderMode::TextSuppressed, request), DynamicImage::new_rgb8(1, 1));

        assert!(pdf.take_raster(RenderMode::Full, &request).is_none());
        let other_scale = raster_request(1, [0.0, 0.0, 612.0, 792.0], 0, 3.0);
        assert!(pdf.take_raster(RenderMode::TextSuppressed, &other_scale).is_none());
        assert!(pdf.take_raster(RenderMode::TextSuppressed, &request).is_some());
    }

    #[test]
    fn interpreter_output_is_served_to_extractors() {
        let pdf_bytes = one_page_pdf(b"q 144 0 0 72 0 720 cm /Im0 Do Q", dictionary! {});
        let pdf = PdfDocument::load(pdf_bytes, None, Path::new("t.pdf")).unwrap();
        let page = pdf.page(1).unwrap();
        // /Im0 is not in the (empty) resources: the paint is dropped at interpretation.
        assert!(page.draw_ops().unwrap().iter().all(|op| !matches!(op, DrawOp::PaintImage { .. })));
        assert!(matches!(page.resolve_image("Im0"), ImageLookup::Missing));
        assert!(page.text_runs().unwrap().is_empty());
    }
}

//! Background plate rendering.
//!
//! The plate is the whole page rasterised at ≥2× the reference scale with
//! text-showing operators removed, so text exists only as editable boxes
//! on the slide. Everything else is baked in, including images that are
//! also extracted as separate pictures.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with process-global state. All calls happen on
//! the blocking pool (the page assembler runs each page there) and behind
//! [`PDFIUM_LOCK`], so concurrent pages in a batch render one at a time while
//! their lopdf work still overlaps.
//!
//! ## One session per batch
//!
//! Binding the library and parsing the document dominate the cost of a
//! single plate. [`render_pdf_pages`] does both once for a whole batch of
//! pages; the assembler asks the document to prepare each batch before its
//! pages run.

use crate::error::Pdf2PptxError;
use crate::pipeline::encode::encode_jpeg;
use crate::source::{PageSource, RenderMode};
use image::DynamicImage;
use lopdf::content::Content;
use lopdf::{Document, Object};
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use std::sync::Mutex;
use tracing::{debug, info};

/// Operators that paint glyphs.
const TEXT_SHOWING_OPERATORS: [&str; 4] = ["Tj", "TJ", "'", "\""];

static PDFIUM_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Render the text-suppressed plate of a page and encode it as JPEG.
pub fn render_background(
    page: &dyn PageSource,
    scale: f64,
    quality: u8,
) -> Result<Vec<u8>, Pdf2PptxError> {
    let image = page.rasterize(scale, RenderMode::TextSuppressed)?;
    debug!(
        "Page {}: plate {}×{} px at {}×",
        page.page_number(),
        image.width(),
        image.height(),
        scale
    );
    encode_jpeg(&image, quality).map_err(|e| Pdf2PptxError::RasterisationFailed {
        page: page.page_number(),
        detail: format!("JPEG encoding failed: {e}"),
    })
}

/// Bind to pdfium: `PDFIUM_LIB_PATH` first, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, Pdf2PptxError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(dir) if !dir.is_empty() => {
            debug!("Binding pdfium from PDFIUM_LIB_PATH={}", dir);
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
                .map_err(|e| Pdf2PptxError::PdfiumBindingFailed(format!("{dir}: {e}")))?
        }
        _ => Pdfium::bind_to_system_library()
            .map_err(|e| Pdf2PptxError::PdfiumBindingFailed(e.to_string()))?,
    };
    Ok(Pdfium::new(bindings))
}

/// One page to rasterise: 1-based page number and target pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRender {
    pub page_number: usize,
    pub width_px: u32,
    pub height_px: u32,
}

/// Rasterise pages of an in-memory PDF with a single binding and a single
/// document load. Each image is exactly `width_px` wide (height capped at
/// `height_px`); images come back in request order.
///
/// Blocking; call from the blocking pool. An empty request list never
/// touches pdfium.
pub fn render_pdf_pages(
    bytes: &[u8],
    password: Option<&str>,
    requests: &[PageRender],
) -> Result<Vec<DynamicImage>, Pdf2PptxError> {
    let Some(first) = requests.first() else {
        return Ok(Vec::new());
    };

    let _guard = PDFIUM_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| Pdf2PptxError::RasterisationFailed {
            page: first.page_number,
            detail: format!("pdfium could not open the document: {e:?}"),
        })?;
    let pages = document.pages();

    let mut images = Vec::with_capacity(requests.len());
    for request in requests {
        let fail = |detail: String| Pdf2PptxError::RasterisationFailed {
            page: request.page_number,
            detail,
        };

        let index = u16::try_from(request.page_number.saturating_sub(1))
            .map_err(|_| fail("page index exceeds u16 range".into()))?;
        let page = pages.get(index).map_err(|e| fail(format!("{e:?}")))?;

        let config = PdfRenderConfig::new()
            .set_target_width(request.width_px.max(1) as i32)
            .set_maximum_height(request.height_px.max(1) as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| fail(format!("{e:?}")))?;
        images.push(bitmap.as_image());
    }
    debug!("pdfium session rendered {} pages", images.len());
    Ok(images)
}

/// Remove every text-showing operator from a content stream.
pub fn strip_text_operators(content: &[u8]) -> Result<Vec<u8>, lopdf::Error> {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(content.to_vec());
    }
    let mut decoded = Content::decode(content)?;
    decoded
        .operations
        .retain(|op| !TEXT_SHOWING_OPERATORS.contains(&op.operator.as_str()));
    decoded.encode()
}

/// Serialise a copy of `doc` in which no page or form paints text.
///
/// Streams that cannot be decoded are left untouched.
pub fn text_suppressed_copy(doc: &Document) -> Result<Vec<u8>, Pdf2PptxError> {
    let mut copy = doc.clone();

    let page_ids: Vec<_> = copy.get_pages().into_values().collect();
    for page_id in page_ids {
        let Ok(content) = copy.get_page_content(page_id) else {
            continue;
        };
        match strip_text_operators(&content) {
            Ok(stripped) => {
                copy.change_page_content(page_id, stripped)
                    .map_err(|e| Pdf2PptxError::Internal(format!("rewrite page content: {e}")))?;
            }
            Err(e) => debug!("Page content not rewritten: {}", e),
        }
    }

    let mut forms = 0;
    for object in copy.objects.values_mut() {
        let Object::Stream(stream) = object else {
            continue;
        };
        let is_form = stream
            .dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .map(|n| n == b"Form")
            .unwrap_or(false);
        if !is_form {
            continue;
        }
        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        if let Ok(stripped) = strip_text_operators(&content) {
            stream.set_plain_content(stripped);
            forms += 1;
        }
    }

    let mut out = Vec::new();
    copy.save_to(&mut out)
        .map_err(|e| Pdf2PptxError::Internal(format!("serialise text-free copy: {e}")))?;
    info!("Built text-free copy for plates ({} forms rewritten, {} bytes)", forms, out.len());
    Ok(out)
}

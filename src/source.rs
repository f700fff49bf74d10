//! The seam between the conversion engine and a document backend.
//!
//! The engine never talks to a PDF library directly. It asks a
//! [`DocumentSource`] for pages, and each [`PageSource`] exposes exactly what
//! decomposition needs: a viewport, positioned text runs, a drawing-instruction
//! stream, image lookup and a rasterisation call. The production backend is
//! [`crate::pipeline::pdf::PdfDocument`]; tests plug in in-memory fakes.

use crate::error::Pdf2PptxError;
use crate::geometry::{AffineMatrix, Viewport};
use crate::output::DocumentMetadata;
use image::DynamicImage;

/// One run of text as reported by the backend, in page-native units.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    /// Text rendering matrix: font size and position live in here.
    pub transform: AffineMatrix,
    /// Advance width of the whole run in page-native units.
    pub width: f64,
    /// Fill colour, if the backend tracks it.
    pub color: Option<[u8; 3]>,
}

impl TextRun {
    pub fn new(text: impl Into<String>, transform: AffineMatrix, width: f64) -> Self {
        Self {
            text: text.into(),
            transform,
            width,
            color: None,
        }
    }
}

/// Drawing instructions the image extractor cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Save,
    Restore,
    /// Concatenate a matrix onto the current transform.
    Transform(AffineMatrix),
    /// Paint the named image into the unit square of the current transform.
    PaintImage { name: String },
}

/// Pixel payload of an image object.
///
/// The variants are the complete list of encodings the extractor knows how
/// to decode; backends report anything else as [`PixelData::Unsupported`].
#[derive(Debug, Clone)]
pub enum PixelData {
    /// Packed 8-bit RGB, `width * height * 3` bytes.
    Rgb24(Vec<u8>),
    /// Packed 8-bit RGBA, `width * height * 4` bytes.
    Rgba32(Vec<u8>),
    /// Already decoded by the backend.
    Bitmap(DynamicImage),
    /// Anything else; the string names the encoding for the log.
    Unsupported(String),
}

impl PixelData {
    pub fn kind(&self) -> &str {
        match self {
            PixelData::Rgb24(_) => "rgb24",
            PixelData::Rgba32(_) => "rgba32",
            PixelData::Bitmap(_) => "bitmap",
            PixelData::Unsupported(kind) => kind,
        }
    }
}

/// A resolved image object.
#[derive(Debug, Clone)]
pub struct ImageObject {
    pub width: u32,
    pub height: u32,
    pub pixels: PixelData,
}

/// Result of looking up an image by name.
#[derive(Debug, Clone)]
pub enum ImageLookup {
    Ready(ImageObject),
    /// The backend has not finished loading it; the extractor does not wait.
    Pending,
    Missing,
}

/// Rasteriser policy for the background plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// Everything the page draws.
    Full,
    /// Everything except text-painting operations.
    TextSuppressed,
}

/// One page of a document, scoped to a single decomposition.
pub trait PageSource {
    /// 1-based page number.
    fn page_number(&self) -> usize;

    /// Viewport at the reference scale (1 unit = 1/72 in).
    fn viewport(&self) -> Viewport;

    /// Text runs in source order.
    fn text_runs(&self) -> Result<Vec<TextRun>, Pdf2PptxError>;

    /// The drawing-instruction stream in source order.
    fn draw_ops(&self) -> Result<Vec<DrawOp>, Pdf2PptxError>;

    /// Look up an image painted by [`DrawOp::PaintImage`].
    fn resolve_image(&self, name: &str) -> ImageLookup;

    /// Render the full page at `scale` viewport units per point.
    fn rasterize(&self, scale: f64, mode: RenderMode) -> Result<DynamicImage, Pdf2PptxError>;
}

/// A paginated document.
pub trait DocumentSource: Send + Sync {
    fn page_count(&self) -> usize;

    fn metadata(&self) -> DocumentMetadata;

    /// Open a page by its 1-based number.
    fn page(&self, page_number: usize) -> Result<Box<dyn PageSource + '_>, Pdf2PptxError>;

    /// Rasterise a batch of pages up front so that the following
    /// [`PageSource::rasterize`] calls with the same scale and mode are cheap.
    ///
    /// Backends without a per-session cost keep the default no-op.
    fn prepare_rasters(&self, _page_numbers: &[usize], _scale: f64, _mode: RenderMode) -> Result<(), Pdf2PptxError> {
        Ok(())
    }
}

//! Output types: the layers of each page and the result of a conversion.

use crate::geometry::{PageGeometry, Rect};
use serde::Serialize;

/// An editable text box, in inches from the slide's top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextItem {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    /// Font size in points.
    pub font_size: f64,
    pub font_face: String,
    /// Hex RGB without `#`.
    pub color: String,
    /// Always 0: rotation is normalised away.
    pub rotation: f64,
}

impl TextItem {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }
}

/// A movable picture, in inches from the slide's top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageItem {
    /// PNG-encoded pixels.
    #[serde(skip)]
    pub data: Vec<u8>,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl ImageItem {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }
}

/// Everything needed to build one slide.
#[derive(Debug, Clone, Serialize)]
pub struct PageRecord {
    /// 1-based.
    pub page_number: usize,
    /// JPEG background plate with text suppressed.
    #[serde(skip)]
    pub background: Vec<u8>,
    pub geometry: PageGeometry,
    /// Source run order.
    pub text_items: Vec<TextItem>,
    /// Draw order.
    pub images: Vec<ImageItem>,
    pub notes: Option<String>,
    /// Runs and images dropped by recoverable extraction errors.
    pub skipped_items: usize,
}

/// Document-level metadata, readable without rendering anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
    /// Size of page 1, which also becomes the deck's canvas size.
    pub first_page: Option<PageGeometry>,
    pub is_encrypted: bool,
}

/// Counters for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub text_items: usize,
    pub image_items: usize,
    pub skipped_items: usize,
    pub pages_with_notes: usize,
    pub deck_bytes: usize,
    pub total_duration_ms: u64,
    pub decompose_duration_ms: u64,
    pub notes_duration_ms: u64,
}

impl ConversionStats {
    pub fn from_pages(pages: &[PageRecord]) -> Self {
        Self {
            total_pages: pages.len(),
            text_items: pages.iter().map(|p| p.text_items.len()).sum(),
            image_items: pages.iter().map(|p| p.images.len()).sum(),
            skipped_items: pages.iter().map(|p| p.skipped_items).sum(),
            pages_with_notes: pages
                .iter()
                .filter(|p| p.notes.as_deref().is_some_and(|n| !n.trim().is_empty()))
                .count(),
            ..Default::default()
        }
    }
}

/// The finished conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// The `.pptx` package.
    #[serde(skip)]
    pub deck: Vec<u8>,
    pub pages: Vec<PageRecord>,
    pub metadata: DocumentMetadata,
    pub stats: ConversionStats,
}

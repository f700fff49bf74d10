//! # edgequake-pdf2pptx
//!
//! Convert PDF documents into layered, editable PowerPoint decks.
//!
//! ## Why this crate?
//!
//! Pasting a page raster into a slide gives a faithful but dead picture:
//! nothing can be retyped or moved. This crate instead splits every page
//! into three layers: a high-resolution background plate with all text
//! suppressed, the page's raster images as movable pictures, and every text
//! run as an editable text box positioned where it was drawn. Stacked in
//! that order the slide looks like the page, yet every word can be edited.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file, URL, or in-memory bytes
//!  ├─ 2. Decompose  per page, in bounded batches (spawn_blocking)
//!  │     ├─ text     content-stream text runs → positioned text boxes
//!  │     ├─ images   image XObjects → PNG pictures with bounding boxes
//!  │     └─ plate    pdfium render of a text-free copy → JPEG
//!  ├─ 3. Notes      optional speaker notes from a vision LLM
//!  └─ 4. Deck       one slide per page, canvas sized from page 1
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2pptx::{convert_to_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().batch_size(3).build()?;
//!     let stats = convert_to_file("slides.pdf", "slides.pptx", &config).await?;
//!     eprintln!("{} slides, {} text boxes, {} pictures",
//!         stats.total_pages, stats.text_items, stats.image_items);
//!     Ok(())
//! }
//! ```
//!
//! ## Speaker Notes
//!
//! Enable with `.notes(true)`. The provider is taken from the config, then
//! `EDGEQUAKE_LLM_PROVIDER`/`EDGEQUAKE_MODEL`, then whichever API key is
//! present (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `GEMINI_API_KEY`, ...).
//! Failed notes never fail the conversion; the slide just gets none.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2pptx` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ```toml
//! edgequake-pdf2pptx = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod deck;
pub mod error;
pub mod geometry;
pub mod output;
pub mod pipeline;
pub mod pptx;
pub mod progress;
pub mod prompts;
pub mod source;
pub mod transform;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, NotesConfig};
pub use convert::{
    convert, convert_document, convert_from_bytes, convert_sync, convert_to_file, default_output_path, inspect,
};
pub use deck::assemble_deck;
pub use error::{ExtractError, NotesError, Pdf2PptxError};
pub use geometry::{AffineMatrix, PageGeometry, Rect, Viewport};
pub use output::{ConversionOutput, ConversionStats, DocumentMetadata, ImageItem, PageRecord, TextItem};
pub use pipeline::llm::NotesService;
pub use pptx::{PptxDeck, SlideSink};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use source::{DocumentSource, DrawOp, ImageLookup, ImageObject, PageSource, PixelData, RenderMode, TextRun};

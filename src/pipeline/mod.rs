//! Pipeline stages for PDF-to-PPTX conversion.
//!
//! Each submodule implements one step. The extractors only see the
//! [`crate::source`] traits, so the lopdf/pdfium backend can be swapped for
//! an in-memory fake in tests without touching them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ pdf ──▶ page ──┬─▶ text    (editable boxes)
//! (path/URL) (lopdf)       ├─▶ images  (movable pictures)
//!                          └─▶ render  (text-free plate, pdfium)
//!                 ──▶ llm (optional notes) ──▶ deck
//! ```
//!
//! 1. [`input`]   — read the local file or download the URL into memory
//! 2. [`pdf`]     — lopdf document: geometry, content interpretation via
//!    [`content`] and [`fonts`], image XObjects
//! 3. [`page`]    — per-page assembly in bounded batches on the blocking pool
//! 4. [`text`], [`images`], [`render`] — the three layers of a slide
//! 5. [`encode`]  — PNG/JPEG/base64 artifacts
//! 6. [`llm`]     — optional speaker notes with bounded retry; the only
//!    stage with network I/O besides URL download
//! 7. [`postprocess`] — plain-text cleanup of generated notes

pub mod content;
pub mod encode;
pub mod fonts;
pub mod images;
pub mod input;
pub mod llm;
pub mod page;
pub mod pdf;
pub mod postprocess;
pub mod render;
pub mod text;

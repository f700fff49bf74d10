//! Conversion entry points.
//!
//! Every public function funnels into [`convert_document`], which runs the
//! engine over any [`DocumentSource`]: decompose pages in batches, optionally
//! annotate them with speaker notes, then assemble the deck. Either a whole
//! deck comes back or a single error does; nothing is written on failure.

use crate::config::ConversionConfig;
use crate::deck::assemble_deck;
use crate::error::Pdf2PptxError;
use crate::output::{ConversionOutput, ConversionStats, DocumentMetadata};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::llm::{annotate_pages, resolve_provider, LlmNotesService, NotesService, TokioSleeper};
use crate::pipeline::page::decompose_document;
use crate::pipeline::pdf::PdfDocument;
use crate::pptx::{write_atomic, PptxDeck, SlideSink};
use crate::source::DocumentSource;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Subject written into the deck's document properties.
pub const DECK_SUBJECT: &str = "Converted from PDF via AI-Powered Converter";

/// Convert a PDF file or URL to a layered PPTX deck.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str` — Local file path or HTTP/HTTPS URL to a PDF
/// * `config` — Conversion configuration
///
/// # Errors
/// Returns `Err(Pdf2PptxError)` for input problems, unreadable page
/// geometry or content, render failures, a missing notes provider when
/// notes are enabled, and deck assembly failures. Skipped text runs and
/// images, and failed notes, are not errors.
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PptxError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    convert_resolved(resolved, config).await
}

/// Convert a PDF and write the deck to `output_path`.
///
/// Uses atomic write (temp file + rename) so a failed run never leaves a
/// partial file behind.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Pdf2PptxError> {
    let output = convert(input_str, config).await?;
    let path = output_path.as_ref().to_path_buf();
    let deck = output.deck;
    tokio::task::spawn_blocking(move || write_atomic(&path, &deck))
        .await
        .map_err(|e| Pdf2PptxError::Internal(format!("write task failed: {e}")))??;
    Ok(output.stats)
}

/// Convert PDF bytes already in memory.
///
/// The deck title defaults to "document" unless `config.title` is set.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2pptx::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("slides.pdf")?;
/// let output = convert_from_bytes(&bytes, &ConversionConfig::default()).await?;
/// std::fs::write("slides.pptx", &output.deck)?;
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PptxError> {
    let resolved = input::from_bytes(bytes.to_vec(), "document.pdf")?;
    convert_resolved(resolved, config).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PptxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2PptxError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Read PDF metadata without rendering anything.
///
/// Does not need pdfium or an LLM provider.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, Pdf2PptxError> {
    let resolved = input::resolve_input(input_str.as_ref(), 120).await?;
    let document = open_document(resolved, None).await?;
    Ok(document.metadata())
}

/// Run the conversion engine over any document source.
///
/// `notes` is consulted only when `config.notes.enabled` is set; passing
/// `None` with notes enabled leaves every page without notes. The deck
/// title is `config.title`, else the document's own title, else
/// "Presentation".
pub async fn convert_document(
    source: Arc<dyn DocumentSource>,
    config: &ConversionConfig,
    notes: Option<&dyn NotesService>,
) -> Result<ConversionOutput, Pdf2PptxError> {
    let total_start = Instant::now();
    let metadata = source.metadata();
    let total_pages = source.page_count();
    info!("Document has {} pages", total_pages);

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total_pages);
    }

    // ── Decompose ────────────────────────────────────────────────────────
    let decompose_start = Instant::now();
    let mut pages = decompose_document(Arc::clone(&source), config).await?;
    let decompose_duration_ms = decompose_start.elapsed().as_millis() as u64;

    // ── Notes ────────────────────────────────────────────────────────────
    let notes_start = Instant::now();
    match (config.notes.enabled, notes) {
        (true, Some(service)) => annotate_pages(&mut pages, service, &TokioSleeper, config).await,
        (true, None) => warn!("Speaker notes enabled but no notes service supplied"),
        _ => {}
    }
    let notes_duration_ms = notes_start.elapsed().as_millis() as u64;

    // ── Deck ─────────────────────────────────────────────────────────────
    let title = config
        .title
        .clone()
        .or_else(|| metadata.title.clone())
        .unwrap_or_else(|| "Presentation".to_string());
    let mut deck = PptxDeck::new(title, DECK_SUBJECT);
    let slide_count = assemble_deck(&pages, &mut deck, config)?;
    let deck_bytes = deck.finish()?;

    let stats = ConversionStats {
        deck_bytes: deck_bytes.len(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        decompose_duration_ms,
        notes_duration_ms,
        ..ConversionStats::from_pages(&pages)
    };

    info!(
        "Conversion complete: {} slides, {} text boxes, {} pictures, {} skipped, {}ms",
        slide_count, stats.text_items, stats.image_items, stats.skipped_items, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total_pages, slide_count);
    }

    Ok(ConversionOutput {
        deck: deck_bytes,
        pages,
        metadata,
        stats,
    })
}

/// Default output path: `<input stem>.pptx` in the current directory.
pub fn default_output_path(input_str: &str) -> PathBuf {
    let name = if input::is_url(input_str) {
        reqwest::Url::parse(input_str)
            .ok()
            .and_then(|u| u.path_segments().and_then(|mut s| s.next_back().map(str::to_string)))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "downloaded.pdf".to_string())
    } else {
        Path::new(input_str)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string())
    };
    PathBuf::from(format!("{}.pptx", input::file_stem(&name)))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn convert_resolved(
    resolved: ResolvedInput,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PptxError> {
    // Resolve the provider before any page work so a missing key fails fast.
    let service = if config.notes.enabled {
        let provider = resolve_provider(&config.notes)?;
        info!("Speaker notes enabled");
        Some(LlmNotesService::new(provider, &config.notes))
    } else {
        None
    };

    let mut config = config.clone();
    if config.title.is_none() {
        config.title = Some(resolved.stem().to_string());
    }

    let document = open_document(resolved, config.password.clone()).await?;
    convert_document(
        Arc::new(document),
        &config,
        service.as_ref().map(|s| s as &dyn NotesService),
    )
    .await
}

/// Parse the PDF on the blocking pool.
async fn open_document(resolved: ResolvedInput, password: Option<String>) -> Result<PdfDocument, Pdf2PptxError> {
    tokio::task::spawn_blocking(move || PdfDocument::load(resolved.bytes, password.as_deref(), &resolved.origin))
        .await
        .map_err(|e| Pdf2PptxError::Internal(format!("spawn_blocking: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_uses_input_stem() {
        assert_eq!(default_output_path("decks/Q3 Review.PDF"), PathBuf::from("Q3 Review.pptx"));
        assert_eq!(default_output_path("notes.txt"), PathBuf::from("notes.txt.pptx"));
        assert_eq!(
            default_output_path("https://example.com/files/report.pdf?x=1"),
            PathBuf::from("report.pptx")
        );
    }

    #[tokio::test]
    async fn bytes_without_pdf_magic_are_rejected() {
        let err = convert_from_bytes(b"PK\x03\x04zip", &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2PptxError::NotAPdf { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = inspect("/nonexistent/deck.pdf").await.unwrap_err();
        assert!(matches!(err, Pdf2PptxError::FileNotFound { .. }));
    }
}

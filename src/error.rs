//! Error types for the edgequake-pdf2pptx library.
//!
//! Three error types mirror the three ways a conversion can go wrong:
//!
//! * [`Pdf2PptxError`] — **Fatal**: the deck cannot be produced at all
//!   (bad input file, unreadable page geometry, render failure, deck write
//!   failure). Returned as `Err(Pdf2PptxError)` from the `convert*`
//!   functions. No partial deck is ever written alongside one of these.
//!
//! * [`ExtractError`] — **Page-local**: a single text run or image could not
//!   be extracted. The page assembler logs it and moves on to the next
//!   instruction; it never escapes a page.
//!
//! * [`NotesError`] — **Notes service**: the optional speaker-notes call
//!   failed. Retryable variants are retried with backoff, everything ends as
//!   an empty note rather than an aborted conversion.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2pptx library.
#[derive(Debug, Error)]
pub enum Pdf2PptxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none (or a wrong one) was provided.
    #[error("PDF '{path}' is encrypted and could not be opened.\nProvide the password with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// The page box of a page could not be read.
    #[error("Cannot read the geometry of page {page}: {detail}")]
    PageGeometryUnavailable { page: usize, detail: String },

    /// A page number outside `1..=total` was requested.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// The page content could not be decoded into drawing instructions.
    #[error("Content stream of page {page} is unreadable: {detail}")]
    ContentStream { page: usize, detail: String },

    /// pdfium returned an error while rasterising the background plate.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Notes errors ──────────────────────────────────────────────────────
    /// Speaker notes were requested but no provider could be configured.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The slide deck could not be assembled or serialised.
    #[error("Slide deck assembly failed: {0}")]
    DeckAssembly(String),

    /// Could not create or write the output `.pptx` file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Background plates are rendered with PDFium. You can:\n\
  • Install libpdfium system-wide so the dynamic loader finds it.\n\
  • Set PDFIUM_LIB_PATH=/path/to/dir-containing-libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<zip::result::ZipError> for Pdf2PptxError {
    fn from(e: zip::result::ZipError) -> Self {
        Pdf2PptxError::DeckAssembly(format!("zip: {e}"))
    }
}

/// A recoverable failure while extracting one text run or one image.
///
/// Logged and skipped by the page assembler.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractError {
    /// The painted image name does not resolve to an image object.
    #[error("image '{name}' could not be resolved")]
    ImageUnresolved { name: String },

    /// The image reports a zero width or height.
    #[error("image '{name}' has degenerate size {width}x{height}")]
    EmptyImage { name: String, width: u32, height: u32 },

    /// The pixel encoding is outside the supported set.
    #[error("image '{name}' uses an unsupported encoding: {encoding}")]
    UnsupportedEncoding { name: String, encoding: String },

    /// The pixel buffer length does not match width × height × channels.
    #[error("image '{name}' buffer holds {actual} bytes, expected {expected}")]
    BufferSize {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Decoding or re-encoding the image failed.
    #[error("image '{name}' failed to decode: {detail}")]
    Decode { name: String, detail: String },

    /// A text run could not be placed.
    #[error("text run '{text}' is malformed: {detail}")]
    MalformedRun { text: String, detail: String },
}

/// Failure reported by the speaker-notes service.
///
/// Rate-limit and overload responses are transient and retried; anything
/// else degrades to an empty note straight away.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotesError {
    /// HTTP 429 or a provider-specific quota message.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// HTTP 503 / "overloaded" from the provider.
    #[error("service overloaded: {0}")]
    Overloaded(String),

    /// Any other failure (auth, bad request, network).
    #[error("{0}")]
    Other(String),
}

impl NotesError {
    /// Whether the retry loop should try again after backing off.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NotesError::RateLimited(_) | NotesError::Overloaded(_))
    }

    /// Classify a provider error message.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("429")
            || lower.contains("rate limit")
            || lower.contains("ratelimit")
            || lower.contains("resource_exhausted")
            || lower.contains("too many requests")
        {
            NotesError::RateLimited(message)
        } else if lower.contains("503")
            || lower.contains("overloaded")
            || lower.contains("service unavailable")
        {
            NotesError::Overloaded(message)
        } else {
            NotesError::Other(message)
        }
    }
}

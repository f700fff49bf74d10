//! Configuration types for PDF-to-PPTX conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Speaker-notes generation has its own
//! [`NotesConfig`] nested inside it because it is optional and pulls in an
//! LLM provider that the rest of the pipeline never touches.

use crate::error::Pdf2PptxError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for a PDF-to-PPTX conversion.
///
/// # Example
/// ```rust
/// use edgequake_pdf2pptx::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .batch_size(4)
///     .background_scale(3.0)
///     .font_face("Arial")
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_size, 4);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Pages decomposed at the same time. Default: 3.
    ///
    /// Every page in flight holds a full-page raster at `background_scale`,
    /// so this bounds peak memory. It is a resource limit, not a speed knob.
    pub batch_size: usize,

    /// Oversampling of the background plate relative to 72 DPI. Range: 2.0–4.0. Default: 2.0.
    pub background_scale: f64,

    /// JPEG quality of the background plate. Range: 1–100. Default: 85.
    pub background_quality: u8,

    /// Font face applied to every text box. Default: "Meiryo UI".
    pub font_face: String,

    /// Extra width in inches added to each text box so rounding never wraps a line. Default: 0.1.
    pub text_width_padding: f64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Deck title. If None, derived from the input file name.
    pub title: Option<String>,

    /// Speaker-notes generation. Disabled by default.
    pub notes: NotesConfig,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Progress events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            background_scale: 2.0,
            background_quality: 85,
            font_face: "Meiryo UI".to_string(),
            text_width_padding: 0.1,
            password: None,
            title: None,
            notes: NotesConfig::default(),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("batch_size", &self.batch_size)
            .field("background_scale", &self.background_scale)
            .field("background_quality", &self.background_quality)
            .field("font_face", &self.font_face)
            .field("text_width_padding", &self.text_width_padding)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("title", &self.title)
            .field("notes", &self.notes)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Speaker-notes settings.
#[derive(Clone)]
pub struct NotesConfig {
    /// Generate notes at all. Default: false.
    pub enabled: bool,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// LLM provider name (e.g. "openai", "gemini", "ollama").
    pub provider_name: Option<String>,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// Retries after a rate-limit or overload response. Default: 3.
    pub max_retries: u32,

    /// First retry delay in milliseconds; doubles per attempt. Default: 2000 (2 s → 4 s → 8 s).
    pub retry_backoff_ms: u64,

    /// Pause between consecutive pages' requests in milliseconds. Default: 1000.
    pub pacing_ms: u64,

    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens per note. Default: 1024.
    pub max_tokens: usize,

    /// Custom prompt. If None, uses [`crate::prompts::DEFAULT_NOTES_PROMPT`].
    pub system_prompt: Option<String>,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: None,
            provider_name: None,
            model: None,
            max_retries: 3,
            retry_backoff_ms: 2000,
            pacing_ms: 1000,
            temperature: 0.3,
            max_tokens: 1024,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for NotesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotesConfig")
            .field("enabled", &self.enabled)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("pacing_ms", &self.pacing_ms)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n;
        self
    }

    pub fn background_scale(mut self, scale: f64) -> Self {
        self.config.background_scale = scale;
        self
    }

    pub fn background_quality(mut self, quality: u8) -> Self {
        self.config.background_quality = quality.clamp(1, 100);
        self
    }

    pub fn font_face(mut self, face: impl Into<String>) -> Self {
        self.config.font_face = face.into();
        self
    }

    pub fn text_width_padding(mut self, inches: f64) -> Self {
        self.config.text_width_padding = inches;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn notes(mut self, enabled: bool) -> Self {
        self.config.notes.enabled = enabled;
        self
    }

    pub fn notes_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.notes.provider = Some(provider);
        self
    }

    pub fn notes_provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.notes.provider_name = Some(name.into());
        self
    }

    pub fn notes_model(mut self, model: impl Into<String>) -> Self {
        self.config.notes.model = Some(model.into());
        self
    }

    pub fn notes_max_retries(mut self, n: u32) -> Self {
        self.config.notes.max_retries = n;
        self
    }

    pub fn notes_retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.notes.retry_backoff_ms = ms;
        self
    }

    pub fn notes_pacing_ms(mut self, ms: u64) -> Self {
        self.config.notes.pacing_ms = ms;
        self
    }

    pub fn notes_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.notes.system_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2PptxError> {
        let c = &self.config;
        if c.batch_size == 0 {
            return Err(Pdf2PptxError::InvalidConfig(
                "Batch size must be ≥ 1".into(),
            ));
        }
        if !(2.0..=4.0).contains(&c.background_scale) {
            return Err(Pdf2PptxError::InvalidConfig(format!(
                "Background scale must be 2.0–4.0, got {}",
                c.background_scale
            )));
        }
        if !c.text_width_padding.is_finite() || c.text_width_padding < 0.0 {
            return Err(Pdf2PptxError::InvalidConfig(format!(
                "Text width padding must be a non-negative number of inches, got {}",
                c.text_width_padding
            )));
        }
        if c.font_face.trim().is_empty() {
            return Err(Pdf2PptxError::InvalidConfig(
                "Font face must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

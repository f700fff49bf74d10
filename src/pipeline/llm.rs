//! Speaker notes: send each slide's plate to a vision model, get plain text.
//!
//! This module owns the retry loop and the call pacing. Prompt wording lives
//! in [`crate::prompts`]; text cleanup lives in [`crate::pipeline::postprocess`].
//!
//! ## Retry Strategy
//!
//! Rate-limit and overload responses back off `retry_backoff_ms * 2^(attempt-1)`,
//! so the default 2 s base with 3 retries waits 2 s → 4 s → 8 s. After the
//! last retry, or on any other error, the note is empty. Notes never abort a
//! conversion.
//!
//! The clock is injected through [`Sleeper`] so tests observe the exact
//! delay sequence without waiting for it.

use crate::config::{ConversionConfig, NotesConfig};
use crate::error::{NotesError, Pdf2PptxError};
use crate::output::PageRecord;
use crate::pipeline::encode::to_image_data;
use crate::pipeline::postprocess::clean_notes;
use crate::prompts::{notes_user_message, DEFAULT_NOTES_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Model used when a provider is named without a model.
const DEFAULT_NOTES_MODEL: &str = "gpt-4.1-nano";

/// Produces speaker notes for one slide image.
pub trait NotesService: Send + Sync {
    /// `image` is the JPEG background plate of 1-based `page`.
    fn generate<'a>(&'a self, image: &'a [u8], page: usize) -> BoxFuture<'a, Result<String, NotesError>>;
}

/// Waits between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(notes: &NotesConfig) -> Self {
        Self {
            max_retries: notes.max_retries,
            backoff_ms: notes.retry_backoff_ms,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// [`NotesService`] over any edgequake-llm provider.
pub struct LlmNotesService {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
}

impl LlmNotesService {
    pub fn new(provider: Arc<dyn LLMProvider>, notes: &NotesConfig) -> Self {
        Self {
            provider,
            system_prompt: notes
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_NOTES_PROMPT.to_string()),
            options: CompletionOptions {
                temperature: Some(notes.temperature),
                max_tokens: Some(notes.max_tokens),
                ..Default::default()
            },
        }
    }
}

impl NotesService for LlmNotesService {
    fn generate<'a>(&'a self, image: &'a [u8], page: usize) -> BoxFuture<'a, Result<String, NotesError>> {
        Box::pin(async move {
            let messages = vec![
                ChatMessage::system(&self.system_prompt),
                ChatMessage::user_with_images(&notes_user_message(page), vec![to_image_data(image)]),
            ];
            let response = self
                .provider
                .chat(&messages, Some(&self.options))
                .await
                .map_err(|e| NotesError::classify(e.to_string()))?;
            debug!(
                "Page {}: notes used {} input / {} output tokens",
                page, response.prompt_tokens, response.completion_tokens
            );
            Ok(response.content)
        })
    }
}

/// Generate the note for one page, retrying transient failures.
///
/// Always returns a string; an empty one means the service gave up.
pub async fn generate_notes(
    service: &dyn NotesService,
    sleeper: &dyn Sleeper,
    image: &[u8],
    page: usize,
    policy: RetryPolicy,
) -> String {
    let mut attempt = 0;
    loop {
        match service.generate(image, page).await {
            Ok(text) => return clean_notes(&text),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay(attempt);
                warn!(
                    "Page {}: notes {}; retry {}/{} in {}ms",
                    page,
                    e,
                    attempt,
                    policy.max_retries,
                    delay.as_millis()
                );
                sleeper.sleep(delay).await;
            }
            Err(e) => {
                warn!("Page {}: notes unavailable after {} retries: {}", page, attempt, e);
                return String::new();
            }
        }
    }
}

/// Attach notes to every page, one request at a time in page order.
pub async fn annotate_pages(
    pages: &mut [PageRecord],
    service: &dyn NotesService,
    sleeper: &dyn Sleeper,
    config: &ConversionConfig,
) {
    let policy = RetryPolicy::from_config(&config.notes);
    let pacing = Duration::from_millis(config.notes.pacing_ms);
    let total = pages.len();

    for (i, page) in pages.iter_mut().enumerate() {
        if i > 0 && !pacing.is_zero() {
            sleeper.sleep(pacing).await;
        }
        let notes = generate_notes(service, sleeper, &page.background, page.page_number, policy).await;
        if let Some(ref cb) = config.progress_callback {
            cb.on_notes_complete(page.page_number, total, notes.len());
        }
        page.notes = Some(notes);
    }

    let with_notes = pages
        .iter()
        .filter(|p| p.notes.as_deref().is_some_and(|n| !n.is_empty()))
        .count();
    info!("Speaker notes generated for {}/{} pages", with_notes, total);
}

/// Resolve the notes provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`notes.provider`), used as-is.
/// 2. **Named provider + model** (`notes.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **Auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(notes: &NotesConfig) -> Result<Arc<dyn LLMProvider>, Pdf2PptxError> {
    if let Some(ref provider) = notes.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = notes.provider_name {
        let model = notes.model.as_deref().unwrap_or(DEFAULT_NOTES_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2PptxError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "Speaker notes need a vision-capable LLM provider.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;
    Ok(llm_provider)
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Pdf2PptxError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| Pdf2PptxError::ProviderNotConfigured {
        provider: name.to_string(),
        hint: format!("{e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PageGeometry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fails with the given errors in order, then succeeds.
    struct Scripted {
        failures: Mutex<Vec<NotesError>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(failures: Vec<NotesError>) -> Self {
            Self {
                failures: Mutex::new(failures),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl NotesService for Scripted {
        fn generate<'a>(&'a self, _image: &'a [u8], page: usize) -> BoxFuture<'a, Result<String, NotesError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut f = self.failures.lock().unwrap();
                if f.is_empty() {
                    None
                } else {
                    Some(f.remove(0))
                }
            };
            Box::pin(async move {
                match next {
                    Some(e) => Err(e),
                    None => Ok(format!("**Slide {page}** summary\r\n")),
                }
            })
        }
    }

    #[derive(Default)]
    struct RecordingSleeper(Mutex<Vec<u128>>);

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
            self.0.lock().unwrap().push(duration.as_millis());
            Box::pin(async {})
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            backoff_ms: 2000,
        }
    }

    #[test]
    fn delays_double() {
        let p = policy();
        assert_eq!(p.delay(1), Duration::from_secs(2));
        assert_eq!(p.delay(2), Duration::from_secs(4));
        assert_eq!(p.delay(3), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn persistent_rate_limit_degrades_to_empty_after_bound() {
        let failures = (0..10).map(|_| NotesError::RateLimited("429".into())).collect();
        let service = Scripted::new(failures);
        let sleeper = RecordingSleeper::default();

        let notes = generate_notes(&service, &sleeper, b"jpeg", 1, policy()).await;
        assert_eq!(notes, "");
        assert_eq!(service.calls.load(Ordering::SeqCst), 4);
        assert_eq!(*sleeper.0.lock().unwrap(), vec![2000, 4000, 8000]);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let service = Scripted::new(vec![NotesError::Other("invalid api key".into())]);
        let sleeper = RecordingSleeper::default();
        let notes = generate_notes(&service, &sleeper, b"jpeg", 2, policy()).await;
        assert_eq!(notes, "");
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transient_then_success_is_cleaned() {
        let service = Scripted::new(vec![NotesError::Overloaded("503".into())]);
        let sleeper = RecordingSleeper::default();
        let notes = generate_notes(&service, &sleeper, b"jpeg", 7, policy()).await;
        assert_eq!(notes, "Slide 7 summary");
        assert_eq!(*sleeper.0.lock().unwrap(), vec![2000]);
    }

    #[tokio::test]
    async fn pages_are_paced_in_order() {
        let mut pages: Vec<PageRecord> = (1..=3)
            .map(|n| PageRecord {
                page_number: n,
                background: vec![0xFF, 0xD8],
                geometry: PageGeometry { width: 10.0, height: 7.5 },
                text_items: vec![],
                images: vec![],
                notes: None,
                skipped_items: 0,
            })
            .collect();
        let service = Scripted::new(vec![]);
        let sleeper = RecordingSleeper::default();
        annotate_pages(&mut pages, &service, &sleeper, &ConversionConfig::default()).await;

        assert_eq!(*sleeper.0.lock().unwrap(), vec![1000, 1000]);
        assert_eq!(pages[2].notes.as_deref(), Some("Slide 3 summary"));
    }
}

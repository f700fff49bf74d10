//! Progress-callback trait for conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline decomposes pages, generates notes and assembles
//! the deck.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2pptx::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct BatchCounter {
//!     done: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for BatchCounter {
//!     fn on_batch_complete(&self, pages_done: usize, total_pages: usize) {
//!         self.done.store(pages_done, Ordering::SeqCst);
//!         eprintln!("{pages_done}/{total_pages} pages decomposed");
//!     }
//! }
//!
//! let counter = Arc::new(BatchCounter { done: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it makes progress.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_page_decomposed` runs on blocking worker threads and may be called
/// concurrently for the pages of one batch. `on_batch_complete` is only
/// called after a whole batch has resolved, so its `pages_done` argument
/// never goes backwards.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any page is decomposed.
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when one page's layers are ready.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `text_items`  — editable text boxes extracted
    /// * `image_items` — movable pictures extracted
    fn on_page_decomposed(&self, page_num: usize, text_items: usize, image_items: usize) {
        let _ = (page_num, text_items, image_items);
    }

    /// Called after each batch of pages has fully resolved.
    fn on_batch_complete(&self, pages_done: usize, total_pages: usize) {
        let _ = (pages_done, total_pages);
    }

    /// Called after the notes request for a page has settled.
    ///
    /// `notes_len` is 0 when generation failed and the page got an empty note.
    fn on_notes_complete(&self, page_num: usize, total_pages: usize, notes_len: usize) {
        let _ = (page_num, total_pages, notes_len);
    }

    /// Called once after the deck has been assembled.
    fn on_conversion_complete(&self, total_pages: usize, slide_count: usize) {
        let _ = (total_pages, slide_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        batches: Mutex<Vec<usize>>,
        decomposed: AtomicUsize,
        notes: AtomicUsize,
        slides: AtomicUsize,
    }

    impl ConversionProgressCallback for Recorder {
        fn on_page_decomposed(&self, _page_num: usize, _text: usize, _images: usize) {
            self.decomposed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, pages_done: usize, _total_pages: usize) {
            self.batches.lock().unwrap().push(pages_done);
        }

        fn on_notes_complete(&self, _page_num: usize, _total: usize, _len: usize) {
            self.notes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_conversion_complete(&self, _total_pages: usize, slide_count: usize) {
            self.slides.store(slide_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(5);
        cb.on_page_decomposed(1, 3, 1);
        cb.on_batch_complete(3, 5);
        cb.on_notes_complete(1, 5, 0);
        cb.on_conversion_complete(5, 5);
    }

    #[test]
    fn recorder_receives_events_through_arc_dyn() {
        let rec = Arc::new(Recorder::default());
        let cb: ProgressCallback = rec.clone();

        cb.on_conversion_start(4);
        for page in 1..=3 {
            cb.on_page_decomposed(page, 2, 0);
        }
        cb.on_batch_complete(3, 4);
        cb.on_page_decomposed(4, 0, 1);
        cb.on_batch_complete(4, 4);
        cb.on_notes_complete(1, 4, 120);
        cb.on_conversion_complete(4, 4);

        assert_eq!(rec.decomposed.load(Ordering::SeqCst), 4);
        assert_eq!(*rec.batches.lock().unwrap(), vec![3, 4]);
        assert_eq!(rec.notes.load(Ordering::SeqCst), 1);
        assert_eq!(rec.slides.load(Ordering::SeqCst), 4);
    }
}

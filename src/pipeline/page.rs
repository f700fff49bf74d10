//! Page assembly: text layer + image layer + background plate → [`PageRecord`].
//!
//! ## Batching
//!
//! Pages are decomposed in fixed-size batches. Each page of a batch runs on
//! the blocking pool (lopdf parsing and pdfium rendering are both CPU-bound
//! and synchronous), and the batch is awaited as a whole before its records
//! are appended and progress is reported. The batch size bounds how many
//! full-page rasters exist at once.
//!
//! Before a batch runs, the document renders all of its plates in one
//! rasteriser session ([`DocumentSource::prepare_rasters`]).
//!
//! Any fatal error in any page aborts the whole decomposition.

use crate::config::ConversionConfig;
use crate::error::Pdf2PptxError;
use crate::output::PageRecord;
use crate::pipeline::images::extract_image_items;
use crate::pipeline::render::render_background;
use crate::pipeline::text::extract_text_items;
use crate::source::{DocumentSource, PageSource, RenderMode};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

/// Decompose one page into its three layers.
pub fn decompose_page(page: &dyn PageSource, config: &ConversionConfig) -> Result<PageRecord, Pdf2PptxError> {
    let page_number = page.page_number();
    let viewport = page.viewport();
    let geometry = viewport.geometry();

    let runs = page.text_runs()?;
    let (text_items, text_skipped) = extract_text_items(&runs, &viewport, &config.font_face);

    let ops = page.draw_ops()?;
    let (images, image_skipped) = extract_image_items(&ops, page);

    let background = render_background(page, config.background_scale, config.background_quality)?;

    debug!(
        "Page {}: {:.2}×{:.2} in, {} text items, {} images, plate {} bytes",
        page_number,
        geometry.width,
        geometry.height,
        text_items.len(),
        images.len(),
        background.len()
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_page_decomposed(page_number, text_items.len(), images.len());
    }

    Ok(PageRecord {
        page_number,
        background,
        geometry,
        text_items,
        images,
        notes: None,
        skipped_items: text_skipped + image_skipped,
    })
}

/// Decompose every page of `source`, `config.batch_size` pages at a time.
///
/// The result is sorted by page number and contains exactly one record per page.
pub async fn decompose_document(
    source: Arc<dyn DocumentSource>,
    config: &ConversionConfig,
) -> Result<Vec<PageRecord>, Pdf2PptxError> {
    let total = source.page_count();
    let batch_size = config.batch_size.max(1);
    let mut records: Vec<PageRecord> = Vec::with_capacity(total);

    let page_numbers: Vec<usize> = (1..=total).collect();
    for (batch_idx, batch) in page_numbers.chunks(batch_size).enumerate() {
        debug!("Batch {}: pages {:?}", batch_idx + 1, batch);

        let prepare_source = Arc::clone(&source);
        let pages = batch.to_vec();
        let scale = config.background_scale;
        tokio::task::spawn_blocking(move || {
            prepare_source.prepare_rasters(&pages, scale, RenderMode::TextSuppressed)
        })
        .await
        .map_err(|e| Pdf2PptxError::Internal(format!("raster task failed: {e}")))??;

        let handles = batch.iter().map(|&page_number| {
            let source = Arc::clone(&source);
            let config = config.clone();
            tokio::task::spawn_blocking(move || {
                let page = source.page(page_number)?;
                decompose_page(page.as_ref(), &config)
            })
        });

        let mut resolved = Vec::with_capacity(batch.len());
        for joined in join_all(handles).await {
            let record = joined.map_err(|e| Pdf2PptxError::Internal(format!("page task failed: {e}")))??;
            resolved.push(record);
        }
        records.extend(resolved);

        if let Some(ref cb) = config.progress_callback {
            cb.on_batch_complete(records.len(), total);
        }
    }

    records.sort_by_key(|r| r.page_number);
    info!("Decomposed {} pages in batches of {}", records.len(), batch_size);
    Ok(records)
}

//! Slide deck assembly: ordered page records → layered slides.

use crate::config::ConversionConfig;
use crate::error::Pdf2PptxError;
use crate::geometry::Rect;
use crate::output::PageRecord;
use crate::pptx::{HAlign, SlideSink, TextStyle, VAlign};
use tracing::{debug, info};

/// Emit one slide per page into `sink`, in the order given.
///
/// The first page's size becomes the canvas of the whole deck. Each slide
/// stacks the background plate, then the pictures in draw order, then the
/// text boxes in run order. Non-blank notes are attached last.
///
/// Returns the number of slides written.
pub fn assemble_deck(
    pages: &[PageRecord],
    sink: &mut dyn SlideSink,
    config: &ConversionConfig,
) -> Result<usize, Pdf2PptxError> {
    let Some(first) = pages.first() else {
        info!("No pages: deck has no slides");
        return Ok(0);
    };
    let canvas = first.geometry;
    sink.set_canvas_size(canvas.width, canvas.height);
    debug!("Canvas {:.3}×{:.3} in from page {}", canvas.width, canvas.height, first.page_number);

    for page in pages {
        sink.add_slide();
        sink.add_background(&page.background, Rect::new(0.0, 0.0, canvas.width, canvas.height))?;

        for image in &page.images {
            sink.add_image(&image.data, image.rect())?;
        }

        for item in &page.text_items {
            let style = TextStyle {
                font_size: item.font_size,
                font_face: item.font_face.clone(),
                color: item.color.clone(),
                align: HAlign::Left,
                valign: VAlign::Top,
                margin: 0.0,
            };
            let rect = Rect::new(item.x, item.y, item.w + config.text_width_padding, item.h);
            sink.add_text_box(&item.text, rect, &style)?;
        }

        if let Some(notes) = page.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            sink.add_notes(notes)?;
        }
    }

    info!("Assembled {} slides", pages.len());
    Ok(pages.len())
}

//! Text run extraction: positioned runs → editable text items.
//!
//! The run's transform carries everything needed: its translation is the
//! baseline origin and the length of its x axis is the font size. Boxes are
//! anchored top-left on the slide, so the baseline is lifted by 0.8 em (an
//! ascent approximation) and the box is 1.2 em tall.

use crate::error::ExtractError;
use crate::geometry::{Viewport, POINTS_PER_INCH};
use crate::output::TextItem;
use crate::source::TextRun;
use tracing::{debug, warn};

/// Ascent as a fraction of the em square.
const ASCENT_RATIO: f64 = 0.8;
/// Line height as a fraction of the em square.
const LINE_HEIGHT_RATIO: f64 = 1.2;
/// Width in inches used when a run reports no usable advance.
const FALLBACK_WIDTH_IN: f64 = 1.0;

/// Default colour when the backend does not track fill colour.
pub const DEFAULT_TEXT_COLOR: &str = "000000";

/// Extract text items in source run order.
///
/// Returns the items and the number of runs skipped as malformed.
/// Whitespace-only runs are dropped silently and are not counted.
pub fn extract_text_items(
    runs: &[TextRun],
    viewport: &Viewport,
    font_face: &str,
) -> (Vec<TextItem>, usize) {
    let mut items = Vec::with_capacity(runs.len());
    let mut skipped = 0;

    for run in runs {
        if run.text.trim().is_empty() {
            continue;
        }
        match place_run(run, viewport, font_face) {
            Ok(item) => items.push(item),
            Err(e) => {
                warn!("Skipping text run: {}", e);
                skipped += 1;
            }
        }
    }

    debug!("Extracted {} text items ({} skipped)", items.len(), skipped);
    (items, skipped)
}

/// Place one non-blank run.
pub fn place_run(run: &TextRun, viewport: &Viewport, font_face: &str) -> Result<TextItem, ExtractError> {
    if !run.transform.is_finite() {
        return Err(ExtractError::MalformedRun {
            text: run.text.clone(),
            detail: "non-finite transform".into(),
        });
    }

    let font_size = run.transform.x_scale();
    let (x, baseline_y) = viewport.to_inches(run.transform.e, run.transform.f);
    let y = baseline_y - ASCENT_RATIO * font_size / POINTS_PER_INCH;

    let w = if run.width.is_finite() && run.width > 0.0 {
        viewport.length_to_inches(run.width)
    } else {
        FALLBACK_WIDTH_IN
    };
    let h = LINE_HEIGHT_RATIO * font_size / POINTS_PER_INCH;

    Ok(TextItem {
        text: run.text.clone(),
        x,
        y,
        w,
        h,
        font_size,
        font_face: font_face.to_string(),
        color: run
            .color
            .map(hex_color)
            .unwrap_or_else(|| DEFAULT_TEXT_COLOR.to_string()),
        rotation: 0.0,
    })
}

/// `[r, g, b]` → `"RRGGBB"`.
pub fn hex_color(rgb: [u8; 3]) -> String {
    format!("{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2])
}

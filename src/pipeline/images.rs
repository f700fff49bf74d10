//! Raster image extraction: paint instructions → movable picture items.
//!
//! The drawing stream is replayed through a page-local [`TransformTracker`].
//! Every image is painted into the unit square of the current transform, so
//! mapping the four unit-square corners and taking their bounding box gives
//! the placement. Rotated or sheared placements become upright rectangles.
//!
//! Decoding accepts exactly the encodings in [`PixelData`]; anything else is
//! logged and skipped. One bad image never fails the page.

use crate::error::ExtractError;
use crate::geometry::Rect;
use crate::output::ImageItem;
use crate::pipeline::encode::encode_png;
use crate::source::{DrawOp, ImageLookup, ImageObject, PageSource, PixelData};
use crate::transform::TransformTracker;
use image::{DynamicImage, RgbaImage};
use tracing::{debug, warn};

const UNIT_SQUARE: [(f64, f64); 4] = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)];

/// Extract image items in draw order.
///
/// Returns the items and the number of paint instructions skipped because
/// of a recoverable failure. Pending images are skipped without counting.
pub fn extract_image_items(ops: &[DrawOp], page: &dyn PageSource) -> (Vec<ImageItem>, usize) {
    let viewport = page.viewport();
    let mut tracker = TransformTracker::new();
    let mut items = Vec::new();
    let mut skipped = 0;

    for op in ops {
        match op {
            DrawOp::Save => tracker.save(),
            DrawOp::Restore => tracker.restore(),
            DrawOp::Transform(m) => tracker.compose(m),
            DrawOp::PaintImage { name } => {
                let object = match page.resolve_image(name) {
                    ImageLookup::Ready(object) => object,
                    ImageLookup::Pending => {
                        debug!("Page {}: image '{}' not ready, skipping", page.page_number(), name);
                        continue;
                    }
                    ImageLookup::Missing => {
                        warn!(
                            "Page {}: {}",
                            page.page_number(),
                            ExtractError::ImageUnresolved { name: name.clone() }
                        );
                        skipped += 1;
                        continue;
                    }
                };

                let corners: Vec<(f64, f64)> = UNIT_SQUARE
                    .iter()
                    .map(|&(x, y)| {
                        let (px, py) = tracker.current().apply(x, y);
                        viewport.to_inches(px, py)
                    })
                    .collect();

                match build_item(name, &object, &corners) {
                    Ok(item) => items.push(item),
                    Err(e) => {
                        warn!("Page {}: skipping image: {}", page.page_number(), e);
                        skipped += 1;
                    }
                }
            }
        }
    }

    debug!(
        "Page {}: extracted {} images ({} skipped)",
        page.page_number(),
        items.len(),
        skipped
    );
    (items, skipped)
}

fn build_item(name: &str, object: &ImageObject, corners: &[(f64, f64)]) -> Result<ImageItem, ExtractError> {
    if object.width == 0 || object.height == 0 {
        return Err(ExtractError::EmptyImage {
            name: name.to_string(),
            width: object.width,
            height: object.height,
        });
    }

    let rect = Rect::bounding(corners)
        .filter(|r| r.x.is_finite() && r.y.is_finite() && r.w.is_finite() && r.h.is_finite())
        .ok_or_else(|| ExtractError::Decode {
            name: name.to_string(),
            detail: "placement is not finite".into(),
        })?;

    let rgba = decode_pixels(name, object)?;
    let data = encode_png(&DynamicImage::ImageRgba8(rgba)).map_err(|e| ExtractError::Decode {
        name: name.to_string(),
        detail: e.to_string(),
    })?;

    Ok(ImageItem {
        data,
        x: rect.x,
        y: rect.y,
        w: rect.w,
        h: rect.h,
    })
}

/// Decode an image object into RGBA pixels.
pub fn decode_pixels(name: &str, object: &ImageObject) -> Result<RgbaImage, ExtractError> {
    let pixels = object.width as usize * object.height as usize;
    match &object.pixels {
        PixelData::Rgb24(buf) => {
            check_len(name, buf.len(), pixels * 3)?;
            let mut rgba = Vec::with_capacity(pixels * 4);
            for px in buf.chunks_exact(3) {
                rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
            from_raw(name, object, rgba)
        }
        PixelData::Rgba32(buf) => {
            check_len(name, buf.len(), pixels * 4)?;
            from_raw(name, object, buf.clone())
        }
        PixelData::Bitmap(img) => Ok(img.to_rgba8()),
        PixelData::Unsupported(kind) => Err(ExtractError::UnsupportedEncoding {
            name: name.to_string(),
            encoding: kind.clone(),
        }),
    }
}

fn check_len(name: &str, actual: usize, expected: usize) -> Result<(), ExtractError> {
    if actual < expected || expected == 0 {
        return Err(ExtractError::BufferSize {
            name: name.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn from_raw(name: &str, object: &ImageObject, mut buf: Vec<u8>) -> Result<RgbaImage, ExtractError> {
    buf.truncate(object.width as usize * object.height as usize * 4);
    RgbaImage::from_raw(object.width, object.height, buf).ok_or_else(|| ExtractError::Decode {
        name: name.to_string(),
        detail: "buffer does not fit dimensions".into(),
    })
}

//! Coordinate mapping: page-native units → inches.
//!
//! PDF user space has its origin at the bottom-left of the page box with y
//! growing upwards, measured in points (1/72 in). Slides are laid out from
//! the top-left with y growing downwards, in inches. [`Viewport`] is the one
//! and only bridge between the two; every component that places something on
//! a slide goes through the same viewport instance for its page, so text,
//! images and page size can never disagree about scale.

use serde::{Deserialize, Serialize};

/// Points per inch at the reference scale (1.0 unit = 1/72 inch).
pub const POINTS_PER_INCH: f64 = 72.0;

/// A 2×3 affine matrix `[a b c d e f]` acting on row vectors:
/// `[x' y' 1] = [x y 1] · M`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineMatrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for AffineMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineMatrix {
    pub const IDENTITY: AffineMatrix = AffineMatrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub const fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Build from a six-element operand slice, as found after `cm` or `Tm`.
    pub fn from_slice(v: &[f64]) -> Option<Self> {
        match v {
            [a, b, c, d, e, f] => Some(Self::new(*a, *b, *c, *d, *e, *f)),
            _ => None,
        }
    }

    /// `self · other`: apply `self` first, then `other`.
    pub fn multiply(&self, other: &AffineMatrix) -> AffineMatrix {
        AffineMatrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    /// Map a point through the matrix.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Length of the transformed x unit vector: `sqrt(a² + b²)`.
    ///
    /// For a text rendering matrix this is the effective font size,
    /// unaffected by rotation and by translation.
    pub fn x_scale(&self) -> f64 {
        self.a.hypot(self.b)
    }

    pub fn is_finite(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.e, self.f]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// An axis-aligned rectangle in inches, origin at the slide's top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Smallest rectangle enclosing every point. `None` for an empty input.
    pub fn bounding(points: &[(f64, f64)]) -> Option<Rect> {
        let (first, rest) = points.split_first()?;
        let (mut min_x, mut min_y) = *first;
        let (mut max_x, mut max_y) = *first;
        for &(x, y) in rest {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Some(Rect::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }
}

/// Maps page-native points into inch coordinates on a y-down slide.
///
/// Built the same way a pdf.js viewport is: the page box is normalised,
/// centred, rotated by `/Rotate` and flipped vertically, then scaled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    transform: AffineMatrix,
    width: f64,
    height: f64,
    scale: f64,
}

impl Viewport {
    /// `page_box` is `[x1, y1, x2, y2]` in points, `rotation` is in degrees
    /// (normalised to a multiple of 90), `scale` is viewport units per point.
    pub fn new(page_box: [f64; 4], rotation: i32, scale: f64) -> Self {
        let x1 = page_box[0].min(page_box[2]);
        let x2 = page_box[0].max(page_box[2]);
        let y1 = page_box[1].min(page_box[3]);
        let y2 = page_box[1].max(page_box[3]);
        let center_x = (x1 + x2) / 2.0;
        let center_y = (y1 + y2) / 2.0;

        let (ra, rb, rc, rd) = match rotation.rem_euclid(360) {
            90 => (0.0, 1.0, 1.0, 0.0),
            180 => (-1.0, 0.0, 0.0, 1.0),
            270 => (0.0, -1.0, -1.0, 0.0),
            _ => (1.0, 0.0, 0.0, -1.0),
        };

        let (offset_x, offset_y, width, height) = if ra == 0.0 {
            (
                (center_y - y1).abs() * scale,
                (center_x - x1).abs() * scale,
                (y2 - y1) * scale,
                (x2 - x1) * scale,
            )
        } else {
            (
                (center_x - x1).abs() * scale,
                (center_y - y1).abs() * scale,
                (x2 - x1) * scale,
                (y2 - y1) * scale,
            )
        };

        let transform = AffineMatrix::new(
            ra * scale,
            rb * scale,
            rc * scale,
            rd * scale,
            offset_x - ra * scale * center_x - rc * scale * center_y,
            offset_y - rb * scale * center_x - rd * scale * center_y,
        );

        Self {
            transform,
            width,
            height,
            scale,
        }
    }

    /// Viewport at the reference scale (1 viewport unit = 1 point).
    pub fn reference(page_box: [f64; 4], rotation: i32) -> Self {
        Self::new(page_box, rotation, 1.0)
    }

    pub fn transform(&self) -> &AffineMatrix {
        &self.transform
    }

    /// Width in viewport units.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Height in viewport units.
    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Page-native point → viewport units (y down).
    pub fn to_viewport(&self, x: f64, y: f64) -> (f64, f64) {
        self.transform.apply(x, y)
    }

    /// Page-native point → inches from the top-left corner.
    pub fn to_inches(&self, x: f64, y: f64) -> (f64, f64) {
        let (vx, vy) = self.to_viewport(x, y);
        let unit = POINTS_PER_INCH * self.scale;
        (vx / unit, vy / unit)
    }

    /// Native length (points) → inches.
    pub fn length_to_inches(&self, len: f64) -> f64 {
        len / POINTS_PER_INCH
    }

    pub fn geometry(&self) -> PageGeometry {
        let unit = POINTS_PER_INCH * self.scale;
        PageGeometry {
            width: self.width / unit,
            height: self.height / unit,
        }
    }
}

/// Physical page size in inches, computed once per page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
}

//! Content-stream interpreter: lopdf operations → text runs and draw ops.
//!
//! One pass over a page's content (and, recursively, the form XObjects it
//! paints) produces both things the extractors consume:
//!
//! * text runs with their text rendering matrix
//!   `[Tfs 0 0 Tfs 0 Trise] × Tm × CTM`, their advance width and fill colour
//!   (horizontal scaling `Tz` widens the advance, never the font size);
//! * the drawing-instruction stream reduced to save / restore / transform /
//!   paint-image, with forms expanded inline between a save and a restore.
//!
//! Images painted from inside a form get a path-qualified key (`Fm0/Im1`) so
//! two forms using the same resource name never collide.

use crate::geometry::AffineMatrix;
use crate::pipeline::fonts::FontInfo;
use crate::source::{DrawOp, TextRun};
use crate::transform::TransformTracker;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Forms nested deeper than this are not expanded.
const MAX_FORM_DEPTH: usize = 12;

/// Everything the interpreter extracted from one page.
#[derive(Debug, Default)]
pub struct PageContent {
    pub runs: Vec<TextRun>,
    pub ops: Vec<DrawOp>,
    /// Image key → where its XObject stream lives.
    pub images: HashMap<String, ImageSource>,
}

/// An image XObject as named by a resource dictionary.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Indirect stream object.
    Object(ObjectId),
    /// Stream stored directly in the `/XObject` dictionary.
    Inline(Stream),
}

/// Text parameters that persist across `BT`/`ET` and are saved by `q`.
#[derive(Debug, Clone)]
struct TextParams {
    font: Option<String>,
    size: f64,
    char_spacing: f64,
    word_spacing: f64,
    /// `Tz / 100`.
    h_scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for TextParams {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct GraphicsState {
    fill: Option<[u8; 3]>,
    text: TextParams,
}

/// A shown-string element inside `TJ`.
enum Shown<'o> {
    Bytes(&'o [u8]),
    Adjust(f64),
}

/// Interpret a page content stream.
pub fn interpret_page<'d>(
    doc: &'d Document,
    content: &[u8],
    resources: Option<&'d Dictionary>,
) -> Result<PageContent, lopdf::Error> {
    let content = decode_content(content)?;
    let mut interp = Interpreter {
        doc,
        out: PageContent::default(),
        fonts: HashMap::new(),
        tracker: TransformTracker::new(),
        states: Vec::new(),
        state: GraphicsState::default(),
        tm: AffineMatrix::IDENTITY,
        tlm: AffineMatrix::IDENTITY,
        forms: Vec::new(),
        floor: 0,
    };
    interp.run(&content.operations, resources, "");
    debug!(
        "Interpreted content: {} runs, {} draw ops, {} images",
        interp.out.runs.len(),
        interp.out.ops.len(),
        interp.out.images.len()
    );
    Ok(interp.out)
}

fn decode_content(bytes: &[u8]) -> Result<Content, lopdf::Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Content { operations: Vec::new() });
    }
    Content::decode(bytes)
}

struct Interpreter<'d> {
    doc: &'d Document,
    out: PageContent,
    /// Keyed by resource path + font name.
    fonts: HashMap<String, FontInfo>,
    tracker: TransformTracker,
    states: Vec<GraphicsState>,
    state: GraphicsState,
    tm: AffineMatrix,
    tlm: AffineMatrix,
    /// Forms currently being expanded, for cycle detection.
    forms: Vec<ObjectId>,
    /// Save depth a `Q` may not pop below; raised while a form runs.
    floor: usize,
}

impl<'d> Interpreter<'d> {
    fn run(&mut self, operations: &[Operation], resources: Option<&'d Dictionary>, prefix: &str) {
        for op in operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => {
                    self.tracker.save();
                    self.states.push(self.state.clone());
                    self.out.ops.push(DrawOp::Save);
                }
                "Q" => {
                    if self.tracker.depth() <= self.floor {
                        debug!("Unbalanced Q ignored");
                        continue;
                    }
                    self.restore();
                }
                "cm" => {
                    if let Some(m) = matrix(operands) {
                        self.tracker.compose(&m);
                        self.out.ops.push(DrawOp::Transform(m));
                    }
                }

                "g" | "rg" | "k" | "sc" | "scn" => {
                    let nums: Vec<f64> = operands.iter().filter_map(num).collect();
                    if let Some(rgb) = fill_color(&nums) {
                        self.state.fill = Some(rgb);
                    }
                }

                "BT" => {
                    self.tm = AffineMatrix::IDENTITY;
                    self.tlm = AffineMatrix::IDENTITY;
                }
                "ET" => {}
                "Tf" => {
                    if let [name, size] = operands.as_slice() {
                        if let (Ok(name), Some(size)) = (name.as_name(), num(size)) {
                            let name = String::from_utf8_lossy(name).into_owned();
                            self.load_font(resources, prefix, &name);
                            self.state.text.font = Some(format!("{prefix}{name}"));
                            self.state.text.size = size;
                        }
                    }
                }
                "Tc" => set_param(operands, &mut self.state.text.char_spacing),
                "Tw" => set_param(operands, &mut self.state.text.word_spacing),
                "TL" => set_param(operands, &mut self.state.text.leading),
                "Ts" => set_param(operands, &mut self.state.text.rise),
                "Tz" => {
                    if let Some(v) = operands.first().and_then(num) {
                        self.state.text.h_scale = v / 100.0;
                    }
                }
                "Td" | "TD" => {
                    if let [tx, ty] = operands.as_slice() {
                        if let (Some(tx), Some(ty)) = (num(tx), num(ty)) {
                            if op.operator == "TD" {
                                self.state.text.leading = -ty;
                            }
                            self.next_line(tx, ty);
                        }
                    }
                }
                "Tm" => {
                    if let Some(m) = matrix(operands) {
                        self.tm = m;
                        self.tlm = m;
                    }
                }
                "T*" => self.next_line(0.0, -self.state.text.leading),
                "Tj" => {
                    if let Some(Some(bytes)) = operands.first().map(string_bytes) {
                        self.show(&[Shown::Bytes(bytes)]);
                    }
                }
                "'" => {
                    self.next_line(0.0, -self.state.text.leading);
                    if let Some(Some(bytes)) = operands.first().map(string_bytes) {
                        self.show(&[Shown::Bytes(bytes)]);
                    }
                }
                "\"" => {
                    if let [aw, ac, s] = operands.as_slice() {
                        if let (Some(aw), Some(ac), Some(bytes)) = (num(aw), num(ac), string_bytes(s)) {
                            self.state.text.word_spacing = aw;
                            self.state.text.char_spacing = ac;
                            self.next_line(0.0, -self.state.text.leading);
                            self.show(&[Shown::Bytes(bytes)]);
                        }
                    }
                }
                "TJ" => {
                    if let Some(Ok(items)) = operands.first().map(Object::as_array) {
                        let parts: Vec<Shown> = items
                            .iter()
                            .filter_map(|item| match item {
                                Object::String(bytes, _) => Some(Shown::Bytes(bytes)),
                                other => num(other).map(Shown::Adjust),
                            })
                            .collect();
                        self.show(&parts);
                    }
                }

                "Do" => {
                    if let Some(Ok(name)) = operands.first().map(Object::as_name) {
                        let name = String::from_utf8_lossy(name).into_owned();
                        self.paint_xobject(resources, prefix, &name);
                    }
                }
                _ => {}
            }
        }
    }

    fn restore(&mut self) {
        self.tracker.restore();
        if let Some(state) = self.states.pop() {
            self.state = state;
        }
        self.out.ops.push(DrawOp::Restore);
    }

    fn next_line(&mut self, tx: f64, ty: f64) {
        self.tlm = AffineMatrix::translate(tx, ty).multiply(&self.tlm);
        self.tm = self.tlm;
    }

    fn load_font(&mut self, resources: Option<&'d Dictionary>, prefix: &str, name: &str) {
        let key = format!("{prefix}{name}");
        if self.fonts.contains_key(&key) {
            return;
        }
        let info = resources
            .and_then(|r| sub_dict(self.doc, r, b"Font"))
            .and_then(|fonts| sub_dict(self.doc, fonts, name.as_bytes()))
            .map(|font| FontInfo::from_dict(self.doc, font))
            .unwrap_or_else(|| {
                debug!("Font /{} not found in resources; using fallback", name);
                FontInfo::fallback()
            });
        self.fonts.insert(key, info);
    }

    /// Emit one run for a `Tj`/`TJ`/`'`/`"` and advance the text matrix.
    fn show(&mut self, parts: &[Shown]) {
        let params = &self.state.text;
        let font = params
            .font
            .as_ref()
            .and_then(|k| self.fonts.get(k))
            .cloned()
            .unwrap_or_else(FontInfo::fallback);

        let mut text = String::new();
        let mut advance = 0.0;
        for part in parts {
            match part {
                Shown::Bytes(bytes) => {
                    for glyph in font.decode(bytes) {
                        let mut tx = glyph.width / 1000.0 * params.size + params.char_spacing;
                        if glyph.is_word_space {
                            tx += params.word_spacing;
                        }
                        advance += tx * params.h_scale;
                        text.push_str(&glyph.text);
                    }
                }
                Shown::Adjust(adj) => {
                    advance -= adj / 1000.0 * params.size * params.h_scale;
                }
            }
        }

        let text_to_page = self.tm.multiply(self.tracker.current());
        let font_matrix = AffineMatrix::new(params.size, 0.0, 0.0, params.size, 0.0, params.rise);
        let transform = font_matrix.multiply(&text_to_page);
        let width = advance * text_to_page.x_scale();

        if !text.is_empty() {
            self.out.runs.push(TextRun {
                text,
                transform,
                width,
                color: self.state.fill,
            });
        }
        self.tm = AffineMatrix::translate(advance, 0.0).multiply(&self.tm);
    }

    fn paint_xobject(&mut self, resources: Option<&'d Dictionary>, prefix: &str, name: &str) {
        let doc = self.doc;
        let Some(entry) = resources
            .and_then(|r| sub_dict(doc, r, b"XObject"))
            .and_then(|x| x.get(name.as_bytes()).ok())
        else {
            debug!("XObject /{} not found in resources", name);
            return;
        };
        let id = match entry {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        let Ok((_, Object::Stream(stream))) = doc.dereference(entry) else {
            warn!("XObject /{} is not a stream", name);
            return;
        };

        let subtype = stream.dict.get(b"Subtype").and_then(Object::as_name).unwrap_or_default();
        match subtype {
            b"Image" => {
                let key = format!("{prefix}{name}");
                let source = match id {
                    Some(id) => ImageSource::Object(id),
                    None => ImageSource::Inline(stream.clone()),
                };
                self.out.images.insert(key.clone(), source);
                self.out.ops.push(DrawOp::PaintImage { name: key });
            }
            b"Form" => {
                if self.forms.len() >= MAX_FORM_DEPTH {
                    warn!("Form /{} nested deeper than {}; not expanded", name, MAX_FORM_DEPTH);
                    return;
                }
                if let Some(id) = id {
                    if self.forms.contains(&id) {
                        warn!("Form /{} paints itself; not expanded", name);
                        return;
                    }
                }
                let bytes = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                let content = match decode_content(&bytes) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!("Form /{} content unreadable: {}", name, e);
                        return;
                    }
                };
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| doc.dereference(r).ok())
                    .and_then(|(_, r)| r.as_dict().ok())
                    .or(resources);
                let form_matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|m| m.as_array().ok())
                    .and_then(|m| matrix(m))
                    .unwrap_or(AffineMatrix::IDENTITY);

                self.forms.push(id.unwrap_or((0, 0)));
                self.tracker.save();
                self.states.push(self.state.clone());
                self.out.ops.push(DrawOp::Save);
                self.tracker.compose(&form_matrix);
                self.out.ops.push(DrawOp::Transform(form_matrix));

                let saved_text = (self.tm, self.tlm);
                let form_depth = self.tracker.depth();
                let outer_floor = std::mem::replace(&mut self.floor, form_depth);
                let nested_prefix = format!("{prefix}{name}/");
                self.run(&content.operations, form_resources, &nested_prefix);
                // Close saves the form left open, then the form's own frame.
                while self.tracker.depth() >= form_depth {
                    self.restore();
                }
                self.floor = outer_floor;
                (self.tm, self.tlm) = saved_text;
                self.forms.pop();
            }
            other => debug!("XObject /{} has subtype {:?}; ignored", name, String::from_utf8_lossy(other)),
        }
    }
}

fn sub_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    let obj = dict.get(key).ok()?;
    doc.dereference(obj).ok().and_then(|(_, o)| o.as_dict().ok())
}

fn string_bytes(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

/// Numeric operand as f64.
pub fn num(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn matrix(operands: &[Object]) -> Option<AffineMatrix> {
    let vals: Vec<f64> = operands.iter().map(num).collect::<Option<_>>()?;
    AffineMatrix::from_slice(&vals)
}

fn set_param(operands: &[Object], slot: &mut f64) {
    if let Some(v) = operands.first().and_then(num) {
        *slot = v;
    }
}

/// Gray, RGB or CMYK component values → 8-bit RGB.
fn fill_color(components: &[f64]) -> Option<[u8; 3]> {
    let to_u8 = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    match *components {
        [g] => Some([to_u8(g); 3]),
        [r, g, b] => Some([to_u8(r), to_u8(g), to_u8(b)]),
        [c, m, y, k] => Some([
            to_u8((1.0 - c) * (1.0 - k)),
            to_u8((1.0 - m) * (1.0 - k)),
            to_u8((1.0 - y) * (1.0 - k)),
        ]),
        _ => None,
    }
}

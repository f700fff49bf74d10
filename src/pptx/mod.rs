//! Slide serializer: the [`SlideSink`] seam and its PresentationML writer.
//!
//! [`PptxDeck`] collects slides in memory and serialises a complete `.pptx`
//! package (one master, one blank layout, one theme, optional notes master)
//! with `zip`. Pictures are stored once per call as media parts; shapes keep
//! insertion order, which is their z-order on the slide.

pub mod xml;

use crate::error::Pdf2PptxError;
use crate::geometry::Rect;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::{debug, info};
use xml::{Rel, MAX_SLIDE_EMU, MIN_SLIDE_EMU};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Default 16:9 canvas in inches, used until [`SlideSink::set_canvas_size`] is called.
pub const DEFAULT_CANVAS: (f64, f64) = (10.0, 5.625);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VAlign {
    #[default]
    Top,
    Middle,
    Bottom,
}

/// Character and box formatting of a text box.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// Points.
    pub font_size: f64,
    pub font_face: String,
    /// Hex RGB without `#`.
    pub color: String,
    pub align: HAlign,
    pub valign: VAlign,
    /// Internal margin on all four sides, inches.
    pub margin: f64,
}

/// Receiver of layered slides.
///
/// Pictures and text boxes go to the most recently added slide; adding them
/// before the first [`SlideSink::add_slide`] is an error.
pub trait SlideSink {
    /// Canvas size in inches for every slide of the deck.
    fn set_canvas_size(&mut self, width: f64, height: f64);

    fn add_slide(&mut self);

    /// Full-bleed picture at the bottom of the z-order.
    fn add_background(&mut self, data: &[u8], rect: Rect) -> Result<(), Pdf2PptxError>;

    fn add_image(&mut self, data: &[u8], rect: Rect) -> Result<(), Pdf2PptxError>;

    fn add_text_box(&mut self, text: &str, rect: Rect, style: &TextStyle) -> Result<(), Pdf2PptxError>;

    fn add_notes(&mut self, text: &str) -> Result<(), Pdf2PptxError>;

    /// Serialise the finished deck.
    fn finish(&self) -> Result<Vec<u8>, Pdf2PptxError>;
}

/// A picture shape referencing a media part.
#[derive(Debug, Clone)]
pub struct Picture {
    pub name: String,
    /// Relationship id within the slide part.
    pub rel_id: String,
    pub rect: Rect,
}

#[derive(Debug, Clone)]
pub struct TextBox {
    pub text: String,
    pub rect: Rect,
    pub style: TextStyle,
}

#[derive(Debug, Clone)]
pub enum SlideShape {
    Picture(Picture),
    Text(TextBox),
}

#[derive(Debug, Default)]
struct Slide {
    shapes: Vec<SlideShape>,
    /// (relationship id, media file name)
    media: Vec<(String, String)>,
    notes: Option<String>,
}

/// In-memory PresentationML deck.
#[derive(Debug)]
pub struct PptxDeck {
    title: String,
    subject: String,
    creator: String,
    canvas: (f64, f64),
    slides: Vec<Slide>,
    /// (file name under `ppt/media/`, bytes)
    media: Vec<(String, Vec<u8>)>,
}

impl PptxDeck {
    pub fn new(title: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subject: subject.into(),
            creator: env!("CARGO_PKG_NAME").to_string(),
            canvas: DEFAULT_CANVAS,
            slides: Vec::new(),
            media: Vec::new(),
        }
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn canvas_size(&self) -> (f64, f64) {
        self.canvas
    }

    /// Canvas in EMU, clamped to the range the format accepts.
    fn canvas_emu(&self) -> (i64, i64) {
        let clamp = |v: f64| xml::emu(v).clamp(MIN_SLIDE_EMU, MAX_SLIDE_EMU);
        (clamp(self.canvas.0), clamp(self.canvas.1))
    }

    fn current(&mut self) -> Result<&mut Slide, Pdf2PptxError> {
        self.slides
            .last_mut()
            .ok_or_else(|| Pdf2PptxError::DeckAssembly("no slide to add content to".into()))
    }

    fn add_picture(&mut self, data: &[u8], rect: Rect, name: &str) -> Result<(), Pdf2PptxError> {
        let ext = media_extension(data)?;
        let file_name = format!("image{}.{}", self.media.len() + 1, ext);
        let slide = self.current()?;
        // rId1 is the layout
        let rel_id = format!("rId{}", slide.media.len() + 2);
        slide.media.push((rel_id.clone(), file_name.clone()));
        let name = format!("{} {}", name, slide.shapes.len() + 1);
        slide.shapes.push(SlideShape::Picture(Picture { name, rel_id, rect }));
        self.media.push((file_name, data.to_vec()));
        Ok(())
    }

    /// Write the deck atomically: temp file in the target directory, then rename.
    pub fn write_to_file(&self, path: &Path) -> Result<(), Pdf2PptxError> {
        let bytes = self.finish()?;
        write_atomic(path, &bytes)
    }
}

impl SlideSink for PptxDeck {
    fn set_canvas_size(&mut self, width: f64, height: f64) {
        if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
            self.canvas = (width, height);
        }
    }

    fn add_slide(&mut self) {
        self.slides.push(Slide::default());
    }

    fn add_background(&mut self, data: &[u8], rect: Rect) -> Result<(), Pdf2PptxError> {
        self.add_picture(data, rect, "Background")
    }

    fn add_image(&mut self, data: &[u8], rect: Rect) -> Result<(), Pdf2PptxError> {
        self.add_picture(data, rect, "Picture")
    }

    fn add_text_box(&mut self, text: &str, rect: Rect, style: &TextStyle) -> Result<(), Pdf2PptxError> {
        self.current()?.shapes.push(SlideShape::Text(TextBox {
            text: text.to_string(),
            rect,
            style: style.clone(),
        }));
        Ok(())
    }

    fn add_notes(&mut self, text: &str) -> Result<(), Pdf2PptxError> {
        self.current()?.notes = Some(text.to_string());
        Ok(())
    }

    fn finish(&self) -> Result<Vec<u8>, Pdf2PptxError> {
        let slide_count = self.slides.len();
        let notes_slides: Vec<usize> = self
            .slides
            .iter()
            .enumerate()
            .filter(|(_, s)| s.notes.is_some())
            .map(|(i, _)| i + 1)
            .collect();
        let has_notes = !notes_slides.is_empty();
        let (cx, cy) = self.canvas_emu();

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut part = |name: &str, body: &[u8]| -> Result<(), Pdf2PptxError> {
            zip.start_file(name, opts)?;
            zip.write_all(body)
                .map_err(|e| Pdf2PptxError::DeckAssembly(format!("{name}: {e}")))
        };

        part("[Content_Types].xml", xml::content_types(slide_count, &notes_slides, has_notes).as_bytes())?;
        part(
            "_rels/.rels",
            xml::relationships(&[
                Rel::new("rId1", "officeDocument", "ppt/presentation.xml"),
                Rel::new(
                    "rId2",
                    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties",
                    "docProps/core.xml",
                ),
                Rel::new("rId3", "extended-properties", "docProps/app.xml"),
            ])
            .as_bytes(),
        )?;
        part("docProps/core.xml", xml::core_props(&self.title, &self.subject, &self.creator).as_bytes())?;
        part("docProps/app.xml", xml::app_props(slide_count, notes_slides.len()).as_bytes())?;
        part("ppt/presentation.xml", xml::presentation(slide_count, cx, cy, has_notes).as_bytes())?;
        part("ppt/_rels/presentation.xml.rels", xml::presentation_rels(slide_count, has_notes).as_bytes())?;
        part("ppt/presProps.xml", xml::pres_props().as_bytes())?;
        part("ppt/viewProps.xml", xml::view_props().as_bytes())?;
        part("ppt/tableStyles.xml", xml::table_styles().as_bytes())?;
        part("ppt/slideMasters/slideMaster1.xml", xml::slide_master().as_bytes())?;
        part("ppt/slideMasters/_rels/slideMaster1.xml.rels", xml::slide_master_rels().as_bytes())?;
        part("ppt/slideLayouts/slideLayout1.xml", xml::slide_layout().as_bytes())?;
        part("ppt/slideLayouts/_rels/slideLayout1.xml.rels", xml::slide_layout_rels().as_bytes())?;
        part("ppt/theme/theme1.xml", xml::theme("Office Theme").as_bytes())?;

        if has_notes {
            part("ppt/notesMasters/notesMaster1.xml", xml::notes_master().as_bytes())?;
            part("ppt/notesMasters/_rels/notesMaster1.xml.rels", xml::notes_master_rels().as_bytes())?;
            part("ppt/theme/theme2.xml", xml::theme("Notes Theme").as_bytes())?;
        }

        for (i, slide) in self.slides.iter().enumerate() {
            let n = i + 1;
            part(&format!("ppt/slides/slide{n}.xml"), xml::slide(&slide.shapes).as_bytes())?;

            let mut rels = vec![Rel::new("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml")];
            for (rel_id, file_name) in &slide.media {
                rels.push(Rel::new(rel_id.clone(), "image", format!("../media/{file_name}")));
            }
            if let Some(ref notes) = slide.notes {
                rels.push(Rel::new(
                    format!("rId{}", slide.media.len() + 2),
                    "notesSlide",
                    format!("../notesSlides/notesSlide{n}.xml"),
                ));
                part(&format!("ppt/notesSlides/notesSlide{n}.xml"), xml::notes_slide(notes).as_bytes())?;
                part(
                    &format!("ppt/notesSlides/_rels/notesSlide{n}.xml.rels"),
                    xml::notes_slide_rels(n).as_bytes(),
                )?;
            }
            part(&format!("ppt/slides/_rels/slide{n}.xml.rels"), xml::relationships(&rels).as_bytes())?;
        }

        for (file_name, data) in &self.media {
            part(&format!("ppt/media/{file_name}"), data)?;
        }

        let bytes = zip.finish()?.into_inner();
        debug!(
            "Deck serialised: {} slides, {} media parts, {} bytes",
            slide_count,
            self.media.len(),
            bytes.len()
        );
        Ok(bytes)
    }
}

/// `png` or `jpeg`, from the data's signature.
fn media_extension(data: &[u8]) -> Result<&'static str, Pdf2PptxError> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Ok("png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Ok("jpeg")
    } else {
        Err(Pdf2PptxError::DeckAssembly(
            "picture data is neither PNG nor JPEG".into(),
        ))
    }
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2PptxError> {
    let fail = |source: std::io::Error| Pdf2PptxError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir().map_err(fail)?,
    };
    std::fs::create_dir_all(&dir).map_err(fail)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(fail)?;
    tmp.write_all(bytes).map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;
    info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n....";
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0];

    fn style() -> TextStyle {
        TextStyle {
            font_size: 12.0,
            font_face: "Arial".into(),
            color: "000000".into(),
            align: HAlign::Left,
            valign: VAlign::Top,
            margin: 0.0,
        }
    }

    fn read(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut s = String::new();
        file.read_to_string(&mut s).unwrap();
        s
    }

    fn names(bytes: &[u8]) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    #[test]
    fn content_before_first_slide_is_rejected() {
        let mut deck = PptxDeck::new("t", "s");
        assert!(deck.add_text_box("x", Rect::new(0.0, 0.0, 1.0, 1.0), &style()).is_err());
        assert!(deck.add_notes("n").is_err());
    }

    #[test]
    fn non_image_bytes_are_rejected() {
        let mut deck = PptxDeck::new("t", "s");
        deck.add_slide();
        assert!(deck.add_image(b"GIF89a", Rect::new(0.0, 0.0, 1.0, 1.0)).is_err());
    }

    #[test]
    fn empty_deck_is_a_valid_package() {
        let bytes = PptxDeck::new("Empty", "s").finish().unwrap();
        let parts = names(&bytes);
        assert!(parts.contains(&"[Content_Types].xml".to_string()));
        assert!(parts.contains(&"ppt/presentation.xml".to_string()));
        assert!(!parts.iter().any(|p| p.starts_with("ppt/slides/")));
        assert!(!parts.iter().any(|p| p.starts_with("ppt/notesMasters/")));
        assert!(read(&bytes, "docProps/core.xml").contains("<dc:title>Empty</dc:title>"));
    }

    #[test]
    fn shapes_keep_insertion_order_and_media_is_stored() {
        let mut deck = PptxDeck::new("t", "s");
        deck.set_canvas_size(13.333, 7.5);
        deck.add_slide();
        deck.add_background(JPEG, Rect::new(0.0, 0.0, 13.333, 7.5)).unwrap();
        deck.add_image(PNG, Rect::new(1.0, 1.0, 2.0, 1.0)).unwrap();
        deck.add_text_box("Hello", Rect::new(1.0, 3.0, 2.0, 0.5), &style()).unwrap();
        let bytes = deck.finish().unwrap();

        let slide = read(&bytes, "ppt/slides/slide1.xml");
        let bg = slide.find("Background 1").unwrap();
        let pic = slide.find("Picture 2").unwrap();
        let text = slide.find("<a:t>Hello</a:t>").unwrap();
        assert!(bg < pic && pic < text);

        let rels = read(&bytes, "ppt/slides/_rels/slide1.xml.rels");
        assert!(rels.contains(r#"Target="../media/image1.jpeg""#));
        assert!(rels.contains(r#"Target="../media/image2.png""#));
        assert!(names(&bytes).contains(&"ppt/media/image2.png".to_string()));

        let pres = read(&bytes, "ppt/presentation.xml");
        assert!(pres.contains(r#"<p:sldSz cx="12191695" cy="6858000"/>"#));
    }

    #[test]
    fn notes_add_notes_master_and_slide() {
        let mut deck = PptxDeck::new("t", "s");
        deck.add_slide();
        deck.add_slide();
        deck.add_notes("Talk about revenue").unwrap();
        let bytes = deck.finish().unwrap();
        let parts = names(&bytes);
        assert!(parts.contains(&"ppt/notesMasters/notesMaster1.xml".to_string()));
        assert!(parts.contains(&"ppt/notesSlides/notesSlide2.xml".to_string()));
        assert!(!parts.contains(&"ppt/notesSlides/notesSlide1.xml".to_string()));
        assert!(read(&bytes, "ppt/notesSlides/notesSlide2.xml").contains("Talk about revenue"));
        assert!(read(&bytes, "ppt/slides/_rels/slide2.xml.rels").contains("notesSlide2.xml"));
    }

    #[test]
    fn canvas_is_clamped_to_format_limits() {
        let mut deck = PptxDeck::new("t", "s");
        deck.set_canvas_size(100.0, 0.5);
        assert_eq!(deck.canvas_emu(), (MAX_SLIDE_EMU, MIN_SLIDE_EMU));
        deck.set_canvas_size(f64::NAN, 2.0);
        assert_eq!(deck.canvas_size(), (100.0, 0.5));
    }

    #[test]
    fn write_to_file_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("deck.pptx");
        let deck = PptxDeck::new("t", "s");
        deck.write_to_file(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], b"PK");
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}

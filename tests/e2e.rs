//! End-to-end integration tests for edgequake-pdf2pptx.
//!
//! Most tests drive the conversion engine through in-memory document
//! sources or small PDFs built with lopdf, so they need neither pdfium nor
//! network access. Tests that rasterise real background plates need a
//! pdfium library and are gated behind the `E2E_ENABLED` environment
//! variable.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture
//!
//! Including the pdfium-backed tests:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/lib cargo test --test e2e -- --nocapture

use edgequake_pdf2pptx::pipeline::images::extract_image_items;
use edgequake_pdf2pptx::pipeline::page::decompose_page;
use edgequake_pdf2pptx::pipeline::pdf::PdfDocument;
use edgequake_pdf2pptx::pipeline::text::extract_text_items;
use edgequake_pdf2pptx::{
    convert_document, convert_from_bytes, convert_to_file, inspect, AffineMatrix, ConversionConfig,
    ConversionProgressCallback, DocumentMetadata, DocumentSource, DrawOp, ImageLookup, ImageObject, NotesError,
    NotesService, PageSource, Pdf2PptxError, PixelData, RenderMode, TextRun, Viewport,
};
use futures::future::BoxFuture;
use image::DynamicImage;
use lopdf::{dictionary, Document, Object, Stream};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use zip::ZipArchive;

const EPS: f64 = 1e-6;

// ── In-memory document ───────────────────────────────────────────────────────

/// A 10 × 7.5 in page with one "Hello" run at 24 pt on the native origin and
/// one 100×50 RGB image stretched over the top-left 2 × 1 in.
struct HelloPage {
    number: usize,
}

impl PageSource for HelloPage {
    fn page_number(&self) -> usize {
        self.number
    }

    fn viewport(&self) -> Viewport {
        Viewport::reference([0.0, 0.0, 720.0, 540.0], 0)
    }

    fn text_runs(&self) -> Result<Vec<TextRun>, Pdf2PptxError> {
        Ok(vec![TextRun::new(
            "Hello",
            AffineMatrix::new(24.0, 0.0, 0.0, 24.0, 0.0, 0.0),
            60.0,
        )])
    }

    fn draw_ops(&self) -> Result<Vec<DrawOp>, Pdf2PptxError> {
        Ok(vec![
            DrawOp::Save,
            DrawOp::Transform(AffineMatrix::new(144.0, 0.0, 0.0, 72.0, 0.0, 468.0)),
            DrawOp::PaintImage { name: "Im0".into() },
            DrawOp::Restore,
        ])
    }

    fn resolve_image(&self, name: &str) -> ImageLookup {
        if name != "Im0" {
            return ImageLookup::Missing;
        }
        ImageLookup::Ready(ImageObject {
            width: 100,
            height: 50,
            pixels: PixelData::Rgb24(vec![200; 100 * 50 * 3]),
        })
    }

    fn rasterize(&self, scale: f64, _mode: RenderMode) -> Result<DynamicImage, Pdf2PptxError> {
        Ok(DynamicImage::new_rgb8((720.0 * scale) as u32, (540.0 * scale) as u32))
    }
}

struct HelloDoc {
    pages: usize,
}

impl DocumentSource for HelloDoc {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            title: Some("Hello deck".into()),
            page_count: self.pages,
            pdf_version: "1.7".into(),
            ..Default::default()
        }
    }

    fn page(&self, page_number: usize) -> Result<Box<dyn PageSource + '_>, Pdf2PptxError> {
        Ok(Box::new(HelloPage { number: page_number }))
    }
}

/// Fails every request with a rate-limit error.
#[derive(Default)]
struct RateLimited {
    calls: AtomicUsize,
}

impl NotesService for RateLimited {
    fn generate<'a>(&'a self, _image: &'a [u8], _page: usize) -> BoxFuture<'a, Result<String, NotesError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(NotesError::classify("HTTP 429 Too Many Requests")) })
    }
}

/// Answers with a markdown-ish note mentioning the page.
struct Chatty;

impl NotesService for Chatty {
    fn generate<'a>(&'a self, _image: &'a [u8], page: usize) -> BoxFuture<'a, Result<String, NotesError>> {
        Box::pin(async move { Ok(format!("## Slide {page}\n\n- **Key** point for page {page}\n")) })
    }
}

#[derive(Default)]
struct Events {
    batches: Mutex<Vec<usize>>,
    completed: AtomicUsize,
}

impl ConversionProgressCallback for Events {
    fn on_batch_complete(&self, pages_done: usize, _total_pages: usize) {
        self.batches.lock().unwrap().push(pages_done);
    }

    fn on_conversion_complete(&self, _total_pages: usize, slide_count: usize) {
        self.completed.store(slide_count, Ordering::SeqCst);
    }
}

// ── Package read-back helpers ────────────────────────────────────────────────

fn part(deck: &[u8], name: &str) -> Option<String> {
    let mut archive = ZipArchive::new(Cursor::new(deck)).unwrap();
    let mut file = archive.by_name(name).ok()?;
    let mut s = String::new();
    file.read_to_string(&mut s).unwrap();
    Some(s)
}

fn part_names(deck: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(deck)).unwrap();
    archive.file_names().map(str::to_string).collect()
}

fn attr(e: &quick_xml::events::BytesStart<'_>, key: &str) -> Option<String> {
    e.try_get_attribute(key)
        .ok()
        .flatten()
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// `(cx, cy)` of `p:sldSz` in `ppt/presentation.xml`.
fn slide_size(deck: &[u8]) -> (i64, i64) {
    let xml = part(deck, "ppt/presentation.xml").unwrap();
    let mut reader = Reader::from_str(&xml);
    loop {
        match reader.read_event().unwrap() {
            Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"p:sldSz" => {
                let cx = attr(&e, "cx").unwrap().parse().unwrap();
                let cy = attr(&e, "cy").unwrap().parse().unwrap();
                return (cx, cy);
            }
            Event::Eof => panic!("no p:sldSz"),
            _ => {}
        }
    }
}

/// Element names of the shapes in slide `n`, in z-order, plus all `a:t` text.
fn slide_shapes(deck: &[u8], n: usize) -> (Vec<String>, Vec<String>) {
    let xml = part(deck, &format!("ppt/slides/slide{n}.xml")).unwrap();
    let mut reader = Reader::from_str(&xml);
    let mut shapes = Vec::new();
    let mut texts = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) => match e.name().as_ref() {
                b"p:pic" => shapes.push("pic".to_string()),
                b"p:sp" => shapes.push("sp".to_string()),
                b"a:t" => in_text = true,
                _ => {}
            },
            Event::Text(t) if in_text => texts.push(t.unescape().unwrap().into_owned()),
            Event::End(e) if e.name().as_ref() == b"a:t" => in_text = false,
            Event::Eof => break,
            _ => {}
        }
    }
    (shapes, texts)
}

fn quiet_notes(config: edgequake_pdf2pptx::ConversionConfigBuilder) -> ConversionConfig {
    config
        .notes(true)
        .notes_retry_backoff_ms(1)
        .notes_pacing_ms(0)
        .build()
        .unwrap()
}

// ── Engine scenarios ─────────────────────────────────────────────────────────

#[tokio::test]
async fn single_page_hello_becomes_three_layer_slide() {
    let doc: Arc<dyn DocumentSource> = Arc::new(HelloDoc { pages: 1 });
    let output = convert_document(doc, &ConversionConfig::default(), None)
        .await
        .unwrap();

    assert_eq!(output.pages.len(), 1);
    let page = &output.pages[0];
    assert!((page.geometry.width - 10.0).abs() < EPS);
    assert!((page.geometry.height - 7.5).abs() < EPS);

    assert_eq!(page.text_items.len(), 1);
    let text = &page.text_items[0];
    assert_eq!(text.text, "Hello");
    assert!((text.font_size - 24.0).abs() < EPS);
    assert!(text.x.abs() < EPS);

    assert_eq!(page.images.len(), 1);
    let img = &page.images[0];
    assert!(img.x.abs() < EPS && img.y.abs() < EPS);
    assert!((img.w - 2.0).abs() < EPS && (img.h - 1.0).abs() < EPS);
    assert_eq!(&img.data[..4], b"\x89PNG");

    // 10 × 7.5 in canvas
    assert_eq!(slide_size(&output.deck), (9_144_000, 6_858_000));
    let (shapes, texts) = slide_shapes(&output.deck, 1);
    assert_eq!(shapes, vec!["pic", "pic", "sp"]);
    assert_eq!(texts, vec!["Hello"]);
    assert!(part(&output.deck, "docProps/core.xml")
        .unwrap()
        .contains("<dc:title>Hello deck</dc:title>"));
    assert_eq!(output.stats.text_items, 1);
    assert_eq!(output.stats.image_items, 1);
}

#[tokio::test]
async fn zero_page_input_yields_empty_deck() {
    let doc: Arc<dyn DocumentSource> = Arc::new(HelloDoc { pages: 0 });
    let output = convert_document(doc, &ConversionConfig::default(), None)
        .await
        .unwrap();

    assert!(output.pages.is_empty());
    assert_eq!(output.stats.total_pages, 0);
    let names = part_names(&output.deck);
    assert!(names.contains(&"ppt/presentation.xml".to_string()));
    assert!(!names.iter().any(|n| n.starts_with("ppt/slides/")));
    assert!(!part(&output.deck, "ppt/presentation.xml")
        .unwrap()
        .contains("<p:sldId "));
}

#[tokio::test]
async fn rate_limited_notes_degrade_to_empty() {
    let doc: Arc<dyn DocumentSource> = Arc::new(HelloDoc { pages: 2 });
    let config = quiet_notes(ConversionConfig::builder().notes_max_retries(3));
    let service = RateLimited::default();

    let output = convert_document(doc, &config, Some(&service)).await.unwrap();

    // 1 attempt + 3 retries per page
    assert_eq!(service.calls.load(Ordering::SeqCst), 8);
    assert!(output.pages.iter().all(|p| p.notes.as_deref() == Some("")));
    assert_eq!(output.stats.pages_with_notes, 0);
    assert!(!part_names(&output.deck)
        .iter()
        .any(|n| n.starts_with("ppt/notesSlides/")));
}

#[tokio::test]
async fn generated_notes_are_cleaned_and_attached() {
    let doc: Arc<dyn DocumentSource> = Arc::new(HelloDoc { pages: 2 });
    let config = quiet_notes(ConversionConfig::builder());

    let output = convert_document(doc, &config, Some(&Chatty)).await.unwrap();

    assert_eq!(output.pages[1].notes.as_deref(), Some("Slide 2\n\n- Key point for page 2"));
    assert_eq!(output.stats.pages_with_notes, 2);
    let note = part(&output.deck, "ppt/notesSlides/notesSlide2.xml").unwrap();
    assert!(note.contains("Key point for page 2"));
    assert!(part_names(&output.deck).contains(&"ppt/notesMasters/notesMaster1.xml".to_string()));
}

#[tokio::test]
async fn notes_are_skipped_when_disabled() {
    let doc: Arc<dyn DocumentSource> = Arc::new(HelloDoc { pages: 1 });
    let service = RateLimited::default();
    let output = convert_document(doc, &ConversionConfig::default(), Some(&service))
        .await
        .unwrap();
    assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    assert!(output.pages[0].notes.is_none());
}

#[tokio::test]
async fn pages_come_back_ordered_without_gaps() {
    let events = Arc::new(Events::default());
    let config = ConversionConfig::builder()
        .batch_size(2)
        .progress_callback(events.clone())
        .build()
        .unwrap();
    let doc: Arc<dyn DocumentSource> = Arc::new(HelloDoc { pages: 5 });

    let output = convert_document(doc, &config, None).await.unwrap();

    let numbers: Vec<usize> = output.pages.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    assert_eq!(*events.batches.lock().unwrap(), vec![2, 4, 5]);
    assert_eq!(events.completed.load(Ordering::SeqCst), 5);
    for n in 1..=5 {
        assert!(part(&output.deck, &format!("ppt/slides/slide{n}.xml")).is_some());
    }
    assert!(part(&output.deck, "ppt/slides/slide6.xml").is_none());
}

#[test]
fn decomposition_is_idempotent() {
    let page = HelloPage { number: 1 };
    let config = ConversionConfig::default();
    let first = decompose_page(&page, &config).unwrap();
    let second = decompose_page(&page, &config).unwrap();
    assert_eq!(first.text_items, second.text_items);
    assert_eq!(first.images, second.images);
}

#[tokio::test]
async fn config_title_overrides_document_title() {
    let config = ConversionConfig::builder().title("Board Meeting").build().unwrap();
    let doc: Arc<dyn DocumentSource> = Arc::new(HelloDoc { pages: 1 });
    let output = convert_document(doc, &config, None).await.unwrap();
    assert!(part(&output.deck, "docProps/core.xml")
        .unwrap()
        .contains("<dc:title>Board Meeting</dc:title>"));
}

// ── lopdf-built PDFs ─────────────────────────────────────────────────────────

/// One 10 × 7.5 in page: "Hello" in 24 pt Helvetica at the origin and a
/// 100×50 RGB image in the top-left 2 × 1 in.
fn hello_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 100,
            "Height" => 50,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        vec![90; 100 * 50 * 3],
    ));
    let content = b"q 144 0 0 72 0 468 cm /Im0 Do Q\nBT /F1 24 Tf 0 0 Td (Hello) Tj ET".to_vec();
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
            "MediaBox" => vec![0, 0, 720, 540].into_iter().map(Object::Integer).collect::<Vec<_>>(),
        }),
    );
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("Hello PDF"),
        "Author" => Object::string_literal("Deck Team"),
    });
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

#[test]
fn lopdf_backend_feeds_both_extractors() {
    let pdf = PdfDocument::load(hello_pdf(), None, Path::new("hello.pdf")).unwrap();
    assert_eq!(pdf.page_count(), 1);
    let page = pdf.page(1).unwrap();
    let viewport = page.viewport();

    let runs = page.text_runs().unwrap();
    let (texts, skipped) = extract_text_items(&runs, &viewport, "Meiryo UI");
    assert_eq!(skipped, 0);
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].text, "Hello");
    assert!((texts[0].font_size - 24.0).abs() < EPS);
    assert!(texts[0].x.abs() < EPS);

    let ops = page.draw_ops().unwrap();
    let (images, skipped) = extract_image_items(&ops, page.as_ref());
    assert_eq!(skipped, 0);
    assert_eq!(images.len(), 1);
    assert!(images[0].x.abs() < EPS && images[0].y.abs() < EPS);
    assert!((images[0].w - 2.0).abs() < EPS && (images[0].h - 1.0).abs() < EPS);
}

#[test]
fn lopdf_metadata_reports_first_page_size() {
    let pdf = PdfDocument::load(hello_pdf(), None, Path::new("hello.pdf")).unwrap();
    let meta = pdf.metadata();
    assert_eq!(meta.title.as_deref(), Some("Hello PDF"));
    assert_eq!(meta.author.as_deref(), Some("Deck Team"));
    let first = meta.first_page.unwrap();
    assert!((first.width - 10.0).abs() < EPS && (first.height - 7.5).abs() < EPS);
}

#[tokio::test]
async fn inspect_reads_pdf_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.pdf");
    std::fs::write(&path, hello_pdf()).unwrap();
    let meta = inspect(path.to_str().unwrap()).await.unwrap();
    assert_eq!(meta.page_count, 1);
    assert_eq!(meta.pdf_version, "1.7");
}

#[tokio::test]
async fn inspect_nonexistent_file() {
    let err = inspect("/no/such/deck.pdf").await.unwrap_err();
    assert!(matches!(err, Pdf2PptxError::FileNotFound { .. }));
}

// ── pdfium-backed conversions (gated) ────────────────────────────────────────

/// Skip unless E2E_ENABLED is set; pdfium must be loadable.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run pdfium-backed e2e tests");
            return;
        }
    }};
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("target/e2e-output");
    std::fs::create_dir_all(&d).ok();
    d
}

#[tokio::test]
async fn test_convert_hello_pdf_to_file() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("hello.pdf");
    std::fs::write(&input, hello_pdf()).unwrap();
    let out = output_dir().join("hello.pptx");

    let stats = convert_to_file(input.to_str().unwrap(), &out, &ConversionConfig::default())
        .await
        .expect("conversion should succeed with pdfium available");

    assert_eq!(stats.total_pages, 1);
    assert_eq!(stats.text_items, 1);
    assert_eq!(stats.image_items, 1);

    let deck = std::fs::read(&out).unwrap();
    assert_eq!(slide_size(&deck), (9_144_000, 6_858_000));
    let (shapes, texts) = slide_shapes(&deck, 1);
    assert_eq!(shapes, vec!["pic", "pic", "sp"]);
    assert_eq!(texts, vec!["Hello"]);
    let background = part_names(&deck)
        .into_iter()
        .find(|n| n.starts_with("ppt/media/") && n.ends_with(".jpeg"));
    assert!(background.is_some(), "background plate should be a JPEG");
}

#[tokio::test]
async fn test_convert_from_bytes_uses_config_title() {
    e2e_skip_unless_enabled!();
    let config = ConversionConfig::builder()
        .title("Hello from memory")
        .background_scale(3.0)
        .build()
        .unwrap();
    let output = convert_from_bytes(&hello_pdf(), &config).await.unwrap();
    assert_eq!(output.pages.len(), 1);
    assert!(part(&output.deck, "docProps/core.xml")
        .unwrap()
        .contains("Hello from memory"));
    let json = serde_json::to_string(&output).unwrap();
    assert!(json.contains("\"text_items\""));
}

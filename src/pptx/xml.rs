//! OOXML part bodies for a PresentationML package.
//!
//! Every function returns a complete XML document as a string. Free text and
//! attribute values go through [`esc`]; numeric values are EMU integers.

use super::{HAlign, Picture, SlideShape, TextBox, VAlign};
use quick_xml::escape::escape;

pub const EMU_PER_INCH: f64 = 914_400.0;

/// `sldSz` bounds from the PresentationML schema (1 in to 56 in).
pub const MIN_SLIDE_EMU: i64 = 914_400;
pub const MAX_SLIDE_EMU: i64 = 51_206_400;

/// First id handed to slides in `sldIdLst`.
pub const FIRST_SLIDE_ID: u32 = 256;
/// Master and layout ids share a space that starts here.
pub const FIRST_MASTER_ID: u32 = 2_147_483_648;

const DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const NS_PML: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const CT_BASE: &str = "application/vnd.openxmlformats-officedocument.presentationml";

const EMPTY_GROUP: &str = r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#;
const CLR_MAP: &str = r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>"#;

/// Inches → EMU.
pub fn emu(inches: f64) -> i64 {
    if inches.is_finite() {
        (inches * EMU_PER_INCH).round() as i64
    } else {
        0
    }
}

/// Escape text for element content or attribute values, dropping characters
/// XML 1.0 cannot carry at all.
pub fn esc(text: &str) -> String {
    let clean: String = text
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || (c >= '\u{20}' && c != '\u{FFFE}' && c != '\u{FFFF}'))
        .collect();
    escape(clean.as_str()).into_owned()
}

/// One `<Relationship>` entry.
pub struct Rel {
    pub id: String,
    pub kind: &'static str,
    pub target: String,
}

impl Rel {
    pub fn new(id: impl Into<String>, kind: &'static str, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            target: target.into(),
        }
    }
}

pub fn relationships(rels: &[Rel]) -> String {
    let mut out = String::from(DECL);
    out.push_str(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
    for rel in rels {
        let ty = if rel.kind.starts_with("http") {
            rel.kind.to_string()
        } else {
            format!("{REL_BASE}/{}", rel.kind)
        };
        out.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            rel.id,
            ty,
            esc(&rel.target)
        ));
    }
    out.push_str("</Relationships>");
    out
}

pub fn content_types(slide_count: usize, notes_slides: &[usize], has_notes_master: bool) -> String {
    let mut out = String::from(DECL);
    out.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    out.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    out.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    out.push_str(r#"<Default Extension="png" ContentType="image/png"/>"#);
    out.push_str(r#"<Default Extension="jpeg" ContentType="image/jpeg"/>"#);

    let mut over = |part: &str, ct: String| {
        out.push_str(&format!(r#"<Override PartName="{part}" ContentType="{ct}"/>"#));
    };
    over("/ppt/presentation.xml", format!("{CT_BASE}.presentation.main+xml"));
    over("/ppt/slideMasters/slideMaster1.xml", format!("{CT_BASE}.slideMaster+xml"));
    over("/ppt/slideLayouts/slideLayout1.xml", format!("{CT_BASE}.slideLayout+xml"));
    for n in 1..=slide_count {
        over(&format!("/ppt/slides/slide{n}.xml"), format!("{CT_BASE}.slide+xml"));
    }
    for n in notes_slides {
        over(&format!("/ppt/notesSlides/notesSlide{n}.xml"), format!("{CT_BASE}.notesSlide+xml"));
    }
    if has_notes_master {
        over("/ppt/notesMasters/notesMaster1.xml", format!("{CT_BASE}.notesMaster+xml"));
        over("/ppt/theme/theme2.xml", "application/vnd.openxmlformats-officedocument.theme+xml".into());
    }
    over("/ppt/theme/theme1.xml", "application/vnd.openxmlformats-officedocument.theme+xml".into());
    over("/ppt/presProps.xml", format!("{CT_BASE}.presProps+xml"));
    over("/ppt/viewProps.xml", format!("{CT_BASE}.viewProps+xml"));
    over("/ppt/tableStyles.xml", format!("{CT_BASE}.tableStyles+xml"));
    over("/docProps/core.xml", "application/vnd.openxmlformats-package.core-properties+xml".into());
    over(
        "/docProps/app.xml",
        "application/vnd.openxmlformats-officedocument.extended-properties+xml".into(),
    );
    out.push_str("</Types>");
    out
}

pub fn core_props(title: &str, subject: &str, creator: &str) -> String {
    format!(
        r#"{DECL}<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>{}</dc:title><dc:subject>{}</dc:subject><dc:creator>{}</dc:creator><cp:lastModifiedBy>{}</cp:lastModifiedBy><cp:revision>1</cp:revision></cp:coreProperties>"#,
        esc(title),
        esc(subject),
        esc(creator),
        esc(creator)
    )
}

pub fn app_props(slide_count: usize, notes_count: usize) -> String {
    format!(
        r#"{DECL}<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes"><Application>{}</Application><PresentationFormat>Custom</PresentationFormat><Slides>{slide_count}</Slides><Notes>{notes_count}</Notes><AppVersion>{}</AppVersion></Properties>"#,
        env!("CARGO_PKG_NAME"),
        app_version()
    )
}

/// `AppVersion` must look like `XX.YYYY`.
fn app_version() -> String {
    let major: u32 = env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0);
    let minor: u32 = env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0);
    format!("{:02}.{:04}", major, minor)
}

/// `presentation.xml`. Relationship ids follow [`presentation_rels`].
pub fn presentation(slide_count: usize, cx: i64, cy: i64, has_notes_master: bool) -> String {
    let mut out = format!(r#"{DECL}<p:presentation {NS_PML} saveSubsetFonts="1">"#);
    out.push_str(&format!(
        r#"<p:sldMasterIdLst><p:sldMasterId id="{FIRST_MASTER_ID}" r:id="rId1"/></p:sldMasterIdLst>"#
    ));
    if has_notes_master {
        out.push_str(&format!(
            r#"<p:notesMasterIdLst><p:notesMasterId r:id="rId{}"/></p:notesMasterIdLst>"#,
            slide_count + 2
        ));
    }
    if slide_count > 0 {
        out.push_str("<p:sldIdLst>");
        for i in 0..slide_count {
            out.push_str(&format!(
                r#"<p:sldId id="{}" r:id="rId{}"/>"#,
                FIRST_SLIDE_ID as usize + i,
                i + 2
            ));
        }
        out.push_str("</p:sldIdLst>");
    }
    out.push_str(&format!(r#"<p:sldSz cx="{cx}" cy="{cy}"/><p:notesSz cx="6858000" cy="9144000"/>"#));
    out.push_str("</p:presentation>");
    out
}

pub fn presentation_rels(slide_count: usize, has_notes_master: bool) -> String {
    let mut rels = vec![Rel::new("rId1", "slideMaster", "slideMasters/slideMaster1.xml")];
    for n in 1..=slide_count {
        rels.push(Rel::new(format!("rId{}", n + 1), "slide", format!("slides/slide{n}.xml")));
    }
    let mut next = slide_count + 2;
    if has_notes_master {
        rels.push(Rel::new(format!("rId{next}"), "notesMaster", "notesMasters/notesMaster1.xml"));
        next += 1;
    }
    for (kind, target) in [
        ("presProps", "presProps.xml"),
        ("viewProps", "viewProps.xml"),
        ("theme", "theme/theme1.xml"),
        ("tableStyles", "tableStyles.xml"),
    ] {
        rels.push(Rel::new(format!("rId{next}"), kind, target));
        next += 1;
    }
    relationships(&rels)
}

pub fn pres_props() -> String {
    format!(r#"{DECL}<p:presentationPr {NS_PML}/>"#)
}

pub fn view_props() -> String {
    format!(r#"{DECL}<p:viewPr {NS_PML}><p:gridSpacing cx="76200" cy="76200"/></p:viewPr>"#)
}

pub fn table_styles() -> String {
    format!(
        r#"{DECL}<a:tblStyleLst xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" def="{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}"/>"#
    )
}

pub fn slide_master() -> String {
    format!(
        r#"{DECL}<p:sldMaster {NS_PML}><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree>{EMPTY_GROUP}</p:spTree></p:cSld>{CLR_MAP}<p:sldLayoutIdLst><p:sldLayoutId id="{}" r:id="rId1"/></p:sldLayoutIdLst><p:txStyles><p:titleStyle/><p:bodyStyle/><p:otherStyle/></p:txStyles></p:sldMaster>"#,
        FIRST_MASTER_ID + 1
    )
}

pub fn slide_master_rels() -> String {
    relationships(&[
        Rel::new("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
        Rel::new("rId2", "theme", "../theme/theme1.xml"),
    ])
}

pub fn slide_layout() -> String {
    format!(
        r#"{DECL}<p:sldLayout {NS_PML} type="blank" preserve="1"><p:cSld name="Blank"><p:spTree>{EMPTY_GROUP}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
    )
}

pub fn slide_layout_rels() -> String {
    relationships(&[Rel::new("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")])
}

pub fn notes_master() -> String {
    format!(
        r#"{DECL}<p:notesMaster {NS_PML}><p:cSld><p:spTree>{EMPTY_GROUP}</p:spTree></p:cSld>{CLR_MAP}</p:notesMaster>"#
    )
}

pub fn notes_master_rels() -> String {
    relationships(&[Rel::new("rId1", "theme", "../theme/theme2.xml")])
}

/// A notes slide whose body placeholder holds `text`, one paragraph per line.
pub fn notes_slide(text: &str) -> String {
    let paragraphs: String = text
        .lines()
        .map(|line| {
            if line.is_empty() {
                r#"<a:p><a:endParaRPr lang="en-US" dirty="0"/></a:p>"#.to_string()
            } else {
                format!(r#"<a:p><a:r><a:rPr lang="en-US" dirty="0"/><a:t>{}</a:t></a:r></a:p>"#, esc(line))
            }
        })
        .collect();
    format!(
        r#"{DECL}<p:notes {NS_PML}><p:cSld><p:spTree>{EMPTY_GROUP}<p:sp><p:nvSpPr><p:cNvPr id="2" name="Slide Image Placeholder 1"/><p:cNvSpPr><a:spLocks noGrp="1" noRot="1" noChangeAspect="1"/></p:cNvSpPr><p:nvPr><p:ph type="sldImg"/></p:nvPr></p:nvSpPr><p:spPr/></p:sp><p:sp><p:nvSpPr><p:cNvPr id="3" name="Notes Placeholder 2"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>{paragraphs}</p:txBody></p:sp></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:notes>"#
    )
}

pub fn notes_slide_rels(slide_number: usize) -> String {
    relationships(&[
        Rel::new("rId1", "notesMaster", "../notesMasters/notesMaster1.xml"),
        Rel::new("rId2", "slide", format!("../slides/slide{slide_number}.xml")),
    ])
}

/// A slide: shapes are written in the order given, which is their z-order.
pub fn slide(shapes: &[SlideShape]) -> String {
    let mut tree = String::from(EMPTY_GROUP);
    for (i, shape) in shapes.iter().enumerate() {
        // id 1 is the group itself
        let id = i + 2;
        match shape {
            SlideShape::Picture(pic) => tree.push_str(&picture(id, pic)),
            SlideShape::Text(text) => tree.push_str(&text_box(id, text)),
        }
    }
    format!(
        r#"{DECL}<p:sld {NS_PML}><p:cSld><p:spTree>{tree}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}

fn xfrm(x: f64, y: f64, w: f64, h: f64) -> String {
    format!(
        r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
        emu(x),
        emu(y),
        emu(w).max(0),
        emu(h).max(0)
    )
}

fn picture(id: usize, pic: &Picture) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="{}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr>{}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
        esc(&pic.name),
        pic.rel_id,
        xfrm(pic.rect.x, pic.rect.y, pic.rect.w, pic.rect.h)
    )
}

fn text_box(id: usize, tb: &TextBox) -> String {
    let style = &tb.style;
    let inset = emu(style.margin).max(0);
    let algn = match style.align {
        HAlign::Left => "l",
        HAlign::Center => "ctr",
        HAlign::Right => "r",
    };
    let anchor = match style.valign {
        VAlign::Top => "t",
        VAlign::Middle => "ctr",
        VAlign::Bottom => "b",
    };
    // ST_TextFontSize: 1 pt to 4000 pt in hundredths.
    let sz = (style.font_size * 100.0).round().clamp(100.0, 400_000.0) as i64;
    let face = esc(&style.font_face);
    let run_props = format!(
        r#"<a:rPr lang="en-US" sz="{sz}" dirty="0"><a:solidFill><a:srgbClr val="{}"/></a:solidFill><a:latin typeface="{face}"/><a:ea typeface="{face}"/></a:rPr>"#,
        esc(&style.color)
    );
    let paragraphs: String = tb
        .text
        .split('\n')
        .map(|line| {
            format!(
                r#"<a:p><a:pPr algn="{algn}"/><a:r>{run_props}<a:t>{}</a:t></a:r></a:p>"#,
                esc(line.trim_end_matches('\r'))
            )
        })
        .collect();
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Text {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr>{}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr><p:txBody><a:bodyPr wrap="square" lIns="{inset}" tIns="{inset}" rIns="{inset}" bIns="{inset}" rtlCol="0" anchor="{anchor}"><a:noAutofit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#,
        xfrm(tb.rect.x, tb.rect.y, tb.rect.w, tb.rect.h)
    )
}

/// Office theme. `name` distinguishes the slide theme from the notes theme.
pub fn theme(name: &str) -> String {
    let solid = |c: &str| format!(r#"<a:solidFill><a:schemeClr val="{c}"/></a:solidFill>"#);
    let line = |w: u32| format!(r#"<a:ln w="{w}" cap="flat" cmpd="sng" algn="ctr">{}<a:prstDash val="solid"/></a:ln>"#, solid("phClr"));
    format!(
        r#"{DECL}<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="{}"><a:themeElements><a:clrScheme name="Office"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="44546A"/></a:dk2><a:lt2><a:srgbClr val="E7E6E6"/></a:lt2><a:accent1><a:srgbClr val="4472C4"/></a:accent1><a:accent2><a:srgbClr val="ED7D31"/></a:accent2><a:accent3><a:srgbClr val="A5A5A5"/></a:accent3><a:accent4><a:srgbClr val="FFC000"/></a:accent4><a:accent5><a:srgbClr val="5B9BD5"/></a:accent5><a:accent6><a:srgbClr val="70AD47"/></a:accent6><a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink></a:clrScheme><a:fontScheme name="Office"><a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst>{}{}{}</a:fillStyleLst><a:lnStyleLst>{}{}{}</a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst>{}{}{}</a:bgFillStyleLst></a:fmtScheme></a:themeElements><a:objectDefaults/><a:extraClrSchemeLst/></a:theme>"#,
        esc(name),
        solid("phClr"),
        solid("phClr"),
        solid("phClr"),
        line(6350),
        line(12700),
        line(19050),
        solid("phClr"),
        solid("phClr"),
        solid("phClr"),
    )
}

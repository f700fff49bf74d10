//! Font decoding for text runs: character codes → Unicode text and advances.
//!
//! Only what positioning needs is read from a font dictionary: the code
//! width (1 or 2 bytes), the glyph widths and a code-to-Unicode map.
//! Glyph outlines never matter here because text is re-set in a single
//! fallback face on the slide.

use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;
use tracing::debug;

/// Width used for codes that have no entry, in thousandths of an em.
const SIMPLE_DEFAULT_WIDTH: f64 = 500.0;
const CID_DEFAULT_WIDTH: f64 = 1000.0;

/// One decoded character code.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    /// Advance in thousandths of an em.
    pub width: f64,
    /// Single-byte code 32, the only code word spacing applies to.
    pub is_word_space: bool,
}

/// Decoding tables of one font resource.
#[derive(Debug, Clone, Default)]
pub struct FontInfo {
    two_byte: bool,
    first_char: u32,
    widths: Vec<f64>,
    cid_widths: HashMap<u32, f64>,
    default_width: f64,
    to_unicode: HashMap<u32, String>,
}

impl FontInfo {
    /// A font with no dictionary: single-byte WinAnsi, default widths.
    pub fn fallback() -> Self {
        Self {
            default_width: SIMPLE_DEFAULT_WIDTH,
            ..Default::default()
        }
    }

    /// Read a font dictionary.
    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let subtype = font
            .get(b"Subtype")
            .and_then(|o| o.as_name())
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_default();

        let mut info = if subtype == "Type0" {
            Self::composite(doc, font)
        } else {
            Self::simple(doc, font)
        };

        if let Ok(obj) = font.get(b"ToUnicode") {
            if let Ok((_, Object::Stream(stream))) = doc.dereference(obj) {
                let bytes = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                info.to_unicode = parse_to_unicode(&bytes);
            }
        }
        debug!(
            "Font {}: two_byte={} widths={} cmap={}",
            subtype,
            info.two_byte,
            info.widths.len() + info.cid_widths.len(),
            info.to_unicode.len()
        );
        info
    }

    fn simple(doc: &Document, font: &Dictionary) -> Self {
        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|o| number(doc, o))
            .unwrap_or(0.0) as u32;
        let widths = font
            .get(b"Widths")
            .ok()
            .and_then(|o| resolve_array(doc, o))
            .map(|arr| arr.iter().map(|w| number(doc, w).unwrap_or(0.0)).collect())
            .unwrap_or_default();
        let default_width = font
            .get(b"FontDescriptor")
            .ok()
            .and_then(|o| resolve_dict(doc, o))
            .and_then(|d| d.get(b"MissingWidth").ok().and_then(|o| number(doc, o)))
            .filter(|w| *w > 0.0)
            .unwrap_or(SIMPLE_DEFAULT_WIDTH);

        Self {
            two_byte: false,
            first_char,
            widths,
            default_width,
            ..Default::default()
        }
    }

    fn composite(doc: &Document, font: &Dictionary) -> Self {
        let descendant = font
            .get(b"DescendantFonts")
            .ok()
            .and_then(|o| resolve_array(doc, o))
            .and_then(|arr| arr.first().and_then(|d| resolve_dict(doc, d)));

        let mut info = Self {
            two_byte: true,
            default_width: CID_DEFAULT_WIDTH,
            ..Default::default()
        };

        if let Some(cid_font) = descendant {
            if let Some(dw) = cid_font.get(b"DW").ok().and_then(|o| number(doc, o)) {
                info.default_width = dw;
            }
            if let Some(w) = cid_font.get(b"W").ok().and_then(|o| resolve_array(doc, o)) {
                info.cid_widths = parse_cid_widths(doc, w);
            }
        }
        info
    }

    pub fn is_two_byte(&self) -> bool {
        self.two_byte
    }

    fn width_of(&self, code: u32) -> f64 {
        if self.two_byte {
            return self.cid_widths.get(&code).copied().unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }

    fn text_of(&self, code: u32) -> String {
        if let Some(s) = self.to_unicode.get(&code) {
            return s.clone();
        }
        if self.two_byte {
            // Identity-H without a CMap: no reliable mapping.
            return char::from_u32(code)
                .filter(|c| !c.is_control())
                .map(String::from)
                .unwrap_or_default();
        }
        win_ansi(code as u8).to_string()
    }

    /// Split a shown string into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| {
                    let code = match pair {
                        [hi, lo] => u32::from(*hi) << 8 | u32::from(*lo),
                        [single] => u32::from(*single),
                        _ => 0,
                    };
                    Glyph {
                        text: self.text_of(code),
                        width: self.width_of(code),
                        is_word_space: false,
                    }
                })
                .collect()
        } else {
            bytes
                .iter()
                .map(|&b| Glyph {
                    text: self.text_of(u32::from(b)),
                    width: self.width_of(u32::from(b)),
                    is_word_space: b == 32,
                })
                .collect()
        }
    }
}

fn number(doc: &Document, obj: &Object) -> Option<f64> {
    let obj = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn resolve_array<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Vec<Object>> {
    doc.dereference(obj).ok().and_then(|(_, o)| o.as_array().ok())
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    doc.dereference(obj).ok().and_then(|(_, o)| o.as_dict().ok())
}

/// `/W` array: `c [w1 w2 …]` and `c_first c_last w` forms.
fn parse_cid_widths(doc: &Document, w: &[Object]) -> HashMap<u32, f64> {
    let mut out = HashMap::new();
    let mut i = 0;
    while i < w.len() {
        let Some(first) = number(doc, &w[i]) else {
            break;
        };
        let first = first as u32;
        match w.get(i + 1) {
            Some(next) if resolve_array(doc, next).is_some() => {
                if let Some(list) = resolve_array(doc, next) {
                    for (k, width) in list.iter().enumerate() {
                        let Some(code) = u32::try_from(k).ok().and_then(|k| first.checked_add(k)) else {
                            break;
                        };
                        if let Some(width) = number(doc, width) {
                            out.insert(code, width);
                        }
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(width)) = (number(doc, last), w.get(i + 2).and_then(|o| number(doc, o))) else {
                    break;
                };
                for code in first..=(last as u32).min(first.saturating_add(0xFFFF)) {
                    out.insert(code, width);
                }
                i += 3;
            }
            None => break,
        }
    }
    out
}

/// Parse the `bfchar` and `bfrange` sections of a ToUnicode CMap.
pub fn parse_to_unicode(cmap: &[u8]) -> HashMap<u32, String> {
    let text = String::from_utf8_lossy(cmap);
    let tokens = tokenize(&text);
    let mut map = HashMap::new();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i].as_str() {
            "beginbfchar" => {
                i += 1;
                while i + 1 < tokens.len() && tokens[i] != "endbfchar" {
                    if let (Some(code), Some(dst)) = (hex_code(&tokens[i]), hex_utf16(&tokens[i + 1])) {
                        map.insert(code, dst);
                    }
                    i += 2;
                }
            }
            "beginbfrange" => {
                i += 1;
                while i + 2 < tokens.len() && tokens[i] != "endbfrange" {
                    let lo = hex_code(&tokens[i]);
                    let hi = hex_code(&tokens[i + 1]);
                    if tokens[i + 2] == "[" {
                        // <lo> <hi> [<dst> <dst> …]
                        let mut j = i + 3;
                        let mut code = lo.unwrap_or(0);
                        while j < tokens.len() && tokens[j] != "]" {
                            if let (Some(_), Some(dst)) = (lo, hex_utf16(&tokens[j])) {
                                map.insert(code, dst);
                            }
                            code = code.saturating_add(1);
                            j += 1;
                        }
                        i = j + 1;
                    } else {
                        if let (Some(lo), Some(hi)) = (lo, hi) {
                            if let Some(base) = hex_utf16_units(&tokens[i + 2]) {
                                for (offset, code) in (lo..=hi.min(lo.saturating_add(0xFFFF))).enumerate() {
                                    let mut units = base.clone();
                                    if let Some(last) = units.last_mut() {
                                        *last = last.wrapping_add(offset as u16);
                                    }
                                    map.insert(code, String::from_utf16_lossy(&units));
                                }
                            }
                        }
                        i += 3;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    map
}

/// Split CMap text into `<hex>`, `[`, `]` and bare-word tokens.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '<' => {
                let mut tok = String::from("<");
                for n in chars.by_ref() {
                    tok.push(n);
                    if n == '>' {
                        break;
                    }
                }
                tokens.push(tok);
            }
            '[' | ']' => tokens.push(c.to_string()),
            '%' => {
                for n in chars.by_ref() {
                    if n == '\n' || n == '\r' {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => {}
            _ => {
                let mut tok = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_whitespace() || matches!(n, '<' | '[' | ']') {
                        break;
                    }
                    tok.push(n);
                    chars.next();
                }
                tokens.push(tok);
            }
        }
    }
    tokens
}

fn hex_bytes(token: &str) -> Option<Vec<u8>> {
    let inner = token.strip_prefix('<')?.strip_suffix('>')?;
    let digits: String = inner.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
        .collect()
}

fn hex_code(token: &str) -> Option<u32> {
    let bytes = hex_bytes(token)?;
    if bytes.len() > 4 {
        return None;
    }
    Some(bytes.iter().fold(0u32, |acc, b| acc << 8 | u32::from(*b)))
}

fn hex_utf16_units(token: &str) -> Option<Vec<u16>> {
    let bytes = hex_bytes(token)?;
    if bytes.len() == 1 {
        return Some(vec![u16::from(bytes[0])]);
    }
    Some(
        bytes
            .chunks(2)
            .map(|p| match p {
                [hi, lo] => u16::from(*hi) << 8 | u16::from(*lo),
                [b] => u16::from(*b),
                _ => 0,
            })
            .collect(),
    )
}

fn hex_utf16(token: &str) -> Option<String> {
    hex_utf16_units(token).map(|u| String::from_utf16_lossy(&u))
}

/// WinAnsiEncoding. Codes 0x80–0x9F differ from Latin-1; the rest match it.
pub fn win_ansi(code: u8) -> char {
    const HIGH: [char; 32] = [
        '€', '\u{FFFD}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{FFFD}', 'Ž', '\u{FFFD}',
        '\u{FFFD}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ', '\u{FFFD}', 'ž', 'Ÿ',
    ];
    match code {
        0x80..=0x9F => HIGH[(code - 0x80) as usize],
        _ => char::from(code),
    }
}

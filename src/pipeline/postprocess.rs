//! Post-processing: turn model output into plain speaker-notes text.
//!
//! The prompt asks for plain text, but vision models still reach for
//! Markdown: fenced replies, `##` headings, `**bold**` labels. The notes pane
//! of a presentation shows those characters literally, so they are removed
//! here with cheap deterministic rules rather than more prompt wording.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so the fence regex
//! sees the raw reply; bullets are normalised before emphasis so a leading `* ` is
//! never read as an italic marker.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw model reply.
///
/// Rules (applied in order):
/// 1. Strip an outer code fence
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Drop heading markers, keep the heading text
/// 5. Normalise `*` and `+` bullets to `-`
/// 6. Drop bold / italic / inline-code markers, keep the text
/// 7. Trim trailing whitespace per line
/// 8. Collapse runs of blank lines to one
/// 9. Trim the whole note
pub fn clean_notes(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = strip_headings(&s);
    let s = normalise_bullets(&s);
    let s = strip_emphasis(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer code fence ───────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

// ── Rule 4: Heading markers ──────────────────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]+").unwrap());

fn strip_headings(input: &str) -> String {
    RE_HEADING.replace_all(input, "").into_owned()
}

// ── Rule 5: Bullets ──────────────────────────────────────────────────────────

static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^([ \t]*)[*+][ \t]+").unwrap());

fn normalise_bullets(input: &str) -> String {
    RE_BULLET.replace_all(input, "${1}- ").into_owned()
}

// ── Rule 6: Emphasis markers ─────────────────────────────────────────────────

static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\*\*|__)([^\n]+?)(\*\*|__)").unwrap());
static RE_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*\n]+)\*").unwrap());
static RE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").unwrap());

fn strip_emphasis(input: &str) -> String {
    let s = RE_BOLD.replace_all(input, "$2");
    let s = RE_ITALIC.replace_all(&s, "$1");
    RE_CODE.replace_all(&s, "$1").into_owned()
}

// ── Rule 7: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

// ── Rule 8: Collapse blank lines ─────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

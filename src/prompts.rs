//! Prompts for speaker-notes generation.
//!
//! Callers can override the default via [`crate::config::NotesConfig::system_prompt`];
//! the constant here is used only when no override is provided.

/// Default instruction sent with each background plate.
pub const DEFAULT_NOTES_PROMPT: &str = r#"You are a presentation assistant. The image is one slide of a presentation.

Write speaker notes for this slide:
- Summarise the key message of the slide concisely, in the language used on the slide.
- If the slide contains a chart or graph, describe its main trend or takeaway.
- Use a professional tone suitable for reading aloud.
- Output plain text only. Do NOT use Markdown, bullet symbols, headings or code fences.
- Do NOT mention that you are looking at an image."#;

/// The user message accompanying the plate for one page.
pub fn notes_user_message(page_num: usize) -> String {
    format!("Slide {page_num}: write the speaker notes.")
}

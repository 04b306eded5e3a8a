//! Plain-text manuscript rendering for best-effort backups.
//!
//! # Responsibility
//! - Strip editor HTML into readable text.
//! - Derive the backup file location from a project file path.
//!
//! # Invariants
//! - Block-level tags and `<br>` become line breaks; other tags vanish.
//! - Entities are decoded after tags are stripped, so escaped markup such as
//!   `&lt;p&gt;` comes out as literal `<p>` text.

use crate::model::project::Chapter;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static BLOCK_BREAK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|blockquote)\s*>").expect("valid block regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static BLANK_LINES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n(\s*\n)+").expect("valid blank-line regex"));

const BACKUP_EXTENSION: &str = "backup.txt";
const CHAPTER_SEPARATOR: &str = "\n\n* * *\n\n";

/// Converts editor HTML to plain text.
pub fn html_to_text(html: &str) -> String {
    let with_breaks = BLOCK_BREAK_RE.replace_all(html, "\n");
    let stripped = TAG_RE.replace_all(&with_breaks, "");
    let decoded = decode_entities(&stripped);
    let collapsed = BLANK_LINES_RE.replace_all(&decoded, "\n\n");
    collapsed.trim().to_string()
}

/// Renders every chapter as its title, a blank line, then its text.
pub fn render_manuscript(chapters: &[Chapter]) -> String {
    let mut rendered = chapters
        .iter()
        .map(|chapter| {
            let body = html_to_text(&chapter.content);
            if body.is_empty() {
                chapter.title.clone()
            } else {
                format!("{}\n\n{}", chapter.title, body)
            }
        })
        .collect::<Vec<_>>()
        .join(CHAPTER_SEPARATOR);
    rendered.push('\n');
    rendered
}

/// `<dir>/<stem>.backup.txt` for a project file at `<dir>/<stem>.<ext>`.
pub fn backup_path_for(project_path: &Path) -> PathBuf {
    project_path.with_extension(BACKUP_EXTENSION)
}

fn decode_entities(text: &str) -> String {
    // `&amp;` last so `&amp;lt;` decodes to `&lt;`, not `<`.
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

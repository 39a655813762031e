//! Visible-text extraction from HTML.

use scraper::{ElementRef, Html};

/// Elements whose subtrees never count as page content.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "noscript", "template",
];

/// Extract visible text from a full HTML document.
///
/// Text nodes are whitespace-normalized and joined with single spaces.
pub fn extract_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut parts = Vec::new();
    collect_text(doc.root_element(), &mut parts);
    parts.join(" ")
}

/// Same as [`extract_text`], for fragments such as feed summaries.
pub fn extract_fragment_text(html: &str) -> String {
    let doc = Html::parse_fragment(html);
    let mut parts = Vec::new();
    collect_text(doc.root_element(), &mut parts);
    parts.join(" ")
}

fn collect_text(element: ElementRef<'_>, out: &mut Vec<String>) {
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if !SKIPPED_TAGS.contains(&child_el.value().name()) {
                collect_text(child_el, out);
            }
        } else if let Some(text) = child.value().as_text() {
            let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !normalized.is_empty() {
                out.push(normalized);
            }
        }
    }
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

//! Document extraction from free-form generated text.

const DOCTYPE_OPEN: &str = "<!doctype html";
const HTML_OPEN: &str = "<html";
const HTML_CLOSE: &str = "</html>";
const FENCE: &str = "```";

/// Extract a runnable document or program from generated text.
///
/// Search order:
/// 1. a complete document, from the first `<!doctype html` / `<html` opening
///    through the first following `</html>` (case-insensitive), returned
///    byte-for-byte;
/// 2. the content of the first fenced code block, trimmed;
/// 3. the trimmed input.
pub fn extract_document(text: &str) -> String {
    if let Some(document) = find_complete_document(text) {
        return document.to_string();
    }

    if let Some(block) = find_fenced_block(text) {
        return block.trim().to_string();
    }

    text.trim().to_string()
}

/// Whether `text` is itself a complete HTML document (as opposed to a program).
pub fn is_complete_document(text: &str) -> bool {
    let lower = text.trim_start().to_ascii_lowercase();
    lower.starts_with(DOCTYPE_OPEN) || starts_with_html_tag(&lower)
}

fn find_complete_document(text: &str) -> Option<&str> {
    // ASCII lowercasing keeps byte offsets identical to `text`.
    let lower = text.to_ascii_lowercase();

    let doctype = lower.find(DOCTYPE_OPEN);
    let html = find_html_open(&lower);
    let start = match (doctype, html) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };

    let end = lower[start..].find(HTML_CLOSE)? + start + HTML_CLOSE.len();
    Some(&text[start..end])
}

/// Find `<html` followed by `>` or whitespace, so `<htmlfoo` does not count.
fn find_html_open(lower: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(pos) = lower[offset..].find(HTML_OPEN) {
        let start = offset + pos;
        if starts_with_html_tag(&lower[start..]) {
            return Some(start);
        }
        offset = start + HTML_OPEN.len();
    }
    None
}

fn starts_with_html_tag(lower: &str) -> bool {
    lower
        .strip_prefix(HTML_OPEN)
        .and_then(|rest| rest.chars().next())
        .map(|c| c == '>' || c.is_whitespace())
        .unwrap_or(false)
}

fn find_fenced_block(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let after_fence = open + FENCE.len();
    let rest = &text[after_fence..];

    // An optional language tag runs to the end of the opening line.
    let content_start = match rest.find('\n') {
        Some(newline) if is_language_tag(rest[..newline].trim_end()) => after_fence + newline + 1,
        _ => after_fence,
    };

    let close = text[content_start..].find(FENCE)? + content_start;
    Some(&text[content_start..close])
}

fn is_language_tag(tag: &str) -> bool {
    tag.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.'))
}

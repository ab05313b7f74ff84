use webbrief_core::{Error, Result, ScrapeResult};

/// Elements whose text never counts as page content.
const NOISE_ELEMENTS: [&str; 4] = ["script", "style", "nav", "footer"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Html,
    PlainText,
}

fn content_type_lc_prefix(ct: &str) -> String {
    ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

/// Best-effort guess for whether bytes are HTML-ish.
pub fn bytes_look_like_html(bytes: &[u8]) -> bool {
    let mut i = 0usize;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() {
        return false;
    }
    let rest = &bytes[i..];
    rest.starts_with(b"<!doctype")
        || rest.starts_with(b"<!DOCTYPE")
        || rest.starts_with(b"<html")
        || rest.starts_with(b"<HTML")
        || rest.starts_with(b"<head")
        || rest.starts_with(b"<body")
}

/// Content-type gate. Decides from the declared media type alone; the body is only sniffed
/// when the header is missing.
///
/// The error carries the declared content type verbatim (or `unknown`).
pub fn classify_content(content_type: Option<&str>, bytes: &[u8]) -> Result<PageKind> {
    let Some(ct) = content_type.map(str::trim).filter(|s| !s.is_empty()) else {
        if bytes_look_like_html(bytes) {
            return Ok(PageKind::Html);
        }
        return Err(Error::UnsupportedContentType("unknown".to_string()));
    };
    match content_type_lc_prefix(ct).as_str() {
        "text/html" | "application/xhtml+xml" => Ok(PageKind::Html),
        "text/plain" => Ok(PageKind::PlainText),
        _ => Err(Error::UnsupportedContentType(ct.to_string())),
    }
}

fn is_noise(node: &html_scraper::Node) -> bool {
    node.as_element()
        .is_some_and(|el| NOISE_ELEMENTS.contains(&el.name()))
}

/// Concatenate the text of every `<p>` (joined with single spaces, trimmed).
///
/// Text under script/style/nav/footer is skipped, including paragraphs nested inside them.
pub fn paragraph_text(html: &str) -> String {
    let doc = html_scraper::Html::parse_document(html);
    let Ok(sel) = html_scraper::Selector::parse("p") else {
        return String::new();
    };

    let mut parts: Vec<String> = Vec::new();
    for p in doc.select(&sel) {
        if p.ancestors().any(|a| is_noise(a.value())) {
            continue;
        }
        let mut text = String::new();
        for node in p.descendants() {
            let Some(t) = node.value().as_text() else {
                continue;
            };
            // Stop at the paragraph itself; anything above it was checked already.
            let hidden = node
                .ancestors()
                .take_while(|a| a.id() != p.id())
                .any(|a| is_noise(a.value()));
            if !hidden {
                text.push_str(t);
            }
        }
        parts.push(text);
    }
    parts.join(" ").trim().to_string()
}

/// Truncate to at most `max_chars` Unicode scalar values.
pub fn truncate_chars(s: &str, max_chars: usize) -> (String, bool) {
    if max_chars == 0 {
        return (String::new(), !s.is_empty());
    }
    match s.char_indices().nth(max_chars) {
        Some((byte, _)) => (s[..byte].to_string(), true),
        None => (s.to_string(), false),
    }
}

/// Run the content gate and extraction over a fetched body.
///
/// Returns `Ok(None)` when the page has no main text.
pub fn scrape_text(
    bytes: &[u8],
    content_type: Option<&str>,
    max_chars: usize,
) -> Result<Option<ScrapeResult>> {
    let kind = classify_content(content_type, bytes)?;
    let body = String::from_utf8_lossy(bytes);
    let full = match kind {
        PageKind::Html => paragraph_text(&body),
        PageKind::PlainText => body.trim().to_string(),
    };
    if full.is_empty() {
        return Ok(None);
    }
    let (text, truncated) = truncate_chars(&full, max_chars);
    Ok(Some(ScrapeResult { text, truncated }))
}

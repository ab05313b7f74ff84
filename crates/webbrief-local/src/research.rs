//! Turn an ordered set of search results into the human-readable research summary.

use webbrief_core::SearchResult;

pub const NO_SUMMARY_FALLBACK: &str = "No summary available.";

/// Title-case like a word-per-word capitalizer: a letter is uppercased when the character
/// before it is not a letter, and lowercased otherwise.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(ch);
            prev_is_letter = false;
        }
    }
    out
}

/// Display label for the site a result was found on:
/// `https://www.foo.com/x` → `Foo`.
///
/// Internationalized hosts are labelled in Unicode, not punycode. Returns `None` when the link
/// does not parse or has no host.
pub fn site_label(link: &str) -> Option<String> {
    let url = url::Url::parse(link.trim()).ok()?;
    let (host, _) = idna::domain_to_unicode(url.host_str()?);
    let host = host.as_str();
    let host = host.strip_prefix("www.").unwrap_or(host);
    let first = host.split('.').next().unwrap_or("");
    if first.is_empty() {
        return None;
    }
    Some(title_case(first))
}

/// One bullet per result, in order. Results without a title or a usable link are skipped.
pub fn source_lines(results: &[SearchResult]) -> Vec<String> {
    results
        .iter()
        .filter_map(|r| {
            let title = r.title.as_deref()?;
            let site = site_label(r.link.as_deref()?)?;
            Some(format!("- **{title}** (found on {site})"))
        })
        .collect()
}

/// Compose the final research message. Callers handle the empty-results case.
pub fn compose_summary(query: &str, results: &[SearchResult]) -> String {
    let lead = results
        .first()
        .and_then(|r| r.snippet.as_deref())
        .unwrap_or(NO_SUMMARY_FALLBACK);
    let sources = source_lines(results).join("\n");
    format!(
        "Based on my research for **'{query}'**, here is a summary:\n\n\
         {lead}\n\n\
         ---\n\
         ### Where to Learn More\n\
         You can find more detailed information on this topic from these top sources:\n\
         {sources}"
    )
}

pub fn no_results_message(query: &str) -> String {
    format!("No results found for '{query}'.")
}

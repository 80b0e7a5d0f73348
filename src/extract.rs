//! Best-effort ISBN recovery from rendered product descriptions.
//!
//! Descriptions arrive as store-rendered HTML. The ebook ISBN, when present,
//! is advertised in the visible text as `ISBN (eBook): 978-...`. Stripping
//! tags first keeps the label match from breaking when the number is split
//! across inline markup.

use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static ISBN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ISBN \(eBook\):\s*([0-9\-]{10,})").expect("isbn regex"));

/// Reduce an HTML fragment to plain text: drop tags, decode the common
/// entities, collapse whitespace. Best effort; never fails.
pub fn strip_html(html: &str) -> String {
    let text = TAG_RE.replace_all(html, " ");
    let text = decode_entities(&text);
    WS_RE.replace_all(text.trim(), " ").into_owned()
}

fn decode_entities(s: &str) -> String {
    // &amp; last so entity-encoded entities don't double-decode.
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Extract the ebook ISBN advertised in a plain-text description.
///
/// Matches the literal label `ISBN (eBook):` followed by at least ten digits
/// or hyphens and returns the span with hyphens removed. This is a heuristic
/// label match, not a checksum-validated ISBN; `None` is the normal outcome
/// for products that don't advertise one.
pub fn extract_ebook_isbn(text: &str) -> Option<String> {
    ISBN_RE.captures(text).map(|c| c[1].replace('-', ""))
}

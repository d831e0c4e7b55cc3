//! Text neutralization for storage and for HTML output.
//!
//! Storage sanitizing (`sanitize_title`, `sanitize_body`, `sanitize_url`)
//! runs in the mapper before anything is persisted. HTML escaping
//! (`escape_html`) runs again at render time. The two are independent:
//! stored text is plain text, never pre-escaped markup.

use regex::Regex;
use std::sync::LazyLock;

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("valid regex")
});

// Only `<` followed by a letter, `/`, `!` or `?` opens a tag, so plain
// comparisons such as `a < b` survive.
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[a-zA-Z/!?][^>]*>").expect("valid regex"));

// A `<tag` with no closing `>` before the end of input is still markup.
static DANGLING_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[a-zA-Z/!?][^>]*$").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Remove markup. `<script>` and `<style>` elements are dropped with their
/// contents; other tags are dropped and their inner text kept.
pub fn strip_tags(input: &str) -> String {
    let without_blocks = SCRIPT_OR_STYLE.replace_all(input, "");
    let stripped = TAG.replace_all(&without_blocks, "");
    DANGLING_TAG.replace(&stripped, "").into_owned()
}

/// Single-line text: markup stripped, all whitespace runs collapsed to one
/// space, trimmed.
pub fn sanitize_title(input: &str) -> String {
    let stripped = strip_tags(input);
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Multi-line text: markup stripped, line breaks preserved.
pub fn sanitize_body(input: &str) -> String {
    let normalized = input.replace("\r\n", "\n").replace('\r', "\n");
    let stripped = strip_tags(&normalized);
    stripped
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Accept only absolute `http`/`https` URLs with a host.
pub fn sanitize_url(input: &str) -> Option<String> {
    let parsed = url::Url::parse(input.trim()).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Some(parsed.to_string()),
        _ => None,
    }
}

/// Escape text for HTML element content and quoted attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

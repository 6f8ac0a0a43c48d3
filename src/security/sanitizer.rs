//! HTML/script sanitization for untrusted text.
//!
//! # Responsibilities
//! - Strip dangerous markup (script/iframe/object/embed/form, hostile URI
//!   schemes, inline event handlers, CSS `expression()`)
//! - Escape the HTML-significant characters
//! - Classify text against an XSS signature battery
//!
//! # Design Decisions
//! - Pure functions, no state; never panic on any input
//! - Stripping repeats until the output is stable, so fragments such as
//!   `<scr<script>ipt>` cannot reassemble into a tag. Passes are capped;
//!   anything still dangerous after the cap has its trigger characters
//!   entity-encoded in one final pass
//! - Detection runs on the raw input, before any escaping

use std::borrow::Cow;
use std::sync::LazyLock;

use url::Url;

use crate::security::signature::{self, Signature};
use crate::security::verdict::Verdict;

pub const XSS_REJECTION_MESSAGE: &str = "Input contains potentially malicious content";

const MAX_FILE_NAME_LEN: usize = 255;

const MAX_STRIP_PASSES: usize = 4;

/// Constructs removed by [`sanitize_html`], applied in this order.
pub static DANGEROUS_CONSTRUCTS: LazyLock<Vec<Signature>> = LazyLock::new(|| {
    signature::compile(&[
        ("script_element", r"(?is)<script\b[^>]*>.*?</script\s*>"),
        ("iframe_element", r"(?is)<iframe\b[^>]*>.*?</iframe\s*>"),
        ("object_element", r"(?is)<object\b[^>]*>.*?</object\s*>"),
        ("form_element", r"(?is)<form\b[^>]*>.*?</form\s*>"),
        ("script_tag", r"(?i)</?script[^>]*>?"),
        ("embedded_tag", r"(?i)</?(?:iframe|object|embed|form)\b[^>]*>?"),
        ("dangerous_scheme", r"(?i)\b(?:javascript|vbscript|data|file)\s*:"),
        (
            "event_handler",
            r#"(?i)\bon[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]*)"#,
        ),
        ("css_expression", r"(?i)expression\s*\([^)]*\)"),
    ])
});

/// Attack signatures checked by [`has_xss`].
pub static XSS_SIGNATURES: LazyLock<Vec<Signature>> = LazyLock::new(|| {
    signature::compile(&[
        ("script_tag", r"(?i)<\s*/?\s*script"),
        ("encoded_script_tag", r"(?i)(?:&lt;|%3c|\\u003c)\s*/?\s*script"),
        ("javascript_uri", r"(?i)javascript\s*:"),
        ("vbscript_uri", r"(?i)vbscript\s*:"),
        ("data_html_uri", r"(?i)data\s*:\s*text/html"),
        ("event_handler", r"(?i)\bon[a-z]+\s*="),
        (
            "embedded_element",
            r"(?i)<\s*(?:iframe|object|embed|applet|form|meta|base|link)\b",
        ),
        ("svg_element", r"(?i)<\s*svg\b"),
        ("css_expression", r"(?i)expression\s*\("),
        ("eval_call", r"(?i)\beval\s*\("),
        ("cookie_access", r"(?i)document\s*\.\s*cookie"),
    ])
});

fn strip_once(input: &str) -> String {
    let mut current = Cow::Borrowed(input);
    for construct in DANGEROUS_CONSTRUCTS.iter() {
        if let Cow::Owned(replaced) = construct.regex.replace_all(&current, "") {
            current = Cow::Owned(replaced);
        }
    }
    current.into_owned()
}

/// Every dangerous construct needs one of `<`, `:`, `=` or `(`.
fn neutralize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            ':' => out.push_str("&#58;"),
            '=' => out.push_str("&#61;"),
            '(' => out.push_str("&#40;"),
            other => out.push(other),
        }
    }
    out
}

/// Remove dangerous markup from raw text.
pub fn sanitize_html(input: &str) -> String {
    let mut current = input.to_owned();
    for _ in 0..MAX_STRIP_PASSES {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }

    if DANGEROUS_CONSTRUCTS.iter().any(|c| c.is_match(&current)) {
        tracing::debug!(len = current.len(), "Nested markup survived stripping, neutralizing");
        return neutralize(&current);
    }
    current
}

/// Replace `& < > " ' /` with HTML entities.
pub fn escape_html(input: &str) -> String {
    html_escape::encode_safe(input).into_owned()
}

/// Escape, then strip what survives escaping (URI schemes, handlers, expressions).
pub fn sanitize_user_input(input: &str) -> String {
    sanitize_html(&escape_html(input))
}

/// True when the raw input matches any XSS signature.
pub fn has_xss(input: &str) -> bool {
    xss_signature(input).is_some()
}

/// Name of the first XSS signature the input matches.
pub fn xss_signature(input: &str) -> Option<&'static str> {
    signature::first_match(&XSS_SIGNATURES, input)
}

/// Refuse text with XSS signatures; otherwise return it escaped and stripped.
pub fn validate_and_sanitize_text(input: &str) -> Verdict {
    if has_xss(input) {
        return Verdict::invalid(XSS_REJECTION_MESSAGE);
    }
    Verdict::valid(sanitize_user_input(input))
}

/// Make an upload file name safe for object storage keys.
pub fn sanitize_file_name(name: &str) -> String {
    let mut cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", ".");
    }

    // Only ASCII survives the map above, so byte and char counts agree.
    let result: String = cleaned
        .trim_start_matches('.')
        .chars()
        .take(MAX_FILE_NAME_LEN)
        .collect();

    if result.is_empty() {
        "file".to_string()
    } else {
        result
    }
}

/// Accept absolute http/https/mailto URLs and root-relative paths.
pub fn is_safe_url(input: &str) -> bool {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.starts_with('/') {
        // `//host` and `/\host` are protocol-relative in browsers.
        return !trimmed.starts_with("//") && !trimmed.starts_with("/\\");
    }
    match Url::parse(trimmed) {
        Ok(url) => matches!(url.scheme(), "http" | "https" | "mailto"),
        Err(_) => false,
    }
}

//! SQL injection heuristics for text bound for structured queries.
//!
//! # Responsibilities
//! - Flag statement-shaped SQL fragments, tautologies, timing probes
//! - Soft cleanup of separators, comment markers and bare OR/AND
//! - Allow-list validation for record identifiers
//!
//! # Design Decisions
//! - Defense in depth only: persistence must still bind parameters
//! - Keywords are matched in statement shape (`drop table`, `union select`),
//!   not alone, so ordinary prose and single words pass

use std::sync::LazyLock;

use crate::security::signature::{self, Signature};
use crate::security::verdict::Verdict;

pub const SQL_REJECTION_MESSAGE: &str = "Input contains potentially dangerous SQL patterns";
pub const SUSPICIOUS_COMBINATION_MESSAGE: &str = "Input contains suspicious character combinations";

const MAX_ID_LEN: usize = 128;

/// Signatures checked by [`has_sql_injection`].
pub static SQL_SIGNATURES: LazyLock<Vec<Signature>> = LazyLock::new(|| {
    signature::compile(&[
        ("numeric_tautology", r"(?i)\b(?:or|and)\b\s+\d+\s*=\s*\d+"),
        ("quoted_tautology", r"(?i)'\s*(?:or|and)\b\s*'[^']*'\s*=\s*'"),
        ("union_select", r"(?i)\bunion\b(?:\s+all)?\s+select\b"),
        (
            "stacked_statement",
            r"(?i);\s*(?:drop|delete|insert|update|alter|create|truncate|exec|shutdown)\b",
        ),
        (
            "ddl_statement",
            r"(?i)\b(?:drop|alter|truncate|create)\s+(?:table|database|schema|index|view|user)\b",
        ),
        ("insert_statement", r"(?i)\binsert\s+into\b"),
        ("delete_statement", r"(?i)\bdelete\s+from\b"),
        ("update_statement", r"(?i)\bupdate\s+\w+\s+set\b"),
        (
            "select_statement",
            r"(?i)\bselect\s+(?:\*|\w+(?:\s*,\s*\w+)*)\s+from\s+\w+",
        ),
        ("stored_procedure", r"(?i)\bexec(?:ute)?\s*\(?\s*(?:xp_|sp_)\w+"),
        ("waitfor_delay", r"(?i)\bwaitfor\s+delay\b"),
        ("sleep_function", r"(?i)\b(?:sleep|pg_sleep|benchmark)\s*\("),
        ("quote_comment", r"'\s*(?:--|#|/\*)"),
        ("char_function", r"(?i)\b(?:char|nchar|chr)\s*\(\s*\d+"),
        ("schema_probe", r"(?i)\b(?:information_schema|sysobjects|pg_catalog)\b"),
    ])
});

static SOFT_CLEANUP: LazyLock<Vec<Signature>> = LazyLock::new(|| {
    signature::compile(&[
        ("statement_separator", r";"),
        ("line_comment", r"--"),
        ("block_comment", r"/\*|\*/"),
        ("boolean_keyword", r"(?i)\b(?:or|and)\b"),
    ])
});

/// True when the input matches any SQL signature.
pub fn has_sql_injection(input: &str) -> bool {
    sql_signature(input).is_some()
}

/// Name of the first SQL signature the input matches.
pub fn sql_signature(input: &str) -> Option<&'static str> {
    signature::first_match(&SQL_SIGNATURES, input)
}

/// Strip `;`, `--`, `/* */` and bare OR/AND. Cosmetic, never a defense on its own.
pub fn sanitize_input(input: &str) -> String {
    let mut cleaned = input.to_owned();
    for pattern in SOFT_CLEANUP.iter() {
        cleaned = pattern.regex.replace_all(&cleaned, "").into_owned();
    }
    cleaned.trim().to_string()
}

/// Identifier allow-list: ASCII letters, digits, `_` and `-`.
pub fn validate_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn has_quote_and_comment(input: &str) -> bool {
    let has_quote = input.contains('\'') || input.contains('"');
    let has_comment = input.contains("--") || input.contains("/*");
    has_quote && has_comment
}

/// Refuse SQL signatures and quote-plus-comment combinations.
///
/// Accepted input is returned unchanged in `sanitized`.
pub fn validate_safe_input(input: &str) -> Verdict {
    if has_sql_injection(input) {
        return Verdict::invalid(SQL_REJECTION_MESSAGE);
    }
    if has_quote_and_comment(input) {
        return Verdict::invalid(SUSPICIOUS_COMBINATION_MESSAGE);
    }
    Verdict::valid(input)
}

//! Turning free-form model output into structured results.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

pub const UNKNOWN_DOCUMENT_TYPE: &str = "Неизвестный тип";

/// Answers the model gives when it found nothing.
const EMPTY_SENTINELS: &[&str] = &[
    "нет ошибок",
    "ошибок нет",
    "нет",
    "отсутствует",
    "отсутствуют",
    "none",
    "no mistakes",
    "no errors",
    "no fraud",
    "n/a",
    "empty string",
];

static RE_LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+").unwrap());

fn strip_quotes(item: &str) -> &str {
    item.trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '«' | '»' | '“' | '”' | '`'))
        .trim()
}

fn is_sentinel(item: &str) -> bool {
    let lowered = item.trim_end_matches('.').to_lowercase();
    EMPTY_SENTINELS.contains(&lowered.as_str())
}

/// Parses a semicolon (or line) separated list.
///
/// Items are trimmed, list markers and surrounding quotes are removed,
/// empties and "nothing found" answers are dropped, duplicates keep their
/// first position.
pub fn parse_list(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split([';', '\n'])
        .map(|item| RE_LIST_MARKER.replace(item, ""))
        .map(|item| strip_quotes(&item).to_string())
        .filter(|item| !item.is_empty() && !is_sentinel(item))
        .filter(|item| seen.insert(item.to_lowercase()))
        .collect()
}

/// Reduces a classification answer to the bare type name.
pub fn parse_document_type(raw: &str) -> String {
    let first = raw.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let first = first
        .strip_prefix("RESPONSE:")
        .or_else(|| first.strip_prefix("Response:"))
        .unwrap_or(first);
    let cleaned = strip_quotes(first).trim_end_matches('.').trim();
    if cleaned.is_empty() {
        UNKNOWN_DOCUMENT_TYPE.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Trims a free-text summary; empty means no summary.
pub fn parse_summary(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

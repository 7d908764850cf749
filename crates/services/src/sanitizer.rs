//! # Term Sanitizer
//!
//! Turns a free-text query into a boolean-mode match expression for the
//! fallback matcher. Pure string transformation; never fails.

/// Characters with operator meaning in boolean-mode matching.
/// Stripped before tokenization so user input cannot inject operators.
const RESERVED: [char; 8] = ['-', '+', '<', '>', '@', '(', ')', '~'];

/// Sanitize a raw query into a match expression: reserved operators are
/// removed, each whitespace-delimited token becomes a required prefix
/// match (`foo` → `+foo*`), tokens are rejoined with single spaces.
///
/// Empty or operator-only input yields an empty expression, which
/// callers must treat as "no constraint → empty result set".
pub fn boolean_match_expr(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| !RESERVED.contains(c)).collect();

    cleaned
        .split_whitespace()
        .map(|token| format!("+{token}*"))
        .collect::<Vec<_>>()
        .join(" ")
}

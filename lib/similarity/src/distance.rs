//! String similarity functions
//!
//! Scores are on the 0 to 100 integer scale used throughout the matching
//! pipeline, returned as `f64` so they can feed the classifier directly.

use similar::{Algorithm, TextDiff};

/// Character sequence similarity of two strings, 0 to 100.
///
/// Twice the number of matching characters over the total length,
/// rounded. Empty input on either side scores 0.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_chars(a, b);
    (f64::from(diff.ratio()) * 100.0).round()
}

/// Normalize a string for token comparison: every character that is not a
/// letter or digit becomes a space, the rest is lowercased, then trimmed.
pub fn full_process(s: &str) -> String {
    let mapped: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .flat_map(char::to_lowercase)
        .collect();
    mapped.trim().to_string()
}

/// Tokens of the processed string, sorted and joined by single spaces
pub fn sorted_tokens(s: &str) -> String {
    let processed = full_process(s);
    let mut tokens: Vec<&str> = processed.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Order-insensitive fuzzy similarity, 0 to 100.
///
/// Both strings are processed, split into tokens, the tokens sorted and
/// rejoined, then compared with [`ratio`]. A string that processes to
/// nothing scores 0.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_identical() {
        assert_eq!(ratio("acme corp", "acme corp"), 100.0);
    }

    #[test]
    fn test_ratio_empty_is_zero() {
        assert_eq!(ratio("", "abc"), 0.0);
        assert_eq!(ratio("abc", ""), 0.0);
        assert_eq!(ratio("", ""), 0.0);
    }

    #[test]
    fn test_ratio_partial() {
        // 2 * 3 matching chars / 8 total
        assert_eq!(ratio("abcd", "abce"), 75.0);
        assert_eq!(ratio("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_full_process() {
        assert_eq!(full_process("  PT. Sumber-Makmur!! "), "pt  sumber makmur");
        assert_eq!(full_process("***"), "");
    }

    #[test]
    fn test_token_sort_ignores_order_and_case() {
        assert_eq!(token_sort_ratio("Sumber Makmur PT", "pt sumber makmur"), 100.0);
        assert_eq!(token_sort_ratio("John Smith", "smith, john"), 100.0);
    }

    #[test]
    fn test_token_sort_symbol_only_is_zero() {
        assert_eq!(token_sort_ratio("!!!", "abc"), 0.0);
    }

    #[test]
    fn test_token_sort_range() {
        let s = token_sort_ratio("toko jaya abadi", "toko jaya abadl");
        assert!(s > 85.0 && s < 100.0);
    }
}

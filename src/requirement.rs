//! Requirement identifiers
//!
//! Both producers (diagram parser and code scanner) recognise use-case ids
//! written as `UC01` or `UC-01` and store them in the separator-free form.

use regex::Regex;
use std::sync::OnceLock;

fn re_requirement_id() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"UC-?(\d+)").expect("requirement id regex"))
}

/// Normalize a single requirement id (`UC-07` -> `UC07`).
///
/// Returns `None` when the text does not contain a requirement id. Leading
/// zeros are kept as written.
pub fn normalize_requirement_id(raw: &str) -> Option<String> {
    re_requirement_id()
        .captures(raw)
        .and_then(|cap| cap.get(1))
        .map(|digits| format!("UC{}", digits.as_str()))
}

/// Extract every requirement id in `text`, in document order.
pub fn extract_requirement_ids(text: &str) -> Vec<String> {
    re_requirement_id()
        .captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .map(|digits| format!("UC{}", digits.as_str()))
        .collect()
}

/// True when `raw` is exactly a requirement id, with or without separator.
pub fn is_requirement_id(raw: &str) -> bool {
    let raw = raw.trim();
    re_requirement_id()
        .find(raw)
        .map(|m| m.start() == 0 && m.end() == raw.len())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator_is_stripped() {
        assert_eq!(normalize_requirement_id("UC-07"), Some("UC07".to_string()));
        assert_eq!(normalize_requirement_id("UC07"), Some("UC07".to_string()));
    }

    #[test]
    fn test_leading_zeros_are_kept() {
        assert_eq!(normalize_requirement_id("UC-001"), Some("UC001".to_string()));
        assert_ne!(normalize_requirement_id("UC-01"), normalize_requirement_id("UC-1"));
    }

    #[test]
    fn test_extract_in_document_order() {
        let ids = extract_requirement_ids("UC-02, UC04 and UC-07");
        assert_eq!(ids, vec!["UC02", "UC04", "UC07"]);
    }

    #[test]
    fn test_no_id() {
        assert_eq!(normalize_requirement_id("Trace: []"), None);
        assert!(extract_requirement_ids("nothing here").is_empty());
    }

    #[test]
    fn test_is_requirement_id() {
        assert!(is_requirement_id("UC-01"));
        assert!(is_requirement_id("UC01"));
        assert!(!is_requirement_id("Register"));
        assert!(!is_requirement_id("UC01_extra"));
    }
}

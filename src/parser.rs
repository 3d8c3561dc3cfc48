//! Pattern-based extraction of records from raw log lines.

use crate::error::{Error, Result};
use regex::Regex;
use tracing::trace;

/// Stateless extractor: applies one pattern to a line and yields the
/// selected capture groups, or the whole match when no groups are
/// configured. A non-matching line yields nothing and is dropped silently.
#[derive(Debug)]
pub struct RecordExtractor {
    pattern: Regex,
    groups: Vec<usize>,
}

impl RecordExtractor {
    /// Compile the pattern and validate the requested capture groups
    /// against it. Both failures are fatal at startup.
    pub fn new(pattern: &str, groups: Vec<usize>) -> Result<Self> {
        let pattern = Regex::new(pattern)?;
        let available = pattern.captures_len();
        if let Some(&bad) = groups.iter().find(|&&group| group >= available) {
            return Err(Error::Config {
                message: format!(
                    "capture group {bad} is out of range; the pattern defines {} group(s)",
                    available - 1
                ),
            });
        }
        Ok(Self { pattern, groups })
    }

    /// Extract zero or more derived strings from one line.
    pub fn extract(&self, line: &str) -> Vec<String> {
        let Some(captures) = self.pattern.captures(line) else {
            trace!(line, "line does not match the pattern");
            return Vec::new();
        };
        if self.groups.is_empty() {
            return captures
                .get(0)
                .map(|m| m.as_str().to_string())
                .into_iter()
                .collect();
        }
        self.groups
            .iter()
            .filter_map(|&group| captures.get(group))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected_groups_yield_one_record_each() {
        let extractor = RecordExtractor::new(r"^(\w+)=(\d+)$", vec![1, 2]).unwrap();
        assert_eq!(extractor.extract("count=42"), vec!["count", "42"]);
    }

    #[test]
    fn test_non_matching_line_yields_nothing() {
        let extractor = RecordExtractor::new(r"^(\w+)=(\d+)$", vec![1, 2]).unwrap();
        assert_eq!(extractor.extract("not a metric"), Vec::<String>::new());
        assert_eq!(extractor.extract(""), Vec::<String>::new());
    }

    #[test]
    fn test_no_groups_yields_the_whole_match() {
        let extractor = RecordExtractor::new(r"ERROR .*", vec![]).unwrap();
        assert_eq!(
            extractor.extract("2023-01-01 ERROR timeout"),
            vec!["ERROR timeout"]
        );
    }

    #[test]
    fn test_optional_group_without_a_match_is_skipped() {
        let extractor = RecordExtractor::new(r"^(\w+)(?:=(\d+))?$", vec![1, 2]).unwrap();
        assert_eq!(extractor.extract("count=42"), vec!["count", "42"]);
        assert_eq!(extractor.extract("count"), vec!["count"]);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = RecordExtractor::new("(unclosed", vec![]).unwrap_err();
        assert!(matches!(err, Error::Pattern(_)));
    }

    #[test]
    fn test_out_of_range_group_is_rejected() {
        let err = RecordExtractor::new(r"^(\w+)$", vec![1, 2]).unwrap_err();
        match err {
            Error::Config { message } => assert!(message.contains("capture group 2")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_group_zero_is_the_whole_match() {
        let extractor = RecordExtractor::new(r"(\d+)ms", vec![0, 1]).unwrap();
        assert_eq!(extractor.extract("took 250ms"), vec!["250ms", "250"]);
    }
}

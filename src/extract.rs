//! Identifier extraction from free-form text

use crate::error::Result;
use crate::types::Identifier;
use regex::Regex;

/// Number of alphanumeric characters following the prefix
pub const IDENTIFIER_BODY_LEN: usize = 10;

/// Default identifier prefix
pub const DEFAULT_PREFIX: &str = "BV";

/// Pulls identifiers out of arbitrary text
///
/// Matches `<prefix>` followed by exactly [`IDENTIFIER_BODY_LEN`] ASCII
/// letters or digits (either case). Matches are non-overlapping, reported in
/// order of appearance, and duplicates are kept.
///
/// # Examples
///
/// ```
/// use bvdl::extract::IdentifierExtractor;
///
/// let extractor = IdentifierExtractor::default();
/// let ids = extractor.extract("see BV1234567890 and BV1234567890 again");
/// assert_eq!(ids.len(), 2);
/// assert_eq!(ids[0].as_str(), "BV1234567890");
/// ```
#[derive(Clone, Debug)]
pub struct IdentifierExtractor {
    prefix: String,
    pattern: Regex,
}

impl IdentifierExtractor {
    /// Build an extractor for a custom prefix
    ///
    /// The prefix is matched literally (regex metacharacters are escaped).
    pub fn new(prefix: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(
            "{}[A-Za-z0-9]{{{}}}",
            regex::escape(prefix),
            IDENTIFIER_BODY_LEN
        ))?;
        Ok(Self {
            prefix: prefix.to_string(),
            pattern,
        })
    }

    /// Prefix this extractor matches
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Extract every identifier in `text`, in order; empty when none match
    pub fn extract(&self, text: &str) -> Vec<Identifier> {
        self.pattern
            .find_iter(text)
            .map(|m| Identifier::new_unchecked(m.as_str()))
            .collect()
    }
}

impl Default for IdentifierExtractor {
    // constant pattern, cannot fail
    #[allow(clippy::unwrap_used)]
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX).unwrap()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn strings(ids: &[Identifier]) -> Vec<&str> {
        ids.iter().map(Identifier::as_str).collect()
    }

    #[test]
    fn test_duplicates_are_preserved_in_order() {
        let ids = IdentifierExtractor::default().extract("see BV1234567890 and BV1234567890 again");
        assert_eq!(strings(&ids), vec!["BV1234567890", "BV1234567890"]);
    }

    #[test]
    fn test_no_match_returns_empty() {
        assert!(IdentifierExtractor::default().extract("no ids here").is_empty());
        assert!(IdentifierExtractor::default().extract("").is_empty());
    }

    #[test]
    fn test_ids_embedded_in_urls_and_punctuation() {
        let text = "https://www.bilibili.com/video/BV1xx411c7mD?p=2,BV1GJ411x7h7。BV17x411w7KC";
        let ids = IdentifierExtractor::default().extract(text);
        assert_eq!(
            strings(&ids),
            vec!["BV1xx411c7mD", "BV1GJ411x7h7", "BV17x411w7KC"]
        );
    }

    #[test]
    fn test_too_short_body_is_ignored() {
        let ids = IdentifierExtractor::default().extract("BV123456789 BVshort BV12345 67890");
        assert!(ids.is_empty(), "got {:?}", ids);
    }

    #[test]
    fn test_longer_run_yields_leading_twelve_characters() {
        let ids = IdentifierExtractor::default().extract("BV1234567890123");
        assert_eq!(strings(&ids), vec!["BV1234567890"]);
    }

    #[test]
    fn test_prefix_is_case_sensitive_body_is_not() {
        let ids = IdentifierExtractor::default().extract("bv1234567890 BVabcdeFGHIJ");
        assert_eq!(strings(&ids), vec!["BVabcdeFGHIJ"]);
    }

    #[test]
    fn test_non_ascii_alphanumerics_do_not_count() {
        let ids = IdentifierExtractor::default().extract("BV12345六七890");
        assert!(ids.is_empty());
    }

    #[test]
    fn test_reextraction_of_joined_output_is_idempotent() {
        let extractor = IdentifierExtractor::default();
        let inputs = [
            "BV1234567890BV0987654321 junk BVBV12345678xx",
            "x BV1aaaaaaaaa y BV1aaaaaaaaa z BV2bbbbbbbbbCC",
            "BVBVBVBVBVBVBVBV",
        ];
        for text in inputs {
            let first = extractor.extract(text);
            let joined = strings(&first).join(" ");
            assert_eq!(extractor.extract(&joined), first, "input: {}", text);
        }
    }

    #[test]
    fn test_custom_prefix_is_escaped() {
        let extractor = IdentifierExtractor::new("a.b").unwrap();
        assert!(extractor.extract("axb1234567890").is_empty());
        let ids = extractor.extract("a.b1234567890");
        assert_eq!(strings(&ids), vec!["a.b1234567890"]);
        assert_eq!(extractor.prefix(), "a.b");
    }

    #[test]
    fn test_default_matches_explicit_default_prefix() {
        let default = IdentifierExtractor::default();
        let explicit = IdentifierExtractor::new(DEFAULT_PREFIX).unwrap();

        assert_eq!(default.prefix(), DEFAULT_PREFIX);
        assert_eq!(default.pattern.as_str(), explicit.pattern.as_str());
        assert_eq!(default.pattern.as_str(), "BV[A-Za-z0-9]{10}");
    }
}

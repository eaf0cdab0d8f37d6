//! Instrument code handling.
//!
//! Every source row is keyed by a 6-digit, zero-padded exchange ticker.
//! Codes arriving from user input (holdings lists, spreadsheets) are messy,
//! so [`StockCode::normalize`] recovers the canonical form where it can and
//! rejects the rest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Length of a canonical instrument code.
pub const CODE_LEN: usize = 6;

/// Shortest all-digit input that is zero-padded into a code. Anything
/// shorter is too ambiguous to be a ticker with its leading zeros dropped.
pub const MIN_PADDABLE_DIGITS: usize = 3;

/// Canonical 6-digit instrument code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockCode(String);

impl StockCode {
    /// Parse a code that must already be canonical.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() == CODE_LEN && s.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(s.to_string()))
        } else {
            None
        }
    }

    /// Normalize a raw code-like string.
    ///
    /// - Surrounding whitespace is ignored.
    /// - All-digit input of 6 digits passes through; 3 to 5 digits are
    ///   zero-padded on the left.
    /// - Anything else has its digits extracted and is accepted only if
    ///   exactly 6 digits remain (`"sh600000"`, `"600000.SH"`).
    pub fn normalize(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }

        if s.bytes().all(|b| b.is_ascii_digit()) {
            return match s.len() {
                CODE_LEN => Some(Self(s.to_string())),
                n if (MIN_PADDABLE_DIGITS..CODE_LEN).contains(&n) => {
                    Some(Self(format!("{:0>width$}", s, width = CODE_LEN)))
                }
                _ => None,
            };
        }

        let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
        Self::parse(&digits)
    }

    /// Code as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StockCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for StockCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize, deduplicate and sort a list of raw code-like strings.
///
/// Inputs that do not resolve to a canonical code are dropped silently.
pub fn normalize_codes<I, S>(raw: I) -> Vec<StockCode>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|s| StockCode::normalize(s.as_ref()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strict() {
        assert!(StockCode::parse("600000").is_some());
        assert!(StockCode::parse("60000").is_none());
        assert!(StockCode::parse("60000a").is_none());
        assert!(StockCode::parse(" 600000").is_none());
    }

    #[test]
    fn test_normalize_passthrough_and_trim() {
        assert_eq!(StockCode::normalize("600000").unwrap().as_str(), "600000");
        assert_eq!(StockCode::normalize(" 600000 ").unwrap().as_str(), "600000");
    }

    #[test]
    fn test_normalize_zero_pads_numeric() {
        assert_eq!(StockCode::normalize("2594").unwrap().as_str(), "002594");
        assert_eq!(StockCode::normalize("858").unwrap().as_str(), "000858");
    }

    #[test]
    fn test_normalize_extracts_embedded_digits() {
        assert_eq!(StockCode::normalize("abc600000").unwrap().as_str(), "600000");
        assert_eq!(StockCode::normalize("600519.SH").unwrap().as_str(), "600519");
        assert_eq!(StockCode::normalize("sz000001").unwrap().as_str(), "000001");
    }

    #[test]
    fn test_normalize_rejects() {
        assert!(StockCode::normalize("").is_none());
        assert!(StockCode::normalize("   ").is_none());
        assert!(StockCode::normalize("1").is_none());
        assert!(StockCode::normalize("6000000").is_none());
        assert!(StockCode::normalize("abc").is_none());
        assert!(StockCode::normalize("sh60000").is_none());
    }

    #[test]
    fn test_normalize_codes_dedup_and_sort() {
        let codes = normalize_codes(["600000", "600000 ", "abc600000", "1"]);
        assert_eq!(codes, vec![StockCode::parse("600000").unwrap()]);

        let codes = normalize_codes(["600519", "000001", "x", "000001"]);
        let as_str: Vec<&str> = codes.iter().map(|c| c.as_str()).collect();
        assert_eq!(as_str, vec!["000001", "600519"]);
    }
}

// Filter tag grammar.
//
// Active filter state travels as plain strings (links and bookmarks carry it
// that way). Two shapes:
//
//   <value>                     categorical value, resolved against the facet set
//   <Label>: <int><sep><int>    year range, e.g. "표본 제작 기간: 1980-2000"
//
// Notes:
// - <Label> must be one of the two registered range labels, followed
//   directly by ':'
// - <sep> is any run of non-digit characters; the first two digit runs after
//   the colon are taken as (from, to) in encounter order, never swapped
// - anything that fails the range grammar is a categorical value

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A range-valued facet.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeField {
    /// Year the specimen was made
    MadePeriod,
    /// Year of death / collection
    DeathPeriod,
}

// ============================================================================
// Range label registry - single source of truth for range tag prefixes
// ============================================================================

pub const RANGE_LABELS: &[(&str, RangeField)] = &[
    ("표본 제작 기간", RangeField::MadePeriod),
    ("폐사 수집 기간", RangeField::DeathPeriod),
];

impl RangeField {
    pub fn label(self) -> &'static str {
        RANGE_LABELS
            .iter()
            .find(|(_, f)| *f == self)
            .map(|(l, _)| *l)
            .unwrap_or_default()
    }

    pub fn from_label(label: &str) -> Option<RangeField> {
        RANGE_LABELS
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, f)| *f)
    }
}

/// Check if a string is one of the registered range labels
pub fn is_range_label(label: &str) -> bool {
    RangeField::from_label(label).is_some()
}

/// Parsed range tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeTag {
    pub field: RangeField,
    pub from: i32,
    pub to: i32,
}

/// Try to read `tag` as a range tag. Returns None for anything else.
pub fn try_parse_range_tag(tag: &str) -> Option<RangeTag> {
    let (field, rest) = RANGE_LABELS.iter().find_map(|(label, field)| {
        tag.strip_prefix(label)
            .and_then(|r| r.strip_prefix(':'))
            .map(|r| (*field, r))
    })?;

    let mut runs = DigitRuns { s: rest };
    let from = runs.next()?.parse().ok()?;
    let to = runs.next()?.parse().ok()?;
    Some(RangeTag { field, from, to })
}

/// Iterator over maximal runs of ASCII digits.
struct DigitRuns<'a> {
    s: &'a str,
}

impl<'a> Iterator for DigitRuns<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let start = self.s.find(|c: char| c.is_ascii_digit())?;
        let tail = &self.s[start..];
        let len = tail
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(tail.len());
        self.s = &tail[len..];
        Some(&tail[..len])
    }
}

/// Typed form of a single tag.
///
/// A `Value` is not tied to a category yet: which facet it belongs to is only
/// known against a `FacetSet` (see `filter::evaluate::resolve`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterTag {
    Value { value: String },
    Range { field: RangeField, from: i32, to: i32 },
}

impl FilterTag {
    pub fn value(v: impl Into<String>) -> Self {
        FilterTag::Value { value: v.into() }
    }

    pub fn range(field: RangeField, from: i32, to: i32) -> Self {
        FilterTag::Range { field, from, to }
    }
}

impl FromStr for FilterTag {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match try_parse_range_tag(s) {
            Some(RangeTag { field, from, to }) => FilterTag::Range { field, from, to },
            None => FilterTag::value(s),
        })
    }
}

impl From<&str> for FilterTag {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(tag) => tag,
            Err(never) => match never {},
        }
    }
}

/// Canonical string form, readable back by `FromStr`.
impl fmt::Display for FilterTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterTag::Value { value } => f.write_str(value),
            FilterTag::Range { field, from, to } => {
                write!(f, "{}: {}-{}", field.label(), from, to)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_made_period() {
        let t = try_parse_range_tag("표본 제작 기간: 1980-2000").unwrap();
        assert_eq!(t.field, RangeField::MadePeriod);
        assert_eq!((t.from, t.to), (1980, 2000));
    }

    #[test]
    fn test_parse_any_separator() {
        let t = try_parse_range_tag("폐사 수집 기간:1900 ~ 1950년").unwrap();
        assert_eq!(t.field, RangeField::DeathPeriod);
        assert_eq!((t.from, t.to), (1900, 1950));

        let t = try_parse_range_tag("폐사 수집 기간: from 3 to 4 and 5").unwrap();
        assert_eq!((t.from, t.to), (3, 4));
    }

    #[test]
    fn test_parse_keeps_inverted_order() {
        let t = try_parse_range_tag("표본 제작 기간: 2000-1980").unwrap();
        assert_eq!((t.from, t.to), (2000, 1980));
    }

    #[test]
    fn test_not_a_range_tag() {
        // no colon after the label
        assert!(try_parse_range_tag("표본 제작 기간 1980-2000").is_none());
        // only one integer
        assert!(try_parse_range_tag("표본 제작 기간: 1980").is_none());
        // unknown label
        assert!(try_parse_range_tag("기간: 1980-2000").is_none());
        // overflowing integer
        assert!(try_parse_range_tag("표본 제작 기간: 99999999999-1").is_none());
        assert!(try_parse_range_tag("Mammal").is_none());
    }

    #[test]
    fn test_is_range_label() {
        assert!(is_range_label("표본 제작 기간"));
        assert!(is_range_label("폐사 수집 기간"));
        assert!(!is_range_label("표본 제작 기간:"));
        assert!(!is_range_label("Mammal"));
    }

    #[test]
    fn test_filter_tag_from_str() {
        assert_eq!(FilterTag::from("Mammal"), FilterTag::value("Mammal"));
        assert_eq!(
            FilterTag::from("표본 제작 기간: 1980-2000"),
            FilterTag::range(RangeField::MadePeriod, 1980, 2000)
        );
        // fails the range grammar, so it is an ordinary value
        assert_eq!(
            FilterTag::from("표본 제작 기간: soon"),
            FilterTag::value("표본 제작 기간: soon")
        );
    }

    #[test]
    fn test_filter_tag_display_reads_back() {
        let t = FilterTag::range(RangeField::DeathPeriod, 1900, 1950);
        assert_eq!(t.to_string(), "폐사 수집 기간: 1900-1950");
        assert_eq!(FilterTag::from(t.to_string().as_str()), t);
    }
}

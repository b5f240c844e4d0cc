// Specimen records as delivered by the record store.
//
// The store has already joined classification / institution / status lookups
// into flat nullable fields. Anything else the store sends (names, images,
// model urls) rides along in `extra` so a marker popup can use it without this
// crate knowing about it.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Record identifier: the store hands out integer keys or uuid strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecimenRecord {
    pub id: RecordId,
    #[serde(default)]
    pub classification: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
    /// None => maker unknown
    #[serde(default)]
    pub maker: Option<String>,
    /// Protection-category labels (zero or more)
    #[serde(default, deserialize_with = "null_as_empty")]
    pub protection: Vec<String>,
    /// Partial ISO date: YYYY, YYYY-MM or YYYY-MM-DD
    #[serde(default)]
    pub made_date: Option<String>,
    /// Partial ISO date of death / collection
    #[serde(default)]
    pub death_date: Option<String>,
    pub lat: f64,
    pub lng: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn null_as_empty<'de, D>(de: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Option<String>>>::deserialize(de)?
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .collect())
}

impl SpecimenRecord {
    /// Bare record at a coordinate; the remaining fields are filled in by the caller.
    pub fn new(id: impl Into<RecordId>, lat: f64, lng: f64) -> Self {
        Self {
            id: id.into(),
            classification: None,
            institution: None,
            maker: None,
            protection: Vec::new(),
            made_date: None,
            death_date: None,
            lat,
            lng,
            extra: serde_json::Map::new(),
        }
    }

    pub fn classification(&self) -> Option<&str> {
        non_empty(self.classification.as_deref())
    }

    pub fn institution(&self) -> Option<&str> {
        non_empty(self.institution.as_deref())
    }

    pub fn maker(&self) -> Option<&str> {
        non_empty(self.maker.as_deref())
    }

    /// Protection labels, skipping blanks.
    pub fn protection(&self) -> impl Iterator<Item = &str> {
        self.protection.iter().filter_map(|s| non_empty(Some(s)))
    }

    pub fn made_year(&self) -> Option<i32> {
        self.made_date.as_deref().and_then(parse_year)
    }

    pub fn death_year(&self) -> Option<i32> {
        self.death_date.as_deref().and_then(parse_year)
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId::Text(s)
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

/// Extract the calendar year from a partial ISO date.
///
/// Accepts `YYYY`, `YYYY-MM` and `YYYY-MM-DD`, optionally followed by a time
/// part (`1972-05-01T10:00:00Z`, `1972-05-01 10:00`). Month and day are
/// checked when present, so `1972-13` or `1972-02-30` yield None.
pub fn parse_year(date: &str) -> Option<i32> {
    let date = date.trim();
    let date_part = date
        .split(|c: char| c == 'T' || c == ' ')
        .next()
        .unwrap_or(date);

    let mut parts = date_part.split('-');
    let year_str = parts.next()?;
    if year_str.is_empty() || !year_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year_str.parse().ok()?;

    let month = match parts.next() {
        None => return Some(year),
        Some(m) => parse_component(m)?,
    };
    if !(1..=12).contains(&month) {
        return None;
    }

    let day = match parts.next() {
        None => return Some(year),
        Some(d) => parse_component(d)?,
    };
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day).map(|_| year)
}

fn parse_component(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_year_partial_forms() {
        assert_eq!(parse_year("1972"), Some(1972));
        assert_eq!(parse_year("1972-05"), Some(1972));
        assert_eq!(parse_year("1972-05-01"), Some(1972));
        assert_eq!(parse_year(" 1972-05-01 "), Some(1972));
    }

    #[test]
    fn test_parse_year_with_time_part() {
        assert_eq!(parse_year("1999-01-01T00:00:00+09:00"), Some(1999));
        assert_eq!(parse_year("1999-01-01 12:30"), Some(1999));
    }

    #[test]
    fn test_parse_year_rejects_malformed() {
        assert_eq!(parse_year(""), None);
        assert_eq!(parse_year("unknown"), None);
        assert_eq!(parse_year("19x2"), None);
        assert_eq!(parse_year("1972-13"), None);
        assert_eq!(parse_year("1972-02-30"), None);
        assert_eq!(parse_year("1972-05-01-07"), None);
        assert_eq!(parse_year("-1972"), None);
    }

    #[test]
    fn test_deserialize_record_from_store_json() {
        let json = r#"{
            "id": 7,
            "classification": "Mammal",
            "institution": null,
            "protection": ["Endangered I", null, ""],
            "made_date": "1972-05-01",
            "lat": 37.5,
            "lng": 127.0,
            "name": "Otter"
        }"#;
        let r: SpecimenRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.id, RecordId::Int(7));
        assert_eq!(r.classification(), Some("Mammal"));
        assert_eq!(r.institution(), None);
        assert_eq!(r.maker(), None);
        assert_eq!(r.protection().collect::<Vec<_>>(), vec!["Endangered I"]);
        assert_eq!(r.made_year(), Some(1972));
        assert_eq!(r.death_year(), None);
        assert_eq!(r.extra.get("name").and_then(|v| v.as_str()), Some("Otter"));
    }

    #[test]
    fn test_deserialize_null_protection() {
        let json = r#"{"id": "a-1", "protection": null, "lat": 0.0, "lng": 0.0}"#;
        let r: SpecimenRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.id, RecordId::Text("a-1".into()));
        assert!(r.protection.is_empty());
    }

    #[test]
    fn test_blank_fields_count_as_absent() {
        let mut r = SpecimenRecord::new(1, 0.0, 0.0);
        r.maker = Some("  ".into());
        r.classification = Some(String::new());
        assert_eq!(r.maker(), None);
        assert_eq!(r.classification(), None);
    }
}

// Facet extraction.
//
// One pass over the record snapshot collects every selectable value per
// category and the year span of the two date fields. The result drives both
// the filter UI (checkbox lists, slider bounds) and tag resolution in
// `filter::evaluate`.

use std::collections::BTreeSet;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::record::SpecimenRecord;

/// Sentinel maker value standing for "maker unknown".
pub const UNKNOWN_MAKER: &str = "제작자 미상";

/// First year of the fallback span used when no record has a parseable year.
pub const FALLBACK_START_YEAR: i32 = 1950;

/// Inclusive year span.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl YearRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.min && year <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacetConfig {
    /// Range reported when no record supplies a parseable year.
    pub fallback_years: YearRange,
}

impl Default for FacetConfig {
    fn default() -> Self {
        Self {
            fallback_years: YearRange::new(FALLBACK_START_YEAR, Utc::now().year()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetSet {
    pub protection: Vec<String>,
    pub classifications: Vec<String>,
    pub institutions: Vec<String>,
    /// Sorted makers, with `UNKNOWN_MAKER` appended last when some record has none.
    pub makers: Vec<String>,
    pub made_years: YearRange,
    pub death_years: YearRange,
}

impl FacetSet {
    pub fn has_protection(&self, value: &str) -> bool {
        contains_sorted(&self.protection, value)
    }

    pub fn has_classification(&self, value: &str) -> bool {
        contains_sorted(&self.classifications, value)
    }

    pub fn has_institution(&self, value: &str) -> bool {
        contains_sorted(&self.institutions, value)
    }

    pub fn has_maker(&self, value: &str) -> bool {
        if value == UNKNOWN_MAKER && self.has_unknown_maker() {
            return true;
        }
        // The sentinel sits after the sorted run.
        let real = if self.has_unknown_maker() {
            &self.makers[..self.makers.len() - 1]
        } else {
            &self.makers[..]
        };
        contains_sorted(real, value)
    }

    /// Whether the unknown-maker sentinel was emitted.
    pub fn has_unknown_maker(&self) -> bool {
        self.makers.last().is_some_and(|m| m == UNKNOWN_MAKER)
    }
}

fn contains_sorted(values: &[String], value: &str) -> bool {
    values
        .binary_search_by(|probe| probe.as_str().cmp(value))
        .is_ok()
}

#[derive(Default)]
struct YearSpan(Option<YearRange>);

impl YearSpan {
    fn add(&mut self, year: Option<i32>) {
        let Some(y) = year else { return };
        self.0 = Some(match self.0 {
            None => YearRange::new(y, y),
            Some(r) => YearRange::new(r.min.min(y), r.max.max(y)),
        });
    }

    fn finish(self, fallback: YearRange) -> YearRange {
        self.0.unwrap_or(fallback)
    }
}

/// Derive the facet set of a record snapshot.
pub fn extract(records: &[SpecimenRecord], cfg: &FacetConfig) -> FacetSet {
    let mut protection = BTreeSet::new();
    let mut classifications = BTreeSet::new();
    let mut institutions = BTreeSet::new();
    let mut makers = BTreeSet::new();
    let mut unknown_maker = false;
    let mut made = YearSpan::default();
    let mut death = YearSpan::default();

    for r in records {
        for label in r.protection() {
            protection.insert(label.to_string());
        }
        if let Some(c) = r.classification() {
            classifications.insert(c.to_string());
        }
        if let Some(i) = r.institution() {
            institutions.insert(i.to_string());
        }
        match r.maker() {
            Some(m) => {
                makers.insert(m.to_string());
            }
            None => unknown_maker = true,
        }
        made.add(r.made_year());
        death.add(r.death_year());
    }

    if unknown_maker {
        // a maker literally named like the sentinel is covered by it
        makers.remove(UNKNOWN_MAKER);
    }
    let mut makers: Vec<String> = makers.into_iter().collect();
    if unknown_maker {
        makers.push(UNKNOWN_MAKER.to_string());
    }

    let facets = FacetSet {
        protection: protection.into_iter().collect(),
        classifications: classifications.into_iter().collect(),
        institutions: institutions.into_iter().collect(),
        makers,
        made_years: made.finish(cfg.fallback_years),
        death_years: death.finish(cfg.fallback_years),
    };

    tracing::debug!(
        records = records.len(),
        protection = facets.protection.len(),
        classifications = facets.classifications.len(),
        institutions = facets.institutions.len(),
        makers = facets.makers.len(),
        "extracted facets"
    );
    facets
}

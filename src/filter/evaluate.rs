// Filter evaluation: tags -> per-facet groups -> AND-of-ORs over records.
//
// Within a facet the selected values are OR'ed (set membership); across facets
// every selected facet must pass. A facet nobody selected produces no check at
// all, so it neither keeps nor drops anything.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::facets::{FacetSet, UNKNOWN_MAKER, YearRange};
use crate::filter::tag::{FilterTag, RangeField};
use crate::record::SpecimenRecord;

/// A categorical facet.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryField {
    Protection,
    Classification,
    Institution,
    Maker,
}

impl CategoryField {
    pub const ALL: [CategoryField; 4] = [
        CategoryField::Protection,
        CategoryField::Classification,
        CategoryField::Institution,
        CategoryField::Maker,
    ];

    fn offered_by(self, facets: &FacetSet, value: &str) -> bool {
        match self {
            CategoryField::Protection => facets.has_protection(value),
            CategoryField::Classification => facets.has_classification(value),
            CategoryField::Institution => facets.has_institution(value),
            CategoryField::Maker => facets.has_maker(value),
        }
    }
}

/// A tag resolved against a facet set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    Category { field: CategoryField, value: String },
    Range { field: RangeField, from: i32, to: i32 },
}

/// Interpret one tag. A categorical value yields one filter per facet that
/// offers it (usually one, possibly several, none for unknown values).
pub fn resolve(tag: &FilterTag, facets: &FacetSet) -> Vec<Filter> {
    match tag {
        FilterTag::Range { field, from, to } => vec![Filter::Range {
            field: *field,
            from: *from,
            to: *to,
        }],
        FilterTag::Value { value } => CategoryField::ALL
            .iter()
            .filter(|field| field.offered_by(facets, value))
            .map(|field| Filter::Category {
                field: *field,
                value: value.clone(),
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedFilter {
    pub protection: BTreeSet<String>,
    pub classifications: BTreeSet<String>,
    pub institutions: BTreeSet<String>,
    pub makers: BTreeSet<String>,
    /// Kept as parsed: `from > to` is not normalized and matches nothing.
    pub made_years: Option<YearRange>,
    pub death_years: Option<YearRange>,
}

impl GroupedFilter {
    /// Build groups from already-resolved filters. Later ranges for the same
    /// field replace earlier ones.
    pub fn from_filters<'a>(filters: impl IntoIterator<Item = &'a Filter>) -> Self {
        let mut g = GroupedFilter::default();
        for f in filters {
            g.add(f);
        }
        g
    }

    fn add(&mut self, filter: &Filter) {
        match filter {
            Filter::Category { field, value } => {
                self.category_mut(*field).insert(value.clone());
            }
            Filter::Range { field, from, to } => {
                let range = Some(YearRange { min: *from, max: *to });
                match field {
                    RangeField::MadePeriod => self.made_years = range,
                    RangeField::DeathPeriod => self.death_years = range,
                }
            }
        }
    }

    fn category_mut(&mut self, field: CategoryField) -> &mut BTreeSet<String> {
        match field {
            CategoryField::Protection => &mut self.protection,
            CategoryField::Classification => &mut self.classifications,
            CategoryField::Institution => &mut self.institutions,
            CategoryField::Maker => &mut self.makers,
        }
    }

    /// True when no facet is constrained.
    pub fn is_empty(&self) -> bool {
        self.protection.is_empty()
            && self.classifications.is_empty()
            && self.institutions.is_empty()
            && self.makers.is_empty()
            && self.made_years.is_none()
            && self.death_years.is_none()
    }

    /// Per-facet results for the facets that are constrained.
    pub fn checks(&self, r: &SpecimenRecord) -> Vec<bool> {
        let mut checks = Vec::with_capacity(6);

        if !self.protection.is_empty() {
            checks.push(r.protection().any(|p| self.protection.contains(p)));
        }
        if !self.classifications.is_empty() {
            checks.push(
                r.classification()
                    .is_some_and(|c| self.classifications.contains(c)),
            );
        }
        if !self.institutions.is_empty() {
            checks.push(r.institution().is_some_and(|i| self.institutions.contains(i)));
        }
        if !self.makers.is_empty() {
            checks.push(match r.maker() {
                Some(m) => self.makers.contains(m),
                None => self.makers.contains(UNKNOWN_MAKER),
            });
        }
        if let Some(range) = self.made_years {
            checks.push(r.made_year().is_some_and(|y| range.contains(y)));
        }
        if let Some(range) = self.death_years {
            checks.push(r.death_year().is_some_and(|y| range.contains(y)));
        }
        checks
    }

    pub fn matches(&self, r: &SpecimenRecord) -> bool {
        self.checks(r).into_iter().all(|ok| ok)
    }
}

/// Partition string tags into facet groups.
pub fn group<S: AsRef<str>>(tags: &[S], facets: &FacetSet) -> GroupedFilter {
    let mut g = GroupedFilter::default();
    for tag in tags {
        let tag = FilterTag::from(tag.as_ref());
        let filters = resolve(&tag, facets);
        if filters.is_empty() {
            tracing::debug!(tag = %tag, "tag matches no facet; ignored");
        }
        for f in &filters {
            g.add(f);
        }
    }
    g
}

/// Indices of the records kept by `tags`, in input order.
pub fn apply_indices<S: AsRef<str>>(
    records: &[SpecimenRecord],
    tags: Option<&[S]>,
    facets: &FacetSet,
) -> Vec<usize> {
    let tags = match tags {
        Some(t) if !t.is_empty() => t,
        _ => return (0..records.len()).collect(),
    };
    let grouped = group(tags, facets);
    let kept: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| grouped.matches(r))
        .map(|(i, _)| i)
        .collect();

    tracing::debug!(
        tags = tags.len(),
        records = records.len(),
        kept = kept.len(),
        "applied filter"
    );
    kept
}

/// Records kept by `tags`. None or an empty list keeps everything.
pub fn apply<S: AsRef<str>>(
    records: &[SpecimenRecord],
    tags: Option<&[S]>,
    facets: &FacetSet,
) -> Vec<SpecimenRecord> {
    apply_indices(records, tags, facets)
        .into_iter()
        .map(|i| records[i].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facets::{FacetConfig, extract};

    fn cfg() -> FacetConfig {
        FacetConfig {
            fallback_years: YearRange::new(1950, 2024),
        }
    }

    fn rec(id: i64) -> SpecimenRecord {
        SpecimenRecord::new(id, 37.0, 127.0)
    }

    fn ids(records: &[SpecimenRecord]) -> Vec<String> {
        records.iter().map(|r| r.id.to_string()).collect()
    }

    fn kept(records: &[SpecimenRecord], tags: &[&str], facets: &FacetSet) -> Vec<String> {
        ids(&apply(records, Some(tags), facets))
    }

    fn scenario() -> Vec<SpecimenRecord> {
        let mut a = rec(1);
        a.classification = Some("Mammal".into());
        a.made_date = Some("1972-05-01".into());
        a.institution = Some("Seoul Museum".into());
        a.maker = Some("Kim".into());
        a.protection = vec!["Endangered I".into()];
        let mut b = rec(2);
        b.classification = Some("Bird".into());
        b.made_date = Some("1999-01-01".into());
        b.institution = Some("Busan Museum".into());
        b.protection = vec!["Monument".into(), "Endangered II".into()];
        let mut c = rec(3);
        c.classification = Some("Mammal".into());
        c.institution = Some("Busan Museum".into());
        c.maker = Some("Lee".into());
        vec![a, b, c]
    }

    #[test]
    fn test_no_tags_is_identity() {
        let records = scenario();
        let f = extract(&records, &cfg());
        assert_eq!(apply::<String>(&records, None, &f), records);
        assert_eq!(apply::<&str>(&records, Some(&[][..]), &f), records);
    }

    #[test]
    fn test_example_scenario() {
        let records = scenario();
        let f = extract(&records, &cfg());
        assert_eq!(kept(&records, &["Mammal"], &f), vec!["1", "3"]);
        assert_eq!(
            kept(&records, &["표본 제작 기간: 1980-2000"], &f),
            vec!["2"]
        );
    }

    #[test]
    fn test_same_category_is_union() {
        let records = scenario();
        let f = extract(&records, &cfg());
        assert_eq!(kept(&records, &["Mammal", "Bird"], &f), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_cross_category_is_intersection() {
        let records = scenario();
        let f = extract(&records, &cfg());
        let mammal = kept(&records, &["Mammal"], &f);
        let busan = kept(&records, &["Busan Museum"], &f);
        let both = kept(&records, &["Mammal", "Busan Museum"], &f);
        let expected: Vec<String> = mammal.into_iter().filter(|id| busan.contains(id)).collect();
        assert_eq!(both, expected);
        assert_eq!(both, vec!["3"]);
    }

    #[test]
    fn test_protection_any_of_record_labels() {
        let records = scenario();
        let f = extract(&records, &cfg());
        assert_eq!(kept(&records, &["Endangered II"], &f), vec!["2"]);
        assert_eq!(
            kept(&records, &["Endangered I", "Monument"], &f),
            vec!["1", "2"]
        );
    }

    #[test]
    fn test_range_is_inclusive() {
        let records = scenario();
        let f = extract(&records, &cfg());
        let tag = |from: i32, to: i32| format!("표본 제작 기간: {}-{}", from, to);
        assert_eq!(kept(&records, &[tag(1972, 1972).as_str()], &f), vec!["1"]);
        assert_eq!(kept(&records, &[tag(1960, 1999).as_str()], &f), vec!["1", "2"]);
        assert_eq!(kept(&records, &[tag(1960, 1972).as_str()], &f), vec!["1"]);
        assert_eq!(kept(&records, &[tag(1999, 2010).as_str()], &f), vec!["2"]);
        assert!(kept(&records, &[tag(1973, 1998).as_str()], &f).is_empty());
        assert!(kept(&records, &[tag(1950, 1971).as_str()], &f).is_empty());
    }

    #[test]
    fn test_range_excludes_missing_and_unparseable_dates() {
        let mut records = scenario();
        records[0].made_date = Some("unknown".into());
        let f = extract(&records, &cfg());
        assert_eq!(kept(&records, &["표본 제작 기간: 0-3000"], &f), vec!["2"]);
    }

    #[test]
    fn test_inverted_range_matches_nothing() {
        let records = scenario();
        let f = extract(&records, &cfg());
        assert!(kept(&records, &["표본 제작 기간: 2000-1960"], &f).is_empty());
    }

    #[test]
    fn test_last_range_tag_wins() {
        let records = scenario();
        let f = extract(&records, &cfg());
        let g = group(&["표본 제작 기간: 1900-1910", "표본 제작 기간: 1990-2000"], &f);
        assert_eq!(g.made_years, Some(YearRange::new(1990, 2000)));
        assert_eq!(g.death_years, None);
    }

    #[test]
    fn test_unknown_maker_sentinel() {
        let known = {
            let mut r = rec(1);
            r.maker = Some("X".into());
            r
        };
        let unknown = rec(2);
        let records = vec![unknown, known];
        let f = extract(&records, &cfg());
        assert_eq!(kept(&records, &[UNKNOWN_MAKER], &f), vec!["2"]);
        assert_eq!(kept(&records, &[UNKNOWN_MAKER, "X"], &f), vec!["2", "1"]);
    }

    #[test]
    fn test_unknown_tag_is_inert() {
        let records = scenario();
        let f = extract(&records, &cfg());
        let g = group(&["Dinosaur", "표본 제작 기간: never"], &f);
        assert!(g.is_empty());
        assert_eq!(kept(&records, &["Dinosaur"], &f), ids(&records));
        assert_eq!(kept(&records, &["Dinosaur", "Bird"], &f), vec!["2"]);
    }

    #[test]
    fn test_collision_counts_toward_both_categories() {
        let mut a = rec(1);
        a.classification = Some("Kim".into());
        let mut b = rec(2);
        b.maker = Some("Kim".into());
        let records = vec![a, b];
        let f = extract(&records, &cfg());
        let g = group(&["Kim"], &f);
        assert!(g.classifications.contains("Kim"));
        assert!(g.makers.contains("Kim"));
        // both categories are now constrained, so neither record passes both
        assert!(kept(&records, &["Kim"], &f).is_empty());
    }

    #[test]
    fn test_resolve_and_from_filters() {
        let records = scenario();
        let f = extract(&records, &cfg());
        let filters: Vec<Filter> = ["Bird", "Busan Museum", "폐사 수집 기간: 1-2"]
            .iter()
            .flat_map(|t| resolve(&FilterTag::from(*t), &f))
            .collect();
        assert_eq!(
            filters[0],
            Filter::Category {
                field: CategoryField::Classification,
                value: "Bird".into()
            }
        );
        let g = GroupedFilter::from_filters(&filters);
        assert_eq!(g, group(&["Bird", "Busan Museum", "폐사 수집 기간: 1-2"], &f));
        assert_eq!(g.death_years, Some(YearRange::new(1, 2)));
    }

    #[test]
    fn test_checks_skip_unselected_facets() {
        let records = scenario();
        let f = extract(&records, &cfg());
        let g = group(&["Bird"], &f);
        assert_eq!(g.checks(&records[0]), vec![false]);
        assert_eq!(g.checks(&records[1]), vec![true]);
        assert!(GroupedFilter::default().checks(&records[0]).is_empty());
        assert!(GroupedFilter::default().matches(&records[0]));
    }
}

// Memoized presentation pipeline.
//
//   records -> facets -> filtered -> dispersed + cluster index -> render nodes
//
// Every stage sits behind a single-slot cache keyed by what it depends on:
// - facets:   snapshot generation
// - filtered: (generation, tags)
// - index:    (generation, tags)            reused across viewport changes
// - rendered: ((generation, tags), bounds, zoom)
//
// Replacing the records bumps the generation; nothing compares snapshots
// element by element.

use serde::{Deserialize, Serialize};

use crate::facets::{extract, FacetConfig, FacetSet};
use crate::filter::{apply_indices, FilterTag};
use crate::layout::{
    disperse, BoundingBox, ClusterConfig, ClusterIndex, DisperseConfig, GeoPoint, RenderNode,
};
use crate::memo::Memo;
use crate::record::SpecimenRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogueConfig {
    pub facets: FacetConfig,
    pub disperse: DisperseConfig,
    pub cluster: ClusterConfig,
}

type FilterKey = (u64, Option<Vec<String>>);
type RenderKey = (FilterKey, BoundingBox, f64);

#[derive(Debug, Default)]
struct Caches {
    facets: Memo<u64, FacetSet>,
    filtered: Memo<FilterKey, Vec<usize>>,
    index: Memo<FilterKey, ClusterIndex<SpecimenRecord>>,
    rendered: Memo<RenderKey, Vec<RenderNode<SpecimenRecord>>>,
}

/// Borrowed view of the pipeline inputs.
struct Inputs<'a> {
    cfg: &'a CatalogueConfig,
    records: &'a [SpecimenRecord],
    tags: Option<&'a [String]>,
    generation: u64,
}

impl Inputs<'_> {
    fn filter_key(&self) -> FilterKey {
        (self.generation, self.tags.map(<[String]>::to_vec))
    }
}

fn facets_of<'c>(facets: &'c mut Memo<u64, FacetSet>, i: &Inputs) -> &'c FacetSet {
    facets.get_or_compute(i.generation, || extract(i.records, &i.cfg.facets))
}

fn filtered_of<'c>(
    facets: &'c mut Memo<u64, FacetSet>,
    filtered: &'c mut Memo<FilterKey, Vec<usize>>,
    i: &Inputs,
) -> &'c [usize] {
    let facets = facets_of(facets, i);
    filtered.get_or_compute(i.filter_key(), || apply_indices(i.records, i.tags, facets))
}

fn index_of<'c>(
    facets: &'c mut Memo<u64, FacetSet>,
    filtered: &'c mut Memo<FilterKey, Vec<usize>>,
    index: &'c mut Memo<FilterKey, ClusterIndex<SpecimenRecord>>,
    i: &Inputs,
) -> &'c ClusterIndex<SpecimenRecord> {
    let kept = filtered_of(facets, filtered, i);
    index.get_or_compute(i.filter_key(), || {
        let points = kept
            .iter()
            .map(|&k| {
                let r = &i.records[k];
                GeoPoint::new(r.lat, r.lng, r.clone())
            })
            .collect();
        ClusterIndex::new(disperse(points, &i.cfg.disperse), &i.cfg.cluster)
    })
}

/// A record snapshot plus the active filter, with every derived stage cached.
#[derive(Debug, Default)]
pub struct Catalogue {
    cfg: CatalogueConfig,
    records: Vec<SpecimenRecord>,
    tags: Option<Vec<String>>,
    generation: u64,
    caches: Caches,
}

impl Catalogue {
    pub fn new(cfg: CatalogueConfig) -> Self {
        Self {
            cfg,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &CatalogueConfig {
        &self.cfg
    }

    /// Replace the record snapshot. All cached stages become stale.
    pub fn set_records(&mut self, records: Vec<SpecimenRecord>) {
        self.records = records;
        self.generation += 1;
        tracing::debug!(
            records = self.records.len(),
            generation = self.generation,
            "record snapshot replaced"
        );
    }

    pub fn records(&self) -> &[SpecimenRecord] {
        &self.records
    }

    /// Set the active tags. None and an empty list both mean "no filter".
    pub fn set_filter(&mut self, tags: Option<Vec<String>>) {
        self.tags = tags.filter(|t| !t.is_empty());
    }

    /// Typed form of `set_filter`.
    pub fn set_filter_tags(&mut self, tags: &[FilterTag]) {
        self.set_filter(Some(tags.iter().map(FilterTag::to_string).collect()));
    }

    pub fn tags(&self) -> Option<&[String]> {
        self.tags.as_deref()
    }

    /// Pipeline inputs alongside the caches they feed.
    fn split(&mut self) -> (Inputs<'_>, &mut Caches) {
        let inputs = Inputs {
            cfg: &self.cfg,
            records: &self.records,
            tags: self.tags.as_deref(),
            generation: self.generation,
        };
        (inputs, &mut self.caches)
    }

    pub fn facets(&mut self) -> &FacetSet {
        let (i, c) = self.split();
        facets_of(&mut c.facets, &i)
    }

    /// Records passing the active filter, in snapshot order.
    pub fn filtered(&mut self) -> Vec<&SpecimenRecord> {
        let (i, c) = self.split();
        let records = i.records;
        filtered_of(&mut c.facets, &mut c.filtered, &i)
            .iter()
            .map(move |&k| &records[k])
            .collect()
    }

    fn index(&mut self) -> &ClusterIndex<SpecimenRecord> {
        let (i, c) = self.split();
        index_of(&mut c.facets, &mut c.filtered, &mut c.index, &i)
    }

    /// Render nodes for a viewport over the filtered records. The cluster
    /// index is rebuilt only when records or tags change.
    pub fn render(&mut self, bounds: &BoundingBox, zoom: f64) -> &[RenderNode<SpecimenRecord>] {
        let (i, c) = self.split();
        let Caches {
            facets,
            filtered,
            index,
            rendered,
        } = c;
        let key = (i.filter_key(), *bounds, zoom);
        rendered.get_or_compute(key, || {
            let nodes = index_of(facets, filtered, index, &i).clusters(bounds, zoom);
            tracing::debug!(nodes = nodes.len(), zoom, "rendered viewport");
            nodes
        })
    }

    /// Zoom at which a rendered cluster splits apart. None for unknown ids.
    pub fn expansion_zoom(&mut self, cluster_id: u64) -> Option<i32> {
        self.index().expansion_zoom(cluster_id)
    }

    /// Records under a rendered cluster, paged.
    pub fn cluster_leaves(
        &mut self,
        cluster_id: u64,
        limit: usize,
        offset: usize,
    ) -> Option<Vec<SpecimenRecord>> {
        self.index().leaves(cluster_id, limit, offset)
    }
}

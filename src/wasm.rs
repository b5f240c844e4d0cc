//! WASM bindings for specimap-core.
//!
//! All functions exposed to JavaScript via wasm-bindgen are defined here.
//! Everything crosses the boundary as JSON strings; failures come back as
//! `{"error": {"message": ...}}` and are also written to the browser console.

use wasm_bindgen::prelude::*;

use crate::catalogue::{Catalogue, CatalogueConfig};
use crate::error::MapError;
use crate::facets::{extract, FacetConfig};
use crate::filter::apply_indices;
use crate::layout::BoundingBox;
use crate::output::{error_json, to_json, FilterOutput, RenderOutput};
use crate::record::SpecimenRecord;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console, js_name = log)]
    pub fn console_log(s: &str);

    #[wasm_bindgen(js_namespace = console, js_name = error)]
    pub fn console_error(s: &str);
}

fn log_info(msg: &str) {
    tracing::info!("{}", msg);
    #[cfg(target_arch = "wasm32")]
    console_log(msg);
}

fn log_error(msg: &str) {
    tracing::error!("{}", msg);
    #[cfg(target_arch = "wasm32")]
    console_error(msg);
}

fn respond(result: Result<String, MapError>) -> String {
    match result {
        Ok(json) => json,
        Err(e) => {
            log_error(&format!("specimap: {}", e));
            error_json(&e)
        }
    }
}

fn parse_records(json: &str) -> Result<Vec<SpecimenRecord>, MapError> {
    serde_json::from_str(json).map_err(MapError::Records)
}

/// `null`, `""` and `[]` all mean "no filter".
fn parse_tags(json: &str) -> Result<Option<Vec<String>>, MapError> {
    if json.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(json).map_err(MapError::Tags)
}

fn parse_config(json: &str) -> Result<CatalogueConfig, MapError> {
    if json.trim().is_empty() {
        return Ok(CatalogueConfig::default());
    }
    serde_json::from_str(json).map_err(MapError::Config)
}

fn cluster_id(id: f64) -> Result<u64, MapError> {
    if id.is_finite() && id >= 0.0 && id.fract() == 0.0 {
        Ok(id as u64)
    } else {
        Err(MapError::ClusterId(id))
    }
}

fn extract_facets_json(records_json: &str) -> Result<String, MapError> {
    let records = parse_records(records_json)?;
    to_json(&extract(&records, &FacetConfig::default()))
}

fn filter_records_json(records_json: &str, tags_json: &str) -> Result<String, MapError> {
    let records = parse_records(records_json)?;
    let tags = parse_tags(tags_json)?;
    let facets = extract(&records, &FacetConfig::default());
    let kept = apply_indices(&records, tags.as_deref(), &facets);
    to_json(&FilterOutput {
        records: kept.iter().map(|&i| &records[i]).collect(),
        total: records.len(),
    })
}

/// Facet set of a record array.
#[wasm_bindgen]
pub fn extract_facets(records_json: &str) -> String {
    respond(extract_facets_json(records_json))
}

/// One-shot filter of a record array by a tag array (`null` for none).
#[wasm_bindgen]
pub fn filter_records(records_json: &str, tags_json: &str) -> String {
    respond(filter_records_json(records_json, tags_json))
}

/// Stateful pipeline for the map page. Keeps the snapshot, the active
/// filter and every derived stage between calls.
#[wasm_bindgen]
pub struct SpecimenMap {
    catalogue: Catalogue,
}

impl SpecimenMap {
    fn try_new(config_json: &str) -> Result<SpecimenMap, MapError> {
        Ok(SpecimenMap {
            catalogue: Catalogue::new(parse_config(config_json)?),
        })
    }

    fn set_records_json(&mut self, records_json: &str) -> Result<String, MapError> {
        let records = parse_records(records_json)?;
        self.catalogue.set_records(records);
        log_info(&format!(
            "specimap: loaded {} records",
            self.catalogue.records().len()
        ));
        to_json(self.catalogue.facets())
    }

    fn set_filter_json(&mut self, tags_json: &str) -> Result<String, MapError> {
        self.catalogue.set_filter(parse_tags(tags_json)?);
        let total = self.catalogue.records().len();
        to_json(&FilterOutput {
            records: self.catalogue.filtered(),
            total,
        })
    }

    fn leaves_json(&mut self, cluster: f64, limit: usize, offset: usize) -> Result<String, MapError> {
        let id = cluster_id(cluster)?;
        let leaves = self.catalogue.cluster_leaves(id, limit, offset);
        to_json(&leaves.unwrap_or_default())
    }
}

#[wasm_bindgen]
impl SpecimenMap {
    /// Pass `""` or a partial JSON config; missing fields take defaults.
    /// A config that does not decode is reported and defaults are used.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> SpecimenMap {
        SpecimenMap::try_new(config_json).unwrap_or_else(|e| {
            log_error(&format!("specimap: {}; using defaults", e));
            SpecimenMap {
                catalogue: Catalogue::default(),
            }
        })
    }

    /// Replace the record snapshot. Returns the facet set.
    pub fn set_records(&mut self, records_json: &str) -> String {
        let result = self.set_records_json(records_json);
        respond(result)
    }

    /// Current facet set.
    pub fn facets(&mut self) -> String {
        respond(to_json(self.catalogue.facets()))
    }

    /// Replace the active tags. Returns the filtered records.
    pub fn set_filter(&mut self, tags_json: &str) -> String {
        let result = self.set_filter_json(tags_json);
        respond(result)
    }

    /// Render nodes for the current viewport.
    pub fn render(&mut self, north: f64, south: f64, east: f64, west: f64, zoom: f64) -> String {
        let bounds = BoundingBox::new(north, south, east, west);
        let nodes = self.catalogue.render(&bounds, zoom);
        respond(to_json(&RenderOutput::new(nodes)))
    }

    /// Zoom to fly to when a cluster is clicked; -1 for unknown clusters.
    pub fn expansion_zoom(&mut self, cluster: f64) -> i32 {
        match cluster_id(cluster) {
            Ok(id) => self.catalogue.expansion_zoom(id).unwrap_or(-1),
            Err(e) => {
                log_error(&format!("specimap: {}", e));
                -1
            }
        }
    }

    /// Records under a cluster, paged. `[]` for unknown clusters.
    pub fn cluster_leaves(&mut self, cluster: f64, limit: usize, offset: usize) -> String {
        let result = self.leaves_json(cluster, limit, offset);
        respond(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    const RECORDS: &str = r#"[
        {"id": 1, "classification": "Mammal", "made_date": "1972-05-01", "lat": 37.5665, "lng": 126.978},
        {"id": 2, "classification": "Bird", "made_date": "1999-01-01", "maker": "Kim", "lat": 35.1796, "lng": 129.0756},
        {"id": 3, "classification": "Mammal", "made_date": null, "lat": 37.5665, "lng": 126.978}
    ]"#;

    fn parse(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    fn ids(v: &Value) -> Vec<i64> {
        v["records"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_extract_facets_json() {
        let v = parse(&extract_facets(RECORDS));
        assert_eq!(v["classifications"], serde_json::json!(["Bird", "Mammal"]));
        assert_eq!(v["made_years"], serde_json::json!({"min": 1972, "max": 1999}));
        assert_eq!(v["makers"], serde_json::json!(["Kim", "제작자 미상"]));
    }

    #[test]
    fn test_filter_records_json() {
        let v = parse(&filter_records(RECORDS, r#"["Mammal"]"#));
        assert_eq!(ids(&v), vec![1, 3]);
        assert_eq!(v["total"], 3);

        let v = parse(&filter_records(RECORDS, "null"));
        assert_eq!(ids(&v), vec![1, 2, 3]);
        let v = parse(&filter_records(RECORDS, ""));
        assert_eq!(ids(&v), vec![1, 2, 3]);
    }

    #[test]
    fn test_bad_json_reports_error() {
        let v = parse(&extract_facets("not json"));
        assert!(v["error"]["message"].as_str().unwrap().starts_with("records are not valid"));

        let v = parse(&filter_records(RECORDS, "{"));
        assert!(v["error"]["message"].as_str().unwrap().starts_with("filter tags are not valid"));
    }

    #[test]
    fn test_specimen_map_session() {
        let mut map = SpecimenMap::new(r#"{"cluster": {"max_zoom": 10}}"#);
        assert_eq!(map.catalogue.config().cluster.max_zoom, 10);
        assert_eq!(map.catalogue.config().cluster.radius, 60.0);

        let facets = parse(&map.set_records(RECORDS));
        assert_eq!(facets["classifications"], serde_json::json!(["Bird", "Mammal"]));

        let filtered = parse(&map.set_filter(r#"["표본 제작 기간: 1980-2000"]"#));
        assert_eq!(ids(&filtered), vec![2]);

        let filtered = parse(&map.set_filter("[]"));
        assert_eq!(ids(&filtered), vec![1, 2, 3]);

        let out = parse(&map.render(90.0, -90.0, 180.0, -180.0, 11.0));
        assert_eq!(out["point_count"], 3);
        let nodes = out["nodes"].as_array().unwrap();
        assert_eq!(nodes.len(), 3);
        assert!(nodes.iter().all(|n| n["kind"] == "marker"));
        assert!(nodes.iter().all(|n| n["record"]["id"].is_i64()));

        let out = parse(&map.render(90.0, -90.0, 180.0, -180.0, 0.0));
        let cluster = &out["nodes"][0];
        assert_eq!(cluster["kind"], "cluster");
        assert_eq!(cluster["point_count"], 3);
        let id = cluster["id"].as_f64().unwrap();
        assert!(map.expansion_zoom(id) >= 1);
        assert_eq!(parse(&map.cluster_leaves(id, 2, 0)).as_array().unwrap().len(), 2);

        assert_eq!(map.expansion_zoom(-1.0), -1);
        assert_eq!(map.expansion_zoom(0.5), -1);
        assert_eq!(parse(&map.cluster_leaves(1.0, 10, 0)), serde_json::json!([]));
    }

    #[test]
    fn test_bad_config_falls_back_to_defaults() {
        let map = SpecimenMap::new("{ nope");
        assert_eq!(map.catalogue.config(), &CatalogueConfig::default());
    }
}

// Map layout: colocation dispersion and viewport clustering.
//
// Pipeline:
// - disperse: fan out points that share an exact coordinate
// - cluster:  hierarchical grid clustering per zoom level, queried per viewport
//
// Submodules:
// - spatial_grid: uniform grid over projected points (radius + box queries)
// - disperse: colocation groups -> ring offsets in metres
// - cluster: ClusterIndex build and query

use serde::{Deserialize, Serialize};

mod cluster;
mod disperse;
mod spatial_grid;

pub use cluster::{cluster, ClusterIndex};
pub use disperse::{disperse, meters_between, METERS_PER_DEGREE_LAT};

/// Visible map region in degrees, as reported by the map widget.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self { north, south, east, west }
    }

    /// The whole world.
    pub fn world() -> Self {
        Self::new(90.0, -90.0, 180.0, -180.0)
    }

    /// Zero-area (or NaN) boxes cover nothing.
    pub fn is_degenerate(&self) -> bool {
        let any_nan = [self.north, self.south, self.east, self.west]
            .iter()
            .any(|v| v.is_nan());
        any_nan || self.north == self.south || self.east == self.west
    }
}

/// A coordinate with an opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoPoint<T> {
    pub lat: f64,
    pub lng: f64,
    pub payload: T,
}

impl<T> GeoPoint<T> {
    pub fn new(lat: f64, lng: f64, payload: T) -> Self {
        Self { lat, lng, payload }
    }
}

/// A point after dispersion: `lat`/`lng` is where it renders, `origin_*` is
/// where it really is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispersedPoint<T> {
    pub lat: f64,
    pub lng: f64,
    pub origin_lat: f64,
    pub origin_lng: f64,
    /// Number of points sharing the original coordinate (1 => not dispersed)
    pub group_size: usize,
    /// Position within the colocation group, in input order
    pub group_index: usize,
    pub payload: T,
}

/// What the map widget should draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderNode<T> {
    Cluster {
        /// Only meaningful for the index that produced it
        id: u64,
        lat: f64,
        lng: f64,
        point_count: usize,
    },
    Marker {
        lat: f64,
        lng: f64,
        #[serde(rename = "record")]
        payload: T,
    },
}

impl<T> RenderNode<T> {
    /// Number of input points this node stands for.
    pub fn point_count(&self) -> usize {
        match self {
            RenderNode::Cluster { point_count, .. } => *point_count,
            RenderNode::Marker { .. } => 1,
        }
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self, RenderNode::Cluster { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisperseConfig {
    /// Ring radius for a group of N points is `base_radius_m + step_m * N`.
    pub base_radius_m: f64,
    pub step_m: f64,
}

impl Default for DisperseConfig {
    fn default() -> Self {
        Self {
            base_radius_m: 30.0,
            step_m: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Merge radius in pixels (relative to `extent`).
    pub radius: f64,
    /// Tile extent the radius is measured against.
    pub extent: f64,
    pub min_zoom: i32,
    /// Above this zoom every point is returned on its own. At most 30.
    pub max_zoom: i32,
    /// Minimum number of points that form a cluster.
    pub min_points: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            radius: 60.0,
            extent: 512.0,
            min_zoom: 0,
            max_zoom: 16,
            min_points: 2,
        }
    }
}

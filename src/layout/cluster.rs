// Viewport clustering.
//
// Build:
// - project every point into the Web Mercator unit square
// - level max_zoom + 1 holds every point on its own
// - for z = max_zoom down to min_zoom: walk level z + 1 in order; each node
//   not yet absorbed seeds a cluster from its unabsorbed neighbours within
//   radius / (extent * 2^z); the seed total must reach min_points
// - each level gets its own PointGrid
//
// Query:
// - round zoom, clamp to [min_zoom, max_zoom + 1]
// - pad the box by the level's reach, then keep every node whose leaf extent
//   touches the box, so a point inside the box is never dropped because its
//   cluster centroid lies outside
//
// Cluster ids encode (seed index, level it was built from) so children and
// expansion zoom can be recovered without extra bookkeeping. Ids are only
// meaningful for the index that issued them.

use std::f64::consts::PI;

use super::spatial_grid::PointGrid;
use super::{BoundingBox, ClusterConfig, DispersedPoint, RenderNode};

/// Highest zoom whose level number still fits the id encoding.
const MAX_ENCODABLE_ZOOM: i32 = 30;

/// Marks a node nobody has processed at the current zoom yet.
const UNPROCESSED: i32 = i32::MAX;

#[derive(Debug, Copy, Clone, PartialEq)]
enum NodeKind {
    /// Index into `ClusterIndex::points`
    Point(usize),
    Cluster(u64),
}

#[derive(Debug, Clone)]
struct Node {
    x: f64,
    y: f64,
    /// Last zoom this node was processed at.
    zoom: i32,
    kind: NodeKind,
    /// Cluster that absorbed this node one level up.
    parent: Option<u64>,
    num_points: usize,
    /// Projected bounding box of every leaf under this node.
    extent: Extent,
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct Extent {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Extent {
    fn point(x: f64, y: f64) -> Self {
        Self { min_x: x, min_y: y, max_x: x, max_y: y }
    }

    fn union(self, other: Extent) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Inclusive overlap; false when either side is NaN.
    fn intersects(&self, other: &Extent) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Farthest any leaf lies from (x, y) along either axis.
    fn reach_from(&self, x: f64, y: f64) -> f64 {
        (x - self.min_x)
            .max(self.max_x - x)
            .max(y - self.min_y)
            .max(self.max_y - y)
    }
}

#[derive(Debug, Clone)]
struct Level {
    nodes: Vec<Node>,
    grid: PointGrid,
    /// Largest distance from a node's position to one of its leaves.
    reach: f64,
}

impl Level {
    fn new(nodes: Vec<Node>, cell_size: f64) -> Self {
        let mut grid = PointGrid::new(cell_size);
        let mut reach = 0.0f64;
        for n in &nodes {
            grid.insert(n.x, n.y);
            reach = reach.max(n.extent.reach_from(n.x, n.y));
        }
        Self { nodes, grid, reach }
    }
}

/// Static hierarchical index over a point set. Build once, then query any
/// number of viewports.
#[derive(Debug, Clone)]
pub struct ClusterIndex<T> {
    cfg: ClusterConfig,
    points: Vec<DispersedPoint<T>>,
    /// `levels[z - min_zoom]` for z in min_zoom..=max_zoom + 1
    levels: Vec<Level>,
}

fn lng_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

fn lat_y(lat: f64) -> f64 {
    let sin = (lat * PI / 180.0).sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    y.clamp(0.0, 1.0)
}

fn x_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

fn y_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0) * PI / 180.0;
    360.0 * y2.exp().atan() / PI - 90.0
}

/// Longitude wrapped into [-180, 180).
fn wrap_lng(lng: f64) -> f64 {
    ((lng + 180.0) % 360.0 + 360.0) % 360.0 - 180.0
}

impl<T: Clone> ClusterIndex<T> {
    pub fn new(points: Vec<DispersedPoint<T>>, cfg: &ClusterConfig) -> Self {
        let mut cfg = cfg.clone();
        cfg.max_zoom = cfg.max_zoom.clamp(0, MAX_ENCODABLE_ZOOM - 1);
        cfg.min_zoom = cfg.min_zoom.clamp(0, cfg.max_zoom);

        let leaves: Vec<Node> = points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let (x, y) = (lng_x(p.lng), lat_y(p.lat));
                Node {
                    x,
                    y,
                    zoom: UNPROCESSED,
                    kind: NodeKind::Point(i),
                    parent: None,
                    num_points: 1,
                    extent: Extent::point(x, y),
                }
            })
            .collect();

        let n_levels = (cfg.max_zoom - cfg.min_zoom + 2) as usize;
        let mut levels: Vec<Level> = Vec::with_capacity(n_levels);
        levels.push(Level::new(leaves, radius_at(&cfg, cfg.max_zoom)));

        // levels is built finest first, reversed at the end
        for z in (cfg.min_zoom..=cfg.max_zoom).rev() {
            let Some(finer) = levels.last_mut() else { break };
            let nodes = cluster_level(finer, z, &cfg, points.len());
            let cell = if z > cfg.min_zoom { radius_at(&cfg, z - 1) } else { radius_at(&cfg, z) };
            levels.push(Level::new(nodes, cell));
        }
        levels.reverse();

        tracing::debug!(
            points = points.len(),
            levels = levels.len(),
            top_level_nodes = levels.first().map(|l| l.grid.len()).unwrap_or(0),
            "built cluster index"
        );

        Self { cfg, points, levels }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.cfg
    }

    /// The indexed points, in input order.
    pub fn points(&self) -> &[DispersedPoint<T>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn level(&self, zoom: i32) -> Option<&Level> {
        let offset = zoom.checked_sub(self.cfg.min_zoom)?;
        usize::try_from(offset).ok().and_then(|i| self.levels.get(i))
    }

    fn limit_zoom(&self, zoom: f64) -> i32 {
        let z = zoom.round();
        let lo = self.cfg.min_zoom as f64;
        let hi = (self.cfg.max_zoom + 1) as f64;
        // NaN falls through clamp unchanged; treat it as the coarsest level
        if z.is_nan() { self.cfg.min_zoom } else { z.clamp(lo, hi) as i32 }
    }

    /// Render nodes for a viewport.
    pub fn clusters(&self, bounds: &BoundingBox, zoom: f64) -> Vec<RenderNode<T>> {
        if self.points.is_empty() || bounds.is_degenerate() {
            return Vec::new();
        }
        let z = self.limit_zoom(zoom);
        let min_lat = bounds.south.clamp(-90.0, 90.0);
        let max_lat = bounds.north.clamp(-90.0, 90.0);

        let (min_lng, max_lng) = if bounds.east - bounds.west >= 360.0 {
            (-180.0, 180.0)
        } else {
            let min_lng = wrap_lng(bounds.west);
            let max_lng = if bounds.east == 180.0 { 180.0 } else { wrap_lng(bounds.east) };
            if min_lng > max_lng {
                // crosses the antimeridian: eastern part then western part
                return self.query(
                    z,
                    &[
                        projected(min_lng, min_lat, 180.0, max_lat),
                        projected(-180.0, min_lat, max_lng, max_lat),
                    ],
                );
            }
            (min_lng, max_lng)
        };
        self.query(z, &[projected(min_lng, min_lat, max_lng, max_lat)])
    }

    /// Nodes with at least one leaf inside any of `boxes`, each node once.
    fn query(&self, z: i32, boxes: &[Extent]) -> Vec<RenderNode<T>> {
        let Some(level) = self.level(z) else {
            return Vec::new();
        };
        let pad = level.reach;
        let mut ids: Vec<usize> = boxes
            .iter()
            .flat_map(move |b| {
                level
                    .grid
                    .range(b.min_x - pad, b.min_y - pad, b.max_x + pad, b.max_y + pad)
                    .into_iter()
                    .filter(move |&id| level.nodes[id].extent.intersects(b))
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter()
            .map(|id| self.render(&level.nodes[id]))
            .collect()
    }

    fn render(&self, node: &Node) -> RenderNode<T> {
        match node.kind {
            NodeKind::Cluster(id) => RenderNode::Cluster {
                id,
                lat: y_lat(node.y),
                lng: x_lng(node.x),
                point_count: node.num_points,
            },
            NodeKind::Point(i) => {
                let p = &self.points[i];
                RenderNode::Marker {
                    lat: p.lat,
                    lng: p.lng,
                    payload: p.payload.clone(),
                }
            }
        }
    }

    fn origin(&self, cluster_id: u64) -> Option<(usize, i32)> {
        let rel = cluster_id.checked_sub(self.points.len() as u64)?;
        let origin_zoom = (rel % 32) as i32;
        let origin_index = usize::try_from(rel >> 5).ok()?;
        Some((origin_index, origin_zoom))
    }

    /// Direct children of a cluster: the nodes it absorbed one level finer.
    /// None for ids this index did not issue.
    pub fn children(&self, cluster_id: u64) -> Option<Vec<RenderNode<T>>> {
        let (origin_index, origin_zoom) = self.origin(cluster_id)?;
        if origin_zoom <= self.cfg.min_zoom {
            return None;
        }
        let level = self.level(origin_zoom)?;
        let seed = level.nodes.get(origin_index)?;
        let r = radius_at(&self.cfg, origin_zoom - 1);

        let children: Vec<RenderNode<T>> = level
            .grid
            .within(seed.x, seed.y, r)
            .into_iter()
            .map(|id| &level.nodes[id])
            .filter(|n| n.parent == Some(cluster_id))
            .map(|n| self.render(n))
            .collect();
        if children.is_empty() { None } else { Some(children) }
    }

    /// Smallest zoom at which the cluster splits into more than one node.
    pub fn expansion_zoom(&self, cluster_id: u64) -> Option<i32> {
        let (_, origin_zoom) = self.origin(cluster_id)?;
        let mut id = cluster_id;
        let mut zoom = origin_zoom - 1;
        while zoom <= self.cfg.max_zoom {
            let children = self.children(id)?;
            zoom += 1;
            match children.as_slice() {
                [RenderNode::Cluster { id: child, .. }] => id = *child,
                _ => break,
            }
        }
        Some(zoom)
    }

    /// Payloads of the points under a cluster, paged by `offset` / `limit`.
    pub fn leaves(&self, cluster_id: u64, limit: usize, offset: usize) -> Option<Vec<T>> {
        let mut out = Vec::new();
        if limit == 0 {
            self.children(cluster_id)?;
            return Some(out);
        }
        self.append_leaves(&mut out, cluster_id, limit, offset, 0)?;
        Some(out)
    }

    fn append_leaves(
        &self,
        out: &mut Vec<T>,
        cluster_id: u64,
        limit: usize,
        offset: usize,
        mut skipped: usize,
    ) -> Option<usize> {
        for child in self.children(cluster_id)? {
            match child {
                RenderNode::Cluster { id, point_count, .. } => {
                    if skipped + point_count <= offset {
                        skipped += point_count;
                    } else {
                        skipped = self.append_leaves(out, id, limit, offset, skipped)?;
                    }
                }
                RenderNode::Marker { payload, .. } => {
                    if skipped < offset {
                        skipped += 1;
                    } else {
                        out.push(payload);
                    }
                }
            }
            if out.len() == limit {
                break;
            }
        }
        Some(skipped)
    }
}

/// Projected box for a lng/lat box. North maps to the smaller y.
fn projected(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Extent {
    Extent {
        min_x: lng_x(min_lng),
        min_y: lat_y(max_lat),
        max_x: lng_x(max_lng),
        max_y: lat_y(min_lat),
    }
}

fn radius_at(cfg: &ClusterConfig, zoom: i32) -> f64 {
    cfg.radius / (cfg.extent * 2f64.powi(zoom))
}

/// Merge level `z + 1` (`finer`) into the nodes of level `z`.
fn cluster_level(finer: &mut Level, z: i32, cfg: &ClusterConfig, n_points: usize) -> Vec<Node> {
    let r = radius_at(cfg, z);
    let mut next = Vec::new();

    for i in 0..finer.nodes.len() {
        if finer.nodes[i].zoom <= z {
            continue;
        }
        finer.nodes[i].zoom = z;

        let (x, y) = (finer.nodes[i].x, finer.nodes[i].y);
        let neighbors = finer.grid.within(x, y, r);
        let origin_count = finer.nodes[i].num_points;
        let total: usize = origin_count
            + neighbors
                .iter()
                .map(|&k| &finer.nodes[k])
                .filter(|n| n.zoom > z)
                .map(|n| n.num_points)
                .sum::<usize>();

        if total > origin_count && total >= cfg.min_points {
            let id = ((i as u64) << 5) + (z as u64 + 1) + n_points as u64;
            let mut wx = x * origin_count as f64;
            let mut wy = y * origin_count as f64;
            let mut extent = finer.nodes[i].extent;
            for &k in &neighbors {
                let n = &mut finer.nodes[k];
                if n.zoom <= z {
                    continue;
                }
                n.zoom = z;
                wx += n.x * n.num_points as f64;
                wy += n.y * n.num_points as f64;
                extent = extent.union(n.extent);
                n.parent = Some(id);
            }
            finer.nodes[i].parent = Some(id);
            next.push(Node {
                x: wx / total as f64,
                y: wy / total as f64,
                zoom: UNPROCESSED,
                kind: NodeKind::Cluster(id),
                parent: None,
                num_points: total,
                extent,
            });
        } else {
            next.push(finer.nodes[i].clone());
            if total > 1 {
                for &k in &neighbors {
                    let n = &mut finer.nodes[k];
                    if n.zoom <= z {
                        continue;
                    }
                    n.zoom = z;
                    next.push(n.clone());
                }
            }
        }
    }
    next
}

/// One-shot form: index `points` and query a single viewport.
pub fn cluster<T: Clone>(
    points: Vec<DispersedPoint<T>>,
    bounds: &BoundingBox,
    zoom: f64,
    cfg: &ClusterConfig,
) -> Vec<RenderNode<T>> {
    ClusterIndex::new(points, cfg).clusters(bounds, zoom)
}

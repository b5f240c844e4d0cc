// Colocation dispersion.
//
// Points with the exact same (lat, lng) would draw on top of each other. Each
// such group is spread evenly on a ring around the shared coordinate; the ring
// grows with the group so large groups stay legible. Singletons are untouched.

use std::collections::HashMap;
use std::f64::consts::{PI, TAU};

use super::{DispersedPoint, DisperseConfig, GeoPoint};

pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

fn meters_per_degree_lng(lat: f64) -> f64 {
    METERS_PER_DEGREE_LAT * (lat * PI / 180.0).cos()
}

/// Hash key for exact coordinate equality. `-0.0` folds into `0.0` so the
/// key agrees with `==`. None for NaN, which equals nothing.
fn coord_key(lat: f64, lng: f64) -> Option<(u64, u64)> {
    if lat.is_nan() || lng.is_nan() {
        return None;
    }
    let bits = |v: f64| if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() };
    Some((bits(lat), bits(lng)))
}

/// Spread colocated points. Output has one entry per input, in input order.
pub fn disperse<T>(points: Vec<GeoPoint<T>>, cfg: &DisperseConfig) -> Vec<DispersedPoint<T>> {
    let mut group_sizes: HashMap<(u64, u64), usize> = HashMap::new();
    for key in points.iter().filter_map(|p| coord_key(p.lat, p.lng)) {
        *group_sizes.entry(key).or_default() += 1;
    }

    let mut seen: HashMap<(u64, u64), usize> = HashMap::new();
    let mut groups = 0usize;
    let out: Vec<DispersedPoint<T>> = points
        .into_iter()
        .map(|p| {
            let (n, i) = match coord_key(p.lat, p.lng) {
                Some(key) => {
                    let slot = seen.entry(key).or_default();
                    let i = *slot;
                    *slot += 1;
                    (group_sizes.get(&key).copied().unwrap_or(1), i)
                }
                None => (1, 0),
            };

            if n == 1 {
                return DispersedPoint {
                    lat: p.lat,
                    lng: p.lng,
                    origin_lat: p.lat,
                    origin_lng: p.lng,
                    group_size: 1,
                    group_index: 0,
                    payload: p.payload,
                };
            }
            if i == 0 {
                groups += 1;
            }

            let radius = cfg.base_radius_m + cfg.step_m * n as f64;
            let angle = TAU * i as f64 / n as f64;
            let dlat = radius * angle.sin() / METERS_PER_DEGREE_LAT;
            let dlng = radius * angle.cos() / meters_per_degree_lng(p.lat);
            DispersedPoint {
                lat: p.lat + dlat,
                lng: p.lng + dlng,
                origin_lat: p.lat,
                origin_lng: p.lng,
                group_size: n,
                group_index: i,
                payload: p.payload,
            }
        })
        .collect();

    tracing::debug!(points = out.len(), colocated_groups = groups, "dispersed points");
    out
}

/// Local planar distance in metres, using the same degree lengths as `disperse`
/// evaluated at `lat_a`.
pub fn meters_between(lat_a: f64, lng_a: f64, lat_b: f64, lng_b: f64) -> f64 {
    let dy = (lat_b - lat_a) * METERS_PER_DEGREE_LAT;
    let dx = (lng_b - lng_a) * meters_per_degree_lng(lat_a);
    dx.hypot(dy)
}

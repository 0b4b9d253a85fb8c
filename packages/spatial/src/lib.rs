#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Great-circle distance and radius lookups over incident positions.
//!
//! [`haversine_distance_km`] is the single distance function used for the
//! traffic signal. [`ProximityIndex`] builds an R-tree over point positions
//! so radius queries only run the haversine check on candidates inside a
//! conservative bounding box.

use rstar::{AABB, RTree, RTreeObject};

/// Mean Earth radius used by every distance computation, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two WGS84 points in kilometres.
///
/// `a = sin²(Δlat/2) + cos(lat1)·cos(lat2)·sin²(Δlon/2)`,
/// `d = 2·R·atan2(√a, √(1−a))`.
#[must_use]
pub fn haversine_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// A point stored in the R-tree, pointing back at its slot in the source
/// slice.
struct IndexedPoint {
    slot: usize,
    lat: f64,
    lng: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

/// Degrees added to every search box edge to absorb rounding.
const ENVELOPE_MARGIN_DEG: f64 = 1e-9;

/// R-tree over `(lat, lng)` positions for radius queries.
///
/// Query results are exactly the slots whose haversine distance to the
/// center is `<= radius_km`; the tree only narrows the candidates.
pub struct ProximityIndex {
    tree: RTree<IndexedPoint>,
    len: usize,
}

impl ProximityIndex {
    /// Builds an index over `points`. Slot `i` in query results refers to
    /// `points[i]`. Non-finite positions are left out of the index.
    #[must_use]
    pub fn build(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut len = 0;
        let entries: Vec<IndexedPoint> = points
            .into_iter()
            .enumerate()
            .inspect(|_| len += 1)
            .filter(|(_, (lat, lng))| lat.is_finite() && lng.is_finite())
            .map(|(slot, (lat, lng))| IndexedPoint { slot, lat, lng })
            .collect();

        log::debug!(
            "Built proximity index with {} of {len} points",
            entries.len()
        );

        Self {
            tree: RTree::bulk_load(entries),
            len,
        }
    }

    /// Number of positions the index was built from.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the index was built from no positions.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slots within `radius_km` of `(lat, lng)`, in ascending slot order.
    #[must_use]
    pub fn within_radius(&self, lat: f64, lng: f64, radius_km: f64) -> Vec<usize> {
        if !(lat.is_finite() && lng.is_finite()) || radius_km.is_nan() || radius_km < 0.0 {
            return Vec::new();
        }

        let within = |p: &IndexedPoint| haversine_distance_km(lat, lng, p.lat, p.lng) <= radius_km;

        let mut slots: Vec<usize> = match search_envelope(lat, lng, radius_km) {
            Some(envelope) => self
                .tree
                .locate_in_envelope(&envelope)
                .filter(|p| within(p))
                .map(|p| p.slot)
                .collect(),
            None => self
                .tree
                .iter()
                .filter(|p| within(p))
                .map(|p| p.slot)
                .collect(),
        };

        slots.sort_unstable();
        slots
    }
}

/// Bounding box in `[lng, lat]` degrees containing every point within
/// `radius_km` of the center.
///
/// Returns `None` when the box would touch a pole or wrap the antimeridian;
/// callers then scan every point.
fn search_envelope(lat: f64, lng: f64, radius_km: f64) -> Option<AABB<[f64; 2]>> {
    let angular = radius_km / EARTH_RADIUS_KM;
    if !angular.is_finite() || angular >= std::f64::consts::PI {
        return None;
    }

    // Great-circle distance is never shorter than the latitude difference.
    let d_lat = angular.to_degrees() + ENVELOPE_MARGIN_DEG;
    let max_abs_lat = lat.abs() + d_lat;
    if max_abs_lat >= 90.0 {
        return None;
    }

    // sin(d/2R) >= √(cos(lat1)·cos(lat2))·sin(Δlon/2) >= cos(φmax)·sin(Δlon/2)
    let cos_max = max_abs_lat.to_radians().cos();
    let ratio = (angular / 2.0).sin() / cos_max;
    if ratio >= 1.0 {
        return None;
    }
    let d_lng = (2.0 * ratio.asin()).to_degrees() + ENVELOPE_MARGIN_DEG;
    if lng - d_lng < -180.0 || lng + d_lng > 180.0 {
        return None;
    }

    Some(AABB::from_corners(
        [lng - d_lng, lat - d_lat],
        [lng + d_lng, lat + d_lat],
    ))
}

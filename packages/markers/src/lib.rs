#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map marker aggregation.
//!
//! Incidents are grouped by their position rounded to three decimal places
//! (roughly 100 m) and their type. Each group becomes one [`MapMarker`]
//! whose badge shows how many reports fell into it. The marker is drawn at
//! the exact coordinates of the first report seen for its bucket.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trafficpulse_incident_models::{Incident, IncidentType};

/// Scale applied before rounding: three decimal places.
const BUCKET_SCALE: f64 = 1000.0;

/// Identity of a marker: rounded position plus incident type.
///
/// Coordinates are kept as integer thousandths of a degree so keys compare
/// exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerKey {
    /// Latitude in thousandths of a degree.
    pub lat_milli: i64,
    /// Longitude in thousandths of a degree.
    pub lng_milli: i64,
    /// Incident type.
    pub incident_type: IncidentType,
}

impl MarkerKey {
    /// Computes the bucket key for a position and type.
    #[must_use]
    pub fn new(lat: f64, lng: f64, incident_type: IncidentType) -> Self {
        Self {
            lat_milli: bucket(lat),
            lng_milli: bucket(lng),
            incident_type,
        }
    }

    /// Computes the bucket key for an incident.
    #[must_use]
    pub fn for_incident(incident: &Incident) -> Self {
        Self::new(
            incident.location.lat,
            incident.location.lng,
            incident.incident_type,
        )
    }

    /// Rounded latitude in degrees.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rounded_lat(&self) -> f64 {
        self.lat_milli as f64 / BUCKET_SCALE
    }

    /// Rounded longitude in degrees.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rounded_lng(&self) -> f64 {
        self.lng_milli as f64 / BUCKET_SCALE
    }

    /// Textual form used as the marker ID, e.g. `"17.385-78.487-accident"`.
    #[must_use]
    pub fn id(&self) -> String {
        format!(
            "{}-{}-{}",
            self.rounded_lat(),
            self.rounded_lng(),
            self.incident_type
        )
    }
}

/// Rounds half toward positive infinity, so `-0.0005` and `0.0005` land in
/// different buckets the same way map clients round them.
#[allow(clippy::cast_possible_truncation)]
fn bucket(value: f64) -> i64 {
    let scaled = value * BUCKET_SCALE;
    let floor = scaled.floor();
    let rounded = if scaled - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    };
    rounded as i64
}

/// Where a marker is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
}

/// One pin on the map standing for every incident in its bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    /// Textual bucket key.
    pub id: String,
    /// Exact coordinates of the first incident seen in this bucket.
    pub position: Position,
    /// Incident type shared by every member.
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    /// Number of incidents in this bucket. Always at least 1.
    pub count: usize,
}

/// Collapses incidents into one marker per bucket key.
///
/// Markers come back in the order their bucket was first seen. Incidents
/// whose location is non-finite or out of range are skipped and logged.
#[must_use]
pub fn aggregate(incidents: &[Incident]) -> Vec<MapMarker> {
    let mut slots: BTreeMap<MarkerKey, usize> = BTreeMap::new();
    let mut markers: Vec<MapMarker> = Vec::new();
    let mut skipped = 0_usize;

    for incident in incidents {
        if !incident.location.is_valid() {
            skipped += 1;
            log::warn!(
                "Skipping incident {} with malformed location ({}, {})",
                incident.id,
                incident.location.lat,
                incident.location.lng
            );
            continue;
        }

        let key = MarkerKey::for_incident(incident);
        if let Some(&slot) = slots.get(&key) {
            markers[slot].count += 1;
        } else {
            slots.insert(key, markers.len());
            markers.push(MapMarker {
                id: key.id(),
                position: Position {
                    lat: incident.location.lat,
                    lng: incident.location.lng,
                },
                incident_type: incident.incident_type,
                count: 1,
            });
        }
    }

    log::debug!(
        "Aggregated {} incidents into {} markers ({skipped} skipped)",
        incidents.len(),
        markers.len()
    );

    markers
}

/// Keeps markers whose type is in `selected`. An empty selection keeps all.
#[must_use]
pub fn filter_by_types(markers: &[MapMarker], selected: &[IncidentType]) -> Vec<MapMarker> {
    markers
        .iter()
        .filter(|marker| selected.is_empty() || selected.contains(&marker.incident_type))
        .cloned()
        .collect()
}

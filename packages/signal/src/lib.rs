#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Traffic signal evaluation.
//!
//! [`evaluate`] counts the distinct users who reported each severity
//! channel within a radius of a point. [`active_light`] turns those counts
//! into the single light shown to the user. [`SignalEvaluator`] answers the
//! same question through an R-tree when one snapshot is queried repeatedly.

use std::collections::BTreeSet;

use trafficpulse_incident_models::{Incident, SignalChannel};
use trafficpulse_signal_models::{ActiveLight, SignalReading, TrafficSignalState};
use trafficpulse_spatial::{ProximityIndex, haversine_distance_km};

/// Distinct reporters a channel needs before it takes over the signal.
pub const ALERT_THRESHOLD: usize = 6;

/// Radius used for "my vicinity" readings, in kilometres.
pub const DEFAULT_RADIUS_KM: f64 = 2.0;

/// Per-channel sets of reporting users.
#[derive(Default)]
struct UniqueReporters<'a> {
    red: BTreeSet<&'a str>,
    yellow: BTreeSet<&'a str>,
    green: BTreeSet<&'a str>,
}

impl<'a> UniqueReporters<'a> {
    fn add(&mut self, incident: &'a Incident) {
        let users = match incident.channel() {
            SignalChannel::Red => &mut self.red,
            SignalChannel::Yellow => &mut self.yellow,
            SignalChannel::Green => &mut self.green,
        };
        users.insert(incident.user_id.as_str());
    }

    fn into_state(self) -> TrafficSignalState {
        TrafficSignalState::new(self.red.len(), self.yellow.len(), self.green.len())
    }
}

/// Counts distinct reporters per channel within `radius_km` of `center`.
///
/// `center` is `(lat, lng)`. An incident exactly `radius_km` away is
/// included. Incidents with a malformed location are skipped.
#[must_use]
pub fn evaluate(center: (f64, f64), radius_km: f64, incidents: &[Incident]) -> TrafficSignalState {
    let (lat, lng) = center;
    let mut reporters = UniqueReporters::default();

    for incident in incidents {
        if !incident.location.is_valid() {
            log::debug!("Ignoring incident {} with malformed location", incident.id);
            continue;
        }
        let distance =
            haversine_distance_km(lat, lng, incident.location.lat, incident.location.lng);
        if distance <= radius_km {
            reporters.add(incident);
        }
    }

    reporters.into_state()
}

/// Channels that can take over the signal, highest precedence first.
const ALERT_CHANNELS: [SignalChannel; 2] = [SignalChannel::Red, SignalChannel::Yellow];

/// Picks the light to show for a signal state.
///
/// Red wins once it reaches [`ALERT_THRESHOLD`], then yellow, then green.
/// Below the threshold, or with no reports at all, the light is green.
#[must_use]
pub fn active_light(state: &TrafficSignalState) -> ActiveLight {
    ALERT_CHANNELS
        .into_iter()
        .find(|&channel| state.get(channel) >= ALERT_THRESHOLD)
        .map_or(ActiveLight::Green, ActiveLight::from)
}

/// Evaluates and packages a reading for display.
#[must_use]
pub fn read(center: (f64, f64), radius_km: f64, incidents: &[Incident]) -> SignalReading {
    reading(center, radius_km, evaluate(center, radius_km, incidents))
}

fn reading(center: (f64, f64), radius_km: f64, state: TrafficSignalState) -> SignalReading {
    let light = active_light(&state);
    SignalReading {
        lat: center.0,
        lng: center.1,
        radius_km,
        state,
        light,
        label: light.label().to_string(),
    }
}

/// Answers repeated signal queries over one snapshot.
///
/// Produces exactly what [`evaluate`] would for the same snapshot.
pub struct SignalEvaluator<'a> {
    incidents: &'a [Incident],
    index: ProximityIndex,
}

impl<'a> SignalEvaluator<'a> {
    /// Indexes the positions of `incidents`.
    #[must_use]
    pub fn new(incidents: &'a [Incident]) -> Self {
        let index = ProximityIndex::build(incidents.iter().map(|incident| {
            if incident.location.is_valid() {
                (incident.location.lat, incident.location.lng)
            } else {
                (f64::NAN, f64::NAN)
            }
        }));
        Self { incidents, index }
    }

    /// Counts distinct reporters per channel within `radius_km` of `center`.
    #[must_use]
    pub fn evaluate(&self, center: (f64, f64), radius_km: f64) -> TrafficSignalState {
        let mut reporters = UniqueReporters::default();
        for slot in self.index.within_radius(center.0, center.1, radius_km) {
            reporters.add(&self.incidents[slot]);
        }
        reporters.into_state()
    }

    /// Evaluates and packages a reading for display.
    #[must_use]
    pub fn read(&self, center: (f64, f64), radius_km: f64) -> SignalReading {
        reading(center, radius_km, self.evaluate(center, radius_km))
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Application state for the incident map.
//!
//! A [`Dashboard`] owns the latest incident snapshot together with the
//! user's type filter and current location. Every snapshot rebuilds the
//! markers from scratch; signal readings are computed on demand. Nothing
//! here reads global state: the snapshot arrives either through
//! [`Dashboard::apply_snapshot`] or a feed subscription set up by
//! [`Dashboard::attach`].

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use trafficpulse_feed::{IncidentFeed, SnapshotCallback, Subscription};
use trafficpulse_incident_models::{Incident, IncidentType, sort_most_recent_first};
use trafficpulse_markers::{MapMarker, aggregate, filter_by_types};
use trafficpulse_signal::{DEFAULT_RADIUS_KM, active_light};
use trafficpulse_signal_models::{ActiveLight, SignalReading, TrafficSignalState};

/// Map center used before the user's position is known (Hyderabad).
pub const DEFAULT_LOCATION: Coordinates = Coordinates {
    lat: 17.385,
    lng: 78.4867,
};

/// A bare latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
}

impl From<Coordinates> for (f64, f64) {
    fn from(c: Coordinates) -> Self {
        (c.lat, c.lng)
    }
}

/// Startup settings for a [`Dashboard`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    /// Location used until a position fix arrives.
    pub default_location: Option<Coordinates>,
    /// Radius of the vicinity signal, in kilometres.
    pub radius_km: f64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_location: Some(DEFAULT_LOCATION),
            radius_km: DEFAULT_RADIUS_KM,
        }
    }
}

/// Latest snapshot plus the user's view settings.
pub struct Dashboard {
    incidents: Arc<[Incident]>,
    markers: Vec<MapMarker>,
    selected_types: Vec<IncidentType>,
    current_location: Option<Coordinates>,
    radius_km: f64,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(DashboardConfig::default())
    }
}

impl Dashboard {
    /// Creates an empty dashboard.
    #[must_use]
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            incidents: Arc::from(Vec::new()),
            markers: Vec::new(),
            selected_types: Vec::new(),
            current_location: config.default_location,
            radius_km: config.radius_km,
        }
    }

    /// Replaces the snapshot and rebuilds every marker.
    pub fn apply_snapshot(&mut self, incidents: Arc<[Incident]>) {
        let is_sorted = incidents
            .windows(2)
            .all(|pair| pair[0].timestamp >= pair[1].timestamp);
        self.incidents = if is_sorted {
            incidents
        } else {
            let mut sorted = incidents.to_vec();
            sort_most_recent_first(&mut sorted);
            Arc::from(sorted)
        };
        self.markers = aggregate(&self.incidents);

        log::debug!(
            "Dashboard snapshot: {} incidents, {} markers",
            self.incidents.len(),
            self.markers.len()
        );
    }

    /// Subscribes `dashboard` to `feed`. Keep the returned handle alive for
    /// as long as updates should flow.
    #[must_use]
    pub fn attach(dashboard: &Arc<Mutex<Self>>, feed: &dyn IncidentFeed) -> Subscription {
        let target = Arc::clone(dashboard);
        let on_snapshot: SnapshotCallback = Arc::new(move |snapshot| {
            target
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .apply_snapshot(snapshot);
        });
        feed.subscribe(on_snapshot)
    }

    /// Every incident in the snapshot, most recent first.
    #[must_use]
    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    /// Up to `limit` most recent incidents.
    #[must_use]
    pub fn recent(&self, limit: usize) -> &[Incident] {
        &self.incidents[..limit.min(self.incidents.len())]
    }

    /// Markers matching the type filter.
    #[must_use]
    pub fn markers(&self) -> Vec<MapMarker> {
        filter_by_types(&self.markers, &self.selected_types)
    }

    /// Types currently shown. Empty means all.
    #[must_use]
    pub fn selected_types(&self) -> &[IncidentType] {
        &self.selected_types
    }

    /// Replaces the type filter.
    pub fn set_selected_types(&mut self, types: Vec<IncidentType>) {
        self.selected_types = types;
    }

    /// Adds `incident_type` to the filter, or removes it if present.
    pub fn toggle_type(&mut self, incident_type: IncidentType) {
        if let Some(pos) = self.selected_types.iter().position(|t| *t == incident_type) {
            self.selected_types.remove(pos);
        } else {
            self.selected_types.push(incident_type);
        }
    }

    /// The user's position, if known.
    #[must_use]
    pub const fn current_location(&self) -> Option<Coordinates> {
        self.current_location
    }

    /// Updates the user's position.
    pub fn set_current_location(&mut self, location: Option<Coordinates>) {
        self.current_location = location;
    }

    /// Radius of the vicinity signal, in kilometres.
    #[must_use]
    pub const fn radius_km(&self) -> f64 {
        self.radius_km
    }

    /// Signal counts around the current location; all zero when the
    /// location is unknown.
    #[must_use]
    pub fn signal(&self) -> TrafficSignalState {
        self.current_location
            .map(|center| {
                trafficpulse_signal::evaluate(center.into(), self.radius_km, &self.incidents)
            })
            .unwrap_or_default()
    }

    /// Light for [`Self::signal`].
    #[must_use]
    pub fn active_light(&self) -> ActiveLight {
        active_light(&self.signal())
    }

    /// Full reading around the current location, if known.
    #[must_use]
    pub fn reading(&self) -> Option<SignalReading> {
        self.current_location
            .map(|center| trafficpulse_signal::read(center.into(), self.radius_km, &self.incidents))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use trafficpulse_feed::IncidentStore;
    use trafficpulse_feed::memory::InMemoryStore;
    use trafficpulse_incident_models::{Location, NewIncident};

    use super::*;

    fn incident(n: i64, incident_type: IncidentType, user: &str) -> Incident {
        Incident {
            id: format!("i{n}"),
            incident_type,
            details: String::new(),
            location: Location::new(17.385, 78.4867),
            user_id: user.to_string(),
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap() + Duration::seconds(n),
            image_url: None,
        }
    }

    #[test]
    fn starts_at_default_location_with_green_light() {
        let dashboard = Dashboard::default();
        assert_eq!(dashboard.current_location(), Some(DEFAULT_LOCATION));
        assert!(dashboard.markers().is_empty());
        assert_eq!(dashboard.signal(), TrafficSignalState::default());
        assert_eq!(dashboard.active_light(), ActiveLight::Green);
    }

    #[test]
    fn snapshot_rebuilds_markers_and_sorts() {
        let mut dashboard = Dashboard::default();
        dashboard.apply_snapshot(Arc::from(vec![
            incident(1, IncidentType::Accident, "a"),
            incident(3, IncidentType::Accident, "b"),
            incident(2, IncidentType::Construction, "c"),
        ]));

        let ids: Vec<&str> = dashboard.recent(2).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["i3", "i2"]);
        assert_eq!(dashboard.recent(10).len(), 3);
        assert_eq!(dashboard.markers().len(), 2);

        dashboard.apply_snapshot(Arc::from(Vec::new()));
        assert!(dashboard.markers().is_empty());
    }

    #[test]
    fn toggling_types_filters_markers() {
        let mut dashboard = Dashboard::default();
        dashboard.apply_snapshot(Arc::from(vec![
            incident(1, IncidentType::Accident, "a"),
            incident(2, IncidentType::RoadFree, "b"),
        ]));

        dashboard.toggle_type(IncidentType::RoadFree);
        let markers = dashboard.markers();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].incident_type, IncidentType::RoadFree);

        dashboard.toggle_type(IncidentType::RoadFree);
        assert!(dashboard.selected_types().is_empty());
        assert_eq!(dashboard.markers().len(), 2);
    }

    #[test]
    fn unknown_location_reads_zero() {
        let mut dashboard = Dashboard::default();
        dashboard.apply_snapshot(Arc::from(vec![incident(1, IncidentType::Accident, "a")]));
        assert_eq!(dashboard.signal().red, 1);

        dashboard.set_current_location(None);
        assert_eq!(dashboard.signal(), TrafficSignalState::default());
        assert!(dashboard.reading().is_none());
    }

    #[test]
    fn six_reporters_turn_the_light_red() {
        let mut dashboard = Dashboard::default();
        let incidents: Vec<Incident> = (0..6)
            .map(|n| incident(n, IncidentType::Roadblock, &format!("u{n}")))
            .collect();
        dashboard.apply_snapshot(Arc::from(incidents));

        assert_eq!(dashboard.active_light(), ActiveLight::Red);
        assert_eq!(dashboard.reading().unwrap().label, "High Alert");
    }

    #[tokio::test]
    async fn follows_feed_updates() {
        let store = InMemoryStore::new();
        let dashboard = Arc::new(Mutex::new(Dashboard::default()));
        let subscription = Dashboard::attach(&dashboard, &store);

        store
            .add(NewIncident::new(
                IncidentType::Construction,
                Location::new(17.386, 78.4867),
                "u1",
            ))
            .await
            .unwrap();

        {
            let view = dashboard.lock().unwrap();
            assert_eq!(view.incidents().len(), 1);
            assert_eq!(view.signal().yellow, 1);
        }

        subscription.unsubscribe();
        store
            .add(NewIncident::new(
                IncidentType::Construction,
                Location::new(17.386, 78.4867),
                "u2",
            ))
            .await
            .unwrap();
        assert_eq!(dashboard.lock().unwrap().incidents().len(), 1);
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Traffic signal types.
//!
//! A [`TrafficSignalState`] holds how many distinct users reported each
//! severity channel near a point. The single light shown to the user is an
//! [`ActiveLight`].

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use trafficpulse_incident_models::SignalChannel;

/// Distinct-reporter counts per severity channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrafficSignalState {
    /// Users who reported accidents or roadblocks.
    pub red: usize,
    /// Users who reported construction.
    pub yellow: usize,
    /// Users who reported clear roads.
    pub green: usize,
}

impl TrafficSignalState {
    /// Creates a state from raw counts.
    #[must_use]
    pub const fn new(red: usize, yellow: usize, green: usize) -> Self {
        Self { red, yellow, green }
    }

    /// Count for one channel.
    #[must_use]
    pub const fn get(&self, channel: SignalChannel) -> usize {
        match channel {
            SignalChannel::Red => self.red,
            SignalChannel::Yellow => self.yellow,
            SignalChannel::Green => self.green,
        }
    }

    /// Sum of all three channels.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.red + self.yellow + self.green
    }

    /// Whether no channel has any reporter.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// The single light lit on the signal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActiveLight {
    /// High alert
    Red,
    /// Caution
    Yellow,
    /// Clear roads
    Green,
}

impl ActiveLight {
    /// Status text shown under the signal.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Red => "High Alert",
            Self::Yellow => "Caution",
            Self::Green => "Clear Roads",
        }
    }
}

impl From<SignalChannel> for ActiveLight {
    fn from(channel: SignalChannel) -> Self {
        match channel {
            SignalChannel::Red => Self::Red,
            SignalChannel::Yellow => Self::Yellow,
            SignalChannel::Green => Self::Green,
        }
    }
}

/// A signal reading as presented to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalReading {
    /// Center latitude.
    pub lat: f64,
    /// Center longitude.
    pub lng: f64,
    /// Search radius in kilometres.
    pub radius_km: f64,
    /// Per-channel counts.
    pub state: TrafficSignalState,
    /// Derived light.
    pub light: ActiveLight,
    /// Status text for `light`.
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_lookup() {
        let state = TrafficSignalState::new(3, 2, 1);
        assert_eq!(state.get(SignalChannel::Red), 3);
        assert_eq!(state.get(SignalChannel::Yellow), 2);
        assert_eq!(state.get(SignalChannel::Green), 1);
        assert_eq!(state.total(), 6);
    }

    #[test]
    fn default_is_empty() {
        assert!(TrafficSignalState::default().is_empty());
        assert!(!TrafficSignalState::new(0, 0, 1).is_empty());
    }

    #[test]
    fn labels() {
        assert_eq!(ActiveLight::Red.label(), "High Alert");
        assert_eq!(ActiveLight::Yellow.label(), "Caution");
        assert_eq!(ActiveLight::Green.label(), "Clear Roads");
        assert_eq!(ActiveLight::from(SignalChannel::Yellow), ActiveLight::Yellow);
    }
}

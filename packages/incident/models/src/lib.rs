#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Traffic incident types and boundary validation.
//!
//! This crate defines the closed set of incident types users can report,
//! the severity channel each type feeds in the traffic signal, and the
//! [`Incident`] record shared by every other package. Raw documents coming
//! from the document store are represented by [`IncidentRecord`] and must
//! pass validation before they become an [`Incident`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The kind of traffic condition a user reported.
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
pub enum IncidentType {
    /// The road is clear
    RoadFree,
    /// Ongoing construction work
    Construction,
    /// A traffic accident
    Accident,
    /// The road is blocked
    Roadblock,
}

impl IncidentType {
    /// Returns the signal channel this incident type is counted under.
    #[must_use]
    pub const fn channel(self) -> SignalChannel {
        match self {
            Self::Accident | Self::Roadblock => SignalChannel::Red,
            Self::Construction => SignalChannel::Yellow,
            Self::RoadFree => SignalChannel::Green,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::RoadFree => "Road Free",
            Self::Construction => "Construction",
            Self::Accident => "Accident",
            Self::Roadblock => "Roadblock",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::RoadFree,
            Self::Construction,
            Self::Accident,
            Self::Roadblock,
        ]
    }
}

/// Severity class of an incident in the traffic signal.
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
pub enum SignalChannel {
    /// Accidents and roadblocks
    Red,
    /// Construction
    Yellow,
    /// Clear roads
    Green,
}

/// A WGS84 position with an optional human-readable address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
    /// Street address, if the reporter supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Location {
    /// Creates a location without an address.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            address: None,
        }
    }

    /// Attaches an address to this location.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Whether both coordinates are finite and within WGS84 bounds.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_valid_coordinate(self.lat, self.lng)
    }
}

/// Whether `lat`/`lng` are finite and within `[-90, 90]` / `[-180, 180]`.
#[must_use]
pub fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
}

/// A validated, persisted traffic incident.
///
/// Immutable once persisted. The `timestamp` is assigned by the store and is
/// serialized as epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    /// Store-assigned document ID.
    pub id: String,
    /// What was reported.
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    /// Free-text description, possibly empty.
    #[serde(default)]
    pub details: String,
    /// Where it was reported.
    pub location: Location,
    /// The reporting user. Only used for unique-reporter counting.
    pub user_id: String,
    /// Creation instant assigned at persistence time.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Reference to an externally stored image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Incident {
    /// Severity channel of this incident.
    #[must_use]
    pub const fn channel(&self) -> SignalChannel {
        self.incident_type.channel()
    }
}

/// Sorts incidents most recent first. Stable for equal timestamps.
pub fn sort_most_recent_first(incidents: &mut [Incident]) {
    incidents.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Raw location as found in a store document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLocation {
    /// Latitude, if present.
    pub lat: Option<f64>,
    /// Longitude, if present.
    pub lng: Option<f64>,
    /// Street address, if present.
    pub address: Option<String>,
}

/// An unvalidated incident document as delivered by the document store.
///
/// Every field is optional; [`IncidentRecord::validate`] decides whether the
/// document is usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    /// Document ID.
    pub id: Option<String>,
    /// Incident type as a raw string.
    #[serde(rename = "type")]
    pub incident_type: Option<String>,
    /// Description.
    pub details: Option<String>,
    /// Location.
    pub location: Option<RawLocation>,
    /// Reporting user.
    pub user_id: Option<String>,
    /// Epoch milliseconds. Absent while a server timestamp is pending.
    pub timestamp: Option<i64>,
    /// Attached image URL.
    pub image_url: Option<String>,
}

/// Reasons a store document cannot become an [`Incident`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    /// Document has no ID.
    #[error("record has no id")]
    MissingId,

    /// Document has no `type` field.
    #[error("record has no incident type")]
    MissingType,

    /// `type` is outside the closed set of incident types.
    #[error("unknown incident type {0:?}")]
    UnknownType(String),

    /// Latitude or longitude is missing.
    #[error("record has no location")]
    MissingLocation,

    /// Coordinates are non-finite or out of range.
    #[error("malformed location ({lat}, {lng})")]
    MalformedLocation {
        /// Offending latitude.
        lat: f64,
        /// Offending longitude.
        lng: f64,
    },

    /// Document has no reporting user.
    #[error("record has no user id")]
    MissingUser,

    /// Timestamp does not fit a calendar date.
    #[error("invalid timestamp {0}")]
    InvalidTimestamp(i64),
}

impl IncidentRecord {
    /// Validates this document into an [`Incident`].
    ///
    /// A missing timestamp (pending server write) falls back to `received_at`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] describing the first problem found.
    pub fn validate(self, received_at: DateTime<Utc>) -> Result<Incident, RecordError> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or(RecordError::MissingId)?;

        let raw_type = self.incident_type.ok_or(RecordError::MissingType)?;
        let incident_type = raw_type
            .parse::<IncidentType>()
            .map_err(|_| RecordError::UnknownType(raw_type.clone()))?;

        let raw_location = self.location.ok_or(RecordError::MissingLocation)?;
        let (Some(lat), Some(lng)) = (raw_location.lat, raw_location.lng) else {
            return Err(RecordError::MissingLocation);
        };
        if !is_valid_coordinate(lat, lng) {
            return Err(RecordError::MalformedLocation { lat, lng });
        }

        let user_id = self
            .user_id
            .filter(|user| !user.is_empty())
            .ok_or(RecordError::MissingUser)?;

        let timestamp = match self.timestamp {
            Some(millis) => DateTime::<Utc>::from_timestamp_millis(millis)
                .ok_or(RecordError::InvalidTimestamp(millis))?,
            None => received_at,
        };

        Ok(Incident {
            id,
            incident_type,
            details: self.details.unwrap_or_default(),
            location: Location {
                lat,
                lng,
                address: raw_location.address,
            },
            user_id,
            timestamp,
            image_url: self.image_url.filter(|url| !url.is_empty()),
        })
    }
}

impl TryFrom<IncidentRecord> for Incident {
    type Error = RecordError;

    fn try_from(record: IncidentRecord) -> Result<Self, Self::Error> {
        record.validate(Utc::now())
    }
}

/// Payload written to the store when a user reports an incident.
///
/// The store assigns `id` and `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIncident {
    /// What is being reported.
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    /// Free-text description, may be empty.
    #[serde(default)]
    pub details: String,
    /// Where it is being reported.
    pub location: Location,
    /// The reporting user.
    pub user_id: String,
    /// Image reference, only present when an image was attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Reasons a [`NewIncident`] is refused before it reaches the store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReportError {
    /// No signed-in user.
    #[error("a user id is required to report an incident")]
    MissingUser,

    /// Location was never determined (a zero coordinate).
    #[error("location is required to report an incident")]
    MissingLocation,

    /// Coordinates are non-finite or out of range.
    #[error("malformed location ({lat}, {lng})")]
    MalformedLocation {
        /// Offending latitude.
        lat: f64,
        /// Offending longitude.
        lng: f64,
    },
}

impl NewIncident {
    /// Creates a report without details or image.
    #[must_use]
    pub fn new(
        incident_type: IncidentType,
        location: Location,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            incident_type,
            details: String::new(),
            location,
            user_id: user_id.into(),
            image_url: None,
        }
    }

    /// Checks the payload before it is written.
    ///
    /// A zero latitude or longitude means the reporter's position was never
    /// resolved and is refused.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] if the payload must not be stored.
    #[allow(clippy::float_cmp)]
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.user_id.trim().is_empty() {
            return Err(ReportError::MissingUser);
        }
        let Location { lat, lng, .. } = self.location;
        if !self.location.is_valid() {
            return Err(ReportError::MalformedLocation { lat, lng });
        }
        if lat == 0.0 || lng == 0.0 {
            return Err(ReportError::MissingLocation);
        }
        Ok(())
    }

    /// Builds the persisted [`Incident`] from this payload.
    #[must_use]
    pub fn into_incident(self, id: String, timestamp: DateTime<Utc>) -> Incident {
        Incident {
            id,
            incident_type: self.incident_type,
            details: self.details,
            location: self.location,
            user_id: self.user_id,
            timestamp,
            image_url: self.image_url.filter(|url| !url.is_empty()),
        }
    }
}

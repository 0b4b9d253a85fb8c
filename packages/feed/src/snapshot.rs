//! Decoding store documents into validated incident snapshots.
//!
//! One bad document never voids a snapshot: documents that fail to
//! deserialize or validate are skipped, logged, and reported back in
//! [`Snapshot::rejected`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use trafficpulse_incident_models::{Incident, IncidentRecord, sort_most_recent_first};

use crate::FeedError;

/// A document that did not make it into the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRecord {
    /// Position of the document in the source list.
    pub index: usize,
    /// Document ID, when one could be read.
    pub id: Option<String>,
    /// Why it was rejected.
    pub reason: String,
}

/// Validated incidents, most recent first, plus the documents left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Usable incidents, most recent first.
    pub incidents: Vec<Incident>,
    /// Documents that were skipped.
    pub rejected: Vec<RejectedRecord>,
}

/// Decodes a JSON array of store documents.
///
/// # Errors
///
/// Returns [`FeedError::Json`] if `json` is not valid JSON and
/// [`FeedError::InvalidSnapshot`] if it is not an array.
pub fn decode_snapshot(json: &str) -> Result<Snapshot, FeedError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    decode_documents(value, Utc::now())
}

/// Validates already-parsed store documents.
///
/// Documents without a timestamp (pending server writes) are stamped with
/// `received_at`.
///
/// # Errors
///
/// Returns [`FeedError::InvalidSnapshot`] if `value` is not an array.
pub fn decode_documents(
    value: serde_json::Value,
    received_at: DateTime<Utc>,
) -> Result<Snapshot, FeedError> {
    let serde_json::Value::Array(documents) = value else {
        return Err(FeedError::InvalidSnapshot {
            message: "expected a JSON array of incident documents".to_string(),
        });
    };

    let mut snapshot = Snapshot::default();

    for (index, document) in documents.into_iter().enumerate() {
        let id = document
            .get("id")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string);

        let result = serde_json::from_value::<IncidentRecord>(document)
            .map_err(|e| e.to_string())
            .and_then(|record| record.validate(received_at).map_err(|e| e.to_string()));

        match result {
            Ok(incident) => snapshot.incidents.push(incident),
            Err(reason) => {
                log::warn!("Skipping incident document {index} ({id:?}): {reason}");
                snapshot.rejected.push(RejectedRecord { index, id, reason });
            }
        }
    }

    sort_most_recent_first(&mut snapshot.incidents);

    log::info!(
        "Decoded snapshot: {} incidents, {} rejected",
        snapshot.incidents.len(),
        snapshot.rejected.len()
    );

    Ok(snapshot)
}

/// Encodes incidents as a JSON array of store documents.
///
/// # Errors
///
/// Returns [`FeedError::Json`] if serialization fails.
pub fn encode_snapshot(incidents: &[Incident]) -> Result<String, FeedError> {
    Ok(serde_json::to_string_pretty(incidents)?)
}

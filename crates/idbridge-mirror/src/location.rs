//! Location-document triggers
//!
//! Two independent concerns over the per-user location document at
//! `locations/{uid}`:
//!
//! - [`project_location`] mirrors a validated subset of fields into a
//!   public projection at `location_index/{encoded uid}`, and removes the
//!   projection when the source document is deleted. Malformed sources are
//!   skipped, never surfaced as projection errors.
//! - [`stamp_retention`] adds a retention timestamp to the private document
//!   the first time it is updated (not on creation). The stamp is
//!   write-time plus a fixed 30-day window and is never overwritten once
//!   present.
//!
//! Both are pure functions from `(before, after)` document states to write
//! intents; see [`crate::intent::apply`] for execution.

use chrono::{DateTime, Duration, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::intent::WriteIntent;

/// Collection holding the private per-user location documents
pub const PRIVATE_COLLECTION: &str = "locations";
/// Collection holding the public projections
pub const PUBLIC_COLLECTION: &str = "location_index";
/// Field carrying the retention timestamp (Unix seconds)
pub const EXPIRES_AT_FIELD: &str = "expires_at";
/// Retention window applied to private location documents
pub const RETENTION_DAYS: i64 = 30;

/// Characters allowed verbatim in a projection path segment
///
/// Everything outside `[A-Za-z0-9._-]` is percent-encoded, so uids like
/// `federated:user-42` cannot smuggle path separators into the store.
const PATH_SEGMENT_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.');

/// Path of the private location document for a user
#[must_use]
pub fn private_path(uid: &str) -> String {
    format!("{PRIVATE_COLLECTION}/{}", encode_uid(uid))
}

/// Path of the public projection for a user
#[must_use]
pub fn public_path(uid: &str) -> String {
    format!("{PUBLIC_COLLECTION}/{}", encode_uid(uid))
}

/// Path-safe encoding of a user id
#[must_use]
pub fn encode_uid(uid: &str) -> String {
    utf8_percent_encode(uid, PATH_SEGMENT_ENCODE).to_string()
}

/// The projected subset of a valid location document
fn projected_fields(doc: &Value) -> Option<Value> {
    let lat = doc.get("lat")?.as_f64()?;
    let lng = doc.get("lng")?.as_f64()?;
    let geohash = doc.get("geohash")?.as_str()?;
    let timestamp = doc.get("timestamp")?;
    if !(timestamp.is_number() || timestamp.is_string()) {
        return None;
    }
    Some(json!({
        "lat": lat,
        "lng": lng,
        "geohash": geohash,
        "timestamp": timestamp,
    }))
}

/// Mirror a location write (or delete) into the public projection
///
/// `after` is `None` when the source document was deleted. A source whose
/// fields have the wrong shape produces no intents - the projection is
/// simply left alone.
#[must_use]
pub fn project_location(uid: &str, after: Option<&Value>) -> Vec<WriteIntent> {
    match after {
        None => vec![WriteIntent::Delete {
            path: public_path(uid),
        }],
        Some(doc) => match projected_fields(doc) {
            Some(projection) => vec![WriteIntent::Put {
                path: public_path(uid),
                doc: projection,
            }],
            None => {
                warn!(uid, "location document is malformed, skipping projection");
                vec![]
            }
        },
    }
}

/// Stamp a retention timestamp onto an updated location document
///
/// Produces at most one `Merge` intent:
///
/// - creation (`before` is `None`) - no stamp yet
/// - deletion (`after` is `None`) - nothing to stamp
/// - `after` already carries [`EXPIRES_AT_FIELD`] - left untouched, which
///   makes repeated updates idempotent
/// - otherwise - `expires_at = write_time + 30 days`
#[must_use]
pub fn stamp_retention(
    uid: &str,
    before: Option<&Value>,
    after: Option<&Value>,
    write_time: DateTime<Utc>,
) -> Vec<WriteIntent> {
    let (Some(_), Some(after)) = (before, after) else {
        return vec![];
    };
    if after.get(EXPIRES_AT_FIELD).is_some() {
        return vec![];
    }

    let expires_at = write_time + Duration::days(RETENTION_DAYS);
    let mut fields = Map::new();
    fields.insert(EXPIRES_AT_FIELD.to_string(), json!(expires_at.timestamp()));
    vec![WriteIntent::Merge {
        path: private_path(uid),
        fields,
    }]
}

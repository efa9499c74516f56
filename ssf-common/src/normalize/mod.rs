//! Record normalizer
//!
//! Maps raw service payloads (spots, favorites, reviews) with inconsistent
//! field names onto the canonical records in [`crate::model`].
//!
//! # Guarantees
//! - Pure: no I/O, no logging side effects beyond `tracing` diagnostics
//! - Total: every field falls back to a default instead of failing
//! - Only a missing identifier rejects a record ([`NormalizeError::MissingId`])

pub mod aliases;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::hours::SpotHours;
use crate::model::{OpenState, RecordId, Review, Spot, SpotId};
use aliases::{ReviewField, SpotField, REVIEW_ALIASES, SPOT_ALIASES};

/// Envelope key for `GET /spots`
pub const SPOTS_ENVELOPE: &str = "spots";
/// Envelope key for `GET /favorites`
pub const FAVORITES_ENVELOPE: &str = "favorites";
/// Envelope key for `GET /spots/{id}/reviews`
pub const REVIEWS_ENVELOPE: &str = "reviews";

/// Rejection of a single raw record
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizeError {
    /// No identifier under any known alias; carries the input unmodified
    #[error("record has no identifier: {0}")]
    MissingId(Value),
}

/// Outcome of normalizing a collection payload
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedList<T> {
    pub items: Vec<T>,
    /// Elements dropped for lacking an identifier
    pub skipped: usize,
    /// False when the payload was neither an array nor a known envelope
    pub shape_ok: bool,
}

impl<T> NormalizedList<T> {
    fn malformed() -> Self {
        Self {
            items: Vec::new(),
            skipped: 0,
            shape_ok: false,
        }
    }
}

// ========================================
// Coercions
// ========================================

/// Non-blank string
fn coerce_text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Finite number from a JSON number or numeric string
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Rating clamped to [0, 5]
pub fn coerce_rating(value: &Value) -> Option<f64> {
    coerce_f64(value).map(|r| r.clamp(0.0, 5.0))
}

/// Open flag from booleans, 1/0 and their string spellings
pub fn coerce_open_state(value: &Value) -> Option<OpenState> {
    match value {
        Value::Bool(b) => Some(OpenState::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(OpenState::Open),
            Some(0) => Some(OpenState::Closed),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "open" | "yes" => Some(OpenState::Open),
            "false" | "0" | "closed" | "no" => Some(OpenState::Closed),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_flag(value: &Value) -> Option<bool> {
    coerce_open_state(value).map(OpenState::is_open)
}

/// First usable image from an `images`/`photos` array.
///
/// Elements may be plain URLs or objects with a `url` key.
fn coerce_gallery(value: &Value) -> Option<String> {
    let first = value.as_array()?.first()?;
    match first {
        Value::String(_) => coerce_text(first),
        Value::Object(obj) => obj.get("url").and_then(coerce_text),
        _ => None,
    }
}

fn coerce_position(value: &Value) -> Option<(Option<f64>, Option<f64>)> {
    let pair = value.as_array()?;
    Some((
        pair.first().and_then(coerce_f64),
        pair.get(1).and_then(coerce_f64),
    ))
}

/// Whole stars capped at 5; anything below one star counts as no rating
fn coerce_review_rating(value: &Value) -> Option<u8> {
    coerce_f64(value)
        .map(f64::round)
        .filter(|r| *r >= 1.0)
        .map(|r| r.min(5.0) as u8)
}

// ========================================
// Spots
// ========================================

/// Normalize one raw spot object
pub fn normalize_spot(raw: &Value) -> Result<Spot, NormalizeError> {
    let Some(obj) = raw.as_object() else {
        return Err(NormalizeError::MissingId(raw.clone()));
    };
    let Some(id) = SPOT_ALIASES.resolve(obj, SpotField::Id, RecordId::from_json) else {
        return Err(NormalizeError::MissingId(raw.clone()));
    };

    let mut spot = Spot::new(
        id,
        SPOT_ALIASES
            .resolve(obj, SpotField::Name, coerce_text)
            .unwrap_or_default(),
    );

    if let Some(spot_type) = SPOT_ALIASES.resolve(obj, SpotField::Type, coerce_text) {
        spot.spot_type = spot_type;
    }
    spot.address = SPOT_ALIASES.resolve(obj, SpotField::Address, coerce_text);
    spot.note = SPOT_ALIASES
        .resolve(obj, SpotField::Note, coerce_text)
        .unwrap_or_default();
    spot.description = SPOT_ALIASES
        .resolve(obj, SpotField::Description, coerce_text)
        .unwrap_or_default();
    spot.rating = SPOT_ALIASES
        .resolve(obj, SpotField::Rating, coerce_rating)
        .unwrap_or(0.0);
    spot.hours = normalize_hours(obj);
    spot.is_open = SPOT_ALIASES
        .resolve(obj, SpotField::IsOpen, coerce_open_state)
        .unwrap_or_default();
    spot.image_url = SPOT_ALIASES
        .resolve(obj, SpotField::Image, coerce_text)
        .or_else(|| SPOT_ALIASES.resolve(obj, SpotField::Gallery, coerce_gallery));

    let position = SPOT_ALIASES
        .resolve(obj, SpotField::Position, coerce_position)
        .unwrap_or((None, None));
    spot.latitude = SPOT_ALIASES
        .resolve(obj, SpotField::Latitude, coerce_f64)
        .or(position.0);
    spot.longitude = SPOT_ALIASES
        .resolve(obj, SpotField::Longitude, coerce_f64)
        .or(position.1);

    spot.has_wifi = SPOT_ALIASES
        .resolve(obj, SpotField::HasWifi, coerce_flag)
        .unwrap_or(false);
    spot.has_outlets = SPOT_ALIASES
        .resolve(obj, SpotField::HasOutlets, coerce_flag)
        .unwrap_or(false);

    Ok(spot)
}

fn normalize_hours(obj: &Map<String, Value>) -> SpotHours {
    let text = SPOT_ALIASES
        .resolve(obj, SpotField::Hours, coerce_text)
        .map(|raw| SpotHours::from_text(&raw))
        .filter(SpotHours::is_specified);
    if let Some(hours) = text {
        return hours;
    }
    let open = SPOT_ALIASES.resolve(obj, SpotField::OpenTime, coerce_text);
    let close = SPOT_ALIASES.resolve(obj, SpotField::CloseTime, coerce_text);
    match (open, close) {
        (Some(open), Some(close)) => {
            SpotHours::from_pair(&open, &close).unwrap_or(SpotHours::Unspecified)
        }
        _ => SpotHours::Unspecified,
    }
}

/// Items of a collection payload: a bare array or `{<envelope>: [...]}`
pub fn collection_items<'a>(payload: &'a Value, envelope: &str) -> Option<&'a Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items),
        Value::Object(obj) => obj.get(envelope).and_then(Value::as_array),
        _ => None,
    }
}

fn normalize_collection<T>(
    payload: &Value,
    envelope: &str,
    normalize: impl Fn(&Value) -> Result<T, NormalizeError>,
) -> NormalizedList<T> {
    let Some(raw_items) = collection_items(payload, envelope) else {
        warn!(envelope, "Unexpected payload shape, treating as empty list");
        return NormalizedList::malformed();
    };

    let mut items = Vec::with_capacity(raw_items.len());
    let mut skipped = 0;
    for raw in raw_items {
        match normalize(raw) {
            Ok(item) => items.push(item),
            Err(e) => {
                skipped += 1;
                warn!(envelope, error = %e, "Skipping record without identifier");
            }
        }
    }
    debug!(envelope, count = items.len(), skipped, "Normalized collection");

    NormalizedList {
        items,
        skipped,
        shape_ok: true,
    }
}

/// Normalize a `GET /spots` payload
pub fn normalize_spots(payload: &Value) -> NormalizedList<Spot> {
    normalize_collection(payload, SPOTS_ENVELOPE, normalize_spot)
}

/// Normalize a `GET /favorites` payload (favorite entries are spot objects)
pub fn normalize_favorites(payload: &Value) -> NormalizedList<Spot> {
    normalize_collection(payload, FAVORITES_ENVELOPE, normalize_spot)
}

// ========================================
// Reviews
// ========================================

/// Normalize one raw review.
///
/// `spot_id` fills in the foreign key when the payload omits it (the list
/// endpoint is already scoped to a spot).
pub fn normalize_review(raw: &Value, spot_id: &SpotId) -> Result<Review, NormalizeError> {
    let Some(obj) = raw.as_object() else {
        return Err(NormalizeError::MissingId(raw.clone()));
    };
    let Some(id) = REVIEW_ALIASES.resolve(obj, ReviewField::Id, RecordId::from_json) else {
        return Err(NormalizeError::MissingId(raw.clone()));
    };

    Ok(Review {
        id,
        spot_id: REVIEW_ALIASES
            .resolve(obj, ReviewField::SpotId, RecordId::from_json)
            .unwrap_or_else(|| spot_id.clone()),
        rating: REVIEW_ALIASES
            .resolve(obj, ReviewField::Rating, coerce_review_rating)
            .unwrap_or(0),
        comment: REVIEW_ALIASES
            .resolve(obj, ReviewField::Comment, |v| v.as_str().map(str::to_string))
            .unwrap_or_default(),
        author: REVIEW_ALIASES.resolve(obj, ReviewField::Author, coerce_text),
        created_at: REVIEW_ALIASES.resolve(obj, ReviewField::CreatedAt, |v| {
            v.as_str().and_then(crate::time::parse_timestamp)
        }),
    })
}

/// Normalize a `GET /spots/{id}/reviews` payload
pub fn normalize_reviews(payload: &Value, spot_id: &SpotId) -> NormalizedList<Review> {
    normalize_collection(payload, REVIEWS_ENVELOPE, |raw| normalize_review(raw, spot_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use serde_json::json;

    #[test]
    fn test_rating_inputs_always_finite_in_range() {
        let cases = [
            json!({"id": 1}),
            json!({"id": 1, "rating": "4.5"}),
            json!({"id": 1, "rating": 4.5}),
            json!({"id": 1, "rating": null}),
            json!({"id": 1, "rating": "abc"}),
        ];
        let expected = [0.0, 4.5, 4.5, 0.0, 0.0];
        for (raw, want) in cases.iter().zip(expected) {
            let spot = normalize_spot(raw).unwrap();
            assert!(spot.rating.is_finite());
            assert!((0.0..=5.0).contains(&spot.rating));
            assert_eq!(spot.rating, want, "input {}", raw);
        }
    }

    #[test]
    fn test_rating_clamped_and_alias() {
        let spot = normalize_spot(&json!({"id": 1, "rating": 11})).unwrap();
        assert_eq!(spot.rating, 5.0);
        let spot = normalize_spot(&json!({"id": 1, "averageRating": "3.25"})).unwrap();
        assert_eq!(spot.rating, 3.25);
        let spot = normalize_spot(&json!({"id": 1, "rating": "NaN"})).unwrap();
        assert_eq!(spot.rating, 0.0);
    }

    #[test]
    fn test_backend_shape_with_position_array() {
        let raw = json!({
            "id": 12,
            "name": "Leavey Library",
            "type": null,
            "hours": "Sunday: 8am-8pm",
            "isOpen": 1,
            "rating": 4.2,
            "note": "Quiet floors upstairs",
            "position": [34.0217, -118.2827],
            "image": "https://img.example/leavey.jpg"
        });
        let spot = normalize_spot(&raw).unwrap();
        assert_eq!(spot.id, RecordId::Int(12));
        assert_eq!(spot.spot_type, Spot::DEFAULT_TYPE);
        assert_eq!(spot.hours_text(), "8am-8pm");
        assert_eq!(spot.is_open, OpenState::Open);
        assert_eq!(spot.latitude, Some(34.0217));
        assert_eq!(spot.longitude, Some(-118.2827));
        assert_eq!(spot.image_url.as_deref(), Some("https://img.example/leavey.jpg"));
        assert_eq!(spot.note, "Quiet floors upstairs");
        // description falls back to note
        assert_eq!(spot.description, "Quiet floors upstairs");
    }

    #[test]
    fn test_open_state_tri_state() {
        let open = normalize_spot(&json!({"id": 1, "isOpen": true})).unwrap();
        let closed = normalize_spot(&json!({"id": 1, "isOpen": 0})).unwrap();
        let now = normalize_spot(&json!({"id": 1, "isOpenNow": "true"})).unwrap();
        let unknown = normalize_spot(&json!({"id": 1})).unwrap();
        let odd = normalize_spot(&json!({"id": 1, "isOpen": 7})).unwrap();
        assert_eq!(open.is_open, OpenState::Open);
        assert_eq!(closed.is_open, OpenState::Closed);
        assert_eq!(now.is_open, OpenState::Open);
        assert_eq!(unknown.is_open, OpenState::Unspecified);
        assert_eq!(odd.is_open, OpenState::Unspecified);
    }

    #[test]
    fn test_hours_from_aliases_and_pair() {
        let spot = normalize_spot(&json!({"id": 1, "openHours": "24/7"})).unwrap();
        assert_eq!(spot.hours_text(), "24/7");

        let spot =
            normalize_spot(&json!({"id": 1, "openTime": "09:00", "closeTime": "21:30"})).unwrap();
        assert_eq!(spot.hours_text(), "9:00 AM - 9:30 PM");

        let spot = normalize_spot(&json!({"id": 1, "openTime": "09:00"})).unwrap();
        assert_eq!(spot.hours, SpotHours::Unspecified);
    }

    #[test]
    fn test_image_precedence() {
        let spot = normalize_spot(&json!({
            "id": 1, "imageUrl": "b.jpg", "images": ["c.jpg"]
        }))
        .unwrap();
        assert_eq!(spot.image_url.as_deref(), Some("b.jpg"));

        let spot = normalize_spot(&json!({"id": 1, "images": ["c.jpg", "d.jpg"]})).unwrap();
        assert_eq!(spot.image_url.as_deref(), Some("c.jpg"));

        let spot = normalize_spot(&json!({"id": 1, "photos": [{"url": "e.jpg"}]})).unwrap();
        assert_eq!(spot.image_url.as_deref(), Some("e.jpg"));

        let spot = normalize_spot(&json!({"id": 1, "images": []})).unwrap();
        assert_eq!(spot.image_url, None);
    }

    #[test]
    fn test_explicit_coordinates_beat_position() {
        let spot = normalize_spot(&json!({
            "id": 1, "lat": "34.5", "lng": -118.0, "position": [1.0, 2.0]
        }))
        .unwrap();
        assert_eq!(spot.latitude, Some(34.5));
        assert_eq!(spot.longitude, Some(-118.0));
    }

    #[test]
    fn test_missing_coordinates_stay_listable() {
        let spot = normalize_spot(&json!({"id": 2, "name": "NoCoord", "position": null})).unwrap();
        assert_eq!(spot.latitude, None);
        assert!(!spot.is_mappable());
    }

    #[test]
    fn test_missing_id_returns_input() {
        let raw = json!({"name": "Orphan"});
        assert_eq!(normalize_spot(&raw), Err(NormalizeError::MissingId(raw.clone())));
        let raw = json!("not an object");
        assert!(normalize_spot(&raw).is_err());
    }

    #[test]
    fn test_underscore_id_alias() {
        let spot = normalize_spot(&json!({"_id": "abc", "name": "Doheny"})).unwrap();
        assert_eq!(spot.id, RecordId::Text("abc".into()));
    }

    #[test]
    fn test_amenities() {
        let spot = normalize_spot(&json!({"id": 1, "hasWifi": true, "hasOutlets": 0})).unwrap();
        assert!(spot.has_wifi);
        assert!(!spot.has_outlets);
    }

    #[test]
    fn test_collection_shapes() {
        let bare = normalize_spots(&json!([{"id": 1}, {"name": "no id"}, {"id": 2}]));
        assert!(bare.shape_ok);
        assert_eq!(bare.items.len(), 2);
        assert_eq!(bare.skipped, 1);

        let wrapped = normalize_favorites(&json!({"favorites": [{"id": 3}]}));
        assert!(wrapped.shape_ok);
        assert_eq!(wrapped.items[0].id, RecordId::Int(3));

        let wrong = normalize_spots(&json!({"data": []}));
        assert!(!wrong.shape_ok);
        assert!(wrong.items.is_empty());

        let null = normalize_spots(&Value::Null);
        assert!(!null.shape_ok);
    }

    #[test]
    fn test_review_backend_shape() {
        let raw = json!({
            "id": 31,
            "rating": 4,
            "comment": "Great outlets",
            "createdAt": "2025-02-01T18:30:00Z",
            "user": {"id": 5, "username": "trojan"}
        });
        let review = normalize_review(&raw, &RecordId::Int(7)).unwrap();
        assert_eq!(review.id, RecordId::Int(31));
        assert_eq!(review.spot_id, RecordId::Int(7));
        assert_eq!(review.rating, 4);
        assert_eq!(review.comment, "Great outlets");
        assert_eq!(review.author.as_deref(), Some("trojan"));
        assert_eq!(review.created_at.unwrap().hour(), 18);
    }

    #[test]
    fn test_review_rating_coercion() {
        let spot = RecordId::Int(1);
        let r = normalize_review(&json!({"id": 1, "rating": "5"}), &spot).unwrap();
        assert_eq!(r.rating, 5);
        let r = normalize_review(&json!({"id": 1, "rating": 9}), &spot).unwrap();
        assert_eq!(r.rating, 5);
        let r = normalize_review(&json!({"id": 1}), &spot).unwrap();
        assert_eq!(r.rating, 0);
        // Zero and negative ratings are not turned into one star
        let r = normalize_review(&json!({"id": 1, "rating": 0}), &spot).unwrap();
        assert_eq!(r.rating, 0);
        let r = normalize_review(&json!({"id": 1, "rating": -3}), &spot).unwrap();
        assert_eq!(r.rating, 0);
        let r = normalize_review(&json!({"id": 1, "rating": "0.4"}), &spot).unwrap();
        assert_eq!(r.rating, 0);
    }

    #[test]
    fn test_review_explicit_spot_id_wins() {
        let r = normalize_review(&json!({"id": 1, "spotId": "9"}), &RecordId::Int(7)).unwrap();
        assert_eq!(r.spot_id, RecordId::Int(9));
    }

    #[test]
    fn test_reviews_envelope() {
        let list = normalize_reviews(
            &json!({"reviews": [{"id": 1, "rating": 3}, {"rating": 2}]}),
            &RecordId::Int(7),
        );
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.skipped, 1);
    }
}

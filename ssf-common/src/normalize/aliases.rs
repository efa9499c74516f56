//! Declarative alias tables
//!
//! Each logical field maps to an ordered list of keys the service has been
//! seen to use. Keys may be dotted paths into nested objects
//! (`user.username`). Resolution walks the keys in order and returns the first
//! value the caller's coercion accepts.

use serde_json::{Map, Value};

/// Logical spot fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpotField {
    Id,
    Name,
    Type,
    Address,
    Note,
    Description,
    Rating,
    Hours,
    OpenTime,
    CloseTime,
    IsOpen,
    Latitude,
    Longitude,
    Position,
    Image,
    Gallery,
    HasWifi,
    HasOutlets,
}

/// Logical review fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewField {
    Id,
    SpotId,
    Rating,
    Comment,
    Author,
    CreatedAt,
}

/// Field → ordered key list
#[derive(Debug)]
pub struct AliasTable<F: 'static> {
    entries: &'static [(F, &'static [&'static str])],
}

impl<F: Copy + PartialEq + 'static> AliasTable<F> {
    pub const fn new(entries: &'static [(F, &'static [&'static str])]) -> Self {
        Self { entries }
    }

    /// Keys for a field, in priority order
    pub fn keys(&self, field: F) -> &'static [&'static str] {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, keys)| *keys)
            .unwrap_or(&[])
    }

    /// First alias whose value `coerce` accepts
    pub fn resolve<T>(
        &self,
        object: &Map<String, Value>,
        field: F,
        coerce: impl Fn(&Value) -> Option<T>,
    ) -> Option<T> {
        self.keys(field)
            .iter()
            .filter_map(|key| lookup_path(object, key))
            .find_map(coerce)
    }
}

/// Follow a dotted path; null leaves count as absent
fn lookup_path<'a>(object: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = object.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

pub static SPOT_ALIASES: AliasTable<SpotField> = AliasTable::new(&[
    (SpotField::Id, &["id", "_id", "spotId", "spot_id"]),
    (SpotField::Name, &["name", "title"]),
    (SpotField::Type, &["type", "category"]),
    (SpotField::Address, &["address", "location"]),
    (SpotField::Note, &["note", "description"]),
    (SpotField::Description, &["description", "note"]),
    (SpotField::Rating, &["rating", "averageRating", "avgRating"]),
    (SpotField::Hours, &["hours", "openHours", "hoursText"]),
    (SpotField::OpenTime, &["openTime", "open_time"]),
    (SpotField::CloseTime, &["closeTime", "close_time"]),
    (SpotField::IsOpen, &["isOpen", "isOpenNow", "open"]),
    (SpotField::Latitude, &["latitude", "lat"]),
    (SpotField::Longitude, &["longitude", "lon", "lng"]),
    (SpotField::Position, &["position", "coordinates"]),
    (SpotField::Image, &["image", "imageUrl", "image_url"]),
    (SpotField::Gallery, &["images", "photos"]),
    (SpotField::HasWifi, &["hasWifi", "wifi"]),
    (SpotField::HasOutlets, &["hasOutlets", "outlets"]),
]);

pub static REVIEW_ALIASES: AliasTable<ReviewField> = AliasTable::new(&[
    (ReviewField::Id, &["id", "reviewId", "review_id", "_id"]),
    (ReviewField::SpotId, &["spotId", "spot_id", "studySpot.id", "spot.id"]),
    (ReviewField::Rating, &["rating", "stars"]),
    (ReviewField::Comment, &["comment", "text", "body"]),
    (
        ReviewField::Author,
        &["author", "username", "userName", "user.username", "user.name"],
    ),
    (ReviewField::CreatedAt, &["createdAt", "created_at", "timestamp"]),
]);

//! Canonical records held by the client engine
//!
//! These shapes are decoupled from any one backend field-naming convention;
//! see [`crate::normalize`] for how raw payloads are mapped onto them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::hours::SpotHours;

// ========================================
// Identifiers
// ========================================

/// Stable identifier assigned by the remote service.
///
/// Numeric strings canonicalize to [`RecordId::Int`] so that an id taken from
/// a route (`"7"`) compares equal to the JSON integer `7`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

/// Spot identifier
pub type SpotId = RecordId;

/// Review identifier
pub type ReviewId = RecordId;

impl RecordId {
    /// Parse an identifier typed by a user or taken from a path segment.
    ///
    /// Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(match raw.parse::<i64>() {
            Ok(n) => RecordId::Int(n),
            Err(_) => RecordId::Text(raw.to_string()),
        })
    }

    /// Interpret a JSON value as an identifier.
    ///
    /// Accepts integers, integral floats and non-blank strings.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(RecordId::Int(i))
                } else {
                    n.as_f64()
                        .filter(|f| f.is_finite() && f.fract() == 0.0)
                        .map(|f| RecordId::Int(f as i64))
                }
            }
            Value::String(s) => RecordId::parse(s),
            _ => None,
        }
    }

    /// JSON form used in request bodies
    pub fn to_json(&self) -> Value {
        match self {
            RecordId::Int(n) => Value::from(*n),
            RecordId::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        RecordId::from_json(&value)
            .ok_or_else(|| de::Error::custom(format!("invalid record id: {}", value)))
    }
}

// ========================================
// Geography
// ========================================

/// Default map zoom used when flying to a coordinate
pub const DEFAULT_FOCUS_ZOOM: u8 = 17;

/// Latitude/longitude pair with both components finite
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Returns `None` unless both components are finite
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if latitude.is_finite() && longitude.is_finite() {
            Some(Self { latitude, longitude })
        } else {
            None
        }
    }
}

// ========================================
// Spot
// ========================================

/// Tri-state open status.
///
/// `Unspecified` is distinct from `Closed`: the service simply did not say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenState {
    Open,
    Closed,
    #[default]
    Unspecified,
}

impl OpenState {
    /// Only an explicit `Open` counts as open
    pub fn is_open(self) -> bool {
        matches!(self, OpenState::Open)
    }

    /// Badge text for list rows and popups
    pub fn label(self) -> &'static str {
        match self {
            OpenState::Open => "Open",
            OpenState::Closed => "Closed",
            OpenState::Unspecified => "Hours unknown",
        }
    }
}

impl From<bool> for OpenState {
    fn from(open: bool) -> Self {
        if open {
            OpenState::Open
        } else {
            OpenState::Closed
        }
    }
}

/// Rating rendered as five stars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StarBreakdown {
    pub full: u8,
    pub half: bool,
    pub empty: u8,
}

impl StarBreakdown {
    pub const MAX: u8 = 5;

    /// A half star is shown when the fractional part is at least 0.5
    pub fn from_rating(rating: f64) -> Self {
        let value = if rating.is_finite() {
            rating.clamp(0.0, f64::from(Self::MAX))
        } else {
            0.0
        };
        let full = value.floor() as u8;
        let half = value - f64::from(full) >= 0.5;
        let empty = Self::MAX - full - u8::from(half);
        Self { full, half, empty }
    }
}

/// Canonical study spot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Spot {
    pub id: SpotId,
    pub name: String,
    #[serde(rename = "type")]
    pub spot_type: String,
    pub address: Option<String>,
    pub image_url: Option<String>,
    pub note: String,
    pub description: String,
    /// Always finite, within [0, 5]
    pub rating: f64,
    pub hours: SpotHours,
    pub is_open: OpenState,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub has_wifi: bool,
    pub has_outlets: bool,
}

impl Spot {
    pub const DEFAULT_TYPE: &'static str = "Study Spot";

    /// Spot with every optional field at its default
    pub fn new(id: SpotId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            spot_type: Self::DEFAULT_TYPE.to_string(),
            address: None,
            image_url: None,
            note: String::new(),
            description: String::new(),
            rating: 0.0,
            hours: SpotHours::Unspecified,
            is_open: OpenState::Unspecified,
            latitude: None,
            longitude: None,
            has_wifi: false,
            has_outlets: false,
        }
    }

    /// Stand-in shown when the detail load fails
    pub fn placeholder(id: SpotId) -> Self {
        let mut spot = Self::new(id.clone(), format!("Study spot {}", id));
        spot.address = Some("Location not available".to_string());
        spot.description = "Description not available.".to_string();
        spot
    }

    /// Coordinate for map placement, if both components are present and finite
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Coordinate::new(lat, lon),
            _ => None,
        }
    }

    /// Whether the spot may appear on the map
    pub fn is_mappable(&self) -> bool {
        self.coordinate().is_some()
    }

    /// Full hours display string
    pub fn hours_text(&self) -> String {
        self.hours.display()
    }

    pub fn stars(&self) -> StarBreakdown {
        StarBreakdown::from_rating(self.rating)
    }
}

// ========================================
// Review
// ========================================

/// Canonical review
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub spot_id: SpotId,
    /// 1-5, or 0 when the service omitted it
    pub rating: u8,
    pub comment: String,
    pub author: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

// ========================================
// Filter criteria
// ========================================

/// User-controlled filter state for the spot list and map
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    /// Case-insensitive substring over name, type and note
    pub search_term: String,
    /// "At least" threshold, 0-5
    pub min_rating: u8,
    /// Only spots explicitly marked open
    pub open_only: bool,
}

impl FilterCriteria {
    pub const MAX_RATING: u8 = 5;

    pub fn new(search_term: impl Into<String>, min_rating: u8, open_only: bool) -> Self {
        Self {
            search_term: search_term.into(),
            min_rating: min_rating.min(Self::MAX_RATING),
            open_only,
        }
    }

    /// Criteria that keep every mappable spot
    pub fn is_neutral(&self) -> bool {
        self.search_term.is_empty() && self.min_rating == 0 && !self.open_only
    }
}

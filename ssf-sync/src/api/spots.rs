//! `/spots` endpoints and the new-spot draft

use serde::Serialize;
use serde_json::{json, Value};
use ssf_common::hours::parse_clock;
use ssf_common::normalize::{normalize_spot, normalize_spots, NormalizeError, NormalizedList};
use ssf_common::{Spot, SpotId};
use tracing::{debug, info};

use super::{require_id, ServiceClient};
use crate::error::{Result, SyncError};

/// Opening hours for one weekday, as accepted by `POST /spots`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoursEntry {
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: u8,
    /// `HH:MM` or `HH:MM:SS`
    pub open_time: String,
    pub close_time: String,
}

impl HoursEntry {
    pub fn new(day_of_week: u8, open_time: impl Into<String>, close_time: impl Into<String>) -> Self {
        Self {
            day_of_week,
            open_time: open_time.into(),
            close_time: close_time.into(),
        }
    }
}

/// User input for a new study spot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpotDraft {
    pub name: String,
    pub spot_type: Option<String>,
    pub address: String,
    pub description: Option<String>,
    pub note: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub image_url: Option<String>,
    pub has_wifi: bool,
    pub has_outlets: bool,
    pub hours: Vec<HoursEntry>,
}

impl SpotDraft {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            ..Self::default()
        }
    }

    /// Client-side checks mirroring the service's own
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SyncError::Validation("Name is required".to_string()));
        }
        if self.address.trim().is_empty() {
            return Err(SyncError::Validation("Address is required".to_string()));
        }
        match (self.latitude, self.longitude) {
            (None, None) => {}
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {}
            _ => {
                return Err(SyncError::Validation(
                    "Latitude and longitude must both be given as numbers".to_string(),
                ))
            }
        }
        for entry in &self.hours {
            if entry.day_of_week > 6 {
                return Err(SyncError::Validation(
                    "dayOfWeek must be between 0 (Sunday) and 6 (Saturday)".to_string(),
                ));
            }
            if parse_clock(&entry.open_time).is_none() || parse_clock(&entry.close_time).is_none()
            {
                return Err(SyncError::Validation(
                    "Invalid time format. Use HH:MM or HH:MM:SS".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Request body with text fields trimmed and blanks omitted
    pub fn payload(&self) -> Value {
        let mut body = json!({
            "name": self.name.trim(),
            "address": self.address.trim(),
            "hasWifi": self.has_wifi,
            "hasOutlets": self.has_outlets,
        });
        let optional = [
            ("type", &self.spot_type),
            ("description", &self.description),
            ("note", &self.note),
            ("imageUrl", &self.image_url),
        ];
        for (key, value) in optional {
            if let Some(text) = value.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                body[key] = Value::from(text);
            }
        }
        if let (Some(lat), Some(lon)) = (self.latitude, self.longitude) {
            body["latitude"] = Value::from(lat);
            body["longitude"] = Value::from(lon);
        }
        if !self.hours.is_empty() {
            body["hours"] = json!(self.hours);
        }
        body
    }
}

impl ServiceClient {
    /// `GET /spots`, normalized
    ///
    /// Shape problems do not error: they come back as `shape_ok = false`.
    pub async fn list_spots(&self) -> Result<NormalizedList<Spot>> {
        let payload = self.transport().get("/spots").await?;
        let list = normalize_spots(&payload.unwrap_or(Value::Null));
        debug!(count = list.items.len(), skipped = list.skipped, "Fetched spots");
        Ok(list)
    }

    /// `GET /spots/{id}`, normalized
    ///
    /// A record that omits its identifier is attributed to the requested id.
    pub async fn get_spot(&self, id: &SpotId) -> Result<Spot> {
        require_id(id, "getSpot")?;
        let payload = self
            .transport()
            .get(&format!("/spots/{}", id))
            .await?
            .ok_or_else(|| SyncError::Shape(format!("empty response for spot {}", id)))?;

        match normalize_spot(&payload) {
            Ok(spot) => Ok(spot),
            Err(NormalizeError::MissingId(Value::Object(mut obj))) => {
                obj.insert("id".to_string(), id.to_json());
                normalize_spot(&Value::Object(obj))
                    .map_err(|e| SyncError::Shape(e.to_string()))
            }
            Err(e) => Err(SyncError::Shape(e.to_string())),
        }
    }

    /// Validate and `POST /spots`, returning the created spot
    pub async fn create_spot(&self, draft: &SpotDraft) -> Result<Spot> {
        draft.validate()?;
        let payload = self
            .transport()
            .post("/spots", draft.payload())
            .await?
            .ok_or_else(|| SyncError::Shape("empty response for created spot".to_string()))?;
        let spot = normalize_spot(&payload).map_err(|e| SyncError::Shape(e.to_string()))?;
        info!(spot_id = %spot.id, name = %spot.name, "Spot created");
        Ok(spot)
    }
}

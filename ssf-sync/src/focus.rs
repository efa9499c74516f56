//! Geolocation and fly-to coordination
//!
//! Device location requests and list/marker selections both end up as a
//! [`FocusSignal`] for the map. There is a single pending slot: a newer
//! signal replaces one the map has not consumed yet.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use ssf_common::events::{EventBus, FocusSource, SyncEvent};
use ssf_common::model::DEFAULT_FOCUS_ZOOM;
use ssf_common::{Coordinate, Spot, SpotId};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};

/// Why the device position could not be obtained
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeolocationError {
    #[error("Geolocation is not supported on this device.")]
    Unsupported,

    #[error("Unable to access your location.")]
    PermissionDenied,

    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

/// Source of the device position
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self) -> std::result::Result<Coordinate, GeolocationError>;
}

/// Reports a fixed position (configured default location)
#[derive(Debug, Clone, Copy)]
pub struct FixedLocator(pub Coordinate);

#[async_trait]
impl Geolocator for FixedLocator {
    async fn current_position(&self) -> std::result::Result<Coordinate, GeolocationError> {
        Ok(self.0)
    }
}

/// Device without a position source
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocator;

#[async_trait]
impl Geolocator for NoLocator {
    async fn current_position(&self) -> std::result::Result<Coordinate, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}

/// One-shot request for the map to fly somewhere
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FocusSignal {
    pub coordinate: Coordinate,
    pub zoom: u8,
    pub source: FocusSource,
    /// Increases with every signal issued
    pub sequence: u64,
}

#[derive(Debug, Default)]
struct FocusState {
    pending: Option<FocusSignal>,
    selected: Option<SpotId>,
    user_position: Option<Coordinate>,
    sequence: u64,
}

pub struct FocusCoordinator {
    state: Mutex<FocusState>,
    zoom: u8,
    events: EventBus,
}

impl FocusCoordinator {
    pub fn new(events: EventBus) -> Self {
        Self::with_zoom(events, DEFAULT_FOCUS_ZOOM)
    }

    pub fn with_zoom(events: EventBus, zoom: u8) -> Self {
        Self {
            state: Mutex::new(FocusState::default()),
            zoom,
            events,
        }
    }

    fn state(&self) -> MutexGuard<'_, FocusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn issue(&self, coordinate: Coordinate, source: FocusSource) -> FocusSignal {
        let signal = {
            let mut state = self.state();
            state.sequence += 1;
            let signal = FocusSignal {
                coordinate,
                zoom: self.zoom,
                source,
                sequence: state.sequence,
            };
            if let Some(previous) = state.pending.replace(signal) {
                debug!(sequence = previous.sequence, "Unconsumed focus superseded");
            }
            signal
        };
        self.events.emit_lossy(SyncEvent::FocusRequested {
            coordinate,
            zoom: signal.zoom,
            source,
            timestamp: ssf_common::time::now(),
        });
        signal
    }

    /// Select a spot and fly to it
    pub fn select(&self, spot: &Spot) -> Result<FocusSignal> {
        let coordinate = spot.coordinate().ok_or_else(|| {
            SyncError::Validation(format!("spot {} has no valid coordinates", spot.id))
        })?;
        self.state().selected = Some(spot.id.clone());
        self.events.emit_lossy(SyncEvent::SelectionChanged {
            spot_id: Some(spot.id.clone()),
            timestamp: ssf_common::time::now(),
        });
        Ok(self.issue(coordinate, FocusSource::Selection))
    }

    pub fn clear_selection(&self) {
        if self.state().selected.take().is_some() {
            self.events.emit_lossy(SyncEvent::SelectionChanged {
                spot_id: None,
                timestamp: ssf_common::time::now(),
            });
        }
    }

    /// Request the device position once.
    ///
    /// Success records the user position and issues a focus signal; failure
    /// changes nothing and is published.
    pub async fn locate(&self, locator: &dyn Geolocator) -> Result<Coordinate> {
        let position = locator.current_position().await;
        self.apply_position(position)
    }

    /// Record the outcome of a position request obtained elsewhere
    pub fn apply_position(
        &self,
        position: std::result::Result<Coordinate, GeolocationError>,
    ) -> Result<Coordinate> {
        match position {
            Ok(coordinate) => {
                info!(
                    latitude = coordinate.latitude,
                    longitude = coordinate.longitude,
                    "Device located"
                );
                self.state().user_position = Some(coordinate);
                self.events.emit_lossy(SyncEvent::UserLocated {
                    coordinate,
                    timestamp: ssf_common::time::now(),
                });
                self.issue(coordinate, FocusSource::DeviceLocation);
                Ok(coordinate)
            }
            Err(e) => {
                warn!(error = %e, "Geolocation failed");
                self.events.emit_lossy(SyncEvent::GeolocationFailed {
                    message: e.to_string(),
                    timestamp: ssf_common::time::now(),
                });
                Err(e.into())
            }
        }
    }

    /// Consume the pending focus signal
    pub fn take_focus(&self) -> Option<FocusSignal> {
        self.state().pending.take()
    }

    pub fn peek_focus(&self) -> Option<FocusSignal> {
        self.state().pending
    }

    pub fn selected(&self) -> Option<SpotId> {
        self.state().selected.clone()
    }

    pub fn user_position(&self) -> Option<Coordinate> {
        self.state().user_position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn located_spot(id: i64, lat: f64, lon: f64) -> Spot {
        let mut spot = Spot::new(SpotId::Int(id), "Spot");
        spot.latitude = Some(lat);
        spot.longitude = Some(lon);
        spot
    }

    struct DeniedLocator;

    #[async_trait]
    impl Geolocator for DeniedLocator {
        async fn current_position(&self) -> std::result::Result<Coordinate, GeolocationError> {
            Err(GeolocationError::PermissionDenied)
        }
    }

    #[test]
    fn test_select_issues_focus_at_default_zoom() {
        let focus = FocusCoordinator::new(EventBus::default());
        let signal = focus.select(&located_spot(1, 34.02, -118.28)).unwrap();

        assert_eq!(signal.zoom, 17);
        assert_eq!(signal.source, FocusSource::Selection);
        assert_eq!(signal.coordinate.latitude, 34.02);
        assert_eq!(focus.selected(), Some(SpotId::Int(1)));
        assert_eq!(focus.take_focus(), Some(signal));
        assert_eq!(focus.take_focus(), None);
    }

    #[test]
    fn test_spot_without_coordinates_cannot_be_focused() {
        let focus = FocusCoordinator::new(EventBus::default());
        let spot = Spot::new(SpotId::Int(1), "Nowhere");

        assert!(matches!(focus.select(&spot), Err(SyncError::Validation(_))));
        assert_eq!(focus.selected(), None);
        assert_eq!(focus.peek_focus(), None);
    }

    #[test]
    fn test_newer_focus_supersedes_unconsumed() {
        let focus = FocusCoordinator::new(EventBus::default());
        focus.select(&located_spot(1, 1.0, 1.0)).unwrap();
        let second = focus.select(&located_spot(2, 2.0, 2.0)).unwrap();

        assert_eq!(focus.take_focus(), Some(second));
        assert_eq!(second.sequence, 2);
        assert_eq!(focus.take_focus(), None);
    }

    #[tokio::test]
    async fn test_locate_records_position_and_focuses() {
        let focus = FocusCoordinator::new(EventBus::default());
        let here = Coordinate::new(34.0205, -118.2856).unwrap();

        assert_eq!(focus.locate(&FixedLocator(here)).await.unwrap(), here);
        assert_eq!(focus.user_position(), Some(here));
        let signal = focus.take_focus().unwrap();
        assert_eq!(signal.source, FocusSource::DeviceLocation);
        assert_eq!(signal.coordinate, here);
    }

    #[tokio::test]
    async fn test_locate_failure_changes_nothing() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let focus = FocusCoordinator::new(bus);
        focus.select(&located_spot(1, 1.0, 1.0)).unwrap();
        let pending = focus.peek_focus();

        let err = focus.locate(&DeniedLocator).await.unwrap_err();
        assert_eq!(err.to_string(), "Unable to access your location.");
        assert!(matches!(
            focus.locate(&NoLocator).await,
            Err(SyncError::Geolocation(GeolocationError::Unsupported))
        ));

        assert_eq!(focus.user_position(), None);
        assert_eq!(focus.peek_focus(), pending);
        assert_eq!(focus.selected(), Some(SpotId::Int(1)));

        let mut failures = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, SyncEvent::GeolocationFailed { .. }) {
                failures += 1;
            }
        }
        assert_eq!(failures, 2);
    }

    #[test]
    fn test_clear_selection() {
        let focus = FocusCoordinator::new(EventBus::default());
        focus.select(&located_spot(1, 1.0, 1.0)).unwrap();
        focus.clear_selection();
        assert_eq!(focus.selected(), None);
    }
}

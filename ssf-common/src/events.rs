//! Event types for the SSF engine
//!
//! Every observable change of engine state (load results, optimistic favorite
//! flips, review reconciliation, focus requests) is published on the
//! [`EventBus`] so that list, map and detail views can react without polling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::{Coordinate, ReviewId, SpotId};

/// What produced a focus request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusSource {
    /// One-shot device location request
    DeviceLocation,
    /// List row or marker click
    Selection,
}

/// SSF event types
///
/// Serialized with a `type` tag so they can be forwarded to a UI as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    /// Spot list loaded and normalized
    SpotsLoaded {
        count: usize,
        /// Records dropped for lacking an id
        skipped: usize,
        timestamp: DateTime<Utc>,
    },

    /// Spot list could not be loaded; the view shows a placeholder
    SpotsLoadFailed {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Filtered set re-derived (criteria change or refresh)
    ///
    /// List rows and map markers are both built from `visible`.
    VisibleSetChanged {
        visible: Vec<SpotId>,
        timestamp: DateTime<Utc>,
    },

    /// Favorite membership changed locally
    ///
    /// Emitted synchronously on toggle (`pending = true`) before the request
    /// is sent, and again when the newest request for the spot settles.
    FavoriteChanged {
        spot_id: SpotId,
        favorite: bool,
        pending: bool,
        timestamp: DateTime<Utc>,
    },

    /// Favorite mutation failed
    FavoriteToggleFailed {
        spot_id: SpotId,
        /// False when a newer toggle superseded this request
        rolled_back: bool,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Review list for a spot replaced wholesale
    ReviewsLoaded {
        spot_id: SpotId,
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Review list for a spot could not be loaded
    ReviewsLoadFailed {
        spot_id: SpotId,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Server-echoed review prepended to the list
    ReviewAdded {
        spot_id: SpotId,
        review_id: ReviewId,
        timestamp: DateTime<Utc>,
    },

    /// Review submission failed; form input retained
    ReviewSubmitFailed {
        spot_id: SpotId,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Map should fly to a coordinate
    FocusRequested {
        coordinate: Coordinate,
        zoom: u8,
        source: FocusSource,
        timestamp: DateTime<Utc>,
    },

    /// Selected spot changed (marker highlighting)
    SelectionChanged {
        spot_id: Option<SpotId>,
        timestamp: DateTime<Utc>,
    },

    /// Device position acquired
    UserLocated {
        coordinate: Coordinate,
        timestamp: DateTime<Utc>,
    },

    /// Device position unavailable
    GeolocationFailed {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// New spot accepted by the service
    SpotCreated {
        spot_id: SpotId,
        timestamp: DateTime<Utc>,
    },
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses `tokio::broadcast` internally:
/// - Non-blocking publish (slow subscribers don't block the engine)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use ssf_common::events::{EventBus, SyncEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(SyncEvent::SpotsLoadFailed {
///     message: "offline".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(SyncEvent::SpotsLoadFailed { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: SyncEvent) -> Result<usize, broadcast::error::SendError<SyncEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SyncEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

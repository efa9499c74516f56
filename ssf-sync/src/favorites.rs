//! Favorite toggle state machine
//!
//! Membership flips locally and synchronously on toggle, before the request
//! is sent. Every toggle bumps a per-spot version counter; when a request
//! settles, its outcome is applied only if no newer toggle for the same spot
//! has been issued since. Consequences:
//! - last write wins among concurrent toggles
//! - a stale failure never rolls back a newer optimistic value
//! - a failure of the newest request restores the last value the service
//!   confirmed, not an unconfirmed optimistic one
//! - the pending flag clears when the newest request settles

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use ssf_common::events::{EventBus, SyncEvent};
use ssf_common::{Spot, SpotId};
use tracing::{debug, info, warn};

use crate::api::{require_id, ServiceClient};
use crate::error::Result;
use crate::scope::ViewScope;

/// Membership as rendered by a favorite button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    NotFavorite,
    /// Shown as a favorite, request not yet settled
    FavoritePending,
    Favorite,
    /// Shown as not a favorite, request not yet settled
    NotFavoritePending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FavoriteStatus {
    pub favorite: bool,
    pub pending: bool,
}

impl FavoriteStatus {
    pub fn membership(self) -> Membership {
        match (self.favorite, self.pending) {
            (false, false) => Membership::NotFavorite,
            (true, true) => Membership::FavoritePending,
            (true, false) => Membership::Favorite,
            (false, true) => Membership::NotFavoritePending,
        }
    }
}

#[derive(Debug, Default)]
struct Entry {
    /// Value shown, possibly optimistic
    favorite: bool,
    /// Last value the service accepted or reported
    confirmed: bool,
    /// Version that set `confirmed`
    confirmed_version: u64,
    /// Latest toggle issued
    version: u64,
    /// Latest toggle whose request has settled
    settled: u64,
}

impl Entry {
    fn in_flight(&self) -> bool {
        self.version != self.settled
    }

    fn status(&self) -> FavoriteStatus {
        FavoriteStatus {
            favorite: self.favorite,
            pending: self.in_flight(),
        }
    }
}

/// A locally applied toggle whose request has not been sent yet
#[must_use = "the toggle has only been applied locally; send it"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingToggle {
    pub spot_id: SpotId,
    /// Value requested from the service
    pub favorite: bool,
    pub version: u64,
}

/// Per-spot favorite membership shared by every view
pub struct FavoriteStore {
    entries: Mutex<HashMap<SpotId, Entry>>,
    events: EventBus,
}

impl FavoriteStore {
    pub fn new(events: EventBus) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            events,
        }
    }

    // Sections under this lock never await
    fn entries(&self) -> MutexGuard<'_, HashMap<SpotId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self, spot_id: &SpotId) -> FavoriteStatus {
        self.entries()
            .get(spot_id)
            .map(Entry::status)
            .unwrap_or_default()
    }

    pub fn is_favorite(&self, spot_id: &SpotId) -> bool {
        self.status(spot_id).favorite
    }

    /// Record membership learned from the service.
    ///
    /// Ignored while a toggle for the spot is in flight. Returns whether the
    /// value was applied.
    pub fn seed(&self, spot_id: &SpotId, favorite: bool) -> bool {
        let mut entries = self.entries();
        let entry = entries.entry(spot_id.clone()).or_default();
        if entry.in_flight() {
            debug!(spot_id = %spot_id, "Skipping seed while a toggle is in flight");
            return false;
        }
        entry.favorite = favorite;
        entry.confirmed = favorite;
        true
    }

    /// Drop what is known about a spot so the next view re-derives it.
    ///
    /// Kept while a toggle is in flight.
    pub fn discard(&self, spot_id: &SpotId) {
        let mut entries = self.entries();
        if entries.get(spot_id).is_some_and(|e| !e.in_flight()) {
            entries.remove(spot_id);
        }
    }

    /// Seed every spot of a favorites listing as a favorite
    pub fn seed_from(&self, favorites: &[Spot]) {
        for spot in favorites {
            self.seed(&spot.id, true);
        }
    }

    /// Best-effort membership check for one spot.
    ///
    /// Any failure is logged and reported as "not a favorite"; the result is
    /// only recorded while `scope` is live.
    pub async fn refresh_membership(
        &self,
        client: &ServiceClient,
        spot_id: &SpotId,
        scope: &ViewScope,
    ) -> bool {
        let favorites = match scope.run(client.list_favorites()).await {
            None => return self.is_favorite(spot_id),
            Some(Ok(list)) => list.items,
            Some(Err(e)) => {
                warn!(spot_id = %spot_id, error = %e, "Favorite membership check failed");
                return false;
            }
        };
        let favorite = favorites.iter().any(|spot| &spot.id == spot_id);
        scope.commit(|| self.seed(spot_id, favorite));
        favorite
    }

    /// Flip membership locally and return the request to send.
    ///
    /// An id that cannot be sent fails here, before anything changes.
    pub fn begin_toggle(&self, spot_id: &SpotId) -> Result<PendingToggle> {
        require_id(spot_id, "toggleFavorite")?;
        let toggle = {
            let mut entries = self.entries();
            let entry = entries.entry(spot_id.clone()).or_default();
            entry.favorite = !entry.favorite;
            entry.version += 1;
            PendingToggle {
                spot_id: spot_id.clone(),
                favorite: entry.favorite,
                version: entry.version,
            }
        };
        debug!(
            spot_id = %toggle.spot_id,
            favorite = toggle.favorite,
            version = toggle.version,
            "Favorite toggled locally"
        );
        self.events.emit_lossy(SyncEvent::FavoriteChanged {
            spot_id: toggle.spot_id.clone(),
            favorite: toggle.favorite,
            pending: true,
            timestamp: ssf_common::time::now(),
        });
        Ok(toggle)
    }

    /// Send a toggle and reconcile its outcome
    ///
    /// Returns the membership the service accepted. On failure the local
    /// value is rolled back to the last confirmed one unless a newer toggle
    /// superseded this request.
    pub async fn send(&self, client: &ServiceClient, toggle: PendingToggle) -> Result<bool> {
        let result = client.set_favorite(&toggle.spot_id, toggle.favorite).await;
        let current = self.settle(&toggle, result.is_ok());

        match result {
            Ok(_) => {
                info!(
                    spot_id = %toggle.spot_id,
                    favorite = toggle.favorite,
                    version = toggle.version,
                    "Favorite saved"
                );
                Ok(toggle.favorite)
            }
            Err(e) => {
                let rolled_back = current;
                warn!(
                    spot_id = %toggle.spot_id,
                    version = toggle.version,
                    rolled_back,
                    error = %e,
                    "Favorite update failed"
                );
                self.events.emit_lossy(SyncEvent::FavoriteToggleFailed {
                    spot_id: toggle.spot_id.clone(),
                    rolled_back,
                    message: e.to_string(),
                    timestamp: ssf_common::time::now(),
                });
                Err(e)
            }
        }
    }

    /// Toggle and send in one step
    pub async fn toggle(&self, client: &ServiceClient, spot_id: &SpotId) -> Result<bool> {
        let toggle = self.begin_toggle(spot_id)?;
        self.send(client, toggle).await
    }

    /// Apply a settled request. Returns whether it was still the newest.
    fn settle(&self, toggle: &PendingToggle, succeeded: bool) -> bool {
        let status = {
            let mut entries = self.entries();
            let entry = entries.entry(toggle.spot_id.clone()).or_default();
            if succeeded && toggle.version > entry.confirmed_version {
                entry.confirmed = toggle.favorite;
                entry.confirmed_version = toggle.version;
            }
            if entry.version != toggle.version {
                debug!(
                    spot_id = %toggle.spot_id,
                    version = toggle.version,
                    latest = entry.version,
                    "Superseded favorite request settled"
                );
                return false;
            }
            entry.settled = toggle.version;
            if !succeeded {
                entry.favorite = entry.confirmed;
            }
            entry.status()
        };
        self.events.emit_lossy(SyncEvent::FavoriteChanged {
            spot_id: toggle.spot_id.clone(),
            favorite: status.favorite,
            pending: false,
            timestamp: ssf_common::time::now(),
        });
        true
    }
}

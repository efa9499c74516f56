//! Spot detail view model
//!
//! On load the spot record, the favorite membership check and the review
//! list are fetched concurrently; each succeeds or fails on its own.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use ssf_common::{Spot, SpotId};
use tracing::{debug, warn};

use crate::api::ServiceClient;
use crate::error::{Result, SyncError};
use crate::favorites::{FavoriteStatus, FavoriteStore};
use crate::reviews::{ReviewComposer, ReviewLedger, ReviewsState, SubmitOutcome};
use crate::scope::ViewScope;

pub const PLACEHOLDER_WARNING: &str =
    "Could not load the latest details for this spot. Showing placeholder information.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DetailState {
    Loading,
    Ready {
        spot: Spot,
        /// Set when `spot` is a placeholder
        warning: Option<String>,
    },
}

pub struct SpotDetailView {
    spot_id: SpotId,
    scope: ViewScope,
    state: Mutex<DetailState>,
    favorites: Arc<FavoriteStore>,
    reviews: Arc<ReviewLedger>,
    composer: ReviewComposer,
}

impl SpotDetailView {
    /// Mount a detail view for an id taken from a route or user input.
    ///
    /// A blank id fails before anything is fetched. Membership and reviews
    /// left behind by an earlier view of the same spot are dropped, so they
    /// are derived afresh by [`load`](Self::load).
    pub fn open(
        raw_id: &str,
        favorites: Arc<FavoriteStore>,
        reviews: Arc<ReviewLedger>,
    ) -> Result<Self> {
        let spot_id = SpotId::parse(raw_id)
            .ok_or_else(|| SyncError::Validation("spot id is required".to_string()))?;
        favorites.discard(&spot_id);
        reviews.reset(&spot_id);
        let scope = ViewScope::mount("detail");
        Ok(Self {
            composer: ReviewComposer::new(spot_id.clone(), scope.child("review form")),
            spot_id,
            scope,
            state: Mutex::new(DetailState::Loading),
            favorites,
            reviews,
        })
    }

    fn state_mut(&self) -> MutexGuard<'_, DetailState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn spot_id(&self) -> &SpotId {
        &self.spot_id
    }

    pub fn scope(&self) -> &ViewScope {
        &self.scope
    }

    pub fn teardown(&self) {
        self.scope.teardown();
    }

    /// Fetch spot, membership and reviews concurrently
    pub async fn load(&self, client: &ServiceClient) {
        let spot = async {
            let Some(result) = self.scope.run(client.get_spot(&self.spot_id)).await else {
                return;
            };
            let next = match result {
                Ok(spot) => DetailState::Ready {
                    spot,
                    warning: None,
                },
                Err(e) => {
                    warn!(
                        spot_id = %self.spot_id,
                        error = %e,
                        "Spot load failed, using placeholder"
                    );
                    DetailState::Ready {
                        spot: Spot::placeholder(self.spot_id.clone()),
                        warning: Some(PLACEHOLDER_WARNING.to_string()),
                    }
                }
            };
            *self.state_mut() = next;
        };
        let membership = self
            .favorites
            .refresh_membership(client, &self.spot_id, &self.scope);
        let reviews = async {
            // Failure is recorded in the reviews panel
            let _ = self.reviews.load(client, &self.spot_id, &self.scope).await;
        };

        let ((), favorite, ()) = tokio::join!(spot, membership, reviews);
        debug!(spot_id = %self.spot_id, favorite, "Detail view loaded");
    }

    pub fn state(&self) -> DetailState {
        self.state_mut().clone()
    }

    pub fn spot(&self) -> Option<Spot> {
        match &*self.state_mut() {
            DetailState::Ready { spot, .. } => Some(spot.clone()),
            DetailState::Loading => None,
        }
    }

    pub fn favorite_status(&self) -> FavoriteStatus {
        self.favorites.status(&self.spot_id)
    }

    pub async fn toggle_favorite(&self, client: &ServiceClient) -> Result<bool> {
        self.favorites.toggle(client, &self.spot_id).await
    }

    pub fn reviews(&self) -> ReviewsState {
        self.reviews.state(&self.spot_id)
    }

    pub fn composer(&self) -> &ReviewComposer {
        &self.composer
    }

    pub async fn submit_review(&self, client: &ServiceClient) -> Result<SubmitOutcome> {
        self.composer.submit(client, &self.reviews).await
    }
}

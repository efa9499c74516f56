//! Review reconciliation
//!
//! [`ReviewLedger`] holds the review panel of every open spot. A load replaces
//! a panel wholesale; an accepted submission either prepends the
//! server-echoed review or, when the echo is unusable, refetches the panel.
//! [`ReviewComposer`] owns one form: it rejects double submission and keeps
//! the user's input whenever a submission fails.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use ssf_common::events::{EventBus, SyncEvent};
use ssf_common::normalize::normalize_review;
use ssf_common::{Review, SpotId};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ReviewDraft, ServiceClient};
use crate::error::{Result, SyncError};
use crate::scope::ViewScope;

/// State of one spot's review panel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReviewsState {
    Loading,
    Loaded { reviews: Vec<Review> },
    Failed { message: String },
}

impl ReviewsState {
    /// Reviews to render; empty unless loaded
    pub fn reviews(&self) -> &[Review] {
        match self {
            ReviewsState::Loaded { reviews } => reviews,
            _ => &[],
        }
    }
}

/// Review panels keyed by spot
pub struct ReviewLedger {
    panels: Mutex<HashMap<SpotId, ReviewsState>>,
    events: EventBus,
}

impl ReviewLedger {
    pub fn new(events: EventBus) -> Self {
        Self {
            panels: Mutex::new(HashMap::new()),
            events,
        }
    }

    fn panels(&self) -> MutexGuard<'_, HashMap<SpotId, ReviewsState>> {
        self.panels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Panel state; spots never loaded report `Loading`
    pub fn state(&self, spot_id: &SpotId) -> ReviewsState {
        self.panels()
            .get(spot_id)
            .cloned()
            .unwrap_or(ReviewsState::Loading)
    }

    pub fn reviews(&self, spot_id: &SpotId) -> Vec<Review> {
        self.state(spot_id).reviews().to_vec()
    }

    /// Forget a spot's panel; it reads as `Loading` until loaded again
    pub fn reset(&self, spot_id: &SpotId) {
        if self.panels().remove(spot_id).is_some() {
            debug!(spot_id = %spot_id, "Review panel reset");
        }
    }

    /// Fetch and replace a spot's panel.
    ///
    /// A failed reload leaves an already loaded list in place. Results
    /// arriving after `scope` is torn down are discarded.
    pub async fn load(
        &self,
        client: &ServiceClient,
        spot_id: &SpotId,
        scope: &ViewScope,
    ) -> Result<usize> {
        scope.commit(|| {
            self.panels()
                .entry(spot_id.clone())
                .or_insert(ReviewsState::Loading);
        });

        let Some(result) = scope.run(client.list_reviews(spot_id)).await else {
            return Ok(0);
        };

        match result {
            Ok(list) => {
                let count = list.items.len();
                self.replace(spot_id, list.items);
                Ok(count)
            }
            Err(e) => {
                warn!(spot_id = %spot_id, error = %e, "Failed to load reviews");
                {
                    // A list already on screen stays; only an empty panel shows the error
                    let mut panels = self.panels();
                    let panel = panels
                        .entry(spot_id.clone())
                        .or_insert(ReviewsState::Loading);
                    if !matches!(panel, ReviewsState::Loaded { .. }) {
                        *panel = ReviewsState::Failed {
                            message: e.to_string(),
                        };
                    }
                }
                self.events.emit_lossy(SyncEvent::ReviewsLoadFailed {
                    spot_id: spot_id.clone(),
                    message: e.to_string(),
                    timestamp: ssf_common::time::now(),
                });
                Err(e)
            }
        }
    }

    fn replace(&self, spot_id: &SpotId, reviews: Vec<Review>) {
        let count = reviews.len();
        self.panels()
            .insert(spot_id.clone(), ReviewsState::Loaded { reviews });
        debug!(spot_id = %spot_id, count, "Reviews replaced");
        self.events.emit_lossy(SyncEvent::ReviewsLoaded {
            spot_id: spot_id.clone(),
            count,
            timestamp: ssf_common::time::now(),
        });
    }

    /// Insert at index 0 of a loaded panel. Returns false if the panel is
    /// not loaded.
    fn prepend(&self, review: Review) -> bool {
        let spot_id = review.spot_id.clone();
        let review_id = review.id.clone();
        {
            let mut panels = self.panels();
            match panels.get_mut(&spot_id) {
                Some(ReviewsState::Loaded { reviews }) => reviews.insert(0, review),
                _ => return false,
            }
        }
        self.events.emit_lossy(SyncEvent::ReviewAdded {
            spot_id,
            review_id,
            timestamp: ssf_common::time::now(),
        });
        true
    }
}

/// What an accepted submission did to the panel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Server echo inserted at the top of the list
    Prepended { review: Review },
    /// Panel refetched from the service
    Refetched { count: usize },
    /// Accepted, but the refetch failed; the panel is unchanged
    AcceptedStale { message: String },
    /// View went away before the service answered; nothing applied and no
    /// error reported
    Discarded,
}

/// One review form, bound to a spot
pub struct ReviewComposer {
    form_id: Uuid,
    spot_id: SpotId,
    scope: ViewScope,
    draft: Mutex<ReviewDraft>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag on every exit path
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ReviewComposer {
    pub fn new(spot_id: SpotId, scope: ViewScope) -> Self {
        Self {
            form_id: Uuid::new_v4(),
            spot_id,
            scope,
            draft: Mutex::new(ReviewDraft::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    fn draft_mut(&self) -> MutexGuard<'_, ReviewDraft> {
        self.draft.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn spot_id(&self) -> &SpotId {
        &self.spot_id
    }

    pub fn draft(&self) -> ReviewDraft {
        self.draft_mut().clone()
    }

    pub fn set_rating(&self, rating: u8) {
        self.draft_mut().rating = rating;
    }

    pub fn set_comment(&self, comment: impl Into<String>) {
        self.draft_mut().comment = comment.into();
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Submit the current draft and reconcile the spot's panel.
    ///
    /// On failure the draft and the panel are left untouched and exactly one
    /// error is returned. A second call while one is in flight fails with
    /// [`SyncError::SubmissionInProgress`].
    pub async fn submit(
        &self,
        client: &ServiceClient,
        ledger: &ReviewLedger,
    ) -> Result<SubmitOutcome> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!(form_id = %self.form_id, "Submission already in flight");
            return Err(SyncError::SubmissionInProgress);
        }
        let _guard = InFlight(&self.in_flight);

        let draft = self.draft();
        debug!(
            form_id = %self.form_id,
            spot_id = %self.spot_id,
            rating = draft.rating,
            "Submitting review"
        );

        let echo = match client.create_review(&self.spot_id, &draft).await {
            Ok(echo) => echo,
            Err(e) if !self.scope.is_live() => {
                debug!(form_id = %self.form_id, error = %e, "Review failed after view closed");
                return Ok(SubmitOutcome::Discarded);
            }
            Err(e) => {
                warn!(
                    form_id = %self.form_id,
                    spot_id = %self.spot_id,
                    error = %e,
                    "Review submission failed"
                );
                ledger.events.emit_lossy(SyncEvent::ReviewSubmitFailed {
                    spot_id: self.spot_id.clone(),
                    message: e.to_string(),
                    timestamp: ssf_common::time::now(),
                });
                return Err(e);
            }
        };

        if !self.scope.is_live() {
            debug!(form_id = %self.form_id, "Review accepted after view closed");
            return Ok(SubmitOutcome::Discarded);
        }

        // Accepted: the form starts over
        *self.draft_mut() = ReviewDraft::default();
        info!(form_id = %self.form_id, spot_id = %self.spot_id, "Review accepted");

        let review = echo.as_ref().and_then(|raw| match normalize_review(raw, &self.spot_id) {
            Ok(review) => Some(review),
            Err(e) => {
                debug!(error = %e, "Unusable review echo, refetching");
                None
            }
        });

        if let Some(review) = review.filter(|r| r.spot_id == self.spot_id) {
            if ledger.prepend(review.clone()) {
                return Ok(SubmitOutcome::Prepended { review });
            }
        }

        match ledger.load(client, &self.spot_id, &self.scope).await {
            Ok(count) if self.scope.is_live() => Ok(SubmitOutcome::Refetched { count }),
            Ok(_) => Ok(SubmitOutcome::Discarded),
            Err(e) => Ok(SubmitOutcome::AcceptedStale {
                message: e.to_string(),
            }),
        }
    }
}

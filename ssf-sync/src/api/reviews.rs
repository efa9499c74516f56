//! `/spots/{id}/reviews` endpoints

use serde::Serialize;
use serde_json::Value;
use ssf_common::normalize::{normalize_reviews, NormalizedList};
use ssf_common::{Review, SpotId};
use tracing::debug;

use super::{require_id, ServiceClient};
use crate::error::{Result, SyncError};

/// Review form contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewDraft {
    /// 1-5
    pub rating: u8,
    pub comment: String,
}

impl Default for ReviewDraft {
    fn default() -> Self {
        Self {
            rating: 5,
            comment: String::new(),
        }
    }
}

impl ReviewDraft {
    pub fn new(rating: u8, comment: impl Into<String>) -> Self {
        Self {
            rating,
            comment: comment.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=5).contains(&self.rating) {
            return Err(SyncError::Validation(format!(
                "Rating must be between 1 and 5, got {}",
                self.rating
            )));
        }
        Ok(())
    }

    /// Body for `POST /spots/{id}/reviews`, comment trimmed
    pub fn payload(&self) -> Value {
        serde_json::json!({ "rating": self.rating, "comment": self.comment.trim() })
    }
}

impl ServiceClient {
    /// `GET /spots/{id}/reviews`, normalized
    pub async fn list_reviews(&self, spot_id: &SpotId) -> Result<NormalizedList<Review>> {
        require_id(spot_id, "getReviews")?;
        let payload = self
            .transport()
            .get(&format!("/spots/{}/reviews", spot_id))
            .await?;
        let list = normalize_reviews(&payload.unwrap_or(Value::Null), spot_id);
        debug!(spot_id = %spot_id, count = list.items.len(), "Fetched reviews");
        Ok(list)
    }

    /// Validate and `POST /spots/{id}/reviews`
    ///
    /// Returns the raw echo, if the service sent one.
    pub async fn create_review(&self, spot_id: &SpotId, draft: &ReviewDraft) -> Result<Option<Value>> {
        require_id(spot_id, "createReview")?;
        draft.validate()?;
        Ok(self
            .transport()
            .post(&format!("/spots/{}/reviews", spot_id), draft.payload())
            .await?)
    }
}

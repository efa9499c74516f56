//! Spot filter pipeline
//!
//! A spot is visible when all of the following hold:
//! - it has finite coordinates
//! - the search term (case-insensitive) occurs in its name, type or note
//! - its rating is at least `min_rating`
//! - it is explicitly open, when `open_only` is set
//!
//! Filtering is pure, order-preserving and idempotent. The list and the map
//! are both rendered from its output.

use ssf_common::{FilterCriteria, OpenState, Spot};

/// Whether `spot` passes every criterion
pub fn matches(spot: &Spot, criteria: &FilterCriteria) -> bool {
    if !spot.is_mappable() {
        return false;
    }

    let term = criteria.search_term.to_lowercase();
    if !term.is_empty() {
        let hit = [&spot.name, &spot.spot_type, &spot.note]
            .iter()
            .any(|field| field.to_lowercase().contains(&term));
        if !hit {
            return false;
        }
    }

    if spot.rating < f64::from(criteria.min_rating) {
        return false;
    }

    // Unspecified never counts as open
    !criteria.open_only || spot.is_open == OpenState::Open
}

/// Visible subset of `spots`, in input order
pub fn filter(spots: &[Spot], criteria: &FilterCriteria) -> Vec<Spot> {
    spots
        .iter()
        .filter(|spot| matches(spot, criteria))
        .cloned()
        .collect()
}

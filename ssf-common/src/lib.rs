//! # SSF Common Library
//!
//! Shared code for the Study Spot Finder client engine:
//! - Canonical records (spots, reviews, filter criteria)
//! - Record normalization from heterogeneous service payloads
//! - Hours display helpers
//! - Event types (SyncEvent enum) and the EventBus
//! - Configuration loading

pub mod config;
pub mod error;
pub mod events;
pub mod hours;
pub mod model;
pub mod normalize;
pub mod time;

pub use error::{Error, Result};
pub use model::{Coordinate, FilterCriteria, OpenState, Review, Spot, SpotId};

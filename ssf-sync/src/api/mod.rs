//! Endpoint wrappers over a [`Transport`]
//!
//! Each wrapper validates its identifiers before touching the network and
//! hands raw payloads to the normalizer, so callers only ever see canonical
//! [`Spot`](ssf_common::Spot) and [`Review`](ssf_common::Review) values.

mod favorites;
mod reviews;
mod spots;

use std::sync::Arc;

use ssf_common::model::RecordId;

use crate::error::{Result, SyncError};
use crate::transport::Transport;

pub use reviews::ReviewDraft;
pub use spots::{HoursEntry, SpotDraft};

/// Typed client for the study-spot service
#[derive(Clone)]
pub struct ServiceClient {
    transport: Arc<dyn Transport>,
}

impl ServiceClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }
}

/// Reject identifiers that cannot address a resource
pub(crate) fn require_id(id: &RecordId, what: &str) -> Result<()> {
    match id {
        RecordId::Text(s) if s.trim().is_empty() || s.contains('/') => Err(
            SyncError::Validation(format!("{} requires a valid id, got {:?}", what, s)),
        ),
        _ => Ok(()),
    }
}

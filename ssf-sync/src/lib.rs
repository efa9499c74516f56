//! # ssf-sync
//!
//! Client-side synchronization engine for the study-spot service:
//! - Transport seam and reqwest-backed HTTP transport
//! - Endpoint wrappers returning normalized records
//! - Filter pipeline feeding both list and map
//! - Optimistic favorite toggles with stale-rollback suppression
//! - Review reconciliation (prepend echo or refetch)
//! - Geolocation / fly-to coordination
//! - View liveness scopes and the directory/detail view models

pub mod api;
pub mod detail;
pub mod directory;
pub mod error;
pub mod favorites;
pub mod filter;
pub mod focus;
pub mod reviews;
pub mod scope;
pub mod transport;

pub use crate::error::{Result, SyncError};

use std::sync::Arc;

use ssf_common::config::ServiceConfig;
use ssf_common::events::{EventBus, SyncEvent};
use ssf_common::normalize::NormalizedList;
use ssf_common::Spot;
use tracing::info;

use crate::api::{ServiceClient, SpotDraft};
use crate::detail::SpotDetailView;
use crate::directory::SpotDirectory;
use crate::favorites::FavoriteStore;
use crate::reviews::ReviewLedger;
use crate::transport::{HttpTransport, Transport};

/// Engine state shared across views
#[derive(Clone)]
pub struct SyncEngine {
    pub client: ServiceClient,
    pub events: EventBus,
    /// Favorite membership, shared by every view
    pub favorites: Arc<FavoriteStore>,
    /// Review panels, shared by every detail view
    pub reviews: Arc<ReviewLedger>,
}

impl SyncEngine {
    pub fn new(transport: Arc<dyn Transport>, events: EventBus) -> Self {
        Self {
            client: ServiceClient::new(transport),
            favorites: Arc::new(FavoriteStore::new(events.clone())),
            reviews: Arc::new(ReviewLedger::new(events.clone())),
            events,
        }
    }

    /// Engine talking HTTP to the configured service
    pub fn connect(config: &ServiceConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        info!(base_url = %transport.base_url(), "Service client ready");
        Ok(Self::new(
            Arc::new(transport),
            EventBus::new(config.event_capacity),
        ))
    }

    /// Mount a list/map view
    pub fn open_directory(&self) -> SpotDirectory {
        SpotDirectory::new(self.events.clone())
    }

    /// Mount a detail view; a blank id fails fast
    pub fn open_detail(&self, raw_id: &str) -> Result<SpotDetailView> {
        SpotDetailView::open(raw_id, self.favorites.clone(), self.reviews.clone())
    }

    /// Favorites page listing; seeds membership for every listed spot
    pub async fn favorites_page(&self) -> Result<NormalizedList<Spot>> {
        let list = self.client.list_favorites().await?;
        self.favorites.seed_from(&list.items);
        Ok(list)
    }

    /// Create a spot and publish it
    pub async fn add_spot(&self, draft: &SpotDraft) -> Result<Spot> {
        let spot = self.client.create_spot(draft).await?;
        self.events.emit_lossy(SyncEvent::SpotCreated {
            spot_id: spot.id.clone(),
            timestamp: ssf_common::time::now(),
        });
        Ok(spot)
    }
}

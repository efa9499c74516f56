//! Spot directory: list and map view model
//!
//! Both the list rows and the map markers are projected from one derived
//! visible set, recomputed synchronously whenever the criteria or the loaded
//! spots change.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use ssf_common::events::{EventBus, SyncEvent};
use ssf_common::{Coordinate, FilterCriteria, Spot, SpotId};
use tracing::{debug, info, warn};

use crate::api::ServiceClient;
use crate::error::{Result, SyncError};
use crate::filter::filter;
use crate::focus::{FocusCoordinator, FocusSignal, Geolocator};
use crate::scope::ViewScope;

pub const LOAD_FAILED_MESSAGE: &str = "Could not load study spots.";
pub const BAD_SHAPE_MESSAGE: &str = "Invalid data format from server.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DirectoryState {
    Loading,
    Ready,
    /// Placeholder message shown instead of the list
    Failed { message: String },
}

/// One list card
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRow {
    pub id: SpotId,
    pub name: String,
    pub spot_type: String,
    pub note: String,
    /// One decimal, e.g. `4.5`
    pub rating_text: String,
    /// First segment of the hours text
    pub hours_summary: String,
    pub open_label: &'static str,
    pub image_url: Option<String>,
    pub selected: bool,
}

/// One map pin
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    pub id: SpotId,
    pub coordinate: Coordinate,
    pub title: String,
    pub open_label: &'static str,
    pub rating_text: String,
    /// Drawn in the highlight colour
    pub highlighted: bool,
}

#[derive(Debug)]
struct Inner {
    state: DirectoryState,
    spots: Vec<Spot>,
    criteria: FilterCriteria,
    visible: Vec<Spot>,
}

pub struct SpotDirectory {
    scope: ViewScope,
    inner: Mutex<Inner>,
    focus: FocusCoordinator,
    events: EventBus,
}

impl SpotDirectory {
    /// Mount a directory view
    pub fn new(events: EventBus) -> Self {
        Self {
            scope: ViewScope::mount("directory"),
            inner: Mutex::new(Inner {
                state: DirectoryState::Loading,
                spots: Vec::new(),
                criteria: FilterCriteria::default(),
                visible: Vec::new(),
            }),
            focus: FocusCoordinator::new(events.clone()),
            events,
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn scope(&self) -> &ViewScope {
        &self.scope
    }

    pub fn focus(&self) -> &FocusCoordinator {
        &self.focus
    }

    pub fn teardown(&self) {
        self.scope.teardown();
    }

    /// Fetch the spot list and derive the visible set.
    ///
    /// Returns the number of spots loaded. Failures leave a placeholder
    /// message in [`DirectoryState::Failed`].
    pub async fn load(&self, client: &ServiceClient) -> Result<usize> {
        self.scope.commit(|| self.inner().state = DirectoryState::Loading);

        let Some(result) = self.scope.run(client.list_spots()).await else {
            return Ok(0);
        };

        let list = match result {
            Ok(list) if list.shape_ok => list,
            Ok(_) => {
                self.fail(BAD_SHAPE_MESSAGE);
                return Err(SyncError::Shape(BAD_SHAPE_MESSAGE.to_string()));
            }
            Err(e) => {
                warn!(error = %e, "Failed to load spots");
                self.fail(LOAD_FAILED_MESSAGE);
                return Err(e);
            }
        };

        let count = list.items.len();
        let visible = {
            let mut inner = self.inner();
            inner.spots = list.items;
            inner.state = DirectoryState::Ready;
            Self::refilter(&mut inner)
        };
        info!(count, skipped = list.skipped, "Spots loaded");
        self.events.emit_lossy(SyncEvent::SpotsLoaded {
            count,
            skipped: list.skipped,
            timestamp: ssf_common::time::now(),
        });
        self.publish_visible(visible);
        Ok(count)
    }

    fn fail(&self, message: &str) {
        self.inner().state = DirectoryState::Failed {
            message: message.to_string(),
        };
        self.events.emit_lossy(SyncEvent::SpotsLoadFailed {
            message: message.to_string(),
            timestamp: ssf_common::time::now(),
        });
    }

    fn refilter(inner: &mut Inner) -> Vec<SpotId> {
        inner.visible = filter(&inner.spots, &inner.criteria);
        inner.visible.iter().map(|s| s.id.clone()).collect()
    }

    fn publish_visible(&self, visible: Vec<SpotId>) {
        debug!(visible = visible.len(), "Visible set changed");
        self.events.emit_lossy(SyncEvent::VisibleSetChanged {
            visible,
            timestamp: ssf_common::time::now(),
        });
    }

    /// Replace the criteria and re-derive the visible set
    pub fn set_criteria(&self, criteria: FilterCriteria) {
        let visible = {
            let mut inner = self.inner();
            if inner.criteria == criteria {
                return;
            }
            inner.criteria = criteria;
            Self::refilter(&mut inner)
        };
        self.publish_visible(visible);
    }

    pub fn set_search_term(&self, term: impl Into<String>) {
        let mut criteria = self.criteria();
        criteria.search_term = term.into();
        self.set_criteria(criteria);
    }

    pub fn set_min_rating(&self, min_rating: u8) {
        let mut criteria = self.criteria();
        criteria.min_rating = min_rating.min(FilterCriteria::MAX_RATING);
        self.set_criteria(criteria);
    }

    pub fn set_open_only(&self, open_only: bool) {
        let mut criteria = self.criteria();
        criteria.open_only = open_only;
        self.set_criteria(criteria);
    }

    pub fn criteria(&self) -> FilterCriteria {
        self.inner().criteria.clone()
    }

    pub fn state(&self) -> DirectoryState {
        self.inner().state.clone()
    }

    /// Every loaded spot, mappable or not
    pub fn spots(&self) -> Vec<Spot> {
        self.inner().spots.clone()
    }

    pub fn visible(&self) -> Vec<Spot> {
        self.inner().visible.clone()
    }

    pub fn rows(&self) -> Vec<ListRow> {
        let selected = self.focus.selected();
        self.inner()
            .visible
            .iter()
            .map(|spot| ListRow {
                id: spot.id.clone(),
                name: spot.name.clone(),
                spot_type: spot.spot_type.clone(),
                note: spot.note.clone(),
                rating_text: format!("{:.1}", spot.rating),
                hours_summary: spot.hours.summary(),
                open_label: spot.is_open.label(),
                image_url: spot.image_url.clone(),
                selected: selected.as_ref() == Some(&spot.id),
            })
            .collect()
    }

    pub fn markers(&self) -> Vec<MapMarker> {
        let selected = self.focus.selected();
        self.inner()
            .visible
            .iter()
            .filter_map(|spot| {
                Some(MapMarker {
                    id: spot.id.clone(),
                    coordinate: spot.coordinate()?,
                    title: spot.name.clone(),
                    open_label: spot.is_open.label(),
                    rating_text: format!("{:.1}", spot.rating),
                    highlighted: selected.as_ref() == Some(&spot.id),
                })
            })
            .collect()
    }

    /// "You are here" marker
    pub fn user_marker(&self) -> Option<Coordinate> {
        self.focus.user_position()
    }

    /// Select a visible spot (row or marker click) and fly to it
    pub fn select(&self, spot_id: &SpotId) -> Result<FocusSignal> {
        let spot = self
            .inner()
            .visible
            .iter()
            .find(|s| &s.id == spot_id)
            .cloned()
            .ok_or_else(|| SyncError::Validation(format!("spot {} is not visible", spot_id)))?;
        self.focus.select(&spot)
    }

    /// Locate the device; a late answer after teardown is dropped
    pub async fn locate(&self, locator: &dyn Geolocator) -> Result<Option<Coordinate>> {
        let Some(position) = self.scope.run(locator.current_position()).await else {
            debug!("Position arrived after teardown, dropped");
            return Ok(None);
        };
        self.focus.apply_position(position).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use super::*;
    use crate::focus::{FixedLocator, GeolocationError};
    use crate::transport::mock::MockTransport;
    use crate::transport::TransportError;

    /// Answers only once released
    struct HeldLocator {
        release: Mutex<Option<oneshot::Receiver<()>>>,
        position: Coordinate,
    }

    #[async_trait]
    impl Geolocator for HeldLocator {
        async fn current_position(&self) -> std::result::Result<Coordinate, GeolocationError> {
            let release = self.release.lock().unwrap().take();
            if let Some(release) = release {
                let _ = release.await;
            }
            Ok(self.position)
        }
    }

    fn payload() -> serde_json::Value {
        json!([
            {"id": 1, "name": "Leavey Library", "type": "Library", "rating": 4.5,
             "isOpen": 1, "hours": "Monday: 24 hours", "position": [34.0217, -118.2829]},
            {"id": 2, "name": "Cafe 84", "type": "Cafe", "rating": "3.2",
             "isOpen": 0, "position": [34.0250, -118.2850]},
            {"id": 3, "name": "Virtual Room", "rating": 5},
            {"name": "no id"}
        ])
    }

    fn setup() -> (Arc<MockTransport>, ServiceClient, SpotDirectory) {
        let mock = Arc::new(MockTransport::new());
        (
            mock.clone(),
            ServiceClient::new(mock),
            SpotDirectory::new(EventBus::new(64)),
        )
    }

    #[tokio::test]
    async fn test_load_derives_rows_and_markers_from_same_set() {
        let (mock, client, dir) = setup();
        mock.reply(Ok(Some(payload())));

        assert_eq!(dir.load(&client).await.unwrap(), 3);
        assert_eq!(dir.state(), DirectoryState::Ready);
        assert_eq!(dir.spots().len(), 3);

        let rows = dir.rows();
        let markers = dir.markers();
        assert_eq!(rows.len(), 2);
        let row_ids: Vec<_> = rows.iter().map(|r| r.id.clone()).collect();
        let marker_ids: Vec<_> = markers.iter().map(|m| m.id.clone()).collect();
        assert_eq!(row_ids, marker_ids);

        assert_eq!(rows[0].rating_text, "4.5");
        assert_eq!(rows[0].hours_summary, "24 hours");
        assert_eq!(rows[0].open_label, "Open");
        assert_eq!(rows[1].rating_text, "3.2");
        assert_eq!(rows[1].open_label, "Closed");
    }

    #[tokio::test]
    async fn test_criteria_change_refilters() {
        let (mock, client, dir) = setup();
        mock.reply(Ok(Some(payload())));
        dir.load(&client).await.unwrap();

        dir.set_search_term("cafe");
        assert_eq!(dir.visible().len(), 1);
        dir.set_search_term("");
        dir.set_open_only(true);
        assert_eq!(dir.rows().len(), 1);
        assert_eq!(dir.markers()[0].id, SpotId::Int(1));
        dir.set_min_rating(9);
        assert_eq!(dir.criteria().min_rating, 5);
        assert!(dir.visible().is_empty());
    }

    #[tokio::test]
    async fn test_load_failure_shows_placeholder() {
        let (mock, client, dir) = setup();
        mock.reply(Err(TransportError::Network("offline".into())));

        assert!(dir.load(&client).await.is_err());
        assert_eq!(
            dir.state(),
            DirectoryState::Failed {
                message: LOAD_FAILED_MESSAGE.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_bad_shape_shows_placeholder() {
        let (mock, client, dir) = setup();
        mock.reply(Ok(Some(json!({"unexpected": true}))));

        assert!(matches!(dir.load(&client).await, Err(SyncError::Shape(_))));
        assert_eq!(
            dir.state(),
            DirectoryState::Failed {
                message: BAD_SHAPE_MESSAGE.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_selection_highlights_marker_and_row() {
        let (mock, client, dir) = setup();
        mock.reply(Ok(Some(payload())));
        dir.load(&client).await.unwrap();

        let signal = dir.select(&SpotId::Int(2)).unwrap();
        assert_eq!(signal.coordinate.latitude, 34.0250);
        assert!(dir.markers().iter().any(|m| m.id == SpotId::Int(2) && m.highlighted));
        assert!(dir.rows().iter().filter(|r| r.selected).count() == 1);

        // Not mappable, never visible
        assert!(dir.select(&SpotId::Int(3)).is_err());
    }

    #[tokio::test]
    async fn test_locate_keeps_visible_set() {
        let (mock, client, dir) = setup();
        mock.reply(Ok(Some(payload())));
        dir.load(&client).await.unwrap();
        let before = dir.visible();

        let here = Coordinate::new(34.0, -118.0).unwrap();
        assert_eq!(dir.locate(&FixedLocator(here)).await.unwrap(), Some(here));
        assert_eq!(dir.user_marker(), Some(here));
        assert_eq!(dir.visible(), before);
    }

    #[tokio::test]
    async fn test_locate_after_teardown_changes_nothing() {
        let (_mock, _client, dir) = setup();
        let mut rx = dir.events.subscribe();
        let (release, held) = oneshot::channel();
        let locator = HeldLocator {
            release: Mutex::new(Some(held)),
            position: Coordinate::new(34.0, -118.0).unwrap(),
        };

        let locate = dir.locate(&locator);
        let close = async {
            dir.teardown();
            let _ = release.send(());
        };
        let (located, ()) = tokio::join!(locate, close);

        assert_eq!(located.unwrap(), None);
        assert_eq!(dir.user_marker(), None);
        assert_eq!(dir.focus().peek_focus(), None);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_load_after_teardown_changes_nothing() {
        let (mock, client, dir) = setup();
        mock.reply(Ok(Some(payload())));
        let release = mock.gate(0);

        let load = dir.load(&client);
        let close = async {
            dir.teardown();
            let _ = release.send(());
        };
        let (loaded, ()) = tokio::join!(load, close);

        assert_eq!(loaded.unwrap(), 0);
        assert_eq!(dir.state(), DirectoryState::Loading);
        assert!(dir.spots().is_empty());
    }
}

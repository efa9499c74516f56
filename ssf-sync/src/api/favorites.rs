//! `/favorites` endpoints

use serde_json::{json, Value};
use ssf_common::normalize::{normalize_favorites, NormalizedList};
use ssf_common::{Spot, SpotId};
use tracing::debug;

use super::{require_id, ServiceClient};
use crate::error::Result;

impl ServiceClient {
    /// `GET /favorites`, normalized into spots
    pub async fn list_favorites(&self) -> Result<NormalizedList<Spot>> {
        let payload = self.transport().get("/favorites").await?;
        let list = normalize_favorites(&payload.unwrap_or(Value::Null));
        debug!(count = list.items.len(), "Fetched favorites");
        Ok(list)
    }

    /// `POST /favorites {spotId, favorite}`
    ///
    /// The service answers with an empty body; whatever it does send is
    /// returned as-is.
    pub async fn set_favorite(&self, spot_id: &SpotId, favorite: bool) -> Result<Option<Value>> {
        require_id(spot_id, "toggleFavorite")?;
        let body = json!({ "spotId": spot_id.to_json(), "favorite": favorite });
        Ok(self.transport().post("/favorites", body).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::transport::mock::MockTransport;

    #[tokio::test]
    async fn test_set_favorite_body() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(Ok(None));

        let client = ServiceClient::new(mock.clone());
        assert_eq!(client.set_favorite(&SpotId::Int(3), true).await.unwrap(), None);

        let call = &mock.calls()[0];
        assert_eq!(call.path, "/favorites");
        assert_eq!(call.body, Some(json!({"spotId": 3, "favorite": true})));
    }

    #[tokio::test]
    async fn test_list_favorites_accepts_envelope() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(Ok(Some(json!({"favorites": [{"_id": "a", "title": "Cafe"}, {"name": "no id"}]}))));

        let list = ServiceClient::new(mock).list_favorites().await.unwrap();
        assert!(list.shape_ok);
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].name, "Cafe");
        assert_eq!(list.skipped, 1);
    }
}

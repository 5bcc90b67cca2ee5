use async_trait::async_trait;
use log::warn;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{ PointId, SearchPointsBuilder };
use qdrant_client::Qdrant;
use serde_json::{ Map, Value as JsonValue };

use super::{ VectorStore, VectorStoreError };
use crate::models::retrieval::RetrievedRecord;

pub const BACKEND: &str = "qdrant";

/// Payload key holding the professor name. Falls back to the point id.
const IDENTIFIER_FIELD: &str = "professor";

pub struct QdrantStore {
    client: Qdrant,
    collection: String,
}

impl QdrantStore {
    pub fn new(
        url: &str,
        api_key: Option<String>,
        collection: String
    ) -> Result<Self, VectorStoreError> {
        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .build()
            .map_err(|e| VectorStoreError::Config { backend: BACKEND, message: e.to_string() })?;
        Ok(Self { client, collection })
    }
}

fn point_id_string(id: Option<&PointId>) -> String {
    id.and_then(|pid| match &pid.point_id_options {
        Some(PointIdOptions::Uuid(s)) => Some(s.clone()),
        Some(PointIdOptions::Num(n)) => Some(n.to_string()),
        None => None,
    }).unwrap_or_default()
}

fn identifier_for(payload: &Map<String, JsonValue>, fallback: String) -> String {
    match payload.get(IDENTIFIER_FIELD) {
        Some(JsonValue::String(s)) if !s.is_empty() => s.clone(),
        _ => fallback,
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize
    ) -> Result<Vec<RetrievedRecord>, VectorStoreError> {
        let response = self.client
            .search_points(
                SearchPointsBuilder::new(&self.collection, vector.to_vec(), top_k as u64)
                    .with_payload(true)
            ).await
            .map_err(|e| VectorStoreError::Backend { backend: BACKEND, message: e.to_string() })?;

        let records = response.result
            .into_iter()
            .map(|point| {
                let mut map = Map::new();
                for (k, v) in point.payload {
                    match serde_json::to_value(v) {
                        Ok(val) => {
                            map.insert(k, val);
                        }
                        Err(err) => warn!("Skipping field '{}' in match payload: {}", k, err),
                    }
                }
                let id = identifier_for(&map, point_id_string(point.id.as_ref()));
                RetrievedRecord::from_metadata(id, point.score, &map)
            })
            .collect();

        Ok(records)
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }
}

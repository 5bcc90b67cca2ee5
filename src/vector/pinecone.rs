//! Pinecone data-plane client.
//!
//! Talks to the index host over REST (`POST /query`). When no host is
//! configured it is resolved once at startup through the control plane
//! (`GET /indexes/{name}`).

use async_trait::async_trait;
use log::info;
use reqwest::header::{ HeaderMap, HeaderValue };
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use serde_json::{ Map, Value };

use super::{ VectorStore, VectorStoreError };
use crate::models::retrieval::RetrievedRecord;

pub const BACKEND: &str = "pinecone";
const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";

pub struct PineconeStore {
    http: HttpClient,
    host: String,
    namespace: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "str::is_empty")]
    namespace: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

impl PineconeStore {
    pub fn new(api_key: &str, host: &str, namespace: String) -> Result<Self, VectorStoreError> {
        Ok(Self {
            http: build_http(api_key)?,
            host: normalize_host(host),
            namespace,
        })
    }

    /// Builds a client for `index_name`, looking up its host if `host` is `None`.
    pub async fn connect(
        api_key: String,
        index_name: &str,
        host: Option<String>,
        namespace: String
    ) -> Result<Self, VectorStoreError> {
        let host = match host.filter(|h| !h.trim().is_empty()) {
            Some(h) => h,
            None => {
                let http = build_http(&api_key)?;
                let resolved = describe_index_host(&http, CONTROL_PLANE_URL, index_name).await?;
                info!("Resolved Pinecone index '{}' to host {}", index_name, resolved);
                resolved
            }
        };
        Self::new(&api_key, &host, namespace)
    }
}

fn build_http(api_key: &str) -> Result<HttpClient, VectorStoreError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        "Api-Key",
        HeaderValue::from_str(api_key).map_err(|e| VectorStoreError::Config {
            backend: BACKEND,
            message: format!("Invalid API key format: {}", e),
        })?
    );
    headers.insert("X-Pinecone-API-Version", HeaderValue::from_static(API_VERSION));
    HttpClient::builder()
        .default_headers(headers)
        .build()
        .map_err(|source| VectorStoreError::Http { backend: BACKEND, source })
}

async fn describe_index_host(
    http: &HttpClient,
    control_plane: &str,
    index_name: &str
) -> Result<String, VectorStoreError> {
    let url = format!("{}/indexes/{}", control_plane.trim_end_matches('/'), index_name);
    let resp = http
        .get(&url)
        .send().await
        .and_then(|r| r.error_for_status())
        .map_err(|source| VectorStoreError::Http { backend: BACKEND, source })?
        .json::<DescribeIndexResponse>().await
        .map_err(|source| VectorStoreError::Http { backend: BACKEND, source })?;
    Ok(resp.host)
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

fn into_records(resp: QueryResponse) -> Vec<RetrievedRecord> {
    resp.matches
        .into_iter()
        .map(|m| {
            let metadata = m.metadata.unwrap_or_default();
            RetrievedRecord::from_metadata(m.id, m.score, &metadata)
        })
        .collect()
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize
    ) -> Result<Vec<RetrievedRecord>, VectorStoreError> {
        let req = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace: &self.namespace,
        };
        let resp = self.http
            .post(format!("{}/query", self.host))
            .json(&req)
            .send().await
            .and_then(|r| r.error_for_status())
            .map_err(|source| VectorStoreError::Http { backend: BACKEND, source })?
            .json::<QueryResponse>().await
            .map_err(|source| VectorStoreError::Http { backend: BACKEND, source })?;

        Ok(into_records(resp))
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }
}

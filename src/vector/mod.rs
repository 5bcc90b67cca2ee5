pub mod pinecone;
pub mod qdrant;

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::cli::Args;
use crate::models::retrieval::RetrievedRecord;
use self::pinecone::PineconeStore;
use self::qdrant::QdrantStore;

/// Nearest-neighbour lookup over stored review embeddings.
///
/// Implementations return matches in the order the backend ranked them;
/// callers rely on that order and do not re-sort.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize
    ) -> Result<Vec<RetrievedRecord>, VectorStoreError>;

    fn backend(&self) -> &'static str;
}

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("{backend} store misconfigured: {message}")]
    Config { backend: &'static str, message: String },

    #[error("{backend} request failed: {source}")]
    Http {
        backend: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{backend} query failed: {message}")]
    Backend { backend: &'static str, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorType {
    Pinecone,
    Qdrant,
}

impl FromStr for VectorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pinecone" => Ok(VectorType::Pinecone),
            "qdrant" => Ok(VectorType::Qdrant),
            _ => Err(format!("Unsupported vector store type: {}", s)),
        }
    }
}

impl fmt::Display for VectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorType::Pinecone => write!(f, "pinecone"),
            VectorType::Qdrant => write!(f, "qdrant"),
        }
    }
}

pub async fn create_vector_store(args: &Args) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    let vector_type = args.vector_type.parse::<VectorType>().map_err(|message| {
        VectorStoreError::Config { backend: "vector", message }
    })?;

    let store: Arc<dyn VectorStore> = match vector_type {
        VectorType::Pinecone => {
            let api_key = args.pinecone_api_key.clone().filter(|k| !k.trim().is_empty()).ok_or_else(|| {
                VectorStoreError::Config {
                    backend: pinecone::BACKEND,
                    message: "PINECONE_API_KEY is required".to_string(),
                }
            })?;
            let store = PineconeStore::connect(
                api_key,
                &args.vector_index_name,
                args.vector_host.clone(),
                args.vector_namespace.clone()
            ).await?;
            Arc::new(store)
        }
        VectorType::Qdrant => {
            let url = args.vector_host.clone().unwrap_or_else(|| "http://localhost:6334".to_string());
            let store = QdrantStore::new(
                &url,
                args.qdrant_api_key.clone(),
                args.vector_index_name.clone()
            )?;
            Arc::new(store)
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vector_types() {
        assert_eq!("Pinecone".parse::<VectorType>().unwrap(), VectorType::Pinecone);
        assert_eq!("qdrant".parse::<VectorType>().unwrap(), VectorType::Qdrant);
        assert!("redis".parse::<VectorType>().is_err());
    }
}

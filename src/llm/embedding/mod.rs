pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;

use super::{ LlmConfig, LlmError, LlmType };
use self::ollama::OllamaEmbeddingClient;
use self::openai::OpenAIEmbeddingClient;

#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    pub embedding: Vec<f32>,
}

/// Turns query text into a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<EmbeddingResponse, LlmError>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn EmbeddingClient>, LlmError> {
    let client: Arc<dyn EmbeddingClient> = match config.llm_type {
        LlmType::Ollama => {
            let specific_client = OllamaEmbeddingClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIEmbeddingClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

fn single_embedding(
    provider: &'static str,
    mut embeddings: Vec<Vec<f32>>
) -> Result<EmbeddingResponse, LlmError> {
    let embedding = embeddings.pop().ok_or_else(|| LlmError::Embedding {
        provider,
        message: "embedding generation returned no results".to_string(),
    })?;
    if embedding.is_empty() {
        return Err(LlmError::Embedding {
            provider,
            message: "embedding vector is empty".to_string(),
        });
    }
    Ok(EmbeddingResponse { embedding })
}

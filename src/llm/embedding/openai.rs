use async_trait::async_trait;
use rllm::{ builder::{ LLMBackend, LLMBuilder }, LLMProvider };
use super::super::{ LlmConfig, LlmError };
use super::{ single_embedding, EmbeddingClient, EmbeddingResponse };

const PROVIDER: &str = "openai";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

pub struct OpenAIEmbeddingClient {
    llm: Box<dyn LLMProvider + Send + Sync>,
}

impl OpenAIEmbeddingClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>
    ) -> Result<Self, LlmError> {
        let model_name = model.unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());

        let mut builder = LLMBuilder::new()
            .backend(LLMBackend::OpenAI)
            .api_key(api_key)
            .model(&model_name);

        if let Some(url) = base_url {
            builder = builder.base_url(url);
        }

        let llm = builder.build().map_err(|e| LlmError::Config {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        Ok(Self { llm })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or_else(|| LlmError::Config {
            provider: PROVIDER,
            message: "API key is required for embeddings".to_string(),
        })?;

        Self::new(api_key, config.embedding_model.clone(), config.base_url.clone())
    }
}

#[async_trait]
impl EmbeddingClient for OpenAIEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<EmbeddingResponse, LlmError> {
        let embeddings = self.llm
            .embed(vec![text.to_string()]).await
            .map_err(|e| LlmError::Embedding { provider: PROVIDER, message: e.to_string() })?;
        single_embedding(PROVIDER, embeddings)
    }
}

use crate::config::prompt::PromptConfig;
use crate::llm::chat::{ ChatClient, ChatStream };
use crate::llm::embedding::EmbeddingClient;
use crate::llm::LlmError;
use crate::models::chat::{ Message, Role };
use crate::models::retrieval::RetrievedRecord;
use crate::rag::augment;
use crate::vector::{ VectorStore, VectorStoreError };

use log::{ info, warn };
use std::sync::Arc;
use thiserror::Error;

/// Number of reviews retrieved per turn.
pub const TOP_K: usize = 3;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("embedding failed: {0}")]
    Embedding(#[source] LlmError),

    #[error("vector store query failed: {0}")]
    VectorStore(#[source] VectorStoreError),

    #[error("completion failed: {0}")]
    Completion(#[source] LlmError),
}

/// The prompt for one turn plus the records that went into it.
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    pub records: Vec<RetrievedRecord>,
    pub prompt: Vec<Message>,
}

/// Embed, retrieve, augment, then stream. One upstream call of each kind per
/// turn and no retries.
#[derive(Clone)]
pub struct RagEngine {
    embedding_client: Arc<dyn EmbeddingClient>,
    vector_store: Arc<dyn VectorStore>,
    chat_client: Arc<dyn ChatClient>,
    prompt_config: Arc<PromptConfig>,
}

impl RagEngine {
    pub fn new(
        embedding_client: Arc<dyn EmbeddingClient>,
        vector_store: Arc<dyn VectorStore>,
        chat_client: Arc<dyn ChatClient>,
        prompt_config: Arc<PromptConfig>
    ) -> Self {
        Self {
            embedding_client,
            vector_store,
            chat_client,
            prompt_config,
        }
    }

    pub async fn prepare(&self, history: &[Message]) -> Result<PreparedTurn, RagError> {
        let last = history
            .last()
            .ok_or_else(|| RagError::InvalidRequest("message history is empty".to_string()))?;
        if last.role != Role::User {
            warn!("Newest message has role '{}', treating it as the query anyway", last.role);
        }

        let embed_resp = self.embedding_client.embed(&last.content).await.map_err(RagError::Embedding)?;

        let records = self.vector_store
            .query(&embed_resp.embedding, TOP_K).await
            .map_err(RagError::VectorStore)?;
        let prompt = augment
            ::build_prompt(&self.prompt_config.system_prompt, history, &records)
            .ok_or_else(|| RagError::InvalidRequest("message history is empty".to_string()))?;

        Ok(PreparedTurn { records, prompt })
    }

    /// Runs the retrieval steps and opens the completion stream.
    pub async fn stream_answer(&self, history: &[Message]) -> Result<ChatStream, RagError> {
        let turn = self.prepare(history).await?;
        info!(
            "Retrieved {} match(es) from {}: {:?}",
            turn.records.len(),
            self.vector_store.backend(),
            turn.records.iter().map(|r| (r.identifier.as_str(), r.score)).collect::<Vec<_>>()
        );
        self.chat_client.stream_chat(&turn.prompt).await.map_err(RagError::Completion)
    }

    pub fn chat_model(&self) -> String {
        self.chat_client.get_model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::embedding::EmbeddingResponse;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::Mutex;

    struct FixedEmbedding {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingClient for FixedEmbedding {
        async fn embed(&self, text: &str) -> Result<EmbeddingResponse, LlmError> {
            self.seen.lock().unwrap().push(text.to_string());
            if self.fail {
                return Err(LlmError::Embedding { provider: "fake", message: "quota".into() });
            }
            Ok(EmbeddingResponse { embedding: vec![0.1, 0.2, 0.3] })
        }
    }

    struct FixedStore {
        queries: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl VectorStore for FixedStore {
        async fn query(
            &self,
            _vector: &[f32],
            top_k: usize
        ) -> Result<Vec<RetrievedRecord>, VectorStoreError> {
            self.queries.lock().unwrap().push(top_k);
            Ok(
                ["A", "B", "C"]
                    .iter()
                    .map(|id| RetrievedRecord {
                        identifier: id.to_string(),
                        course: "CS".into(),
                        rating: Some(4.0),
                        review: "ok".into(),
                        score: 0.9,
                    })
                    .collect()
            )
        }

        fn backend(&self) -> &'static str {
            "fake"
        }
    }

    struct EchoChat {
        prompts: Mutex<Vec<Vec<Message>>>,
    }

    #[async_trait]
    impl ChatClient for EchoChat {
        async fn stream_chat(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            let items: Vec<Result<String, LlmError>> = vec![Ok("Hello".to_string()), Ok(" world".to_string())];
            Ok(Box::pin(futures::stream::iter(items)))
        }

        fn get_model(&self) -> String {
            "echo".into()
        }
    }

    fn engine(fail_embedding: bool) -> (RagEngine, Arc<FixedEmbedding>, Arc<FixedStore>, Arc<EchoChat>) {
        let embedding = Arc::new(FixedEmbedding { seen: Mutex::new(vec![]), fail: fail_embedding });
        let store = Arc::new(FixedStore { queries: Mutex::new(vec![]) });
        let chat = Arc::new(EchoChat { prompts: Mutex::new(vec![]) });
        let engine = RagEngine::new(
            embedding.clone(),
            store.clone(),
            chat.clone(),
            Arc::new(PromptConfig::default())
        );
        (engine, embedding, store, chat)
    }

    #[tokio::test]
    async fn embeds_the_latest_message_and_asks_for_three() {
        let (engine, embedding, store, chat) = engine(false);
        let history = vec![Message::user("Who teaches algorithms well?")];

        let stream = engine.stream_answer(&history).await.unwrap();
        let text: Vec<String> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(text.concat(), "Hello world");

        assert_eq!(*embedding.seen.lock().unwrap(), vec!["Who teaches algorithms well?".to_string()]);
        assert_eq!(*store.queries.lock().unwrap(), vec![TOP_K]);

        let prompts = chat.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0][0].role, Role::System);
        assert!(prompts[0][1].content.contains("Professor: C"));
    }

    #[tokio::test]
    async fn empty_history_is_invalid() {
        let (engine, embedding, _, _) = engine(false);
        let err = engine.prepare(&[]).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidRequest(_)));
        assert!(embedding.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn embedding_failure_stops_before_retrieval() {
        let (engine, _, store, chat) = engine(true);
        let err = engine.prepare(&[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
        assert!(store.queries.lock().unwrap().is_empty());
        assert!(chat.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn prepared_turn_keeps_store_order() {
        let (engine, _, _, _) = engine(false);
        let turn = engine.prepare(&[Message::user("kind graders?")]).await.unwrap();

        let ids: Vec<&str> = turn.records.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(turn.prompt.len(), 2);
    }
}

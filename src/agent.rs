//! Startup wiring: builds each upstream client once and hands them to the
//! retrieval engine.

use crate::cli::Args;
use crate::config::prompt;
use crate::llm::chat::{ ChatClient, new_client as new_chat_client };
use crate::llm::embedding::{ EmbeddingClient, new_client as new_embedding_client };
use crate::llm::{ LlmConfig, LlmType };
use crate::rag::rag::RagEngine;
use crate::vector::{ create_vector_store, VectorStore };

use log::info;
use std::error::Error;
use std::sync::Arc;

fn embedding_config(args: &Args) -> Result<LlmConfig, Box<dyn Error + Send + Sync>> {
    let llm_type: LlmType = args.embedding_llm_type.parse()?;
    Ok(LlmConfig {
        llm_type,
        base_url: args.embedding_base_url.clone(),
        api_key: args.embedding_key(),
        embedding_model: args.embedding_model.clone(),
        completion_model: None,
    })
}

fn chat_config(args: &Args) -> Result<LlmConfig, Box<dyn Error + Send + Sync>> {
    let llm_type: LlmType = args.chat_llm_type.parse()?;
    Ok(LlmConfig {
        llm_type,
        base_url: args.chat_base_url.clone(),
        api_key: args.chat_key(),
        completion_model: args.chat_model.clone(),
        embedding_model: None,
    })
}

pub fn initialize_llm_clients(
    args: &Args
) -> Result<(Arc<dyn EmbeddingClient>, Arc<dyn ChatClient>), Box<dyn Error + Send + Sync>> {
    let embedding_config = embedding_config(args)?;
    let embedding_client = new_embedding_client(&embedding_config)?;
    info!(
        "Embedding client configured: Type={}, Model={:?}, BaseURL={:?}",
        embedding_config.llm_type,
        embedding_config.embedding_model.as_deref().unwrap_or("adapter default"),
        embedding_config.base_url.as_deref().unwrap_or("adapter default")
    );

    let chat_config = chat_config(args)?;
    let chat_client = new_chat_client(&chat_config)?;
    info!(
        "Chat client configured: Type={}, Model={}, BaseURL={:?}",
        chat_config.llm_type,
        chat_client.get_model(),
        chat_config.base_url.as_deref().unwrap_or("adapter default")
    );

    Ok((embedding_client, chat_client))
}

pub async fn initialize_vector_store(
    args: &Args
) -> Result<Arc<dyn VectorStore>, Box<dyn Error + Send + Sync>> {
    info!(
        "Connecting to {} vector store, index '{}'",
        args.vector_type,
        args.vector_index_name
    );
    let store = create_vector_store(args).await?;
    Ok(store)
}

pub async fn build_engine(args: &Args) -> Result<RagEngine, Box<dyn Error + Send + Sync>> {
    let (embedding_client, chat_client) = initialize_llm_clients(args)?;
    let vector_store = initialize_vector_store(args).await?;
    let prompt_config = prompt::load_prompts(args.system_prompt_path.as_deref())?;

    Ok(RagEngine::new(embedding_client, vector_store, chat_client, prompt_config))
}

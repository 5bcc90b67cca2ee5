pub mod agent;
pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod rag;
pub mod relay;
pub mod server;
pub mod vector;

use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Embedding LLM Type: {}", args.embedding_llm_type);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Vector Store Type: {}", args.vector_type);
    info!("Vector Index: {} (namespace {})", args.vector_index_name, args.vector_namespace);
    info!("Vector Host: {}", args.vector_host.as_deref().unwrap_or("resolved at startup"));
    info!("Request Timeout: {}s", args.request_timeout_secs);
    info!("System Prompt: {}", args.system_prompt_path.as_deref().unwrap_or("built-in"));
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let engine = Arc::new(agent::build_engine(&args).await?);
    info!("Completion model: {}", engine.chat_model());

    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, engine, args);
    server.run().await?;

    Ok(())
}

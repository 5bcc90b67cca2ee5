use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Provider Credentials ---
    /// OpenAI API key, used for both embeddings and chat unless overridden.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Pinecone API key for the vector index.
    #[arg(long, env = "PINECONE_API_KEY", hide_env_values = true)]
    pub pinecone_api_key: Option<String>,

    /// Qdrant API key, only used when VECTOR_TYPE=qdrant.
    #[arg(long, env = "QDRANT_API_KEY", hide_env_values = true)]
    pub qdrant_api_key: Option<String>,

    // --- Embedding LLM Provider Args ---
    /// Type of LLM provider for text embedding (openai, ollama)
    #[arg(long, env = "EMBEDDING_LLM_TYPE", default_value = "openai")]
    pub embedding_llm_type: String,

    /// Base URL for the Embedding LLM provider API
    #[arg(long, env = "EMBEDDING_BASE_URL")]
    pub embedding_base_url: Option<String>,

    /// API Key for the Embedding LLM provider. Defaults to OPENAI_API_KEY.
    #[arg(long, env = "EMBEDDING_API_KEY", hide_env_values = true)]
    pub embedding_api_key: Option<String>,

    /// Model name for text embedding (e.g., text-embedding-3-small, nomic-embed-text)
    #[arg(long, env = "EMBEDDING_MODEL")]
    pub embedding_model: Option<String>,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")]
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider. Defaults to OPENAI_API_KEY.
    #[arg(long, env = "CHAT_API_KEY", hide_env_values = true)]
    pub chat_api_key: Option<String>,

    /// Model name for chat completion (e.g., gpt-4o-mini, llama3.1)
    #[arg(long, env = "CHAT_MODEL")]
    pub chat_model: Option<String>,

    // --- Vector Store Args ---
    /// Vector database type (pinecone, qdrant)
    #[arg(short = 't', long, env = "VECTOR_TYPE", default_value = "pinecone")]
    pub vector_type: String,

    /// Vector database host. For Pinecone this is the index host; when unset it is looked up by index name.
    #[arg(long, env = "VECTOR_HOST")]
    pub vector_host: Option<String>,

    /// Index (Pinecone) or collection (Qdrant) holding the review embeddings
    #[arg(long, env = "VECTOR_INDEX_NAME", default_value = "rag")]
    pub vector_index_name: String,

    /// Namespace inside the Pinecone index
    #[arg(long, env = "VECTOR_NAMESPACE", default_value = "ns1")]
    pub vector_namespace: String,

    // --- Server Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    /// Deadline for one /api/chat request, from arrival to the last streamed byte.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "120")]
    pub request_timeout_secs: u64,

    /// Optional file replacing the built-in assistant persona.
    #[arg(long, env = "SYSTEM_PROMPT_PATH")]
    pub system_prompt_path: Option<String>,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    pub fn embedding_key(&self) -> Option<String> {
        non_empty(self.embedding_api_key.as_ref()).or_else(|| non_empty(self.openai_api_key.as_ref()))
    }

    pub fn chat_key(&self) -> Option<String> {
        non_empty(self.chat_api_key.as_ref()).or_else(|| non_empty(self.openai_api_key.as_ref()))
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).cloned()
}

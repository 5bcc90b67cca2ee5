use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use async_trait::async_trait;
use super::{ http_stream_generate, ChatClient, ChatStream, LineOutcome };
use crate::llm::{ LlmConfig, LlmError, LlmType };
use crate::models::chat::Message;

const PROVIDER: &str = "ollama";

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
struct StreamResponse {
    message: Option<StreamMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Deserialize)]
struct StreamMessage {
    #[serde(default)]
    content: String,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, completion_model: Option<String>) -> Self {
        let model = completion_model.unwrap_or_else(|| "llama3.1".to_string());
        let url = base_url.unwrap_or_else(|| "http://localhost:11434".into());

        Self {
            http: HttpClient::new(),
            base_url: url,
            completion_model: model,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.llm_type != LlmType::Ollama {
            return Err(LlmError::Config {
                provider: PROVIDER,
                message: "Invalid config type for OllamaClient".to_string(),
            });
        }

        Ok(Self::new(config.base_url.clone(), config.completion_model.clone()))
    }
}

/// Decodes one NDJSON line of an `/api/chat` stream.
pub fn parse_ndjson_line(line: &str) -> LineOutcome {
    let line = line.trim();
    if line.is_empty() {
        return LineOutcome::Skip;
    }
    match serde_json::from_str::<StreamResponse>(line) {
        Ok(resp) => {
            if let Some(err) = resp.error {
                return LineOutcome::Failed(err);
            }
            let text = resp.message.map(|m| m.content).unwrap_or_default();
            match (text.is_empty(), resp.done) {
                (false, _) => LineOutcome::Fragment(text),
                (true, true) => LineOutcome::Done,
                (true, false) => LineOutcome::Skip,
            }
        }
        Err(e) => {
            log::debug!("JSON parse error: {} for line: {}", e, line);
            LineOutcome::Skip
        }
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn stream_chat(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let req = ChatRequest {
            model: &self.completion_model,
            messages,
            stream: true,
        };
        let request = self.http.post(&url).json(&req);
        http_stream_generate(PROVIDER, request, parse_ndjson_line).await
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }
}

use async_trait::async_trait;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ http_stream_generate, ChatClient, ChatStream, LineOutcome };
use crate::llm::{ LlmConfig, LlmError };
use crate::models::chat::Message;

const PROVIDER: &str = "openai";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    error: Option<OpenAIStreamError>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIStreamError {
    message: String,
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>
    ) -> Result<Self, LlmError> {
        let chat_model = model.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());
        let api_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e| LlmError::Config {
                provider: PROVIDER,
                message: format!("Invalid API key format: {}", e),
            })?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| LlmError::http(PROVIDER, e))?;

        Ok(Self {
            http,
            model: chat_model,
            base_url: api_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or_else(|| LlmError::Config {
            provider: PROVIDER,
            message: "API key is required for chat completions".to_string(),
        })?;

        Self::new(api_key, config.completion_model.clone(), config.base_url.clone())
    }

    fn completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        }
    }
}

/// Decodes one server-sent-event line of a chat completion stream.
pub fn parse_sse_line(line: &str) -> LineOutcome {
    let data = match line.strip_prefix("data:") {
        Some(data) => data.trim_start(),
        None => return LineOutcome::Skip,
    };
    if data == "[DONE]" {
        return LineOutcome::Done;
    }

    match serde_json::from_str::<OpenAIStreamResponse>(data) {
        Ok(resp) => {
            if let Some(err) = resp.error {
                return LineOutcome::Failed(err.message);
            }
            let text: String = resp.choices
                .into_iter()
                .filter_map(|choice| choice.delta.content)
                .collect();
            if text.is_empty() {
                LineOutcome::Skip
            } else {
                LineOutcome::Fragment(text)
            }
        }
        Err(e) => {
            log::debug!("JSON parse error: {} for data: {}", e, data);
            LineOutcome::Skip
        }
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn stream_chat(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let req = OpenAIChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| OpenAIMessage { role: m.role.as_str(), content: &m.content })
                .collect(),
            stream: true,
        };

        let request = self.http.post(self.completions_url()).json(&req);
        http_stream_generate(PROVIDER, request, parse_sse_line).await
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_delta_content() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert_eq!(parse_sse_line(line), LineOutcome::Fragment("Hel".into()));
    }

    #[test]
    fn role_only_and_blank_lines_are_skipped() {
        assert_eq!(parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#), LineOutcome::Skip);
        assert_eq!(parse_sse_line(""), LineOutcome::Skip);
        assert_eq!(parse_sse_line(": keep-alive"), LineOutcome::Skip);
    }

    #[test]
    fn done_marker_and_errors() {
        assert_eq!(parse_sse_line("data: [DONE]"), LineOutcome::Done);
        assert_eq!(
            parse_sse_line(r#"data: {"error":{"message":"overloaded"}}"#),
            LineOutcome::Failed("overloaded".into())
        );
    }

    #[test]
    fn completions_url_accepts_base_or_full_url() {
        let client = OpenAIChatClient::new("k".into(), None, None).unwrap();
        assert_eq!(client.completions_url(), "https://api.openai.com/v1/chat/completions");

        let client = OpenAIChatClient::new(
            "k".into(),
            None,
            Some("http://proxy/v1/chat/completions/".into())
        ).unwrap();
        assert_eq!(client.completions_url(), "http://proxy/v1/chat/completions");
        assert_eq!(client.get_model(), DEFAULT_CHAT_MODEL);
    }
}

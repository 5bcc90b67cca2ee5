pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use futures::{ Stream, StreamExt };
use log::{ debug, warn };
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{ LlmConfig, LlmError, LlmType };
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use crate::models::chat::Message;

/// Ordered text fragments from a streaming completion.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Fragments held between the upstream reader task and the consumer.
const UPSTREAM_BUFFER: usize = 32;

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Opens a streaming completion for `messages`.
    ///
    /// Connection and HTTP status failures are returned here, before any
    /// fragment is produced. Failures after that arrive as an `Err` item and
    /// end the stream.
    async fn stream_chat(&self, messages: &[Message]) -> Result<ChatStream, LlmError>;

    fn get_model(&self) -> String;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// What one line of a provider's streaming body means.
#[derive(Debug, PartialEq, Eq)]
pub enum LineOutcome {
    Skip,
    Fragment(String),
    Done,
    Failed(String),
}

/// Splits a byte stream into lines, holding a trailing partial line until
/// the rest of it arrives.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Sends `request`, checks the status, then hands the body to a reader task
/// that turns each line into fragments with `line_parser`.
///
/// The reader task stops as soon as the returned stream is dropped, which
/// drops the upstream response and releases its connection.
pub async fn http_stream_generate(
    provider: &'static str,
    request: reqwest::RequestBuilder,
    line_parser: fn(&str) -> LineOutcome,
) -> Result<ChatStream, LlmError> {
    let resp = request.send().await.map_err(|e| LlmError::http(provider, e))?;
    let resp = resp.error_for_status().map_err(|e| LlmError::http(provider, e))?;

    let (tx, rx) = mpsc::channel(UPSTREAM_BUFFER);

    tokio::spawn(async move {
        let mut bytes = resp.bytes_stream();
        let mut lines = LineBuffer::default();

        loop {
            let chunk = tokio::select! {
                _ = tx.closed() => {
                    debug!("{} stream consumer dropped, abandoning upstream", provider);
                    return;
                }
                chunk = bytes.next() => chunk,
            };

            let buf = match chunk {
                Some(Ok(buf)) => buf,
                Some(Err(e)) => {
                    let _ = tx.send(Err(LlmError::http(provider, e))).await;
                    return;
                }
                None => break,
            };

            for line in lines.push(&buf) {
                if !forward_line(provider, &tx, line_parser(&line)).await {
                    return;
                }
            }
        }

        if let Some(line) = lines.finish() {
            forward_line(provider, &tx, line_parser(&line)).await;
        }
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}

/// Returns false once the stream should stop.
async fn forward_line(
    provider: &'static str,
    tx: &mpsc::Sender<Result<String, LlmError>>,
    outcome: LineOutcome,
) -> bool {
    match outcome {
        LineOutcome::Skip => true,
        LineOutcome::Fragment(text) => {
            if text.is_empty() {
                return true;
            }
            tx.send(Ok(text)).await.is_ok()
        }
        LineOutcome::Done => false,
        LineOutcome::Failed(message) => {
            warn!("{} reported a mid-stream error: {}", provider, message);
            let _ = tx.send(Err(LlmError::Response { provider, message })).await;
            false
        }
    }
}

use async_trait::async_trait;
use bytes::Bytes;
use futures::{ Stream, StreamExt };
use log::debug;
use reqwest::Client as HttpClient;
use std::pin::Pin;

use super::RelayError;
use crate::models::chat::Message;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, RelayError>> + Send>>;

/// Sends a conversation to the chat endpoint and yields the raw reply bytes.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, history: &[Message]) -> Result<ByteStream, RelayError>;
}

pub struct HttpTransport {
    http: HttpClient,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(HttpClient::new(), endpoint)
    }

    pub fn with_client(http: HttpClient, endpoint: impl Into<String>) -> Self {
        Self { http, endpoint: endpoint.into() }
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, history: &[Message]) -> Result<ByteStream, RelayError> {
        debug!("POST {} with {} message(s)", self.endpoint, history.len());
        let resp = self.http
            .post(&self.endpoint)
            .json(history)
            .send().await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| RelayError::Transport(e.to_string())));
        Ok(Box::pin(stream))
    }
}

//! Forwarding of completion fragments onto an HTTP response body.

use bytes::Bytes;
use futures::StreamExt;
use log::{ info, warn };
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::llm::chat::ChatStream;
use crate::llm::LlmError;

/// One fragment in flight: the next is not read until this one is taken.
const RELAY_BUFFER: usize = 1;

/// Why a response body ended in an error state.
#[derive(Debug, Error)]
pub enum StreamTruncated {
    #[error("upstream completion failed mid-stream: {0}")]
    Upstream(#[source] LlmError),

    #[error("request deadline exceeded while streaming")]
    Deadline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Completed,
    ClientGone,
    Upstream,
    Deadline,
}

pub type BodyStream = ReceiverStream<Result<Bytes, StreamTruncated>>;

/// Spawns the relay task and returns the body side of it.
///
/// Non-empty fragments are passed through in arrival order. The task stops
/// polling `upstream` and drops it as soon as the body is dropped (client
/// disconnect) or `deadline` passes.
pub fn forward_fragments(request_id: Uuid, upstream: ChatStream, deadline: Instant) -> BodyStream {
    let (tx, rx) = mpsc::channel(RELAY_BUFFER);
    tokio::spawn(async move {
        let (end, fragments) = relay(upstream, &tx, deadline).await;
        match end {
            StreamEnd::Completed =>
                info!("[{}] stream completed after {} fragment(s)", request_id, fragments),
            other =>
                warn!("[{}] stream ended early ({:?}) after {} fragment(s)", request_id, other, fragments),
        }
    });
    ReceiverStream::new(rx)
}

async fn relay(
    mut upstream: ChatStream,
    tx: &mpsc::Sender<Result<Bytes, StreamTruncated>>,
    deadline: Instant
) -> (StreamEnd, usize) {
    let sleep = tokio::time::sleep_until(deadline);
    tokio::pin!(sleep);
    let mut fragments = 0usize;

    let end = loop {
        tokio::select! {
            biased;
            _ = tx.closed() => break StreamEnd::ClientGone,
            _ = &mut sleep => {
                // A reader that stopped pulling may leave no room for the error.
                let _ = tx.try_send(Err(StreamTruncated::Deadline));
                break StreamEnd::Deadline;
            }
            next = upstream.next() => match next {
                Some(Ok(text)) => {
                    if text.is_empty() {
                        continue;
                    }
                    fragments += 1;
                    match tokio::time::timeout_at(deadline, tx.send(Ok(Bytes::from(text)))).await {
                        Ok(Ok(())) => {}
                        Ok(Err(_)) => break StreamEnd::ClientGone,
                        Err(_) => {
                            let _ = tx.try_send(Err(StreamTruncated::Deadline));
                            break StreamEnd::Deadline;
                        }
                    }
                }
                Some(Err(e)) => {
                    let _ = tokio::time::timeout_at(
                        deadline,
                        tx.send(Err(StreamTruncated::Upstream(e)))
                    ).await;
                    break StreamEnd::Upstream;
                }
                None => break StreamEnd::Completed,
            }
        }
    };
    drop(upstream);
    (end, fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    #[tokio::test]
    async fn passes_fragments_in_order_and_drops_empty_ones() {
        let items: Vec<Result<String, LlmError>> = vec![Ok("Hello".to_string()), Ok(String::new()), Ok(" ".into()), Ok("world".into())];
        let upstream: ChatStream = Box::pin(futures::stream::iter(items));
        let body = forward_fragments(Uuid::new_v4(), upstream, far_deadline());

        let chunks: Vec<Bytes> = body.map(|r| r.unwrap()).collect().await;
        assert_eq!(chunks, vec![Bytes::from("Hello"), Bytes::from(" "), Bytes::from("world")]);
    }

    #[tokio::test]
    async fn upstream_error_terminates_the_body_with_an_error() {
        let items: Vec<Result<String, LlmError>> = vec![
            Ok("partial".to_string()),
            Err(LlmError::Response { provider: "fake", message: "reset".into() }),
            Ok("never sent".to_string())
        ];
        let upstream: ChatStream = Box::pin(futures::stream::iter(items));
        let mut body = forward_fragments(Uuid::new_v4(), upstream, far_deadline());

        assert_eq!(body.next().await.unwrap().unwrap(), Bytes::from("partial"));
        assert!(matches!(body.next().await, Some(Err(StreamTruncated::Upstream(_)))));
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn deadline_truncates_a_stalled_stream() {
        let upstream: ChatStream = Box::pin(futures::stream::pending::<Result<String, LlmError>>());
        let deadline = Instant::now() + Duration::from_millis(50);
        let mut body = forward_fragments(Uuid::new_v4(), upstream, deadline);
        assert!(matches!(body.next().await, Some(Err(StreamTruncated::Deadline))));
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn dropping_the_body_releases_the_upstream() {
        let (up_tx, up_rx) = mpsc::channel::<Result<String, LlmError>>(4);
        let upstream: ChatStream = Box::pin(ReceiverStream::new(up_rx));
        let mut body = forward_fragments(Uuid::new_v4(), upstream, far_deadline());

        up_tx.send(Ok("first".into())).await.unwrap();
        assert_eq!(body.next().await.unwrap().unwrap(), Bytes::from("first"));

        drop(body);
        tokio::time::timeout(Duration::from_secs(5), up_tx.closed()).await
            .expect("upstream should be dropped once the client is gone");
    }

    #[tokio::test]
    async fn deadline_releases_upstream_when_body_is_never_read() {
        let (up_tx, up_rx) = mpsc::channel::<Result<String, LlmError>>(4);
        let upstream: ChatStream = Box::pin(ReceiverStream::new(up_rx));
        let deadline = Instant::now() + Duration::from_millis(50);
        let _body = forward_fragments(Uuid::new_v4(), upstream, deadline);

        for text in ["one", "two", "three"] {
            up_tx.send(Ok(text.into())).await.unwrap();
        }
        tokio::time::timeout(Duration::from_secs(2), up_tx.closed()).await
            .expect("upstream should be dropped once the deadline passes");
    }
}

//! Client side of a chat turn.
//!
//! [`ChatRelay`] owns the visible conversation. A submit appends the user
//! message and an empty assistant placeholder, posts the history, and appends
//! every decoded reply fragment onto that placeholder. Views subscribe to
//! [`RelaySnapshot`] updates to redraw (and scroll) on each change.

pub mod decoder;
pub mod transport;

use futures::StreamExt;
use log::{ info, warn };
use std::sync::{ Mutex, MutexGuard, PoisonError };
use thiserror::Error;
use tokio::sync::watch;

use crate::models::chat::{ Message, Role };
use self::decoder::Utf8Decoder;
pub use self::transport::{ ByteStream, ChatTransport, HttpTransport };

pub const GREETING: &str = "Hi, I am the Rate My Professor support assistant. How can I help you?";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("a reply is still streaming; wait for it to finish")]
    Busy,

    #[error("transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    Idle,
    Sending,
    Streaming,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelaySnapshot {
    pub messages: Vec<Message>,
    pub phase: RelayPhase,
    pub loading: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank draft, nothing sent.
    Ignored,
    /// The reply stream ended normally.
    Completed,
    /// The request or the reply stream failed. Partial text stays in place.
    Interrupted,
}

/// Conversation state without any I/O.
#[derive(Debug, Clone)]
pub struct RelayState {
    messages: Vec<Message>,
    draft: String,
    phase: RelayPhase,
    loading: bool,
}

impl RelayState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            draft: String::new(),
            phase: RelayPhase::Idle,
            loading: false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn phase(&self) -> RelayPhase {
        self.phase
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Starts a turn from the current draft.
    ///
    /// Returns the history to send (ending with the new user message), or
    /// `None` when the draft is blank. Fails with `Busy` while a turn is in
    /// flight, leaving state untouched.
    pub fn begin_turn(&mut self) -> Result<Option<Vec<Message>>, RelayError> {
        if self.phase != RelayPhase::Idle {
            return Err(RelayError::Busy);
        }
        if self.draft.trim().is_empty() {
            return Ok(None);
        }

        let content = std::mem::take(&mut self.draft);
        self.messages.push(Message::user(content));
        let outgoing = self.messages.clone();
        self.messages.push(Message::assistant(""));
        self.phase = RelayPhase::Sending;
        self.loading = true;
        Ok(Some(outgoing))
    }

    pub fn mark_streaming(&mut self) {
        if self.phase == RelayPhase::Sending {
            self.phase = RelayPhase::Streaming;
        }
    }

    /// Appends `text` to the last message. Earlier messages are never touched.
    pub fn append_fragment(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.messages.last_mut() {
            last.content.push_str(text);
        }
    }

    pub fn finish_turn(&mut self) {
        self.phase = RelayPhase::Idle;
        self.loading = false;
    }

    pub fn snapshot(&self) -> RelaySnapshot {
        RelaySnapshot {
            messages: self.messages.clone(),
            phase: self.phase,
            loading: self.loading,
        }
    }
}

pub struct ChatRelay<T> {
    transport: T,
    state: Mutex<RelayState>,
    updates: watch::Sender<RelaySnapshot>,
}

impl<T: ChatTransport> ChatRelay<T> {
    /// A relay whose conversation opens with the assistant greeting.
    pub fn new(transport: T) -> Self {
        Self::with_messages(transport, vec![Message::assistant(GREETING)])
    }

    pub fn with_messages(transport: T, messages: Vec<Message>) -> Self {
        let state = RelayState::new(messages);
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            transport,
            state: Mutex::new(state),
            updates,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RelaySnapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> RelaySnapshot {
        self.lock().snapshot()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.lock().set_draft(text);
    }

    /// Sends the current draft and streams the reply into the conversation.
    ///
    /// Transport and stream failures are not returned as errors: the turn
    /// ends, loading clears, and whatever text arrived stays visible. The
    /// same holds when the returned future is dropped before completion.
    pub async fn submit(&self) -> Result<SubmitOutcome, RelayError> {
        let outgoing = match self.update(|state| state.begin_turn())? {
            Some(history) => history,
            None => {
                return Ok(SubmitOutcome::Ignored);
            }
        };
        let turn = OpenTurn { relay: self, open: true };

        let mut stream = match self.transport.send(&outgoing).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Chat request failed: {}", e);
                turn.close("");
                return Ok(SubmitOutcome::Interrupted);
            }
        };
        self.update(|state| state.mark_streaming());

        let mut decoder = Utf8Decoder::default();
        let mut outcome = SubmitOutcome::Completed;
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    let text = decoder.decode(&bytes);
                    if !text.is_empty() {
                        self.update(|state| state.append_fragment(&text));
                    }
                }
                Err(e) => {
                    warn!("Reply stream ended with an error: {}", e);
                    outcome = SubmitOutcome::Interrupted;
                    break;
                }
            }
        }
        drop(stream);

        turn.close(&decoder.finish());
        info!("Turn finished: {:?}", outcome);
        Ok(outcome)
    }

    fn lock(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `f` under the lock and publishes the resulting snapshot.
    fn update<R>(&self, f: impl FnOnce(&mut RelayState) -> R) -> R {
        let (result, snapshot) = {
            let mut state = self.lock();
            let result = f(&mut state);
            (result, state.snapshot())
        };
        self.updates.send_replace(snapshot);
        result
    }
}

/// Returns the relay to Idle when a turn ends, including when the `submit`
/// future is dropped mid-turn.
struct OpenTurn<'a, T: ChatTransport> {
    relay: &'a ChatRelay<T>,
    open: bool,
}

impl<T: ChatTransport> OpenTurn<'_, T> {
    fn close(mut self, tail: &str) {
        self.open = false;
        self.relay.update(|state| {
            state.append_fragment(tail);
            state.finish_turn();
        });
    }
}

impl<T: ChatTransport> Drop for OpenTurn<'_, T> {
    fn drop(&mut self) {
        if self.open {
            warn!("Turn cancelled before the reply finished");
            self.relay.update(|state| state.finish_turn());
        }
    }
}

impl RelaySnapshot {
    /// The assistant message currently being written, if a turn is open.
    pub fn streaming_reply(&self) -> Option<&Message> {
        if !self.loading {
            return None;
        }
        self.messages.last().filter(|m| m.role == Role::Assistant)
    }
}

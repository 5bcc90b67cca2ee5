//! Terminal front end for the chat relay.

use clap::Parser;
use dotenv::dotenv;
use log::error;
use professor_rag::models::chat::Role;
use professor_rag::relay::{ ChatRelay, HttpTransport, RelaySnapshot, SubmitOutcome };
use std::error::Error;
use std::io::Write;
use tokio::io::{ AsyncBufReadExt, BufReader };
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(author, version, about = "Chat with the professor finder from a terminal")]
struct ChatArgs {
    /// URL of the chat endpoint.
    #[arg(long, env = "CHAT_ENDPOINT", default_value = "http://127.0.0.1:3000/api/chat")]
    endpoint: String,
}

/// Tracks how much of the conversation has reached the terminal.
///
/// Works from whatever snapshot it is given, so coalesced updates (a whole
/// turn arriving at once) print the same text as a fragment-by-fragment feed.
struct Transcript {
    done: usize,
    printed: usize,
    started: bool,
}

impl Transcript {
    fn new(already_shown: usize) -> Self {
        Self { done: already_shown, printed: 0, started: false }
    }

    fn advance(&mut self, snap: &RelaySnapshot) -> String {
        let mut out = String::new();
        let last = snap.messages.len().saturating_sub(1);

        for (i, message) in snap.messages.iter().enumerate().skip(self.done) {
            if message.role != Role::Assistant {
                self.done = i + 1;
                continue;
            }
            if !self.started {
                out.push_str("assistant> ");
                self.started = true;
            }
            if message.content.len() > self.printed {
                out.push_str(&message.content[self.printed..]);
                self.printed = message.content.len();
            }
            if i < last || !snap.loading {
                out.push('\n');
                self.done = i + 1;
                self.printed = 0;
                self.started = false;
            }
        }
        out
    }
}

async fn render(mut updates: watch::Receiver<RelaySnapshot>, mut transcript: Transcript) {
    while updates.changed().await.is_ok() {
        let snap = updates.borrow_and_update().clone();
        emit(&transcript.advance(&snap));
    }
    let snap = updates.borrow().clone();
    emit(&transcript.advance(&snap));
}

fn emit(text: &str) {
    if text.is_empty() {
        return;
    }
    print!("{}", text);
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = ChatArgs::parse();

    let relay = ChatRelay::new(HttpTransport::new(args.endpoint));
    let opening = relay.snapshot().messages;
    for message in &opening {
        println!("{}> {}", message.role, message.content);
    }
    let view = tokio::spawn(render(relay.subscribe(), Transcript::new(opening.len())));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        relay.set_draft(line);
        match relay.submit().await {
            Ok(SubmitOutcome::Interrupted) => error!("The reply was cut short"),
            Ok(_) => {}
            Err(e) => error!("{}", e),
        }
    }

    // Closing the relay ends the view once it has printed the last reply.
    drop(relay);
    view.await?;
    Ok(())
}

use async_trait::async_trait;
use axum::body::{ to_bytes, Body };
use axum::http::{ header::CONTENT_TYPE, Request, StatusCode };
use futures::stream;
use professor_rag::config::prompt::PromptConfig;
use professor_rag::llm::chat::{ ChatClient, ChatStream };
use professor_rag::llm::embedding::{ EmbeddingClient, EmbeddingResponse };
use professor_rag::llm::LlmError;
use professor_rag::models::chat::{ Message, Role };
use professor_rag::models::retrieval::RetrievedRecord;
use professor_rag::rag::rag::RagEngine;
use professor_rag::relay::{ ChatRelay, HttpTransport, SubmitOutcome };
use professor_rag::server::api::{ router, AppState };
use professor_rag::vector::{ VectorStore, VectorStoreError };
use std::sync::{ Arc, Mutex };
use std::time::Duration;
use tower::ServiceExt;

struct FakeEmbedding {
    fail: bool,
}

#[async_trait]
impl EmbeddingClient for FakeEmbedding {
    async fn embed(&self, _text: &str) -> Result<EmbeddingResponse, LlmError> {
        if self.fail {
            return Err(LlmError::Embedding { provider: "fake", message: "unavailable".into() });
        }
        Ok(EmbeddingResponse { embedding: vec![0.5; 8] })
    }
}

struct FakeStore;

#[async_trait]
impl VectorStore for FakeStore {
    async fn query(
        &self,
        _vector: &[f32],
        top_k: usize
    ) -> Result<Vec<RetrievedRecord>, VectorStoreError> {
        assert_eq!(top_k, 3);
        Ok(
            vec![
                RetrievedRecord {
                    identifier: "Dr. A".into(),
                    course: "CS101".into(),
                    rating: Some(5.0),
                    review: "great".into(),
                    score: 0.9,
                },
                RetrievedRecord {
                    identifier: "Dr. B".into(),
                    course: "CS201".into(),
                    rating: Some(4.0),
                    review: "clear".into(),
                    score: 0.8,
                },
                RetrievedRecord {
                    identifier: "Dr. C".into(),
                    course: "CS301".into(),
                    rating: Some(3.0),
                    review: "ok".into(),
                    score: 0.7,
                }
            ]
        )
    }

    fn backend(&self) -> &'static str {
        "fake"
    }
}

/// Replays fixed fragments, optionally failing after them.
struct FakeChat {
    fragments: Vec<&'static str>,
    fail_after: bool,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl FakeChat {
    fn new(fragments: Vec<&'static str>) -> Self {
        Self { fragments, fail_after: false, prompts: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn stream_chat(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        let mut items: Vec<Result<String, LlmError>> = self.fragments
            .iter()
            .map(|f| Ok(f.to_string()))
            .collect();
        if self.fail_after {
            items.push(Err(LlmError::Response { provider: "fake", message: "reset".into() }));
        }
        Ok(Box::pin(stream::iter(items)))
    }

    fn get_model(&self) -> String {
        "fake-model".to_string()
    }
}

fn app(embedding: FakeEmbedding, chat: Arc<FakeChat>) -> axum::Router {
    let engine = RagEngine::new(
        Arc::new(embedding),
        Arc::new(FakeStore),
        chat,
        Arc::new(PromptConfig::default())
    );
    router(AppState::new(Arc::new(engine), Duration::from_secs(5)))
}

fn chat_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn streams_augmented_answer() {
    let chat = Arc::new(FakeChat::new(vec!["Dr. A ", "is ", "great."]));
    let app = app(FakeEmbedding { fail: false }, Arc::clone(&chat));

    let resp = app
        .oneshot(chat_request(r#"[{"role":"user","content":"Who teaches algorithms well?"}]"#)).await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()[CONTENT_TYPE].to_str().unwrap().starts_with("text/plain"));

    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"Dr. A is great.");

    let prompts = chat.prompts.lock().unwrap();
    let prompt = &prompts[0];
    assert_eq!(prompt.len(), 2);
    assert_eq!(prompt[0].role, Role::System);
    assert_eq!(prompt[1].role, Role::User);
    let text = &prompt[1].content;
    assert!(text.starts_with("Who teaches algorithms well?"));
    assert!(text.contains("Returned results from vector db (done automatically):"));
    let a = text.find("Dr. A").unwrap();
    let b = text.find("Dr. B").unwrap();
    let c = text.find("Dr. C").unwrap();
    assert!(a < b && b < c);
}

#[tokio::test]
async fn earlier_messages_pass_through_verbatim() {
    let chat = Arc::new(FakeChat::new(vec!["ok"]));
    let app = app(FakeEmbedding { fail: false }, Arc::clone(&chat));

    let body =
        r#"[{"role":"assistant","content":"Hi"},{"role":"user","content":"first"},{"role":"assistant","content":"reply"},{"role":"user","content":"second"}]"#;
    let resp = app.oneshot(chat_request(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let _ = to_bytes(resp.into_body(), usize::MAX).await.unwrap();

    let prompts = chat.prompts.lock().unwrap();
    let prompt = &prompts[0];
    assert_eq!(prompt.len(), 5);
    assert_eq!(prompt[1], Message::assistant("Hi"));
    assert_eq!(prompt[2], Message::user("first"));
    assert_eq!(prompt[3], Message::assistant("reply"));
    assert!(prompt[4].content.starts_with("second"));
}

#[tokio::test]
async fn empty_history_is_rejected() {
    let chat = Arc::new(FakeChat::new(vec!["never"]));
    let app = app(FakeEmbedding { fail: false }, Arc::clone(&chat));

    let resp = app.oneshot(chat_request("[]")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "invalid_request");
    assert!(chat.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let app = app(FakeEmbedding { fail: false }, Arc::new(FakeChat::new(vec![])));

    let resp = app.oneshot(chat_request(r#"[{"role":"robot","content":"hi"}]"#)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn embedding_failure_is_bad_gateway() {
    let chat = Arc::new(FakeChat::new(vec!["never"]));
    let app = app(FakeEmbedding { fail: true }, Arc::clone(&chat));

    let resp = app
        .oneshot(chat_request(r#"[{"role":"user","content":"anyone?"}]"#)).await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "upstream_error");
    assert!(chat.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn mid_stream_failure_aborts_body() {
    let chat = Arc::new(FakeChat {
        fragments: vec!["partial "],
        fail_after: true,
        prompts: Mutex::new(Vec::new()),
    });
    let app = app(FakeEmbedding { fail: false }, chat);

    let resp = app
        .oneshot(chat_request(r#"[{"role":"user","content":"tell me"}]"#)).await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(to_bytes(resp.into_body(), usize::MAX).await.is_err());
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app(FakeEmbedding { fail: false }, Arc::new(FakeChat::new(vec![])));

    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn relay_builds_reply_over_http() {
    let app = app(FakeEmbedding { fail: false }, Arc::new(FakeChat::new(vec!["Try ", "Dr. A"])));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let relay = ChatRelay::new(HttpTransport::new(format!("http://{}/api/chat", addr)));
    relay.set_draft("Who teaches algorithms well?");
    let outcome = relay.submit().await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Completed);

    let snap = relay.snapshot();
    assert!(!snap.loading);
    assert_eq!(snap.messages.len(), 3);
    assert_eq!(snap.messages[1], Message::user("Who teaches algorithms well?"));
    assert_eq!(snap.messages[2], Message::assistant("Try Dr. A"));
}

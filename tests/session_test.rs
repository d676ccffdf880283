//! Chat session behaviour: local echo, busy flag, failure turns, transports.

use async_trait::async_trait;
use ollama_relay::client::{
    ChatSession, DirectTransport, HttpRelayTransport, RelayTransport, SendError, TransportError,
};
use ollama_relay::config::{ Configuration, UpstreamConfig };
use ollama_relay::models::chat::{ Role, Turn };
use ollama_relay::models::relay::RelayRequest;
use ollama_relay::relay::Relay;
use ollama_relay::server::{ build_router, AppState };
use serde_json::json;
use std::sync::atomic::{ AtomicBool, AtomicUsize, Ordering };
use std::sync::{ Arc, Mutex, OnceLock, Weak };
use std::time::Duration;
use tokio::sync::Notify;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{ body_json, method, path },
};

#[derive(Default)]
struct RecordingTransport {
    requests: Mutex<Vec<RelayRequest>>,
}

#[async_trait]
impl RelayTransport for RecordingTransport {
    async fn send(&self, request: RelayRequest) -> Result<String, TransportError> {
        let n = request.messages.len();
        self.requests.lock().unwrap().push(request);
        Ok(format!("reply to {} turn(s)", n))
    }
}

/// Blocks inside `send` until `release` is notified.
struct GatedTransport {
    entered: Notify,
    release: Notify,
    outcome: Result<String, String>,
}

impl GatedTransport {
    fn new(outcome: Result<String, String>) -> Self {
        Self { entered: Notify::new(), release: Notify::new(), outcome }
    }
}

#[async_trait]
impl RelayTransport for GatedTransport {
    async fn send(&self, _request: RelayRequest) -> Result<String, TransportError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.outcome.clone().map_err(TransportError::Rejected)
    }
}

struct FailingTransport;

#[async_trait]
impl RelayTransport for FailingTransport {
    async fn send(&self, _request: RelayRequest) -> Result<String, TransportError> {
        Err(TransportError::Rejected("connection refused".into()))
    }
}

/// Counts concurrent `send` calls and checks the owning session reports busy
/// for the whole call.
#[derive(Default)]
struct OverlapTransport {
    session: OnceLock<Weak<ChatSession>>,
    in_flight: AtomicUsize,
    overlapped: AtomicBool,
    idle_while_sending: AtomicBool,
}

impl OverlapTransport {
    fn session_busy(&self) -> bool {
        self.session
            .get()
            .and_then(Weak::upgrade)
            .map(|s| s.is_busy())
            .unwrap_or(true)
    }
}

#[async_trait]
impl RelayTransport for OverlapTransport {
    async fn send(&self, _request: RelayRequest) -> Result<String, TransportError> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        for _ in 0..4 {
            if !self.session_busy() {
                self.idle_while_sending.store(true, Ordering::SeqCst);
            }
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok("ok".into())
    }
}

#[tokio::test]
async fn send_appends_user_then_assistant() {
    let transport = Arc::new(RecordingTransport::default());
    let session = ChatSession::new(Configuration::default(), transport.clone());

    let reply = session.send_turn("hi").await.unwrap();
    assert_eq!(reply, Turn::assistant("reply to 1 turn(s)"));

    let reply = session.send_turn("and again").await.unwrap();
    assert_eq!(reply.content(), "reply to 3 turn(s)");

    let transcript = session.transcript();
    let roles: Vec<Role> = transcript.iter().map(Turn::role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn request_carries_full_transcript_and_settings() {
    let transport = Arc::new(RecordingTransport::default());
    let session = ChatSession::new(Configuration::default(), transport.clone());
    session.set_model("llama3");
    session.set_upstream_base_url("http://host:11434");

    session.send_turn("first").await.unwrap();
    session.send_turn("second").await.unwrap();

    let requests = transport.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    let last = &requests[1];
    assert_eq!(last.model, "llama3");
    assert_eq!(last.base_url.as_deref(), Some("http://host:11434"));
    assert!(!last.stream);
    let contents: Vec<&str> = last.messages.iter().map(Turn::content).collect();
    assert_eq!(contents, vec!["first", "reply to 1 turn(s)", "second"]);
}

#[tokio::test]
async fn blank_input_is_rejected_without_sending() {
    let transport = Arc::new(RecordingTransport::default());
    let session = ChatSession::new(Configuration::default(), transport.clone());

    assert_eq!(session.send_turn("").await, Err(SendError::EmptyInput));
    assert_eq!(session.send_turn("  \n\t").await, Err(SendError::EmptyInput));
    assert!(session.transcript().is_empty());
    assert!(transport.requests.lock().unwrap().is_empty());
    assert!(!session.is_busy());
}

#[tokio::test]
async fn busy_while_in_flight_and_second_send_refused() {
    let transport = Arc::new(GatedTransport::new(Ok("done".into())));
    let session = Arc::new(ChatSession::new(Configuration::default(), transport.clone()));
    assert!(!session.is_busy());

    let in_flight = {
        let session = session.clone();
        tokio::spawn(async move { session.send_turn("hi").await })
    };
    transport.entered.notified().await;

    // Local echo is visible before the reply arrives.
    let transcript = session.transcript();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript.last(), Some(&Turn::user("hi")));
    assert!(session.is_busy());

    assert_eq!(session.send_turn("again").await, Err(SendError::Busy));
    assert_eq!(session.transcript().len(), 1);

    transport.release.notify_one();
    let reply = in_flight.await.unwrap().unwrap();
    assert_eq!(reply.content(), "done");
    assert!(!session.is_busy());
    assert_eq!(session.transcript().len(), 2);
}

#[tokio::test]
async fn failure_becomes_error_turn_and_session_stays_usable() {
    let session = ChatSession::new(Configuration::default(), Arc::new(FailingTransport));

    let reply = session.send_turn("hi").await.unwrap();
    assert_eq!(reply.role(), Role::Assistant);
    assert_eq!(reply.content(), "Error connecting to Ollama: connection refused");
    assert!(!session.is_busy());

    let reply = session.send_turn("still there?").await.unwrap();
    assert_eq!(reply.role(), Role::Assistant);
    assert_eq!(session.transcript().len(), 4);
}

#[tokio::test]
async fn gated_failure_clears_busy() {
    let transport = Arc::new(GatedTransport::new(Err("upstream down".into())));
    let session = Arc::new(ChatSession::new(Configuration::default(), transport.clone()));

    let in_flight = {
        let session = session.clone();
        tokio::spawn(async move { session.send_turn("hi").await })
    };
    transport.entered.notified().await;
    assert!(session.is_busy());

    transport.release.notify_one();
    let reply = in_flight.await.unwrap().unwrap();
    assert!(reply.content().contains("upstream down"));
    assert!(!session.is_busy());
}

#[tokio::test]
async fn dropped_send_does_not_leave_session_busy() {
    let transport = Arc::new(GatedTransport::new(Ok("never".into())));
    let session = ChatSession::new(Configuration::default(), transport.clone());

    let result = tokio::time::timeout(Duration::from_millis(50), session.send_turn("hi")).await;
    assert!(result.is_err());
    assert!(!session.is_busy());
    assert_eq!(session.transcript().len(), 1);
}

#[tokio::test]
async fn submit_sends_and_clears_input_buffer() {
    let transport = Arc::new(RecordingTransport::default());
    let session = ChatSession::new(Configuration::default(), transport.clone());

    session.set_input("from the box");
    let reply = session.submit().await.unwrap();
    assert_eq!(reply.content(), "reply to 1 turn(s)");
    assert_eq!(session.input(), "");
    assert_eq!(session.transcript().as_slice()[0], Turn::user("from the box"));

    session.set_input("   ");
    assert_eq!(session.submit().await, Err(SendError::EmptyInput));
}

#[tokio::test]
async fn every_append_is_published() {
    let session = ChatSession::new(
        Configuration::default(),
        Arc::new(RecordingTransport::default())
    );
    let mut updates = session.subscribe();
    assert_eq!(*updates.borrow_and_update(), 0);

    session.send_turn("hi").await.unwrap();
    assert!(updates.has_changed().unwrap());
    assert_eq!(*updates.borrow_and_update(), 2);
}

#[tokio::test]
async fn direct_transport_reaches_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(json!({
            "model": "tinyllama",
            "messages": [{ "role": "user", "content": "hi" }],
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "content": "hello" }
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let transport = DirectTransport::new(Relay::new(), UpstreamConfig::default());
    let session = ChatSession::new(
        Configuration { upstream_base_url: upstream.uri(), model: "tinyllama".into() },
        Arc::new(transport)
    );

    let reply = session.send_turn("hi").await.unwrap();
    assert_eq!(reply, Turn::assistant("hello"));
}

async fn spawn_relay(upstream: &MockServer) -> String {
    let config = UpstreamConfig::default().with_override(upstream.uri());
    let app = build_router(AppState::new(Relay::new(), config));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn http_transport_round_trip_through_relay() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "hello over http"
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let relay_url = spawn_relay(&upstream).await;
    let transport = HttpRelayTransport::new(&relay_url);
    assert_eq!(transport.endpoint(), format!("{}/api/ollama-chat", relay_url));

    let session = ChatSession::new(Configuration::default(), Arc::new(transport));
    let reply = session.send_turn("hi").await.unwrap();
    assert_eq!(reply.content(), "hello over http");
}

#[tokio::test]
async fn http_transport_surfaces_relay_failure_text() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;

    let relay_url = spawn_relay(&upstream).await;
    let session = ChatSession::new(
        Configuration::default(),
        Arc::new(HttpRelayTransport::new(&relay_url))
    );

    let reply = session.send_turn("hi").await.unwrap();
    assert_eq!(
        reply.content(),
        "Error connecting to Ollama: Failed to connect to Ollama: Ollama API error: 500"
    );
    assert!(!session.is_busy());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_sends_never_overlap() {
    let transport = Arc::new(OverlapTransport::default());
    let session = Arc::new(ChatSession::new(Configuration::default(), transport.clone()));
    let _ = transport.session.set(Arc::downgrade(&session));

    let mut tasks = Vec::new();
    for worker in 0..8 {
        let session = session.clone();
        tasks.push(tokio::spawn(async move {
            let mut accepted: usize = 0;
            for i in 0..200 {
                match session.send_turn(&format!("w{} #{}", worker, i)).await {
                    Ok(_) => accepted += 1,
                    Err(SendError::Busy) => tokio::task::yield_now().await,
                    Err(e) => panic!("unexpected send error: {}", e),
                }
            }
            accepted
        }));
    }

    let mut accepted: usize = 0;
    for task in tasks {
        accepted += task.await.unwrap();
    }

    assert!(accepted > 0);
    assert!(!transport.overlapped.load(Ordering::SeqCst), "two sends were in flight at once");
    assert!(
        !transport.idle_while_sending.load(Ordering::SeqCst),
        "busy flag was cleared while a send was in flight"
    );
    assert!(!session.is_busy());
    assert_eq!(session.transcript().len(), accepted * 2);
}

#[tokio::test]
async fn settings_edits_are_visible_and_sessions_are_distinct() {
    let transport = Arc::new(RecordingTransport::default());
    let first = ChatSession::new(Configuration::default(), transport.clone());
    let second = ChatSession::new(Configuration::default(), transport);

    assert_eq!(first.config(), Configuration::default());
    first.set_model("llama3");
    first.set_upstream_base_url("http://ollama:11434");
    assert_eq!(
        first.config(),
        Configuration { upstream_base_url: "http://ollama:11434".into(), model: "llama3".into() }
    );
    assert_eq!(second.config().model, "tinyllama");

    assert!(!first.id().is_empty());
    assert_ne!(first.id(), second.id());
}

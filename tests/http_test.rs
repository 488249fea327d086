// tests/http_test.rs — HTTP answer source against a local stub service

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::json;

use docchat::chat::TurnStatus;
use docchat::infra::config::{Config, ServerConfig};
use docchat::infra::errors::ChatError;
use docchat::session::{ChatSession, SendOutcome};
use docchat::stream::{PacingPolicy, StreamAssembler, Utf8Mode};
use docchat::upstream::http::HttpAnswerSource;
use docchat::upstream::{AnswerSource, AskRequest};

#[derive(Deserialize)]
struct AskBody {
    question: String,
    document_id: String,
}

async fn ask(Json(body): Json<AskBody>) -> Response {
    if body.document_id == "missing" {
        return StatusCode::NOT_FOUND.into_response();
    }
    if body.question == "broken" {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    // "é" split across two chunks
    let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
        Ok(b"The document is ".to_vec()),
        Ok(b"about caf\xC3".to_vec()),
        Ok(b"\xA9s.\n".to_vec()),
    ];
    Body::from_stream(futures::stream::iter(chunks)).into_response()
}

async fn documents() -> Json<serde_json::Value> {
    Json(json!({
        "documents": [
            { "document_id": "doc-1", "filename": "cafes.pdf" },
            { "document_id": "doc-2", "filename": "trains.pdf" }
        ]
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn start_stub() -> SocketAddr {
    let app = Router::new()
        .route("/ask", post(ask))
        .route("/documents", get(documents))
        .route("/health", get(health));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn source_for(addr: SocketAddr) -> HttpAnswerSource {
    HttpAnswerSource::new(&ServerConfig {
        base_url: format!("http://{addr}"),
        connect_timeout_secs: 2,
    })
    .unwrap()
}

fn session_for(source: Arc<HttpAnswerSource>) -> ChatSession {
    ChatSession::new(source, &Config::default()).with_assembler(StreamAssembler::new(
        PacingPolicy::immediate(15),
        Duration::ZERO,
        Utf8Mode::Lossy,
    ))
}

#[tokio::test]
async fn test_list_documents_and_health() {
    let source = source_for(start_stub().await);

    let docs = source.list_documents().await.unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].document_id, "doc-1");
    assert_eq!(docs[1].filename, "trains.pdf");

    let health = source.health().await.unwrap();
    assert_eq!(health.status, "ok");
}

#[tokio::test]
async fn test_streamed_answer_lands_in_log() {
    let source = Arc::new(source_for(start_stub().await));
    let session = session_for(source.clone());
    session.set_documents(source.list_documents().await.unwrap());
    assert_eq!(session.documents().selected(), Some("doc-1"));

    let outcome = session.send("What is it about?").await;
    assert!(matches!(outcome, SendOutcome::Completed { .. }));

    let last = session.snapshot().pop().unwrap();
    assert_eq!(last.content, "The document is about cafés.\n");
    assert_eq!(last.status, TurnStatus::Complete);
}

#[tokio::test]
async fn test_unknown_document_maps_to_not_found() {
    let source = source_for(start_stub().await);
    let request = AskRequest {
        question: "Where?".into(),
        document_id: "missing".into(),
    };
    let err = source.open(&request).await.err().unwrap();
    assert!(matches!(err, ChatError::NotFound));
}

#[tokio::test]
async fn test_not_found_replaces_turn_with_reselect_message() {
    let source = Arc::new(source_for(start_stub().await));
    let session = session_for(source);
    session.select_document("missing");
    let before = session.snapshot().len();

    let outcome = session.send("Where?").await;
    assert!(matches!(
        outcome,
        SendOutcome::Failed {
            error: ChatError::NotFound,
            ..
        }
    ));
    let turns = session.snapshot();
    assert_eq!(turns.len(), before + 2);
    let last = turns.last().unwrap();
    assert_eq!(last.content, "❌ Document not found. Please reselect.");
    assert_eq!(last.status, TurnStatus::Errored);
}

#[tokio::test]
async fn test_server_error_shows_generic_message() {
    let source = Arc::new(source_for(start_stub().await));
    let session = session_for(source);
    session.select_document("doc-1");

    let outcome = session.send("broken").await;
    assert!(matches!(
        outcome,
        SendOutcome::Failed {
            error: ChatError::Http { status: 500 },
            ..
        }
    ));
    let last = session.snapshot().pop().unwrap();
    assert_eq!(last.content, "❌ Failed to get response");
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    // bind then drop to get a port nobody listens on
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let source = Arc::new(source_for(addr));

    let err = source.list_documents().await.err().unwrap();
    assert!(matches!(err, ChatError::Transport(_)));

    let session = session_for(source);
    let outcome = session.send("Hello?").await;
    assert!(matches!(
        outcome,
        SendOutcome::Failed {
            error: ChatError::Transport(_),
            ..
        }
    ));
    let last = session.snapshot().pop().unwrap();
    assert!(last.content.starts_with("❌ Cannot reach answer service"));
    assert_eq!(last.status, TurnStatus::Errored);
}

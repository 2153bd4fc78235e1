//! HTTP API gateway for tabletalk.
//!
//! Exposes the chat endpoint with its chunked streaming response plus
//! conversation management and a health check. Built on Axum.
//!
//! Clients identify themselves with the `X-Owner-Id` header; requests
//! without one fall back to the `local` owner, which keeps single-user
//! deployments headerless.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use tabletalk_core::{ChatError, MessageStore, Role};
use tabletalk_engine::{stream_text, ChatEngine, StreamClosed, StreamSink};

/// Owner assigned to requests that carry no `X-Owner-Id` header.
pub const DEFAULT_OWNER: &str = "local";

/// Shared state for all gateway routes.
pub struct AppState {
    pub engine: Arc<ChatEngine>,
    pub store: Arc<dyn MessageStore>,
}

pub type SharedState = Arc<AppState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route(
            "/conversations",
            get(list_conversations_handler).post(create_conversation_handler),
        )
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

fn owner_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-owner-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_OWNER)
        .to_string()
}

/// Request body for `POST /chat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAsk {
    pub conversation_id: i64,
    pub prompt: String,
}

/// One message in a conversation listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageView {
    pub role: Role,
    pub text: String,
}

/// One conversation in a listing, messages included.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationView {
    pub id: i64,
    pub title: String,
    pub messages: Vec<MessageView>,
}

/// Adapts the response-body channel to the streamer's sink seam.
struct ChannelSink(mpsc::Sender<String>);

#[async_trait::async_trait]
impl StreamSink for ChannelSink {
    async fn send(&mut self, data: String) -> Result<(), StreamClosed> {
        self.0.send(data).await.map_err(|_| StreamClosed)
    }
}

fn error_response(err: ChatError) -> Response {
    if err.is_client_error() {
        (StatusCode::BAD_REQUEST, err.to_string()).into_response()
    } else {
        error!(error = %err, "chat request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()).into_response()
    }
}

/// `POST /chat` — run the prompt through the engine, then stream the
/// already-persisted final reply in delimited chunks.
async fn chat_handler(
    State(state): State<SharedState>,
    Json(ask): Json<ChatAsk>,
) -> Response {
    let reply = match state.engine.ask(ask.conversation_id, &ask.prompt).await {
        Ok(reply) => reply,
        Err(err) => return error_response(err),
    };

    let (tx, rx) = mpsc::channel::<String>(16);
    tokio::spawn(async move {
        let mut sink = ChannelSink(tx);
        stream_text(&mut sink, &reply).await;
    });

    let stream = ReceiverStream::new(rx).map(|chunk| Ok::<_, Infallible>(Bytes::from(chunk)));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// `GET /conversations` — every conversation for the owner, each with
/// its displayable messages (user prompts and final replies).
async fn list_conversations_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Response {
    let owner = owner_from_headers(&headers);

    let conversations = match state.store.list_conversations(&owner).await {
        Ok(list) => list,
        Err(err) => {
            error!(error = %err, "listing conversations failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut views = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let messages = match state.store.display_messages(conversation.id).await {
            Ok(shown) => shown
                .into_iter()
                .map(|m| MessageView {
                    role: m.role,
                    text: m.text,
                })
                .collect(),
            Err(err) => {
                error!(error = %err, conversation_id = conversation.id, "loading messages failed");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        views.push(ConversationView {
            id: conversation.id,
            title: conversation.title,
            messages,
        });
    }

    Json(views).into_response()
}

/// `POST /conversations` — create a conversation titled `Chat N`, where
/// N counts the owner's existing conversations plus one.
async fn create_conversation_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Response {
    let owner = owner_from_headers(&headers);

    let count = match state.store.count_conversations(&owner).await {
        Ok(count) => count,
        Err(err) => {
            error!(error = %err, "counting conversations failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let title = format!("Chat {}", count + 1);
    match state.store.create_conversation(&owner, &title).await {
        Ok(conversation) => {
            info!(conversation_id = conversation.id, owner = %owner, "conversation created");
            Json(ConversationView {
                id: conversation.id,
                title: conversation.title,
                messages: vec![],
            })
            .into_response()
        }
        Err(err) => {
            error!(error = %err, "creating conversation failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

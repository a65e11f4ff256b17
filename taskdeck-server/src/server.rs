//! HTTP surface of the task service.
//!
//! REST routes for task CRUD and reordering, plus `/ws/tasks` which
//! upgrades to a WebSocket and streams every mutation as a live event.
//! Authentication is a bearer token carrying the user id; the WebSocket
//! takes the same token as a `?token=` query parameter since browsers
//! cannot set headers on an upgrade.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use taskdeck_proto::filter::{FilterCriteria, StatusFilter};
use taskdeck_proto::task::{ReorderRequest, Task, TaskDraft, TaskId, TaskPatch, UserId};

use crate::state::{ServerState, StateError};

/// Query parameters of the list endpoint.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ListQuery {
    search: Option<String>,
    category: Option<String>,
    status: Option<String>,
}

impl ListQuery {
    fn into_criteria(self) -> FilterCriteria {
        FilterCriteria {
            search: self.search,
            category: self.category,
            status: self.status.as_deref().map(StatusFilter::parse),
        }
    }
}

/// Builds the service router over the given state.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", axum::routing::put(update_task).delete(delete_task))
        .route("/tasks/reorder", post(reorder_tasks))
        .route("/ws/tasks", get(ws_handler))
        .with_state(state)
}

/// Starts the task service on the given address and returns the bound
/// address and a join handle.
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(ServerState::new())).await
}

/// Starts the task service with a pre-configured [`ServerState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<ServerState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "task service error");
        }
    });

    Ok((bound_addr, handle))
}

/// Extracts the user id from a `Bearer <user_id>` authorization header.
fn authorize(headers: &HeaderMap) -> Result<UserId, StatusCode> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| token.trim().parse().ok())
        .map(UserId)
        .ok_or(StatusCode::UNAUTHORIZED)
}

fn error_status(e: &StateError) -> StatusCode {
    match e {
        StateError::TitleEmpty | StateError::TitleTooLong => StatusCode::UNPROCESSABLE_ENTITY,
        StateError::UnknownTask(_) => StatusCode::NOT_FOUND,
        StateError::ReorderRejected => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn list_tasks(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Task>>, StatusCode> {
    authorize(&headers)?;
    Ok(Json(state.snapshot(&query.into_criteria()).await))
}

async fn create_task(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(draft): Json<TaskDraft>,
) -> Result<(StatusCode, Json<Task>), StatusCode> {
    let origin = authorize(&headers)?;
    let task = state
        .create(origin, draft)
        .await
        .map_err(|e| error_status(&e))?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Task>, StatusCode> {
    let origin = authorize(&headers)?;
    let task = state
        .update(origin, TaskId(id), patch)
        .await
        .map_err(|e| error_status(&e))?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<StatusCode, StatusCode> {
    let origin = authorize(&headers)?;
    state
        .delete(origin, TaskId(id))
        .await
        .map_err(|e| error_status(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reorder_tasks(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(request): Json<ReorderRequest>,
) -> Result<StatusCode, StatusCode> {
    authorize(&headers)?;
    state
        .reorder(&request.items)
        .await
        .map_err(|e| error_status(&e))?;
    Ok(StatusCode::OK)
}

/// Query parameters of the WebSocket endpoint.
#[derive(Debug, serde::Deserialize)]
struct WsQuery {
    token: Option<String>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
    Query(query): Query<WsQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id: UserId = query
        .token
        .as_deref()
        .and_then(|t| t.trim().parse().ok())
        .map(UserId)
        .ok_or(StatusCode::UNAUTHORIZED)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

/// Streams broadcast events to one client until it disconnects.
async fn handle_socket(mut socket: WebSocket, state: Arc<ServerState>, user_id: UserId) {
    tracing::info!(user_id = %user_id, "live client connected");
    let mut events = state.subscribe();
    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(frame) => {
                        if socket.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        // The client fell behind; it will catch up on its
                        // next snapshot fetch.
                        tracing::warn!(user_id = %user_id, skipped, "live client lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {
                        // Clients only listen on this socket.
                    }
                }
            }
        }
    }
    tracing::info!(user_id = %user_id, "live client disconnected");
}

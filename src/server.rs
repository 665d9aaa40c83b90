//! HTTP and WebSocket front end.
//!
//! - `GET /ws`: multiplayer games, one JSON event per text frame.
//! - `POST /api/games`, `POST /api/games/{id}/guess`: single-player games.
//! - `GET /health`: liveness check.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, info, instrument, warn};

use crate::coordinator::Coordinator;
use crate::hub::{ConnectionHub, Outbox};
use crate::protocol::{ClientEvent, ServerEvent};
use crate::session::ConnectionId;
use crate::solo::{GuessOutcome, SoloError, SoloService};

/// Shared state handed to every request.
#[derive(Debug, Clone)]
pub struct AppState {
    coordinator: Coordinator,
    hub: Arc<ConnectionHub>,
    solo: SoloService,
}

impl AppState {
    /// Bundles the coordinator, its connection hub and the solo service.
    ///
    /// `hub` must be the outbox the coordinator was built with.
    pub fn new(coordinator: Coordinator, hub: Arc<ConnectionHub>, solo: SoloService) -> Self {
        Self {
            coordinator,
            hub,
            solo,
        }
    }
}

/// Builds the application router.
#[instrument(skip(state))]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_upgrade))
        .route("/api/games", post(start_solo_game))
        .route("/api/games/{id}/guess", post(solo_guess))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket: WebSocket| {
        let (sink, stream) = socket.split();
        run_connection(sink, stream, state)
    })
}

/// Drives one connection until its inbound stream ends.
///
/// On close the coordinator sees a disconnect before the hub forgets the
/// connection.
#[instrument(skip_all, fields(connection_id))]
async fn run_connection<W, R, E>(mut sink: W, mut stream: R, state: AppState)
where
    W: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    let connection = ConnectionId::generate();
    tracing::Span::current().record("connection_id", connection.as_str());
    info!("Player connected");

    let mut outgoing = state.hub.register(connection.clone());

    let writer = tokio::spawn(async move {
        while let Some(event) = outgoing.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!(error = %e, "Failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                debug!("Socket closed while sending");
                break;
            }
        }
    });

    state.hub.send(
        &connection,
        ServerEvent::Connected {
            connection_id: connection.clone(),
        },
    );

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "Socket read failed");
                break;
            }
        };

        let event = match serde_json::from_str::<ClientEvent>(text.as_str()) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, "Unreadable client message");
                state
                    .hub
                    .send(&connection, ServerEvent::error("Unrecognised message"));
                continue;
            }
        };

        let coordinator = state.coordinator.clone();
        let from = connection.clone();
        if let Err(e) =
            tokio::task::spawn_blocking(move || coordinator.handle(&from, event)).await
        {
            error!(error = %e, "Event handler panicked");
        }
    }

    let coordinator = state.coordinator.clone();
    let from = connection.clone();
    match tokio::task::spawn_blocking(move || coordinator.disconnect(&from)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Failed to record disconnect"),
        Err(e) => error!(error = %e, "Disconnect handler panicked"),
    }

    state.hub.unregister(&connection);
    writer.abort();
    info!("Player disconnected");
}

/// Body of a single-player guess request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuessRequest {
    /// The guess. Anything but a string of three digits is rejected.
    pub guess: Option<Value>,
}

/// Error returned from the REST endpoints as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<SoloError> for ApiError {
    fn from(err: SoloError) -> Self {
        match err {
            SoloError::NotFound => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            SoloError::AlreadyWon | SoloError::MissingGuess | SoloError::InvalidGuess => {
                Self::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            SoloError::Store(e) => {
                error!(error = %e, "Solo game storage failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Guess could not be processed")
            }
        }
    }
}

#[instrument(skip(state))]
async fn start_solo_game(State(state): State<AppState>) -> Result<Response, ApiError> {
    let solo = state.solo.clone();
    let id = tokio::task::spawn_blocking(move || solo.start_game())
        .await
        .map_err(|e| {
            error!(error = %e, "Start game task failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Game could not be started")
        })?
        .map_err(|e| {
            error!(error = %e, "Failed to start solo game");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Game could not be started")
        })?;

    Ok((StatusCode::CREATED, Json(json!({ "game_id": id }))).into_response())
}

#[instrument(skip(state, body))]
async fn solo_guess(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<GuessOutcome>, ApiError> {
    let id = id.parse::<i32>().map_err(|_| SoloError::NotFound)?;
    let guess = serde_json::from_slice::<GuessRequest>(&body)
        .ok()
        .and_then(|req| req.guess);

    let solo = state.solo.clone();
    let outcome = tokio::task::spawn_blocking(move || solo.submit(id, guess.as_ref()))
        .await
        .map_err(|e| {
            error!(error = %e, "Guess task failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Guess could not be processed")
        })??;

    Ok(Json(outcome))
}

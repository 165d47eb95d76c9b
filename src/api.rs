//! HTTP API endpoints.
//!
//! Two routers: the registry service (rooms, votes, stats, matchmaking) and
//! the AI service (guess policy, chat relay). Request bodies are validated and
//! normalized here so the core only ever sees explicit values.

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::chat::ChatRelay;
use crate::guess::{GuessOutcome, GuessPolicy};
use crate::llm::{LlmConfig, LlmError, LlmProvider};
use crate::matchmaking::{MatchConfig, MatchError, MatchOutcome, Matchmaker};
use crate::registry::{Registry, RegistryError, Stats, VoteInput};
use crate::types::*;

/// Shared state of the registry service
pub struct RegistryState {
    pub registry: Arc<Registry>,
    pub matchmaker: Matchmaker,
}

impl RegistryState {
    pub fn new(match_config: MatchConfig) -> Self {
        Self::with_registry(Arc::new(Registry::new()), match_config)
    }

    /// Serve a registry that other services in this process also read
    pub fn with_registry(registry: Arc<Registry>, match_config: MatchConfig) -> Self {
        let matchmaker = Matchmaker::new(registry.clone(), match_config);
        Self {
            registry,
            matchmaker,
        }
    }
}

/// Shared state of the AI service
pub struct AiState {
    pub guess: GuessPolicy,
    pub chat: ChatRelay,
}

impl AiState {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, config: &LlmConfig) -> Self {
        Self {
            guess: GuessPolicy::from_config(provider.clone(), config),
            chat: ChatRelay::from_config(provider, config),
        }
    }
}

/// Errors mapped onto HTTP responses
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Registry(RegistryError::RoomNotFound(room_id)) => {
                tracing::debug!(room_id = %room_id, "Vote or lookup for unknown room");
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "detail": "room not found" })),
                )
                    .into_response()
            }
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::Match(e) => {
                let status = match e {
                    MatchError::WaitTimedOut(_) => StatusCode::REQUEST_TIMEOUT,
                    MatchError::Interrupted => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, Json(json!({ "error": e.to_string() }))).into_response()
            }
            ApiError::Llm(e) => {
                tracing::error!("Chat generation failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": format!("Failed to generate AI response: {}", e) })),
                )
                    .into_response()
            }
        }
    }
}

// ========== Request / response bodies ==========

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRoomRequest {
    pub room_id: RoomId,
    pub is_ai_room: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub room_id: RoomId,
    pub guess: Party,
    /// Omitted means the vote comes from a human
    #[serde(default)]
    pub voter_type: Option<Party>,
}

impl From<VoteRequest> for VoteInput {
    fn from(request: VoteRequest) -> Self {
        VoteInput {
            room_id: request.room_id,
            guess: request.guess,
            voter: request.voter_type.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponse {
    pub correct: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuessRequest {
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

fn require_room_id(room_id: &str) -> Result<(), ApiError> {
    if room_id.trim().is_empty() {
        return Err(ApiError::BadRequest("roomId must not be empty".to_string()));
    }
    Ok(())
}

// ========== Registry service ==========

pub fn registry_router(state: Arc<RegistryState>) -> Router {
    Router::new()
        .route("/", get(registry_status))
        .route("/internal/api/rooms/register", post(register_room))
        .route("/api/v1/vote", post(submit_vote))
        .route("/api/v1/stats", get(get_stats))
        .route("/api/v1/rooms/{room_id}", get(get_room))
        .route("/api/v1/match", post(find_match))
        .with_state(state)
}

async fn registry_status() -> Json<serde_json::Value> {
    Json(json!({ "status": "Voting service is up" }))
}

/// POST /internal/api/rooms/register
///
/// Creates the room, or resets it if it already exists.
pub async fn register_room(
    State(state): State<Arc<RegistryState>>,
    Json(request): Json<RegisterRoomRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_room_id(&request.room_id)?;
    state
        .registry
        .register_room(request.room_id, request.is_ai_room)
        .await;
    Ok(Json(json!({ "status": "registered" })))
}

/// POST /api/v1/vote
pub async fn submit_vote(
    State(state): State<Arc<RegistryState>>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, ApiError> {
    let correct = state.registry.submit_vote(request.into()).await?;
    Ok(Json(VoteResponse { correct }))
}

/// GET /api/v1/stats
pub async fn get_stats(State(state): State<Arc<RegistryState>>) -> Json<Stats> {
    Json(state.registry.get_stats().await)
}

/// GET /api/v1/rooms/{room_id}
///
/// Audit view of one room and its vote log.
pub async fn get_room(
    State(state): State<Arc<RegistryState>>,
    Path(room_id): Path<RoomId>,
) -> Result<Json<Room>, ApiError> {
    Ok(Json(state.registry.get_room(&room_id).await?))
}

/// POST /api/v1/match
///
/// Long-polls until the caller has a room.
pub async fn find_match(
    State(state): State<Arc<RegistryState>>,
) -> Result<Json<MatchOutcome>, ApiError> {
    Ok(Json(state.matchmaker.find_match().await?))
}

// ========== AI service ==========

pub fn ai_router(state: Arc<AiState>) -> Router {
    Router::new()
        .route("/", get(ai_status))
        .route("/api/v1/guess", post(guess))
        .route("/api/v1/chat", post(chat))
        .with_state(state)
}

async fn ai_status() -> Json<serde_json::Value> {
    Json(json!({ "status": "AI service is up" }))
}

/// POST /api/v1/guess
///
/// Always answers 200 with a verdict; upstream trouble only adds an `error` field.
pub async fn guess(
    State(state): State<Arc<AiState>>,
    Json(request): Json<GuessRequest>,
) -> Json<GuessOutcome> {
    Json(state.guess.classify(&request.history).await)
}

/// POST /api/v1/chat
pub async fn chat(
    State(state): State<Arc<AiState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let response = state.chat.reply(&request.messages).await?;
    Ok(Json(ChatResponse { response }))
}

/// CORS restricted to the game front-end, any method and header
pub fn cors_layer(origin: &str) -> Result<CorsLayer, axum::http::header::InvalidHeaderValue> {
    let origin: HeaderValue = origin.parse()?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_request_defaults_voter_to_human() {
        let request: VoteRequest =
            serde_json::from_str(r#"{"roomId":"r1","guess":"ai"}"#).unwrap();
        let input: VoteInput = request.into();
        assert_eq!(input, VoteInput::new("r1", Party::Ai, Party::Human));

        let request: VoteRequest =
            serde_json::from_str(r#"{"roomId":"r1","guess":"human","voterType":"ai"}"#).unwrap();
        let input: VoteInput = request.into();
        assert_eq!(input.voter, Party::Ai);
    }

    #[test]
    fn test_vote_request_rejects_unknown_guess() {
        let result = serde_json::from_str::<VoteRequest>(r#"{"roomId":"r1","guess":"robot"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_require_room_id() {
        assert!(require_room_id("r1").is_ok());
        assert!(matches!(
            require_room_id("  "),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_cors_layer_rejects_garbage_origin() {
        assert!(cors_layer("http://localhost:3000").is_ok());
        assert!(cors_layer("bad\norigin").is_err());
    }
}

// REST API for the chat console

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::INVESTIGATE_USAGE;
use crate::orchestrator::{Command, MiningOrchestrator, RunSummary};

/// Reply sent while another mining run holds the backend.
pub const BUSY_REPLY: &str = "Ya hay una investigación en curso.";

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<MiningOrchestrator>,
    /// Held for the whole duration of a mining run.
    mining: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(orchestrator: Arc<MiningOrchestrator>) -> Self {
        Self {
            orchestrator,
            mining: Arc::new(Mutex::new(())),
        }
    }

    fn try_begin_mining(&self) -> Result<OwnedMutexGuard<()>, StatusCode> {
        self.mining.clone().try_lock_owned().map_err(|_| {
            warn!("Rejected mining request: a run is already in progress");
            StatusCode::CONFLICT
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    /// Progress lines in emission order.
    pub log: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvestigateRequest {
    pub company: String,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub reply: String,
    pub summary: RunSummary,
    pub log: Vec<String>,
}

pub fn create_router(orchestrator: Arc<MiningOrchestrator>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/variables", get(list_variables))
        .route("/tractors", get(list_tractors))
        .route("/chat", post(chat))
        .route("/investigate", post(investigate))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(AppState::new(orchestrator))
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

async fn list_variables(State(state): State<AppState>) -> Json<Value> {
    let variables = state.orchestrator.variables();
    Json(serde_json::json!({
        "variables": variables,
        "count": variables.len(),
    }))
}

async fn list_tractors(State(state): State<AppState>) -> Json<Value> {
    let tractors = state.orchestrator.catalogue();
    Json(serde_json::json!({
        "tractors": tractors,
        "count": tractors.len(),
    }))
}

/// Same contract as the dashboard chat box: one message in, the final reply
/// plus every progress line out.
async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatMessage>,
) -> Result<Json<ChatReply>, (StatusCode, Json<ChatReply>)> {
    let command = match Command::parse(&payload.message) {
        Ok(command) => command,
        Err(_) => {
            return Ok(Json(ChatReply {
                reply: INVESTIGATE_USAGE.to_string(),
                log: Vec::new(),
            }));
        }
    };

    let _guard = if command.is_mining() {
        Some(state.try_begin_mining().map_err(|status| {
            (
                status,
                Json(ChatReply {
                    reply: BUSY_REPLY.to_string(),
                    log: Vec::new(),
                }),
            )
        })?)
    } else {
        None
    };

    let mut log: Vec<String> = Vec::new();
    let reply = state.orchestrator.execute(command, &mut log).await;
    Ok(Json(ChatReply { reply, log }))
}

/// Structured single-tractor run.
async fn investigate(
    State(state): State<AppState>,
    Json(payload): Json<InvestigateRequest>,
) -> Result<Json<RunReport>, StatusCode> {
    let _guard = state.try_begin_mining()?;

    info!("Investigate request for {} {}", payload.company, payload.model);
    let mut log: Vec<String> = Vec::new();
    let summary = state
        .orchestrator
        .run_single(&payload.company, &payload.model, &mut log)
        .await;

    Ok(Json(RunReport {
        reply: summary.to_string(),
        summary,
        log,
    }))
}

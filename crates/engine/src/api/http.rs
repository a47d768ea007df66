//! HTTP routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use storyweave_domain::{
    BranchId, ChoiceText, DomainError, GameSession, GameSessionId, PathNode, PathNodeId,
    StoryContent,
};

use crate::app::App;
use crate::use_cases::story::{PathHistory, StepInput};
use crate::use_cases::{ChoiceInput, StoryPathError};

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .route("/api/sessions", get(list_sessions).post(start_session))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/end", post(end_session))
        .route("/api/sessions/{id}/history", get(get_history))
        .route("/api/sessions/{id}/advance", post(advance))
        .route("/api/sessions/{id}/diverge", post(diverge))
        .route("/api/sessions/{id}/switch", post(switch_to))
        .route("/api/sessions/{id}/choices", post(make_choice))
        .route("/api/nodes/{id}", get(get_node))
        .route("/api/nodes/{id}/branches", get(list_sibling_branches))
        .route("/api/branches/{branch_id}/nodes", get(list_branch_nodes))
}

async fn health() -> &'static str {
    "OK"
}

// =============================================================================
// Sessions
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionRequest {
    #[serde(default)]
    character_name: Option<String>,
    opening_content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionResponse {
    session: GameSession,
    opening_node: PathNode,
}

#[derive(Debug, Deserialize)]
struct ListSessionsQuery {
    limit: Option<u32>,
}

async fn start_session(
    State(app): State<Arc<App>>,
    Json(body): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<StartSessionResponse>), ApiError> {
    let opening = StoryContent::new(body.opening_content)?;
    let started = app
        .use_cases
        .session
        .lifecycle
        .start(body.character_name, opening)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(StartSessionResponse {
            session: started.session,
            opening_node: started.opening_node,
        }),
    ))
}

async fn list_sessions(
    State(app): State<Arc<App>>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<GameSession>>, ApiError> {
    let sessions = app.use_cases.session.lifecycle.list(query.limit).await?;
    Ok(Json(sessions))
}

async fn get_session(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameSession>, ApiError> {
    let session = app
        .use_cases
        .session
        .lifecycle
        .get(GameSessionId::from_uuid(id))
        .await?;
    Ok(Json(session))
}

async fn end_session(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameSession>, ApiError> {
    let session = app
        .use_cases
        .session
        .lifecycle
        .end(GameSessionId::from_uuid(id))
        .await?;
    Ok(Json(session))
}

async fn get_history(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PathHistory>, ApiError> {
    let history = app
        .use_cases
        .story
        .timeline
        .get_path_history(GameSessionId::from_uuid(id))
        .await?;
    Ok(Json(history))
}

// =============================================================================
// Branch mutations
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepRequest {
    content: String,
    #[serde(default)]
    selected_choice_text: Option<String>,
    #[serde(default)]
    expected_current_node_id: Option<PathNodeId>,
}

impl StepRequest {
    fn into_step(self) -> Result<StepInput, ApiError> {
        let mut step = StepInput::new(StoryContent::new(self.content)?);
        if let Some(choice) = self.selected_choice_text {
            step = step.with_choice(ChoiceText::new(choice)?);
        }
        if let Some(expected) = self.expected_current_node_id {
            step = step.expecting(expected);
        }
        Ok(step)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DivergeRequest {
    from_node_id: PathNodeId,
    #[serde(flatten)]
    step: StepRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwitchRequest {
    node_id: PathNodeId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwitchResponse {
    current_node_id: PathNodeId,
    path: Vec<PathNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChoiceRequest {
    choice: String,
    #[serde(default)]
    from_node_id: Option<PathNodeId>,
    #[serde(default)]
    expected_current_node_id: Option<PathNodeId>,
}

async fn advance(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    Json(body): Json<StepRequest>,
) -> Result<(StatusCode, Json<PathNode>), ApiError> {
    let node = app
        .use_cases
        .story
        .mutations
        .advance(GameSessionId::from_uuid(id), body.into_step()?)
        .await?;
    Ok((StatusCode::CREATED, Json(node)))
}

async fn diverge(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    Json(body): Json<DivergeRequest>,
) -> Result<(StatusCode, Json<PathNode>), ApiError> {
    let node = app
        .use_cases
        .story
        .mutations
        .diverge(
            GameSessionId::from_uuid(id),
            body.from_node_id,
            body.step.into_step()?,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(node)))
}

async fn switch_to(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    Json(body): Json<SwitchRequest>,
) -> Result<Json<SwitchResponse>, ApiError> {
    let path = app
        .use_cases
        .story
        .mutations
        .switch_to(GameSessionId::from_uuid(id), body.node_id)
        .await?;
    Ok(Json(SwitchResponse {
        current_node_id: body.node_id,
        path,
    }))
}

async fn make_choice(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    Json(body): Json<ChoiceRequest>,
) -> Result<(StatusCode, Json<PathNode>), ApiError> {
    let input = ChoiceInput {
        choice: ChoiceText::new(body.choice)?,
        from_node_id: body.from_node_id,
        expected_current_node_id: body.expected_current_node_id,
    };
    let node = app
        .use_cases
        .make_choice
        .execute(GameSessionId::from_uuid(id), input)
        .await?;
    Ok((StatusCode::CREATED, Json(node)))
}

// =============================================================================
// Nodes and branches
// =============================================================================

async fn get_node(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PathNode>, ApiError> {
    let node = app
        .use_cases
        .story
        .timeline
        .get_node(PathNodeId::from_uuid(id))
        .await?;
    Ok(Json(node))
}

async fn list_sibling_branches(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<BranchId>>, ApiError> {
    let branches = app
        .use_cases
        .story
        .timeline
        .list_sibling_branches(PathNodeId::from_uuid(id))
        .await?;
    Ok(Json(branches))
}

async fn list_branch_nodes(
    State(app): State<Arc<App>>,
    Path(branch_id): Path<String>,
) -> Result<Json<Vec<PathNode>>, ApiError> {
    let branch_id = BranchId::new(branch_id)?;
    let nodes = app
        .use_cases
        .story
        .timeline
        .list_branch_nodes(&branch_id)
        .await?;
    if nodes.is_empty() {
        return Err(ApiError::NotFound(format!("Branch not found: {}", branch_id)));
    }
    Ok(Json(nodes))
}

// =============================================================================
// Errors
// =============================================================================

/// Seconds a client should wait before retrying a retriable failure.
const RETRY_AFTER_SECS: &str = "1";

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// `retry` marks conflicts that a fresh attempt may resolve
    Conflict { message: String, retry: bool },
    BadGateway(String),
    Internal(String),
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::header::RETRY_AFTER;

        match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::Conflict {
                message,
                retry: true,
            } => (
                StatusCode::CONFLICT,
                [(RETRY_AFTER, RETRY_AFTER_SECS)],
                message,
            )
                .into_response(),
            ApiError::Conflict { message, .. } => (StatusCode::CONFLICT, message).into_response(),
            ApiError::BadGateway(msg) => {
                tracing::warn!(error = %msg, "Story generation failed");
                (
                    StatusCode::BAD_GATEWAY,
                    [(RETRY_AFTER, RETRY_AFTER_SECS)],
                    "Story generation failed",
                )
                    .into_response()
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<StoryPathError> for ApiError {
    fn from(e: StoryPathError) -> Self {
        match e {
            StoryPathError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            StoryPathError::InvalidParent { .. }
            | StoryPathError::CrossSession { .. }
            | StoryPathError::Validation(_) => ApiError::BadRequest(e.to_string()),
            StoryPathError::ConcurrentMutation(_)
            | StoryPathError::SessionEnded(_)
            | StoryPathError::NoCurrentNode(_) => ApiError::Conflict {
                retry: e.is_retriable(),
                message: e.to_string(),
            },
            StoryPathError::Generation(_) => ApiError::BadGateway(e.to_string()),
            StoryPathError::BrokenChain { .. }
            | StoryPathError::CycleSuspected { .. }
            | StoryPathError::Repo(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

use axum::{
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::extract::{Json, Path, Query};
use crate::models::session::{NewSession, SessionRow, SessionUpdate};
use crate::models::Page;
use crate::state::AppState;
use crate::store::Store;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub candidate_id: Uuid,
    pub methodology_used: Option<String>,
    pub analysis_notes: Option<String>,
    pub key_observations: Option<String>,
    pub concerns_raised: Option<String>,
}

fn validate_update(update: &SessionUpdate) -> Result<(), AppError> {
    if update
        .confidence_level
        .is_some_and(|c| !(0.0..=1.0).contains(&c))
    {
        return Err(AppError::Validation(
            "Confidence level must be between 0.0 and 1.0".into(),
        ));
    }
    if update.time_spent_analyzing.is_some_and(|s| s < 0) {
        return Err(AppError::Validation(
            "Time spent must be non-negative".into(),
        ));
    }
    Ok(())
}

async fn load_session(store: &dyn Store, id: Uuid) -> Result<SessionRow, AppError> {
    store
        .session_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Analysis session not found".into()))
}

/// POST /api/v1/analysis/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionRow>), AppError> {
    state
        .store
        .candidate_by_id(req.candidate_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Candidate not found".into()))?;

    let session = state
        .store
        .insert_session(NewSession {
            candidate_id: req.candidate_id,
            researcher_id: auth.id(),
            methodology_used: req.methodology_used,
            analysis_notes: req.analysis_notes,
            key_observations: req.key_observations,
            concerns_raised: req.concerns_raised,
        })
        .await?;

    info!(
        "Researcher {} opened analysis session {} on candidate {}",
        auth.id(),
        session.id,
        session.candidate_id
    );
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/v1/analysis/sessions/me
pub async fn handle_my_sessions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<Page>,
) -> Result<Json<Vec<SessionRow>>, AppError> {
    Ok(Json(
        state
            .store
            .sessions_by_researcher(auth.id(), page.normalized())
            .await?,
    ))
}

/// GET /api/v1/analysis/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionRow>, AppError> {
    Ok(Json(load_session(state.store.as_ref(), id).await?))
}

/// PUT /api/v1/analysis/sessions/:id
pub async fn handle_update_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(update): Json<SessionUpdate>,
) -> Result<Json<SessionRow>, AppError> {
    let existing = load_session(state.store.as_ref(), id).await?;
    if existing.researcher_id != auth.id() {
        return Err(AppError::Forbidden(
            "Not authorized to update this session".into(),
        ));
    }
    validate_update(&update)?;

    let updated = state
        .store
        .update_session(id, update)
        .await?
        .ok_or_else(|| AppError::NotFound("Analysis session not found".into()))?;
    Ok(Json(updated))
}

/// DELETE /api/v1/analysis/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let existing = load_session(state.store.as_ref(), id).await?;
    if existing.researcher_id != auth.id() {
        return Err(AppError::Forbidden(
            "Not authorized to delete this session".into(),
        ));
    }
    if !state.store.delete_session(id).await? {
        return Err(AppError::NotFound("Analysis session not found".into()));
    }
    info!("Researcher {} deleted analysis session {}", auth.id(), id);
    Ok(Json(json!({ "message": "Analysis session deleted successfully" })))
}

/// GET /api/v1/analysis/sessions/candidate/:id
pub async fn handle_candidate_sessions(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(candidate_id): Path<Uuid>,
) -> Result<Json<Vec<SessionRow>>, AppError> {
    state
        .store
        .candidate_by_id(candidate_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Candidate not found".into()))?;
    Ok(Json(state.store.sessions_for_candidate(candidate_id).await?))
}

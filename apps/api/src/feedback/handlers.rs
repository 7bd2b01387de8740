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
use crate::feedback::consensus::{
    consensus, feedback_weight, researcher_stats, Consensus, ResearcherStats,
};
use crate::models::feedback::{ExpertClassification, FeedbackRow, FeedbackUpdate, NewFeedback};
use crate::models::Page;
use crate::state::AppState;
use crate::store::Store;

#[derive(Debug, Deserialize)]
pub struct SubmitFeedbackRequest {
    pub candidate_id: Uuid,
    pub expert_classification: ExpertClassification,
    pub detailed_reasoning: String,
    pub confidence_score: f64,
    pub agrees_with_ai: Option<bool>,
    pub supporting_data_references: Option<String>,
    pub methodology_description: Option<String>,
    pub time_spent_minutes: Option<i32>,
    pub tools_used: Option<String>,
}

fn validate_confidence(score: f64) -> Result<(), AppError> {
    if (0.0..=1.0).contains(&score) {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Confidence score must be between 0.0 and 1.0".into(),
        ))
    }
}

fn validate_time_spent(minutes: Option<i32>) -> Result<(), AppError> {
    match minutes {
        Some(m) if m < 0 => Err(AppError::Validation(
            "Time spent must be non-negative".into(),
        )),
        _ => Ok(()),
    }
}

async fn ensure_candidate_exists(store: &dyn Store, id: Uuid) -> Result<(), AppError> {
    store
        .candidate_by_id(id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound("Candidate not found".into()))
}

async fn load_feedback(store: &dyn Store, id: Uuid) -> Result<FeedbackRow, AppError> {
    store
        .feedback_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Feedback not found".into()))
}

/// POST /api/v1/feedback
pub async fn handle_submit_feedback(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<SubmitFeedbackRequest>,
) -> Result<(StatusCode, Json<FeedbackRow>), AppError> {
    validate_confidence(req.confidence_score)?;
    validate_time_spent(req.time_spent_minutes)?;
    if req.detailed_reasoning.trim().is_empty() {
        return Err(AppError::Validation("Detailed reasoning is required".into()));
    }
    ensure_candidate_exists(state.store.as_ref(), req.candidate_id).await?;

    let previous = state.store.count_feedback_by_researcher(auth.id()).await?;
    let weight = feedback_weight(auth.role(), previous);

    let row = state
        .store
        .insert_feedback(NewFeedback {
            candidate_id: req.candidate_id,
            researcher_id: auth.id(),
            expert_classification: req.expert_classification,
            detailed_reasoning: req.detailed_reasoning,
            confidence_score: req.confidence_score,
            agrees_with_ai: req.agrees_with_ai,
            supporting_data_references: req.supporting_data_references,
            methodology_description: req.methodology_description,
            time_spent_minutes: req.time_spent_minutes,
            tools_used: req.tools_used,
            feedback_weight: weight,
        })
        .await?;

    info!(
        "Researcher {} classified candidate {} as {} (weight {:.2})",
        auth.id(),
        row.candidate_id,
        row.expert_classification,
        row.feedback_weight
    );
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/feedback/candidates/:id
pub async fn handle_candidate_feedback(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(candidate_id): Path<Uuid>,
) -> Result<Json<Vec<FeedbackRow>>, AppError> {
    ensure_candidate_exists(state.store.as_ref(), candidate_id).await?;
    Ok(Json(state.store.feedback_for_candidate(candidate_id).await?))
}

/// GET /api/v1/feedback/candidates/:id/consensus
pub async fn handle_consensus(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(candidate_id): Path<Uuid>,
) -> Result<Json<Consensus>, AppError> {
    ensure_candidate_exists(state.store.as_ref(), candidate_id).await?;
    let entries = state.store.feedback_for_candidate(candidate_id).await?;
    Ok(Json(consensus(candidate_id, &entries)))
}

/// GET /api/v1/feedback/me
pub async fn handle_my_feedback(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<Page>,
) -> Result<Json<Vec<FeedbackRow>>, AppError> {
    Ok(Json(
        state
            .store
            .feedback_by_researcher(auth.id(), page.normalized())
            .await?,
    ))
}

/// GET /api/v1/feedback/me/stats
pub async fn handle_my_stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ResearcherStats>, AppError> {
    let entries = state
        .store
        .feedback_by_researcher(auth.id(), Page::all())
        .await?;
    Ok(Json(researcher_stats(auth.id(), &entries)))
}

/// GET /api/v1/feedback/researchers/:id/stats
pub async fn handle_researcher_stats(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(researcher_id): Path<Uuid>,
) -> Result<Json<ResearcherStats>, AppError> {
    state
        .store
        .user_by_id(researcher_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let entries = state
        .store
        .feedback_by_researcher(researcher_id, Page::all())
        .await?;
    Ok(Json(researcher_stats(researcher_id, &entries)))
}

/// GET /api/v1/feedback/entries/:id
pub async fn handle_get_feedback(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FeedbackRow>, AppError> {
    Ok(Json(load_feedback(state.store.as_ref(), id).await?))
}

/// PUT /api/v1/feedback/entries/:id
pub async fn handle_update_feedback(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(update): Json<FeedbackUpdate>,
) -> Result<Json<FeedbackRow>, AppError> {
    let existing = load_feedback(state.store.as_ref(), id).await?;
    if existing.researcher_id != auth.id() {
        return Err(AppError::Forbidden(
            "Not authorized to update this feedback".into(),
        ));
    }
    if let Some(score) = update.confidence_score {
        validate_confidence(score)?;
    }
    validate_time_spent(update.time_spent_minutes)?;
    if update
        .detailed_reasoning
        .as_deref()
        .is_some_and(|r| r.trim().is_empty())
    {
        return Err(AppError::Validation("Detailed reasoning is required".into()));
    }

    let updated = state
        .store
        .update_feedback(id, update)
        .await?
        .ok_or_else(|| AppError::NotFound("Feedback not found".into()))?;
    Ok(Json(updated))
}

/// DELETE /api/v1/feedback/entries/:id
pub async fn handle_delete_feedback(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let existing = load_feedback(state.store.as_ref(), id).await?;
    if existing.researcher_id != auth.id() && !auth.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to delete this feedback".into(),
        ));
    }
    if !state.store.delete_feedback(id).await? {
        return Err(AppError::NotFound("Feedback not found".into()));
    }
    info!("User {} deleted feedback {}", auth.id(), id);
    Ok(Json(json!({ "message": "Feedback deleted successfully" })))
}

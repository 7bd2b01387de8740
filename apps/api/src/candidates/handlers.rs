use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::candidates::{load_visible, scoped_owner};
use crate::errors::AppError;
use crate::extract::{Json, Path, Query};
use crate::models::candidate::{
    AnalysisStatus, CandidateCorrection, CandidateFilter, CandidateRow, CandidateSummary,
};
use crate::models::Page;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CandidateQuery {
    pub owner_id: Option<Uuid>,
    pub status: Option<String>,
    pub prediction: Option<String>,
    pub kepid: Option<i64>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl CandidateQuery {
    fn page(&self) -> Page {
        let defaults = Page::default();
        Page {
            skip: self.skip.unwrap_or(defaults.skip),
            limit: self.limit.unwrap_or(defaults.limit),
        }
        .normalized()
    }
}

/// GET /api/v1/data/candidates
pub async fn handle_list_candidates(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CandidateQuery>,
) -> Result<Json<Vec<CandidateSummary>>, AppError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(AnalysisStatus::parse(raw).ok_or_else(|| {
            AppError::Validation(format!("Invalid status filter: {raw}"))
        })?),
        None => None,
    };
    let filter = CandidateFilter {
        owner_id: scoped_owner(&auth, query.owner_id)?,
        status,
        prediction: query.prediction.clone(),
        kepid: query.kepid,
    };

    let rows = state.store.list_candidates(&filter, query.page()).await?;
    Ok(Json(rows.iter().map(CandidateSummary::from).collect()))
}

/// GET /api/v1/data/my-uploads
pub async fn handle_my_uploads(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<Page>,
) -> Result<Json<Vec<CandidateSummary>>, AppError> {
    let filter = CandidateFilter {
        owner_id: Some(auth.id()),
        ..Default::default()
    };
    let rows = state.store.list_candidates(&filter, page.normalized()).await?;
    Ok(Json(rows.iter().map(CandidateSummary::from).collect()))
}

/// GET /api/v1/data/candidates/:id
pub async fn handle_get_candidate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CandidateRow>, AppError> {
    Ok(Json(load_visible(state.store.as_ref(), &auth, id).await?))
}

/// PATCH /api/v1/data/candidates/:id
pub async fn handle_correct_candidate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(correction): Json<CandidateCorrection>,
) -> Result<Json<CandidateRow>, AppError> {
    auth.require_admin()?;
    let updated = state
        .store
        .correct_candidate(id, correction)
        .await?
        .ok_or_else(|| AppError::NotFound("Candidate not found".into()))?;
    info!("Admin {} corrected candidate {}", auth.id(), id);
    Ok(Json(updated))
}

/// DELETE /api/v1/data/candidates/:id
pub async fn handle_delete_candidate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let candidate = load_visible(state.store.as_ref(), &auth, id).await?;
    if candidate.owner_id != auth.id() && !auth.is_admin() {
        return Err(AppError::Forbidden(
            "Only the owner or an administrator can delete this candidate".into(),
        ));
    }
    if !state.store.delete_candidate(id).await? {
        return Err(AppError::NotFound("Candidate not found".into()));
    }
    info!("User {} deleted candidate {}", auth.id(), id);
    Ok(Json(json!({ "message": "Candidate deleted successfully" })))
}

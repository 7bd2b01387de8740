use axum::{
    extract::State,
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::candidates::{load_visible, scoped_owner};
use crate::errors::AppError;
use crate::extract::{Json, Path, Query};
use crate::inference::service::{bulk_predict, predict_one, BulkPredictResponse};
use crate::models::analysis::{AnalysisResultRow, Verdict, VerdictUpdate};
use crate::models::candidate::{AnalysisStatus, CandidateFilter, CandidateRow, CandidateSummary};
use crate::models::Page;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BulkPredictRequest {
    pub candidate_ids: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct CandidateResults {
    pub candidate: CandidateRow,
    pub results: Vec<AnalysisResultRow>,
}

#[derive(Debug, Deserialize)]
pub struct VerdictRequest {
    pub verdict: Verdict,
    pub notes: Option<String>,
}

const DEFAULT_PENDING_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub limit: Option<i64>,
}

/// POST /api/v1/analysis/predict/:id
pub async fn handle_predict(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<AnalysisResultRow>), AppError> {
    let result = predict_one(&state, &auth, id).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// POST /api/v1/analysis/bulk-predict
pub async fn handle_bulk_predict(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<BulkPredictRequest>,
) -> Result<Json<BulkPredictResponse>, AppError> {
    Ok(Json(bulk_predict(&state, &auth, &req.candidate_ids).await?))
}

/// GET /api/v1/analysis/results/:id
pub async fn handle_candidate_results(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CandidateResults>, AppError> {
    let candidate = load_visible(state.store.as_ref(), &auth, id).await?;
    let results = state.store.results_for_candidate(candidate.id).await?;
    Ok(Json(CandidateResults { candidate, results }))
}

/// PUT /api/v1/analysis/results/:id/verdict
pub async fn handle_set_verdict(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(result_id): Path<Uuid>,
    Json(req): Json<VerdictRequest>,
) -> Result<Json<AnalysisResultRow>, AppError> {
    let existing = state
        .store
        .result_by_id(result_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Analysis result not found".into()))?;
    // The result inherits its candidate's visibility.
    load_visible(state.store.as_ref(), &auth, existing.candidate_id).await?;

    let updated = state
        .store
        .set_verdict(
            result_id,
            VerdictUpdate {
                verdict: req.verdict,
                verdict_by: auth.id(),
                notes: req.notes,
                at: Utc::now(),
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound("Analysis result not found".into()))?;

    info!(
        "User {} set verdict '{}' on result {}",
        auth.id(),
        req.verdict.as_str(),
        result_id
    );
    Ok(Json(updated))
}

/// GET /api/v1/analysis/pending
pub async fn handle_pending(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PendingQuery>,
) -> Result<Json<Vec<CandidateSummary>>, AppError> {
    let filter = CandidateFilter {
        owner_id: scoped_owner(&auth, None)?,
        status: Some(AnalysisStatus::Pending),
        ..Default::default()
    };
    let page = Page {
        skip: 0,
        limit: query.limit.unwrap_or(DEFAULT_PENDING_LIMIT),
    }
    .normalized();
    let rows = state.store.list_candidates(&filter, page).await?;
    Ok(Json(rows.iter().map(CandidateSummary::from).collect()))
}

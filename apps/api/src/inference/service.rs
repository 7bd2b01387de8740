use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::candidates::{can_view, load_visible};
use crate::errors::AppError;
use crate::inference::features::assemble;
use crate::inference::model::Prediction;
use crate::models::analysis::{AnalysisResultRow, NewAnalysisResult};
use crate::models::candidate::{AnalysisStatus, CandidateRow};
use crate::state::AppState;

pub const MAX_BULK_IDS: usize = 500;

#[derive(Debug, Serialize)]
pub struct BulkFailure {
    pub candidate_id: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BulkPredictResponse {
    pub total_requested: usize,
    /// Repeated ids; each distinct id is processed once.
    pub duplicates_ignored: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<AnalysisResultRow>,
    pub failures: Vec<BulkFailure>,
}

fn ensure_model_ready(state: &AppState) -> Result<(), AppError> {
    if state.classifier.is_ready() {
        Ok(())
    } else {
        Err(AppError::ModelUnavailable)
    }
}

/// Runs the classifier over `candidates` as one batch.
fn classify(state: &AppState, candidates: &[CandidateRow]) -> Result<Vec<Prediction>, AppError> {
    let batch: Vec<_> = candidates.iter().map(|c| &c.features.0).collect();
    let rows = assemble(state.classifier.feature_columns(), &batch);
    let predictions = state.classifier.predict(&rows)?;
    if predictions.len() != candidates.len() {
        return Err(AppError::Model(format!(
            "classifier returned {} predictions for {} candidates",
            predictions.len(),
            candidates.len()
        )));
    }
    Ok(predictions)
}

async fn mark_error(state: &AppState, ids: &[Uuid]) {
    if let Err(e) = state
        .store
        .set_analysis_status(ids, AnalysisStatus::Error)
        .await
    {
        error!("Failed to mark {} candidates as errored: {e}", ids.len());
    }
}

fn new_result(
    state: &AppState,
    caller: &AuthUser,
    candidate_id: Uuid,
    p: Prediction,
) -> NewAnalysisResult {
    NewAnalysisResult {
        candidate_id,
        requested_by: caller.id(),
        model_version: state.classifier.model_version().to_string(),
        predicted_label: p.label,
        confidence: p.confidence,
    }
}

/// Classifies one visible candidate and records a new result row.
pub async fn predict_one(
    state: &AppState,
    caller: &AuthUser,
    candidate_id: Uuid,
) -> Result<AnalysisResultRow, AppError> {
    ensure_model_ready(state)?;
    let candidate = load_visible(state.store.as_ref(), caller, candidate_id).await?;

    state
        .store
        .set_analysis_status(&[candidate.id], AnalysisStatus::Processing)
        .await?;

    let prediction = match classify(state, std::slice::from_ref(&candidate)) {
        Ok(mut predictions) => predictions.remove(0),
        Err(e) => {
            mark_error(state, &[candidate.id]).await;
            return Err(e);
        }
    };

    let result = match state
        .store
        .insert_result(new_result(state, caller, candidate.id, prediction))
        .await
    {
        Ok(result) => result,
        Err(e) => {
            mark_error(state, &[candidate.id]).await;
            return Err(e.into());
        }
    };

    info!(
        "Candidate {} classified as {} ({:.3})",
        candidate.id, result.predicted_label, result.confidence
    );
    Ok(result)
}

/// Best-effort batch prediction: every id gets either a result or a failure
/// entry, and one item's failure never undoes another's result.
pub async fn bulk_predict(
    state: &AppState,
    caller: &AuthUser,
    raw_ids: &[Value],
) -> Result<BulkPredictResponse, AppError> {
    if raw_ids.is_empty() || raw_ids.len() > MAX_BULK_IDS {
        return Err(AppError::Validation(format!(
            "candidate_ids must contain between 1 and {MAX_BULK_IDS} ids"
        )));
    }
    ensure_model_ready(state)?;

    let mut failures = Vec::new();
    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    let mut duplicates_ignored = 0;
    for raw in raw_ids {
        let text = match raw {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        };
        match Uuid::parse_str(&text) {
            Ok(id) => {
                if seen.insert(id) {
                    ids.push(id);
                } else {
                    duplicates_ignored += 1;
                }
            }
            Err(_) => failures.push(BulkFailure {
                candidate_id: text,
                error: "invalid candidate id".into(),
            }),
        }
    }

    let mut found: HashMap<Uuid, CandidateRow> = state
        .store
        .candidates_by_ids(&ids)
        .await?
        .into_iter()
        .filter(|c| can_view(caller, c))
        .map(|c| (c.id, c))
        .collect();

    let mut batch = Vec::with_capacity(found.len());
    for id in &ids {
        match found.remove(id) {
            Some(candidate) => batch.push(candidate),
            None => failures.push(BulkFailure {
                candidate_id: id.to_string(),
                error: "candidate not found".into(),
            }),
        }
    }

    let mut results = Vec::with_capacity(batch.len());
    if !batch.is_empty() {
        let batch_ids: Vec<Uuid> = batch.iter().map(|c| c.id).collect();
        state
            .store
            .set_analysis_status(&batch_ids, AnalysisStatus::Processing)
            .await?;

        match classify(state, &batch) {
            Ok(predictions) => {
                for (candidate, prediction) in batch.iter().zip(predictions) {
                    let insert = state
                        .store
                        .insert_result(new_result(state, caller, candidate.id, prediction))
                        .await;
                    match insert {
                        Ok(result) => results.push(result),
                        Err(e) => {
                            error!("Storing result for candidate {} failed: {e}", candidate.id);
                            mark_error(state, &[candidate.id]).await;
                            failures.push(BulkFailure {
                                candidate_id: candidate.id.to_string(),
                                error: "failed to store result".into(),
                            });
                        }
                    }
                }
            }
            Err(e) => {
                error!("Bulk classification of {} candidates failed: {e}", batch.len());
                mark_error(state, &batch_ids).await;
                failures.extend(batch.iter().map(|c| BulkFailure {
                    candidate_id: c.id.to_string(),
                    error: "prediction failed".into(),
                }));
            }
        }
    }

    if !failures.is_empty() {
        warn!("Bulk predict: {} of {} ids failed", failures.len(), raw_ids.len());
    }
    info!(
        "Bulk predict by {}: {} succeeded, {} failed",
        caller.id(),
        results.len(),
        failures.len()
    );

    Ok(BulkPredictResponse {
        total_requested: raw_ids.len(),
        duplicates_ignored,
        succeeded: results.len(),
        failed: failures.len(),
        results,
        failures,
    })
}

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::ingest::parser::{parse_csv, RejectedRow};
use crate::state::AppState;
use crate::store::UploadBatch;

#[derive(Debug, Serialize)]
pub struct UploadSummary {
    pub message: String,
    pub upload_id: Uuid,
    pub filename: String,
    pub candidates_created: usize,
    pub rows_rejected: usize,
    pub rejected_rows: Vec<RejectedRow>,
    pub warnings: Vec<String>,
    pub candidate_ids: Vec<Uuid>,
}

fn multipart_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("File exceeds the {limit} byte upload limit"))
    } else {
        AppError::Validation(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// POST /api/v1/data/upload-csv
pub async fn handle_upload_csv(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadSummary>), AppError> {
    let mut multipart = multipart?;
    let limit = state.config.max_upload_bytes;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if !filename.to_ascii_lowercase().ends_with(".csv") {
            return Err(AppError::Validation("Only CSV files are allowed".into()));
        }
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }

    let (filename, bytes) =
        upload.ok_or_else(|| AppError::Validation("Missing 'file' field in upload".into()))?;
    if bytes.len() > limit {
        return Err(AppError::PayloadTooLarge(format!(
            "File exceeds the {limit} byte upload limit"
        )));
    }

    info!(
        "Processing upload '{}' ({} bytes) for user {}",
        filename,
        bytes.len(),
        auth.id()
    );

    let parsed = tokio::task::spawn_blocking(move || parse_csv(&bytes))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("CSV parsing task failed: {e}")))??;

    if !parsed.rejected.is_empty() {
        warn!(
            "Upload '{}': rejected {} rows",
            filename,
            parsed.rejected.len()
        );
    }

    let upload_id = Uuid::new_v4();
    let created = state
        .store
        .insert_candidates(UploadBatch {
            owner_id: auth.id(),
            upload_id,
            source_filename: filename.clone(),
            rows: parsed.rows,
        })
        .await?;

    info!(
        "Upload {} ('{}'): {} candidates created, {} rows rejected",
        upload_id,
        filename,
        created.len(),
        parsed.rejected.len()
    );

    let summary = UploadSummary {
        message: format!("Successfully processed {} candidates", created.len()),
        upload_id,
        filename,
        candidates_created: created.len(),
        rows_rejected: parsed.rejected.len(),
        rejected_rows: parsed.rejected,
        warnings: parsed.warnings,
        candidate_ids: created.iter().map(|c| c.id).collect(),
    };
    Ok((StatusCode::CREATED, Json(summary)))
}

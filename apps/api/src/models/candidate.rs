use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Numeric KOI columns keyed by their CSV header name. Values are always finite.
pub type FeatureMap = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(AnalysisStatus::Pending),
            "processing" => Some(AnalysisStatus::Processing),
            "completed" => Some(AnalysisStatus::Completed),
            "error" => Some(AnalysisStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CandidateRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub source_filename: String,
    pub upload_id: Uuid,
    pub row_number: i32,
    pub kepid: Option<i64>,
    pub kepoi_name: Option<String>,
    pub kepler_name: Option<String>,
    pub koi_disposition: Option<String>,
    pub koi_pdisposition: Option<String>,
    pub features: Json<FeatureMap>,
    pub analysis_status: String,
    pub latest_prediction: Option<String>,
    pub latest_confidence: Option<f64>,
    pub analysis_notes: Option<String>,
    pub quality_flags: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CandidateRow {
    pub fn feature(&self, column: &str) -> Option<f64> {
        self.features.0.get(column).copied()
    }
}

/// Compact listing view.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateSummary {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kepid: Option<i64>,
    pub kepoi_name: Option<String>,
    pub koi_period: Option<f64>,
    pub koi_depth: Option<f64>,
    pub analysis_status: String,
    pub latest_prediction: Option<String>,
    pub latest_confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl From<&CandidateRow> for CandidateSummary {
    fn from(row: &CandidateRow) -> Self {
        CandidateSummary {
            id: row.id,
            owner_id: row.owner_id,
            kepid: row.kepid,
            kepoi_name: row.kepoi_name.clone(),
            koi_period: row.feature("koi_period"),
            koi_depth: row.feature("koi_depth"),
            analysis_status: row.analysis_status.clone(),
            latest_prediction: row.latest_prediction.clone(),
            latest_confidence: row.latest_confidence,
            created_at: row.created_at,
        }
    }
}

/// One accepted CSV row ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCandidate {
    pub row_number: i32,
    pub kepid: Option<i64>,
    pub kepoi_name: Option<String>,
    pub kepler_name: Option<String>,
    pub koi_disposition: Option<String>,
    pub koi_pdisposition: Option<String>,
    pub features: FeatureMap,
}

/// Administrative correction; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateCorrection {
    pub analysis_notes: Option<String>,
    pub quality_flags: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    pub owner_id: Option<Uuid>,
    pub status: Option<AnalysisStatus>,
    pub prediction: Option<String>,
    pub kepid: Option<i64>,
}

impl CandidateFilter {
    pub fn matches(&self, row: &CandidateRow) -> bool {
        self.owner_id.map_or(true, |owner| row.owner_id == owner)
            && self
                .status
                .map_or(true, |status| row.analysis_status == status.as_str())
            && self
                .prediction
                .as_deref()
                .map_or(true, |p| row.latest_prediction.as_deref() == Some(p))
            && self.kepid.map_or(true, |k| row.kepid == Some(k))
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A researcher's confirmation or override of a model prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Confirmed,
    FalsePositive,
    Candidate,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Confirmed => "confirmed",
            Verdict::FalsePositive => "false_positive",
            Verdict::Candidate => "candidate",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AnalysisResultRow {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub requested_by: Uuid,
    pub model_version: String,
    pub predicted_label: String,
    pub confidence: f64,
    pub verdict: Option<String>,
    pub verdict_by: Option<Uuid>,
    pub verdict_notes: Option<String>,
    pub verdict_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAnalysisResult {
    pub candidate_id: Uuid,
    pub requested_by: Uuid,
    pub model_version: String,
    pub predicted_label: String,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct VerdictUpdate {
    pub verdict: Verdict,
    pub verdict_by: Uuid,
    pub notes: Option<String>,
    pub at: DateTime<Utc>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::feedback::ExpertClassification;

/// A researcher's working record of analysing one candidate by hand.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub researcher_id: Uuid,
    pub session_timestamp: DateTime<Utc>,
    /// Seconds.
    pub time_spent_analyzing: i32,
    pub researcher_verdict: Option<String>,
    pub confidence_level: Option<f64>,
    pub methodology_used: Option<String>,
    pub analysis_notes: Option<String>,
    pub key_observations: Option<String>,
    pub concerns_raised: Option<String>,
    pub session_completed: bool,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub candidate_id: Uuid,
    pub researcher_id: Uuid,
    pub methodology_used: Option<String>,
    pub analysis_notes: Option<String>,
    pub key_observations: Option<String>,
    pub concerns_raised: Option<String>,
}

/// Partial session update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionUpdate {
    pub researcher_verdict: Option<ExpertClassification>,
    pub confidence_level: Option<f64>,
    pub methodology_used: Option<String>,
    pub analysis_notes: Option<String>,
    pub key_observations: Option<String>,
    pub concerns_raised: Option<String>,
    pub time_spent_analyzing: Option<i32>,
    pub session_completed: Option<bool>,
}

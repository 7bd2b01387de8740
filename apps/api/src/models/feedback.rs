use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpertClassification {
    Confirmed,
    FalsePositive,
    Candidate,
}

impl ExpertClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpertClassification::Confirmed => "CONFIRMED",
            ExpertClassification::FalsePositive => "FALSE_POSITIVE",
            ExpertClassification::Candidate => "CANDIDATE",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FeedbackRow {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub researcher_id: Uuid,
    pub expert_classification: String,
    pub detailed_reasoning: String,
    pub confidence_score: f64,
    pub agrees_with_ai: Option<bool>,
    pub supporting_data_references: Option<String>,
    pub methodology_description: Option<String>,
    pub time_spent_minutes: Option<i32>,
    pub tools_used: Option<String>,
    pub feedback_weight: f64,
    pub peer_review_status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub candidate_id: Uuid,
    pub researcher_id: Uuid,
    pub expert_classification: ExpertClassification,
    pub detailed_reasoning: String,
    pub confidence_score: f64,
    pub agrees_with_ai: Option<bool>,
    pub supporting_data_references: Option<String>,
    pub methodology_description: Option<String>,
    pub time_spent_minutes: Option<i32>,
    pub tools_used: Option<String>,
    pub feedback_weight: f64,
}

/// Partial feedback update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackUpdate {
    pub expert_classification: Option<ExpertClassification>,
    pub detailed_reasoning: Option<String>,
    pub confidence_score: Option<f64>,
    pub agrees_with_ai: Option<bool>,
    pub supporting_data_references: Option<String>,
    pub methodology_description: Option<String>,
    pub time_spent_minutes: Option<i32>,
    pub tools_used: Option<String>,
}

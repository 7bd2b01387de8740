//! Persistence boundary.
//!
//! Handlers and services only talk to `dyn Store`. `PgStore` is the production
//! backend; `MemoryStore` backs the router tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::analysis::{AnalysisResultRow, NewAnalysisResult, VerdictUpdate};
use crate::models::candidate::{
    AnalysisStatus, CandidateCorrection, CandidateFilter, CandidateRow, NewCandidate,
};
use crate::models::feedback::{FeedbackRow, FeedbackUpdate, NewFeedback};
use crate::models::session::{NewSession, SessionRow, SessionUpdate};
use crate::models::user::{NewUser, ProfileUpdate, UserRow};
use crate::models::Page;

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Identifies one CSV upload; shared by every row it produced.
#[derive(Debug, Clone)]
pub struct UploadBatch {
    pub owner_id: Uuid,
    pub upload_id: Uuid,
    pub source_filename: String,
    pub rows: Vec<NewCandidate>,
}

#[async_trait]
pub trait Store: Send + Sync {
    // Users
    async fn insert_user(&self, user: NewUser) -> Result<UserRow, StoreError>;
    async fn user_by_id(&self, id: Uuid) -> Result<Option<UserRow>, StoreError>;
    async fn user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError>;
    async fn user_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError>;
    async fn list_active_users(&self, page: Page) -> Result<Vec<UserRow>, StoreError>;
    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<UserRow>, StoreError>;
    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;
    async fn deactivate_user(&self, id: Uuid) -> Result<(), StoreError>;

    // Candidates
    /// Persists every row of one upload atomically.
    async fn insert_candidates(&self, batch: UploadBatch) -> Result<Vec<CandidateRow>, StoreError>;
    async fn candidate_by_id(&self, id: Uuid) -> Result<Option<CandidateRow>, StoreError>;
    async fn candidates_by_ids(&self, ids: &[Uuid]) -> Result<Vec<CandidateRow>, StoreError>;
    async fn list_candidates(
        &self,
        filter: &CandidateFilter,
        page: Page,
    ) -> Result<Vec<CandidateRow>, StoreError>;
    async fn correct_candidate(
        &self,
        id: Uuid,
        correction: CandidateCorrection,
    ) -> Result<Option<CandidateRow>, StoreError>;
    async fn set_analysis_status(
        &self,
        ids: &[Uuid],
        status: AnalysisStatus,
    ) -> Result<(), StoreError>;
    /// Returns false when the candidate did not exist.
    async fn delete_candidate(&self, id: Uuid) -> Result<bool, StoreError>;

    // Analysis results
    /// Inserts a new result and marks its candidate completed with the latest label.
    async fn insert_result(&self, result: NewAnalysisResult)
        -> Result<AnalysisResultRow, StoreError>;
    async fn result_by_id(&self, id: Uuid) -> Result<Option<AnalysisResultRow>, StoreError>;
    async fn results_for_candidate(
        &self,
        candidate_id: Uuid,
    ) -> Result<Vec<AnalysisResultRow>, StoreError>;
    async fn set_verdict(
        &self,
        result_id: Uuid,
        update: VerdictUpdate,
    ) -> Result<Option<AnalysisResultRow>, StoreError>;

    // Researcher feedback
    async fn insert_feedback(&self, feedback: NewFeedback) -> Result<FeedbackRow, StoreError>;
    async fn feedback_by_id(&self, id: Uuid) -> Result<Option<FeedbackRow>, StoreError>;
    async fn feedback_for_candidate(
        &self,
        candidate_id: Uuid,
    ) -> Result<Vec<FeedbackRow>, StoreError>;
    async fn feedback_by_researcher(
        &self,
        researcher_id: Uuid,
        page: Page,
    ) -> Result<Vec<FeedbackRow>, StoreError>;
    async fn count_feedback_by_researcher(&self, researcher_id: Uuid) -> Result<i64, StoreError>;
    async fn update_feedback(
        &self,
        id: Uuid,
        update: FeedbackUpdate,
    ) -> Result<Option<FeedbackRow>, StoreError>;
    async fn delete_feedback(&self, id: Uuid) -> Result<bool, StoreError>;

    // Analysis sessions
    async fn insert_session(&self, session: NewSession) -> Result<SessionRow, StoreError>;
    async fn session_by_id(&self, id: Uuid) -> Result<Option<SessionRow>, StoreError>;
    async fn sessions_for_candidate(
        &self,
        candidate_id: Uuid,
    ) -> Result<Vec<SessionRow>, StoreError>;
    async fn sessions_by_researcher(
        &self,
        researcher_id: Uuid,
        page: Page,
    ) -> Result<Vec<SessionRow>, StoreError>;
    async fn update_session(
        &self,
        id: Uuid,
        update: SessionUpdate,
    ) -> Result<Option<SessionRow>, StoreError>;
    async fn delete_session(&self, id: Uuid) -> Result<bool, StoreError>;
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::analysis::{AnalysisResultRow, NewAnalysisResult, VerdictUpdate};
use crate::models::candidate::{
    AnalysisStatus, CandidateCorrection, CandidateFilter, CandidateRow,
};
use crate::models::feedback::{FeedbackRow, FeedbackUpdate, NewFeedback};
use crate::models::session::{NewSession, SessionRow, SessionUpdate};
use crate::models::user::{NewUser, ProfileUpdate, UserRow};
use crate::models::Page;
use crate::store::{Store, StoreError, UploadBatch};

/// sqlx-backed store over the tables created by `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn conflict_on_unique(err: sqlx::Error, message: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(message.to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<UserRow, StoreError> {
        sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users
                (id, username, email, password_hash, role,
                 full_name, research_specialization, organization_id, bio)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.full_name)
        .bind(&user.research_specialization)
        .bind(&user.organization_id)
        .bind(&user.bio)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Username or email already registered"))
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<UserRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_active_users(&self, page: Page) -> Result<Vec<UserRow>, StoreError> {
        Ok(sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE is_active ORDER BY created_at ASC OFFSET $1 LIMIT $2",
        )
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<UserRow>, StoreError> {
        Ok(sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET
                full_name = COALESCE($2, full_name),
                research_specialization = COALESCE($3, research_specialization),
                organization_id = COALESCE($4, organization_id),
                bio = COALESCE($5, bio)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.full_name)
        .bind(update.research_specialization)
        .bind(update.organization_id)
        .bind(update.bio)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn deactivate_user(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_candidates(&self, batch: UploadBatch) -> Result<Vec<CandidateRow>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(batch.rows.len());

        for row in batch.rows {
            let inserted = sqlx::query_as::<_, CandidateRow>(
                r#"
                INSERT INTO candidates
                    (id, owner_id, source_filename, upload_id, row_number, kepid,
                     kepoi_name, kepler_name, koi_disposition, koi_pdisposition, features)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(batch.owner_id)
            .bind(&batch.source_filename)
            .bind(batch.upload_id)
            .bind(row.row_number)
            .bind(row.kepid)
            .bind(row.kepoi_name)
            .bind(row.kepler_name)
            .bind(row.koi_disposition)
            .bind(row.koi_pdisposition)
            .bind(Json(row.features))
            .fetch_one(&mut *tx)
            .await?;
            created.push(inserted);
        }

        tx.commit().await?;
        info!(
            "Persisted {} candidates for upload {}",
            created.len(),
            batch.upload_id
        );
        Ok(created)
    }

    async fn candidate_by_id(&self, id: Uuid) -> Result<Option<CandidateRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, CandidateRow>("SELECT * FROM candidates WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn candidates_by_ids(&self, ids: &[Uuid]) -> Result<Vec<CandidateRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, CandidateRow>("SELECT * FROM candidates WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn list_candidates(
        &self,
        filter: &CandidateFilter,
        page: Page,
    ) -> Result<Vec<CandidateRow>, StoreError> {
        Ok(sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT * FROM candidates
            WHERE ($1::uuid IS NULL OR owner_id = $1)
              AND ($2::text IS NULL OR analysis_status = $2)
              AND ($3::text IS NULL OR latest_prediction = $3)
              AND ($4::bigint IS NULL OR kepid = $4)
            ORDER BY created_at DESC, row_number ASC
            OFFSET $5 LIMIT $6
            "#,
        )
        .bind(filter.owner_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.prediction.as_deref())
        .bind(filter.kepid)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn correct_candidate(
        &self,
        id: Uuid,
        correction: CandidateCorrection,
    ) -> Result<Option<CandidateRow>, StoreError> {
        Ok(sqlx::query_as::<_, CandidateRow>(
            r#"
            UPDATE candidates SET
                analysis_notes = COALESCE($2, analysis_notes),
                quality_flags = COALESCE($3, quality_flags)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(correction.analysis_notes)
        .bind(correction.quality_flags)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn set_analysis_status(
        &self,
        ids: &[Uuid],
        status: AnalysisStatus,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE candidates SET analysis_status = $1 WHERE id = ANY($2)")
            .bind(status.as_str())
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_candidate(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM candidates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_result(
        &self,
        result: NewAnalysisResult,
    ) -> Result<AnalysisResultRow, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, AnalysisResultRow>(
            r#"
            INSERT INTO analysis_results
                (id, candidate_id, requested_by, model_version, predicted_label, confidence)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(result.candidate_id)
        .bind(result.requested_by)
        .bind(&result.model_version)
        .bind(&result.predicted_label)
        .bind(result.confidence)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE candidates SET
                analysis_status = 'completed',
                latest_prediction = $2,
                latest_confidence = $3
            WHERE id = $1
            "#,
        )
        .bind(result.candidate_id)
        .bind(&result.predicted_label)
        .bind(result.confidence)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn result_by_id(&self, id: Uuid) -> Result<Option<AnalysisResultRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, AnalysisResultRow>("SELECT * FROM analysis_results WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn results_for_candidate(
        &self,
        candidate_id: Uuid,
    ) -> Result<Vec<AnalysisResultRow>, StoreError> {
        Ok(sqlx::query_as::<_, AnalysisResultRow>(
            "SELECT * FROM analysis_results WHERE candidate_id = $1 ORDER BY created_at DESC",
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn set_verdict(
        &self,
        result_id: Uuid,
        update: VerdictUpdate,
    ) -> Result<Option<AnalysisResultRow>, StoreError> {
        Ok(sqlx::query_as::<_, AnalysisResultRow>(
            r#"
            UPDATE analysis_results SET
                verdict = $2,
                verdict_by = $3,
                verdict_notes = $4,
                verdict_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(result_id)
        .bind(update.verdict.as_str())
        .bind(update.verdict_by)
        .bind(update.notes)
        .bind(update.at)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_feedback(&self, feedback: NewFeedback) -> Result<FeedbackRow, StoreError> {
        sqlx::query_as::<_, FeedbackRow>(
            r#"
            INSERT INTO researcher_feedback
                (id, candidate_id, researcher_id, expert_classification, detailed_reasoning,
                 confidence_score, agrees_with_ai, supporting_data_references,
                 methodology_description, time_spent_minutes, tools_used, feedback_weight)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(feedback.candidate_id)
        .bind(feedback.researcher_id)
        .bind(feedback.expert_classification.as_str())
        .bind(&feedback.detailed_reasoning)
        .bind(feedback.confidence_score)
        .bind(feedback.agrees_with_ai)
        .bind(&feedback.supporting_data_references)
        .bind(&feedback.methodology_description)
        .bind(feedback.time_spent_minutes)
        .bind(&feedback.tools_used)
        .bind(feedback.feedback_weight)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(e, "You have already provided feedback for this candidate")
        })
    }

    async fn feedback_by_id(&self, id: Uuid) -> Result<Option<FeedbackRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, FeedbackRow>("SELECT * FROM researcher_feedback WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn feedback_for_candidate(
        &self,
        candidate_id: Uuid,
    ) -> Result<Vec<FeedbackRow>, StoreError> {
        Ok(sqlx::query_as::<_, FeedbackRow>(
            "SELECT * FROM researcher_feedback WHERE candidate_id = $1 ORDER BY created_at DESC",
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn feedback_by_researcher(
        &self,
        researcher_id: Uuid,
        page: Page,
    ) -> Result<Vec<FeedbackRow>, StoreError> {
        Ok(sqlx::query_as::<_, FeedbackRow>(
            r#"
            SELECT * FROM researcher_feedback
            WHERE researcher_id = $1
            ORDER BY created_at DESC
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(researcher_id)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count_feedback_by_researcher(&self, researcher_id: Uuid) -> Result<i64, StoreError> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM researcher_feedback WHERE researcher_id = $1")
                .bind(researcher_id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn update_feedback(
        &self,
        id: Uuid,
        update: FeedbackUpdate,
    ) -> Result<Option<FeedbackRow>, StoreError> {
        Ok(sqlx::query_as::<_, FeedbackRow>(
            r#"
            UPDATE researcher_feedback SET
                expert_classification = COALESCE($2, expert_classification),
                detailed_reasoning = COALESCE($3, detailed_reasoning),
                confidence_score = COALESCE($4, confidence_score),
                agrees_with_ai = COALESCE($5, agrees_with_ai),
                supporting_data_references = COALESCE($6, supporting_data_references),
                methodology_description = COALESCE($7, methodology_description),
                time_spent_minutes = COALESCE($8, time_spent_minutes),
                tools_used = COALESCE($9, tools_used)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.expert_classification.map(|c| c.as_str()))
        .bind(update.detailed_reasoning)
        .bind(update.confidence_score)
        .bind(update.agrees_with_ai)
        .bind(update.supporting_data_references)
        .bind(update.methodology_description)
        .bind(update.time_spent_minutes)
        .bind(update.tools_used)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_feedback(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM researcher_feedback WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_session(&self, session: NewSession) -> Result<SessionRow, StoreError> {
        Ok(sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO analysis_sessions
                (id, candidate_id, researcher_id, methodology_used,
                 analysis_notes, key_observations, concerns_raised)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session.candidate_id)
        .bind(session.researcher_id)
        .bind(&session.methodology_used)
        .bind(&session.analysis_notes)
        .bind(&session.key_observations)
        .bind(&session.concerns_raised)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn session_by_id(&self, id: Uuid) -> Result<Option<SessionRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, SessionRow>("SELECT * FROM analysis_sessions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn sessions_for_candidate(
        &self,
        candidate_id: Uuid,
    ) -> Result<Vec<SessionRow>, StoreError> {
        Ok(sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT * FROM analysis_sessions
            WHERE candidate_id = $1
            ORDER BY session_timestamp DESC
            "#,
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn sessions_by_researcher(
        &self,
        researcher_id: Uuid,
        page: Page,
    ) -> Result<Vec<SessionRow>, StoreError> {
        Ok(sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT * FROM analysis_sessions
            WHERE researcher_id = $1
            ORDER BY session_timestamp DESC
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(researcher_id)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_session(
        &self,
        id: Uuid,
        update: SessionUpdate,
    ) -> Result<Option<SessionRow>, StoreError> {
        Ok(sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE analysis_sessions SET
                researcher_verdict = COALESCE($2, researcher_verdict),
                confidence_level = COALESCE($3, confidence_level),
                methodology_used = COALESCE($4, methodology_used),
                analysis_notes = COALESCE($5, analysis_notes),
                key_observations = COALESCE($6, key_observations),
                concerns_raised = COALESCE($7, concerns_raised),
                time_spent_analyzing = COALESCE($8, time_spent_analyzing),
                session_completed = COALESCE($9, session_completed)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.researcher_verdict.map(|v| v.as_str()))
        .bind(update.confidence_level)
        .bind(update.methodology_used)
        .bind(update.analysis_notes)
        .bind(update.key_observations)
        .bind(update.concerns_raised)
        .bind(update.time_spent_analyzing)
        .bind(update.session_completed)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM analysis_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

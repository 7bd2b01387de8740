use std::cmp::Reverse;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
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

#[derive(Default)]
struct Tables {
    users: Vec<UserRow>,
    // (upload sequence, row)
    candidates: Vec<(u64, CandidateRow)>,
    results: Vec<AnalysisResultRow>,
    feedback: Vec<FeedbackRow>,
    sessions: Vec<SessionRow>,
    next_upload_seq: u64,
}

/// In-process store used by the router tests. Mirrors the Postgres constraints
/// the handlers rely on: unique usernames/emails, one feedback per researcher
/// per candidate, and cascading candidate deletes.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        let mut guard = self.tables.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<UserRow, StoreError> {
        self.with(|t| {
            if t
                .users
                .iter()
                .any(|u| u.username == user.username || u.email == user.email)
            {
                return Err(StoreError::Conflict(
                    "Username or email already registered".into(),
                ));
            }
            let row = UserRow {
                id: Uuid::new_v4(),
                username: user.username,
                email: user.email,
                password_hash: user.password_hash,
                role: user.role.as_str().to_string(),
                verification_status: "pending".into(),
                full_name: user.full_name,
                research_specialization: user.research_specialization,
                organization_id: user.organization_id,
                bio: user.bio,
                is_active: true,
                created_at: Utc::now(),
                last_login: None,
            };
            t.users.push(row.clone());
            Ok(row)
        })
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<UserRow>, StoreError> {
        Ok(self.with(|t| t.users.iter().find(|u| u.id == id).cloned()))
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        Ok(self.with(|t| t.users.iter().find(|u| u.username == username).cloned()))
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError> {
        Ok(self.with(|t| t.users.iter().find(|u| u.email == email).cloned()))
    }

    async fn list_active_users(&self, page: Page) -> Result<Vec<UserRow>, StoreError> {
        Ok(self.with(|t| page.apply(t.users.iter().filter(|u| u.is_active).cloned())))
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<UserRow>, StoreError> {
        Ok(self.with(|t| {
            let user = t.users.iter_mut().find(|u| u.id == id)?;
            if update.full_name.is_some() {
                user.full_name = update.full_name;
            }
            if update.research_specialization.is_some() {
                user.research_specialization = update.research_specialization;
            }
            if update.organization_id.is_some() {
                user.organization_id = update.organization_id;
            }
            if update.bio.is_some() {
                user.bio = update.bio;
            }
            Some(user.clone())
        }))
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        self.with(|t| {
            if let Some(user) = t.users.iter_mut().find(|u| u.id == id) {
                user.password_hash = password_hash.to_string();
            }
        });
        Ok(())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.with(|t| {
            if let Some(user) = t.users.iter_mut().find(|u| u.id == id) {
                user.last_login = Some(at);
            }
        });
        Ok(())
    }

    async fn deactivate_user(&self, id: Uuid) -> Result<(), StoreError> {
        self.with(|t| {
            if let Some(user) = t.users.iter_mut().find(|u| u.id == id) {
                user.is_active = false;
            }
        });
        Ok(())
    }

    async fn insert_candidates(&self, batch: UploadBatch) -> Result<Vec<CandidateRow>, StoreError> {
        Ok(self.with(|t| {
            let seq = t.next_upload_seq;
            t.next_upload_seq += 1;
            let created_at = Utc::now();
            let rows: Vec<CandidateRow> = batch
                .rows
                .into_iter()
                .map(|row| CandidateRow {
                    id: Uuid::new_v4(),
                    owner_id: batch.owner_id,
                    source_filename: batch.source_filename.clone(),
                    upload_id: batch.upload_id,
                    row_number: row.row_number,
                    kepid: row.kepid,
                    kepoi_name: row.kepoi_name,
                    kepler_name: row.kepler_name,
                    koi_disposition: row.koi_disposition,
                    koi_pdisposition: row.koi_pdisposition,
                    features: Json(row.features),
                    analysis_status: AnalysisStatus::Pending.as_str().to_string(),
                    latest_prediction: None,
                    latest_confidence: None,
                    analysis_notes: None,
                    quality_flags: None,
                    created_at,
                })
                .collect();
            t.candidates
                .extend(rows.iter().cloned().map(|row| (seq, row)));
            rows
        }))
    }

    async fn candidate_by_id(&self, id: Uuid) -> Result<Option<CandidateRow>, StoreError> {
        Ok(self.with(|t| {
            t.candidates
                .iter()
                .find(|(_, c)| c.id == id)
                .map(|(_, c)| c.clone())
        }))
    }

    async fn candidates_by_ids(&self, ids: &[Uuid]) -> Result<Vec<CandidateRow>, StoreError> {
        Ok(self.with(|t| {
            t.candidates
                .iter()
                .filter(|(_, c)| ids.contains(&c.id))
                .map(|(_, c)| c.clone())
                .collect()
        }))
    }

    async fn list_candidates(
        &self,
        filter: &CandidateFilter,
        page: Page,
    ) -> Result<Vec<CandidateRow>, StoreError> {
        Ok(self.with(|t| {
            let mut matching: Vec<&(u64, CandidateRow)> = t
                .candidates
                .iter()
                .filter(|(_, c)| filter.matches(c))
                .collect();
            matching.sort_by_key(|(seq, c)| (Reverse(*seq), c.row_number));
            page.apply(matching.into_iter().map(|(_, c)| c.clone()))
        }))
    }

    async fn correct_candidate(
        &self,
        id: Uuid,
        correction: CandidateCorrection,
    ) -> Result<Option<CandidateRow>, StoreError> {
        Ok(self.with(|t| {
            let (_, row) = t.candidates.iter_mut().find(|(_, c)| c.id == id)?;
            if correction.analysis_notes.is_some() {
                row.analysis_notes = correction.analysis_notes;
            }
            if correction.quality_flags.is_some() {
                row.quality_flags = correction.quality_flags;
            }
            Some(row.clone())
        }))
    }

    async fn set_analysis_status(
        &self,
        ids: &[Uuid],
        status: AnalysisStatus,
    ) -> Result<(), StoreError> {
        self.with(|t| {
            for (_, row) in t.candidates.iter_mut().filter(|(_, c)| ids.contains(&c.id)) {
                row.analysis_status = status.as_str().to_string();
            }
        });
        Ok(())
    }

    async fn delete_candidate(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.with(|t| {
            let before = t.candidates.len();
            t.candidates.retain(|(_, c)| c.id != id);
            t.results.retain(|r| r.candidate_id != id);
            t.feedback.retain(|f| f.candidate_id != id);
            t.sessions.retain(|s| s.candidate_id != id);
            t.candidates.len() < before
        }))
    }

    async fn insert_result(
        &self,
        result: NewAnalysisResult,
    ) -> Result<AnalysisResultRow, StoreError> {
        Ok(self.with(|t| {
            let row = AnalysisResultRow {
                id: Uuid::new_v4(),
                candidate_id: result.candidate_id,
                requested_by: result.requested_by,
                model_version: result.model_version,
                predicted_label: result.predicted_label,
                confidence: result.confidence,
                verdict: None,
                verdict_by: None,
                verdict_notes: None,
                verdict_at: None,
                created_at: Utc::now(),
            };
            if let Some((_, candidate)) = t
                .candidates
                .iter_mut()
                .find(|(_, c)| c.id == row.candidate_id)
            {
                candidate.analysis_status = AnalysisStatus::Completed.as_str().to_string();
                candidate.latest_prediction = Some(row.predicted_label.clone());
                candidate.latest_confidence = Some(row.confidence);
            }
            t.results.push(row.clone());
            row
        }))
    }

    async fn result_by_id(&self, id: Uuid) -> Result<Option<AnalysisResultRow>, StoreError> {
        Ok(self.with(|t| t.results.iter().find(|r| r.id == id).cloned()))
    }

    async fn results_for_candidate(
        &self,
        candidate_id: Uuid,
    ) -> Result<Vec<AnalysisResultRow>, StoreError> {
        // Insertion order reversed is newest first.
        Ok(self.with(|t| {
            t.results
                .iter()
                .rev()
                .filter(|r| r.candidate_id == candidate_id)
                .cloned()
                .collect()
        }))
    }

    async fn set_verdict(
        &self,
        result_id: Uuid,
        update: VerdictUpdate,
    ) -> Result<Option<AnalysisResultRow>, StoreError> {
        Ok(self.with(|t| {
            let row = t.results.iter_mut().find(|r| r.id == result_id)?;
            row.verdict = Some(update.verdict.as_str().to_string());
            row.verdict_by = Some(update.verdict_by);
            row.verdict_notes = update.notes;
            row.verdict_at = Some(update.at);
            Some(row.clone())
        }))
    }

    async fn insert_feedback(&self, feedback: NewFeedback) -> Result<FeedbackRow, StoreError> {
        self.with(|t| {
            if t.feedback.iter().any(|f| {
                f.candidate_id == feedback.candidate_id && f.researcher_id == feedback.researcher_id
            }) {
                return Err(StoreError::Conflict(
                    "You have already provided feedback for this candidate".into(),
                ));
            }
            let row = FeedbackRow {
                id: Uuid::new_v4(),
                candidate_id: feedback.candidate_id,
                researcher_id: feedback.researcher_id,
                expert_classification: feedback.expert_classification.as_str().to_string(),
                detailed_reasoning: feedback.detailed_reasoning,
                confidence_score: feedback.confidence_score,
                agrees_with_ai: feedback.agrees_with_ai,
                supporting_data_references: feedback.supporting_data_references,
                methodology_description: feedback.methodology_description,
                time_spent_minutes: feedback.time_spent_minutes,
                tools_used: feedback.tools_used,
                feedback_weight: feedback.feedback_weight,
                peer_review_status: "pending".into(),
                created_at: Utc::now(),
            };
            t.feedback.push(row.clone());
            Ok(row)
        })
    }

    async fn feedback_by_id(&self, id: Uuid) -> Result<Option<FeedbackRow>, StoreError> {
        Ok(self.with(|t| t.feedback.iter().find(|f| f.id == id).cloned()))
    }

    async fn feedback_for_candidate(
        &self,
        candidate_id: Uuid,
    ) -> Result<Vec<FeedbackRow>, StoreError> {
        Ok(self.with(|t| {
            t.feedback
                .iter()
                .rev()
                .filter(|f| f.candidate_id == candidate_id)
                .cloned()
                .collect()
        }))
    }

    async fn feedback_by_researcher(
        &self,
        researcher_id: Uuid,
        page: Page,
    ) -> Result<Vec<FeedbackRow>, StoreError> {
        Ok(self.with(|t| {
            page.apply(
                t.feedback
                    .iter()
                    .rev()
                    .filter(|f| f.researcher_id == researcher_id)
                    .cloned(),
            )
        }))
    }

    async fn count_feedback_by_researcher(&self, researcher_id: Uuid) -> Result<i64, StoreError> {
        Ok(self.with(|t| {
            t.feedback
                .iter()
                .filter(|f| f.researcher_id == researcher_id)
                .count() as i64
        }))
    }

    async fn update_feedback(
        &self,
        id: Uuid,
        update: FeedbackUpdate,
    ) -> Result<Option<FeedbackRow>, StoreError> {
        Ok(self.with(|t| {
            let row = t.feedback.iter_mut().find(|f| f.id == id)?;
            if let Some(c) = update.expert_classification {
                row.expert_classification = c.as_str().to_string();
            }
            if let Some(r) = update.detailed_reasoning {
                row.detailed_reasoning = r;
            }
            if let Some(c) = update.confidence_score {
                row.confidence_score = c;
            }
            if update.agrees_with_ai.is_some() {
                row.agrees_with_ai = update.agrees_with_ai;
            }
            if update.supporting_data_references.is_some() {
                row.supporting_data_references = update.supporting_data_references;
            }
            if update.methodology_description.is_some() {
                row.methodology_description = update.methodology_description;
            }
            if update.time_spent_minutes.is_some() {
                row.time_spent_minutes = update.time_spent_minutes;
            }
            if update.tools_used.is_some() {
                row.tools_used = update.tools_used;
            }
            Some(row.clone())
        }))
    }

    async fn delete_feedback(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.with(|t| {
            let before = t.feedback.len();
            t.feedback.retain(|f| f.id != id);
            t.feedback.len() < before
        }))
    }

    async fn insert_session(&self, session: NewSession) -> Result<SessionRow, StoreError> {
        Ok(self.with(|t| {
            let row = SessionRow {
                id: Uuid::new_v4(),
                candidate_id: session.candidate_id,
                researcher_id: session.researcher_id,
                session_timestamp: Utc::now(),
                time_spent_analyzing: 0,
                researcher_verdict: None,
                confidence_level: None,
                methodology_used: session.methodology_used,
                analysis_notes: session.analysis_notes,
                key_observations: session.key_observations,
                concerns_raised: session.concerns_raised,
                session_completed: false,
            };
            t.sessions.push(row.clone());
            row
        }))
    }

    async fn session_by_id(&self, id: Uuid) -> Result<Option<SessionRow>, StoreError> {
        Ok(self.with(|t| t.sessions.iter().find(|s| s.id == id).cloned()))
    }

    async fn sessions_for_candidate(
        &self,
        candidate_id: Uuid,
    ) -> Result<Vec<SessionRow>, StoreError> {
        Ok(self.with(|t| {
            t.sessions
                .iter()
                .rev()
                .filter(|s| s.candidate_id == candidate_id)
                .cloned()
                .collect()
        }))
    }

    async fn sessions_by_researcher(
        &self,
        researcher_id: Uuid,
        page: Page,
    ) -> Result<Vec<SessionRow>, StoreError> {
        Ok(self.with(|t| {
            page.apply(
                t.sessions
                    .iter()
                    .rev()
                    .filter(|s| s.researcher_id == researcher_id)
                    .cloned(),
            )
        }))
    }

    async fn update_session(
        &self,
        id: Uuid,
        update: SessionUpdate,
    ) -> Result<Option<SessionRow>, StoreError> {
        Ok(self.with(|t| {
            let row = t.sessions.iter_mut().find(|s| s.id == id)?;
            if let Some(v) = update.researcher_verdict {
                row.researcher_verdict = Some(v.as_str().to_string());
            }
            if update.confidence_level.is_some() {
                row.confidence_level = update.confidence_level;
            }
            if update.methodology_used.is_some() {
                row.methodology_used = update.methodology_used;
            }
            if update.analysis_notes.is_some() {
                row.analysis_notes = update.analysis_notes;
            }
            if update.key_observations.is_some() {
                row.key_observations = update.key_observations;
            }
            if update.concerns_raised.is_some() {
                row.concerns_raised = update.concerns_raised;
            }
            if let Some(seconds) = update.time_spent_analyzing {
                row.time_spent_analyzing = seconds;
            }
            if let Some(done) = update.session_completed {
                row.session_completed = done;
            }
            Some(row.clone())
        }))
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.with(|t| {
            let before = t.sessions.len();
            t.sessions.retain(|s| s.id != id);
            t.sessions.len() < before
        }))
    }
}

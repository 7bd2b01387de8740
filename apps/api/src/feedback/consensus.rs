use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::models::feedback::FeedbackRow;
use crate::models::user::UserRole;

const EXPERIENCE_STEP: f64 = 0.01;
const MAX_EXPERIENCE_MULTIPLIER: f64 = 2.0;

pub fn role_weight(role: UserRole) -> f64 {
    match role {
        UserRole::Researcher => 1.0,
        UserRole::Moderator => 1.2,
        UserRole::Admin => 1.5,
    }
}

/// Weight of a new entry: role weight scaled by the author's prior feedback
/// count, +1% per entry, capped at 2x.
pub fn feedback_weight(role: UserRole, previous_feedback: i64) -> f64 {
    let multiplier =
        (1.0 + previous_feedback.max(0) as f64 * EXPERIENCE_STEP).min(MAX_EXPERIENCE_MULTIPLIER);
    role_weight(role) * multiplier
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Consensus {
    pub candidate_id: Uuid,
    pub consensus_score: f64,
    pub total_feedback: usize,
    pub agreement_rate: f64,
    pub classification_breakdown: BTreeMap<String, usize>,
    pub average_confidence: f64,
    pub weighted_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResearcherStats {
    pub researcher_id: Uuid,
    pub total_feedback: usize,
    pub average_confidence: f64,
    pub classification_breakdown: BTreeMap<String, usize>,
    pub ai_agreement_rate: f64,
}

fn breakdown(entries: &[FeedbackRow]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.expert_classification.clone()).or_insert(0) += 1;
    }
    counts
}

fn agreement(entries: &[FeedbackRow]) -> f64 {
    let agreeing = entries
        .iter()
        .filter(|e| e.agrees_with_ai == Some(true))
        .count();
    agreeing as f64 / entries.len() as f64
}

fn mean_confidence(entries: &[FeedbackRow]) -> f64 {
    entries.iter().map(|e| e.confidence_score).sum::<f64>() / entries.len() as f64
}

pub fn consensus(candidate_id: Uuid, entries: &[FeedbackRow]) -> Consensus {
    if entries.is_empty() {
        return Consensus {
            candidate_id,
            consensus_score: 0.0,
            total_feedback: 0,
            agreement_rate: 0.0,
            classification_breakdown: BTreeMap::new(),
            average_confidence: 0.0,
            weighted_total: 0.0,
        };
    }

    let weighted_total: f64 = entries.iter().map(|e| e.feedback_weight).sum();
    let weighted_confidence: f64 = entries
        .iter()
        .map(|e| e.confidence_score * e.feedback_weight)
        .sum();

    Consensus {
        candidate_id,
        consensus_score: if weighted_total > 0.0 {
            weighted_confidence / weighted_total
        } else {
            0.0
        },
        total_feedback: entries.len(),
        agreement_rate: agreement(entries),
        classification_breakdown: breakdown(entries),
        average_confidence: mean_confidence(entries),
        weighted_total,
    }
}

pub fn researcher_stats(researcher_id: Uuid, entries: &[FeedbackRow]) -> ResearcherStats {
    if entries.is_empty() {
        return ResearcherStats {
            researcher_id,
            total_feedback: 0,
            average_confidence: 0.0,
            classification_breakdown: BTreeMap::new(),
            ai_agreement_rate: 0.0,
        };
    }
    ResearcherStats {
        researcher_id,
        total_feedback: entries.len(),
        average_confidence: mean_confidence(entries),
        classification_breakdown: breakdown(entries),
        ai_agreement_rate: agreement(entries),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(
        classification: &str,
        confidence: f64,
        weight: f64,
        agrees: Option<bool>,
    ) -> FeedbackRow {
        FeedbackRow {
            id: Uuid::new_v4(),
            candidate_id: Uuid::nil(),
            researcher_id: Uuid::new_v4(),
            expert_classification: classification.to_string(),
            detailed_reasoning: "transit shape".to_string(),
            confidence_score: confidence,
            agrees_with_ai: agrees,
            supporting_data_references: None,
            methodology_description: None,
            time_spent_minutes: None,
            tools_used: None,
            feedback_weight: weight,
            peer_review_status: "pending".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_weight_by_role_and_experience() {
        assert_eq!(feedback_weight(UserRole::Researcher, 0), 1.0);
        assert!((feedback_weight(UserRole::Moderator, 10) - 1.2 * 1.1).abs() < 1e-12);
        assert_eq!(feedback_weight(UserRole::Admin, 100), 3.0);
        assert_eq!(feedback_weight(UserRole::Admin, 5_000), 3.0);
    }

    #[test]
    fn test_consensus_is_weighted_mean() {
        let entries = vec![
            entry("CONFIRMED", 0.9, 2.0, Some(true)),
            entry("CONFIRMED", 0.6, 1.0, Some(false)),
            entry("FALSE_POSITIVE", 0.3, 1.0, None),
        ];
        let c = consensus(Uuid::nil(), &entries);
        assert!((c.consensus_score - (1.8 + 0.6 + 0.3) / 4.0).abs() < 1e-12);
        assert_eq!(c.total_feedback, 3);
        assert!((c.agreement_rate - 1.0 / 3.0).abs() < 1e-12);
        assert!((c.average_confidence - 0.6).abs() < 1e-12);
        assert_eq!(c.weighted_total, 4.0);
        assert_eq!(c.classification_breakdown["CONFIRMED"], 2);
        assert_eq!(c.classification_breakdown["FALSE_POSITIVE"], 1);
    }

    #[test]
    fn test_consensus_without_feedback_is_zero() {
        let c = consensus(Uuid::nil(), &[]);
        assert_eq!(c.consensus_score, 0.0);
        assert_eq!(c.total_feedback, 0);
        assert_eq!(c.weighted_total, 0.0);
        assert!(c.classification_breakdown.is_empty());
    }

    #[test]
    fn test_researcher_stats() {
        let entries = vec![
            entry("CANDIDATE", 0.5, 1.0, Some(true)),
            entry("CANDIDATE", 0.7, 1.0, Some(true)),
        ];
        let stats = researcher_stats(Uuid::nil(), &entries);
        assert_eq!(stats.total_feedback, 2);
        assert!((stats.average_confidence - 0.6).abs() < 1e-12);
        assert_eq!(stats.ai_agreement_rate, 1.0);
        assert_eq!(researcher_stats(Uuid::nil(), &[]).total_feedback, 0);
    }
}

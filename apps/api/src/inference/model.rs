use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::inference::features::DEFAULT_FEATURE_COLUMNS;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model not loaded")]
    NotLoaded,

    #[error("failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("model artifact is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid model artifact: {0}")]
    Invalid(String),

    #[error("expected {expected} features per row, got {got}")]
    FeatureMismatch { expected: usize, got: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

/// Batch classifier behind `AppState`. Implement this to swap model backends
/// without touching the analysis handlers.
pub trait Classifier: Send + Sync {
    fn model_version(&self) -> &str;

    /// Ordered input columns; `predict` rows must follow this order.
    fn feature_columns(&self) -> &[String];

    fn is_ready(&self) -> bool {
        true
    }

    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<Prediction>, ModelError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Artifact format
// ────────────────────────────────────────────────────────────────────────────

/// A class id as exported by the training pipeline: numeric or a label string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ClassId {
    Code(i64),
    Name(String),
}

impl ClassId {
    pub fn label(&self) -> String {
        match self {
            ClassId::Code(0) => "FALSE POSITIVE".to_string(),
            ClassId::Code(1) => "CONFIRMED".to_string(),
            ClassId::Code(2) => "CANDIDATE".to_string(),
            ClassId::Name(name)
                if matches!(name.as_str(), "FALSE POSITIVE" | "CONFIRMED" | "CANDIDATE") =>
            {
                name.clone()
            }
            ClassId::Code(other) => format!("UNKNOWN({other})"),
            ClassId::Name(other) => format!("UNKNOWN({other})"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelArtifact {
    pub model_version: String,
    pub feature_columns: Vec<String>,
    #[serde(default)]
    pub scaler: Option<Scaler>,
    pub classes: Vec<ClassId>,
    /// One row per class, or a single row for binary models.
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
    #[serde(default)]
    pub probability: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// LinearClassifier
// ────────────────────────────────────────────────────────────────────────────

/// Standard-scaled linear model (logistic regression or linear SVM export).
#[derive(Debug)]
pub struct LinearClassifier {
    artifact: ModelArtifact,
    labels: Vec<String>,
}

impl LinearClassifier {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path)?;
        let artifact: ModelArtifact = serde_json::from_str(&raw)?;
        Self::from_artifact(artifact)
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ModelError> {
        let n_features = artifact.feature_columns.len();
        if n_features == 0 {
            return Err(ModelError::Invalid("feature_columns is empty".into()));
        }
        if artifact.classes.len() < 2 {
            return Err(ModelError::Invalid("at least two classes are required".into()));
        }
        let expected_rows = if artifact.classes.len() == 2 {
            1
        } else {
            artifact.classes.len()
        };
        if artifact.coefficients.len() != expected_rows {
            return Err(ModelError::Invalid(format!(
                "expected {expected_rows} coefficient rows, found {}",
                artifact.coefficients.len()
            )));
        }
        if artifact.intercepts.len() != expected_rows {
            return Err(ModelError::Invalid(format!(
                "expected {expected_rows} intercepts, found {}",
                artifact.intercepts.len()
            )));
        }
        if let Some(row) = artifact.coefficients.iter().find(|r| r.len() != n_features) {
            return Err(ModelError::Invalid(format!(
                "coefficient row has {} weights for {n_features} features",
                row.len()
            )));
        }
        if let Some(scaler) = &artifact.scaler {
            if scaler.mean.len() != n_features || scaler.scale.len() != n_features {
                return Err(ModelError::Invalid(
                    "scaler dimensions do not match feature_columns".into(),
                ));
            }
            if scaler.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
                return Err(ModelError::Invalid("scaler has a zero or non-finite scale".into()));
            }
        }
        let labels = artifact.classes.iter().map(ClassId::label).collect();
        Ok(Self { artifact, labels })
    }

    fn scaled(&self, row: &[f64]) -> Vec<f64> {
        match &self.artifact.scaler {
            Some(s) => row
                .iter()
                .zip(s.mean.iter().zip(&s.scale))
                .map(|(x, (m, sc))| (x - m) / sc)
                .collect(),
            None => row.to_vec(),
        }
    }

    fn decision(&self, x: &[f64]) -> Vec<f64> {
        self.artifact
            .coefficients
            .iter()
            .zip(&self.artifact.intercepts)
            .map(|(w, b)| w.iter().zip(x).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect()
    }

    fn classify(&self, row: &[f64]) -> Prediction {
        let scores = self.decision(&self.scaled(row));

        let (class, confidence) = if scores.len() == 1 {
            let d = scores[0];
            let confidence = if self.artifact.probability {
                let p = sigmoid(d);
                p.max(1.0 - p)
            } else {
                sigmoid(d.abs())
            };
            (usize::from(d > 0.0), confidence)
        } else {
            let (class, winning) = scores
                .iter()
                .copied()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .unwrap_or((0, 0.0));
            let confidence = if self.artifact.probability {
                softmax_max(&scores)
            } else {
                sigmoid(winning.abs())
            };
            (class, confidence)
        };

        Prediction {
            label: self.labels[class].clone(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax_max(scores: &[f64]) -> f64 {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let total: f64 = scores.iter().map(|s| (s - max).exp()).sum();
    1.0 / total
}

impl Classifier for LinearClassifier {
    fn model_version(&self) -> &str {
        &self.artifact.model_version
    }

    fn feature_columns(&self) -> &[String] {
        &self.artifact.feature_columns
    }

    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<Prediction>, ModelError> {
        let expected = self.artifact.feature_columns.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != expected) {
            return Err(ModelError::FeatureMismatch {
                expected,
                got: bad.len(),
            });
        }
        Ok(rows.iter().map(|r| self.classify(r)).collect())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fallback when no artifact could be loaded
// ────────────────────────────────────────────────────────────────────────────

pub struct UnavailableClassifier {
    columns: Vec<String>,
}

impl UnavailableClassifier {
    pub fn new() -> Self {
        Self {
            columns: DEFAULT_FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Default for UnavailableClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for UnavailableClassifier {
    fn model_version(&self) -> &str {
        "unavailable"
    }

    fn feature_columns(&self) -> &[String] {
        &self.columns
    }

    fn is_ready(&self) -> bool {
        false
    }

    fn predict(&self, _rows: &[Vec<f64>]) -> Result<Vec<Prediction>, ModelError> {
        Err(ModelError::NotLoaded)
    }
}

/// Loads the artifact at `path`. A missing or broken artifact is logged and
/// the service runs with prediction disabled.
pub fn load_classifier(path: &str) -> Arc<dyn Classifier> {
    match LinearClassifier::load(path) {
        Ok(model) => {
            info!(
                "Loaded classifier '{}' from {} ({} features, {} classes)",
                model.model_version(),
                path,
                model.feature_columns().len(),
                model.labels.len()
            );
            Arc::new(model)
        }
        Err(e) => {
            error!("Could not load classifier from {path}: {e}. Prediction endpoints will return 503");
            Arc::new(UnavailableClassifier::new())
        }
    }
}

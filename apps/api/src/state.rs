use std::sync::Arc;

use crate::auth::token::TokenService;
use crate::config::Config;
use crate::inference::model::Classifier;
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Loaded once at startup. Falls back to `UnavailableClassifier` when the
    /// artifact is missing, in which case prediction routes answer 503.
    pub classifier: Arc<dyn Classifier>,
    pub tokens: TokenService,
    pub config: Config,
}

pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::auth::handlers as auth;
use crate::candidates::handlers as candidates;
use crate::feedback::handlers as feedback;
use crate::inference::handlers as analysis;
use crate::ingest::handlers as ingest;
use crate::sessions::handlers as sessions;
use crate::state::AppState;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/v1/auth/register", post(auth::handle_register))
        .route("/api/v1/auth/login", post(auth::handle_login))
        .route(
            "/api/v1/auth/me",
            get(auth::handle_me)
                .put(auth::handle_update_me)
                .delete(auth::handle_delete_me),
        )
        .route(
            "/api/v1/auth/me/change-password",
            post(auth::handle_change_password),
        )
        .route("/api/v1/auth/users", get(auth::handle_list_users))
        .route("/api/v1/auth/users/:id", get(auth::handle_get_user))
        // Data
        .route(
            "/api/v1/data/upload-csv",
            post(ingest::handle_upload_csv).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/v1/data/my-uploads", get(candidates::handle_my_uploads))
        .route(
            "/api/v1/data/candidates",
            get(candidates::handle_list_candidates),
        )
        .route(
            "/api/v1/data/candidates/:id",
            get(candidates::handle_get_candidate)
                .patch(candidates::handle_correct_candidate)
                .delete(candidates::handle_delete_candidate),
        )
        // Analysis
        .route("/api/v1/analysis/predict/:id", post(analysis::handle_predict))
        .route(
            "/api/v1/analysis/bulk-predict",
            post(analysis::handle_bulk_predict),
        )
        .route(
            "/api/v1/analysis/results/:id",
            get(analysis::handle_candidate_results),
        )
        .route(
            "/api/v1/analysis/results/:id/verdict",
            put(analysis::handle_set_verdict),
        )
        .route("/api/v1/analysis/pending", get(analysis::handle_pending))
        // Analysis sessions
        .route(
            "/api/v1/analysis/sessions",
            post(sessions::handle_create_session),
        )
        .route(
            "/api/v1/analysis/sessions/me",
            get(sessions::handle_my_sessions),
        )
        .route(
            "/api/v1/analysis/sessions/:id",
            get(sessions::handle_get_session)
                .put(sessions::handle_update_session)
                .delete(sessions::handle_delete_session),
        )
        .route(
            "/api/v1/analysis/sessions/candidate/:id",
            get(sessions::handle_candidate_sessions),
        )
        // Researcher feedback
        .route("/api/v1/feedback", post(feedback::handle_submit_feedback))
        .route("/api/v1/feedback/me", get(feedback::handle_my_feedback))
        .route("/api/v1/feedback/me/stats", get(feedback::handle_my_stats))
        .route(
            "/api/v1/feedback/candidates/:id",
            get(feedback::handle_candidate_feedback),
        )
        .route(
            "/api/v1/feedback/candidates/:id/consensus",
            get(feedback::handle_consensus),
        )
        .route(
            "/api/v1/feedback/researchers/:id/stats",
            get(feedback::handle_researcher_stats),
        )
        .route(
            "/api/v1/feedback/entries/:id",
            get(feedback::handle_get_feedback)
                .put(feedback::handle_update_feedback)
                .delete(feedback::handle_delete_feedback),
        )
        .with_state(state)
}

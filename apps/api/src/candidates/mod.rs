pub mod handlers;

use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::models::candidate::CandidateRow;
use crate::store::Store;

/// Researchers see their own uploads; admins and moderators see everything.
pub fn can_view(caller: &AuthUser, candidate: &CandidateRow) -> bool {
    caller.role().sees_all_candidates() || candidate.owner_id == caller.id()
}

/// Fetches a candidate the caller may see. Invisible and missing candidates
/// are indistinguishable to the caller.
pub async fn load_visible(
    store: &dyn Store,
    caller: &AuthUser,
    id: Uuid,
) -> Result<CandidateRow, AppError> {
    store
        .candidate_by_id(id)
        .await?
        .filter(|c| can_view(caller, c))
        .ok_or_else(|| AppError::NotFound("Candidate not found".into()))
}

/// The owner filter a caller is allowed to apply.
pub fn scoped_owner(caller: &AuthUser, requested: Option<Uuid>) -> Result<Option<Uuid>, AppError> {
    if caller.role().sees_all_candidates() {
        return Ok(requested);
    }
    match requested {
        Some(owner) if owner != caller.id() => Err(AppError::Forbidden(
            "Researchers can only list their own candidates".into(),
        )),
        _ => Ok(Some(caller.id())),
    }
}

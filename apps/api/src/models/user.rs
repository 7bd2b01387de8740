use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Researcher,
    Moderator,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Researcher => "researcher",
            UserRole::Moderator => "moderator",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "researcher" => Some(UserRole::Researcher),
            "moderator" => Some(UserRole::Moderator),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }

    /// Admins and moderators see every researcher's candidates.
    pub fn sees_all_candidates(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Moderator)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub verification_status: String,
    pub full_name: Option<String>,
    pub research_specialization: Option<String>,
    pub organization_id: Option<String>,
    pub bio: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserRow {
    pub fn role(&self) -> UserRole {
        UserRole::parse(&self.role).unwrap_or(UserRole::Researcher)
    }
}

/// Everything the owner may see about their own account.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub verification_status: String,
    pub full_name: Option<String>,
    pub research_specialization: Option<String>,
    pub organization_id: Option<String>,
    pub bio: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<UserRow> for UserResponse {
    fn from(row: UserRow) -> Self {
        UserResponse {
            id: row.id,
            username: row.username,
            email: row.email,
            role: row.role,
            verification_status: row.verification_status,
            full_name: row.full_name,
            research_specialization: row.research_specialization,
            organization_id: row.organization_id,
            bio: row.bio,
            is_active: row.is_active,
            created_at: row.created_at,
            last_login: row.last_login,
        }
    }
}

/// Projection shown to other researchers.
#[derive(Debug, Clone, Serialize)]
pub struct UserPublic {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub research_specialization: Option<String>,
    pub verification_status: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for UserPublic {
    fn from(row: UserRow) -> Self {
        UserPublic {
            id: row.id,
            username: row.username,
            full_name: row.full_name,
            research_specialization: row.research_specialization,
            verification_status: row.verification_status,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub full_name: Option<String>,
    pub research_specialization: Option<String>,
    pub organization_id: Option<String>,
    pub bio: Option<String>,
}

/// Partial profile update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub research_specialization: Option<String>,
    pub organization_id: Option<String>,
    pub bio: Option<String>,
}

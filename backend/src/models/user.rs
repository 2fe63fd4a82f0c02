use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::auth::Role;
use crate::models::{
    assignment::AssignmentView, organization::OrgSummary, workplace::WorkplaceSummary,
};

/// Full user record as stored in the database.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub org_id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub position: Option<String>,
    pub role: Role,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Subset returned to the client (no password hash).
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub org_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub position: Option<String>,
    pub role: Role,
    pub is_active: bool,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            org_id: u.org_id,
            email: u.email,
            full_name: u.full_name,
            position: u.position,
            role: u.role,
            is_active: u.is_active,
        }
    }
}

/// Compact user identity embedded in assignment views.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub position: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            full_name: u.full_name.clone(),
            position: u.position.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    /// Only honoured for super admins; everyone else creates into their own org.
    pub org_id: Option<Uuid>,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    pub full_name: Option<String>,
    pub position: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub org_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub position: Option<String>,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

/// `GET /api/auth/me`: the caller, their organization and where they sit now.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub org: Option<OrgSummary>,
    pub current_assignment: Option<AssignmentView>,
}

#[derive(Debug, Serialize)]
pub struct CurrentWorkplaceResponse {
    pub workplace: Option<WorkplaceSummary>,
    pub assignment: Option<AssignmentView>,
    pub history: Vec<AssignmentView>,
}

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

/// A physical place members can be assigned to.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Workplace {
    pub id: Uuid,
    pub org_id: Uuid,
    pub code: String,
    pub name: String,
    pub location: Option<String>,
    pub capacity: Option<i32>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkplaceSummary {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub location: Option<String>,
}

impl From<&Workplace> for WorkplaceSummary {
    fn from(w: &Workplace) -> Self {
        Self {
            id: w.id,
            code: w.code.clone(),
            name: w.name.clone(),
            location: w.location.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWorkplaceRequest {
    #[validate(length(min = 1, max = 32, message = "code must be 1-32 characters"))]
    pub code: String,
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub location: Option<String>,
    #[validate(range(min = 1, message = "capacity must be positive"))]
    pub capacity: Option<i32>,
    pub is_active: Option<bool>,
}

/// Partial update. `location: null` clears the location; omitted fields are
/// left as they are.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateWorkplaceRequest {
    #[validate(length(min = 1, max = 32, message = "code must be 1-32 characters"))]
    pub code: Option<String>,
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub location: Option<Option<String>>,
    #[validate(range(min = 1, message = "capacity must be positive"))]
    pub capacity: Option<i32>,
    pub is_active: Option<bool>,
}

impl UpdateWorkplaceRequest {
    /// Applies the patch on top of `existing`.
    pub fn merge(self, existing: &Workplace, at: OffsetDateTime) -> Workplace {
        Workplace {
            code: self
                .code
                .map(|c| c.trim().to_string())
                .unwrap_or_else(|| existing.code.clone()),
            name: self.name.unwrap_or_else(|| existing.name.clone()),
            location: self.location.unwrap_or_else(|| existing.location.clone()),
            capacity: self.capacity.or(existing.capacity),
            is_active: self.is_active.unwrap_or(existing.is_active),
            updated_at: at,
            ..existing.clone()
        }
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone)]
pub struct NewWorkplace {
    pub org_id: Uuid,
    pub code: String,
    pub name: String,
    pub location: Option<String>,
    pub capacity: Option<i32>,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct WorkplaceListParams {
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Storage-level workplace filter. `search` matches code, name or location
/// case-insensitively.
#[derive(Debug, Clone)]
pub struct WorkplaceFilter {
    pub org_id: Uuid,
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub limit: i64,
    pub offset: i64,
}

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::profile::repo_types::Profile;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub monthly_budget: Option<f64>,
    pub occupation: Option<String>,
    #[serde(with = "crate::serde_date::iso::option")]
    pub date_of_birth: Option<Date>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// True until a monthly budget has been set.
    pub needs_onboarding: bool,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        let needs_onboarding = p.budget().is_none();
        Self {
            id: p.id,
            email: p.email,
            name: p.name,
            monthly_budget: p.monthly_budget,
            occupation: p.occupation,
            date_of_birth: p.date_of_birth,
            created_at: p.created_at,
            needs_onboarding,
        }
    }
}

/// Onboarding and account edits. Absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub occupation: Option<String>,
    #[serde(default, with = "crate::serde_date::iso::option")]
    pub date_of_birth: Option<Date>,
    pub monthly_budget: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBudgetRequest {
    pub monthly_budget: f64,
}

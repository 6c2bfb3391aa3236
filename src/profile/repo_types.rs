use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Profile row; `id` is the owning user's id.
#[derive(Debug, Clone, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub monthly_budget: Option<f64>, // NUMERIC(12,2), read back as float8
    pub occupation: Option<String>,
    pub date_of_birth: Option<Date>,
    pub created_at: OffsetDateTime,
}

impl Profile {
    /// Budget usable by the analytics, `None` while unset or non-positive.
    pub fn budget(&self) -> Option<f64> {
        self.monthly_budget.filter(|b| *b > 0.0)
    }
}

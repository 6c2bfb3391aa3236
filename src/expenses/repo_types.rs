use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::analytics::Expense;

/// Where an expense came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpenseSource {
    Manual,
    Statement,
}

impl ExpenseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Statement => "statement",
        }
    }
}

/// Expense row in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ExpenseRecord {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub amount: f64, // NUMERIC(12,2), read back as float8
    #[serde(with = "crate::serde_date::iso")]
    pub date: Date,
    pub category: String,
    pub merchant: Option<String>,
    pub source: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&ExpenseRecord> for Expense {
    fn from(r: &ExpenseRecord) -> Self {
        Expense {
            amount: r.amount,
            date: r.date,
            category: Some(r.category.clone()),
            merchant: r.merchant.clone(),
        }
    }
}

/// Validated input for one insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub amount: f64,
    pub date: Date,
    pub category: String,
    pub merchant: Option<String>,
    pub source: ExpenseSource,
}

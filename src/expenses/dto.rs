use serde::Deserialize;
use time::Date;

#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    pub amount: f64,
    pub category: String,
    pub merchant: Option<String>,
    /// Defaults to today (UTC) when absent.
    #[serde(default, with = "crate::serde_date::iso::option")]
    pub date: Option<Date>,
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: Option<String>,
}

//! Deterministic spending arithmetic: momentum, projections, grouping,
//! chart series and the rule-based predictor.
//!
//! Nothing in here touches the database or the network. Callers load the
//! expenses and budget, pick `today`, and hand them over.

pub mod calendar;
pub mod charts;
pub mod momentum;
pub mod predictor;
pub mod projections;
pub mod spending;

use serde::Serialize;
use time::Date;

/// Category used when an expense carries none.
pub const FALLBACK_CATEGORY: &str = "Other";

/// The slice of an expense record the arithmetic cares about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expense {
    pub amount: f64,
    pub date: Date,
    pub category: Option<String>,
    pub merchant: Option<String>,
}

impl Expense {
    pub fn new(amount: f64, date: Date) -> Self {
        Self {
            amount,
            date,
            category: None,
            merchant: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Category label, blank or missing ones folded into [`FALLBACK_CATEGORY`].
    pub fn category_label(&self) -> &str {
        match self.category.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => c,
            _ => FALLBACK_CATEGORY,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::Expense;
    use time::{Date, Month};

    pub fn day(year: i32, month: u8, day: u8) -> Date {
        let month = Month::try_from(month).expect("valid month");
        Date::from_calendar_date(year, month, day).expect("valid date")
    }

    pub fn spend(amount: f64, date: Date, category: &str) -> Expense {
        Expense::new(amount, date).with_category(category)
    }
}

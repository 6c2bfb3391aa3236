use std::collections::BTreeMap;

use serde::Serialize;
use time::Date;

use super::{
    calendar::{days_elapsed, days_in_month, week_of_month},
    spending::{get_average_daily_spend, get_total_spent, round_currency},
    Expense,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectionStatus {
    Under,
    Over,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendProjection {
    pub projected_spend: f64,
    pub status: ProjectionStatus,
    pub delta_from_budget: f64,
    pub message: String,
}

const UNDER_MESSAGE: &str = "At this pace, you'll stay under budget";
const OVER_MESSAGE: &str = "At this pace, you may exceed your budget";

/// Extrapolate the average daily spend so far to the whole month.
pub fn get_projected_month_end_spend(
    expenses: &[Expense],
    monthly_budget: f64,
    today: Date,
) -> SpendProjection {
    let elapsed = days_elapsed(today);
    if elapsed == 0 || expenses.is_empty() {
        return SpendProjection {
            projected_spend: 0.0,
            status: ProjectionStatus::Under,
            delta_from_budget: monthly_budget,
            message: UNDER_MESSAGE.to_string(),
        };
    }

    let avg_daily = get_average_daily_spend(expenses, elapsed);
    let projected_spend = round_currency(avg_daily * f64::from(days_in_month(today)));
    let delta_from_budget = round_currency(monthly_budget - projected_spend);
    let (status, message) = if projected_spend <= monthly_budget {
        (ProjectionStatus::Under, UNDER_MESSAGE)
    } else {
        (ProjectionStatus::Over, OVER_MESSAGE)
    };

    SpendProjection {
        projected_spend,
        status,
        delta_from_budget,
        message: message.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyBreakdown {
    pub week: String,
    pub week_number: u32,
    pub total: f64,
}

pub(crate) fn weekly_totals(expenses: &[Expense]) -> BTreeMap<u32, f64> {
    let mut weeks = BTreeMap::new();
    for e in expenses {
        *weeks.entry(week_of_month(e.date)).or_insert(0.0) += e.amount;
    }
    weeks
}

/// Days 1-7, 8-14, 15-21, 22-28 and 29-end, in week order.
pub fn group_expenses_by_week(expenses: &[Expense]) -> Vec<WeeklyBreakdown> {
    weekly_totals(expenses)
        .into_iter()
        .map(|(week_number, total)| WeeklyBreakdown {
            week: format!("Week {week_number}"),
            week_number,
            total: round_currency(total),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub total: f64,
    pub percentage: f64,
}

pub(crate) fn category_totals(expenses: &[Expense]) -> Vec<(String, f64)> {
    let mut categories: BTreeMap<&str, f64> = BTreeMap::new();
    for e in expenses {
        *categories.entry(e.category_label()).or_insert(0.0) += e.amount;
    }
    let mut totals: Vec<(String, f64)> = categories
        .into_iter()
        .map(|(c, t)| (c.to_string(), t))
        .collect();
    totals.sort_by(|a, b| b.1.total_cmp(&a.1));
    totals
}

/// Largest category first.
pub fn group_expenses_by_category(expenses: &[Expense]) -> Vec<CategoryBreakdown> {
    let total_spent = get_total_spent(expenses);
    category_totals(expenses)
        .into_iter()
        .map(|(category, total)| CategoryBreakdown {
            category,
            total: round_currency(total),
            percentage: if total_spent == 0.0 {
                0.0
            } else {
                round_currency(total / total_spent * 100.0)
            },
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyBreakdown {
    pub day: u32,
    #[serde(with = "crate::serde_date::iso")]
    pub date: Date,
    pub total: f64,
}

pub fn group_expenses_by_day(expenses: &[Expense]) -> Vec<DailyBreakdown> {
    let mut days: BTreeMap<u32, (Date, f64)> = BTreeMap::new();
    for e in expenses {
        days.entry(days_elapsed(e.date)).or_insert((e.date, 0.0)).1 += e.amount;
    }
    days.into_iter()
        .map(|(day, (date, total))| DailyBreakdown {
            day,
            date,
            total: round_currency(total),
        })
        .collect()
}

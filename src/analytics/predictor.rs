//! Local, explainable spend predictor.
//!
//! A least-squares trend over the daily spend series plus a handful of
//! threshold rules. The constants are product-tuned and carry no statistical
//! meaning beyond "looked right on real statements".

use std::collections::BTreeMap;

use serde::Serialize;
use time::{Date, Duration};

use super::{
    calendar::{days_in_month, is_weekend},
    momentum::{get_momentum, Momentum},
    projections::category_totals,
    spending::{get_average_daily_spend, round_currency},
    Expense,
};

const RISK_SHARE_OF_BUDGET: f64 = 0.9;
const RISING_SLOPE: f64 = 0.5;
const HOT_MOMENTUM_RATIO: f64 = 1.1;
const WEEKEND_HEAVY_RATIO: f64 = 0.4;
const VOLATILE_VARIANCE: f64 = 20.0;
const MIN_CONFIDENCE: f64 = 0.5;

/// Spend over the `n` days ending at `today`, both ends included.
pub fn last_n_days_spend(expenses: &[Expense], n: u32, today: Date) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let cutoff = today - Duration::days(i64::from(n) - 1);
    expenses
        .iter()
        .filter(|e| e.date >= cutoff && e.date <= today)
        .map(|e| e.amount)
        .sum()
}

/// One total per calendar day, oldest first, ending at `today`.
pub fn daily_spend_series(expenses: &[Expense], days: u32, today: Date) -> Vec<f64> {
    (0..i64::from(days))
        .rev()
        .map(|back| {
            let day = today - Duration::days(back);
            expenses
                .iter()
                .filter(|e| e.date == day)
                .map(|e| e.amount)
                .sum()
        })
        .collect()
}

/// Least-squares slope of the series against its index.
pub fn spend_trend_slope(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n as f64 - 1.0) / 2.0;
    let y_mean = series.iter().sum::<f64>() / n as f64;
    let (num, den) = series
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - x_mean;
            (num + dx * (y - y_mean), den + dx * dx)
        });
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Last value minus first value.
pub fn spend_velocity(series: &[f64]) -> f64 {
    match (series.first(), series.last()) {
        (Some(first), Some(last)) if series.len() >= 2 => last - first,
        _ => 0.0,
    }
}

/// Population variance.
pub fn spend_variance(series: &[f64]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Share of spend that landed on a Saturday or Sunday.
pub fn weekend_ratio(expenses: &[Expense]) -> f64 {
    let (weekend, total) = expenses.iter().fold((0.0, 0.0), |(weekend, total), e| {
        let weekend = if is_weekend(e.date) {
            weekend + e.amount
        } else {
            weekend
        };
        (weekend, total + e.amount)
    });
    if total == 0.0 {
        0.0
    } else {
        weekend / total
    }
}

pub fn category_ratios(expenses: &[Expense]) -> BTreeMap<String, f64> {
    let totals = category_totals(expenses);
    let total: f64 = totals.iter().map(|(_, t)| t).sum();
    totals
        .into_iter()
        .map(|(category, t)| {
            let ratio = if total == 0.0 { 0.0 } else { t / total };
            (category, ratio)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictorFeatures {
    pub avg_daily_spend: f64,
    pub last_7_days_spend: f64,
    pub last_14_days_spend: f64,
    pub daily_spend_series: Vec<f64>,
    pub spend_trend_slope: f64,
    pub spend_velocity: f64,
    pub momentum: Momentum,
    pub spend_variance: f64,
    pub weekend_ratio: f64,
    pub category_ratios: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainedModel {
    pub slope: f64,
    pub intercept: f64,
    pub variance: f64,
    #[serde(with = "crate::serde_date::iso")]
    pub last_trained: Date,
    pub features: PredictorFeatures,
}

pub fn train_spending_model(
    expenses: &[Expense],
    monthly_budget: f64,
    days: u32,
    today: Date,
) -> TrainedModel {
    let series = daily_spend_series(expenses, days, today);
    let slope = spend_trend_slope(&series);
    let intercept = series.first().copied().unwrap_or(0.0);
    let variance = spend_variance(&series);

    TrainedModel {
        slope,
        intercept,
        variance,
        last_trained: today,
        features: PredictorFeatures {
            avg_daily_spend: get_average_daily_spend(expenses, days),
            last_7_days_spend: last_n_days_spend(expenses, 7, today),
            last_14_days_spend: last_n_days_spend(expenses, 14, today),
            spend_trend_slope: slope,
            spend_velocity: spend_velocity(&series),
            momentum: get_momentum(monthly_budget, expenses, today),
            spend_variance: variance,
            weekend_ratio: weekend_ratio(expenses),
            category_ratios: category_ratios(expenses),
            daily_spend_series: series,
        },
    }
}

/// `slope * offset + intercept`, never below zero.
pub fn predict_daily_spend(model: &TrainedModel, day_offset: u32) -> f64 {
    round_currency((model.slope * f64::from(day_offset) + model.intercept).max(0.0))
}

pub fn predict_next_n_days(model: &TrainedModel, n: u32) -> f64 {
    round_currency((0..n).map(|i| predict_daily_spend(model, i)).sum())
}

pub fn predict_month_end(model: &TrainedModel, days_left: u32) -> f64 {
    predict_next_n_days(model, days_left)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskStatus {
    Safe,
    Risk,
    OverBudget,
}

pub fn get_budget_risk_status(projected_month_end: f64, budget: f64) -> (RiskStatus, f64) {
    if projected_month_end > budget {
        (RiskStatus::OverBudget, 1.0)
    } else if projected_month_end > RISK_SHARE_OF_BUDGET * budget {
        (RiskStatus::Risk, 0.7)
    } else {
        (RiskStatus::Safe, 0.2)
    }
}

pub fn generate_explanations(model: &TrainedModel, budget: f64, projected: f64) -> Vec<String> {
    let checks = [
        (
            model.slope > RISING_SLOPE,
            "Daily spending is increasing week over week.",
        ),
        (
            model.features.momentum.ratio > HOT_MOMENTUM_RATIO,
            "Momentum is above safe range.",
        ),
        (
            model.features.weekend_ratio > WEEKEND_HEAVY_RATIO,
            "Weekend spending is consistently higher.",
        ),
        (
            model.variance > VOLATILE_VARIANCE,
            "Spending variance is increasing.",
        ),
        (
            projected > budget,
            "Projected to exceed your budget this month.",
        ),
    ];
    let mut lines: Vec<String> = checks
        .iter()
        .filter(|(hit, _)| *hit)
        .map(|(_, line)| line.to_string())
        .collect();
    if lines.is_empty() {
        lines.push("Spending is steady and within a healthy range.".to_string());
    }
    lines
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub next_7_days: f64,
    pub next_14_days: f64,
    pub month_end: f64,
    pub status: RiskStatus,
    pub risk_score: f64,
    pub confidence: f64,
    pub explanation: Vec<String>,
}

/// Train on the month so far and project the rest of it.
///
/// The training window runs up to the latest day of month seen in
/// `expenses` (or today's day of month when there are none).
pub fn run_spending_prediction(expenses: &[Expense], budget: f64, today: Date) -> PredictionResult {
    let days_elapsed = expenses
        .iter()
        .map(|e| u32::from(e.date.day()))
        .max()
        .unwrap_or_else(|| u32::from(today.day()));
    let days_left = days_in_month(today).saturating_sub(days_elapsed);

    let model = train_spending_model(expenses, budget, days_elapsed, today);
    let next_7_days = predict_next_n_days(&model, 7);
    let next_14_days = predict_next_n_days(&model, 14);
    let month_end = predict_month_end(&model, days_left);
    let (status, risk_score) = get_budget_risk_status(month_end, budget);
    let confidence = (1.0 - model.variance / 100.0).max(MIN_CONFIDENCE);
    let explanation = generate_explanations(&model, budget, month_end);

    PredictionResult {
        next_7_days,
        next_14_days,
        month_end,
        status,
        risk_score,
        confidence: round_currency(confidence),
        explanation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::fixtures::{day, spend};

    #[test]
    fn slope_of_linear_series() {
        assert_eq!(spend_trend_slope(&[1.0, 2.0, 3.0, 4.0]), 1.0);
        assert_eq!(spend_trend_slope(&[5.0, 5.0, 5.0]), 0.0);
        assert_eq!(spend_trend_slope(&[7.0]), 0.0);
        assert_eq!(spend_trend_slope(&[]), 0.0);
    }

    #[test]
    fn variance_and_velocity() {
        assert_eq!(spend_variance(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 4.0);
        assert_eq!(spend_variance(&[]), 0.0);
        assert_eq!(spend_velocity(&[3.0, 10.0, 8.0]), 5.0);
        assert_eq!(spend_velocity(&[3.0]), 0.0);
    }

    #[test]
    fn series_is_oldest_first() {
        let today = day(2024, 6, 5);
        let expenses = vec![
            spend(10.0, day(2024, 6, 3), "Food"),
            spend(4.0, day(2024, 6, 5), "Food"),
            spend(6.0, day(2024, 6, 5), "Food"),
        ];
        assert_eq!(daily_spend_series(&expenses, 3, today), [10.0, 0.0, 10.0]);
        assert_eq!(last_n_days_spend(&expenses, 2, today), 10.0);
        assert_eq!(last_n_days_spend(&expenses, 3, today), 20.0);
    }

    #[test]
    fn weekend_and_category_ratios() {
        // 2024-06-15 Saturday, 2024-06-17 Monday
        let expenses = vec![
            spend(30.0, day(2024, 6, 15), "Food"),
            spend(70.0, day(2024, 6, 17), "Bills"),
        ];
        assert_eq!(weekend_ratio(&expenses), 0.3);
        assert_eq!(weekend_ratio(&[]), 0.0);
        let ratios = category_ratios(&expenses);
        assert_eq!(ratios["Bills"], 0.7);
        assert_eq!(ratios["Food"], 0.3);
    }

    #[test]
    fn risk_thresholds() {
        assert_eq!(get_budget_risk_status(1100.0, 1000.0).0, RiskStatus::OverBudget);
        assert_eq!(get_budget_risk_status(950.0, 1000.0), (RiskStatus::Risk, 0.7));
        assert_eq!(get_budget_risk_status(500.0, 1000.0), (RiskStatus::Safe, 0.2));
    }

    #[test]
    fn predictions_never_go_negative() {
        let today = day(2024, 6, 3);
        let expenses = vec![spend(30.0, day(2024, 6, 1), "Food")];
        let model = train_spending_model(&expenses, 1000.0, 3, today);
        assert!(model.slope < 0.0);
        assert_eq!(predict_daily_spend(&model, 0), 30.0);
        assert_eq!(predict_daily_spend(&model, 10), 0.0);
    }

    #[test]
    fn steady_spender_is_safe() {
        let today = day(2024, 6, 10);
        let expenses: Vec<_> = (1..=10)
            .map(|d| spend(10.0, day(2024, 6, d), "Food"))
            .collect();
        let result = run_spending_prediction(&expenses, 1000.0, today);
        assert_eq!(result.next_7_days, 70.0);
        assert_eq!(result.next_14_days, 140.0);
        assert_eq!(result.month_end, 200.0);
        assert_eq!(result.status, RiskStatus::Safe);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(
            result.explanation,
            ["Spending is steady and within a healthy range."]
        );
    }

    #[test]
    fn overspender_is_flagged() {
        let today = day(2024, 6, 10);
        let expenses: Vec<_> = (1..=10)
            .map(|d| spend(f64::from(d) * 10.0, day(2024, 6, d), "Food"))
            .collect();
        let result = run_spending_prediction(&expenses, 300.0, today);
        assert_eq!(result.status, RiskStatus::OverBudget);
        assert_eq!(result.risk_score, 1.0);
        assert_eq!(result.confidence, 0.5);
        assert!(result
            .explanation
            .iter()
            .any(|l| l == "Projected to exceed your budget this month."));
        assert!(result
            .explanation
            .iter()
            .any(|l| l == "Daily spending is increasing week over week."));
    }
}

use serde::Serialize;
use time::{Date, Duration};

use super::{
    calendar::{days_elapsed, days_in_month},
    spending::{get_ideal_spend_by_today, get_total_spent, round_currency},
    Expense,
};

pub const COLOR_NEUTRAL: &str = "#8C8577";
pub const COLOR_SAFE: &str = "#7BC47F";
pub const COLOR_BALANCED: &str = "#D4AF37";
pub const COLOR_RISK: &str = "#FF6B6B";

const SAFE_BELOW: f64 = 0.9;
const BALANCED_UP_TO: f64 = 1.1;

/// Runway narrative and advice when no monthly budget is set.
pub const NO_BUDGET_MESSAGE: &str = "Set a budget to see momentum.";

/// Lookback used for the recent daily pace in [`compute_runway`].
pub const RUNWAY_LOOKBACK_DAYS: u32 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MomentumStatus {
    Safe,
    Balanced,
    Risk,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Momentum {
    pub ratio: f64,
    pub status: MomentumStatus,
    pub message: String,
    pub color: &'static str,
    pub actual_spend: f64,
    pub ideal_spend: f64,
}

impl Momentum {
    fn safe(message: &str, color: &'static str, ideal_spend: f64) -> Self {
        Self {
            ratio: 0.0,
            status: MomentumStatus::Safe,
            message: message.to_string(),
            color,
            actual_spend: 0.0,
            ideal_spend,
        }
    }
}

/// Classify month-to-date spend against the pro-rated budget.
///
/// A zero or negative budget, the opening day of a month with nothing spent
/// and a month with no spend at all are all reported as `SAFE` with ratio 0.
pub fn get_momentum(monthly_budget: f64, expenses: &[Expense], today: Date) -> Momentum {
    if monthly_budget <= 0.0 {
        return Momentum::safe(
            "Set a budget to start tracking your flow.",
            COLOR_NEUTRAL,
            0.0,
        );
    }

    let total_days = days_in_month(today);
    let elapsed = days_elapsed(today);
    let actual_spend = round_currency(get_total_spent(expenses));
    let ideal_spend = round_currency(get_ideal_spend_by_today(
        monthly_budget,
        elapsed,
        total_days,
    ));

    if actual_spend == 0.0 {
        if elapsed <= 1 {
            return Momentum::safe("Your month is just starting.", COLOR_SAFE, ideal_spend);
        }
        return Momentum::safe(
            "You're spending slower than your ideal pace",
            COLOR_SAFE,
            ideal_spend,
        );
    }

    let ratio = if ideal_spend == 0.0 {
        0.0
    } else {
        actual_spend / ideal_spend
    };

    let (status, message, color) = if ratio < SAFE_BELOW {
        (
            MomentumStatus::Safe,
            "You're spending slower than your ideal pace",
            COLOR_SAFE,
        )
    } else if ratio <= BALANCED_UP_TO {
        (
            MomentumStatus::Balanced,
            "You're right on track this month",
            COLOR_BALANCED,
        )
    } else {
        (
            MomentumStatus::Risk,
            "You're spending faster than planned",
            COLOR_RISK,
        )
    };

    Momentum {
        ratio: round_currency(ratio),
        status,
        message: message.to_string(),
        color,
        actual_spend,
        ideal_spend,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// How long the remaining budget lasts at the recent daily pace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Runway {
    pub budget_amount: f64,
    pub total_spent: f64,
    /// Unclamped: negative once the month is overspent.
    pub remaining: f64,
    pub days_in_month: u32,
    pub days_remaining: u32,
    pub expected_daily: f64,
    pub recent_daily: f64,
    pub runway_drift: f64,
    pub buffer_days_lost: f64,
    pub confidence: Confidence,
}

/// Spend per day over the `lookback_days` ending at `today`, inclusive.
pub fn recent_daily_average(expenses: &[Expense], today: Date, lookback_days: u32) -> f64 {
    if lookback_days == 0 {
        return 0.0;
    }
    let cutoff = today - Duration::days(i64::from(lookback_days) - 1);
    let recent: f64 = expenses
        .iter()
        .filter(|e| e.date >= cutoff && e.date <= today)
        .map(|e| e.amount)
        .sum();
    recent / f64::from(lookback_days)
}

pub fn compute_runway(
    budget_amount: f64,
    total_spent: f64,
    today: Date,
    recent_expenses: &[Expense],
) -> Runway {
    let total_days = days_in_month(today);
    let days_remaining = total_days.saturating_sub(days_elapsed(today)) + 1;
    let remaining = budget_amount - total_spent;

    let expected_daily = remaining / f64::from(days_remaining);
    let recent_daily = recent_daily_average(recent_expenses, today, RUNWAY_LOOKBACK_DAYS);
    let runway_drift = recent_daily - expected_daily;
    let buffer_days_lost = if expected_daily > 0.0 {
        runway_drift * f64::from(days_remaining) / expected_daily
    } else {
        0.0
    };

    let recent_count = recent_expenses.len();
    let confidence = if recent_count >= 7 {
        Confidence::High
    } else if recent_count >= 3 {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    Runway {
        budget_amount,
        total_spent: round_currency(total_spent),
        remaining: round_currency(remaining),
        days_in_month: total_days,
        days_remaining,
        expected_daily: round_currency(expected_daily),
        recent_daily: round_currency(recent_daily),
        runway_drift: round_currency(runway_drift),
        buffer_days_lost: round_currency(buffer_days_lost),
        confidence,
    }
}

fn days_until_empty(runway: &Runway) -> i64 {
    let days = f64::from(runway.days_remaining) - runway.buffer_days_lost.abs();
    (days as i64).max(1)
}

pub fn runway_narrative(runway: &Runway) -> String {
    if runway.remaining < 0.0 {
        return format!(
            "You've spent {:.2} over budget this month. Consider slowing discretionary spending.",
            runway.remaining.abs()
        );
    }
    if runway.buffer_days_lost > 5.0 {
        return format!(
            "At your current pace, you'll run out of budget in about {} days. Consider reviewing your spending.",
            days_until_empty(runway)
        );
    }
    if runway.buffer_days_lost > 2.0 {
        return format!(
            "You're tracking slightly above your daily target. You have about {} days remaining.",
            runway.days_remaining
        );
    }
    if runway.buffer_days_lost < -5.0 {
        return "You're well below your daily target. You're on track to stay under budget."
            .to_string();
    }
    format!(
        "You're tracking on pace. {} days remaining in the month.",
        runway.days_remaining
    )
}

/// Exactly one sentence.
pub fn runway_advice(runway: &Runway) -> String {
    if runway.buffer_days_lost > 5.0 {
        return format!(
            "At your current pace, budget runs out in about {} days.",
            days_until_empty(runway)
        );
    }
    if runway.buffer_days_lost > 2.0 {
        return "You're tracking slightly above your daily target with days remaining."
            .to_string();
    }
    if runway.remaining <= 0.0 {
        return "You've spent your monthly budget.".to_string();
    }
    "You're tracking on pace with your monthly budget.".to_string()
}

pub fn gentle_suggestions(runway: &Runway) -> Vec<String> {
    let lines: &[&str] = if runway.remaining < 0.0 {
        &[
            "Pause non-essential purchases until the month resets.",
            "Look over this month's largest categories.",
        ]
    } else if runway.buffer_days_lost > 2.0 {
        &[
            "A lighter spending day or two this week would close the gap.",
            "Check recurring purchases for anything you can skip.",
        ]
    } else if runway.buffer_days_lost < -5.0 {
        &["You have room to spare; consider setting some aside."]
    } else {
        &[]
    };
    lines.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::fixtures::{day, spend};

    #[test]
    fn no_budget_is_safe() {
        let today = day(2024, 6, 15);
        let m = get_momentum(0.0, &[spend(500.0, today, "Food")], today);
        assert_eq!(m.status, MomentumStatus::Safe);
        assert_eq!(m.ratio, 0.0);
        assert_eq!(m.message, "Set a budget to start tracking your flow.");
        assert_eq!(m.actual_spend, 0.0);
    }

    #[test]
    fn first_day_without_spend() {
        let today = day(2024, 6, 1);
        let m = get_momentum(3000.0, &[], today);
        assert_eq!(m.status, MomentumStatus::Safe);
        assert_eq!(m.message, "Your month is just starting.");
        assert_eq!(m.ideal_spend, 100.0);
    }

    #[test]
    fn zero_spend_mid_month() {
        let today = day(2024, 6, 15);
        let m = get_momentum(3000.0, &[], today);
        assert_eq!(m.status, MomentumStatus::Safe);
        assert_eq!(m.ideal_spend, 1500.0);
        assert_eq!(m.actual_spend, 0.0);
    }

    #[test]
    fn classifies_by_ratio() {
        let today = day(2024, 6, 15);
        let safe = get_momentum(3000.0, &[spend(600.0, today, "Food")], today);
        assert_eq!(safe.status, MomentumStatus::Safe);
        assert_eq!(safe.ratio, 0.4);

        let balanced = get_momentum(3000.0, &[spend(1500.0, today, "Food")], today);
        assert_eq!(balanced.status, MomentumStatus::Balanced);
        assert_eq!(balanced.ratio, 1.0);
        assert_eq!(balanced.color, COLOR_BALANCED);

        let edge = get_momentum(3000.0, &[spend(1650.0, today, "Food")], today);
        assert_eq!(edge.status, MomentumStatus::Balanced);

        let risk = get_momentum(3000.0, &[spend(2000.0, today, "Food")], today);
        assert_eq!(risk.status, MomentumStatus::Risk);
        assert_eq!(risk.ratio, 1.33);
        assert_eq!(risk.message, "You're spending faster than planned");
    }

    #[test]
    fn status_serializes_uppercase() {
        let json = serde_json::to_string(&MomentumStatus::Balanced).unwrap();
        assert_eq!(json, "\"BALANCED\"");
    }

    #[test]
    fn recent_average_uses_lookback_window() {
        let today = day(2024, 6, 20);
        let expenses = vec![
            spend(140.0, day(2024, 6, 20), "Food"),
            spend(70.0, day(2024, 6, 7), "Food"),
            spend(1000.0, day(2024, 6, 6), "Rent"),
        ];
        assert_eq!(recent_daily_average(&expenses, today, 14), 15.0);
        assert_eq!(recent_daily_average(&expenses, today, 0), 0.0);
    }

    #[test]
    fn runway_on_pace() {
        // June has 30 days; on the 16th there are 15 days left including today.
        let today = day(2024, 6, 16);
        let recent: Vec<_> = (3..=16)
            .map(|d| spend(100.0, day(2024, 6, d), "Food"))
            .collect();
        let runway = compute_runway(3000.0, 1500.0, today, &recent);
        assert_eq!(runway.days_remaining, 15);
        assert_eq!(runway.expected_daily, 100.0);
        assert_eq!(runway.recent_daily, 100.0);
        assert_eq!(runway.runway_drift, 0.0);
        assert_eq!(runway.buffer_days_lost, 0.0);
        assert_eq!(runway.confidence, Confidence::High);
        assert_eq!(
            runway_narrative(&runway),
            "You're tracking on pace. 15 days remaining in the month."
        );
        assert_eq!(
            runway_advice(&runway),
            "You're tracking on pace with your monthly budget."
        );
        assert!(gentle_suggestions(&runway).is_empty());
    }

    #[test]
    fn runway_overspent() {
        let today = day(2024, 6, 16);
        let runway = compute_runway(1000.0, 1250.0, today, &[]);
        assert_eq!(runway.remaining, -250.0);
        assert_eq!(runway.buffer_days_lost, 0.0);
        assert_eq!(runway.confidence, Confidence::Low);
        assert!(runway_narrative(&runway).contains("250.00 over budget"));
        assert_eq!(runway_advice(&runway), "You've spent your monthly budget.");
        assert_eq!(gentle_suggestions(&runway).len(), 2);
    }

    #[test]
    fn runway_running_hot() {
        let today = day(2024, 6, 16);
        // expected 50/day, recent 100/day → drift 50, buffer lost 15 days
        let recent: Vec<_> = (3..=16)
            .map(|d| spend(100.0, day(2024, 6, d), "Food"))
            .collect();
        let runway = compute_runway(2250.0, 1500.0, today, &recent);
        assert_eq!(runway.expected_daily, 50.0);
        assert_eq!(runway.buffer_days_lost, 15.0);
        assert_eq!(
            runway_advice(&runway),
            "At your current pace, budget runs out in about 1 days."
        );
    }
}

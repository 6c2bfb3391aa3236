use super::Expense;

pub fn get_total_spent(expenses: &[Expense]) -> f64 {
    expenses.iter().map(|e| e.amount).sum()
}

/// Average spend per elapsed day, 0 before the month has started.
pub fn get_average_daily_spend(expenses: &[Expense], days_elapsed: u32) -> f64 {
    if days_elapsed == 0 {
        return 0.0;
    }
    get_total_spent(expenses) / f64::from(days_elapsed)
}

/// Budget pro-rated linearly across the month.
pub fn get_ideal_spend_by_today(monthly_budget: f64, days_elapsed: u32, days_in_month: u32) -> f64 {
    if days_in_month == 0 {
        return 0.0;
    }
    (monthly_budget / f64::from(days_in_month)) * f64::from(days_elapsed)
}

/// Remaining budget, clamped at zero once overspent.
pub fn get_remaining_budget(monthly_budget: f64, total_spent: f64) -> f64 {
    (monthly_budget - total_spent).max(0.0)
}

pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Largest value the `NUMERIC(12, 2)` amount columns hold.
pub const MAX_AMOUNT: f64 = 9_999_999_999.99;

/// Rounds to cents. `None` unless the result is positive and fits the amount columns.
pub fn storable_amount(amount: f64) -> Option<f64> {
    let rounded = round_currency(amount);
    (rounded.is_finite() && rounded > 0.0 && rounded <= MAX_AMOUNT).then_some(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::fixtures::day;

    #[test]
    fn total_sums_amounts() {
        let d = day(2024, 6, 3);
        let expenses = vec![Expense::new(10.0, d), Expense::new(5.0, d)];
        assert_eq!(get_total_spent(&expenses), 15.0);
        assert_eq!(get_total_spent(&[]), 0.0);
    }

    #[test]
    fn average_daily_guards_zero_days() {
        assert_eq!(get_average_daily_spend(&[], 0), 0.0);
        assert_eq!(get_average_daily_spend(&[], 12), 0.0);

        let d = day(2024, 6, 3);
        let expenses = vec![Expense::new(30.0, d), Expense::new(15.0, d)];
        assert_eq!(get_average_daily_spend(&expenses, 0), 0.0);
        assert_eq!(get_average_daily_spend(&expenses, 3), 15.0);
    }

    #[test]
    fn storable_amounts_fit_the_column() {
        assert_eq!(storable_amount(12.346), Some(12.35));
        assert_eq!(storable_amount(MAX_AMOUNT), Some(MAX_AMOUNT));
        assert_eq!(storable_amount(0.001), None);
        assert_eq!(storable_amount(-3.0), None);
        assert_eq!(storable_amount(1e10), None);
        assert_eq!(storable_amount(f64::NAN), None);
    }

    #[test]
    fn ideal_spend_pro_rates_budget() {
        assert_eq!(get_ideal_spend_by_today(3000.0, 15, 30), 1500.0);
        assert_eq!(get_ideal_spend_by_today(3000.0, 15, 0), 0.0);
        assert_eq!(get_ideal_spend_by_today(0.0, 15, 30), 0.0);
    }

    #[test]
    fn remaining_is_clamped() {
        assert_eq!(get_remaining_budget(1000.0, 1200.0), 0.0);
        assert_eq!(get_remaining_budget(1000.0, 250.5), 749.5);
    }

    #[test]
    fn rounds_to_cents() {
        assert_eq!(round_currency(10.126), 10.13);
        assert_eq!(round_currency(10.124), 10.12);
        assert_eq!(round_currency(1.0 / 3.0), 0.33);
    }
}

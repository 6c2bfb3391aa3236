use sqlx::PgPool;
use time::{Date, Duration};
use uuid::Uuid;

use crate::analytics::{
    calendar::{days_elapsed, days_in_month, MonthKey},
    charts::{
        polyline_points, prepare_bar_chart_data, prepare_line_chart_data,
        prepare_momentum_chart_data, prepare_pie_chart_data, ChartFrame, ChartPoint,
    },
    momentum::{
        compute_runway, gentle_suggestions, get_momentum, runway_advice, runway_narrative, Runway,
        NO_BUDGET_MESSAGE, RUNWAY_LOOKBACK_DAYS,
    },
    projections::{
        get_projected_month_end_spend, group_expenses_by_category, group_expenses_by_day,
        group_expenses_by_week,
    },
    spending::{
        get_average_daily_spend, get_ideal_spend_by_today, get_remaining_budget, get_total_spent,
        round_currency,
    },
    Expense,
};
use crate::expenses::repo::list_between;
use crate::insights::dto::{
    AdviceResponse, BreakdownResponse, ChartsResponse, RunwayResponse, SummaryResponse,
};
use crate::profile;

/// Everything the insight endpoints compute from.
#[derive(Debug, Clone)]
pub struct InsightContext {
    pub today: Date,
    pub month: MonthKey,
    pub budget: f64,
    /// Expenses dated in the current month up to any date.
    pub month_expenses: Vec<Expense>,
    /// Expenses in the runway lookback window ending today.
    pub recent_expenses: Vec<Expense>,
}

pub async fn load_context(db: &PgPool, user_id: Uuid, today: Date) -> anyhow::Result<InsightContext> {
    let month = MonthKey::containing(today);
    let budget = profile::repo::monthly_budget(db, user_id).await?;

    let month_expenses: Vec<Expense> =
        list_between(db, user_id, month.first_day(), month.next_month_first_day())
            .await?
            .iter()
            .map(Expense::from)
            .collect();

    let lookback_start = today - Duration::days(i64::from(RUNWAY_LOOKBACK_DAYS) - 1);
    let recent_expenses: Vec<Expense> = if lookback_start >= month.first_day() {
        month_expenses
            .iter()
            .filter(|e| e.date >= lookback_start && e.date <= today)
            .cloned()
            .collect()
    } else {
        list_between(db, user_id, lookback_start, today + Duration::days(1))
            .await?
            .iter()
            .map(Expense::from)
            .collect()
    };

    Ok(InsightContext {
        today,
        month,
        budget,
        month_expenses,
        recent_expenses,
    })
}

pub fn summary(ctx: &InsightContext) -> SummaryResponse {
    let elapsed = days_elapsed(ctx.today);
    let total_spent = get_total_spent(&ctx.month_expenses);
    SummaryResponse {
        month: ctx.month,
        budget: ctx.budget,
        total_spent: round_currency(total_spent),
        remaining: round_currency(get_remaining_budget(ctx.budget, total_spent)),
        average_daily: round_currency(get_average_daily_spend(&ctx.month_expenses, elapsed)),
        ideal_by_today: round_currency(get_ideal_spend_by_today(
            ctx.budget,
            elapsed,
            days_in_month(ctx.today),
        )),
        momentum: get_momentum(ctx.budget, &ctx.month_expenses, ctx.today),
        projection: get_projected_month_end_spend(&ctx.month_expenses, ctx.budget, ctx.today),
    }
}

pub fn breakdown(ctx: &InsightContext) -> BreakdownResponse {
    BreakdownResponse {
        weekly: group_expenses_by_week(&ctx.month_expenses),
        daily: group_expenses_by_day(&ctx.month_expenses),
        categories: group_expenses_by_category(&ctx.month_expenses),
    }
}

pub fn charts(ctx: &InsightContext, frame: &ChartFrame) -> ChartsResponse {
    let momentum = prepare_momentum_chart_data(&ctx.month_expenses, ctx.month.first_day(), frame);
    let polyline = polyline_points(
        &momentum
            .points
            .iter()
            .map(|p| ChartPoint { x: p.x, y: p.y })
            .collect::<Vec<_>>(),
    );
    ChartsResponse {
        line: prepare_line_chart_data(&ctx.month_expenses, ctx.budget, ctx.today),
        pie: prepare_pie_chart_data(&ctx.month_expenses),
        bar: prepare_bar_chart_data(&ctx.month_expenses),
        momentum,
        polyline,
    }
}

/// Runway only exists against a positive budget.
fn budget_runway(ctx: &InsightContext) -> Option<Runway> {
    (ctx.budget > 0.0).then(|| {
        let total_spent = get_total_spent(&ctx.month_expenses);
        compute_runway(ctx.budget, total_spent, ctx.today, &ctx.recent_expenses)
    })
}

pub fn runway(ctx: &InsightContext) -> RunwayResponse {
    match budget_runway(ctx) {
        Some(runway) => RunwayResponse {
            narrative: runway_narrative(&runway),
            suggestions: gentle_suggestions(&runway),
            runway: Some(runway),
        },
        None => RunwayResponse {
            runway: None,
            narrative: NO_BUDGET_MESSAGE.to_string(),
            suggestions: Vec::new(),
        },
    }
}

pub fn advice(ctx: &InsightContext) -> AdviceResponse {
    AdviceResponse {
        month: ctx.month,
        advice: budget_runway(ctx)
            .map_or_else(|| NO_BUDGET_MESSAGE.to_string(), |r| runway_advice(&r)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::fixtures::{day, spend};
    use crate::analytics::momentum::MomentumStatus;

    fn context(budget: f64, expenses: Vec<Expense>, today: Date) -> InsightContext {
        InsightContext {
            today,
            month: MonthKey::containing(today),
            budget,
            recent_expenses: expenses.clone(),
            month_expenses: expenses,
        }
    }

    #[test]
    fn summary_of_a_half_spent_month() {
        let today = day(2024, 6, 15);
        let ctx = context(
            3000.0,
            vec![
                spend(1000.0, day(2024, 6, 3), "Bills"),
                spend(500.0, day(2024, 6, 10), "Food"),
            ],
            today,
        );
        let s = summary(&ctx);
        assert_eq!(s.month.to_string(), "2024-06");
        assert_eq!(s.total_spent, 1500.0);
        assert_eq!(s.remaining, 1500.0);
        assert_eq!(s.average_daily, 100.0);
        assert_eq!(s.ideal_by_today, 1500.0);
        assert_eq!(s.momentum.status, MomentumStatus::Balanced);
    }

    #[test]
    fn breakdown_groups_the_same_expenses_three_ways() {
        let today = day(2024, 6, 20);
        let ctx = context(
            1000.0,
            vec![
                spend(30.0, day(2024, 6, 2), "Food"),
                spend(10.0, day(2024, 6, 2), "Transport"),
                spend(60.0, day(2024, 6, 16), "Food"),
            ],
            today,
        );
        let b = breakdown(&ctx);
        assert_eq!(b.weekly.len(), 2);
        assert_eq!(b.daily.len(), 2);
        assert_eq!(b.categories[0].category, "Food");
        let pct: f64 = b.categories.iter().map(|c| c.percentage).sum();
        assert!((pct - 100.0).abs() < 0.1);
    }

    #[test]
    fn charts_share_points_between_path_and_polyline() {
        let today = day(2024, 6, 5);
        let ctx = context(
            600.0,
            vec![
                spend(20.0, day(2024, 6, 1), "Food"),
                spend(40.0, day(2024, 6, 3), "Food"),
            ],
            today,
        );
        let c = charts(&ctx, &ChartFrame::default());
        assert_eq!(c.line.len(), 5);
        assert_eq!(c.momentum.points.len(), 2);
        assert_eq!(c.polyline.split(' ').count(), 2);
        assert!(c.momentum.path.starts_with('M'));
    }

    #[test]
    fn overspent_month_gets_overspend_narrative_and_advice() {
        let today = day(2024, 6, 20);
        let ctx = context(100.0, vec![spend(150.0, day(2024, 6, 18), "Food")], today);
        let r = runway(&ctx);
        assert!(r.runway.as_ref().is_some_and(|rw| rw.remaining < 0.0));
        assert!(r.narrative.contains("over budget"));
        assert!(!r.suggestions.is_empty());
        assert_eq!(advice(&ctx).month.to_string(), "2024-06");
    }

    #[test]
    fn no_budget_asks_for_one_instead_of_overspending() {
        let today = day(2024, 6, 20);
        let ctx = context(0.0, vec![spend(50.0, day(2024, 6, 18), "Food")], today);
        let r = runway(&ctx);
        assert!(r.runway.is_none());
        assert_eq!(r.narrative, NO_BUDGET_MESSAGE);
        assert!(r.suggestions.is_empty());
        assert_eq!(advice(&ctx).advice, NO_BUDGET_MESSAGE);

        let json = serde_json::to_value(&r).unwrap();
        assert!(json["runway"].is_null());
    }
}

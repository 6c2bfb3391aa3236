use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use time::Date;

use super::{
    calendar::{days_elapsed, days_in_month},
    projections::{category_totals, group_expenses_by_day, weekly_totals},
    spending::{get_total_spent, round_currency},
    Expense,
};

const UNKNOWN_CATEGORY_COLOR: &str = "#6B7280";
const Y_STEPS: f64 = 5.0;

fn category_color(category: &str) -> &'static str {
    match category {
        "Food" => "#D4AF37",
        "Transport" => "#FFD966",
        "Entertainment" => "#B8B2A7",
        "Shopping" => "#8C8577",
        "Bills" => "#EDE7DB",
        "Healthcare" => "#FF6B6B",
        "Other" => "#2A2E35",
        _ => UNKNOWN_CATEGORY_COLOR,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineChartPoint {
    pub day: u32,
    pub actual_cumulative: f64,
    pub ideal_cumulative: f64,
}

/// Cumulative actual vs ideal spend for each day up to today.
pub fn prepare_line_chart_data(
    expenses: &[Expense],
    monthly_budget: f64,
    today: Date,
) -> Vec<LineChartPoint> {
    let total_days = days_in_month(today);
    let daily_ideal = monthly_budget / f64::from(total_days);
    let daily: HashMap<u32, f64> = group_expenses_by_day(expenses)
        .into_iter()
        .map(|d| (d.day, d.total))
        .collect();

    let mut cumulative = 0.0;
    (1..=days_elapsed(today))
        .map(|day| {
            cumulative += daily.get(&day).copied().unwrap_or(0.0);
            LineChartPoint {
                day,
                actual_cumulative: round_currency(cumulative),
                ideal_cumulative: round_currency(daily_ideal * f64::from(day)),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieSlice {
    pub category: String,
    pub value: f64,
    pub percentage: f64,
    pub color: &'static str,
}

pub fn prepare_pie_chart_data(expenses: &[Expense]) -> Vec<PieSlice> {
    let total = get_total_spent(expenses);
    category_totals(expenses)
        .into_iter()
        .map(|(category, value)| PieSlice {
            color: category_color(&category),
            percentage: if total == 0.0 {
                0.0
            } else {
                round_currency(value / total * 100.0)
            },
            value: round_currency(value),
            category,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarChartPoint {
    pub label: String,
    pub value: f64,
}

pub fn prepare_bar_chart_data(expenses: &[Expense]) -> Vec<BarChartPoint> {
    weekly_totals(expenses)
        .into_iter()
        .map(|(week, value)| BarChartPoint {
            label: format!("W{week}"),
            value: round_currency(value),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ChartFrame {
    pub width: f64,
    pub height: f64,
    pub padding: Padding,
}

impl Default for ChartFrame {
    fn default() -> Self {
        Self {
            width: 340.0,
            height: 200.0,
            padding: Padding {
                top: 16.0,
                right: 16.0,
                bottom: 28.0,
                left: 40.0,
            },
        }
    }
}

impl ChartFrame {
    fn plot_width(&self) -> f64 {
        self.width - self.padding.left - self.padding.right
    }

    fn plot_height(&self) -> f64 {
        self.height - self.padding.top - self.padding.bottom
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MomentumChartPoint {
    pub day: i64,
    pub amount: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAmount {
    pub day: i64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MomentumChartData {
    pub points: Vec<MomentumChartPoint>,
    pub max_amount: f64,
    pub daily_data: Vec<DailyAmount>,
    /// Smoothed SVG path through `points`.
    pub path: String,
}

/// Daily totals since `start` (day 1 = `start`) laid out inside `frame`.
/// Expenses dated before `start` are ignored.
pub fn prepare_momentum_chart_data(
    expenses: &[Expense],
    start: Date,
    frame: &ChartFrame,
) -> MomentumChartData {
    let mut days: BTreeMap<i64, f64> = BTreeMap::new();
    for e in expenses {
        let since_start = (e.date - start).whole_days() + 1;
        if since_start > 0 {
            *days.entry(since_start).or_insert(0.0) += e.amount;
        }
    }

    let daily_data: Vec<DailyAmount> = days
        .into_iter()
        .map(|(day, amount)| DailyAmount {
            day,
            amount: round_currency(amount),
        })
        .collect();

    let max_amount = daily_data.iter().map(|d| d.amount).fold(0.0, f64::max);
    let y_top = (max_amount / Y_STEPS).ceil() * Y_STEPS;
    let span = daily_data.len().saturating_sub(1).max(1) as f64;

    let points: Vec<MomentumChartPoint> = daily_data
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let x = frame.padding.left + (i as f64 / span) * frame.plot_width();
            let scaled = if y_top == 0.0 { 0.0 } else { d.amount / y_top };
            let y = frame.padding.top + frame.plot_height() - scaled * frame.plot_height();
            MomentumChartPoint {
                day: d.day,
                amount: d.amount,
                x: round_currency(x),
                y: round_currency(y),
            }
        })
        .collect();

    let path = smooth_path(
        &points
            .iter()
            .map(|p| ChartPoint { x: p.x, y: p.y })
            .collect::<Vec<_>>(),
    );

    MomentumChartData {
        points,
        max_amount,
        daily_data,
        path,
    }
}

/// `x,y x,y ...` for an SVG polyline.
pub fn polyline_points(points: &[ChartPoint]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

/// SVG path through `points` using cubic bezier segments whose control
/// points sit half way along the x distance to the next point.
pub fn smooth_path(points: &[ChartPoint]) -> String {
    let Some(first) = points.first() else {
        return String::new();
    };
    let mut path = format!("M {},{}", first.x, first.y);
    for pair in points.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        let offset = (next.x - current.x) * 0.5;
        let _ = write!(
            path,
            " C {},{} {},{} {},{}",
            current.x + offset,
            current.y,
            next.x - offset,
            next.y,
            next.x,
            next.y
        );
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::fixtures::{day, spend};

    #[test]
    fn line_chart_accumulates_to_today() {
        let today = day(2024, 6, 4);
        let expenses = vec![
            spend(30.0, day(2024, 6, 1), "Food"),
            spend(10.0, day(2024, 6, 3), "Food"),
            spend(5.0, day(2024, 6, 3), "Transport"),
        ];
        let points = prepare_line_chart_data(&expenses, 3000.0, today);
        assert_eq!(points.len(), 4);
        let actual: Vec<_> = points.iter().map(|p| p.actual_cumulative).collect();
        assert_eq!(actual, [30.0, 30.0, 45.0, 45.0]);
        assert_eq!(points[3].ideal_cumulative, 400.0);
    }

    #[test]
    fn pie_uses_palette_and_fallback_color() {
        let d = day(2024, 6, 2);
        let slices = prepare_pie_chart_data(&[spend(75.0, d, "Food"), spend(25.0, d, "Pets")]);
        assert_eq!(slices[0].category, "Food");
        assert_eq!(slices[0].color, "#D4AF37");
        assert_eq!(slices[0].percentage, 75.0);
        assert_eq!(slices[1].color, UNKNOWN_CATEGORY_COLOR);
        assert!(prepare_pie_chart_data(&[]).is_empty());
    }

    #[test]
    fn bar_chart_labels_weeks() {
        let expenses = vec![
            spend(5.0, day(2024, 6, 16), "Food"),
            spend(7.0, day(2024, 6, 2), "Food"),
        ];
        let bars = prepare_bar_chart_data(&expenses);
        let labels: Vec<_> = bars.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["W1", "W3"]);
    }

    #[test]
    fn momentum_chart_layout() {
        let frame = ChartFrame {
            width: 120.0,
            height: 70.0,
            padding: Padding {
                top: 10.0,
                right: 10.0,
                bottom: 10.0,
                left: 10.0,
            },
        };
        let start = day(2024, 6, 1);
        let expenses = vec![
            spend(50.0, day(2024, 6, 1), "Food"),
            spend(25.0, day(2024, 6, 3), "Food"),
            spend(99.0, day(2024, 5, 31), "Food"),
        ];
        let data = prepare_momentum_chart_data(&expenses, start, &frame);
        assert_eq!(data.daily_data.len(), 2);
        assert_eq!(data.max_amount, 50.0);
        assert_eq!(data.points[0].x, 10.0);
        assert_eq!(data.points[0].y, 10.0);
        assert_eq!(data.points[1].x, 110.0);
        assert_eq!(data.points[1].y, 35.0);
        assert_eq!(data.path, "M 10,10 C 60,10 60,35 110,35");
    }

    #[test]
    fn momentum_chart_empty() {
        let data = prepare_momentum_chart_data(&[], day(2024, 6, 1), &ChartFrame::default());
        assert!(data.points.is_empty());
        assert_eq!(data.max_amount, 0.0);
        assert!(data.path.is_empty());
    }

    #[test]
    fn polyline_joins_points() {
        let pts = [ChartPoint { x: 1.0, y: 2.5 }, ChartPoint { x: 3.0, y: 4.0 }];
        assert_eq!(polyline_points(&pts), "1,2.5 3,4");
        assert_eq!(smooth_path(&pts[..1]), "M 1,2.5");
    }
}

use serde::{Deserialize, Serialize};

use crate::analytics::{
    calendar::MonthKey,
    charts::{BarChartPoint, LineChartPoint, MomentumChartData, PieSlice},
    momentum::{Momentum, Runway},
    projections::{CategoryBreakdown, DailyBreakdown, SpendProjection, WeeklyBreakdown},
};

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub month: MonthKey,
    pub budget: f64,
    pub total_spent: f64,
    pub remaining: f64,
    pub average_daily: f64,
    pub ideal_by_today: f64,
    pub momentum: Momentum,
    pub projection: SpendProjection,
}

#[derive(Debug, Serialize)]
pub struct BreakdownResponse {
    pub weekly: Vec<WeeklyBreakdown>,
    pub daily: Vec<DailyBreakdown>,
    pub categories: Vec<CategoryBreakdown>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ChartsResponse {
    pub line: Vec<LineChartPoint>,
    pub pie: Vec<PieSlice>,
    pub bar: Vec<BarChartPoint>,
    pub momentum: MomentumChartData,
    /// Same points as `momentum.path`, for a straight-segment polyline.
    pub polyline: String,
}

#[derive(Debug, Serialize)]
pub struct RunwayResponse {
    /// `None` until the user sets a monthly budget.
    pub runway: Option<Runway>,
    pub narrative: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AdviceResponse {
    pub month: MonthKey,
    pub advice: String,
}

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    analytics::{
        charts::ChartFrame,
        momentum::{get_momentum, Momentum},
        predictor::{run_spending_prediction, PredictionResult},
        projections::{get_projected_month_end_spend, SpendProjection},
    },
    auth::services::AuthUser,
    error::{ApiError, ApiResult},
    insights::{
        dto::{
            AdviceResponse, BreakdownResponse, ChartQuery, ChartsResponse, RunwayResponse,
            SummaryResponse,
        },
        services::{self, load_context, InsightContext},
    },
    state::AppState,
};

const MAX_CHART_SIDE: f64 = 4096.0;

pub fn insight_routes() -> Router<AppState> {
    Router::new()
        .route("/insights/summary", get(summary))
        .route("/insights/momentum", get(momentum))
        .route("/insights/projection", get(projection))
        .route("/insights/breakdown", get(breakdown))
        .route("/insights/charts", get(charts))
        .route("/insights/prediction", get(prediction))
        .route("/insights/runway", get(runway))
        .route("/insights/advice", get(advice))
}

async fn context_for(state: &AppState, user_id: Uuid) -> ApiResult<InsightContext> {
    let today = OffsetDateTime::now_utc().date();
    let ctx = load_context(&state.db, user_id, today).await?;
    debug!(
        user_id = %user_id,
        month = %ctx.month,
        expenses = ctx.month_expenses.len(),
        budget = ctx.budget,
        "insight context loaded"
    );
    Ok(ctx)
}

/// Default frame with the requested size; the padding stays fixed.
pub(crate) fn chart_frame(q: &ChartQuery) -> ApiResult<ChartFrame> {
    let mut frame = ChartFrame::default();
    let min_width = frame.padding.left + frame.padding.right;
    let min_height = frame.padding.top + frame.padding.bottom;
    let side = |value: Option<f64>, default: f64, min: f64| match value {
        None => Ok(default),
        Some(v) if v.is_finite() && v > min && v <= MAX_CHART_SIDE => Ok(v),
        Some(_) => Err(ApiError::bad_request("Invalid chart size")),
    };
    frame.width = side(q.width, frame.width, min_width)?;
    frame.height = side(q.height, frame.height, min_height)?;
    Ok(frame)
}

#[instrument(skip(state))]
pub async fn summary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<SummaryResponse>> {
    let ctx = context_for(&state, user_id).await?;
    Ok(Json(services::summary(&ctx)))
}

#[instrument(skip(state))]
pub async fn momentum(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Momentum>> {
    let ctx = context_for(&state, user_id).await?;
    Ok(Json(get_momentum(ctx.budget, &ctx.month_expenses, ctx.today)))
}

#[instrument(skip(state))]
pub async fn projection(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<SpendProjection>> {
    let ctx = context_for(&state, user_id).await?;
    Ok(Json(get_projected_month_end_spend(
        &ctx.month_expenses,
        ctx.budget,
        ctx.today,
    )))
}

#[instrument(skip(state))]
pub async fn breakdown(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<BreakdownResponse>> {
    let ctx = context_for(&state, user_id).await?;
    Ok(Json(services::breakdown(&ctx)))
}

#[instrument(skip(state))]
pub async fn charts(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ChartQuery>,
) -> ApiResult<Json<ChartsResponse>> {
    let frame = chart_frame(&q)?;
    let ctx = context_for(&state, user_id).await?;
    Ok(Json(services::charts(&ctx, &frame)))
}

#[instrument(skip(state))]
pub async fn prediction(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<PredictionResult>> {
    let ctx = context_for(&state, user_id).await?;
    Ok(Json(run_spending_prediction(
        &ctx.month_expenses,
        ctx.budget,
        ctx.today,
    )))
}

#[instrument(skip(state))]
pub async fn runway(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<RunwayResponse>> {
    let ctx = context_for(&state, user_id).await?;
    Ok(Json(services::runway(&ctx)))
}

#[instrument(skip(state))]
pub async fn advice(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<AdviceResponse>> {
    let ctx = context_for(&state, user_id).await?;
    Ok(Json(services::advice(&ctx)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_size_defaults_and_overrides() {
        let frame = chart_frame(&ChartQuery::default()).unwrap();
        assert_eq!(frame, ChartFrame::default());

        let frame = chart_frame(&ChartQuery {
            width: Some(600.0),
            height: None,
        })
        .unwrap();
        assert_eq!(frame.width, 600.0);
        assert_eq!(frame.height, 200.0);
    }

    #[test]
    fn chart_size_must_leave_room_for_padding() {
        for (width, height) in [(Some(50.0), None), (None, Some(-1.0)), (Some(1e9), None)] {
            assert!(chart_frame(&ChartQuery { width, height }).is_err());
        }
    }
}

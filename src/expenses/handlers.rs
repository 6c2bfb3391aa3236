use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use time::{Date, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::{
    analytics::{calendar::MonthKey, spending::storable_amount},
    auth::services::AuthUser,
    error::{ApiError, ApiResult},
    expenses::{
        dto::{CreateExpenseRequest, MonthQuery},
        repo,
        repo_types::{ExpenseRecord, ExpenseSource, NewExpense},
        services::{clean_label, export_csv},
    },
    state::AppState,
};

pub fn expense_routes() -> Router<AppState> {
    Router::new()
        .route("/expenses", get(list_expenses).post(create_expense))
        .route("/expenses/export", get(export_expenses))
        .route("/expenses/:id", get(get_expense))
}

/// Validates a manual entry against `today`.
pub(crate) fn validate_new(req: CreateExpenseRequest, today: Date) -> ApiResult<NewExpense> {
    let amount = storable_amount(req.amount)
        .ok_or_else(|| ApiError::bad_request("Amount must be greater than zero"))?;
    let category = clean_label(Some(&req.category))
        .ok_or_else(|| ApiError::bad_request("Category is required"))?;
    Ok(NewExpense {
        amount,
        date: req.date.unwrap_or(today),
        category,
        merchant: clean_label(req.merchant.as_deref()),
        source: ExpenseSource::Manual,
    })
}

/// `?month=YYYY-MM`, or the month containing `today`.
pub(crate) fn resolve_month(raw: Option<&str>, today: Date) -> ApiResult<MonthKey> {
    match raw.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => m
            .parse::<MonthKey>()
            .map_err(|e| ApiError::bad_request(e.to_string())),
        None => Ok(MonthKey::containing(today)),
    }
}

#[instrument(skip(state, payload))]
pub async fn create_expense(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateExpenseRequest>,
) -> ApiResult<(StatusCode, HeaderMap, Json<ExpenseRecord>)> {
    let new = validate_new(payload, OffsetDateTime::now_utc().date())?;
    let record = repo::insert(&state.db, user_id, &new).await?;
    info!(user_id = %user_id, expense_id = %record.id, amount = record.amount, "expense added");

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/expenses/{}", record.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(record)))
}

/// Target of the `Location` header returned on create.
#[instrument(skip(state))]
pub async fn get_expense(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> ApiResult<Json<ExpenseRecord>> {
    let record = repo::find(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Expense not found"))?;
    Ok(Json(record))
}

#[instrument(skip(state))]
pub async fn list_expenses(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<MonthQuery>,
) -> ApiResult<Json<Vec<ExpenseRecord>>> {
    let month = resolve_month(q.month.as_deref(), OffsetDateTime::now_utc().date()).map_err(|e| {
        warn!(user_id = %user_id, month = ?q.month, "bad month filter");
        e
    })?;
    let rows = repo::list_between(
        &state.db,
        user_id,
        month.first_day(),
        month.next_month_first_day(),
    )
    .await?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
pub async fn export_expenses(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<impl IntoResponse> {
    let rows = repo::list_all(&state.db, user_id).await?;
    let body = export_csv(&rows)?;
    info!(user_id = %user_id, rows = rows.len(), "expenses exported");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"expenses.csv\""),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::fixtures::day;
    use crate::auth::services::JwtKeys;
    use axum::body::Body;
    use axum::extract::FromRef;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn req(amount: f64, category: &str, merchant: Option<&str>) -> CreateExpenseRequest {
        CreateExpenseRequest {
            amount,
            category: category.into(),
            merchant: merchant.map(str::to_string),
            date: None,
        }
    }

    #[test]
    fn new_expense_defaults_date_and_trims_labels() {
        let today = day(2024, 6, 3);
        let new = validate_new(req(9.99, " Food ", Some("   ")), today).unwrap();
        assert_eq!(new.date, today);
        assert_eq!(new.category, "Food");
        assert_eq!(new.merchant, None);
        assert_eq!(new.source, ExpenseSource::Manual);
    }

    #[test]
    fn rejects_non_positive_amounts_and_blank_categories() {
        let today = day(2024, 6, 3);
        for amount in [0.0, -1.0, 0.004, f64::INFINITY, 1e12] {
            assert!(validate_new(req(amount, "Food", None), today).is_err());
        }
        assert!(validate_new(req(5.0, "  ", None), today).is_err());
    }

    #[test]
    fn amounts_are_rounded_to_cents() {
        let today = day(2024, 6, 3);
        assert_eq!(validate_new(req(4.006, "Food", None), today).unwrap().amount, 4.01);
        assert_eq!(
            validate_new(req(9_999_999_999.99, "Rent", None), today).unwrap().amount,
            9_999_999_999.99
        );
    }

    #[test]
    fn month_filter_defaults_to_current_month() {
        let today = day(2024, 6, 3);
        assert_eq!(resolve_month(None, today).unwrap().to_string(), "2024-06");
        assert_eq!(resolve_month(Some("2023-12"), today).unwrap().to_string(), "2023-12");
        let err = resolve_month(Some("2023-13"), today).unwrap_err();
        assert_eq!(err.to_string(), "Invalid month format (use YYYY-MM)");
    }

    #[tokio::test]
    async fn invalid_month_is_rejected_before_querying() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state)
            .sign_access(uuid::Uuid::new_v4())
            .unwrap();
        let res = crate::app::build_app(state)
            .oneshot(
                Request::builder()
                    .uri("/api/v1/expenses?month=June")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Invalid month format (use YYYY-MM)");
    }

    #[tokio::test]
    async fn expense_lookup_needs_an_id() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state)
            .sign_access(uuid::Uuid::new_v4())
            .unwrap();
        let res = crate::app::build_app(state)
            .oneshot(
                Request::builder()
                    .uri("/api/v1/expenses/not-an-id")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}

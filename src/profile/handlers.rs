use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use time::{Date, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::{
    analytics::spending::storable_amount,
    auth::services::AuthUser,
    error::{ApiError, ApiResult},
    profile::{
        dto::{ProfileResponse, UpdateBudgetRequest, UpdateProfileRequest},
        repo,
    },
    state::AppState,
    storage::user_prefix,
};

const POSITIVE_BUDGET: &str = "Use a positive monthly amount.";

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(put_profile))
        .route("/profile/budget", put(put_budget))
        .route("/account", delete(delete_account))
}

fn budget_amount(raw: f64) -> ApiResult<f64> {
    storable_amount(raw).ok_or_else(|| ApiError::bad_request(POSITIVE_BUDGET))
}

/// Trims text fields in place and rejects values the client must fix.
pub(crate) fn validate_update(req: &mut UpdateProfileRequest, today: Date) -> ApiResult<()> {
    if let Some(name) = req.name.as_mut() {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ApiError::bad_request("Name cannot be empty"));
        }
        *name = trimmed.to_string();
    }
    req.occupation = req
        .occupation
        .take()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty());
    if req.date_of_birth.is_some_and(|dob| dob > today) {
        return Err(ApiError::bad_request("Date of birth cannot be in the future"));
    }
    if let Some(budget) = req.monthly_budget {
        req.monthly_budget = Some(budget_amount(budget)?);
    }
    Ok(())
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = repo::find(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;
    Ok(Json(profile.into()))
}

#[instrument(skip(state, payload))]
pub async fn put_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(mut payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    validate_update(&mut payload, OffsetDateTime::now_utc().date())?;

    let profile = repo::upsert(&state.db, user_id, &payload)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;
    info!(user_id = %user_id, "profile saved");
    Ok(Json(profile.into()))
}

#[instrument(skip(state, payload))]
pub async fn put_budget(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateBudgetRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let budget = budget_amount(payload.monthly_budget).map_err(|e| {
        warn!(user_id = %user_id, "rejected budget");
        e
    })?;

    let req = UpdateProfileRequest {
        monthly_budget: Some(budget),
        ..Default::default()
    };
    let profile = repo::upsert(&state.db, user_id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;
    info!(user_id = %user_id, budget, "budget saved");
    Ok(Json(profile.into()))
}

#[instrument(skip(state))]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<StatusCode> {
    let mut tx = state.db.begin().await.map_err(anyhow::Error::from)?;
    repo::delete_account_tx(&mut tx, user_id).await?;
    tx.commit().await.map_err(anyhow::Error::from)?;

    // Rows are gone at this point; a storage failure only leaves orphaned objects.
    match state.storage.delete_prefix(&user_prefix(user_id)).await {
        Ok(removed) => info!(user_id = %user_id, removed, "account deleted"),
        Err(e) => warn!(user_id = %user_id, error = %e, "statement archive cleanup failed"),
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::fixtures::day;
    use crate::auth::services::JwtKeys;
    use axum::body::Body;
    use axum::extract::FromRef;
    use axum::http::Request;
    use tower::ServiceExt;

    fn request(name: Option<&str>, dob: Option<Date>, budget: Option<f64>) -> UpdateProfileRequest {
        UpdateProfileRequest {
            name: name.map(str::to_string),
            occupation: Some("  ".into()),
            date_of_birth: dob,
            monthly_budget: budget,
        }
    }

    #[test]
    fn accepts_a_complete_onboarding() {
        let today = day(2024, 5, 10);
        let mut req = request(Some("  Ana "), Some(day(1990, 1, 2)), Some(2500.0));
        validate_update(&mut req, today).unwrap();
        assert_eq!(req.name.as_deref(), Some("Ana"));
        assert_eq!(req.occupation, None);
    }

    #[test]
    fn rejects_blank_name_future_birthday_and_bad_budget() {
        let today = day(2024, 5, 10);
        assert!(validate_update(&mut request(Some("   "), None, None), today).is_err());
        assert!(validate_update(&mut request(None, Some(day(2024, 5, 11)), None), today).is_err());
        for budget in [0.0, -10.0, f64::NAN, 0.001, 1e12] {
            let err = validate_update(&mut request(None, None, Some(budget)), today).unwrap_err();
            assert_eq!(err.to_string(), POSITIVE_BUDGET);
        }
    }

    #[test]
    fn budget_is_stored_in_cents() {
        let today = day(2024, 5, 10);
        let mut req = request(None, None, Some(1999.999));
        validate_update(&mut req, today).unwrap();
        assert_eq!(req.monthly_budget, Some(2000.0));
        assert_eq!(budget_amount(9_999_999_999.99).unwrap(), 9_999_999_999.99);
    }

    #[tokio::test]
    async fn budget_must_be_positive_and_fit() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state)
            .sign_access(uuid::Uuid::new_v4())
            .unwrap();
        let app = crate::app::build_app(state);
        for body in [r#"{"monthly_budget":0}"#, r#"{"monthly_budget":0.001}"#, r#"{"monthly_budget":1e12}"#] {
            let res = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("PUT")
                        .uri("/api/v1/profile/budget")
                        .header("authorization", format!("Bearer {token}"))
                        .header("content-type", "application/json")
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{body}");
        }
    }
}

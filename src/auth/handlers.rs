use axum::{
    extract::{FromRef, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, CallbackParams, CallbackResponse, LoginRequest, PublicUser,
            RefreshRequest, RegisterRequest,
        },
        repo::{consume_verification, insert_verification_tx, prune_revoked, revoke_token},
        repo_types::User,
        services::{
            hash_password, is_valid_email, new_verification_token, normalize_email,
            verify_password, AuthUser, JwtKeys, MIN_PASSWORD_LEN,
        },
    },
    error::{is_unique_violation, ApiError, ApiResult},
    profile,
    state::AppState,
};

const INVALID_LINK: &str = "Invalid verification link. Please try again.";
const VERIFICATION_FAILED: &str = "Verification failed. Please request a new link.";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/callback", get(callback))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            email_verified: user.is_verified(),
        }
    }
}

fn issue_session(keys: &JwtKeys, user: &User) -> ApiResult<AuthResponse> {
    Ok(AuthResponse {
        access_token: keys.sign_access(user.id)?,
        refresh_token: keys.sign_refresh(user.id)?,
        token_type: "Bearer",
        user: PublicUser::from(user),
    })
}

/// A refresh token is good for exactly one rotation.
pub(crate) fn ensure_first_use(newly_revoked: bool) -> ApiResult<()> {
    if newly_revoked {
        Ok(())
    } else {
        Err(ApiError::unauthorized("Invalid or expired token"))
    }
}

async fn prune_quietly(state: &AppState) {
    match prune_revoked(&state.db).await {
        Ok(0) => {}
        Ok(pruned) => info!(pruned, "expired revocations pruned"),
        Err(e) => warn!(error = %e, "pruning revoked tokens failed"),
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let email = normalize_email(&payload.email);

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::bad_request("Invalid email"));
    }

    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::bad_request("Password too short"));
    }

    let hash = hash_password(&payload.password)?;
    let token_hash = new_verification_token();
    let expires_at =
        OffsetDateTime::now_utc() + Duration::minutes(state.config.verify_ttl_minutes);

    let mut tx = state.db.begin().await.map_err(anyhow::Error::from)?;
    let user = match User::create_tx(&mut tx, &email, &hash).await {
        Ok(u) => u,
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %email, "email already registered");
            return Err(ApiError::conflict("Email already registered"));
        }
        Err(e) => return Err(e.into()),
    };
    profile::repo::create_for_user_tx(&mut tx, user.id, &user.email).await?;
    insert_verification_tx(&mut tx, &token_hash, user.id, expires_at).await?;
    tx.commit().await.map_err(anyhow::Error::from)?;

    info!(
        user_id = %user.id,
        link = %state.config.verification_link(&token_hash),
        "verification link issued"
    );

    let keys = JwtKeys::from_ref(&state);
    let session = issue_session(&keys, &user)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(session)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = normalize_email(&payload.email);

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(ApiError::unauthorized("Invalid login credentials"));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthorized("Invalid login credentials"));
    }

    let keys = JwtKeys::from_ref(&state);
    let session = issue_session(&keys, &user)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(session))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        ApiError::unauthorized("Invalid or expired token")
    })?;

    let newly_revoked = revoke_token(&state.db, claims.jti, claims.sub, claims.expires_at()).await?;
    ensure_first_use(newly_revoked).map_err(|e| {
        warn!(user_id = %claims.sub, jti = %claims.jti, "refresh token replayed");
        e
    })?;
    prune_quietly(&state).await;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    Ok(Json(issue_session(&keys, &user)?))
}

#[instrument(skip(state, payload))]
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<StatusCode> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

    revoke_token(&state.db, claims.jti, claims.sub, claims.expires_at()).await?;
    prune_quietly(&state).await;
    info!(user_id = %claims.sub, "user signed out");
    Ok(StatusCode::NO_CONTENT)
}

/// Deep-link target of the verification email.
#[instrument(skip(state, params))]
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Json<CallbackResponse>> {
    let token_hash = match (params.token_hash.as_deref(), params.kind.as_deref()) {
        (Some(t), Some("email")) if !t.trim().is_empty() => t.trim(),
        _ => {
            warn!("malformed verification link");
            return Err(ApiError::bad_request(INVALID_LINK));
        }
    };

    let Some(user_id) = consume_verification(&state.db, token_hash).await? else {
        warn!("verification token unknown, expired or used");
        return Err(ApiError::bad_request(VERIFICATION_FAILED));
    };

    let user = User::mark_verified(&state.db, user_id).await?;
    info!(user_id = %user.id, "email verified");

    let keys = JwtKeys::from_ref(&state);
    Ok(Json(CallbackResponse {
        session: issue_session(&keys, &user)?,
        next: "onboarding",
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<PublicUser>> {
    let user = User::find_by_id(&state.db, user_id).await?.ok_or_else(|| {
        warn!(user_id = %user_id, "user not found");
        ApiError::unauthorized("User not found")
    })?;

    Ok(Json(PublicUser::from(&user)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_app;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn error_of(res: axum::response::Response) -> String {
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        json["error"].as_str().unwrap_or_default().to_string()
    }

    #[test]
    fn public_user_reports_verification() {
        let user = User {
            id: uuid::Uuid::new_v4(),
            email: "test@example.com".to_string(),
            password_hash: "x".into(),
            email_verified_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_value(PublicUser::from(&user)).unwrap();
        assert_eq!(json["email"], "test@example.com");
        assert_eq!(json["email_verified"], false);
        assert!(json.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn callback_rejects_wrong_link_type() {
        let app = build_app(AppState::fake());
        for uri in [
            "/api/v1/auth/callback?token_hash=abc&type=recovery",
            "/api/v1/auth/callback?type=email",
            "/api/v1/auth/callback",
        ] {
            let res = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(error_of(res).await, INVALID_LINK);
        }
    }

    #[tokio::test]
    async fn register_validates_before_touching_the_database() {
        let app = build_app(AppState::fake());
        let cases = [
            (r#"{"email":"not-an-email","password":"longenough"}"#, "Invalid email"),
            (r#"{"email":"ana@example.com","password":"short"}"#, "Password too short"),
        ];
        for (body, expected) in cases {
            let res = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/api/v1/auth/register")
                        .header("content-type", "application/json")
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
            assert_eq!(error_of(res).await, expected);
        }
    }

    #[test]
    fn replayed_refresh_token_is_unauthorized() {
        assert!(ensure_first_use(true).is_ok());
        let err = ensure_first_use(false).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Invalid or expired token");
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens() {
        let state = AppState::fake();
        let access = JwtKeys::from_ref(&state)
            .sign_access(uuid::Uuid::new_v4())
            .unwrap();
        let res = build_app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/auth/refresh")
                    .header("content-type", "application/json")
                    .body(Body::from(format!(r#"{{"refresh_token":"{access}"}}"#)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    analytics::calendar::MonthKey,
    auth::services::AuthUser,
    error::{is_unique_violation, ApiError, ApiResult},
    state::AppState,
    statements::{
        parser::{describe_upload_error, parse_statement, ParsedTransaction, StatementFormat},
        repo,
        services::{archive_and_import, ImportOutcome, UploadItem},
    },
};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const ONE_PER_MONTH: &str = "You already uploaded a statement this month.";

pub fn statement_routes() -> Router<AppState> {
    Router::new()
        .route("/statements/parse", post(parse_upload))
        .route("/statements/import", post(import_upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Statement is larger than 10 MB".into())
    } else {
        ApiError::bad_request(e.body_text())
    }
}

/// Pulls the `file` field out of the form and checks its type.
async fn read_statement(mp: &mut Multipart) -> ApiResult<(UploadItem, StatementFormat)> {
    while let Some(field) = mp.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".into());
        let Some(format) = StatementFormat::from_content_type(&content_type) else {
            warn!(content_type = %content_type, "unsupported statement type");
            return Err(ApiError::UnsupportedMedia(
                "Upload a CSV, PDF or plain text statement".into(),
            ));
        };
        let body = field.bytes().await.map_err(multipart_error)?;
        if body.is_empty() {
            return Err(ApiError::bad_request("Statement file is empty"));
        }
        return Ok((UploadItem { body, content_type }, format));
    }
    Err(ApiError::bad_request("file is required"))
}

async fn parse_rows(upload: &UploadItem, format: StatementFormat) -> ApiResult<Vec<ParsedTransaction>> {
    let body = upload.body.clone();
    let parsed = tokio::task::spawn_blocking(move || parse_statement(&body, format))
        .await
        .map_err(|e| anyhow::anyhow!("statement parser panicked: {e}"))?;
    parsed.map_err(|e| {
        warn!(error = %e, "statement rejected");
        ApiError::bad_request(describe_upload_error(&e.to_string()))
    })
}

/// Rules checked before anything is archived.
pub(crate) fn check_import(already_uploaded: bool, rows: &[ParsedTransaction]) -> ApiResult<()> {
    if already_uploaded {
        return Err(ApiError::conflict(ONE_PER_MONTH));
    }
    if rows.is_empty() {
        return Err(ApiError::bad_request("No transactions found in statement"));
    }
    Ok(())
}

/// POST /statements/parse: preview without saving anything.
#[instrument(skip(mp))]
pub async fn parse_upload(
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> ApiResult<Json<Vec<ParsedTransaction>>> {
    let (upload, format) = read_statement(&mut mp).await?;
    let rows = parse_rows(&upload, format).await?;
    info!(user_id = %user_id, rows = rows.len(), "statement parsed");
    Ok(Json(rows))
}

/// POST /statements/import: one statement per calendar month.
#[instrument(skip(state, mp))]
pub async fn import_upload(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> ApiResult<Json<ImportOutcome>> {
    let month = MonthKey::containing(OffsetDateTime::now_utc().date());
    let (upload, format) = read_statement(&mut mp).await?;
    let rows = parse_rows(&upload, format).await?;

    let already_uploaded = repo::upload_exists_for_month(&state.db, user_id, &month.to_string()).await?;
    check_import(already_uploaded, &rows).map_err(|e| {
        warn!(user_id = %user_id, %month, error = %e, "statement import refused");
        e
    })?;

    match archive_and_import(&state, user_id, month, upload, &rows).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) if is_unique_violation(&e) => Err(ApiError::conflict(ONE_PER_MONTH)),
        Err(e) => Err(e.into()),
    }
}

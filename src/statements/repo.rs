use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// True when the user already imported a statement for `month` (`YYYY-MM`).
pub async fn upload_exists_for_month(db: &PgPool, user_id: Uuid, month: &str) -> anyhow::Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM statement_uploads WHERE user_id = $1 AND month = $2)",
    )
    .bind(user_id)
    .bind(month)
    .fetch_one(db)
    .await
    .context("check statement upload for month")?;
    Ok(exists)
}

pub async fn insert_upload_tx(
    tx: &mut Transaction<'_, Postgres>,
    upload_id: Uuid,
    user_id: Uuid,
    month: &str,
    object_key: &str,
    content_type: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO statement_uploads (id, user_id, month, object_key, content_type)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(upload_id)
    .bind(user_id)
    .bind(month)
    .bind(object_key)
    .bind(content_type)
    .execute(&mut **tx)
    .await
    .context("insert statement upload")?;
    Ok(())
}

pub async fn set_imported_tx(
    tx: &mut Transaction<'_, Postgres>,
    upload_id: Uuid,
    imported: i32,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE statement_uploads SET imported = $2 WHERE id = $1")
        .bind(upload_id)
        .bind(imported)
        .execute(&mut **tx)
        .await
        .context("record imported count")?;
    Ok(())
}

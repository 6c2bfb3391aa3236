use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::profile::{dto::UpdateProfileRequest, repo_types::Profile};

const PROFILE_COLUMNS: &str = r#"
    id, email, name, monthly_budget::float8 AS monthly_budget,
    occupation, date_of_birth, created_at
"#;

/// Blank profile created alongside the user at signup.
pub async fn create_for_user_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    email: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO profiles (id, email)
        VALUES ($1, $2)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(email)
    .execute(&mut **tx)
    .await
    .context("insert profile")?;
    Ok(())
}

pub async fn find(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
    ))
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("find profile")?;
    Ok(profile)
}

/// Inserts or updates the profile; `None` fields keep the stored value.
/// The email is copied from the user row, so an unknown user yields `None`.
pub async fn upsert(
    db: &PgPool,
    user_id: Uuid,
    req: &UpdateProfileRequest,
) -> anyhow::Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>(&format!(
        r#"
        INSERT INTO profiles (id, email, name, occupation, date_of_birth, monthly_budget)
        SELECT u.id, u.email, $2, $3, $4, $5::numeric
          FROM users u
         WHERE u.id = $1
        ON CONFLICT (id) DO UPDATE SET
            name           = COALESCE(EXCLUDED.name, profiles.name),
            occupation     = COALESCE(EXCLUDED.occupation, profiles.occupation),
            date_of_birth  = COALESCE(EXCLUDED.date_of_birth, profiles.date_of_birth),
            monthly_budget = COALESCE(EXCLUDED.monthly_budget, profiles.monthly_budget)
        RETURNING {PROFILE_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(req.name.as_deref())
    .bind(req.occupation.as_deref())
    .bind(req.date_of_birth)
    .bind(req.monthly_budget)
    .fetch_optional(db)
    .await
    .context("upsert profile")?;
    Ok(profile)
}

/// Monthly budget for the analytics; zero when the profile or budget is missing.
pub async fn monthly_budget(db: &PgPool, user_id: Uuid) -> anyhow::Result<f64> {
    let budget = sqlx::query_scalar::<_, Option<f64>>(
        "SELECT monthly_budget::float8 FROM profiles WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("load monthly budget")?;
    Ok(budget.flatten().unwrap_or(0.0))
}

/// Removes every row owned by the user, leaving the archived objects to the caller.
pub async fn delete_account_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> anyhow::Result<()> {
    for (table, sql) in [
        ("expenses", "DELETE FROM expenses WHERE user_id = $1"),
        ("statement_uploads", "DELETE FROM statement_uploads WHERE user_id = $1"),
        ("profiles", "DELETE FROM profiles WHERE id = $1"),
    ] {
        sqlx::query(sql)
            .bind(user_id)
            .execute(&mut **tx)
            .await
            .with_context(|| format!("delete {table}"))?;
    }
    User::delete_tx(tx, user_id).await
}

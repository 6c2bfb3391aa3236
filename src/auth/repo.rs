use crate::auth::repo_types::User;
use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, email_verified_at, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, email_verified_at, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    /// Create a new user with hashed password.
    pub async fn create_tx(
        tx: &mut Transaction<'_, Postgres>,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, password_hash, email_verified_at, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&mut **tx)
        .await
        .context("insert user")?;
        Ok(user)
    }

    pub async fn mark_verified(db: &PgPool, id: Uuid) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET email_verified_at = COALESCE(email_verified_at, now())
             WHERE id = $1
            RETURNING id, email, password_hash, email_verified_at, created_at
            "#,
        )
        .bind(id)
        .fetch_one(db)
        .await
        .context("mark user verified")?;
        Ok(user)
    }

    /// Removes the user row; dependent rows go with it through foreign keys.
    pub async fn delete_tx(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .context("delete user")?;
        Ok(())
    }
}

/// Store a one-time email verification token.
pub async fn insert_verification_tx(
    tx: &mut Transaction<'_, Postgres>,
    token_hash: &str,
    user_id: Uuid,
    expires_at: OffsetDateTime,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO email_verifications (token_hash, user_id, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(token_hash)
    .bind(user_id)
    .bind(expires_at)
    .execute(&mut **tx)
    .await
    .context("insert email verification")?;
    Ok(())
}

/// Consume a live token; `None` when it is unknown, expired or already used.
pub async fn consume_verification(db: &PgPool, token_hash: &str) -> anyhow::Result<Option<Uuid>> {
    let user_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        UPDATE email_verifications
           SET consumed_at = now()
         WHERE token_hash = $1
           AND consumed_at IS NULL
           AND expires_at > now()
        RETURNING user_id
        "#,
    )
    .bind(token_hash)
    .fetch_optional(db)
    .await
    .context("consume email verification")?;
    Ok(user_id)
}

/// Records `jti` as spent. `false` when it already was, which makes the
/// insert the single point where a refresh token is consumed.
pub async fn revoke_token(
    db: &PgPool,
    jti: Uuid,
    user_id: Uuid,
    expires_at: OffsetDateTime,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        INSERT INTO revoked_tokens (jti, user_id, expires_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (jti) DO NOTHING
        "#,
    )
    .bind(jti)
    .bind(user_id)
    .bind(expires_at)
    .execute(db)
    .await
    .context("revoke token")?;
    Ok(res.rows_affected() == 1)
}

/// Drops revocations of tokens that have expired on their own.
pub async fn prune_revoked(db: &PgPool) -> anyhow::Result<u64> {
    let res = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < now()")
        .execute(db)
        .await
        .context("prune revoked tokens")?;
    Ok(res.rows_affected())
}

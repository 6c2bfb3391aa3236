use anyhow::Context;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use time::Date;
use uuid::Uuid;

use crate::expenses::repo_types::{ExpenseRecord, NewExpense};

const EXPENSE_COLUMNS: &str = r#"
    id, user_id, amount::float8 AS amount, date, category, merchant, source, created_at
"#;

pub async fn insert(db: &PgPool, user_id: Uuid, new: &NewExpense) -> anyhow::Result<ExpenseRecord> {
    let record = sqlx::query_as::<_, ExpenseRecord>(&format!(
        r#"
        INSERT INTO expenses (user_id, amount, date, category, merchant, source)
        VALUES ($1, $2::numeric, $3, $4, $5, $6)
        RETURNING {EXPENSE_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(new.amount)
    .bind(new.date)
    .bind(&new.category)
    .bind(new.merchant.as_deref())
    .bind(new.source.as_str())
    .fetch_one(db)
    .await
    .context("insert expense")?;
    Ok(record)
}

pub async fn find(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<ExpenseRecord>> {
    let record = sqlx::query_as::<_, ExpenseRecord>(&format!(
        "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("find expense")?;
    Ok(record)
}

/// Inserts unless the user already has an expense with the same date,
/// amount and merchant. Returns whether a row was written.
pub async fn insert_unless_duplicate_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    new: &NewExpense,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        INSERT INTO expenses (user_id, amount, date, category, merchant, source)
        SELECT $1, $2::numeric, $3, $4, $5, $6
        WHERE NOT EXISTS (
            SELECT 1 FROM expenses
             WHERE user_id = $1
               AND date = $3
               AND amount = $2::numeric
               AND merchant IS NOT DISTINCT FROM $5
        )
        "#,
    )
    .bind(user_id)
    .bind(new.amount)
    .bind(new.date)
    .bind(&new.category)
    .bind(new.merchant.as_deref())
    .bind(new.source.as_str())
    .execute(&mut **tx)
    .await
    .context("insert imported expense")?;
    Ok(res.rows_affected() == 1)
}

/// Expenses dated in `[from, until)`, oldest first.
pub async fn list_between<'e>(
    db: impl PgExecutor<'e>,
    user_id: Uuid,
    from: Date,
    until: Date,
) -> anyhow::Result<Vec<ExpenseRecord>> {
    let rows = sqlx::query_as::<_, ExpenseRecord>(&format!(
        r#"
        SELECT {EXPENSE_COLUMNS}
          FROM expenses
         WHERE user_id = $1 AND date >= $2 AND date < $3
         ORDER BY date ASC, created_at ASC
        "#
    ))
    .bind(user_id)
    .bind(from)
    .bind(until)
    .fetch_all(db)
    .await
    .context("list expenses between dates")?;
    Ok(rows)
}

pub async fn list_all(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<ExpenseRecord>> {
    let rows = sqlx::query_as::<_, ExpenseRecord>(&format!(
        r#"
        SELECT {EXPENSE_COLUMNS}
          FROM expenses
         WHERE user_id = $1
         ORDER BY date ASC, created_at ASC
        "#
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list expenses")?;
    Ok(rows)
}

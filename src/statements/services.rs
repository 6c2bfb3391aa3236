use std::collections::HashSet;

use anyhow::Context;
use bytes::Bytes;
use serde::Serialize;
use time::{Date, Duration};
use tracing::{info, warn};
use uuid::Uuid;

use crate::analytics::calendar::MonthKey;
use crate::expenses::{
    repo::{insert_unless_duplicate_tx, list_between},
    repo_types::{ExpenseRecord, ExpenseSource, NewExpense},
};
use crate::state::AppState;
use crate::statements::{parser::ParsedTransaction, repo};
use crate::storage::statement_key;

/// A statement file as received from the client.
pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: usize,
    pub message: String,
}

impl ImportOutcome {
    pub fn new(imported: usize, skipped: usize) -> Self {
        let message = match skipped {
            0 => format!("Imported {imported} transactions"),
            n => format!("Imported {imported} transactions, skipped {n} duplicates"),
        };
        Self {
            imported,
            skipped,
            message,
        }
    }
}

impl From<&ParsedTransaction> for NewExpense {
    fn from(t: &ParsedTransaction) -> Self {
        NewExpense {
            amount: t.amount,
            date: t.date,
            category: t.category.clone(),
            merchant: Some(t.merchant.clone()),
            source: ExpenseSource::Statement,
        }
    }
}

/// What makes two expenses the same transaction.
#[derive(Debug, PartialEq, Eq, Hash)]
struct DuplicateKey<'a> {
    date: Date,
    cents: i64,
    merchant: Option<&'a str>,
}

impl<'a> DuplicateKey<'a> {
    fn new(date: Date, amount: f64, merchant: Option<&'a str>) -> Self {
        Self {
            date,
            cents: (amount * 100.0).round() as i64,
            merchant,
        }
    }
}

/// Rows that match neither an `existing` expense nor an earlier row of the
/// same statement.
pub(crate) fn new_rows<'a>(
    existing: &[ExpenseRecord],
    rows: &'a [ParsedTransaction],
) -> Vec<&'a ParsedTransaction> {
    let mut seen: HashSet<DuplicateKey<'_>> = existing
        .iter()
        .map(|e| DuplicateKey::new(e.date, e.amount, e.merchant.as_deref()))
        .collect();
    rows.iter()
        .filter(|&r| seen.insert(DuplicateKey::new(r.date, r.amount, Some(r.merchant.as_str()))))
        .collect()
}

/// Archives the original file, then records the upload and inserts the
/// parsed rows in one transaction. Duplicates of existing expenses are skipped.
pub async fn archive_and_import(
    st: &AppState,
    user_id: Uuid,
    month: MonthKey,
    upload: UploadItem,
    rows: &[ParsedTransaction],
) -> anyhow::Result<ImportOutcome> {
    let upload_id = Uuid::new_v4();
    let month = month.to_string();
    let key = statement_key(user_id, &month, upload_id, &upload.content_type);
    st.storage
        .put_object(&key, upload.body, &upload.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;

    let mut tx = st.db.begin().await.context("begin tx")?;
    repo::insert_upload_tx(&mut tx, upload_id, user_id, &month, &key, &upload.content_type).await?;

    let existing = match (rows.iter().map(|r| r.date).min(), rows.iter().map(|r| r.date).max()) {
        (Some(from), Some(last)) => list_between(&mut *tx, user_id, from, last + Duration::days(1)).await?,
        _ => Vec::new(),
    };

    let mut imported = 0usize;
    for row in new_rows(&existing, rows) {
        // The SQL guard covers entries added after `existing` was read.
        if insert_unless_duplicate_tx(&mut tx, user_id, &NewExpense::from(row)).await? {
            imported += 1;
        }
    }
    repo::set_imported_tx(&mut tx, upload_id, i32::try_from(imported).unwrap_or(i32::MAX)).await?;

    if let Err(e) = tx.commit().await {
        warn!(user_id = %user_id, key = %key, "import rolled back, archived object left behind");
        return Err(e).context("commit tx");
    }

    let outcome = ImportOutcome::new(imported, rows.len() - imported);
    info!(
        user_id = %user_id,
        upload_id = %upload_id,
        imported = outcome.imported,
        skipped = outcome.skipped,
        "statement imported"
    );
    Ok(outcome)
}

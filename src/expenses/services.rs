use anyhow::Context;

use crate::expenses::repo_types::ExpenseRecord;
use crate::serde_date::format_iso;

pub const EXPORT_HEADER: [&str; 4] = ["date", "category", "merchant", "amount"];

/// Renders expenses as `date,category,merchant,amount` rows under a header line.
pub fn export_csv(expenses: &[ExpenseRecord]) -> anyhow::Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER).context("write csv header")?;
    for e in expenses {
        writer
            .write_record([
                format_iso(e.date),
                e.category.clone(),
                e.merchant.clone().unwrap_or_default(),
                format!("{:.2}", e.amount),
            ])
            .with_context(|| format!("write csv row {}", e.id))?;
    }
    let bytes = writer.into_inner().context("flush csv")?;
    String::from_utf8(bytes).context("csv is not utf-8")
}

/// Trimmed text, blank folded to `None`.
pub fn clean_label(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

//! Turns uploaded bank statements into expense rows.
//!
//! Two layouts are understood: CSV exports with a `date,amount,merchant[,category]`
//! header, and HSBC style statements where a transaction spans several lines
//! (date, debit marker plus merchant, then the amount). The latter arrive as
//! plain text or as a PDF whose text layer is extracted first.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use time::{Date, Month};

use crate::analytics::spending::storable_amount;
use crate::serde_date::parse_iso;

pub const IMPORTED_CATEGORY: &str = "Imported";

/// One debit found in a statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedTransaction {
    pub amount: f64,
    pub category: String,
    pub merchant: String,
    #[serde(with = "crate::serde_date::iso")]
    pub date: Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementFormat {
    Csv,
    Pdf,
    Text,
}

impl StatementFormat {
    /// Accepted upload types; anything else is refused.
    pub fn from_content_type(ct: &str) -> Option<Self> {
        let essence = ct.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "text/csv" | "application/csv" | "application/vnd.ms-excel" => Some(Self::Csv),
            "application/pdf" => Some(Self::Pdf),
            "text/plain" => Some(Self::Text),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Statement is not valid UTF-8 text")]
    NotText,
    #[error("CSV must have date, amount and merchant columns")]
    MissingColumns,
    #[error("CSV could not be read: {0}")]
    Csv(#[from] csv::Error),
    #[error("PDF could not be read: {0}")]
    Pdf(String),
}

/// Parses `body`. Plain text that starts with a CSV header is read as CSV.
/// PDF extraction is CPU bound; async callers run this on the blocking pool.
pub fn parse_statement(
    body: &[u8],
    format: StatementFormat,
) -> Result<Vec<ParsedTransaction>, ParseError> {
    if format == StatementFormat::Pdf {
        return pdf_text(body).map(|text| parse_hsbc_text(&text));
    }
    let text = std::str::from_utf8(body).map_err(|_| ParseError::NotText)?;
    let text = text.trim_start_matches('\u{feff}');
    match format {
        StatementFormat::Csv => parse_csv(text),
        StatementFormat::Text if looks_like_csv(text) => parse_csv(text),
        StatementFormat::Text | StatementFormat::Pdf => Ok(parse_hsbc_text(text)),
    }
}

fn pdf_text(body: &[u8]) -> Result<String, ParseError> {
    let text = pdf_extract::extract_text_from_mem(body).map_err(|e| ParseError::Pdf(e.to_string()))?;
    if text.trim().is_empty() {
        return Err(ParseError::Pdf("no text layer".into()));
    }
    Ok(text)
}

fn looks_like_csv(text: &str) -> bool {
    text.lines()
        .find(|l| !l.trim().is_empty())
        .map(|header| {
            let cols: Vec<String> = header.split(',').map(|c| c.trim().to_lowercase()).collect();
            ["date", "amount", "merchant"]
                .iter()
                .all(|want| cols.iter().any(|c| c == want))
        })
        .unwrap_or(false)
}

/// Reads a CSV statement by header name. Rows with a bad date, a
/// non-positive amount or no merchant are skipped.
pub fn parse_csv(text: &str) -> Result<Vec<ParsedTransaction>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let (Some(date_col), Some(amount_col), Some(merchant_col)) =
        (column("date"), column("amount"), column("merchant"))
    else {
        return Err(ParseError::MissingColumns);
    };
    let category_col = column("category");

    let mut out = Vec::new();
    for record in reader.records() {
        let Ok(r) = record else { continue };
        let date = match r.get(date_col).map(parse_iso) {
            Some(Ok(d)) => d,
            _ => continue,
        };
        let amount = match r.get(amount_col).and_then(parse_amount).and_then(storable_amount) {
            Some(a) => a,
            None => continue,
        };
        let merchant = match r.get(merchant_col).map(clean_merchant) {
            Some(m) if !m.is_empty() => m,
            _ => continue,
        };
        let category = category_col
            .and_then(|i| r.get(i))
            .filter(|c| !c.is_empty())
            .unwrap_or(IMPORTED_CATEGORY)
            .to_string();
        out.push(ParsedTransaction {
            amount,
            category,
            merchant,
            date,
        });
    }
    Ok(out)
}

/// `£1,250.00` style amounts: currency symbols and thousands separators are dropped.
fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '£' | '$' | '€' | ','))
        .collect();
    cleaned.trim().parse::<f64>().ok()
}

lazy_static! {
    static ref DATE_RE: Regex = Regex::new(r"\b(\d{2}\s+[A-Za-z]{3}\s+\d{2})\b").unwrap();
    static ref DEBIT_RE: Regex =
        Regex::new(r"^(VIS|BP|OBP|CARD|CONTACTLESS|\)\)\))\s*(.+)").unwrap();
    static ref AMOUNT_RE: Regex =
        Regex::new(r"\b(\d{1,3}(?:,\d{3})+\.\d{2}|\d+\.\d{2})\b").unwrap();
    static ref CREDIT_RE: Regex = Regex::new(r"\bCR\b").unwrap();
    static ref DR_CR_RE: Regex = Regex::new(r"\b(DR|CR)\b").unwrap();
    static ref CURRENCY_RE: Regex = Regex::new(r"[£$€]").unwrap();
}

const EXCLUDED_PHRASES: &[&str] = &[
    "CREDIT",
    "BALANCE",
    "BROUGHT FORWARD",
    "CARRIED FORWARD",
    "INTEREST",
    "OVERDRAFT",
    "STATEMENT",
    "ACCOUNT",
    "SORT CODE",
    "HSBC",
];

fn is_excluded(line: &str) -> bool {
    let upper = line.to_uppercase();
    CREDIT_RE.is_match(&upper) || EXCLUDED_PHRASES.iter().any(|p| upper.contains(p))
}

fn clean_merchant(raw: &str) -> String {
    let text = CURRENCY_RE.replace_all(raw, "");
    let text = DR_CR_RE.replace_all(&text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `27 Oct 25` style dates, two digit years in the 2000s.
fn parse_statement_date(raw: &str) -> Option<Date> {
    let mut parts = raw.split_whitespace();
    let day: u8 = parts.next()?.parse().ok()?;
    let month = match parts.next()?.to_ascii_lowercase().as_str() {
        "jan" => Month::January,
        "feb" => Month::February,
        "mar" => Month::March,
        "apr" => Month::April,
        "may" => Month::May,
        "jun" => Month::June,
        "jul" => Month::July,
        "aug" => Month::August,
        "sep" => Month::September,
        "oct" => Month::October,
        "nov" => Month::November,
        "dec" => Month::December,
        _ => return None,
    };
    let year: i32 = parts.next()?.parse().ok()?;
    Date::from_calendar_date(2000 + year, month, day).ok()
}

/// Line-oriented state machine over statement text. The date carries over
/// between transactions; merchant lines accumulate until an amount closes them.
pub fn parse_hsbc_text(text: &str) -> Vec<ParsedTransaction> {
    let mut out = Vec::new();
    let mut current_date: Option<Date> = None;
    let mut merchant_lines: Vec<String> = Vec::new();

    let start_merchant = |lines: &mut Vec<String>, raw: &str| {
        let merchant = clean_merchant(raw);
        if !merchant.is_empty() {
            *lines = vec![merchant];
        }
    };

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if is_excluded(line) {
            continue;
        }

        if let Some(m) = DATE_RE.captures(line).and_then(|c| c.get(1)) {
            current_date = parse_statement_date(m.as_str());
            let remainder = line[m.end()..].trim();
            if !remainder.is_empty() {
                if let Some(caps) = DEBIT_RE.captures(remainder) {
                    start_merchant(&mut merchant_lines, &caps[2]);
                } else if !merchant_lines.is_empty() {
                    merchant_lines.push(remainder.to_string());
                }
            }
            continue;
        }

        if let Some(caps) = DEBIT_RE.captures(line) {
            start_merchant(&mut merchant_lines, &caps[2]);
            continue;
        }

        if let (Some(amount), Some(date)) = (AMOUNT_RE.captures(line), current_date) {
            if !merchant_lines.is_empty() {
                let amount = parse_amount(&amount[1]).and_then(storable_amount);
                let merchant = clean_merchant(&merchant_lines.join(" "));
                if let (Some(amount), false) = (amount, merchant.is_empty()) {
                    out.push(ParsedTransaction {
                        amount,
                        category: IMPORTED_CATEGORY.to_string(),
                        merchant,
                        date,
                    });
                }
                merchant_lines.clear();
                continue;
            }
        }

        if current_date.is_some() && !merchant_lines.is_empty() {
            merchant_lines.push(line.to_string());
        }
    }

    out.sort_by_key(|t| t.date);
    out
}

/// Human readable text for an upload failure message.
pub fn describe_upload_error(message: &str) -> String {
    if message.contains("PDF could not be read") {
        "PDF format not recognized. Please try a different bank statement PDF, \
         or a CSV file (format: date,amount,merchant)"
            .to_string()
    } else if message.contains("CSV") {
        "CSV format error. Please ensure columns: date, amount, merchant".to_string()
    } else {
        message.to_string()
    }
}

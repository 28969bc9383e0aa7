use crate::table::Cell;
use serde::Serialize;
use thiserror::Error;

/// Substrings that mark a row as a plausible header row.
pub const HEADER_PATTERNS: &[&str] = &[
    "date",
    "transaction",
    "narration",
    "description",
    "amount",
    "debit",
    "credit",
    "withdrawal",
];

// Synonym lists are in priority order; the first synonym present wins.
pub const DATE_LABELS: &[&str] = &[
    "date",
    "transaction_date",
    "trans_date",
    "posted_date",
    "posting_date",
    "value_dt",
    "txn_date",
];
pub const NAME_LABELS: &[&str] = &[
    "description",
    "name",
    "merchant",
    "payee",
    "memo",
    "transaction_description",
    "narration",
    "particulars",
    "remarks",
];
pub const AMOUNT_LABELS: &[&str] = &["amount", "debit", "credit", "transaction_amount", "value"];
pub const WITHDRAWAL_LABELS: &[&str] = &[
    "withdrawal_amt",
    "withdrawal",
    "debit_amt",
    "debit",
    "dr_amount",
    "dr",
];
pub const DEPOSIT_LABELS: &[&str] = &[
    "deposit_amt",
    "deposit",
    "credit_amt",
    "credit",
    "cr_amount",
    "cr",
];
pub const CATEGORY_LABELS: &[&str] = &["category", "type", "transaction_type"];

pub const DEFAULT_SCAN_ROWS: usize = 50;
pub const DEFAULT_MATCH_THRESHOLD: usize = 2;

/// Column indices for each semantic role. At least one of `amount`,
/// `withdrawal` or `deposit` is always set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    pub date: usize,
    pub name: usize,
    pub amount: Option<usize>,
    pub withdrawal: Option<usize>,
    pub deposit: Option<usize>,
    pub category: Option<usize>,
}

impl ColumnMapping {
    pub fn has_split_amounts(&self) -> bool {
        self.withdrawal.is_some() || self.deposit.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedSchema {
    /// Zero-based index of the header row in the raw table.
    pub header_row: usize,
    pub labels: Vec<String>,
    pub mapping: ColumnMapping,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Could not find required columns. Found: {found:?}. Need: date, description/name, amount")]
pub struct SchemaNotFound {
    pub found: Vec<String>,
}

/// Lowercase, trim, spaces to underscores, periods dropped.
pub fn normalize_label(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_").replace('.', "")
}

#[derive(Debug, Clone)]
pub struct SchemaDetector {
    scan_rows: usize,
    match_threshold: usize,
}

impl Default for SchemaDetector {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_ROWS, DEFAULT_MATCH_THRESHOLD)
    }
}

impl SchemaDetector {
    pub fn new(scan_rows: usize, match_threshold: usize) -> Self {
        Self {
            scan_rows,
            match_threshold: match_threshold.max(1),
        }
    }

    /// First row within the scan window containing at least `match_threshold`
    /// header patterns. Falls back to row 0.
    pub fn detect_header_row(&self, rows: &[Vec<Cell>]) -> usize {
        rows.iter()
            .take(self.scan_rows)
            .position(|row| header_score(row) >= self.match_threshold)
            .unwrap_or(0)
    }

    pub fn detect(&self, rows: &[Vec<Cell>]) -> Result<DetectedSchema, SchemaNotFound> {
        let header_row = self.detect_header_row(rows);
        let labels: Vec<String> = rows
            .get(header_row)
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(i, cell)| match cell.text() {
                        Some(text) => normalize_label(&text),
                        None => format!("unnamed_{i}"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mapping = map_columns(&labels).ok_or_else(|| SchemaNotFound {
            found: labels.clone(),
        })?;

        Ok(DetectedSchema {
            header_row,
            labels,
            mapping,
        })
    }
}

fn header_score(row: &[Cell]) -> usize {
    let joined = row
        .iter()
        .filter_map(Cell::text)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    HEADER_PATTERNS.iter().filter(|p| joined.contains(*p)).count()
}

/// Resolve semantic roles over normalized labels. Split withdrawal/deposit
/// columns are claimed first so a lone `debit` column is never read twice.
pub fn map_columns(labels: &[String]) -> Option<ColumnMapping> {
    let date = find_label(labels, DATE_LABELS, &[])?;
    let name = find_label(labels, NAME_LABELS, &[date])?;
    let withdrawal = find_label(labels, WITHDRAWAL_LABELS, &[date, name]);
    let deposit = find_label(labels, DEPOSIT_LABELS, &[date, name]);

    let mut claimed = vec![date, name];
    claimed.extend(withdrawal);
    claimed.extend(deposit);
    let amount = find_label(labels, AMOUNT_LABELS, &claimed);

    if amount.is_none() && withdrawal.is_none() && deposit.is_none() {
        return None;
    }

    claimed.extend(amount);
    let category = find_label(labels, CATEGORY_LABELS, &claimed);

    Some(ColumnMapping {
        date,
        name,
        amount,
        withdrawal,
        deposit,
        category,
    })
}

fn find_label(labels: &[String], synonyms: &[&str], claimed: &[usize]) -> Option<usize> {
    synonyms.iter().find_map(|synonym| {
        labels
            .iter()
            .enumerate()
            .find(|(i, label)| label.as_str() == *synonym && !claimed.contains(i))
            .map(|(i, _)| i)
    })
}

use crate::schema::ColumnMapping;
use crate::table::{cell, Cell};
use carbonwatch_core::Money;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// Tried before the date-only patterns so a time of day survives.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Month-first wins over day-first for ambiguous dates like 03/04/2024.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%d/%m/%y",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("date cell is empty")]
    MissingDate,
    #[error("unrecognized date '{0}'")]
    InvalidDate(String),
    #[error("amount cell is empty")]
    MissingAmount,
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),
    #[error("amount is zero")]
    ZeroAmount,
}

/// Parse a date string against the supported formats, first match wins.
/// Date-only values land at midnight.
pub fn parse_date(raw: &str) -> Result<NaiveDateTime, NormalizeError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(NormalizeError::MissingDate);
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            if has_full_year(dt.date()) {
                return Ok(dt);
            }
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            // chrono reads "24" for %Y as year 24; leave that to %y
            if fmt.contains("%Y") && !has_full_year(date) {
                continue;
            }
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Ok(dt);
            }
        }
    }

    Err(NormalizeError::InvalidDate(s.to_string()))
}

fn has_full_year(date: NaiveDate) -> bool {
    date.year() >= 1000
}

/// Spreadsheet date cells are taken as-is; text goes through [`parse_date`].
pub fn date_from_cell(cell: &Cell) -> Result<NaiveDateTime, NormalizeError> {
    match cell {
        Cell::DateTime(dt) => Ok(*dt),
        Cell::Text(s) => parse_date(s),
        Cell::Number(n) if n.is_nan() => Err(NormalizeError::MissingDate),
        Cell::Number(n) => Err(NormalizeError::InvalidDate(n.to_string())),
        Cell::Empty => Err(NormalizeError::MissingDate),
    }
}

/// Parse a monetary string into a signed decimal.
///
/// Accepts thousands separators, currency symbols and prefixes (`₹`, `$`,
/// `Rs.`, `INR`), accounting parentheses for negatives, and trailing
/// `Dr`/`Cr` markers. A `Cr` marker flips the sign.
pub fn parse_amount(raw: &str) -> Result<Decimal, NormalizeError> {
    let invalid = || NormalizeError::InvalidAmount(raw.trim().to_string());

    let lowered = raw.replace(['"', '\u{a0}'], "").trim().to_lowercase();
    let mut body = lowered.as_str();
    let mut negative = false;

    if let Some(inner) = body.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        negative = true;
        body = inner.trim();
    }

    if let Some(rest) = body.strip_suffix("cr") {
        negative = !negative;
        body = rest.trim_end();
    } else if let Some(rest) = body.strip_suffix("dr") {
        body = rest.trim_end();
    }

    if let Some(rest) = body.strip_prefix('-') {
        negative = !negative;
        body = rest.trim_start();
    }

    for prefix in ["inr", "rs.", "rs"] {
        if let Some(rest) = body.strip_prefix(prefix) {
            body = rest.trim_start();
            break;
        }
    }

    let cleaned = body.replace([',', '₹', '$', '€', '£', ' '], "");
    if cleaned.is_empty() {
        return Err(invalid());
    }

    let value = Decimal::from_str(&cleaned).map_err(|_| invalid())?;
    Ok(if negative { -value } else { value })
}

/// `None` for an empty cell.
pub fn amount_from_cell(cell: &Cell) -> Result<Option<Decimal>, NormalizeError> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Text(s) if s.trim().is_empty() => Ok(None),
        Cell::Text(s) => parse_amount(s).map(Some),
        Cell::Number(n) if n.is_nan() => Ok(None),
        Cell::Number(n) => Decimal::from_f64(*n)
            .map(Some)
            .ok_or_else(|| NormalizeError::InvalidAmount(n.to_string())),
        Cell::DateTime(dt) => Err(NormalizeError::InvalidAmount(dt.to_string())),
    }
}

/// Resolve the transaction amount for a row.
///
/// A non-empty combined amount column wins. Otherwise the split columns are
/// consulted: withdrawal if positive, else deposit, with unparseable split
/// values treated as zero. The result is always the absolute value.
pub fn transaction_amount(row: &[Cell], mapping: &ColumnMapping) -> Result<Money, NormalizeError> {
    if let Some(idx) = mapping.amount {
        if let Some(value) = amount_from_cell(cell(row, idx))? {
            return non_zero(value);
        }
    }

    if !mapping.has_split_amounts() {
        return Err(NormalizeError::MissingAmount);
    }

    let split = |idx: Option<usize>| {
        idx.and_then(|i| amount_from_cell(cell(row, i)).ok().flatten())
            .unwrap_or(Decimal::ZERO)
    };
    let withdrawal = split(mapping.withdrawal);
    let deposit = split(mapping.deposit);

    non_zero(if withdrawal > Decimal::ZERO { withdrawal } else { deposit })
}

/// Zero is judged after rounding to cents, so sub-cent amounts are skipped.
fn non_zero(value: Decimal) -> Result<Money, NormalizeError> {
    let amount = Money::from_decimal(value.abs());
    if amount.is_zero() {
        Err(NormalizeError::ZeroAmount)
    } else {
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn ymd(dt: NaiveDateTime) -> (i32, u32, u32) {
        (dt.year(), dt.month(), dt.day())
    }

    fn mapping(amount: Option<usize>, withdrawal: Option<usize>, deposit: Option<usize>) -> ColumnMapping {
        ColumnMapping {
            date: 0,
            name: 1,
            amount,
            withdrawal,
            deposit,
            category: None,
        }
    }

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|c| Cell::from_text(c)).collect()
    }

    #[test]
    fn iso_and_us_dates() {
        assert_eq!(ymd(parse_date("2024-03-01").unwrap()), (2024, 3, 1));
        assert_eq!(ymd(parse_date("03/15/2024").unwrap()), (2024, 3, 15));
        assert_eq!(ymd(parse_date("03-15-2024").unwrap()), (2024, 3, 15));
    }

    #[test]
    fn ambiguous_date_is_month_first() {
        assert_eq!(ymd(parse_date("03/04/2024").unwrap()), (2024, 3, 4));
    }

    #[test]
    fn day_first_when_month_first_impossible() {
        assert_eq!(ymd(parse_date("15/03/2024").unwrap()), (2024, 3, 15));
        assert_eq!(ymd(parse_date("15-03-2024").unwrap()), (2024, 3, 15));
    }

    #[test]
    fn two_digit_year_is_day_first() {
        assert_eq!(ymd(parse_date("01/03/24").unwrap()), (2024, 3, 1));
    }

    #[test]
    fn datetime_keeps_time() {
        let dt = parse_date("2024-03-01 14:30:00").unwrap();
        assert_eq!(dt.hour(), 14);
        let iso = parse_date("2024-03-01T09:15:00").unwrap();
        assert_eq!(iso.minute(), 15);
    }

    #[test]
    fn date_only_is_midnight() {
        let dt = parse_date("2024-03-01").unwrap();
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (0, 0, 0));
    }

    #[test]
    fn bad_dates() {
        assert_eq!(parse_date("  "), Err(NormalizeError::MissingDate));
        assert!(matches!(parse_date("yesterday"), Err(NormalizeError::InvalidDate(_))));
        assert!(matches!(parse_date("2024-13-45"), Err(NormalizeError::InvalidDate(_))));
    }

    #[test]
    fn date_cells() {
        let dt = parse_date("2024-03-01").unwrap();
        assert_eq!(date_from_cell(&Cell::DateTime(dt)), Ok(dt));
        assert_eq!(date_from_cell(&Cell::Empty), Err(NormalizeError::MissingDate));
        assert!(matches!(date_from_cell(&Cell::Number(7.0)), Err(NormalizeError::InvalidDate(_))));
    }

    #[test]
    fn amounts_with_noise() {
        assert_eq!(parse_amount("1,250.50").unwrap(), d("1250.50"));
        assert_eq!(parse_amount("₹ 2,000").unwrap(), d("2000"));
        assert_eq!(parse_amount("$45.99").unwrap(), d("45.99"));
        assert_eq!(parse_amount("Rs. 120").unwrap(), d("120"));
        assert_eq!(parse_amount("INR 99.5").unwrap(), d("99.5"));
        assert_eq!(parse_amount("-350").unwrap(), d("-350"));
        assert_eq!(parse_amount("(75.00)").unwrap(), d("-75.00"));
    }

    #[test]
    fn dr_cr_markers() {
        assert_eq!(parse_amount("500.00 Dr").unwrap(), d("500.00"));
        assert_eq!(parse_amount("500.00 Cr").unwrap(), d("-500.00"));
    }

    #[test]
    fn invalid_amounts() {
        assert!(matches!(parse_amount("abc"), Err(NormalizeError::InvalidAmount(_))));
        assert!(matches!(parse_amount("₹"), Err(NormalizeError::InvalidAmount(_))));
    }

    #[test]
    fn numeric_cells() {
        assert_eq!(amount_from_cell(&Cell::Number(350.0)).unwrap(), Some(d("350")));
        assert_eq!(amount_from_cell(&Cell::Empty).unwrap(), None);
    }

    #[test]
    fn combined_amount_is_absolute() {
        let m = mapping(Some(2), None, None);
        let amount = transaction_amount(&row(&["2024-03-01", "x", "-350"]), &m).unwrap();
        assert_eq!(amount.as_decimal(), d("350"));
    }

    #[test]
    fn combined_amount_missing_or_zero() {
        let m = mapping(Some(2), None, None);
        assert_eq!(
            transaction_amount(&row(&["2024-03-01", "x", ""]), &m),
            Err(NormalizeError::MissingAmount)
        );
        assert_eq!(
            transaction_amount(&row(&["2024-03-01", "x", "0.00"]), &m),
            Err(NormalizeError::ZeroAmount)
        );
        assert!(matches!(
            transaction_amount(&row(&["2024-03-01", "x", "n/a"]), &m),
            Err(NormalizeError::InvalidAmount(_))
        ));
    }

    #[test]
    fn sub_cent_amount_counts_as_zero() {
        let m = mapping(Some(2), None, None);
        assert_eq!(
            transaction_amount(&row(&["2024-03-01", "x", "0.004"]), &m),
            Err(NormalizeError::ZeroAmount)
        );
        let cent = transaction_amount(&row(&["2024-03-01", "x", "-0.006"]), &m).unwrap();
        assert_eq!(cent.as_decimal(), d("0.01"));
    }

    #[test]
    fn split_prefers_positive_withdrawal() {
        let m = mapping(None, Some(2), Some(3));
        let w = transaction_amount(&row(&["d", "x", "250.00", ""]), &m).unwrap();
        assert_eq!(w.as_decimal(), d("250.00"));
        let dep = transaction_amount(&row(&["d", "x", "", "1,000.00"]), &m).unwrap();
        assert_eq!(dep.as_decimal(), d("1000.00"));
        let bad = transaction_amount(&row(&["d", "x", "--", "40"]), &m).unwrap();
        assert_eq!(bad.as_decimal(), d("40"));
    }

    #[test]
    fn split_both_empty_is_zero() {
        let m = mapping(None, Some(2), Some(3));
        assert_eq!(
            transaction_amount(&row(&["d", "x", "", ""]), &m),
            Err(NormalizeError::ZeroAmount)
        );
    }

    #[test]
    fn empty_combined_falls_through_to_split() {
        let m = mapping(Some(4), Some(2), Some(3));
        let amount = transaction_amount(&row(&["d", "x", "80", "", ""]), &m).unwrap();
        assert_eq!(amount.as_decimal(), d("80"));
    }

    #[test]
    fn split_columns_with_thousands_and_zero() {
        let m = mapping(None, Some(2), Some(3));
        let w = transaction_amount(&row(&["d", "x", "1,234.50", ""]), &m).unwrap();
        assert_eq!(w.as_decimal(), d("1234.50"));
        let dep = transaction_amount(&row(&["d", "x", "0", "500"]), &m).unwrap();
        assert_eq!(dep.as_decimal(), d("500"));
    }
}

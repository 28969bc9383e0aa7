use crate::carbon::CarbonEstimator;
use crate::classify::{Classification, Classifier};
use crate::clean::clean_transaction_name;
use crate::fallback::FallbackClassifier;
use crate::normalize::{date_from_cell, transaction_amount, NormalizeError};
use crate::schema::{ColumnMapping, SchemaDetector, SchemaNotFound};
use crate::table::{cell, read_rows, Cell, FileFormat, TableError};
use carbonwatch_core::{Carbon, Category, DateRange, NormalizedTransaction, TransactionError};
use serde::{Serialize, Serializer};
use std::fmt::Display;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failures that abort a whole import. Row-level problems are [`SkipReason`]s.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("File must be CSV or Excel format (.csv, .xlsx, .xls), got '{filename}'")]
    InvalidFileFormat { filename: String },
    #[error("File is empty")]
    EmptyFile,
    #[error(transparent)]
    SchemaNotFound(#[from] SchemaNotFound),
    #[error("Error processing file: {0}")]
    Unreadable(#[from] TableError),
}

impl ImportError {
    /// Column labels seen in the header row, when schema detection failed.
    pub fn found_columns(&self) -> Option<&[String]> {
        match self {
            ImportError::SchemaNotFound(e) => Some(&e.found),
            _ => None,
        }
    }
}

/// Why a data row produced no transaction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkipReason {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("name cell is empty")]
    MissingName,
    #[error("matched an ignore keyword")]
    Ignored,
    #[error("no category matched")]
    Unclassified,
    #[error("rejected: {0}")]
    Rejected(#[from] TransactionError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    /// 1-based position among the data rows below the header.
    pub row: usize,
    #[serde(serialize_with = "serialize_display")]
    pub reason: SkipReason,
}

fn serialize_display<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Outcome of one file import.
#[derive(Debug, Clone, Serialize)]
pub struct ImportBatchResult {
    pub success: bool,
    pub imported_count: usize,
    pub skipped_count: usize,
    pub total_carbon: Carbon,
    pub message: String,
    pub date_range: Option<DateRange>,
    pub transactions: Vec<NormalizedTransaction>,
    pub skipped: Vec<SkippedRow>,
}

impl ImportBatchResult {
    pub fn new(transactions: Vec<NormalizedTransaction>, skipped: Vec<SkippedRow>) -> Self {
        let total_carbon: Carbon = transactions.iter().map(|t| t.carbon).sum();
        let date_range = DateRange::spanning(transactions.iter().map(|t| t.date.date()));
        let imported_count = transactions.len();
        let skipped_count = skipped.len();
        Self {
            success: true,
            imported_count,
            skipped_count,
            total_carbon,
            message: format!(
                "Successfully imported {imported_count} transactions ({skipped_count} skipped) with {total_carbon}"
            ),
            date_range,
            transactions,
            skipped,
        }
    }
}

/// Detect, normalize, classify and estimate every row of a statement file.
#[derive(Debug, Default)]
pub struct ImportPipeline {
    detector: SchemaDetector,
    classifier: Classifier,
    estimator: CarbonEstimator,
}

impl ImportPipeline {
    pub fn new(detector: SchemaDetector, classifier: Classifier, estimator: CarbonEstimator) -> Self {
        Self {
            detector,
            classifier,
            estimator,
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn FallbackClassifier>) -> Self {
        self.classifier = self.classifier.with_fallback(fallback);
        self
    }

    /// Import a statement. Rows that fail any step are counted as skipped;
    /// only file-level problems return an error.
    pub fn import(&self, bytes: &[u8], filename: &str) -> Result<ImportBatchResult, ImportError> {
        let format = FileFormat::from_filename(filename).ok_or_else(|| ImportError::InvalidFileFormat {
            filename: filename.to_string(),
        })?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ImportError::EmptyFile);
        }

        let rows = read_rows(bytes, format)?;
        if rows.iter().all(|row| row.iter().all(Cell::is_empty)) {
            return Err(ImportError::EmptyFile);
        }

        let schema = self.detector.detect(&rows).inspect_err(|e| {
            warn!(filename, found = ?e.found, "no usable header row");
        })?;
        info!(
            filename,
            header_row = schema.header_row,
            columns = ?schema.labels,
            "detected statement layout"
        );

        let mut transactions = Vec::new();
        let mut skipped = Vec::new();
        for (offset, row) in rows.iter().skip(schema.header_row + 1).enumerate() {
            let row_number = offset + 1;
            match self.process_row(row, &schema.mapping) {
                Ok(tx) => transactions.push(tx),
                Err(reason) => {
                    debug!(row = row_number, %reason, "skipping row");
                    skipped.push(SkippedRow {
                        row: row_number,
                        reason,
                    });
                }
            }
        }

        let result = ImportBatchResult::new(transactions, skipped);
        info!(
            filename,
            imported = result.imported_count,
            skipped = result.skipped_count,
            total_carbon = %result.total_carbon,
            "import finished"
        );
        Ok(result)
    }

    /// Turn one data row into a transaction, or say why not.
    pub fn process_row(&self, row: &[Cell], mapping: &ColumnMapping) -> Result<NormalizedTransaction, SkipReason> {
        let date = date_from_cell(cell(row, mapping.date))?;

        let raw_name = cell(row, mapping.name)
            .text()
            .filter(|name| !name.eq_ignore_ascii_case("nan"))
            .ok_or(SkipReason::MissingName)?;

        let amount = transaction_amount(row, mapping)?;

        let hint = mapping
            .category
            .and_then(|idx| cell(row, idx).text())
            .and_then(|label| Category::from_label(&label));

        let category = match self.classifier.classify(&raw_name, None, hint) {
            Classification::Category(category) => category,
            Classification::Ignore => return Err(SkipReason::Ignored),
            Classification::NoOpinion => return Err(SkipReason::Unclassified),
        };

        let carbon = self.estimator.estimate(amount, category, &raw_name);
        let name = clean_transaction_name(&raw_name);

        Ok(NormalizedTransaction::imported(name, category, date, amount, carbon)?)
    }
}

/// Import with built-in tables and no fallback classifier.
pub fn import_file(bytes: &[u8], filename: &str) -> Result<ImportBatchResult, ImportError> {
    ImportPipeline::default().import(bytes, filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FixedLabelClassifier;

    const STATEMENT: &str = "\
Date,Description,Amount
2024-03-01,UBER TRIP,350
2024-03-02,NEFT TRANSFER,5000
2024-03-03,,120
2024-03-04,XYZ TRADERS,99
2024-03-05,SWIGGY,0
not a date,ZOMATO,250
2024-03-07,UPI-DOMINOS-DOMINOS.PAYU@OKICICI12345,450
";

    #[test]
    fn rejects_unknown_extension() {
        let err = import_file(b"Date,Description,Amount\n", "statement.pdf").unwrap_err();
        assert!(matches!(err, ImportError::InvalidFileFormat { .. }));
        assert!(err.to_string().contains(".csv, .xlsx, .xls"));
    }

    #[test]
    fn rejects_empty_file() {
        assert!(matches!(import_file(b"", "a.csv"), Err(ImportError::EmptyFile)));
        assert!(matches!(import_file(b"\n\n  \n", "a.csv"), Err(ImportError::EmptyFile)));
        assert!(matches!(import_file(b",,,\n,,\n", "a.csv"), Err(ImportError::EmptyFile)));
    }

    #[test]
    fn schema_failure_reports_found_columns() {
        let err = import_file(b"Ref No,Remarks\n1,x\n", "a.csv").unwrap_err();
        assert_eq!(
            err.found_columns(),
            Some(&["ref_no".to_string(), "remarks".to_string()][..])
        );
    }

    #[test]
    fn per_row_outcomes() {
        let result = import_file(STATEMENT.as_bytes(), "march.csv").unwrap();
        assert!(result.success);
        assert_eq!(result.imported_count, 2);
        assert_eq!(result.skipped_count, 5);
        assert_eq!(result.imported_count + result.skipped_count, 7);

        let reasons: Vec<_> = result.skipped.iter().map(|s| (s.row, s.reason.clone())).collect();
        assert_eq!(reasons[0], (2, SkipReason::Ignored));
        assert_eq!(reasons[1], (3, SkipReason::MissingName));
        assert_eq!(reasons[2], (4, SkipReason::Unclassified));
        assert_eq!(reasons[3], (5, SkipReason::Normalize(NormalizeError::ZeroAmount)));
        assert!(matches!(
            reasons[4],
            (6, SkipReason::Normalize(NormalizeError::InvalidDate(_)))
        ));

        let dominos = &result.transactions[1];
        assert_eq!(dominos.name, "Dominos");
        assert_eq!(dominos.category, Category::Food);
    }

    #[test]
    fn totals_and_message() {
        let result = import_file(STATEMENT.as_bytes(), "march.csv").unwrap();
        // uber 350 × 0.0019 = 0.665 → 0.66; dominos 450 × 0.0005 = 0.225 → 0.22
        assert_eq!(result.total_carbon.to_string(), "0.88 kg CO₂");
        assert!(result.message.contains("imported 2 transactions"));
        assert!(result.message.contains("5 skipped"));
        let range = result.date_range.unwrap();
        assert_eq!(range.start.to_string(), "2024-03-01");
        assert_eq!(range.end.to_string(), "2024-03-07");
    }

    #[test]
    fn nothing_imported_is_still_success() {
        let result = import_file(b"Date,Description,Amount\n2024-03-01,NEFT X,10\n", "a.csv").unwrap();
        assert!(result.success);
        assert_eq!(result.imported_count, 0);
        assert!(result.total_carbon.is_zero());
        assert!(result.date_range.is_none());
    }

    #[test]
    fn category_column_is_a_hint() {
        let data = "Date,Description,Amount,Category\n\
                    2024-03-01,XYZ TRADERS,100,Water\n\
                    2024-03-02,XYZ TRADERS,100,Groceries\n\
                    2024-03-03,IMPS P2P,100,Food\n";
        let result = import_file(data.as_bytes(), "a.csv").unwrap();
        assert_eq!(result.imported_count, 1);
        assert_eq!(result.transactions[0].category, Category::Water);
        assert_eq!(result.skipped[0].reason, SkipReason::Unclassified);
        assert_eq!(result.skipped[1].reason, SkipReason::Ignored);
    }

    #[test]
    fn fallback_fills_gaps() {
        let pipeline = ImportPipeline::default().with_fallback(Box::new(FixedLabelClassifier::new("Shopping")));
        let result = pipeline
            .import(b"Date,Description,Amount\n2024-03-04,XYZ TRADERS,100\n", "a.csv")
            .unwrap();
        assert_eq!(result.imported_count, 1);
        assert_eq!(result.transactions[0].category, Category::Shopping);
        assert_eq!(result.transactions[0].carbon.as_decimal().to_string(), "0.25");
    }

    #[test]
    fn nan_name_is_missing() {
        let result = import_file(b"Date,Description,Amount\n2024-03-01,NaN,100\n", "a.csv").unwrap();
        assert_eq!(result.skipped[0].reason, SkipReason::MissingName);
    }

    #[test]
    fn pipeline_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ImportPipeline>();
    }
}

use anyhow::{bail, Context, Result};
use carbonwatch_core::{Carbon, Category, Money, NormalizedTransaction};
use carbonwatch_import::{ImportBatchResult, ImportPipeline};
use carbonwatch_storage::{
    create_db, find_import_by_checksum, get_transactions, insert_import, insert_transaction,
    sha256_hex, total_carbon, DbPool, NewImport, StoredTransaction, TransactionId,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::config::Settings;

pub async fn open_db(path: &Path) -> Result<DbPool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    create_db(path)
        .await
        .with_context(|| format!("open database {}", path.display()))
}

/// Read and import one statement. Nothing is written when `pool` is `None`.
pub async fn import_statement(
    pipeline: &ImportPipeline,
    max_file_bytes: u64,
    file: &Path,
    user: &str,
    pool: Option<&DbPool>,
) -> Result<ImportBatchResult> {
    let size = fs::metadata(file)
        .with_context(|| format!("read {}", file.display()))?
        .len();
    if size > max_file_bytes {
        bail!(
            "{} is {size} bytes, larger than the {max_file_bytes} byte limit",
            file.display()
        );
    }
    let bytes = fs::read(file).with_context(|| format!("read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let result = pipeline.import(&bytes, &filename)?;

    if let Some(pool) = pool {
        let checksum = sha256_hex(&bytes);
        if let Some(previous) = find_import_by_checksum(pool, user, &checksum).await? {
            warn!(
                filename = %filename,
                previous = %previous.created_at,
                "this file was imported before; its records will be stored again"
            );
        }
        let import = NewImport {
            user_id: user.to_string(),
            filename,
            checksum,
            skipped_count: result.skipped_count,
        };
        insert_import(pool, &import, &result.transactions)
            .await
            .context("store imported transactions")?;
    }

    Ok(result)
}

pub fn print_import(result: &ImportBatchResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    println!("{}", result.message);
    if let Some(range) = result.date_range {
        println!("Covering {range}");
    }
    for skipped in &result.skipped {
        println!("  row {}: {}", skipped.row, skipped.reason);
    }
    Ok(())
}

pub struct ManualEntry {
    pub name: String,
    pub category: Category,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub carbon: Option<Decimal>,
    pub description: Option<String>,
}

/// Carbon is estimated from the configured factors unless given.
pub async fn add_manual(
    settings: &Settings,
    pool: &DbPool,
    user: &str,
    entry: ManualEntry,
) -> Result<(TransactionId, NormalizedTransaction)> {
    let amount = Money::from_decimal(entry.amount);
    let date = entry.date.and_hms_opt(0, 0, 0).context("invalid date")?;
    let carbon = match entry.carbon {
        Some(kg) => Carbon::from_decimal(kg),
        None => settings
            .import
            .carbon_estimator()
            .estimate(amount, entry.category, &entry.name),
    };
    let record = NormalizedTransaction::manual(
        entry.name,
        entry.category,
        date,
        amount,
        carbon,
        entry.description,
    )?;
    let id = insert_transaction(pool, user, &record).await?;
    Ok((id, record))
}

pub async fn list(pool: &DbPool, user: &str) -> Result<(Vec<StoredTransaction>, Carbon)> {
    let records = get_transactions(pool, user).await?;
    let total = total_carbon(pool, user).await?;
    Ok((records, total))
}

pub fn print_list(records: &[StoredTransaction], total: Carbon, json: bool) -> Result<()> {
    if json {
        let doc = serde_json::json!({ "transactions": records, "total_carbon": total });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }
    for stored in records {
        let tx = &stored.transaction;
        println!(
            "{}  {:<11}  {:>12}  {:>14}  {}",
            tx.date.format("%Y-%m-%d"),
            tx.category,
            tx.amount.to_string(),
            tx.carbon.to_string(),
            tx.name
        );
    }
    println!("{} transactions, {total}", records.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use carbonwatch_import::ImportError;
    use std::str::FromStr;

    const STATEMENT: &str = "Date,Narration,Withdrawal Amt.,Deposit Amt.\n\
                             01/03/24,UPI-SWIGGY-SWIGGY@PAYTM,250.00,\n\
                             02/03/24,NEFT TRANSFER,5000,\n";

    #[tokio::test]
    async fn import_then_list() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("march.csv");
        fs::write(&file, STATEMENT).unwrap();
        let pool = open_db(&dir.path().join("nested").join("carbon.db")).await.unwrap();

        let pipeline = ImportPipeline::default();
        let result = import_statement(&pipeline, 1024, &file, "alice", Some(&pool))
            .await
            .unwrap();
        assert_eq!(result.imported_count, 1);
        assert_eq!(result.skipped_count, 1);

        let (records, total) = list(&pool, "alice").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].transaction.name, "Swiggy");
        assert_eq!(total, result.total_carbon);
    }

    #[tokio::test]
    async fn dry_run_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("march.csv");
        fs::write(&file, STATEMENT).unwrap();
        let pool = open_db(&dir.path().join("carbon.db")).await.unwrap();

        let result = import_statement(&ImportPipeline::default(), 1024, &file, "alice", None)
            .await
            .unwrap();
        assert_eq!(result.imported_count, 1);
        assert!(list(&pool, "alice").await.unwrap().0.is_empty());
    }

    #[tokio::test]
    async fn oversized_file_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("march.csv");
        fs::write(&file, STATEMENT).unwrap();

        let err = import_statement(&ImportPipeline::default(), 10, &file, "alice", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("byte limit"));
    }

    #[tokio::test]
    async fn fatal_import_error_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("statement.pdf");
        fs::write(&file, "%PDF-1.4").unwrap();

        let err = import_statement(&ImportPipeline::default(), 1024, &file, "alice", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ImportError>(),
            Some(ImportError::InvalidFileFormat { .. })
        ));
    }

    #[tokio::test]
    async fn manual_entry_estimates_carbon() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_db(&dir.path().join("carbon.db")).await.unwrap();
        let entry = ManualEntry {
            name: "Uber to airport".to_string(),
            category: Category::Travel,
            amount: Decimal::from(1000),
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            carbon: None,
            description: Some("work trip".to_string()),
        };
        let (_, record) = add_manual(&Settings::default(), &pool, "alice", entry).await.unwrap();
        // uber factor 0.0019
        assert_eq!(record.carbon.as_decimal(), Decimal::from_str("1.90").unwrap());

        let (records, _) = list(&pool, "alice").await.unwrap();
        assert_eq!(records[0].transaction, record);
    }

    #[tokio::test]
    async fn manual_entry_rejects_zero_amount() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_db(&dir.path().join("carbon.db")).await.unwrap();
        let entry = ManualEntry {
            name: "Nothing".to_string(),
            category: Category::Home,
            amount: Decimal::ZERO,
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            carbon: None,
            description: None,
        };
        assert!(add_manual(&Settings::default(), &pool, "alice", entry).await.is_err());
    }
}

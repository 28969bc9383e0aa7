use carbonwatch_core::{Carbon, Category, Money, NormalizedTransaction, TransactionSource};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqliteConnection};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

pub type DbPool = Pool<Sqlite>;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Corrupt row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ImportId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TransactionId(pub i64);

/// Provenance of one imported file.
#[derive(Debug, Clone)]
pub struct NewImport {
    pub user_id: String,
    pub filename: String,
    pub checksum: String,
    pub skipped_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRecord {
    pub id: ImportId,
    pub user_id: String,
    pub filename: String,
    pub checksum: String,
    pub imported_count: i64,
    pub skipped_count: i64,
    pub total_carbon: Carbon,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredTransaction {
    pub id: TransactionId,
    pub user_id: String,
    pub import_id: Option<ImportId>,
    #[serde(flatten)]
    pub transaction: NormalizedTransaction,
}

pub async fn create_db(path: &Path) -> Result<DbPool, StorageError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS imports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            checksum TEXT NOT NULL,
            imported_count INTEGER NOT NULL,
            skipped_count INTEGER NOT NULL,
            total_carbon TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // amounts and carbon are decimal text to keep them exact
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            import_id INTEGER,
            name TEXT NOT NULL CHECK (length(trim(name)) > 0),
            category TEXT NOT NULL,
            date TEXT NOT NULL,
            amount TEXT NOT NULL,
            carbon TEXT NOT NULL,
            description TEXT,
            source TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (import_id) REFERENCES imports(id) ON DELETE SET NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions (user_id, date)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_imports_checksum ON imports (user_id, checksum)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Record an import and all of its transactions in one SQL transaction.
/// Nothing is written if any insert fails.
pub async fn insert_import(
    pool: &DbPool,
    import: &NewImport,
    transactions: &[NormalizedTransaction],
) -> Result<ImportId, StorageError> {
    let total_carbon: Carbon = transactions.iter().map(|t| t.carbon).sum();

    let mut tx = pool.begin().await?;

    let import_id = sqlx::query(
        "INSERT INTO imports (user_id, filename, checksum, imported_count, skipped_count, total_carbon) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&import.user_id)
    .bind(&import.filename)
    .bind(&import.checksum)
    .bind(transactions.len() as i64)
    .bind(import.skipped_count as i64)
    .bind(total_carbon.as_decimal().to_string())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for record in transactions {
        insert_row(&mut tx, &import.user_id, Some(import_id), record).await?;
    }

    tx.commit().await?;

    info!(
        import_id,
        filename = %import.filename,
        count = transactions.len(),
        "stored import batch"
    );
    Ok(ImportId(import_id))
}

/// Store a single record outside any import, e.g. a manual entry.
pub async fn insert_transaction(
    pool: &DbPool,
    user_id: &str,
    record: &NormalizedTransaction,
) -> Result<TransactionId, StorageError> {
    let mut conn = pool.acquire().await?;
    let id = insert_row(&mut conn, user_id, None, record).await?;
    Ok(TransactionId(id))
}

async fn insert_row(
    conn: &mut SqliteConnection,
    user_id: &str,
    import_id: Option<i64>,
    record: &NormalizedTransaction,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO transactions (user_id, import_id, name, category, date, amount, carbon, description, source) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(import_id)
    .bind(&record.name)
    .bind(record.category.as_str())
    .bind(record.date.format(DATE_FORMAT).to_string())
    .bind(record.amount.as_decimal().to_string())
    .bind(record.carbon.as_decimal().to_string())
    .bind(&record.description)
    .bind(record.source.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

type TransactionRow = (
    i64,
    String,
    Option<i64>,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
);

/// Newest first.
pub async fn get_transactions(pool: &DbPool, user_id: &str) -> Result<Vec<StoredTransaction>, StorageError> {
    let rows = sqlx::query_as::<_, TransactionRow>(
        "SELECT id, user_id, import_id, name, category, date, amount, carbon, description, source FROM transactions WHERE user_id = ? ORDER BY date DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(decode_transaction).collect()
}

fn decode_transaction(row: TransactionRow) -> Result<StoredTransaction, StorageError> {
    let (id, user_id, import_id, name, category, date, amount, carbon, description, source) = row;
    let corrupt = |reason: String| StorageError::Corrupt { id, reason };

    let category = Category::from_str(&category).map_err(|e| corrupt(e.to_string()))?;
    let date = NaiveDateTime::parse_from_str(&date, DATE_FORMAT)
        .map_err(|e| corrupt(format!("date '{date}': {e}")))?;
    let amount = decode_decimal(&amount).map_err(corrupt)?;
    let carbon = decode_decimal(&carbon).map_err(corrupt)?;
    let source = TransactionSource::from_str(&source).map_err(corrupt)?;

    Ok(StoredTransaction {
        id: TransactionId(id),
        user_id,
        import_id: import_id.map(ImportId),
        transaction: NormalizedTransaction {
            name,
            category,
            date,
            amount: Money::from_decimal(amount),
            carbon: Carbon::from_decimal(carbon),
            description,
            source,
        },
    })
}

fn decode_decimal(raw: &str) -> Result<Decimal, String> {
    Decimal::from_str(raw).map_err(|e| format!("decimal '{raw}': {e}"))
}

/// Sum of stored carbon for a user.
pub async fn total_carbon(pool: &DbPool, user_id: &str) -> Result<Carbon, StorageError> {
    let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, carbon FROM transactions WHERE user_id = ?")
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|(id, carbon)| {
            decode_decimal(&carbon)
                .map(Carbon::from_decimal)
                .map_err(|reason| StorageError::Corrupt { id, reason })
        })
        .sum()
}

type ImportRow = (i64, String, String, String, i64, i64, String, String);

pub async fn find_import_by_checksum(
    pool: &DbPool,
    user_id: &str,
    checksum: &str,
) -> Result<Option<ImportRecord>, StorageError> {
    let row = sqlx::query_as::<_, ImportRow>(
        "SELECT id, user_id, filename, checksum, imported_count, skipped_count, total_carbon, created_at FROM imports WHERE user_id = ? AND checksum = ? ORDER BY id LIMIT 1",
    )
    .bind(user_id)
    .bind(checksum)
    .fetch_optional(pool)
    .await?;

    row.map(decode_import).transpose()
}

pub async fn get_imports(pool: &DbPool, user_id: &str) -> Result<Vec<ImportRecord>, StorageError> {
    let rows = sqlx::query_as::<_, ImportRow>(
        "SELECT id, user_id, filename, checksum, imported_count, skipped_count, total_carbon, created_at FROM imports WHERE user_id = ? ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(decode_import).collect()
}

fn decode_import(row: ImportRow) -> Result<ImportRecord, StorageError> {
    let (id, user_id, filename, checksum, imported_count, skipped_count, total_carbon, created_at) = row;
    let total_carbon = decode_decimal(&total_carbon).map_err(|reason| StorageError::Corrupt { id, reason })?;
    Ok(ImportRecord {
        id: ImportId(id),
        user_id,
        filename,
        checksum,
        imported_count,
        skipped_count,
        total_carbon: Carbon::from_decimal(total_carbon),
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256_hex;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    async fn open() -> (TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_db(&dir.path().join("carbon.db")).await.unwrap();
        (dir, pool)
    }

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn record(name: &str, category: Category, date: NaiveDateTime, amount: &str, carbon: &str) -> NormalizedTransaction {
        NormalizedTransaction::imported(
            name,
            category,
            date,
            Money::from_decimal(Decimal::from_str(amount).unwrap()),
            Carbon::from_decimal(Decimal::from_str(carbon).unwrap()),
        )
        .unwrap()
    }

    fn new_import(user: &str, skipped: usize) -> NewImport {
        NewImport {
            user_id: user.to_string(),
            filename: "march.csv".to_string(),
            checksum: sha256_hex(b"march"),
            skipped_count: skipped,
        }
    }

    #[tokio::test]
    async fn batch_round_trip() {
        let (_dir, pool) = open().await;
        let batch = vec![
            record("Uber Trip", Category::Travel, at(2024, 3, 1), "350", "0.66"),
            record("Dominos", Category::Food, at(2024, 3, 7), "450", "0.22"),
        ];
        let id = insert_import(&pool, &new_import("alice", 1), &batch).await.unwrap();

        let stored = get_transactions(&pool, "alice").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].transaction, batch[1]);
        assert_eq!(stored[1].transaction, batch[0]);
        assert!(stored.iter().all(|s| s.import_id == Some(id)));

        let total = total_carbon(&pool, "alice").await.unwrap();
        assert_eq!(total.as_decimal(), Decimal::from_str("0.88").unwrap());

        let imports = get_imports(&pool, "alice").await.unwrap();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].imported_count, 2);
        assert_eq!(imports[0].skipped_count, 1);
        assert_eq!(imports[0].total_carbon, total);
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let (_dir, pool) = open().await;
        let batch = vec![record("Uber Trip", Category::Travel, at(2024, 3, 1), "350", "0.66")];
        insert_import(&pool, &new_import("alice", 0), &batch).await.unwrap();

        assert!(get_transactions(&pool, "bob").await.unwrap().is_empty());
        assert!(total_carbon(&pool, "bob").await.unwrap().is_zero());
    }

    #[tokio::test]
    async fn failed_batch_rolls_back() {
        let (_dir, pool) = open().await;
        let good = record("Uber Trip", Category::Travel, at(2024, 3, 1), "350", "0.66");
        let mut bad = good.clone();
        bad.name = "   ".to_string();

        let result = insert_import(&pool, &new_import("alice", 0), &[good, bad]).await;
        assert!(matches!(result, Err(StorageError::Database(_))));

        assert!(get_transactions(&pool, "alice").await.unwrap().is_empty());
        assert!(get_imports(&pool, "alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn manual_entry() {
        let (_dir, pool) = open().await;
        let manual = NormalizedTransaction::manual(
            "Weekly groceries",
            Category::Food,
            at(2024, 3, 10),
            Money::from_decimal(Decimal::from(1200)),
            Carbon::from_decimal(Decimal::from_str("1.92").unwrap()),
            Some("farmers market".to_string()),
        )
        .unwrap();
        insert_transaction(&pool, "alice", &manual).await.unwrap();

        let stored = get_transactions(&pool, "alice").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].import_id, None);
        assert_eq!(stored[0].transaction.source, TransactionSource::Manual);
        assert_eq!(stored[0].transaction.description.as_deref(), Some("farmers market"));
    }

    #[tokio::test]
    async fn checksum_lookup() {
        let (_dir, pool) = open().await;
        let import = new_import("alice", 0);
        assert!(find_import_by_checksum(&pool, "alice", &import.checksum).await.unwrap().is_none());

        insert_import(&pool, &import, &[]).await.unwrap();
        let found = find_import_by_checksum(&pool, "alice", &import.checksum).await.unwrap().unwrap();
        assert_eq!(found.filename, "march.csv");
        assert_eq!(found.imported_count, 0);
        assert!(find_import_by_checksum(&pool, "bob", &import.checksum).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reopening_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carbon.db");
        {
            let pool = create_db(&path).await.unwrap();
            let manual = record("Rent", Category::Home, at(2024, 3, 1), "15000", "42.00");
            insert_transaction(&pool, "alice", &manual).await.unwrap();
            pool.close().await;
        }
        let pool = create_db(&path).await.unwrap();
        assert_eq!(get_transactions(&pool, "alice").await.unwrap().len(), 1);
    }
}

pub mod db;
pub mod hash;

pub use db::{
    create_db, find_import_by_checksum, get_imports, get_transactions, insert_import,
    insert_transaction, total_carbon, DbPool, ImportId, ImportRecord, NewImport, StorageError,
    StoredTransaction, TransactionId,
};
pub use hash::sha256_hex;

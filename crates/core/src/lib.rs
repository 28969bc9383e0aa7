pub mod carbon;
pub mod category;
pub mod money;
pub mod period;
pub mod transaction;

pub use carbon::Carbon;
pub use category::{Category, UnknownCategory};
pub use money::Money;
pub use period::DateRange;
pub use transaction::{NormalizedTransaction, TransactionError, TransactionSource};

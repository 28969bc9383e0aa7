pub mod carbon;
pub mod classify;
pub mod clean;
pub mod config;
pub mod fallback;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod table;
pub(crate) mod util;

pub use carbon::CarbonEstimator;
pub use classify::{Classification, Classifier, KeywordClassifier};
pub use clean::clean_transaction_name;
pub use config::{ConfigError, ImportConfig};
pub use fallback::{FallbackClassifier, FallbackError, FixedLabelClassifier, LexiconClassifier};
pub use normalize::{parse_amount, parse_date, NormalizeError};
pub use pipeline::{import_file, ImportBatchResult, ImportError, ImportPipeline, SkipReason, SkippedRow};
pub use schema::{ColumnMapping, DetectedSchema, SchemaDetector, SchemaNotFound};
pub use table::{Cell, FileFormat};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::carbon::Carbon;
use super::category::Category;
use super::money::Money;

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    Import,
    Manual,
}

impl fmt::Display for TransactionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionSource::Import => write!(f, "import"),
            TransactionSource::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for TransactionSource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "import" => Ok(TransactionSource::Import),
            "manual" => Ok(TransactionSource::Manual),
            other => Err(format!("Unknown transaction source: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransactionError {
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Money),
    #[error("Transaction name is empty")]
    EmptyName,
    #[error("Carbon estimate cannot be negative, got {0}")]
    NegativeCarbon(Carbon),
}

/// A classified, carbon-annotated spending record ready to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTransaction {
    pub name: String,
    pub category: Category,
    pub date: NaiveDateTime,
    /// Positive magnitude; debit/credit direction is not retained.
    pub amount: Money,
    pub carbon: Carbon,
    pub description: Option<String>,
    pub source: TransactionSource,
}

impl NormalizedTransaction {
    pub fn imported(
        name: impl Into<String>,
        category: Category,
        date: NaiveDateTime,
        amount: Money,
        carbon: Carbon,
    ) -> Result<Self, TransactionError> {
        Self::validate(NormalizedTransaction {
            name: name.into(),
            category,
            date,
            amount,
            carbon,
            description: None,
            source: TransactionSource::Import,
        })
    }

    pub fn manual(
        name: impl Into<String>,
        category: Category,
        date: NaiveDateTime,
        amount: Money,
        carbon: Carbon,
        description: Option<String>,
    ) -> Result<Self, TransactionError> {
        Self::validate(NormalizedTransaction {
            name: name.into(),
            category,
            date,
            amount,
            carbon,
            description,
            source: TransactionSource::Manual,
        })
    }

    fn validate(tx: NormalizedTransaction) -> Result<Self, TransactionError> {
        if !tx.amount.is_positive() {
            return Err(TransactionError::NonPositiveAmount(tx.amount));
        }
        if tx.name.trim().is_empty() {
            return Err(TransactionError::EmptyName);
        }
        if tx.carbon.is_negative() {
            return Err(TransactionError::NegativeCarbon(tx.carbon));
        }
        Ok(tx)
    }
}

//! Ledger errors

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors from account and transfer operations. A failed operation leaves
/// every balance and the chain exactly as they were.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("account id cannot be empty")]
    InvalidAccountId,

    #[error("unknown account: {0}")]
    UnknownAccount(String),

    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    #[error("balance overflow for account {0}")]
    Overflow(String),

    #[error("amount {amount} is below the precision of account {account}'s balance")]
    PrecisionLoss { account: String, amount: Decimal },
}

/// First integrity violation found while verifying a chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("chain has no genesis record")]
    Empty,

    #[error("genesis previous link must be the sentinel, got '{found}'")]
    BadGenesis { found: String },

    #[error("record at position {position} carries index {found}")]
    IndexMismatch { position: u64, found: u64 },

    #[error("broken link at record {index}: expected previous link '{expected}', got '{actual}'")]
    BrokenLink {
        index: u64,
        expected: String,
        actual: String,
    },

    #[error("invalid link at record {index}: expected '{expected}', got '{actual}'")]
    InvalidLink {
        index: u64,
        expected: String,
        actual: String,
    },
}

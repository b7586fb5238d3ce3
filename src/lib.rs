//! Tamper-evident ledger: a SHA-256 hash-linked chain of records plus an
//! account store whose balances move only through recorded transfers.
//!
//! # Key Types
//! - `Chain`: append-only sequence of linked `Record`s, starting at genesis
//! - `AccountStore`: account ids, credentials and balances
//! - `Ledger`: owns both and settles transfers across them

pub mod accounts;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod model;
pub mod routes;
pub mod telemetry;

pub use accounts::{Account, AccountCreation, AccountStore, AccountView};
pub use config::Config;
pub use error::{ChainError, LedgerError};
pub use ledger::Ledger;
pub use model::{Chain, Payload, Record, Transfer};
pub use routes::{router, AppState};

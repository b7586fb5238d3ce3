//! Data model for linked records and the append-only chain that holds them.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::crypto::{compute_link, GENESIS_MARKER, SENTINEL};
use crate::error::ChainError;

/// Value movement recorded in a chain record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub sender: String,
    pub receiver: String,
    pub amount: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Content carried by a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// Opaque content (the genesis marker, free-form notes).
    Data { text: String },
    Transfer(Transfer),
}

impl Payload {
    pub fn data(text: impl Into<String>) -> Self {
        Payload::Data { text: text.into() }
    }

    pub fn as_transfer(&self) -> Option<&Transfer> {
        match self {
            Payload::Transfer(t) => Some(t),
            Payload::Data { .. } => None,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Data { text } => write!(f, "Data: {text}"),
            Payload::Transfer(t) => write!(
                f,
                "Transfer: sender={}, receiver={}, amount={}",
                t.sender, t.receiver, t.amount
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Position in the chain, starting at 0 for genesis.
    pub index: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub payload: Payload,
    /// Link of the preceding record (`SENTINEL` for genesis).
    pub previous_link: String,
    /// SHA-256 hex over (index, timestamp, payload, previous_link).
    pub link: String,
}

impl Record {
    fn new(index: u64, timestamp: OffsetDateTime, payload: Payload, previous_link: String) -> Self {
        let link = compute_link(index, timestamp, &payload, &previous_link);
        Self {
            index,
            timestamp,
            payload,
            previous_link,
            link,
        }
    }

    /// Recompute the link from the stored fields.
    pub fn compute_link(&self) -> String {
        compute_link(self.index, self.timestamp, &self.payload, &self.previous_link)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Record {}", self.index)?;
        writeln!(f, "Timestamp: {}", self.timestamp)?;
        writeln!(f, "{}", self.payload)?;
        writeln!(f, "Previous link: {}", self.previous_link)?;
        write!(f, "Link: {}", self.link)
    }
}

/// Append-only sequence of linked records. Never empty: index 0 is genesis.
#[derive(Debug, Clone)]
pub struct Chain {
    records: Vec<Record>,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    /// Create a chain holding only the genesis record.
    pub fn new() -> Self {
        let genesis = Record::new(
            0,
            OffsetDateTime::now_utc(),
            Payload::data(GENESIS_MARKER),
            SENTINEL.to_string(),
        );
        Self {
            records: vec![genesis],
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Never true: genesis is always present.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> &Record {
        // `records` always holds genesis
        &self.records[self.records.len() - 1]
    }

    pub fn get(&self, index: u64) -> Option<&Record> {
        usize::try_from(index).ok().and_then(|i| self.records.get(i))
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Append a record stamped with the current time.
    pub fn append(&mut self, payload: Payload) -> &Record {
        self.append_at(payload, OffsetDateTime::now_utc())
    }

    /// Append a record stamped with `timestamp`, clamped so timestamps never
    /// go backwards along the chain.
    pub(crate) fn append_at(&mut self, payload: Payload, timestamp: OffsetDateTime) -> &Record {
        let prev = self.latest();
        let timestamp = timestamp.max(prev.timestamp);
        let record = Record::new(self.records.len() as u64, timestamp, payload, prev.link.clone());
        tracing::debug!(index = record.index, link = %record.link, "record appended");
        self.records.push(record);
        self.latest()
    }

    /// Check index continuity, linkage and every stored link.
    pub fn verify(&self) -> Result<(), ChainError> {
        verify_records(&self.records)?;
        tracing::debug!(len = self.records.len(), "chain verified");
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.verify().is_ok()
    }

    #[cfg(test)]
    pub(crate) fn records_mut(&mut self) -> &mut Vec<Record> {
        &mut self.records
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Verify a sequence of records as a chain starting at genesis, e.g. one
/// exported through `Chain::records`. Stops at the first violation.
pub fn verify_records(records: &[Record]) -> Result<(), ChainError> {
    if records.is_empty() {
        return Err(ChainError::Empty);
    }
    for (position, record) in records.iter().enumerate() {
        let position = position as u64;
        if record.index != position {
            return Err(ChainError::IndexMismatch {
                position,
                found: record.index,
            });
        }

        if position == 0 {
            if record.previous_link != SENTINEL {
                return Err(ChainError::BadGenesis {
                    found: record.previous_link.clone(),
                });
            }
        } else {
            let prev = &records[position as usize - 1];
            if record.previous_link != prev.link {
                return Err(ChainError::BrokenLink {
                    index: position,
                    expected: prev.link.clone(),
                    actual: record.previous_link.clone(),
                });
            }
        }

        let calculated = record.compute_link();
        if record.link != calculated {
            return Err(ChainError::InvalidLink {
                index: position,
                expected: calculated,
                actual: record.link.clone(),
            });
        }
    }
    Ok(())
}

//! Digest helpers: SHA-256 hex hashing and the canonical byte layout of a record.

use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::model::Payload;

/// Payload text of the genesis record.
pub const GENESIS_MARKER: &str = "Genesis Block";

/// `previous_link` of the genesis record.
pub const SENTINEL: &str = "0";

/// Hash inputs (concatenate as bytes, SHA-256) and return lowercase hex.
pub fn hash_concat(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update(p);
    }
    hex::encode(hasher.finalize())
}

/// Compute the link of a record from its linked fields.
///
/// Every field goes through the hasher length-prefixed, so `("ab", "c")` and
/// `("a", "bc")` never produce the same digest.
pub fn compute_link(
    index: u64,
    timestamp: OffsetDateTime,
    payload: &Payload,
    previous_link: &str,
) -> String {
    let mut fields = Fields::default();
    fields.push(&index.to_le_bytes());
    fields.push(&timestamp_bytes(timestamp));
    match payload {
        Payload::Data { text } => {
            fields.push(b"data");
            fields.push(text.as_bytes());
        }
        Payload::Transfer(t) => {
            fields.push(b"transfer");
            fields.push(t.sender.as_bytes());
            fields.push(t.receiver.as_bytes());
            fields.push(t.amount.to_string().as_bytes());
            fields.push(&timestamp_bytes(t.timestamp));
        }
    }
    fields.push(previous_link.as_bytes());
    fields.finish()
}

fn timestamp_bytes(ts: OffsetDateTime) -> [u8; 16] {
    ts.unix_timestamp_nanos().to_le_bytes()
}

#[derive(Default)]
struct Fields {
    hasher: Sha256,
}

impl Fields {
    fn push(&mut self, bytes: &[u8]) {
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

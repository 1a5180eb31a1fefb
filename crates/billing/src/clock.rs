//! Injectable time and transaction-id providers
//!
//! The ledger emitter and the schedule calculator take their notion of "now"
//! and their random id suffixes through these traits so transitions are
//! deterministic under test.

use std::sync::Arc;

use time::OffsetDateTime;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall-clock implementation used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Fixed clock for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

/// Source of the random portion of human-readable transaction ids.
pub trait TxnIdGenerator: Send + Sync {
    /// A 6-character uppercase alphanumeric suffix. Collisions are tolerated;
    /// the ledger key is the row id, not this code.
    fn suffix(&self) -> String;
}

/// Random suffix generator used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTxnIds;

const SUFFIX_LEN: usize = 6;
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

impl TxnIdGenerator for RandomTxnIds {
    fn suffix(&self) -> String {
        use rand::Rng;

        let mut rng = rand::rng();
        (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect()
    }
}

/// Fixed suffix generator for tests.
#[derive(Debug, Clone)]
pub struct FixedTxnIds(pub String);

impl TxnIdGenerator for FixedTxnIds {
    fn suffix(&self) -> String {
        self.0.clone()
    }
}

pub type SharedClock = Arc<dyn Clock>;
pub type SharedTxnIds = Arc<dyn TxnIdGenerator>;

use super::{in_region, BoundedCursor, RawCursor, ScanIterator};
use crate::codec::{decode_zscore_key, DataType};

/// Iterates the members of one sorted set in score order.
pub struct ZsetIterator<C: RawCursor> {
    iter: BoundedCursor<C>,
    name: String,
    done: bool,
    key: String,
    score: i64,
}

impl<C: RawCursor> ZsetIterator<C> {
    pub fn new(iter: BoundedCursor<C>, name: impl Into<String>) -> Self {
        Self {
            iter,
            name: name.into(),
            done: false,
            key: String::new(),
            score: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current member.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn score(&self) -> i64 {
        self.score
    }
}

impl<C: RawCursor> ScanIterator for ZsetIterator<C> {
    fn next(&mut self) -> bool {
        if self.done {
            return false;
        }
        while self.iter.next() {
            let raw_key = self.iter.key();
            if !in_region(raw_key, DataType::ZScore) {
                tracing::debug!(zset = %self.name, tag = ?raw_key.first(), "left zscore region");
                self.done = true;
                return false;
            }
            let (name, member, score) = match decode_zscore_key(raw_key) {
                Ok(decoded) => decoded,
                Err(err) => {
                    tracing::debug!(error = %err, zset = %self.name, "skipping undecodable zscore key");
                    continue;
                }
            };
            if name != self.name {
                tracing::debug!(zset = %self.name, next = %name, "left zset");
                self.done = true;
                return false;
            }
            self.key = member;
            self.score = score;
            return true;
        }
        false
    }
}

use bytes::Bytes;

use super::{in_region, BoundedCursor, RawCursor, ScanIterator};
use crate::codec::{decode_kv_key, DataType};
use crate::projection::RuleSet;

/// Iterates plain key-value records, optionally projecting JSON values.
pub struct KvIterator<C: RawCursor> {
    iter: BoundedCursor<C>,
    rules: RuleSet,
    return_val: bool,
    done: bool,
    key: String,
    val: Bytes,
}

impl<C: RawCursor> KvIterator<C> {
    /// Create a KV iterator. `filter` is a projection configuration; an empty
    /// or malformed one leaves values unfiltered.
    pub fn new(iter: BoundedCursor<C>, filter: &str) -> Self {
        Self::with_rules(iter, RuleSet::from_config(filter))
    }

    pub fn with_rules(iter: BoundedCursor<C>, rules: RuleSet) -> Self {
        Self {
            iter,
            rules,
            return_val: true,
            done: false,
            key: String::new(),
            val: Bytes::new(),
        }
    }

    /// Turn value materialization on or off. With it off, projection rules
    /// are not applied either.
    pub fn return_val(&mut self, onoff: bool) {
        self.return_val = onoff;
    }

    /// Whether values pass through a non-empty rule set.
    pub fn is_filtered(&self) -> bool {
        !self.rules.is_empty()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn val(&self) -> &Bytes {
        &self.val
    }
}

impl<C: RawCursor> ScanIterator for KvIterator<C> {
    fn next(&mut self) -> bool {
        if self.done {
            return false;
        }
        while self.iter.next() {
            let raw_key = self.iter.key();
            if !in_region(raw_key, DataType::Kv) {
                tracing::debug!(tag = ?raw_key.first(), "left kv region");
                self.done = true;
                return false;
            }
            let key = match decode_kv_key(raw_key) {
                Ok(key) => key,
                Err(err) => {
                    tracing::debug!(error = %err, "skipping undecodable kv key");
                    continue;
                }
            };

            if self.return_val {
                if self.rules.is_empty() {
                    self.val = Bytes::copy_from_slice(self.iter.val());
                } else {
                    match self.rules.project(&key, self.iter.val()) {
                        Some(projected) => self.val = projected,
                        None => continue,
                    }
                }
            }
            self.key = key;
            return true;
        }
        false
    }
}

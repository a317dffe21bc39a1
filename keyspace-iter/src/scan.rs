//! Logical range scans over a [`MemTable`].
//!
//! Each scan encodes its logical range into raw keys, positions a cursor at
//! the start and hands it to the typed iterator for its data type. Start keys
//! are exclusive and end keys inclusive; an empty start begins at the edge of
//! the region, an empty end leaves the scan bounded by the region alone.

use std::ops::Bound;

use crate::codec::{
    encode_hash_key, encode_hash_prefix, encode_kv_key, encode_zscore_bound, encode_zscore_key,
    encode_zscore_prefix, CodecError, DataType,
};
use crate::iterators::{BoundedCursor, Direction, HashIterator, KvIterator, ZsetIterator};
use crate::mem_table::{MemTable, MemTableCursor};

/// The smallest key greater than every key starting with `prefix`, or `None`
/// when no such key exists.
fn successor(mut prefix: Vec<u8>) -> Option<Vec<u8>> {
    while let Some(last) = prefix.pop() {
        if last < u8::MAX {
            prefix.push(last + 1);
            return Some(prefix);
        }
    }
    None
}

/// Encode an end key, keeping an empty one empty.
fn encode_end(
    end: &str,
    encode: impl FnOnce(&str) -> Result<Vec<u8>, CodecError>,
) -> Result<Vec<u8>, CodecError> {
    if end.is_empty() {
        Ok(Vec::new())
    } else {
        encode(end)
    }
}

fn kv_end(end: &str) -> Vec<u8> {
    if end.is_empty() {
        Vec::new()
    } else {
        encode_kv_key(end)
    }
}

impl MemTable {
    fn bounded(
        &self,
        start: Bound<&[u8]>,
        end: Vec<u8>,
        limit: u64,
        direction: Direction,
    ) -> BoundedCursor<MemTableCursor> {
        BoundedCursor::new(self.cursor(start, direction), end, limit, direction)
    }

    /// Scan a region backwards from just before `upper`, or from the last key
    /// of the store.
    fn bounded_from_upper(
        &self,
        upper: Option<Vec<u8>>,
        end: Vec<u8>,
        limit: u64,
    ) -> BoundedCursor<MemTableCursor> {
        match upper {
            Some(upper) => {
                self.bounded(Bound::Excluded(&upper[..]), end, limit, Direction::Backward)
            }
            None => self.bounded(Bound::Unbounded, end, limit, Direction::Backward),
        }
    }

    /// KV records with keys in `(start, end]`, ascending.
    pub fn scan(
        &self,
        start: &str,
        end: &str,
        limit: u64,
        filter: &str,
    ) -> KvIterator<MemTableCursor> {
        let end = kv_end(end);
        let iter = if start.is_empty() {
            let tag = [DataType::Kv.tag()];
            self.bounded(Bound::Included(&tag[..]), end, limit, Direction::Forward)
        } else {
            let start = encode_kv_key(start);
            self.bounded(Bound::Excluded(&start[..]), end, limit, Direction::Forward)
        };
        KvIterator::new(iter, filter)
    }

    /// KV records with keys in `[end, start)`, descending.
    pub fn rscan(
        &self,
        start: &str,
        end: &str,
        limit: u64,
        filter: &str,
    ) -> KvIterator<MemTableCursor> {
        let end = kv_end(end);
        let iter = if start.is_empty() {
            self.bounded_from_upper(successor(vec![DataType::Kv.tag()]), end, limit)
        } else {
            let start = encode_kv_key(start);
            self.bounded(Bound::Excluded(&start[..]), end, limit, Direction::Backward)
        };
        KvIterator::new(iter, filter)
    }

    /// KV keys in `(start, end]` without their values.
    pub fn keys(&self, start: &str, end: &str, limit: u64) -> KvIterator<MemTableCursor> {
        let mut iter = self.scan(start, end, limit, "");
        iter.return_val(false);
        iter
    }

    /// Fields of hash `name` in `(start, end]`, ascending.
    pub fn hscan(
        &self,
        name: &str,
        start: &str,
        end: &str,
        limit: u64,
    ) -> Result<HashIterator<MemTableCursor>, CodecError> {
        let end = encode_end(end, |end| encode_hash_key(name, end))?;
        let iter = if start.is_empty() {
            let prefix = encode_hash_prefix(name)?;
            self.bounded(Bound::Included(&prefix[..]), end, limit, Direction::Forward)
        } else {
            let start = encode_hash_key(name, start)?;
            self.bounded(Bound::Excluded(&start[..]), end, limit, Direction::Forward)
        };
        Ok(HashIterator::new(iter, name))
    }

    /// Fields of hash `name` in `[end, start)`, descending.
    pub fn hrscan(
        &self,
        name: &str,
        start: &str,
        end: &str,
        limit: u64,
    ) -> Result<HashIterator<MemTableCursor>, CodecError> {
        let end = encode_end(end, |end| encode_hash_key(name, end))?;
        let iter = if start.is_empty() {
            self.bounded_from_upper(successor(encode_hash_prefix(name)?), end, limit)
        } else {
            let start = encode_hash_key(name, start)?;
            self.bounded(Bound::Excluded(&start[..]), end, limit, Direction::Backward)
        };
        Ok(HashIterator::new(iter, name))
    }

    /// Members of sorted set `name` scored in `[score_start, score_end]`,
    /// ascending. A non-empty `member_start` resumes after that member of
    /// `score_start`; it is ignored without a `score_start`.
    pub fn zscan(
        &self,
        name: &str,
        member_start: &str,
        score_start: Option<i64>,
        score_end: Option<i64>,
        limit: u64,
    ) -> Result<ZsetIterator<MemTableCursor>, CodecError> {
        let end = match score_end {
            Some(score) => encode_zscore_bound(name, score, Direction::Forward)?,
            None => Vec::new(),
        };
        let iter = match score_start {
            Some(score) if !member_start.is_empty() => {
                let start = encode_zscore_key(name, member_start, score)?;
                self.bounded(Bound::Excluded(&start[..]), end, limit, Direction::Forward)
            }
            Some(score) => {
                let start = encode_zscore_bound(name, score, Direction::Backward)?;
                self.bounded(Bound::Included(&start[..]), end, limit, Direction::Forward)
            }
            None => {
                let prefix = encode_zscore_prefix(name)?;
                self.bounded(Bound::Included(&prefix[..]), end, limit, Direction::Forward)
            }
        };
        Ok(ZsetIterator::new(iter, name))
    }

    /// Members of sorted set `name` scored in `[score_end, score_start]`,
    /// descending. `member_start` resumes before that member of `score_start`.
    pub fn zrscan(
        &self,
        name: &str,
        member_start: &str,
        score_start: Option<i64>,
        score_end: Option<i64>,
        limit: u64,
    ) -> Result<ZsetIterator<MemTableCursor>, CodecError> {
        let end = match score_end {
            Some(score) => encode_zscore_bound(name, score, Direction::Backward)?,
            None => Vec::new(),
        };
        let iter = match score_start {
            Some(score) if !member_start.is_empty() => {
                let start = encode_zscore_key(name, member_start, score)?;
                self.bounded(Bound::Excluded(&start[..]), end, limit, Direction::Backward)
            }
            Some(score) => {
                let start = encode_zscore_bound(name, score, Direction::Forward)?;
                self.bounded(Bound::Included(&start[..]), end, limit, Direction::Backward)
            }
            None => self.bounded_from_upper(successor(encode_zscore_prefix(name)?), end, limit),
        };
        Ok(ZsetIterator::new(iter, name))
    }
}

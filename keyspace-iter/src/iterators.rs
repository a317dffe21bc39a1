pub mod bounded;
pub mod hash;
pub mod kv;
pub mod zset;

pub use bounded::{BoundedCursor, Direction};
pub use hash::HashIterator;
pub use kv::KvIterator;
pub use zset::ZsetIterator;

use crate::codec::DataType;

/// A physical cursor over an ordered byte keyspace.
///
/// The cursor must already be positioned when it is handed to a
/// [`BoundedCursor`]. `key` and `value` are only meaningful while
/// `is_valid` returns true.
pub trait RawCursor {
    /// Get the current key.
    fn key(&self) -> &[u8];

    /// Get the current value.
    fn value(&self) -> &[u8];

    /// Check if the cursor points at an entry.
    fn is_valid(&self) -> bool;

    /// Step to the next entry in key order.
    fn next(&mut self) -> anyhow::Result<()>;

    /// Step to the previous entry in key order.
    fn prev(&mut self) -> anyhow::Result<()>;
}

/// A pull-based iterator that reports exhaustion with `false`.
///
/// Once `next` has returned false it keeps returning false.
pub trait ScanIterator {
    /// Advance to the next record.
    fn next(&mut self) -> bool;

    /// Advance `offset` times, discarding the records. Returns false as soon as
    /// one advance fails.
    fn skip(&mut self, offset: u64) -> bool {
        for _ in 0..offset {
            if !self.next() {
                return false;
            }
        }
        true
    }
}

/// Whether `raw_key` lives in the region of `expected`.
///
/// Regions are contiguous in key order, so a typed iterator treats the first
/// mismatch as the end of its stream.
pub(crate) fn in_region(raw_key: &[u8], expected: DataType) -> bool {
    raw_key.first() == Some(&expected.tag())
}

#[cfg(test)]
mod tests;

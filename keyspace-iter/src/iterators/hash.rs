use bytes::Bytes;

use super::{in_region, BoundedCursor, RawCursor, ScanIterator};
use crate::codec::{decode_hash_key, DataType};

/// Iterates the fields of one hash.
///
/// The stream ends at the first key outside the hash region or belonging to
/// another hash.
pub struct HashIterator<C: RawCursor> {
    iter: BoundedCursor<C>,
    name: String,
    return_val: bool,
    done: bool,
    key: String,
    val: Bytes,
}

impl<C: RawCursor> HashIterator<C> {
    pub fn new(iter: BoundedCursor<C>, name: impl Into<String>) -> Self {
        Self {
            iter,
            name: name.into(),
            return_val: true,
            done: false,
            key: String::new(),
            val: Bytes::new(),
        }
    }

    pub fn return_val(&mut self, onoff: bool) {
        self.return_val = onoff;
    }

    /// Name of the hash being scanned.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current field.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn val(&self) -> &Bytes {
        &self.val
    }
}

impl<C: RawCursor> ScanIterator for HashIterator<C> {
    fn next(&mut self) -> bool {
        if self.done {
            return false;
        }
        while self.iter.next() {
            let raw_key = self.iter.key();
            if !in_region(raw_key, DataType::Hash) {
                tracing::debug!(hash = %self.name, tag = ?raw_key.first(), "left hash region");
                self.done = true;
                return false;
            }
            let (name, field) = match decode_hash_key(raw_key) {
                Ok(decoded) => decoded,
                Err(err) => {
                    tracing::debug!(error = %err, hash = %self.name, "skipping undecodable hash key");
                    continue;
                }
            };
            if name != self.name {
                tracing::debug!(hash = %self.name, next = %name, "left hash");
                self.done = true;
                return false;
            }
            if self.return_val {
                self.val = Bytes::copy_from_slice(self.iter.val());
            }
            self.key = field;
            return true;
        }
        false
    }
}

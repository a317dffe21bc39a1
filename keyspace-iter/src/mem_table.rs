use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_skiplist::map::Entry;
use crossbeam_skiplist::SkipMap;
use ouroboros::self_referencing;

use crate::iterators::{Direction, RawCursor};

/// An ordered in-memory store based on crossbeam-skiplist
pub struct MemTable {
    map: Arc<SkipMap<Bytes, Bytes>>,
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new mem-table.
    pub fn create() -> Self {
        Self {
            map: Arc::new(SkipMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get a value by raw key.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    /// Approximate number of key and value bytes written.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Put a raw key-value pair into the mem-table.
    pub fn put(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) {
        let (key, value) = (key.into(), value.into());
        self.size
            .fetch_add(key.len() + value.len(), Ordering::Relaxed);
        self.map.insert(key, value);
    }

    /// Remove a raw key, returning its value.
    pub fn delete(&self, key: &[u8]) -> Option<Bytes> {
        self.map.remove(key).map(|entry| entry.value().clone())
    }

    /// Open a cursor positioned by `bound`.
    ///
    /// A forward cursor lands on the first key that satisfies `bound` as a
    /// lower bound, a backward cursor on the last key that satisfies it as an
    /// upper bound.
    pub fn cursor(&self, bound: Bound<&[u8]>, direction: Direction) -> MemTableCursor {
        let mut cursor = MemTableCursorBuilder {
            map: self.map.clone(),
            entry_builder: |map| match direction {
                Direction::Forward => map.lower_bound(bound),
                Direction::Backward => map.upper_bound(bound),
            },
            curr: None,
        }
        .build();
        cursor.sync();
        cursor
    }

    /// Open a cursor on the smallest key.
    pub fn seek_to_first(&self) -> MemTableCursor {
        self.cursor(Bound::Unbounded, Direction::Forward)
    }

    /// Open a cursor on the largest key.
    pub fn seek_to_last(&self) -> MemTableCursor {
        self.cursor(Bound::Unbounded, Direction::Backward)
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::create()
    }
}

/// A bidirectional cursor over a `SkipMap`.
///
/// Holds its own reference to the map, so it stays usable after the
/// `MemTable` handle is dropped.
#[self_referencing]
pub struct MemTableCursor {
    map: Arc<SkipMap<Bytes, Bytes>>,
    #[borrows(map)]
    #[not_covariant]
    entry: Option<Entry<'this, Bytes, Bytes>>,
    curr: Option<(Bytes, Bytes)>,
}

impl MemTableCursor {
    /// Copy the entry under the cursor into `curr`.
    fn sync(&mut self) {
        self.with_mut(|fields| {
            *fields.curr = fields
                .entry
                .as_ref()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
        });
    }
}

impl RawCursor for MemTableCursor {
    fn key(&self) -> &[u8] {
        self.with_curr(|curr| curr.as_ref().map(|(key, _)| &key[..]))
            .unwrap_or_default()
    }

    fn value(&self) -> &[u8] {
        self.with_curr(|curr| curr.as_ref().map(|(_, value)| &value[..]))
            .unwrap_or_default()
    }

    fn is_valid(&self) -> bool {
        self.with_curr(|curr| curr.is_some())
    }

    fn next(&mut self) -> anyhow::Result<()> {
        self.with_mut(|fields| {
            *fields.entry = fields.entry.as_ref().and_then(|entry| entry.next());
        });
        self.sync();
        Ok(())
    }

    fn prev(&mut self) -> anyhow::Result<()> {
        self.with_mut(|fields| {
            *fields.entry = fields.entry.as_ref().and_then(|entry| entry.prev());
        });
        self.sync();
        Ok(())
    }
}

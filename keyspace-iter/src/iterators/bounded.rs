use bytes::Bytes;

use super::{RawCursor, ScanIterator};

/// Scan direction of a [`BoundedCursor`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// Bounds a physical cursor by an end key, a limit and a direction.
///
/// The first call to `next` yields the entry the cursor is already positioned
/// at; later calls step it. A forward scan ends once the key is greater than
/// `end`, a backward scan once it is less than `end`. An empty `end` does not
/// bound the scan. Exhaustion of any kind clamps `limit` to zero, so every
/// later `next` returns false as well.
pub struct BoundedCursor<C: RawCursor> {
    cursor: C,
    end: Bytes,
    /// Successful advances still permitted, 0 when exhausted
    limit: u64,
    direction: Direction,
    is_first: bool,
}

impl<C: RawCursor> BoundedCursor<C> {
    pub fn new(cursor: C, end: impl Into<Bytes>, limit: u64, direction: Direction) -> Self {
        Self {
            cursor,
            end: end.into(),
            limit,
            direction,
            is_first: true,
        }
    }

    /// Returns the raw key of the current entry.
    pub fn key(&self) -> &[u8] {
        self.cursor.key()
    }

    /// Returns the raw value of the current entry.
    pub fn val(&self) -> &[u8] {
        self.cursor.value()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of advances still permitted.
    pub fn remaining(&self) -> u64 {
        self.limit
    }

    fn step(&mut self) -> anyhow::Result<()> {
        match self.direction {
            Direction::Forward => self.cursor.next(),
            Direction::Backward => self.cursor.prev(),
        }
    }

    fn past_end(&self) -> bool {
        if self.end.is_empty() {
            return false;
        }
        let key = self.cursor.key();
        match self.direction {
            Direction::Forward => key > &self.end[..],
            Direction::Backward => key < &self.end[..],
        }
    }
}

impl<C: RawCursor> ScanIterator for BoundedCursor<C> {
    fn next(&mut self) -> bool {
        if self.limit == 0 {
            return false;
        }
        if self.is_first {
            self.is_first = false;
        } else if let Err(err) = self.step() {
            tracing::warn!(error = %err, direction = ?self.direction, "cursor step failed, ending scan");
            self.limit = 0;
            return false;
        }

        if !self.cursor.is_valid() {
            // keeps `next` safe to call after it returned false
            self.limit = 0;
            return false;
        }
        if self.past_end() {
            self.limit = 0;
            return false;
        }
        self.limit -= 1;
        true
    }
}

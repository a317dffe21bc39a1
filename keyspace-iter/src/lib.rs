//! Bounded, type-aware iteration over a tag-multiplexed ordered keyspace.
//!
//! Plain key-values, hash fields and sorted set members share one ordered
//! byte keyspace, told apart by the leading tag of each raw key (see
//! [`codec`]). A [`BoundedCursor`](iterators::BoundedCursor) limits a physical
//! cursor by end key, count and direction; the typed iterators in
//! [`iterators`] decode its records and end their stream when the scan leaves
//! their region or collection.

pub mod codec;
pub mod iterators;
pub mod mem_table;
pub mod projection;
pub mod scan;

use std::fmt;
use std::ops::Bound;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::Registry;

use super::{BoundedCursor, Direction, HashIterator, KvIterator, ScanIterator, ZsetIterator};
use crate::codec::{encode_hash_key, encode_kv_key, encode_zscore_key};
use crate::mem_table::{MemTable, MemTableCursor};
use crate::projection::RuleSet;

fn __(x: &[u8]) -> Bytes {
    Bytes::copy_from_slice(x)
}

/// A keyspace holding every region, plus a few keys that carry the right tag
/// but do not decode.
fn keyspace() -> MemTable {
    let memtable = MemTable::create();
    memtable.put(__(b"H\x05alpha"), __(b"2"));
    memtable.put(encode_hash_key("alpha", "a").unwrap(), __(b"1"));
    memtable.put(encode_hash_key("alpha", "b").unwrap(), __(b"2"));
    memtable.put(__(b"h\x05alpha>broken"), __(b"x"));
    memtable.put(encode_hash_key("gamma", "g").unwrap(), __(b"3"));
    memtable.put(encode_kv_key("a"), __(b"va"));
    memtable.put(encode_kv_key("b"), __(b"vb"));
    memtable.put(__(b"kc\xff"), __(b"vc"));
    memtable.put(encode_kv_key("d"), __(b"vd"));
    memtable.put(__(b"q\x04jobs\x00\x00\x00\x00\x00\x00\x00\x01"), __(b"job"));
    memtable.put(encode_zscore_key("board", "carol", 30).unwrap(), __(b""));
    memtable.put(encode_zscore_key("board", "alice", -5).unwrap(), __(b""));
    memtable.put(encode_zscore_key("board", "bob", 12).unwrap(), __(b""));
    memtable.put(__(b"z\x05board\x80"), __(b""));
    memtable.put(encode_zscore_key("other", "zed", 1).unwrap(), __(b""));
    memtable
}

fn forward(memtable: &MemTable, start: &[u8], limit: u64) -> BoundedCursor<MemTableCursor> {
    let cursor = memtable.cursor(Bound::Included(start), Direction::Forward);
    BoundedCursor::new(cursor, "", limit, Direction::Forward)
}

fn kv_keys(iter: &mut KvIterator<MemTableCursor>) -> Vec<(String, Bytes)> {
    let mut out = vec![];
    while iter.next() {
        out.push((iter.key().to_string(), iter.val().clone()));
    }
    out
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, Bytes)> {
    items
        .iter()
        .map(|(key, val)| (key.to_string(), __(val.as_bytes())))
        .collect()
}

#[test]
fn test_kv_stops_at_next_region() {
    let memtable = keyspace();
    let mut iter = KvIterator::new(forward(&memtable, b"k", u64::MAX), "");
    assert!(!iter.is_filtered());
    assert_eq!(
        kv_keys(&mut iter),
        pairs(&[("a", "va"), ("b", "vb"), ("d", "vd")])
    );
    assert!(!iter.next());
    assert!(!iter.next());
}

#[test]
fn test_kv_backward() {
    let memtable = keyspace();
    let cursor = memtable.cursor(Bound::Excluded(b"l"), Direction::Backward);
    let iter = BoundedCursor::new(cursor, "", u64::MAX, Direction::Backward);
    let mut iter = KvIterator::new(iter, "");
    assert_eq!(
        kv_keys(&mut iter),
        pairs(&[("d", "vd"), ("b", "vb"), ("a", "va")])
    );
}

#[test]
fn test_kv_wrong_region_at_start() {
    let memtable = keyspace();
    let mut iter = KvIterator::new(forward(&memtable, b"h", u64::MAX), "");
    assert!(!iter.next());
    assert!(!iter.next());
}

#[test]
fn test_kv_limit_counts_raw_records() {
    let memtable = keyspace();
    // a, b and the undecodable key use up the limit
    let mut iter = KvIterator::new(forward(&memtable, b"k", 3), "");
    assert_eq!(kv_keys(&mut iter), pairs(&[("a", "va"), ("b", "vb")]));
}

#[test]
fn test_kv_skip() {
    let memtable = keyspace();
    let mut iter = KvIterator::new(forward(&memtable, b"k", u64::MAX), "");
    assert!(iter.skip(2));
    assert!(iter.next());
    assert_eq!(iter.key(), "d");
    assert!(!iter.skip(1));
}

#[test]
fn test_kv_return_val_off() {
    let memtable = keyspace();
    let mut iter = KvIterator::new(forward(&memtable, b"k", u64::MAX), "");
    iter.return_val(false);
    assert_eq!(
        kv_keys(&mut iter),
        pairs(&[("a", ""), ("b", ""), ("d", "")])
    );
}

fn json_keyspace() -> MemTable {
    let memtable = MemTable::create();
    memtable.put(encode_kv_key("order:7"), __(br#"{"total":12}"#));
    memtable.put(
        encode_kv_key("user:1"),
        __(br#"{"contact":{"email":"x@y.z"}}"#),
    );
    memtable.put(encode_kv_key("user:2"), __(b"plain text"));
    memtable.put(encode_kv_key("user:3"), __(br#"{"age":3}"#));
    memtable.put(
        encode_kv_key("user:42"),
        __(br#"{"contact":{"email":"a@b.com"},"age":9}"#),
    );
    memtable
}

const USER_EMAIL: &str = r#"[{"pattern": "^user:", "fields": {"email": "$.contact.email"}}]"#;

#[test]
fn test_kv_projection() {
    let memtable = json_keyspace();
    let mut iter = KvIterator::new(forward(&memtable, b"k", u64::MAX), USER_EMAIL);
    assert!(iter.is_filtered());
    assert_eq!(
        kv_keys(&mut iter),
        pairs(&[
            ("user:1", r#"{"email":"x@y.z"}"#),
            ("user:3", r#"{"email":null}"#),
            ("user:42", r#"{"email":"a@b.com"}"#),
        ])
    );
}

#[test]
fn test_kv_matched_key_keeps_missing_field() {
    let memtable = MemTable::create();
    memtable.put(encode_kv_key("session:1"), __(br#"{"ttl":5}"#));
    memtable.put(encode_kv_key("user:43"), __(br#"{"age":9}"#));
    memtable.put(encode_kv_key("user:44"), __(br#"{"contact":{"email":"x@y"}}"#));
    let mut iter = KvIterator::new(forward(&memtable, b"k", u64::MAX), USER_EMAIL);
    assert_eq!(
        kv_keys(&mut iter),
        pairs(&[
            ("user:43", r#"{"email":null}"#),
            ("user:44", r#"{"email":"x@y"}"#),
        ])
    );
}

#[test]
fn test_kv_with_compiled_rules() {
    let memtable = json_keyspace();
    let rules = RuleSet::parse(r#"[{"pattern": "^order:", "fields": {"sum": "$.total"}}]"#).unwrap();
    let mut iter = KvIterator::with_rules(forward(&memtable, b"k", u64::MAX), rules);
    assert_eq!(kv_keys(&mut iter), pairs(&[("order:7", r#"{"sum":12}"#)]));
}

#[test]
fn test_kv_projection_skipped_without_values() {
    let memtable = json_keyspace();
    let mut iter = KvIterator::new(forward(&memtable, b"k", u64::MAX), USER_EMAIL);
    iter.return_val(false);
    let keys = kv_keys(&mut iter)
        .into_iter()
        .map(|(key, _)| key)
        .collect::<Vec<_>>();
    assert_eq!(keys, ["order:7", "user:1", "user:2", "user:3", "user:42"]);
}

#[test]
fn test_kv_malformed_filter_passes_through() {
    let memtable = json_keyspace();
    let mut iter = KvIterator::new(forward(&memtable, b"k", u64::MAX), "[{\"pattern\": ");
    assert!(!iter.is_filtered());
    let records = kv_keys(&mut iter);
    assert_eq!(records.len(), 5);
    assert_eq!(records[2], ("user:2".to_string(), __(b"plain text")));
}

#[test]
fn test_hash_stays_in_collection() {
    let memtable = keyspace();
    let start = encode_hash_key("alpha", "").unwrap();
    let mut iter = HashIterator::new(forward(&memtable, &start, u64::MAX), "alpha");
    assert_eq!(iter.name(), "alpha");
    assert!(iter.next());
    assert_eq!((iter.key(), &iter.val()[..]), ("a", &b"1"[..]));
    assert!(iter.next());
    assert_eq!((iter.key(), &iter.val()[..]), ("b", &b"2"[..]));
    // the broken key is skipped, then gamma ends the stream
    assert!(!iter.next());
    assert!(!iter.next());
}

#[test]
fn test_hash_ends_at_region() {
    let memtable = keyspace();
    let start = encode_hash_key("gamma", "").unwrap();
    let mut iter = HashIterator::new(forward(&memtable, &start, u64::MAX), "gamma");
    iter.return_val(false);
    assert!(iter.next());
    assert_eq!(iter.key(), "g");
    assert!(iter.val().is_empty());
    assert!(!iter.next());
}

#[test]
fn test_hash_starting_in_other_collection() {
    let memtable = keyspace();
    let start = encode_hash_key("alpha", "").unwrap();
    let mut iter = HashIterator::new(forward(&memtable, &start, u64::MAX), "gamma");
    assert!(!iter.next());
}

#[test]
fn test_hash_backward() {
    let memtable = keyspace();
    let cursor = memtable.cursor(Bound::Excluded(b"i"), Direction::Backward);
    let iter = BoundedCursor::new(cursor, "", u64::MAX, Direction::Backward);
    let mut iter = HashIterator::new(iter, "gamma");
    assert!(iter.next());
    assert_eq!((iter.key(), &iter.val()[..]), ("g", &b"3"[..]));
    // skips the broken key, then reaches alpha
    assert!(!iter.next());
}

#[test]
fn test_zset_score_order() {
    let memtable = keyspace();
    let mut iter = ZsetIterator::new(forward(&memtable, b"z\x05board", u64::MAX), "board");
    let mut members = vec![];
    while iter.next() {
        members.push((iter.key().to_string(), iter.score()));
    }
    assert_eq!(
        members,
        [
            ("alice".to_string(), -5),
            ("bob".to_string(), 12),
            ("carol".to_string(), 30)
        ]
    );
    assert!(!iter.next());
}

#[test]
fn test_zset_skip() {
    let memtable = keyspace();
    let mut iter = ZsetIterator::new(forward(&memtable, b"z\x05board", u64::MAX), "board");
    assert!(iter.skip(2));
    assert!(iter.next());
    assert_eq!((iter.key(), iter.score()), ("carol", 30));
    assert!(!iter.skip(1));
}

#[test]
fn test_zset_other_collection_and_region() {
    let memtable = keyspace();
    let mut iter = ZsetIterator::new(forward(&memtable, b"z\x05other", u64::MAX), "other");
    assert!(iter.next());
    assert_eq!((iter.key(), iter.score()), ("zed", 1));
    assert!(!iter.next());

    let mut iter = ZsetIterator::new(forward(&memtable, b"q", u64::MAX), "board");
    assert!(!iter.next());
}

/// Records the message of every event emitted while installed.
#[derive(Clone, Default)]
struct Events(Arc<Mutex<Vec<String>>>);

#[derive(Default)]
struct Message(String);

impl Visit for Message {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for Events {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = Message::default();
        event.record(&mut message);
        self.0.lock().unwrap().push(message.0);
    }
}

fn capture_events(f: impl FnOnce()) -> Vec<String> {
    let events = Events::default();
    tracing::subscriber::with_default(Registry::default().with(events.clone()), f);
    let messages = events.0.lock().unwrap().clone();
    messages
}

#[test]
fn test_zset_logs_skips_and_stream_end() {
    let memtable = keyspace();
    let events = capture_events(|| {
        let mut iter = ZsetIterator::new(forward(&memtable, b"z\x05board", u64::MAX), "board");
        while iter.next() {}
    });
    assert!(events.iter().any(|msg| msg == "skipping undecodable zscore key"));
    assert!(events.iter().any(|msg| msg == "left zset"));

    let events = capture_events(|| {
        let mut iter = ZsetIterator::new(forward(&memtable, b"q", u64::MAX), "board");
        assert!(!iter.next());
    });
    assert_eq!(events, ["left zscore region"]);
}

#[test]
fn test_hash_logs_stream_end() {
    let memtable = keyspace();
    let events = capture_events(|| {
        let start = encode_hash_key("gamma", "").unwrap();
        let mut iter = HashIterator::new(forward(&memtable, &start, u64::MAX), "gamma");
        while iter.next() {}
    });
    assert_eq!(events, ["left hash region"]);

    let events = capture_events(|| {
        let start = encode_hash_key("alpha", "").unwrap();
        let mut iter = HashIterator::new(forward(&memtable, &start, u64::MAX), "alpha");
        while iter.next() {}
    });
    assert!(events.iter().any(|msg| msg == "skipping undecodable hash key"));
    assert!(events.iter().any(|msg| msg == "left hash"));
}

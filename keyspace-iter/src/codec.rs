//! Raw key layouts of the shared keyspace.
//!
//! Every raw key starts with a one byte [`DataType`] tag. Collection scoped
//! keys follow the tag with a one byte name length and the name, so all
//! entries of one collection are contiguous in key order.
//!
//! ```text
//! kv:     | 'k' | key |
//! hash:   | 'h' | len(name) | name | '=' | field |
//! zscore: | 'z' | len(name) | name | score (8, BE, sign flipped) | '=' | member |
//! ```

use bytes::{Buf, BufMut};
use thiserror::Error;

use crate::iterators::Direction;

const SEP: u8 = b'=';
const SCORE_SIZE: usize = std::mem::size_of::<i64>();
const MAX_NAME_LEN: usize = u8::MAX as usize;

/// Leading tag of a raw key.
///
/// The tags are ordered so every type occupies one contiguous region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    HashSize,
    QueueSize,
    ZsetSize,
    Hash,
    Kv,
    Queue,
    Zset,
    ZScore,
}

impl DataType {
    pub const fn tag(self) -> u8 {
        match self {
            DataType::HashSize => b'H',
            DataType::QueueSize => b'Q',
            DataType::ZsetSize => b'Z',
            DataType::Hash => b'h',
            DataType::Kv => b'k',
            DataType::Queue => b'q',
            DataType::Zset => b's',
            DataType::ZScore => b'z',
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            b'H' => DataType::HashSize,
            b'Q' => DataType::QueueSize,
            b'Z' => DataType::ZsetSize,
            b'h' => DataType::Hash,
            b'k' => DataType::Kv,
            b'q' => DataType::Queue,
            b's' => DataType::Zset,
            b'z' => DataType::ZScore,
            _ => return None,
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("empty key")]
    Empty,
    #[error("expected {expected:?} key, found tag {found:#04x}")]
    WrongType { expected: DataType, found: u8 },
    #[error("key truncated")]
    Truncated,
    #[error("missing separator")]
    BadSeparator,
    #[error("key is not valid utf-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("collection name is {0} bytes, at most 255 allowed")]
    NameTooLong(usize),
}

/// Reads a raw key front to back.
struct KeyReader<'a> {
    buf: &'a [u8],
}

impl<'a> KeyReader<'a> {
    fn open(raw: &'a [u8], expected: DataType) -> Result<Self, CodecError> {
        let (&tag, rest) = raw.split_first().ok_or(CodecError::Empty)?;
        if tag != expected.tag() {
            return Err(CodecError::WrongType {
                expected,
                found: tag,
            });
        }
        Ok(Self { buf: rest })
    }

    fn name(&mut self) -> Result<String, CodecError> {
        if !self.buf.has_remaining() {
            return Err(CodecError::Truncated);
        }
        let len = self.buf.get_u8() as usize;
        self.take(len).and_then(utf8)
    }

    fn score(&mut self) -> Result<i64, CodecError> {
        if self.buf.remaining() < SCORE_SIZE {
            return Err(CodecError::Truncated);
        }
        Ok(decode_score(self.buf.get_u64()))
    }

    fn separator(&mut self) -> Result<(), CodecError> {
        if !self.buf.has_remaining() {
            return Err(CodecError::Truncated);
        }
        if self.buf.get_u8() != SEP {
            return Err(CodecError::BadSeparator);
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.buf.len() < len {
            return Err(CodecError::Truncated);
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn rest(self) -> Result<String, CodecError> {
        utf8(self.buf)
    }
}

fn utf8(bytes: &[u8]) -> Result<String, CodecError> {
    Ok(std::str::from_utf8(bytes)?.to_owned())
}

fn put_name(buf: &mut Vec<u8>, name: &str) -> Result<(), CodecError> {
    if name.len() > MAX_NAME_LEN {
        return Err(CodecError::NameTooLong(name.len()));
    }
    buf.put_u8(name.len() as u8);
    buf.put_slice(name.as_bytes());
    Ok(())
}

fn encode_score(score: i64) -> u64 {
    (score as u64) ^ (1 << 63)
}

fn decode_score(raw: u64) -> i64 {
    (raw ^ (1 << 63)) as i64
}

pub fn encode_kv_key(key: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + key.len());
    buf.put_u8(DataType::Kv.tag());
    buf.put_slice(key.as_bytes());
    buf
}

pub fn decode_kv_key(raw: &[u8]) -> Result<String, CodecError> {
    KeyReader::open(raw, DataType::Kv)?.rest()
}

/// The raw prefix shared by every field of hash `name`.
pub fn encode_hash_prefix(name: &str) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::with_capacity(3 + name.len());
    buf.put_u8(DataType::Hash.tag());
    put_name(&mut buf, name)?;
    buf.put_u8(SEP);
    Ok(buf)
}

pub fn encode_hash_key(name: &str, field: &str) -> Result<Vec<u8>, CodecError> {
    let mut buf = encode_hash_prefix(name)?;
    buf.put_slice(field.as_bytes());
    Ok(buf)
}

/// Decodes a hash key into `(name, field)`.
pub fn decode_hash_key(raw: &[u8]) -> Result<(String, String), CodecError> {
    let mut reader = KeyReader::open(raw, DataType::Hash)?;
    let name = reader.name()?;
    reader.separator()?;
    let field = reader.rest()?;
    Ok((name, field))
}

/// The raw prefix shared by every member of sorted set `name`.
pub fn encode_zscore_prefix(name: &str) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::with_capacity(2 + name.len() + SCORE_SIZE + 1);
    buf.put_u8(DataType::ZScore.tag());
    put_name(&mut buf, name)?;
    Ok(buf)
}

pub fn encode_zscore_key(name: &str, member: &str, score: i64) -> Result<Vec<u8>, CodecError> {
    let mut buf = encode_zscore_prefix(name)?;
    buf.put_u64(encode_score(score));
    buf.put_u8(SEP);
    buf.put_slice(member.as_bytes());
    Ok(buf)
}

/// A raw key just beyond every member scored `score`, seen from `direction`.
///
/// Forward, it sorts after all members with that score; backward, before all
/// of them. Used as the end bound of a score range scan.
pub fn encode_zscore_bound(
    name: &str,
    score: i64,
    direction: Direction,
) -> Result<Vec<u8>, CodecError> {
    let mut buf = encode_zscore_prefix(name)?;
    buf.put_u64(encode_score(score));
    if direction == Direction::Forward {
        // utf-8 never produces 0xff, so this sorts after any member
        buf.put_u8(SEP);
        buf.put_u8(0xff);
    }
    Ok(buf)
}

/// Decodes a sorted set score key into `(name, member, score)`.
pub fn decode_zscore_key(raw: &[u8]) -> Result<(String, String, i64), CodecError> {
    let mut reader = KeyReader::open(raw, DataType::ZScore)?;
    let name = reader.name()?;
    let score = reader.score()?;
    reader.separator()?;
    let member = reader.rest()?;
    Ok((name, member, score))
}

//! Entry module consists of the record exchanged between phases.
//!
//! The on-disk layout of an intermediate or partition file is one record per line:
//!
//! ==========================================
//! Key (utf-8, no newline) | ' ' | Value | '\n'
//! ==========================================

use std::cmp::Ordering;
use std::fmt::{self, Display};

use bytes::{BufMut, Bytes, BytesMut};

/// A key/value pair produced by a mapper.
///
/// Ordering only looks at the key, so sorting a sequence of records with a
/// stable sort keeps equal keys in production order.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Record {
    pub key: String,
    pub value: u64,
}

impl Record {
    pub fn new<K: Into<String>>(key: K, value: u64) -> Record {
        Record {
            key: key.into(),
            value,
        }
    }

    #[inline]
    pub fn cmp_key(&self, other: &Record) -> Ordering {
        self.key.cmp(&other.key)
    }

    /// Encode as a newline terminated line.
    pub fn as_bytes(&self) -> Bytes {
        let value = self.value.to_string();

        // Note: BufMut on BytesMut does not grow, size the buffer up front.
        let mut buf = BytesMut::with_capacity(self.key.len() + value.len() + 2);
        buf.put_slice(self.key.as_bytes());
        buf.put_u8(b' ');
        buf.put_slice(value.as_bytes());
        buf.put_u8(b'\n');
        buf.freeze()
    }

    /// Decode a line with or without its trailing newline.
    ///
    /// The value is taken after the last space, so keys may contain spaces.
    pub fn parse_line(line: &str) -> Option<Record> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let (key, value) = line.rsplit_once(' ')?;
        let value = value.parse().ok()?;

        Some(Record::new(key, value))
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{} {}", self.key, self.value)
    }
}

/// The key part of an encoded line.
pub fn line_key(line: &[u8]) -> &[u8] {
    match line.iter().rposition(|&b| b == b' ') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// Stable merge of two key sorted runs, `older` wins ties.
pub fn merge_sorted(older: Vec<Record>, newer: Vec<Record>) -> Vec<Record> {
    if older.is_empty() {
        return newer;
    }
    if newer.is_empty() {
        return older;
    }

    let mut merged = Vec::with_capacity(older.len() + newer.len());
    let mut left = older.into_iter().peekable();
    let mut right = newer.into_iter().peekable();

    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => l.cmp_key(r) != Ordering::Greater,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };

        let next = if take_left { left.next() } else { right.next() };
        merged.extend(next);
    }

    merged
}

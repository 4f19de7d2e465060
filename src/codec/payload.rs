//! Metric and log payload encoding.
//!
//! Metric payload (UTF-8 text, Graphite plaintext style):
//! ```text
//! {space_id}.{name} {value} {timestamp}\r\n
//! ```
//!
//! Log payload (binary key/value pairs):
//! ```text
//! +0   Pair Count (4 bytes BE32)
//! +4   repeated: Key Length (BE32), Key, Value Length (BE32), Value
//! ```
//!
//! Both travel inside a submessage behind a 4-byte big-endian length prefix.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::constants::{MESSAGE_FIELD, TENANT_FIELD, U32_SIZE};

use super::frame::SubmessageKind;

/// A single metric observation.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Metric name, appended to the tenant id with a dot.
    pub name: String,
    /// Observed value.
    pub value: f64,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
}

impl MetricSample {
    /// Create a sample stamped with the current time.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self::at(name, value, unix_now())
    }

    /// Create a sample with an explicit timestamp.
    pub fn at(name: impl Into<String>, value: f64, timestamp: u64) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp,
        }
    }
}

/// A structured log entry: field name to stringified value.
///
/// The tenant field is added at encode time, so an entry never needs to know
/// which tenant it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogEntry {
    fields: BTreeMap<String, String>,
}

impl LogEntry {
    /// Create an empty entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entry holding a single `message` field.
    pub fn message(text: impl Into<String>) -> Self {
        let mut entry = Self::new();
        entry.fields.insert(MESSAGE_FIELD.to_owned(), text.into());
        entry
    }

    /// Set a field, stringifying the value. Returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl fmt::Display) -> Option<String> {
        self.fields.insert(key.into(), value.to_string())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Number of fields set by the caller.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields are set.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over fields.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<&str> for LogEntry {
    fn from(text: &str) -> Self {
        Self::message(text)
    }
}

impl From<String> for LogEntry {
    fn from(text: String) -> Self {
        Self::message(text)
    }
}

impl<K, V> FromIterator<(K, V)> for LogEntry
where
    K: Into<String>,
    V: fmt::Display,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut entry = Self::new();
        for (key, value) in iter {
            entry.insert(key, value);
        }
        entry
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for LogEntry
where
    K: Into<String>,
    V: fmt::Display,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K, V, S> From<std::collections::HashMap<K, V, S>> for LogEntry
where
    K: Into<String>,
    V: fmt::Display,
{
    fn from(map: std::collections::HashMap<K, V, S>) -> Self {
        map.into_iter().collect()
    }
}

impl<K, V> From<BTreeMap<K, V>> for LogEntry
where
    K: Into<String>,
    V: fmt::Display,
{
    fn from(map: BTreeMap<K, V>) -> Self {
        map.into_iter().collect()
    }
}

/// Something the client can deliver.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A metric sample, sent as a `1M` submessage.
    Metric(MetricSample),
    /// A log entry, sent as a `1D` submessage.
    Log(LogEntry),
}

impl Payload {
    /// Submessage kind this payload travels as.
    pub fn kind(&self) -> SubmessageKind {
        match self {
            Payload::Metric(_) => SubmessageKind::Metric,
            Payload::Log(_) => SubmessageKind::Log,
        }
    }

    /// Encode into length-prefixed submessage body bytes for `space_id`.
    pub fn encode(&self, space_id: &str) -> Vec<u8> {
        match self {
            Payload::Metric(sample) => encode_metric(space_id, sample),
            Payload::Log(entry) => length_prefixed(&encode_log_entry(space_id, entry)),
        }
    }
}

impl From<MetricSample> for Payload {
    fn from(sample: MetricSample) -> Self {
        Payload::Metric(sample)
    }
}

impl From<LogEntry> for Payload {
    fn from(entry: LogEntry) -> Self {
        Payload::Log(entry)
    }
}

/// Render a metric line and prefix it with its byte length.
pub fn encode_metric(space_id: &str, sample: &MetricSample) -> Vec<u8> {
    let line = format!(
        "{}.{} {} {}\r\n",
        space_id, sample.name, sample.value, sample.timestamp
    );
    length_prefixed(line.as_bytes())
}

/// Encode a log entry as counted key/value pairs, tenant field included.
///
/// The tenant field overrides any caller-supplied value. Pairs whose value
/// is empty are left out of both the count and the body.
pub fn encode_log_entry(space_id: &str, entry: &LogEntry) -> Vec<u8> {
    let pairs = entry
        .iter()
        .filter(|(key, _)| *key != TENANT_FIELD)
        .chain(std::iter::once((TENANT_FIELD, space_id)))
        .filter(|(_, value)| !value.is_empty());

    let mut body = Vec::new();
    let mut count: u32 = 0;
    for (key, value) in pairs {
        put_u32(&mut body, key.len());
        body.extend_from_slice(key.as_bytes());
        put_u32(&mut body, value.len());
        body.extend_from_slice(value.as_bytes());
        count += 1;
    }

    let mut buf = Vec::with_capacity(U32_SIZE + body.len());
    buf.extend_from_slice(&count.to_be_bytes());
    buf.extend_from_slice(&body);
    buf
}

/// Prefix `bytes` with their length as a big-endian u32.
pub fn length_prefixed(bytes: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(U32_SIZE + bytes.len());
    put_u32(&mut buf, bytes.len());
    buf.extend_from_slice(bytes);
    buf
}

fn put_u32(buf: &mut Vec<u8>, len: usize) {
    buf.extend_from_slice(&(len as u32).to_be_bytes());
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub mod collector;
pub mod line_protocol;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Error;

pub use collector::MetricsCollector;

/// Tag set of a measurement. Tags are always fully populated.
pub type Tags = BTreeMap<String, String>;

/// Field set of a measurement. Sparse: only what the server reported.
pub type Fields = BTreeMap<String, FieldValue>;

/// A single field value as the time-series pipeline understands it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

/// One emitted (name, fields, tags) triple.
#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    pub name: String,
    pub fields: Fields,
    pub tags: Tags,
    pub time: DateTime<Utc>,
}

impl Measurement {
    pub fn new(name: impl Into<String>, tags: Tags) -> Self {
        Self {
            name: name.into(),
            fields: Fields::new(),
            tags,
            time: Utc::now(),
        }
    }

    /// Set a field unconditionally.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Set a field only if the server reported it. Absent stays absent.
    pub fn opt<V: Into<FieldValue>>(&mut self, key: &str, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.fields.insert(key.to_owned(), v.into());
        }
        self
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.fields.get(key) {
            Some(FieldValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }
}

/// Copy `base` and add one more tag.
pub fn with_tag(base: &Tags, key: &str, value: impl Into<String>) -> Tags {
    let mut tags = base.clone();
    tags.insert(key.to_owned(), value.into());
    tags
}

// ─── Sink ────────────────────────────────────────────────────────

/// Where gathered measurements and per-resource errors go.
///
/// Shared by every per-URL task of a poll cycle, so implementations must
/// tolerate concurrent writers.
pub trait Accumulator: Send + Sync {
    fn add_measurement(&self, measurement: Measurement);

    fn add_error(&self, err: Error);
}

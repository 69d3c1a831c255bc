//! Anomalies detected in a record stream.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a detected anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefectKind {
    /// The key skipped ahead; the record itself is still forwarded.
    Gap,
    /// The key equals the last accepted one; the record is dropped.
    Duplicate,
    /// The record failed the structural check; the record is dropped.
    Malformed,
    /// The key is below the last accepted one; the record is dropped.
    OutOfOrder,
}

impl DefectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefectKind::Gap => "gap",
            DefectKind::Duplicate => "duplicate",
            DefectKind::Malformed => "malformed",
            DefectKind::OutOfOrder => "out-of-order",
        }
    }
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One anomaly, reported out-of-band from the validated record stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDefect<K> {
    pub kind: DefectKind,
    /// Sequence key of the offending record.
    pub key: K,
    pub cause: String,
}

impl<K> ValidationDefect<K> {
    pub fn new(kind: DefectKind, key: K, cause: impl Into<String>) -> Self {
        Self {
            kind,
            key,
            cause: cause.into(),
        }
    }

    /// Whether the record that raised this defect still went downstream.
    pub fn is_forwarded(&self) -> bool {
        self.kind == DefectKind::Gap
    }
}

impl<K: fmt::Display> fmt::Display for ValidationDefect<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}: {}", self.kind, self.key, self.cause)
    }
}

/// Per-kind defect counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DefectCounts {
    pub gaps: u64,
    pub duplicates: u64,
    pub out_of_order: u64,
    pub malformed: u64,
}

impl DefectCounts {
    pub fn record(&mut self, kind: DefectKind) {
        match kind {
            DefectKind::Gap => self.gaps += 1,
            DefectKind::Duplicate => self.duplicates += 1,
            DefectKind::OutOfOrder => self.out_of_order += 1,
            DefectKind::Malformed => self.malformed += 1,
        }
    }

    pub fn get(&self, kind: DefectKind) -> u64 {
        match kind {
            DefectKind::Gap => self.gaps,
            DefectKind::Duplicate => self.duplicates,
            DefectKind::OutOfOrder => self.out_of_order,
            DefectKind::Malformed => self.malformed,
        }
    }

    pub fn total(&self) -> u64 {
        self.gaps + self.duplicates + self.out_of_order + self.malformed
    }
}

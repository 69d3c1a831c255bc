//! Raw oplog entries.

use bson::{document::ValueAccessError, Bson, Document};
use std::fmt;
use std::str::FromStr;

use crate::error::{RecordError, Result};
use crate::sequence::ChangeRecord;
use crate::timestamp::Timestamp;

/// Operation codes found in the `op` field of an oplog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpType {
    Insert,
    Update,
    Delete,
    Command,
    Noop,
}

impl OpType {
    /// The single-letter code used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Insert => "i",
            OpType::Update => "u",
            OpType::Delete => "d",
            OpType::Command => "c",
            OpType::Noop => "n",
        }
    }

    /// No-ops are the only entries allowed to carry an empty namespace.
    pub fn requires_namespace(&self) -> bool {
        !matches!(self, OpType::Noop)
    }

    /// Whether the entry must carry an `o` document.
    pub fn requires_object(&self) -> bool {
        !matches!(self, OpType::Noop)
    }
}

impl FromStr for OpType {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "i" => Ok(OpType::Insert),
            "u" => Ok(OpType::Update),
            "d" => Ok(OpType::Delete),
            "c" => Ok(OpType::Command),
            "n" => Ok(OpType::Noop),
            other => Err(RecordError::UnknownOp(other.to_string())),
        }
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One oplog entry as handed over by a fetcher.
///
/// `ts`, `op` and `ns` are lifted out of the entry so stages can route and
/// order records without decoding `data`, which holds the raw BSON bytes of
/// the complete entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub ts: Timestamp,
    pub op: String,
    pub ns: String,
    pub data: Vec<u8>,
}

impl Record {
    pub fn new(ts: Timestamp, op: impl Into<String>, ns: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            ts,
            op: op.into(),
            ns: ns.into(),
            data,
        }
    }

    /// Build a record from a decoded oplog entry.
    pub fn from_document(doc: &Document) -> Result<Self> {
        let ts = doc.get_timestamp("ts").map_err(|e| access_error("ts", e))?;
        let op = doc.get_str("op").map_err(|e| access_error("op", e))?;
        let ns = match doc.get("ns") {
            Some(Bson::String(ns)) => ns.clone(),
            Some(other) => {
                return Err(RecordError::InvalidField {
                    field: "ns",
                    reason: format!("expected string, found {:?}", other.element_type()),
                })
            }
            None => String::new(),
        };

        Ok(Self {
            ts: ts.into(),
            op: op.to_string(),
            ns,
            data: bson::to_vec(doc)?,
        })
    }

    /// Build a record from the raw BSON bytes of an oplog entry.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let doc: Document = bson::from_slice(bytes)?;
        Self::from_document(&doc)
    }

    /// Parse the record's operation code.
    pub fn op_type(&self) -> Result<OpType> {
        self.op.parse()
    }

    /// Decode the full entry.
    pub fn document(&self) -> Result<Document> {
        Ok(bson::from_slice(&self.data)?)
    }
}

fn access_error(field: &'static str, err: ValueAccessError) -> RecordError {
    match err {
        ValueAccessError::NotPresent => RecordError::MissingField(field),
        other => RecordError::InvalidField {
            field,
            reason: other.to_string(),
        },
    }
}

impl ChangeRecord for Record {
    type Key = Timestamp;

    fn sequence_key(&self) -> Timestamp {
        self.ts
    }

    fn check_structure(&self) -> std::result::Result<(), String> {
        let doc = self
            .document()
            .map_err(|e| format!("payload is not a BSON document: {e}"))?;

        let op = match doc.get("op") {
            Some(Bson::String(op)) => op,
            Some(other) => {
                return Err(format!(
                    "'op' must be a string, found {:?}",
                    other.element_type()
                ))
            }
            None => return Err("payload has no 'op' field".to_string()),
        };
        let op_type: OpType = op.parse().map_err(|e: RecordError| e.to_string())?;
        if *op != self.op {
            return Err(format!(
                "payload op '{op}' does not match record op '{}'",
                self.op
            ));
        }

        match doc.get("ts") {
            Some(Bson::Timestamp(ts)) => {
                let ts = Timestamp::from(*ts);
                if ts != self.ts {
                    return Err(format!(
                        "payload ts {ts} does not match record ts {}",
                        self.ts
                    ));
                }
            }
            Some(other) => {
                return Err(format!(
                    "'ts' must be a timestamp, found {:?}",
                    other.element_type()
                ))
            }
            None => {}
        }

        if op_type.requires_namespace() && self.ns.is_empty() {
            return Err(format!("'{op_type}' entry has an empty namespace"));
        }
        if op_type.requires_object() && doc.get_document("o").is_err() {
            return Err(format!("'{op_type}' entry has no 'o' document"));
        }
        if op_type == OpType::Update && doc.get_document("o2").is_err() {
            return Err("update entry has no 'o2' document".to_string());
        }

        Ok(())
    }
}

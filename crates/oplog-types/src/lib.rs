//! Oplog record and sequence key types for oplog-sync.
//!
//! This crate provides the record model the validator stage works on:
//!
//! - [`SequenceKey`] - Totally ordered keys with optional unit-gap detection
//! - [`ChangeRecord`] - Anything that flows through a validation stage
//! - [`Timestamp`] - The oplog's `(seconds, increment)` logical clock
//! - [`Record`] - One raw oplog entry
//!
//! # Example
//!
//! ```rust
//! use bson::doc;
//! use oplog_types::{ChangeRecord, Record, Timestamp};
//!
//! let ts = bson::Timestamp { time: 1700000000, increment: 1 };
//! let entry = doc! {
//!     "ts": ts,
//!     "op": "i",
//!     "ns": "shop.orders",
//!     "o": { "_id": 1, "total": 42 },
//! };
//!
//! let record = Record::from_document(&entry).unwrap();
//! assert_eq!(record.sequence_key(), Timestamp::new(1700000000, 1));
//! assert!(record.check_structure().is_ok());
//! ```

mod error;
mod record;
mod sequence;
mod timestamp;

pub use error::{RecordError, Result};
pub use record::{OpType, Record};
pub use sequence::{ChangeRecord, SequenceKey};
pub use timestamp::Timestamp;

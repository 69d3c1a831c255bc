//! Record builders and channel helpers for exercising validator stages.

use bson::{doc, Document};
use oplog_types::{Record, Timestamp};
use tokio::sync::mpsc;

/// Well-formed insert entry at `secs.inc`.
pub fn insert_entry(secs: u32, inc: u32) -> Document {
    let ts: bson::Timestamp = Timestamp::new(secs, inc).into();
    doc! {
        "ts": ts,
        "op": "i",
        "ns": "test.orders",
        "o": { "_id": i64::from(inc), "secs": i64::from(secs) },
    }
}

/// Well-formed insert record at `secs.inc`.
pub fn insert_at(secs: u32, inc: u32) -> Record {
    Record::from_document(&insert_entry(secs, inc)).expect("insert entry has all header fields")
}

/// Well-formed update record at `secs.inc`.
pub fn update_at(secs: u32, inc: u32) -> Record {
    let ts: bson::Timestamp = Timestamp::new(secs, inc).into();
    let entry = doc! {
        "ts": ts,
        "op": "u",
        "ns": "test.orders",
        "o": { "$set": { "status": "shipped" } },
        "o2": { "_id": i64::from(inc) },
    };
    Record::from_document(&entry).expect("update entry has all header fields")
}

/// Record at `secs.inc` whose payload is not BSON.
pub fn malformed_at(secs: u32, inc: u32) -> Record {
    Record::new(
        Timestamp::new(secs, inc),
        "i",
        "test.orders",
        b"not bson".to_vec(),
    )
}

/// A closed channel pre-loaded with `records`, as a finished producer would
/// leave it.
pub fn feed<R: Send + 'static>(records: Vec<R>) -> mpsc::Receiver<R> {
    let (tx, rx) = mpsc::channel(records.len().max(1));
    for record in records {
        if tx.try_send(record).is_err() {
            unreachable!("channel is sized to hold every record");
        }
    }
    rx
}

/// Keys of `records`, for compact assertions.
pub fn keys(records: &[Record]) -> Vec<Timestamp> {
    records.iter().map(|r| r.ts).collect()
}

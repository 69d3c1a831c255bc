//! oplog-sync library
//!
//! Building blocks for oplog change-data-capture pipelines: a validator
//! stage that checks a stream of oplog records for structural and ordering
//! problems, forwards the valid ones, and reports defects out-of-band.
//!
//! # Pipeline shape
//!
//! A coordinator wires the stage between a producer and a consumer, owns the
//! cancellation token, and waits on a [`CompletionBarrier`] shared by every
//! stage before tearing the pipeline down.
//!
//! ```no_run
//! use oplog_sync::sink::log_defects;
//! use oplog_sync::validator::{OplogValidator, Validator, ValidatorConfig};
//! use oplog_sync::CompletionBarrier;
//! use oplog_types::Record;
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run(records: mpsc::Receiver<Record>) -> oplog_sync::Result<()> {
//! let cancel = CancellationToken::new();
//! let barrier = CompletionBarrier::new(1);
//!
//! let handle = OplogValidator::<Record>::new(ValidatorConfig::default())
//!     .start(cancel.clone(), records, barrier.clone())?;
//! let (mut output, defects, _done) = handle.into_parts();
//!
//! let sink = tokio::spawn(log_defects(defects));
//! while let Some(record) = output.recv().await {
//!     // apply `record` to the target
//!     let _ = record;
//! }
//!
//! barrier.wait().await;
//! let _counts = sink.await?;
//! # Ok(())
//! # }
//! ```

pub mod barrier;
pub mod error;
pub mod sink;
pub mod testing;
pub mod validator;

pub use barrier::CompletionBarrier;
pub use error::{Error, Result};

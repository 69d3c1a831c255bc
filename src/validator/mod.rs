//! Validator stage for oplog replication pipelines.
//!
//! The stage sits between a record producer (an oplog fetcher) and a record
//! consumer (an applier):
//!
//! ```text
//! producer ──records──▶ validator ──validated records──▶ applier
//!                           │
//!                           └──────defects──────▶ observability sink
//! ```
//!
//! Ordering and structure problems are reported as [`ValidationDefect`]s on
//! their own channel and never stop the stage. Gaps are forwarded with a
//! warning; duplicates, regressions and malformed records are dropped.

pub mod config;
mod defect;
pub mod engine;
mod stage;

pub use config::{ValidatorConfig, ValidatorOpts};
pub use defect::{DefectCounts, DefectKind, ValidationDefect};
pub use engine::{evaluate, Outcome, ValidationState};
pub use stage::{OplogValidator, StageExit, StageSummary};

use oplog_types::ChangeRecord;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::barrier::CompletionBarrier;
use crate::error::Result;

/// A pipeline stage that filters a record stream down to validated records.
///
/// Starting consumes the validator, so a stage runs at most once.
pub trait Validator<R: ChangeRecord> {
    /// Spawn the stage and return its channels immediately.
    ///
    /// `cancel` aborts the stage without draining `input`. `completion` is
    /// released exactly once when the stage stops, and also when start-up
    /// fails so a coordinator waiting on it is never left hanging.
    ///
    /// Errors only report pre-flight problems; validation outcomes are
    /// delivered on the returned defect channel.
    fn start(
        self,
        cancel: CancellationToken,
        input: mpsc::Receiver<R>,
        completion: CompletionBarrier,
    ) -> Result<StageHandle<R>>;
}

/// Everything a coordinator needs to consume a running stage.
///
/// Both channels close exactly once, when the stage stops; closure is the
/// only end-of-stream signal.
pub struct StageHandle<R: ChangeRecord> {
    pub output: mpsc::Receiver<R>,
    pub defects: mpsc::Receiver<ValidationDefect<R::Key>>,
    done: JoinHandle<StageSummary>,
}

/// Records and defects collected by [`StageHandle::drain`].
#[derive(Debug)]
pub struct Drained<R: ChangeRecord> {
    pub records: Vec<R>,
    pub defects: Vec<ValidationDefect<R::Key>>,
}

impl<R: ChangeRecord> StageHandle<R> {
    pub(crate) fn new(
        output: mpsc::Receiver<R>,
        defects: mpsc::Receiver<ValidationDefect<R::Key>>,
        done: JoinHandle<StageSummary>,
    ) -> Self {
        Self {
            output,
            defects,
            done,
        }
    }

    /// Read both channels until the stage closes them.
    ///
    /// The channels are read concurrently so a full defect channel cannot
    /// stall the record channel or the other way round. Once the stage has
    /// stopped, further calls return empty collections.
    pub async fn drain(&mut self) -> Drained<R> {
        let Self {
            output, defects, ..
        } = self;

        let (records, defects) = tokio::join!(
            async {
                let mut records = Vec::new();
                while let Some(record) = output.recv().await {
                    records.push(record);
                }
                records
            },
            async {
                let mut collected = Vec::new();
                while let Some(defect) = defects.recv().await {
                    collected.push(defect);
                }
                collected
            }
        );

        Drained { records, defects }
    }

    /// Wait for the stage to stop and return its summary.
    ///
    /// Drain the channels first: a stage blocked on a full channel only stops
    /// once it is read from or cancelled. A panic inside the stage is
    /// re-raised here.
    pub async fn wait(self) -> Result<StageSummary> {
        match self.done.await {
            Ok(summary) => Ok(summary),
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => Err(err.into()),
        }
    }

    /// Split into the record channel, the defect channel and the task handle,
    /// for coordinators that consume each on its own task.
    #[allow(clippy::type_complexity)]
    pub fn into_parts(
        self,
    ) -> (
        mpsc::Receiver<R>,
        mpsc::Receiver<ValidationDefect<R::Key>>,
        JoinHandle<StageSummary>,
    ) {
        (self.output, self.defects, self.done)
    }
}

//! The concurrent run loop around the validation engine.

use oplog_types::{ChangeRecord, Record};
use std::marker::PhantomData;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::config::ValidatorConfig;
use super::defect::{DefectCounts, ValidationDefect};
use super::engine::{evaluate, Outcome, ValidationState};
use super::{StageHandle, Validator};
use crate::barrier::{CompletionBarrier, ReleaseOnDrop};
use crate::error::{Error, Result};

/// How a stage's run loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageExit {
    /// The input channel closed and every record read was handled.
    #[default]
    Drained,
    /// Cancellation was requested; unread and in-flight records were dropped.
    Cancelled,
}

/// Counts of what a stage delivered before it stopped.
///
/// Only deliveries that completed are counted; a record or defect abandoned
/// by cancellation mid-send is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageSummary {
    pub forwarded: u64,
    pub defects: DefectCounts,
    pub exit: StageExit,
}

/// Validator stage for oplog records, or any other [`ChangeRecord`].
#[derive(Debug, Clone)]
pub struct OplogValidator<R = Record> {
    config: ValidatorConfig,
    _record: PhantomData<fn() -> R>,
}

impl<R: ChangeRecord> OplogValidator<R> {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            _record: PhantomData,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }
}

impl<R: ChangeRecord> Default for OplogValidator<R> {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

impl<R: ChangeRecord> Validator<R> for OplogValidator<R> {
    fn start(
        self,
        cancel: CancellationToken,
        input: mpsc::Receiver<R>,
        completion: CompletionBarrier,
    ) -> Result<StageHandle<R>> {
        // Armed first so a failed start still counts the stage as finished.
        let release = ReleaseOnDrop::new(completion);

        self.config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let (output_tx, output_rx) = mpsc::channel(self.config.output_capacity);
        let (defect_tx, defect_rx) = mpsc::channel(self.config.defect_capacity);

        info!(
            output_capacity = self.config.output_capacity,
            defect_capacity = self.config.defect_capacity,
            detect_gaps = self.config.detect_gaps,
            "Starting validator stage"
        );

        let run_loop = RunLoop {
            cancel,
            input,
            output: output_tx,
            defects: defect_tx,
            summary: StageSummary::default(),
        };
        let state = ValidationState::new(self.config.detect_gaps);
        let done = runtime.spawn(run_loop.run(state, release));

        Ok(StageHandle::new(output_rx, defect_rx, done))
    }
}

/// Whether the run loop may keep going after a send.
enum Flow {
    Continue,
    Cancelled,
}

/// Owns the stage's channel ends for the lifetime of the task. Dropping it
/// closes the output and defect channels.
struct RunLoop<R: ChangeRecord> {
    cancel: CancellationToken,
    input: mpsc::Receiver<R>,
    output: mpsc::Sender<R>,
    defects: mpsc::Sender<ValidationDefect<R::Key>>,
    summary: StageSummary,
}

impl<R: ChangeRecord> RunLoop<R> {
    async fn run(
        mut self,
        mut state: ValidationState<R::Key>,
        release: ReleaseOnDrop,
    ) -> StageSummary {
        let exit = loop {
            let record = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break StageExit::Cancelled,
                next = self.input.recv() => match next {
                    Some(record) => record,
                    None => break StageExit::Drained,
                },
            };

            let (next, outcome) = evaluate(state, record);
            state = next;
            if let Flow::Cancelled = self.handle(outcome).await {
                break StageExit::Cancelled;
            }
        };

        match exit {
            StageExit::Drained => debug!("Validator input closed, all records handled"),
            StageExit::Cancelled => {
                debug!("Validator cancelled, abandoning remaining input")
            }
        }

        let mut summary = self.summary;
        summary.exit = exit;
        info!(
            forwarded = summary.forwarded,
            defects = summary.defects.total(),
            exit = ?summary.exit,
            "Validator stage stopped"
        );

        // Outputs close before the barrier is released.
        drop(self);
        drop(release);
        summary
    }

    async fn handle(&mut self, outcome: Outcome<R>) -> Flow {
        match outcome {
            Outcome::Accept { record, gap } => {
                if let Flow::Cancelled = self.forward(record).await {
                    return Flow::Cancelled;
                }
                match gap {
                    Some(gap) => self.report(gap).await,
                    None => Flow::Continue,
                }
            }
            Outcome::Reject(defect) => self.report(defect).await,
        }
    }

    async fn forward(&mut self, record: R) -> Flow {
        let flow = send_or_cancel(&self.cancel, &self.output, record, "output").await;
        if let Flow::Continue = flow {
            self.summary.forwarded += 1;
        }
        flow
    }

    async fn report(&mut self, defect: ValidationDefect<R::Key>) -> Flow {
        debug!(
            kind = %defect.kind,
            key = %defect.key,
            cause = %defect.cause,
            "Validation defect"
        );
        let kind = defect.kind;
        let flow = send_or_cancel(&self.cancel, &self.defects, defect, "defect").await;
        if let Flow::Continue = flow {
            self.summary.defects.record(kind);
        }
        flow
    }
}

/// Send `value`, giving up as soon as cancellation is requested.
///
/// # Panics
///
/// Panics when the receiver was dropped while the stage was still supposed
/// to be running: the coordinator owns the receiving ends and must keep them
/// open until the stage closes the channels.
async fn send_or_cancel<T>(
    cancel: &CancellationToken,
    tx: &mpsc::Sender<T>,
    value: T,
    channel: &'static str,
) -> Flow {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Flow::Cancelled,
        sent = tx.send(value) => match sent {
            Ok(()) => Flow::Continue,
            Err(_) if cancel.is_cancelled() => Flow::Cancelled,
            Err(_) => panic!(
                "validator {channel} channel was closed by its receiver while the stage was running"
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{feed, insert_at, malformed_at};
    use crate::validator::DefectKind;
    use oplog_types::Timestamp;
    use std::time::Duration;

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let barrier = CompletionBarrier::new(1);
        let (_tx, rx) = mpsc::channel::<Record>(1);
        let validator = OplogValidator::<Record>::new(ValidatorConfig {
            output_capacity: 0,
            ..Default::default()
        });

        let err = match validator.start(CancellationToken::new(), rx, barrier.clone()) {
            Ok(_) => panic!("zero capacity must fail to start"),
            Err(err) => err,
        };
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(barrier.remaining(), 0);
    }

    #[test]
    fn test_start_outside_runtime() {
        let barrier = CompletionBarrier::new(1);
        let (_tx, rx) = mpsc::channel::<Record>(1);
        let result =
            OplogValidator::<Record>::default().start(CancellationToken::new(), rx, barrier.clone());
        assert!(matches!(result, Err(Error::NoRuntime)));
        assert_eq!(barrier.remaining(), 0);
    }

    #[tokio::test]
    async fn test_summary_counts() {
        let barrier = CompletionBarrier::new(1);
        let input = feed(vec![
            insert_at(10, 1),
            insert_at(10, 2),
            insert_at(10, 2),
            malformed_at(10, 3),
            insert_at(10, 5),
            insert_at(10, 4),
        ]);
        let mut handle = OplogValidator::<Record>::default()
            .start(CancellationToken::new(), input, barrier.clone())
            .unwrap();

        let drained = handle.drain().await;
        let summary = handle.wait().await.unwrap();

        assert_eq!(drained.records.len(), 3);
        assert_eq!(
            summary,
            StageSummary {
                forwarded: 3,
                defects: DefectCounts {
                    gaps: 1,
                    duplicates: 1,
                    out_of_order: 1,
                    malformed: 1,
                },
                exit: StageExit::Drained,
            }
        );
        assert_eq!(summary.defects.total(), 4);
        assert_eq!(drained.defects[1].key, Timestamp::new(10, 3));
        barrier.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_blocked_on_full_output_unblocks_on_cancel() {
        let barrier = CompletionBarrier::new(1);
        let cancel = CancellationToken::new();
        let input = feed((1..=5).map(|inc| insert_at(10, inc)).collect());
        let handle = OplogValidator::<Record>::new(ValidatorConfig {
            output_capacity: 1,
            ..Default::default()
        })
        .start(cancel.clone(), input, barrier.clone())
        .unwrap();

        // Nobody reads the output, so the stage parks on its second send.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(barrier.remaining(), 1);

        cancel.cancel();
        let summary = tokio::time::timeout(Duration::from_secs(1), handle.wait())
            .await
            .expect("cancelled stage should stop promptly")
            .unwrap();
        assert_eq!(summary.exit, StageExit::Cancelled);
        assert_eq!(summary.forwarded, 1);
        assert_eq!(barrier.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_blocked_on_full_defect_channel_unblocks_on_cancel() {
        let barrier = CompletionBarrier::new(1);
        let cancel = CancellationToken::new();
        let input = feed(vec![insert_at(1, 1); 4]);
        let handle = OplogValidator::<Record>::new(ValidatorConfig {
            defect_capacity: 1,
            ..Default::default()
        })
        .start(cancel.clone(), input, barrier.clone())
        .unwrap();

        // The first duplicate fills the defect channel; the second parks.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(barrier.remaining(), 1);

        cancel.cancel();
        let summary = tokio::time::timeout(Duration::from_secs(1), handle.wait())
            .await
            .expect("cancelled stage should stop promptly")
            .unwrap();
        assert_eq!(
            summary,
            StageSummary {
                forwarded: 1,
                defects: DefectCounts {
                    duplicates: 1,
                    ..Default::default()
                },
                exit: StageExit::Cancelled,
            }
        );
        assert_eq!(barrier.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_gap_report_keeps_forwarded_record() {
        let barrier = CompletionBarrier::new(1);
        let cancel = CancellationToken::new();
        // The duplicate fills the defect channel, so the gap defect for 1.3
        // cannot be delivered after 1.3 itself is forwarded.
        let input = feed(vec![insert_at(1, 1), insert_at(1, 1), insert_at(1, 3)]);
        let mut handle = OplogValidator::<Record>::new(ValidatorConfig {
            defect_capacity: 1,
            ..Default::default()
        })
        .start(cancel.clone(), input, barrier.clone())
        .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(barrier.remaining(), 1);

        cancel.cancel();
        let drained = tokio::time::timeout(Duration::from_secs(1), handle.drain())
            .await
            .expect("cancelled stage should close its channels");
        let summary = handle.wait().await.unwrap();

        assert_eq!(
            drained.records.iter().map(|r| r.ts).collect::<Vec<_>>(),
            vec![Timestamp::new(1, 1), Timestamp::new(1, 3)]
        );
        assert_eq!(drained.defects.len(), 1);
        assert_eq!(drained.defects[0].kind, DefectKind::Duplicate);
        assert_eq!(summary.forwarded, 2);
        assert_eq!(summary.defects.duplicates, 1);
        assert_eq!(summary.defects.gaps, 0);
        assert_eq!(summary.exit, StageExit::Cancelled);
        assert_eq!(barrier.remaining(), 0);
    }

    #[tokio::test]
    #[should_panic(expected = "closed by its receiver")]
    async fn test_dropped_receiver_is_a_contract_violation() {
        let barrier = CompletionBarrier::new(1);
        let input = feed(vec![insert_at(10, 1)]);
        let handle = OplogValidator::<Record>::default()
            .start(CancellationToken::new(), input, barrier)
            .unwrap();

        let (output, defects, done) = handle.into_parts();
        drop(output);
        drop(defects);
        if let Err(err) = done.await {
            std::panic::resume_unwind(err.into_panic());
        }
    }
}

//! A ready-made observability consumer for a stage's defect channel.

use std::fmt;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::validator::{DefectCounts, ValidationDefect};

/// Log every defect until the stage closes the channel, then return the
/// per-kind counts.
///
/// Typically spawned next to the applier:
///
/// ```ignore
/// let (output, defects, done) = handle.into_parts();
/// let sink = tokio::spawn(log_defects(defects));
/// ```
pub async fn log_defects<K: fmt::Display>(
    mut defects: mpsc::Receiver<ValidationDefect<K>>,
) -> DefectCounts {
    let mut counts = DefectCounts::default();
    while let Some(defect) = defects.recv().await {
        warn!(
            kind = %defect.kind,
            key = %defect.key,
            forwarded = defect.is_forwarded(),
            "Oplog validation defect: {}",
            defect.cause
        );
        counts.record(defect.kind);
    }

    info!(
        total = counts.total(),
        gaps = counts.gaps,
        duplicates = counts.duplicates,
        out_of_order = counts.out_of_order,
        malformed = counts.malformed,
        "Defect stream closed"
    );
    counts
}

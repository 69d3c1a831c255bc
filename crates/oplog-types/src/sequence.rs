//! Traits shared by every record source a validator can sit behind.

use std::fmt;

/// A totally ordered key used to detect gaps, duplicates and regressions.
pub trait SequenceKey: Ord + Clone + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Whether `self` comes after `prev` but skips at least one unit.
    ///
    /// Domains without a known unit size always return `false`.
    fn skips_after(&self, prev: &Self) -> bool;
}

impl SequenceKey for u64 {
    fn skips_after(&self, prev: &Self) -> bool {
        *self > *prev && *self - *prev > 1
    }
}

/// A unit of data flowing through a validation stage.
pub trait ChangeRecord: Send + 'static {
    type Key: SequenceKey;

    /// The record's position in the change log.
    fn sequence_key(&self) -> Self::Key;

    /// Check that the record has the shape downstream consumers expect.
    ///
    /// The error string is the human-readable cause reported with the defect.
    fn check_structure(&self) -> Result<(), String>;
}

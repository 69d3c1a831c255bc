//! Pure classification of records against the run's ordering state.
//!
//! The engine has no notion of channels or tasks; the stage in
//! [`super::stage`] feeds it one record at a time and routes the outcome.

use oplog_types::{ChangeRecord, SequenceKey};

use super::defect::{DefectKind, ValidationDefect};

/// What the engine remembers between records of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationState<K> {
    last_key: Option<K>,
    detect_gaps: bool,
}

impl<K: SequenceKey> ValidationState<K> {
    /// Fresh state for a new run. The first accepted record sets the baseline.
    pub fn new(detect_gaps: bool) -> Self {
        Self {
            last_key: None,
            detect_gaps,
        }
    }

    /// Key of the most recently accepted record.
    pub fn last_key(&self) -> Option<&K> {
        self.last_key.as_ref()
    }
}

/// Classification of one record.
#[derive(Debug)]
pub enum Outcome<R: ChangeRecord> {
    /// Forward the record. A gap defect, when present, is reported alongside.
    Accept {
        record: R,
        gap: Option<ValidationDefect<R::Key>>,
    },
    /// Drop the record and report the defect.
    Reject(ValidationDefect<R::Key>),
}

/// Classify `record` against `state`, returning the state to use for the next
/// record.
///
/// Checks run in precedence order: structure first, then ordering. Only
/// accepted records move `last_key`, so a rejected record never becomes the
/// baseline for the ones after it.
pub fn evaluate<R: ChangeRecord>(
    mut state: ValidationState<R::Key>,
    record: R,
) -> (ValidationState<R::Key>, Outcome<R>) {
    let key = record.sequence_key();

    if let Err(cause) = record.check_structure() {
        let defect = ValidationDefect::new(DefectKind::Malformed, key, cause);
        return (state, Outcome::Reject(defect));
    }

    let gap = match state.last_key.clone() {
        None => None,
        Some(last) if key == last => {
            let defect = ValidationDefect::new(
                DefectKind::Duplicate,
                key.clone(),
                format!("key {key} was already accepted"),
            );
            return (state, Outcome::Reject(defect));
        }
        Some(last) if key < last => {
            let defect = ValidationDefect::new(
                DefectKind::OutOfOrder,
                key.clone(),
                format!("key {key} is below last accepted key {last}"),
            );
            return (state, Outcome::Reject(defect));
        }
        Some(last) if state.detect_gaps && key.skips_after(&last) => Some(ValidationDefect::new(
            DefectKind::Gap,
            key.clone(),
            format!("key {key} skips ahead of last accepted key {last}"),
        )),
        Some(_) => None,
    };

    state.last_key = Some(key);
    (state, Outcome::Accept { record, gap })
}

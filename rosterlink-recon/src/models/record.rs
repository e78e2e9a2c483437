//! Per-record state machine
//!
//! Each import record carries two independent status axes: the existence
//! check lifecycle and the processing (create-or-update) lifecycle. All
//! mutation goes through the transition methods below, which enforce the
//! guards; status fields are private so illegal transitions cannot be made
//! from outside this module.

use crate::parser::RawRow;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Existence-check lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistenceStatus {
    /// Not yet selected for an existence check
    Idle,
    /// Check in flight (set optimistically at batch selection)
    Checking,
    /// A matching directory person exists
    Exists,
    /// No matching directory person
    NotFound,
    /// The check failed (transport/API error); terminal unless re-queued
    CheckError,
}

/// Processing (create-or-update) lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// No action attempted
    Idle,
    /// Action in flight; doubles as the per-record mutual-exclusion flag
    Processing,
    /// Action completed; terminal, never reprocessed automatically
    Succeeded,
    /// Action failed; the operator may retry
    Failed,
}

/// Result of one existence check, applied via [`ImportRecord::resolve_check`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Exists { directory_id: i64 },
    NotFound,
    Error { message: String },
}

/// One row of the import file, tracked through both lifecycles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRecord {
    /// Opaque identity, generated at parse time, never reused
    pub id: Uuid,
    /// 0-based position among valid rows; drives batch windows
    pub row_index: usize,
    /// 1-based source line number, for operator-facing messages
    pub line_number: usize,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    existence: ExistenceStatus,
    directory_id: Option<i64>,
    processing: ProcessingStatus,
    message: Option<String>,
}

impl ImportRecord {
    pub fn new(row_index: usize, row: RawRow) -> Self {
        Self {
            id: Uuid::new_v4(),
            row_index,
            line_number: row.line_number,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            existence: ExistenceStatus::Idle,
            directory_id: None,
            processing: ProcessingStatus::Idle,
            message: None,
        }
    }

    pub fn existence(&self) -> ExistenceStatus {
        self.existence
    }

    pub fn processing(&self) -> ProcessingStatus {
        self.processing
    }

    pub fn directory_id(&self) -> Option<i64> {
        self.directory_id
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Whether the existence axis has reached a result (success or failure)
    pub fn existence_known(&self) -> bool {
        matches!(
            self.existence,
            ExistenceStatus::Exists | ExistenceStatus::NotFound | ExistenceStatus::CheckError
        )
    }

    /// Enter `Checking`
    ///
    /// Valid from `Idle` (first check) and from the terminal `NotFound` /
    /// `CheckError` states (explicit re-queue). Returns false, changing
    /// nothing, while a check is already in flight or the person is known to
    /// exist.
    pub(crate) fn begin_check(&mut self) -> bool {
        match self.existence {
            ExistenceStatus::Idle | ExistenceStatus::NotFound | ExistenceStatus::CheckError => {
                self.existence = ExistenceStatus::Checking;
                true
            }
            ExistenceStatus::Checking | ExistenceStatus::Exists => false,
        }
    }

    /// Apply an existence-check result
    ///
    /// Only valid while `Checking`; anything else means a stale or duplicate
    /// response and is ignored (returns false).
    pub(crate) fn resolve_check(&mut self, outcome: CheckOutcome) -> bool {
        if self.existence != ExistenceStatus::Checking {
            return false;
        }
        match outcome {
            CheckOutcome::Exists { directory_id } => {
                self.existence = ExistenceStatus::Exists;
                self.directory_id = Some(directory_id);
            }
            CheckOutcome::NotFound => {
                self.existence = ExistenceStatus::NotFound;
            }
            CheckOutcome::Error { message } => {
                self.existence = ExistenceStatus::CheckError;
                self.message = Some(message);
            }
        }
        true
    }

    /// Enter `Processing` (check-and-set)
    ///
    /// Rejected while the existence axis is still `Idle`/`Checking`, while a
    /// previous action is outstanding, and after `Succeeded`. A false return
    /// is a silent no-op for the caller.
    pub(crate) fn begin_processing(&mut self) -> bool {
        if !self.existence_known() {
            return false;
        }
        match self.processing {
            ProcessingStatus::Idle | ProcessingStatus::Failed => {
                self.processing = ProcessingStatus::Processing;
                true
            }
            ProcessingStatus::Processing | ProcessingStatus::Succeeded => false,
        }
    }

    /// Apply the terminal outcome of a processing action
    ///
    /// On success the directory id becomes the canonical id of the created or
    /// updated person. Only valid from `Processing`.
    pub(crate) fn finish_processing(
        &mut self,
        result: Result<(i64, String), String>,
    ) -> bool {
        if self.processing != ProcessingStatus::Processing {
            return false;
        }
        match result {
            Ok((directory_id, message)) => {
                self.processing = ProcessingStatus::Succeeded;
                self.directory_id = Some(directory_id);
                self.message = Some(message);
            }
            Err(message) => {
                self.processing = ProcessingStatus::Failed;
                self.message = Some(message);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ImportRecord {
        ImportRecord::new(
            0,
            RawRow {
                line_number: 2,
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@x.com".to_string(),
            },
        )
    }

    #[test]
    fn fresh_record_is_idle_on_both_axes() {
        let r = record();
        assert_eq!(r.existence(), ExistenceStatus::Idle);
        assert_eq!(r.processing(), ProcessingStatus::Idle);
        assert_eq!(r.directory_id(), None);
        assert!(r.message().is_none());
    }

    #[test]
    fn records_get_distinct_ids_even_for_identical_content() {
        let a = record();
        let b = record();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn check_found_sets_exists_and_directory_id() {
        let mut r = record();
        assert!(r.begin_check());
        assert!(r.resolve_check(CheckOutcome::Exists { directory_id: 42 }));
        assert_eq!(r.existence(), ExistenceStatus::Exists);
        assert_eq!(r.directory_id(), Some(42));
    }

    #[test]
    fn check_error_stores_message() {
        let mut r = record();
        r.begin_check();
        r.resolve_check(CheckOutcome::Error {
            message: "directory API error 500: boom".to_string(),
        });
        assert_eq!(r.existence(), ExistenceStatus::CheckError);
        assert_eq!(r.message(), Some("directory API error 500: boom"));
    }

    #[test]
    fn begin_check_rejected_while_in_flight_or_exists() {
        let mut r = record();
        assert!(r.begin_check());
        assert!(!r.begin_check()); // already Checking
        r.resolve_check(CheckOutcome::Exists { directory_id: 1 });
        assert!(!r.begin_check()); // existence already known positive
    }

    #[test]
    fn terminal_negative_states_can_be_requeued() {
        let mut r = record();
        r.begin_check();
        r.resolve_check(CheckOutcome::NotFound);
        assert!(r.begin_check());
        assert_eq!(r.existence(), ExistenceStatus::Checking);

        let mut r = record();
        r.begin_check();
        r.resolve_check(CheckOutcome::Error {
            message: "x".to_string(),
        });
        assert!(r.begin_check());
    }

    #[test]
    fn resolve_check_without_pending_check_is_ignored() {
        let mut r = record();
        assert!(!r.resolve_check(CheckOutcome::NotFound));
        assert_eq!(r.existence(), ExistenceStatus::Idle);
    }

    #[test]
    fn processing_guard_rejects_unknown_existence() {
        let mut r = record();
        assert!(!r.begin_processing()); // Idle
        r.begin_check();
        assert!(!r.begin_processing()); // Checking
        r.resolve_check(CheckOutcome::NotFound);
        assert!(r.begin_processing()); // existence known
    }

    #[test]
    fn processing_is_mutually_exclusive_per_record() {
        let mut r = record();
        r.begin_check();
        r.resolve_check(CheckOutcome::Exists { directory_id: 7 });
        assert!(r.begin_processing());
        assert!(!r.begin_processing()); // second demand while outstanding: no-op
    }

    #[test]
    fn success_is_terminal_for_processing() {
        let mut r = record();
        r.begin_check();
        r.resolve_check(CheckOutcome::NotFound);
        r.begin_processing();
        r.finish_processing(Ok((99, "Created directory person 99".to_string())));
        assert_eq!(r.processing(), ProcessingStatus::Succeeded);
        assert_eq!(r.directory_id(), Some(99));
        assert!(!r.begin_processing());
    }

    #[test]
    fn failed_processing_can_be_retried() {
        let mut r = record();
        r.begin_check();
        r.resolve_check(CheckOutcome::Exists { directory_id: 7 });
        r.begin_processing();
        r.finish_processing(Err("Error: directory API error 500: boom".to_string()));
        assert_eq!(r.processing(), ProcessingStatus::Failed);
        assert!(r.message().unwrap().contains("500"));
        assert!(r.begin_processing());
    }
}

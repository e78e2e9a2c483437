//! Reconciliation orchestration
//!
//! Owns the current import session and drives records through the two
//! lifecycles: demand signals pull batches of existence checks, explicit
//! operator actions run the create-or-update path. Each record's outcome is
//! applied independently; one record's directory error never aborts another's
//! work. A session replaced mid-flight is detected by session-id comparison
//! and stale responses are discarded.

use crate::client::DirectoryApi;
use crate::models::record::{CheckOutcome, ImportRecord};
use crate::models::session::ImportSession;
use crate::parser::{self, CsvHeaders, HeaderMismatch};
use crate::scheduler::{BatchScheduler, CheckRequest};
use chrono::Utc;
use futures::future::join_all;
use rosterlink_common::events::{CheckResult, EventBus, ProcessResult, ReconcileEvent};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Orchestrates parsing, batched existence checks, and per-record actions
pub struct ReconciliationDriver<C: DirectoryApi> {
    client: Arc<C>,
    scheduler: BatchScheduler,
    session: Arc<RwLock<Option<ImportSession>>>,
    event_bus: EventBus,
}

impl<C: DirectoryApi> ReconciliationDriver<C> {
    pub fn new(client: C, batch_size: usize, event_bus: EventBus) -> Self {
        Self {
            client: Arc::new(client),
            scheduler: BatchScheduler::new(batch_size),
            session: Arc::new(RwLock::new(None)),
            event_bus,
        }
    }

    /// Parse a CSV file and install it as the current session
    ///
    /// Replaces any previous session atomically: the batch cursor resets and
    /// in-flight results for the old session are discarded on arrival. Header
    /// defaults apply only when the caller supplies no header names.
    pub async fn submit_file(
        &self,
        text: &str,
        headers: Option<CsvHeaders>,
    ) -> Result<Uuid, HeaderMismatch> {
        let headers = headers.unwrap_or_default();
        let rows = parser::parse(text, &headers)?;

        let session = ImportSession::from_rows(rows);
        let session_id = session.session_id;
        let total_records = session.total();

        *self.session.write().await = Some(session);

        tracing::info!(
            session_id = %session_id,
            records = total_records,
            "Import session loaded"
        );
        self.event_bus
            .emit(ReconcileEvent::SessionLoaded {
                session_id,
                total_records,
                timestamp: Utc::now(),
            })
            .ok();

        Ok(session_id)
    }

    /// Demand signal: initiate the next batch of existence checks
    ///
    /// Selects at most one batch window, issues one find per selected record
    /// concurrently, and applies each result independently as it lands.
    /// Returns the number of checks initiated; 0 past the end of the list
    /// (idempotent no-op).
    pub async fn request_more_checks(&self) -> usize {
        let (session_id, requests) = {
            let mut guard = self.session.write().await;
            let Some(session) = guard.as_mut() else {
                tracing::debug!("Demand signal with no session loaded");
                return 0;
            };
            let requests = self.scheduler.next_batch(session);
            self.event_bus
                .emit(ReconcileEvent::ChecksRequested {
                    session_id: session.session_id,
                    requested: requests.len(),
                    processed_index: session.processed_index(),
                    timestamp: Utc::now(),
                })
                .ok();
            (session.session_id, requests)
        };

        if requests.is_empty() {
            return 0;
        }

        let checks = requests.iter().map(|req| {
            let client = Arc::clone(&self.client);
            async move {
                let result = client
                    .find_person(&req.first_name, &req.last_name, &req.email)
                    .await;
                (req.record_id, result)
            }
        });

        // Results land in any order; each touches only its own record
        let results = join_all(checks).await;
        for (record_id, result) in results {
            let outcome = match result {
                Ok(Some(person)) => CheckOutcome::Exists {
                    directory_id: person.id,
                },
                Ok(None) => CheckOutcome::NotFound,
                Err(e) => CheckOutcome::Error {
                    message: e.to_string(),
                },
            };
            self.apply_check_outcome(session_id, record_id, outcome).await;
        }

        requests.len()
    }

    /// Explicitly re-queue a record whose check ended `NotFound`/`CheckError`
    ///
    /// Re-enters `Checking` and issues one immediate find. Returns false (and
    /// does nothing) when the record is unknown or not in a re-queueable state.
    pub async fn recheck_record(&self, record_id: Uuid) -> bool {
        let (session_id, request) = {
            let mut guard = self.session.write().await;
            let Some(session) = guard.as_mut() else {
                return false;
            };
            let session_id = session.session_id;
            let Some(record) = session.record_mut(record_id) else {
                tracing::warn!(record_id = %record_id, "Recheck for unknown record");
                return false;
            };
            if !record.begin_check() {
                tracing::debug!(record_id = %record_id, "Recheck rejected by state guard");
                return false;
            }
            (
                session_id,
                CheckRequest {
                    record_id: record.id,
                    first_name: record.first_name.clone(),
                    last_name: record.last_name.clone(),
                    email: record.email.clone(),
                },
            )
        };

        self.event_bus
            .emit(ReconcileEvent::RecordRequeued {
                session_id,
                record_id,
                timestamp: Utc::now(),
            })
            .ok();

        let result = self
            .client
            .find_person(&request.first_name, &request.last_name, &request.email)
            .await;
        let outcome = match result {
            Ok(Some(person)) => CheckOutcome::Exists {
                directory_id: person.id,
            },
            Ok(None) => CheckOutcome::NotFound,
            Err(e) => CheckOutcome::Error {
                message: e.to_string(),
            },
        };
        self.apply_check_outcome(session_id, record_id, outcome).await;
        true
    }

    /// Run the create-or-update action for one record
    ///
    /// Silent no-op while the record's existence is unknown, while a previous
    /// action is outstanding, or after success. Every attempted action ends in
    /// a terminal processing state with an operator-facing message; directory
    /// errors are never surfaced to the caller.
    pub async fn process_record(&self, record_id: Uuid, attribute_key: &str, attribute_value: &str) {
        let (session_id, request) = {
            let mut guard = self.session.write().await;
            let Some(session) = guard.as_mut() else {
                return;
            };
            let session_id = session.session_id;
            let Some(record) = session.record_mut(record_id) else {
                tracing::warn!(record_id = %record_id, "Process request for unknown record");
                return;
            };
            if !record.begin_processing() {
                tracing::debug!(
                    record_id = %record_id,
                    existence = ?record.existence(),
                    processing = ?record.processing(),
                    "Process request rejected by state guard"
                );
                return;
            }
            (
                session_id,
                CheckRequest {
                    record_id: record.id,
                    first_name: record.first_name.clone(),
                    last_name: record.last_name.clone(),
                    email: record.email.clone(),
                },
            )
        };

        self.event_bus
            .emit(ReconcileEvent::ProcessingStarted {
                session_id,
                record_id,
                timestamp: Utc::now(),
            })
            .ok();

        // Re-run the existence decision from scratch at action time: a person
        // created by an earlier partial failure is found here and repaired via
        // the idempotent update path.
        let result = self
            .run_action(&request, attribute_key, attribute_value)
            .await;

        let mut guard = self.session.write().await;
        let Some(session) = guard.as_mut() else {
            tracing::debug!(record_id = %record_id, "Discarding action result for cleared session");
            return;
        };
        if session.session_id != session_id {
            tracing::debug!(
                record_id = %record_id,
                "Discarding stale action result from replaced session"
            );
            return;
        }
        let Some(record) = session.record_mut(record_id) else {
            return;
        };

        let (outcome, message) = match result {
            Ok((directory_id, message)) => {
                record.finish_processing(Ok((directory_id, message.clone())));
                tracing::info!(
                    session_id = %session_id,
                    record_id = %record_id,
                    directory_id = directory_id,
                    "Record processed"
                );
                (ProcessResult::Succeeded { directory_id }, message)
            }
            Err(e) => {
                let message = format!("Error: {}", e);
                record.finish_processing(Err(message.clone()));
                tracing::warn!(
                    session_id = %session_id,
                    record_id = %record_id,
                    error = %e,
                    "Record processing failed"
                );
                (
                    ProcessResult::Failed {
                        message: message.clone(),
                    },
                    message,
                )
            }
        };

        self.event_bus
            .emit(ReconcileEvent::RecordProcessed {
                session_id,
                record_id,
                outcome,
                message,
                timestamp: Utc::now(),
            })
            .ok();
    }

    /// Read-only snapshot of the current session's records, file order
    pub async fn records(&self) -> Vec<ImportRecord> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.records().to_vec())
            .unwrap_or_default()
    }

    /// Current session id, if a file has been submitted
    pub async fn session_id(&self) -> Option<Uuid> {
        self.session.read().await.as_ref().map(|s| s.session_id)
    }

    /// (initiated, total) check progress for the current session
    pub async fn check_progress(&self) -> Option<(usize, usize)> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| (s.processed_index(), s.total()))
    }

    /// Create-or-update decision for one record's action
    async fn run_action(
        &self,
        request: &CheckRequest,
        attribute_key: &str,
        attribute_value: &str,
    ) -> Result<(i64, String), crate::client::DirectoryError> {
        match self
            .client
            .find_person(&request.first_name, &request.last_name, &request.email)
            .await?
        {
            Some(person) => {
                self.client
                    .set_attribute(person.id, attribute_key, attribute_value)
                    .await?;
                Ok((
                    person.id,
                    format!(
                        "Attribute '{}' set to '{}' for directory id {}",
                        attribute_key, attribute_value, person.id
                    ),
                ))
            }
            None => {
                let created = self
                    .client
                    .create_person(
                        &request.first_name,
                        &request.last_name,
                        &request.email,
                        attribute_key,
                        attribute_value,
                    )
                    .await?;
                Ok((
                    created.id,
                    format!(
                        "Created directory person {} ({} {})",
                        created.id, request.first_name, request.last_name
                    ),
                ))
            }
        }
    }

    /// Apply one existence-check result, discarding stale ones
    async fn apply_check_outcome(
        &self,
        session_id: Uuid,
        record_id: Uuid,
        outcome: CheckOutcome,
    ) {
        let mut guard = self.session.write().await;
        let Some(session) = guard.as_mut() else {
            tracing::debug!(record_id = %record_id, "Discarding check result for cleared session");
            return;
        };
        if session.session_id != session_id {
            tracing::debug!(
                record_id = %record_id,
                "Discarding stale check result from replaced session"
            );
            return;
        }
        let Some(record) = session.record_mut(record_id) else {
            return;
        };

        let event_outcome = match &outcome {
            CheckOutcome::Exists { directory_id } => CheckResult::Exists {
                directory_id: *directory_id,
            },
            CheckOutcome::NotFound => CheckResult::NotFound,
            CheckOutcome::Error { message } => CheckResult::Error {
                message: message.clone(),
            },
        };

        if !record.resolve_check(outcome) {
            tracing::debug!(record_id = %record_id, "Duplicate check result ignored");
            return;
        }

        tracing::debug!(
            session_id = %session_id,
            record_id = %record_id,
            outcome = ?event_outcome,
            "Existence check resolved"
        );
        self.event_bus
            .emit(ReconcileEvent::RecordChecked {
                session_id,
                record_id,
                outcome: event_outcome,
                timestamp: Utc::now(),
            })
            .ok();
    }
}

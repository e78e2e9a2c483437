//! Import session state
//!
//! One session per submitted file. The session id doubles as the generation
//! tag used to discard in-flight directory responses after a new file
//! replaces the session.

use crate::models::record::ImportRecord;
use crate::parser::RawRow;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// An import session: the parsed records plus the batch window cursor
#[derive(Debug, Clone)]
pub struct ImportSession {
    /// Unique session identifier / generation tag
    pub session_id: Uuid,
    records: Vec<ImportRecord>,
    /// Rows for which an existence check has been initiated; only increases
    processed_index: usize,
    /// Session start time
    pub started_at: DateTime<Utc>,
}

impl ImportSession {
    /// Build a session from parsed rows, in file order
    pub fn from_rows(rows: Vec<RawRow>) -> Self {
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(row_index, row)| ImportRecord::new(row_index, row))
            .collect();
        Self {
            session_id: Uuid::new_v4(),
            records,
            processed_index: 0,
            started_at: Utc::now(),
        }
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn processed_index(&self) -> usize {
        self.processed_index
    }

    /// All checks initiated; further demand signals are no-ops
    pub fn is_exhausted(&self) -> bool {
        self.processed_index >= self.records.len()
    }

    /// Read-only view of the records, file order
    pub fn records(&self) -> &[ImportRecord] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut [ImportRecord] {
        &mut self.records
    }

    pub(crate) fn record_mut(&mut self, record_id: Uuid) -> Option<&mut ImportRecord> {
        self.records.iter_mut().find(|r| r.id == record_id)
    }

    /// Advance the batch cursor; monotone, capped at the record count
    pub(crate) fn advance_processed_index(&mut self, to: usize) {
        let capped = to.min(self.records.len());
        if capped > self.processed_index {
            self.processed_index = capped;
        }
    }
}

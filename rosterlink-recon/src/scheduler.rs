//! Demand-driven batch selection
//!
//! The scheduler is purely reactive: each demand signal pulls at most one
//! batch-sized window of not-yet-checked records. Selected records are marked
//! `Checking` before any request is issued, so a second demand signal arriving
//! before responses land selects a disjoint set.

use crate::models::record::ExistenceStatus;
use crate::models::session::ImportSession;
use uuid::Uuid;

/// The fields needed to issue one existence check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub record_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Selects the next window of existence checks, bounded by the batch size
#[derive(Debug, Clone, Copy)]
pub struct BatchScheduler {
    batch_size: usize,
}

impl BatchScheduler {
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Select the next batch from `[processed_index, processed_index + batch_size)`
    ///
    /// Only `Idle` records are selected; records whose check already completed
    /// or is in flight within the window are skipped (no duplicate network
    /// calls). The cursor advances to the window end regardless, monotonically.
    /// Returns an empty batch once the cursor has reached the end of the list.
    pub fn next_batch(&self, session: &mut ImportSession) -> Vec<CheckRequest> {
        let start = session.processed_index();
        let end = (start + self.batch_size).min(session.total());
        if start >= end {
            return Vec::new();
        }

        let mut requests = Vec::new();
        for record in &mut session.records_mut()[start..end] {
            if record.existence() != ExistenceStatus::Idle {
                continue;
            }
            if record.begin_check() {
                requests.push(CheckRequest {
                    record_id: record.id,
                    first_name: record.first_name.clone(),
                    last_name: record.last_name.clone(),
                    email: record.email.clone(),
                });
            }
        }
        session.advance_processed_index(end);

        tracing::debug!(
            session_id = %session.session_id,
            window_start = start,
            window_end = end,
            selected = requests.len(),
            "Batch selected"
        );

        requests
    }
}

//! # rosterlink-recon
//!
//! Incremental batch-reconciliation core: parses a bulk-import CSV into typed
//! records, drives each record through an existence-check → create-or-update
//! state machine against an external person directory, and paces the work in
//! bounded batches triggered by consumer demand.
//!
//! The presentation layer, transport framework, and the directory service
//! itself are external collaborators; this crate exposes the
//! [`ReconciliationDriver`] surface and emits [`rosterlink_common::events`]
//! for any UI layered on top.

pub mod client;
pub mod driver;
pub mod models;
pub mod parser;
pub mod scheduler;

pub use client::{DirectoryApi, DirectoryClient, DirectoryError, Person};
pub use driver::ReconciliationDriver;
pub use models::record::{CheckOutcome, ExistenceStatus, ImportRecord, ProcessingStatus};
pub use models::session::ImportSession;
pub use parser::{CsvHeaders, HeaderMismatch, RawRow};
pub use scheduler::{BatchScheduler, CheckRequest};

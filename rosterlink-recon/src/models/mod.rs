//! Data model for the reconciliation core

pub mod record;
pub mod session;

pub use record::{CheckOutcome, ExistenceStatus, ImportRecord, ProcessingStatus};
pub use session::ImportSession;

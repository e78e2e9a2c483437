//! # Rosterlink Common Library
//!
//! Shared code for the rosterlink reconciliation workspace:
//! - Error types (Error enum)
//! - Event types (ReconcileEvent enum) and the EventBus
//! - Configuration loading (TOML file + environment overrides)

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};

//! Trellis Store - SQLite persistence for committed layer chains
//!
//! Provides:
//! - Connection helpers and pragmas
//! - Checksummed, idempotent schema migrations
//! - Saving a snapshot's layer chain with the registry and counters, and
//!   loading it back into a fresh `TreeStore`

pub mod db;
pub mod errors;
pub mod migrations;
pub mod persist;

// Re-export key types
pub use errors::Result;
pub use persist::{list_layers, load_snapshot, save_snapshot, LayerRecord, SaveOutcome};

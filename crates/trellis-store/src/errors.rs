//! Error handling for trellis-store
//!
//! Wraps trellis-core ExError with store-specific helpers

use trellis_core::errors::{ExError, ExErrorKind};
use trellis_core::TreeError;
use trellis_core_types::LayerId;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::IntegrityViolation)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Create an integrity error for persisted data that contradicts itself
pub fn integrity(op: &str, message: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::IntegrityViolation)
        .with_op(op.to_string())
        .with_message(message)
}

/// Create an error for a value that has no faithful column encoding
pub fn serialization(op: &str, message: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op(op.to_string())
        .with_message(message)
}

/// Create a not-found error for a layer missing from the database
pub fn layer_not_found(op: &str, layer_id: LayerId) -> ExError {
    ExError::new(ExErrorKind::NotFound)
        .with_op(op.to_string())
        .with_layer_id(layer_id)
        .with_message(format!("Layer {} is not persisted", layer_id))
}

/// Lift a tree error into the store's error type, tagging the operation
pub fn from_tree(op: &str, err: TreeError) -> ExError {
    ExError::from(err).with_op(op.to_string())
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

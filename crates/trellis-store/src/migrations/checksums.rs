//! Checksum validation for migrations
//!
//! Computes SHA256 checksums of migration SQL to detect edits to migrations
//! that were already applied. Line endings are normalized first so a CRLF
//! checkout hashes like the LF original.

use sha2::{Digest, Sha256};

/// Compute the SHA256 checksum of migration SQL
pub fn compute_checksum(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

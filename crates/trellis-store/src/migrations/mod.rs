//! Schema migrations
//!
//! Each embedded migration is applied once, in its own transaction, and its
//! checksum is recorded so an edited migration is refused on the next run.

mod checksums;
mod embedded;
mod runner;

pub use runner::apply_migrations;

//! Structured logging facility for Trellis
//!
//! - Single initialization point via `init(profile)`
//! - Structured logging macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//! - Test capture mode for deterministic assertions
//!
//! # Usage
//!
//! ```rust
//! use trellis_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```
//!
//! Field names follow `trellis_core_types::schema`.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};

//! Core types shared across Trellis crates
//!
//! This crate provides the small vocabulary used by the tree core, the
//! persistence layer and the logging facility:
//!
//! - **Identifiers**: `NodeId`, `LayerId`, `Sym` numeric surrogates
//! - **Correlation types**: RequestId, TraceId, RequestContext
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod ids;
pub mod schema;

pub use correlation::{RequestContext, RequestId, TraceId};
pub use ids::{LayerId, NodeId, Sym};

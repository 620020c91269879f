//! Numeric surrogates used as triple components
//!
//! Every identifier is a plain `u64` wrapped in a newtype so node ids,
//! layer ids and interned symbols cannot be mixed up at call sites.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one tree node
///
/// Allocated from a store-wide monotonic counter and never recycled, even
/// after the node has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Identifier of one layer (committed, open or discarded)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u64);

/// Interned string surrogate handed out by the identifier registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Sym(pub u64);

impl NodeId {
    /// Raw numeric value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl LayerId {
    /// Raw numeric value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Sym {
    /// Raw numeric value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

impl fmt::Display for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

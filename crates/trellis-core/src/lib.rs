//! Trellis Core - ordered trees stored as versioned triples
//!
//! Every node of an XML-like tree (documents, elements, text, comments,
//! processing instructions, attributes, namespace bindings) is encoded as a
//! handful of `(subject, predicate, object)` triples. Triples live in
//! layers: each layer is a delta of additions and removals over an optional
//! parent, so committed versions are cheap immutable snapshots and new
//! versions are written without touching old ones.
//!
//! - `registry`: string <-> surrogate interning
//! - `triple`: triples, patterns, index contract, in-memory index
//! - `codec`: node descriptions <-> triples, predicate vocabulary
//! - `tree`: handles and the `TreeRead`/`TreeWrite` capability traits
//! - `nav`, `mutate`: navigation axes and structural edits
//! - `layer`: layers, snapshots, write handles, the `TreeStore`
//! - `arena`: an unversioned backend used to cross-check semantics

pub mod arena;
pub mod codec;
pub mod digest;
pub mod errors;
pub mod layer;
pub mod logging_facility;
mod mutate;
mod nav;
pub mod registry;
pub mod tree;
pub mod triple;

// Logging macros refer to the schema through this path.
pub use trellis_core_types;

pub use arena::ArenaTree;
pub use codec::{Attribute, Namespace, NodeData, NodeKind};
pub use errors::{ExError, ExErrorKind, Result, TreeError};
pub use layer::{LayerState, Snapshot, TreeStore, WriteHandle};
pub use registry::Registry;
pub use tree::{Children, Handle, TreeRead, TreeWrite};
pub use triple::{Object, Pattern, Triple, TripleSet, TripleSource};
pub use trellis_core_types::{LayerId, NodeId, Sym};

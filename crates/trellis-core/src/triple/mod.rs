//! Triples, access patterns and the index contract
//!
//! A `Triple` is the only unit of storage. Everything a tree node is (its
//! kind, name, value, attributes and its place among its siblings) is a
//! handful of triples with the node as subject.
//!
//! The `TripleSource` trait is the contract the tree core needs from an
//! index: pattern scans and existence checks. `TripleSet` implements it for
//! one delta; `Layer` implements it for a whole parent chain.

mod set;

pub use set::TripleSet;

use serde::{Deserialize, Serialize};
use trellis_core_types::{NodeId, Sym};

/// Object position of a triple
///
/// Either a reference to another node, an interned literal, or a small
/// integer (ordinals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Object {
    Node(NodeId),
    Sym(Sym),
    Int(u64),
}

impl Object {
    /// Smallest object in the derived order
    pub const MIN: Object = Object::Node(NodeId(0));
    /// Largest object in the derived order
    pub const MAX: Object = Object::Int(u64::MAX);

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Object::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_sym(&self) -> Option<Sym> {
        match self {
            Object::Sym(sym) => Some(*sym),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<u64> {
        match self {
            Object::Int(n) => Some(*n),
            _ => None,
        }
    }
}

/// One `(subject, predicate, object)` fact
///
/// The derived order is subject, predicate, object, which is exactly the
/// SPO index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: NodeId,
    pub predicate: Sym,
    pub object: Object,
}

impl Triple {
    pub fn new(subject: NodeId, predicate: Sym, object: Object) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

/// Index an access pattern is answered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexChoice {
    /// Fully bound: membership test, no iteration
    Existence,
    /// Subject and predicate bound: SPO range
    SubjectPredicate,
    /// Subject bound: SPO prefix range (object filtered if bound)
    Subject,
    /// Predicate and object bound: POS range
    PredicateObject,
    /// Predicate bound: POS prefix range
    Predicate,
    /// Nothing usable bound
    FullScan,
}

/// Triple pattern with optional bindings for each position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pattern {
    pub subject: Option<NodeId>,
    pub predicate: Option<Sym>,
    pub object: Option<Object>,
}

impl Pattern {
    /// Pattern matching every triple
    pub fn any() -> Self {
        Self::default()
    }

    pub fn subject(mut self, subject: NodeId) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn predicate(mut self, predicate: Sym) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn object(mut self, object: Object) -> Self {
        self.object = Some(object);
        self
    }

    /// Shorthand for the most common navigation pattern
    pub fn sp(subject: NodeId, predicate: Sym) -> Self {
        Self::any().subject(subject).predicate(predicate)
    }

    /// Shorthand for "all subjects with this predicate/object"
    pub fn po(predicate: Sym, object: Object) -> Self {
        Self::any().predicate(predicate).object(object)
    }

    /// Which index answers this pattern
    ///
    /// Binding both subject and predicate always selects the SPO range;
    /// binding only the predicate (with or without the object) selects POS.
    pub fn index_choice(&self) -> IndexChoice {
        match (self.subject, self.predicate, self.object) {
            (Some(_), Some(_), Some(_)) => IndexChoice::Existence,
            (Some(_), Some(_), None) => IndexChoice::SubjectPredicate,
            (Some(_), None, _) => IndexChoice::Subject,
            (None, Some(_), Some(_)) => IndexChoice::PredicateObject,
            (None, Some(_), None) => IndexChoice::Predicate,
            (None, None, _) => IndexChoice::FullScan,
        }
    }

    /// Fully bound triple, if every position is bound
    pub fn as_triple(&self) -> Option<Triple> {
        Some(Triple::new(self.subject?, self.predicate?, self.object?))
    }

    pub fn matches(&self, triple: &Triple) -> bool {
        self.subject.map_or(true, |s| s == triple.subject)
            && self.predicate.map_or(true, |p| p == triple.predicate)
            && self.object.map_or(true, |o| o == triple.object)
    }
}

/// Index contract required by the tree core
///
/// Implementations must return exactly the triples matching the pattern,
/// each once. Result order is unspecified; callers that need an order
/// (children by ordinal) establish it themselves.
pub trait TripleSource {
    /// All triples matching `pattern`
    fn scan(&self, pattern: &Pattern) -> Vec<Triple>;

    /// Existence check for one fully bound triple
    fn contains(&self, triple: &Triple) -> bool;

    /// Objects of every `(subject, predicate, _)` triple
    fn objects(&self, subject: NodeId, predicate: Sym) -> Vec<Object> {
        self.scan(&Pattern::sp(subject, predicate))
            .into_iter()
            .map(|t| t.object)
            .collect()
    }

    /// Object of a functional `(subject, predicate, _)` triple
    fn object(&self, subject: NodeId, predicate: Sym) -> Option<Object> {
        self.scan(&Pattern::sp(subject, predicate))
            .into_iter()
            .map(|t| t.object)
            .next()
    }
}

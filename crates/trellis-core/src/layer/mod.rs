//! Versioned layers
//!
//! A layer is a delta over an optional parent: the triples it adds and the
//! triples it removes. Effective contents are never materialized during
//! navigation; each scan walks the parent chain from the newest layer down,
//! masking what newer layers removed.

pub mod manager;

pub use manager::{Snapshot, TreeStore, WriteHandle};

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trellis_core_types::LayerId;

use crate::triple::{Pattern, Triple, TripleSet, TripleSource};

/// Lifecycle state of a layer as tracked by its store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerState {
    Open,
    Committed,
    Discarded,
}

/// One delta in a chain of layers
///
/// Invariants maintained by `add`/`retract`:
/// - `additions` and `removals` are disjoint
/// - every addition is absent from the parent's effective set
/// - every removal is present in the parent's effective set
#[derive(Debug)]
pub struct Layer {
    id: LayerId,
    parent: Option<Arc<Layer>>,
    additions: TripleSet,
    removals: TripleSet,
    depth: usize,
    committed_at: Option<DateTime<Utc>>,
}

impl Layer {
    pub(crate) fn open(id: LayerId, parent: Option<Arc<Layer>>) -> Self {
        let depth = parent.as_ref().map_or(0, |p| p.depth + 1);
        Self {
            id,
            parent,
            additions: TripleSet::new(),
            removals: TripleSet::new(),
            depth,
            committed_at: None,
        }
    }

    /// Rebuild a layer from a stored delta
    ///
    /// The delta is taken as is; callers are responsible for it having been
    /// produced against the same parent.
    pub(crate) fn from_delta(
        id: LayerId,
        parent: Option<Arc<Layer>>,
        additions: TripleSet,
        removals: TripleSet,
        committed_at: Option<DateTime<Utc>>,
    ) -> Self {
        let mut layer = Self::open(id, parent);
        layer.additions = additions;
        layer.removals = removals;
        layer.committed_at = committed_at;
        layer
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn parent(&self) -> Option<&Arc<Layer>> {
        self.parent.as_ref()
    }

    /// Number of ancestors (0 for a root layer)
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn additions(&self) -> &TripleSet {
        &self.additions
    }

    pub fn removals(&self) -> &TripleSet {
        &self.removals
    }

    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        self.committed_at
    }

    pub(crate) fn mark_committed(&mut self, at: DateTime<Utc>) {
        self.committed_at = Some(at);
    }

    fn parent_contains(&self, triple: &Triple) -> bool {
        self.parent.as_ref().map_or(false, |p| p.contains(triple))
    }

    /// Make `triple` visible in this layer, keeping the delta minimal
    ///
    /// Returns `false` if it was already visible.
    pub(crate) fn add(&mut self, triple: Triple) -> bool {
        if self.removals.remove(&triple) {
            return true;
        }
        if self.parent_contains(&triple) {
            return false;
        }
        self.additions.insert(triple)
    }

    /// Make `triple` invisible in this layer, keeping the delta minimal
    ///
    /// Returns `false` if it was not visible.
    pub(crate) fn retract(&mut self, triple: &Triple) -> bool {
        if self.additions.remove(triple) {
            return true;
        }
        if self.removals.contains(triple) || !self.parent_contains(triple) {
            return false;
        }
        self.removals.insert(*triple)
    }

    /// This layer followed by its ancestors, newest first
    pub fn chain(&self) -> impl Iterator<Item = &Layer> + '_ {
        std::iter::successors(Some(self), |layer| layer.parent.as_deref())
    }

    /// Whether `ancestor` is this layer or one of its ancestors
    pub fn descends_from(&self, ancestor: LayerId) -> bool {
        self.chain().any(|layer| layer.id == ancestor)
    }

    /// Materialize the effective triple set
    pub fn effective(&self) -> TripleSet {
        self.scan(&Pattern::any()).into_iter().collect()
    }

    /// Net delta of this layer relative to `ancestor`'s effective set
    ///
    /// Returns `(additions, removals)` such that applying them on top of
    /// `ancestor` yields this layer's effective set.
    pub(crate) fn delta_from(&self, ancestor: &Layer) -> (TripleSet, TripleSet) {
        let mine = self.effective();
        let theirs = ancestor.effective();
        let additions = mine.iter().filter(|t| !theirs.contains(t)).copied().collect();
        let removals = theirs.iter().filter(|t| !mine.contains(t)).copied().collect();
        (additions, removals)
    }
}

impl TripleSource for Layer {
    fn scan(&self, pattern: &Pattern) -> Vec<Triple> {
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        let mut masked = HashSet::new();
        for layer in self.chain() {
            for triple in layer.additions.matching(pattern) {
                if !masked.contains(&triple) && seen.insert(triple) {
                    found.push(triple);
                }
            }
            masked.extend(layer.removals.matching(pattern));
        }
        found
    }

    fn contains(&self, triple: &Triple) -> bool {
        for layer in self.chain() {
            if layer.additions.contains(triple) {
                return true;
            }
            if layer.removals.contains(triple) {
                return false;
            }
        }
        false
    }
}

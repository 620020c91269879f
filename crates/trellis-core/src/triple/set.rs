use std::collections::BTreeSet;
use std::ops::Bound::Included;

use trellis_core_types::{NodeId, Sym};

use super::{Object, Pattern, Triple, TripleSource};

/// In-memory multi-index triple set
///
/// Keeps every triple twice: once in SPO order (subject scans) and once in
/// POS order (predicate scans). Both indexes always hold the same triples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripleSet {
    spo: BTreeSet<Triple>,
    pos: BTreeSet<(Sym, Object, NodeId)>,
}

impl TripleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a triple, returning `false` if it was already present
    pub fn insert(&mut self, triple: Triple) -> bool {
        if !self.spo.insert(triple) {
            return false;
        }
        self.pos
            .insert((triple.predicate, triple.object, triple.subject));
        true
    }

    /// Remove a triple, returning `false` if it was absent
    pub fn remove(&mut self, triple: &Triple) -> bool {
        if !self.spo.remove(triple) {
            return false;
        }
        self.pos
            .remove(&(triple.predicate, triple.object, triple.subject));
        true
    }

    pub fn len(&self) -> usize {
        self.spo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spo.is_empty()
    }

    /// All triples in SPO order
    pub fn iter(&self) -> impl Iterator<Item = &Triple> + '_ {
        self.spo.iter()
    }

    /// Lazily yield the triples matching `pattern`
    ///
    /// The arms mirror `Pattern::index_choice`: existence check, SPO range,
    /// SPO prefix, POS range, POS prefix, full scan.
    pub fn matching<'a>(&'a self, pattern: &Pattern) -> Box<dyn Iterator<Item = Triple> + 'a> {
        let pattern = *pattern;
        match (pattern.subject, pattern.predicate, pattern.object) {
            (Some(s), Some(p), Some(o)) => {
                let triple = Triple::new(s, p, o);
                let hit = self.spo.contains(&triple).then_some(triple);
                Box::new(hit.into_iter())
            }
            (Some(s), Some(p), None) => {
                let range = self.spo.range((
                    Included(Triple::new(s, p, Object::MIN)),
                    Included(Triple::new(s, p, Object::MAX)),
                ));
                Box::new(range.copied())
            }
            (Some(s), None, _) => {
                let range = self.spo.range((
                    Included(Triple::new(s, Sym(0), Object::MIN)),
                    Included(Triple::new(s, Sym(u64::MAX), Object::MAX)),
                ));
                Box::new(range.copied().filter(move |t| pattern.matches(t)))
            }
            (None, Some(p), Some(o)) => {
                let range = self
                    .pos
                    .range((Included((p, o, NodeId(0))), Included((p, o, NodeId(u64::MAX)))));
                Box::new(range.map(|&(p, o, s)| Triple::new(s, p, o)))
            }
            (None, Some(p), None) => {
                let range = self.pos.range((
                    Included((p, Object::MIN, NodeId(0))),
                    Included((p, Object::MAX, NodeId(u64::MAX))),
                ));
                Box::new(range.map(|&(p, o, s)| Triple::new(s, p, o)))
            }
            (None, None, _) => Box::new(
                self.spo
                    .iter()
                    .copied()
                    .filter(move |t| pattern.matches(t)),
            ),
        }
    }
}

impl TripleSource for TripleSet {
    fn scan(&self, pattern: &Pattern) -> Vec<Triple> {
        self.matching(pattern).collect()
    }

    fn contains(&self, triple: &Triple) -> bool {
        self.spo.contains(triple)
    }
}

impl FromIterator<Triple> for TripleSet {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut set = TripleSet::new();
        for triple in iter {
            set.insert(triple);
        }
        set
    }
}

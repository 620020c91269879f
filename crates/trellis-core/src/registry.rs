use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use trellis_core_types::Sym;

use crate::errors::{Result, TreeError};

/// Bidirectional string <-> surrogate mapping
///
/// One registry is shared by every layer of a `TreeStore`. It only grows:
/// surrogates are dense, assigned in interning order, and never reused.
/// Readers take a shared lock, so concurrent navigation never waits on
/// another reader.
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<Interned>,
}

#[derive(Debug, Default)]
struct Interned {
    by_text: HashMap<Arc<str>, Sym>,
    by_sym: Vec<Arc<str>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted `(surrogate, text)` pairs
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the surrogates are not exactly `0..n` or a
    /// text appears twice.
    pub fn from_entries(mut entries: Vec<(Sym, String)>) -> Result<Self> {
        entries.sort_by_key(|(sym, _)| *sym);
        let mut interned = Interned::default();
        for (expected, (sym, text)) in entries.into_iter().enumerate() {
            if sym.get() != expected as u64 {
                return Err(TreeError::InvalidInput {
                    reason: format!("registry entries are not dense: expected #{expected}, found {sym}"),
                });
            }
            let text: Arc<str> = Arc::from(text);
            if interned.by_text.insert(text.clone(), sym).is_some() {
                return Err(TreeError::InvalidInput {
                    reason: format!("registry text '{text}' appears twice"),
                });
            }
            interned.by_sym.push(text);
        }
        Ok(Self {
            inner: RwLock::new(interned),
        })
    }

    /// Intern `text`, returning its surrogate
    ///
    /// Idempotent: equal text always yields the same surrogate.
    pub fn intern(&self, text: &str) -> Sym {
        if let Some(sym) = self.lookup(text) {
            return sym;
        }
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        // Another writer may have won the race between the two locks.
        if let Some(sym) = inner.by_text.get(text) {
            return *sym;
        }
        let sym = Sym(inner.by_sym.len() as u64);
        let text: Arc<str> = Arc::from(text);
        inner.by_sym.push(text.clone());
        inner.by_text.insert(text, sym);
        sym
    }

    /// Surrogate of `text` if it was interned, without interning it
    pub fn lookup(&self, text: &str) -> Option<Sym> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_text.get(text).copied()
    }

    /// Text of `sym`, or `None` if it was never interned
    pub fn resolve(&self, sym: Sym) -> Option<Arc<str>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        usize::try_from(sym.get())
            .ok()
            .and_then(|idx| inner.by_sym.get(idx))
            .cloned()
    }

    /// Text of `sym`
    ///
    /// # Errors
    ///
    /// Returns `Resolution` if `sym` was never interned in this registry,
    /// which means a surrogate from another store leaked in or data is
    /// corrupt.
    pub fn try_resolve(&self, sym: Sym) -> Result<Arc<str>> {
        self.resolve(sym).ok_or(TreeError::Resolution { sym })
    }

    /// Number of interned strings
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_sym.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All `(surrogate, text)` pairs in surrogate order
    pub fn entries(&self) -> Vec<(Sym, Arc<str>)> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .by_sym
            .iter()
            .enumerate()
            .map(|(idx, text)| (Sym(idx as u64), text.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let registry = Registry::new();
        let a = registry.intern("book");
        let b = registry.intern("book");
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_surrogates_are_dense() {
        let registry = Registry::new();
        assert_eq!(registry.intern("a"), Sym(0));
        assert_eq!(registry.intern("b"), Sym(1));
        assert_eq!(registry.intern("a"), Sym(0));
        assert_eq!(registry.intern("c"), Sym(2));
    }

    #[test]
    fn test_resolve_round_trip() {
        let registry = Registry::new();
        let sym = registry.intern("XPath Guide");
        assert_eq!(registry.resolve(sym).as_deref(), Some("XPath Guide"));
    }

    #[test]
    fn test_unknown_sym_is_resolution_error() {
        let registry = Registry::new();
        registry.intern("only");
        let result = registry.try_resolve(Sym(99));
        assert_eq!(result, Err(TreeError::Resolution { sym: Sym(99) }));
    }

    #[test]
    fn test_lookup_does_not_intern() {
        let registry = Registry::new();
        assert_eq!(registry.lookup("missing"), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_from_entries_preserves_surrogates() {
        let registry = Registry::new();
        registry.intern("x");
        registry.intern("y");
        let entries = registry
            .entries()
            .into_iter()
            .map(|(sym, text)| (sym, text.to_string()))
            .collect();

        let rebuilt = Registry::from_entries(entries).unwrap();
        assert_eq!(rebuilt.lookup("y"), Some(Sym(1)));
        assert_eq!(rebuilt.intern("z"), Sym(2));
    }

    #[test]
    fn test_from_entries_rejects_gaps() {
        let result = Registry::from_entries(vec![(Sym(0), "a".into()), (Sym(2), "b".into())]);
        assert!(matches!(result, Err(TreeError::InvalidInput { .. })));
    }
}

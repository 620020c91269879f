//! Navigation over a layered triple set
//!
//! `TripleView` answers `TreeRead` for one layer by translating each axis
//! into index scans:
//!
//! - children: `(n, hasChild, ?)` then each child's `childIndex`
//! - parent: `(n, parentOf, ?)`
//! - child at ordinal: `(c, childIndex, k)` existence checks
//! - documents: `(?, kind, document)`
//! - elements by name: `(?, name, sym)` then a `kind` check
//!
//! `Snapshot` and `WriteHandle` delegate their `TreeRead` impls here.

use trellis_core_types::{LayerId, NodeId};

use crate::codec::{Codec, NodeData, NodeKind};
use crate::errors::{Result, TreeError};
use crate::layer::manager::Shared;
use crate::layer::Layer;
use crate::triple::{Object, Pattern, Triple, TripleSource};
use crate::tree::{document_order, Children, Handle, TreeRead};

pub(crate) struct TripleView<'a> {
    layer: &'a Layer,
    shared: &'a Shared,
}

impl<'a> TripleView<'a> {
    pub(crate) fn new(layer: &'a Layer, shared: &'a Shared) -> Self {
        Self { layer, shared }
    }

    pub(crate) fn codec(&self) -> Codec<'a> {
        Codec::new(&self.shared.registry, &self.shared.vocab)
    }

    fn here(&self, node: NodeId) -> Handle {
        Handle::new(self.layer.id(), node)
    }

    /// Whether `node` is a tree node of this layer
    ///
    /// Attribute and namespace nodes have a `kind` triple too, but they are
    /// reached through their owner and never through a handle.
    pub(crate) fn exists(&self, node: NodeId) -> bool {
        matches!(self.codec().kind(self.layer, node), Ok(Some(kind)) if !kind.is_owned())
    }

    /// Error for a handle that does not belong to this layer
    pub(crate) fn foreign(&self, h: Handle) -> TreeError {
        TreeError::StaleHandle {
            node_id: h.node,
            handle_layer: h.layer,
            layer_id: self.layer.id(),
            state: self.shared.state(h.layer),
        }
    }

    fn resolve(&self, h: Handle) -> Result<NodeId> {
        if h.layer != self.layer.id() {
            return Err(self.foreign(h));
        }
        if !self.exists(h.node) {
            return Err(TreeError::NotFound {
                node_id: h.node,
                layer_id: self.layer.id(),
            });
        }
        Ok(h.node)
    }

    pub(crate) fn parent_of(&self, node: NodeId) -> Result<Option<NodeId>> {
        let parents = self.layer.objects(node, self.shared.vocab.parent_of);
        match parents.as_slice() {
            [] => Ok(None),
            [Object::Node(p)] => Ok(Some(*p)),
            _ => Err(TreeError::Internal {
                message: format!("{node} has malformed parent links {parents:?}"),
            }),
        }
    }

    pub(crate) fn ordinal_of(&self, node: NodeId) -> Result<Option<u32>> {
        match self.layer.object(node, self.shared.vocab.child_index) {
            None => Ok(None),
            Some(Object::Int(k)) => u32::try_from(k).map(Some).map_err(|_| TreeError::Internal {
                message: format!("{node} has out-of-range ordinal {k}"),
            }),
            Some(other) => Err(TreeError::Internal {
                message: format!("{node} has malformed ordinal {other:?}"),
            }),
        }
    }

    /// Children of `node` sorted by ordinal
    pub(crate) fn child_ids(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let mut keyed = Vec::new();
        for object in self.layer.objects(node, self.shared.vocab.has_child) {
            let Some(child) = object.as_node() else {
                return Err(TreeError::Internal {
                    message: format!("{node} has non-node child {object:?}"),
                });
            };
            let ordinal = self.ordinal_of(child)?.ok_or_else(|| TreeError::Internal {
                message: format!("child {child} of {node} has no ordinal"),
            })?;
            keyed.push((ordinal, child));
        }
        keyed.sort_unstable();
        Ok(keyed.into_iter().map(|(_, c)| c).collect())
    }
}

impl TreeRead for TripleView<'_> {
    fn layer_id(&self) -> LayerId {
        self.layer.id()
    }

    fn node(&self, id: NodeId) -> Result<Handle> {
        self.resolve(self.here(id)).map(|node| self.here(node))
    }

    fn decode(&self, h: Handle) -> Result<NodeData> {
        let node = self.resolve(h)?;
        self.codec().decode(self.layer, node, self.layer.id())
    }

    fn kind(&self, h: Handle) -> Result<NodeKind> {
        let node = self.resolve(h)?;
        self.codec()
            .kind(self.layer, node)?
            .ok_or(TreeError::NotFound {
                node_id: node,
                layer_id: self.layer.id(),
            })
    }

    fn children(&self, h: Handle) -> Result<Children> {
        let node = self.resolve(h)?;
        let ids = self.child_ids(node)?;
        Ok(Children::new(ids.into_iter().map(|c| self.here(c)).collect()))
    }

    fn child_at(&self, h: Handle, ordinal: u32) -> Result<Option<Handle>> {
        let node = self.resolve(h)?;
        let v = &self.shared.vocab;
        let wanted = Object::Int(u64::from(ordinal));
        let found = self
            .layer
            .objects(node, v.has_child)
            .into_iter()
            .filter_map(|o| o.as_node())
            .find(|c| self.layer.contains(&Triple::new(*c, v.child_index, wanted)));
        Ok(found.map(|c| self.here(c)))
    }

    fn child_count(&self, h: Handle) -> Result<usize> {
        let node = self.resolve(h)?;
        Ok(self
            .layer
            .scan(&Pattern::sp(node, self.shared.vocab.has_child))
            .len())
    }

    fn parent(&self, h: Handle) -> Result<Option<Handle>> {
        let node = self.resolve(h)?;
        Ok(self.parent_of(node)?.map(|p| self.here(p)))
    }

    fn ordinal(&self, h: Handle) -> Result<Option<u32>> {
        let node = self.resolve(h)?;
        self.ordinal_of(node)
    }

    fn documents(&self) -> Vec<Handle> {
        let v = &self.shared.vocab;
        let document = Object::Sym(v.kind_sym(NodeKind::Document));
        let mut found: Vec<Handle> = self
            .layer
            .scan(&Pattern::po(v.kind, document))
            .into_iter()
            .map(|t| self.here(t.subject))
            .collect();
        found.sort();
        found
    }

    fn elements_named(&self, name: &str) -> Result<Vec<Handle>> {
        // A name that was never interned cannot be stored anywhere.
        let Some(sym) = self.shared.registry.lookup(name) else {
            return Ok(Vec::new());
        };
        let v = &self.shared.vocab;
        let element = Object::Sym(v.kind_sym(NodeKind::Element));
        let found = self
            .layer
            .scan(&Pattern::po(v.name, Object::Sym(sym)))
            .into_iter()
            .filter(|t| self.layer.contains(&Triple::new(t.subject, v.kind, element)))
            .map(|t| self.here(t.subject))
            .collect();
        document_order(self, found)
    }

    fn attribute(&self, h: Handle, name: &str) -> Result<Option<String>> {
        let node = self.resolve(h)?;
        Ok(self
            .codec()
            .find_attribute(self.layer, node, name)?
            .map(|(_, value)| value))
    }
}

//! Handles and the backend capability traits
//!
//! Navigation and mutation are written against `TreeRead` / `TreeWrite`
//! only. The layered triple store (`Snapshot`, `WriteHandle`) and the arena
//! test backend (`ArenaTree`) both implement them.

mod write;

pub use write::TreeWrite;

use std::fmt;

use serde::{Deserialize, Serialize};
use trellis_core_types::{LayerId, NodeId};

use crate::codec::{NodeData, NodeKind};
use crate::errors::{Result, TreeError};

/// Reference to a node as seen through one layer
///
/// Cheap to copy and never owns storage. Two handles are equal only if both
/// the layer and the node match, so a handle from a parent snapshot is not
/// interchangeable with one from its child layer (see `TreeWrite::adopt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle {
    pub layer: LayerId,
    pub node: NodeId,
}

impl Handle {
    pub fn new(layer: LayerId, node: NodeId) -> Self {
        Self { layer, node }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.node, self.layer)
    }
}

/// Ordered children of one node
///
/// Always in ordinal order. Cloning yields an independent iterator over the
/// remaining children, so a clone taken before iteration restarts the walk.
///
/// The handles are collected when the iterator is built: storage order is
/// not ordinal order, so every `hasChild` triple has to be read and sorted
/// before the first child is known. Laziness is in the consumer, which may
/// stop early without decoding any child.
#[derive(Debug, Clone)]
pub struct Children {
    inner: std::vec::IntoIter<Handle>,
}

impl Children {
    pub fn new(ordered: Vec<Handle>) -> Self {
        Self {
            inner: ordered.into_iter(),
        }
    }

    /// Remaining children without consuming them
    pub fn as_slice(&self) -> &[Handle] {
        self.inner.as_slice()
    }
}

impl Iterator for Children {
    type Item = Handle;

    fn next(&mut self) -> Option<Handle> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for Children {
    fn next_back(&mut self) -> Option<Handle> {
        self.inner.next_back()
    }
}

impl ExactSizeIterator for Children {}

/// Read capability of a tree backend
///
/// Every method taking a `Handle` fails with `StaleHandle` if the handle
/// belongs to another layer and with `NotFound` if the node does not exist
/// in this one. Axes with default bodies are derived from the primitive
/// lookups; backends override them only for speed.
pub trait TreeRead {
    /// Layer that handles produced by this reader belong to
    fn layer_id(&self) -> LayerId;

    /// Handle for a node id known to exist in this layer
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` has no `kind` in this layer.
    fn node(&self, id: NodeId) -> Result<Handle>;

    /// Logical description of a node
    ///
    /// # Errors
    ///
    /// See the trait docs.
    fn decode(&self, h: Handle) -> Result<NodeData>;

    /// # Errors
    ///
    /// See the trait docs.
    fn kind(&self, h: Handle) -> Result<NodeKind>;

    /// Children in ordinal order
    ///
    /// # Errors
    ///
    /// See the trait docs.
    fn children(&self, h: Handle) -> Result<Children>;

    /// Child at `ordinal`, if there is one
    ///
    /// # Errors
    ///
    /// See the trait docs.
    fn child_at(&self, h: Handle, ordinal: u32) -> Result<Option<Handle>>;

    /// Parent of the node, `None` for roots and detached nodes
    ///
    /// # Errors
    ///
    /// See the trait docs.
    fn parent(&self, h: Handle) -> Result<Option<Handle>>;

    /// Position among siblings, `None` if the node has no parent
    ///
    /// # Errors
    ///
    /// See the trait docs.
    fn ordinal(&self, h: Handle) -> Result<Option<u32>>;

    /// Every document node in this layer, by node id
    fn documents(&self) -> Vec<Handle>;

    /// Elements called `name`, in document order
    ///
    /// # Errors
    ///
    /// Propagates lookup errors from ordering the matches.
    fn elements_named(&self, name: &str) -> Result<Vec<Handle>>;

    /// # Errors
    ///
    /// See the trait docs.
    fn child_count(&self, h: Handle) -> Result<usize> {
        Ok(self.children(h)?.len())
    }

    /// # Errors
    ///
    /// See the trait docs.
    fn first_child(&self, h: Handle) -> Result<Option<Handle>> {
        self.child_at(h, 0)
    }

    /// # Errors
    ///
    /// See the trait docs.
    fn last_child(&self, h: Handle) -> Result<Option<Handle>> {
        Ok(self.children(h)?.next_back())
    }

    /// Ancestors, nearest first
    ///
    /// # Errors
    ///
    /// See the trait docs.
    fn ancestors(&self, h: Handle) -> Result<Vec<Handle>> {
        let mut found = Vec::new();
        let mut current = self.parent(h)?;
        while let Some(p) = current {
            found.push(p);
            current = self.parent(p)?;
        }
        Ok(found)
    }

    /// Topmost ancestor, or the node itself if it has no parent
    ///
    /// # Errors
    ///
    /// See the trait docs.
    fn root(&self, h: Handle) -> Result<Handle> {
        Ok(self.ancestors(h)?.pop().unwrap_or(h))
    }

    /// Descendants in pre-order (document order), excluding the node
    ///
    /// # Errors
    ///
    /// See the trait docs.
    fn descendants(&self, h: Handle) -> Result<Vec<Handle>> {
        let mut found = Vec::new();
        let mut stack: Vec<Handle> = self.children(h)?.rev().collect();
        while let Some(next) = stack.pop() {
            found.push(next);
            stack.extend(self.children(next)?.rev());
        }
        Ok(found)
    }

    /// # Errors
    ///
    /// See the trait docs.
    fn descendants_or_self(&self, h: Handle) -> Result<Vec<Handle>> {
        let mut found = vec![h];
        found.extend(self.descendants(h)?);
        Ok(found)
    }

    /// Later siblings, in document order
    ///
    /// # Errors
    ///
    /// See the trait docs.
    fn following_siblings(&self, h: Handle) -> Result<Vec<Handle>> {
        let Some((parent, ordinal)) = self.position(h)? else {
            return Ok(Vec::new());
        };
        Ok(self.children(parent)?.skip(ordinal as usize + 1).collect())
    }

    /// Earlier siblings, nearest first
    ///
    /// # Errors
    ///
    /// See the trait docs.
    fn preceding_siblings(&self, h: Handle) -> Result<Vec<Handle>> {
        let Some((parent, ordinal)) = self.position(h)? else {
            return Ok(Vec::new());
        };
        Ok(self
            .children(parent)?
            .take(ordinal as usize)
            .rev()
            .collect())
    }

    /// # Errors
    ///
    /// See the trait docs.
    fn next_sibling(&self, h: Handle) -> Result<Option<Handle>> {
        match self.position(h)? {
            Some((parent, ordinal)) => self.child_at(parent, ordinal + 1),
            None => Ok(None),
        }
    }

    /// # Errors
    ///
    /// See the trait docs.
    fn previous_sibling(&self, h: Handle) -> Result<Option<Handle>> {
        match self.position(h)? {
            Some((parent, ordinal)) if ordinal > 0 => self.child_at(parent, ordinal - 1),
            _ => Ok(None),
        }
    }

    /// Parent and ordinal together
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the node has a parent but no ordinal.
    fn position(&self, h: Handle) -> Result<Option<(Handle, u32)>> {
        let Some(parent) = self.parent(h)? else {
            return Ok(None);
        };
        match self.ordinal(h)? {
            Some(ordinal) => Ok(Some((parent, ordinal))),
            None => Err(TreeError::Internal {
                message: format!("{} has a parent but no ordinal", h.node),
            }),
        }
    }

    /// Value of attribute `name` on the node
    ///
    /// # Errors
    ///
    /// See the trait docs.
    fn attribute(&self, h: Handle, name: &str) -> Result<Option<String>> {
        Ok(self.decode(h)?.attribute(name).map(str::to_owned))
    }

    /// String value of the node
    ///
    /// Documents and elements concatenate their descendant text nodes in
    /// document order; other kinds return their own value.
    ///
    /// # Errors
    ///
    /// See the trait docs.
    fn string_value(&self, h: Handle) -> Result<String> {
        match self.kind(h)? {
            NodeKind::Document | NodeKind::Element => {
                let mut value = String::new();
                for d in self.descendants(h)? {
                    if self.kind(d)? == NodeKind::Text {
                        value.push_str(self.decode(d)?.value.as_deref().unwrap_or_default());
                    }
                }
                Ok(value)
            }
            _ => Ok(self.decode(h)?.value.unwrap_or_default()),
        }
    }
}

/// Sort handles into document order
///
/// Nodes in different trees are ordered by root node id.
///
/// # Errors
///
/// Propagates lookup errors of `reader`.
pub fn document_order<T: TreeRead + ?Sized>(reader: &T, handles: Vec<Handle>) -> Result<Vec<Handle>> {
    let mut keyed = Vec::with_capacity(handles.len());
    for h in handles {
        let mut path = vec![reader.ordinal(h)?.unwrap_or(0)];
        let mut root = h;
        for a in reader.ancestors(h)? {
            path.push(reader.ordinal(a)?.unwrap_or(0));
            root = a;
        }
        // The root itself has no ordinal.
        path.pop();
        path.reverse();
        keyed.push(((root.node, path), h));
    }
    keyed.sort();
    Ok(keyed.into_iter().map(|(_, h)| h).collect())
}

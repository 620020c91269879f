//! Arena-of-indices backend
//!
//! A plain in-memory tree with no versioning: nodes live in a `Vec` indexed
//! by node id, children are id lists, parents are back-pointers. It exists
//! to pin down `TreeRead`/`TreeWrite` semantics independently of the triple
//! encoding; the conformance tests run the same scenarios against both.

use std::sync::atomic::{AtomicU64, Ordering};

use trellis_core_types::{LayerId, NodeId};

use crate::codec::{Attribute, NodeData, NodeKind};
use crate::errors::{Result, TreeError};
use crate::mutate::{self, Structure};
use crate::tree::{document_order, Children, Handle, TreeRead, TreeWrite};

// Arena layer ids count down from the top so they never meet store ids.
static NEXT_ARENA: AtomicU64 = AtomicU64::new(u64::MAX);

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
pub struct ArenaTree {
    id: LayerId,
    slots: Vec<Option<Slot>>,
}

impl Default for ArenaTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ArenaTree {
    pub fn new() -> Self {
        Self {
            id: LayerId(NEXT_ARENA.fetch_sub(1, Ordering::Relaxed)),
            // Slot 0 stays empty so node ids start at 1 like in a store.
            slots: vec![None],
        }
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, node: NodeId) -> Option<&Slot> {
        usize::try_from(node.get())
            .ok()
            .and_then(|i| self.slots.get(i))
            .and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, node: NodeId) -> Option<&mut Slot> {
        usize::try_from(node.get())
            .ok()
            .and_then(|i| self.slots.get_mut(i))
            .and_then(Option::as_mut)
    }

    fn here(&self, node: NodeId) -> Handle {
        Handle::new(self.id, node)
    }

    fn stale(&self, h: Handle) -> TreeError {
        TreeError::StaleHandle {
            node_id: h.node,
            handle_layer: h.layer,
            layer_id: self.id,
            state: None,
        }
    }

    fn get(&self, h: Handle) -> Result<&Slot> {
        if h.layer != self.id {
            return Err(self.stale(h));
        }
        self.slot(h.node).ok_or(TreeError::NotFound {
            node_id: h.node,
            layer_id: self.id,
        })
    }

    fn element_mut(&mut self, h: Handle) -> Result<&mut Slot> {
        let node = self.live(h)?;
        let layer_id = self.id;
        let slot = self.slot_mut(node).ok_or(TreeError::NotFound {
            node_id: node,
            layer_id,
        })?;
        if slot.data.kind != NodeKind::Element {
            return Err(TreeError::InvalidInput {
                reason: format!(
                    "{node} is a {} node; only elements carry attributes",
                    slot.data.kind.as_str()
                ),
            });
        }
        Ok(slot)
    }
}

impl TreeRead for ArenaTree {
    fn layer_id(&self) -> LayerId {
        self.id
    }

    fn node(&self, id: NodeId) -> Result<Handle> {
        let h = self.here(id);
        self.get(h).map(|_| h)
    }

    fn decode(&self, h: Handle) -> Result<NodeData> {
        Ok(self.get(h)?.data.clone())
    }

    fn kind(&self, h: Handle) -> Result<NodeKind> {
        Ok(self.get(h)?.data.kind)
    }

    fn children(&self, h: Handle) -> Result<Children> {
        let slot = self.get(h)?;
        Ok(Children::new(
            slot.children.iter().map(|c| self.here(*c)).collect(),
        ))
    }

    fn child_at(&self, h: Handle, ordinal: u32) -> Result<Option<Handle>> {
        let slot = self.get(h)?;
        Ok(slot
            .children
            .get(ordinal as usize)
            .map(|c| self.here(*c)))
    }

    fn parent(&self, h: Handle) -> Result<Option<Handle>> {
        Ok(self.get(h)?.parent.map(|p| self.here(p)))
    }

    fn ordinal(&self, h: Handle) -> Result<Option<u32>> {
        let Some(parent) = self.get(h)?.parent else {
            return Ok(None);
        };
        let siblings = &self.get(self.here(parent))?.children;
        let position = siblings
            .iter()
            .position(|c| *c == h.node)
            .ok_or_else(|| TreeError::Internal {
                message: format!("{} is missing from its parent's children", h.node),
            })?;
        Ok(Some(position as u32))
    }

    fn documents(&self) -> Vec<Handle> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                s.as_ref()
                    .filter(|s| s.data.kind == NodeKind::Document)
                    .map(|_| self.here(NodeId(i as u64)))
            })
            .collect()
    }

    fn elements_named(&self, name: &str) -> Result<Vec<Handle>> {
        let found = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                s.as_ref()
                    .filter(|s| s.data.kind == NodeKind::Element && s.data.name.as_deref() == Some(name))
                    .map(|_| self.here(NodeId(i as u64)))
            })
            .collect();
        document_order(self, found)
    }
}

impl Structure for ArenaTree {
    fn live(&self, h: Handle) -> Result<NodeId> {
        if h.layer != self.id || self.slot(h.node).is_none() {
            return Err(self.stale(h));
        }
        Ok(h.node)
    }

    fn relink(&mut self, parent: NodeId, before: &[NodeId], after: &[NodeId]) {
        for c in before.iter().filter(|c| !after.contains(c)) {
            if let Some(slot) = self.slot_mut(*c) {
                slot.parent = None;
            }
        }
        for c in after.iter().filter(|c| !before.contains(c)) {
            if let Some(slot) = self.slot_mut(*c) {
                slot.parent = Some(parent);
            }
        }
        if let Some(slot) = self.slot_mut(parent) {
            slot.children = after.to_vec();
        }
    }

    fn purge(&mut self, node: NodeId) {
        if let Some(slot) = usize::try_from(node.get())
            .ok()
            .and_then(|i| self.slots.get_mut(i))
        {
            *slot = None;
        }
    }
}

impl TreeWrite for ArenaTree {
    fn create(&mut self, data: NodeData) -> Result<Handle> {
        data.validate()?;
        let node = NodeId(self.slots.len() as u64);
        self.slots.push(Some(Slot {
            data: data.normalized(),
            parent: None,
            children: Vec::new(),
        }));
        Ok(self.here(node))
    }

    fn append(&mut self, parent: Handle, child: Handle) -> Result<()> {
        mutate::append(self, parent, child)
    }

    fn prepend(&mut self, parent: Handle, child: Handle) -> Result<()> {
        mutate::prepend(self, parent, child)
    }

    fn insert_before(&mut self, reference: Handle, child: Handle) -> Result<()> {
        mutate::insert_beside(self, reference, child, false)
    }

    fn insert_after(&mut self, reference: Handle, child: Handle) -> Result<()> {
        mutate::insert_beside(self, reference, child, true)
    }

    fn detach(&mut self, node: Handle) -> Result<()> {
        mutate::detach(self, node)
    }

    fn remove(&mut self, node: Handle) -> Result<()> {
        mutate::remove(self, node)
    }

    fn remove_subtree(&mut self, node: Handle) -> Result<()> {
        mutate::remove_subtree(self, node)
    }

    fn set_attribute(&mut self, node: Handle, name: &str, value: &str) -> Result<()> {
        let slot = self.element_mut(node)?;
        if name.is_empty() {
            return Err(TreeError::InvalidInput {
                reason: "attribute names must not be empty".to_string(),
            });
        }
        let attributes = &mut slot.data.attributes;
        attributes.retain(|a| a.name != name);
        attributes.push(Attribute {
            name: name.to_string(),
            value: value.to_string(),
        });
        attributes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(())
    }

    fn remove_attribute(&mut self, node: Handle, name: &str) -> Result<bool> {
        let slot = self.element_mut(node)?;
        let before = slot.data.attributes.len();
        slot.data.attributes.retain(|a| a.name != name);
        Ok(slot.data.attributes.len() != before)
    }

    fn adopt(&self, h: Handle) -> Result<Handle> {
        let h = Handle::new(self.id, h.node);
        self.live(h).map(|_| h)
    }
}

//! Structural edits shared by every backend
//!
//! Backends provide three primitives through `Structure`: resolving a live
//! node, replacing one parent's ordered child list, and purging a node's own
//! facts. Every edit here validates against the current tree first and only
//! then calls the primitives, so a rejected edit writes nothing.

use trellis_core_types::NodeId;

use crate::errors::{Result, TreeError};
use crate::tree::{Handle, TreeRead};

pub(crate) trait Structure: TreeRead {
    /// Node id behind `h` if it is live in this open layer
    ///
    /// Fails with `StaleHandle` otherwise.
    fn live(&self, h: Handle) -> Result<NodeId>;

    /// Replace `parent`'s child list `before` by `after`
    ///
    /// `before` is the current list in ordinal order. Nodes only in `before`
    /// end up unattached, nodes only in `after` must be unattached, and every
    /// node in `after` gets its position as ordinal.
    fn relink(&mut self, parent: NodeId, before: &[NodeId], after: &[NodeId]);

    /// Delete every fact about an unattached, childless node
    fn purge(&mut self, node: NodeId);
}

fn here<T: Structure + ?Sized>(tree: &T, node: NodeId) -> Handle {
    Handle::new(tree.layer_id(), node)
}

fn child_ids<T: Structure + ?Sized>(tree: &T, node: NodeId) -> Result<Vec<NodeId>> {
    Ok(tree.children(here(tree, node))?.map(|h| h.node).collect())
}

fn parent_id<T: Structure + ?Sized>(tree: &T, node: NodeId) -> Result<Option<NodeId>> {
    Ok(tree.parent(here(tree, node))?.map(|h| h.node))
}

fn check_attach<T: Structure + ?Sized>(tree: &T, parent: NodeId, child: NodeId) -> Result<()> {
    let cycle = parent == child
        || tree
            .ancestors(here(tree, parent))?
            .iter()
            .any(|a| a.node == child);
    if cycle {
        return Err(TreeError::Cycle {
            parent_id: parent,
            child_id: child,
        });
    }

    if let Some(current) = parent_id(tree, child)? {
        return Err(TreeError::AlreadyAttached {
            child_id: child,
            current_parent_id: current,
        });
    }

    let parent_kind = tree.kind(here(tree, parent))?;
    let child_kind = tree.kind(here(tree, child))?;
    if !parent_kind.can_have_children() || !child_kind.can_be_child() {
        return Err(TreeError::InvalidChild {
            parent_kind,
            child_kind,
        });
    }
    Ok(())
}

fn insert_at<T: Structure + ?Sized>(tree: &mut T, parent: NodeId, child: NodeId, index: Slot) -> Result<()> {
    check_attach(tree, parent, child)?;
    let before = child_ids(tree, parent)?;
    let index = match index {
        Slot::First => 0,
        Slot::Last => before.len(),
        Slot::At(i) => i.min(before.len()),
    };
    let mut after = before.clone();
    after.insert(index, child);
    tree.relink(parent, &before, &after);
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    First,
    Last,
    At(usize),
}

pub(crate) fn append<T: Structure + ?Sized>(tree: &mut T, parent: Handle, child: Handle) -> Result<()> {
    let parent = tree.live(parent)?;
    let child = tree.live(child)?;
    insert_at(tree, parent, child, Slot::Last)
}

pub(crate) fn prepend<T: Structure + ?Sized>(tree: &mut T, parent: Handle, child: Handle) -> Result<()> {
    let parent = tree.live(parent)?;
    let child = tree.live(child)?;
    insert_at(tree, parent, child, Slot::First)
}

/// Insert `child` next to `reference`, before it or after it
pub(crate) fn insert_beside<T: Structure + ?Sized>(
    tree: &mut T,
    reference: Handle,
    child: Handle,
    after: bool,
) -> Result<()> {
    let reference = tree.live(reference)?;
    let child = tree.live(child)?;
    let Some((parent, ordinal)) = tree.position(here(tree, reference))? else {
        return Err(TreeError::NotAttached { node_id: reference });
    };
    let index = ordinal as usize + usize::from(after);
    insert_at(tree, parent.node, child, Slot::At(index))
}

pub(crate) fn detach<T: Structure + ?Sized>(tree: &mut T, node: Handle) -> Result<()> {
    let node = tree.live(node)?;
    let Some(parent) = parent_id(tree, node)? else {
        return Err(TreeError::NotAttached { node_id: node });
    };
    let before = child_ids(tree, parent)?;
    let after: Vec<NodeId> = before.iter().copied().filter(|c| *c != node).collect();
    tree.relink(parent, &before, &after);
    Ok(())
}

/// Delete `node` and splice its children into its former slot
pub(crate) fn remove<T: Structure + ?Sized>(tree: &mut T, node: Handle) -> Result<()> {
    let node = tree.live(node)?;
    let Some(parent) = parent_id(tree, node)? else {
        return Err(TreeError::NotAttached { node_id: node });
    };
    let orphans = child_ids(tree, node)?;
    let siblings = child_ids(tree, parent)?;

    let mut spliced = Vec::with_capacity(siblings.len() + orphans.len());
    for sibling in &siblings {
        if *sibling == node {
            spliced.extend_from_slice(&orphans);
        } else {
            spliced.push(*sibling);
        }
    }

    tree.relink(node, &orphans, &[]);
    tree.relink(parent, &siblings, &spliced);
    tree.purge(node);
    Ok(())
}

/// Delete `node` and all of its descendants
pub(crate) fn remove_subtree<T: Structure + ?Sized>(tree: &mut T, node: Handle) -> Result<()> {
    let node = tree.live(node)?;
    let mut doomed = Vec::new();
    for h in tree.descendants_or_self(here(tree, node))? {
        doomed.push((h.node, child_ids(tree, h.node)?));
    }
    let parent = parent_id(tree, node)?;
    let siblings = match parent {
        Some(p) => child_ids(tree, p)?,
        None => Vec::new(),
    };

    if let Some(parent) = parent {
        let after: Vec<NodeId> = siblings.iter().copied().filter(|c| *c != node).collect();
        tree.relink(parent, &siblings, &after);
    }
    for (id, children) in doomed {
        tree.relink(id, &children, &[]);
        tree.purge(id);
    }
    Ok(())
}

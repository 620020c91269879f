use crate::codec::NodeData;
use crate::errors::Result;

use super::{Handle, TreeRead};

/// Write capability of a tree backend
///
/// Every method validates completely before changing anything, so an
/// error leaves the tree exactly as it was. Unknown nodes and handles of
/// other layers fail with `StaleHandle`.
///
/// Attachment checks run in a fixed order: cycle, then existing parent,
/// then the kind rules (only documents and elements have children;
/// documents, attributes and namespaces are never children).
pub trait TreeWrite: TreeRead {
    /// Create an unattached node
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` or `DuplicateAttribute` for a malformed
    /// description.
    fn create(&mut self, data: NodeData) -> Result<Handle>;

    /// Attach `child` as the last child of `parent`
    ///
    /// # Errors
    ///
    /// - `Cycle` if `child` is `parent` or one of its ancestors
    /// - `AlreadyAttached` if `child` has a parent
    /// - `InvalidChild` if the kinds do not allow the edge
    fn append(&mut self, parent: Handle, child: Handle) -> Result<()>;

    /// Attach `child` as the first child of `parent`
    ///
    /// # Errors
    ///
    /// As [`TreeWrite::append`].
    fn prepend(&mut self, parent: Handle, child: Handle) -> Result<()>;

    /// Attach `child` immediately before `reference`
    ///
    /// # Errors
    ///
    /// `NotAttached` if `reference` has no parent, otherwise as
    /// [`TreeWrite::append`].
    fn insert_before(&mut self, reference: Handle, child: Handle) -> Result<()>;

    /// Attach `child` immediately after `reference`
    ///
    /// # Errors
    ///
    /// As [`TreeWrite::insert_before`].
    fn insert_after(&mut self, reference: Handle, child: Handle) -> Result<()>;

    /// Unlink a node from its parent, keeping its subtree intact
    ///
    /// # Errors
    ///
    /// `NotAttached` if the node has no parent.
    fn detach(&mut self, node: Handle) -> Result<()>;

    /// Delete a node, moving its children into its place
    ///
    /// # Errors
    ///
    /// `NotAttached` if the node has no parent.
    fn remove(&mut self, node: Handle) -> Result<()>;

    /// Delete a node and everything below it
    ///
    /// # Errors
    ///
    /// `StaleHandle` if the node is not live in this layer.
    fn remove_subtree(&mut self, node: Handle) -> Result<()>;

    /// Set or replace one attribute of an element
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the node is not an element or `name` is empty.
    fn set_attribute(&mut self, node: Handle, name: &str, value: &str) -> Result<()>;

    /// Remove one attribute of an element, returning whether it existed
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the node is not an element.
    fn remove_attribute(&mut self, node: Handle, name: &str) -> Result<bool>;

    /// Rebind a handle from an ancestor layer to this one
    ///
    /// # Errors
    ///
    /// `StaleHandle` if the node does not exist in this layer.
    fn adopt(&self, h: Handle) -> Result<Handle>;
}

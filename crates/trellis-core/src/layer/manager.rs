//! Layer lifecycle: open, edit, commit or discard
//!
//! A `TreeStore` owns what every layer of one store shares: the registry,
//! the node and layer counters, and the lifecycle state of every layer it
//! has handed out. `WriteHandle` is the single writer of one open layer;
//! committing it yields an immutable, `Arc`-shared `Snapshot`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use trellis_core_types::{LayerId, NodeId, RequestContext};

use super::{Layer, LayerState};
use crate::codec::{Codec, NodeData, NodeKind, Vocabulary};
use crate::digest::digest;
use crate::errors::{Result, TreeError};
use crate::mutate::{self, Structure};
use crate::nav::TripleView;
use crate::registry::Registry;
use crate::tree::{Children, Handle, TreeRead, TreeWrite};
use crate::triple::{Object, Pattern, Triple, TripleSet, TripleSource};
use crate::{log_op_end, log_op_start};

// Layer ids are unique per process, not per store, so a handle can never
// be mistaken for one of another store's layers.
static NEXT_LAYER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) registry: Registry,
    pub(crate) vocab: Vocabulary,
    next_node: AtomicU64,
    /// Lifecycle of every layer this store produced. Entries are never
    /// evicted: a handle of any past layer must keep reporting its state.
    states: Mutex<HashMap<LayerId, LayerState>>,
}

impl Shared {
    pub(crate) fn state(&self, id: LayerId) -> Option<LayerState> {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.get(&id).copied()
    }

    fn set_state(&self, id: LayerId, state: LayerState) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.insert(id, state);
    }

    fn alloc_node(&self) -> NodeId {
        NodeId(self.next_node.fetch_add(1, Ordering::Relaxed))
    }

    fn alloc_layer(&self) -> LayerId {
        LayerId(NEXT_LAYER.fetch_add(1, Ordering::Relaxed))
    }

    /// Make sure no layer id up to `id` is ever allocated again
    fn reserve_layers_through(&self, id: LayerId) {
        NEXT_LAYER.fetch_max(id.get().saturating_add(1), Ordering::Relaxed);
    }
}

/// Trace id for log fields, empty when the caller supplied none
fn trace_of(context: &RequestContext) -> &str {
    context.trace_id.as_ref().map_or("", |t| t.as_str())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Shared state of one family of layers
///
/// Cheap to clone; clones refer to the same store.
#[derive(Debug, Clone)]
pub struct TreeStore {
    shared: Arc<Shared>,
}

impl Default for TreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeStore {
    /// Empty store with a freshly seeded registry
    pub fn new() -> Self {
        Self::resume(Registry::new(), NodeId(1), LayerId(1))
    }

    /// Store continuing from persisted state
    ///
    /// `next_node` is the first node id the store will hand out. Layer ids
    /// come from a process-wide sequence; `next_layer` only guarantees that
    /// ids below it are never handed out again. The vocabulary is seeded
    /// into `registry` if it is missing.
    pub fn resume(registry: Registry, next_node: NodeId, next_layer: LayerId) -> Self {
        let vocab = Vocabulary::seed(&registry);
        let shared = Shared {
            registry,
            vocab,
            next_node: AtomicU64::new(next_node.get().max(1)),
            states: Mutex::new(HashMap::new()),
        };
        if next_layer.get() > 1 {
            shared.reserve_layers_through(LayerId(next_layer.get() - 1));
        }
        Self {
            shared: Arc::new(shared),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.shared.vocab
    }

    /// Next node id this store would allocate, and the next layer id of
    /// the process
    pub fn counters(&self) -> (NodeId, LayerId) {
        (
            NodeId(self.shared.next_node.load(Ordering::Relaxed)),
            LayerId(NEXT_LAYER.load(Ordering::Relaxed)),
        )
    }

    pub fn layer_state(&self, id: LayerId) -> Option<LayerState> {
        self.shared.state(id)
    }

    fn check_owned(&self, snapshot: &Snapshot) -> Result<()> {
        if Arc::ptr_eq(&self.shared, &snapshot.shared) {
            Ok(())
        } else {
            Err(TreeError::InvalidInput {
                reason: format!("snapshot {} belongs to another store", snapshot.id()),
            })
        }
    }

    /// Open a writable layer on top of `parent` (or an empty base)
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `parent` was produced by another store.
    pub fn open_layer(&self, parent: Option<&Snapshot>) -> Result<WriteHandle> {
        self.open_layer_with_context(parent, RequestContext::new())
    }

    /// As [`TreeStore::open_layer`], tagging log events with `context`
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `parent` was produced by another store.
    pub fn open_layer_with_context(
        &self,
        parent: Option<&Snapshot>,
        context: RequestContext,
    ) -> Result<WriteHandle> {
        if let Some(parent) = parent {
            self.check_owned(parent)?;
        }
        Ok(WriteHandle::open(
            self.shared.clone(),
            parent.map(|p| p.layer.clone()),
            context,
        ))
    }

    /// Same as [`WriteHandle::commit`]
    pub fn commit(&self, handle: WriteHandle) -> Snapshot {
        handle.commit()
    }

    /// Same as [`WriteHandle::discard`]
    pub fn discard(&self, handle: WriteHandle) {
        handle.discard()
    }

    /// Register a committed layer rebuilt from a persisted delta
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `parent` belongs to another store or `id` is
    ///   already known to this store
    pub fn import_layer(
        &self,
        parent: Option<&Snapshot>,
        id: LayerId,
        additions: TripleSet,
        removals: TripleSet,
        committed_at: Option<DateTime<Utc>>,
    ) -> Result<Snapshot> {
        if let Some(parent) = parent {
            self.check_owned(parent)?;
        }
        if self.shared.state(id).is_some() {
            return Err(TreeError::InvalidInput {
                reason: format!("layer {id} is already registered"),
            });
        }
        self.shared.reserve_layers_through(id);
        let max_node = additions
            .iter()
            .chain(removals.iter())
            .flat_map(|t| [Some(t.subject), t.object.as_node()])
            .flatten()
            .max();
        if let Some(max_node) = max_node {
            self.shared
                .next_node
                .fetch_max(max_node.get() + 1, Ordering::Relaxed);
        }

        let layer = Layer::from_delta(
            id,
            parent.map(|p| p.layer.clone()),
            additions,
            removals,
            committed_at,
        );
        self.shared.set_state(id, LayerState::Committed);
        Ok(Snapshot {
            layer: Arc::new(layer),
            shared: self.shared.clone(),
        })
    }
}

/// Committed, immutable view of a layer chain
///
/// Clones share the same layers. Everything reachable from a snapshot is
/// frozen, so readers on any thread see a consistent tree while other
/// layers are being written.
#[derive(Debug, Clone)]
pub struct Snapshot {
    layer: Arc<Layer>,
    shared: Arc<Shared>,
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.layer, &other.layer)
    }
}

impl Eq for Snapshot {}

impl Snapshot {
    pub fn id(&self) -> LayerId {
        self.layer.id()
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn store(&self) -> TreeStore {
        TreeStore {
            shared: self.shared.clone(),
        }
    }

    pub fn parent(&self) -> Option<Snapshot> {
        self.layer.parent().map(|p| Snapshot {
            layer: p.clone(),
            shared: self.shared.clone(),
        })
    }

    pub fn depth(&self) -> usize {
        self.layer.depth()
    }

    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        self.layer.committed_at()
    }

    /// `(additions, removals)` of this layer's own delta
    pub fn delta_sizes(&self) -> (usize, usize) {
        (self.layer.additions().len(), self.layer.removals().len())
    }

    /// This snapshot and its ancestors, root first
    pub fn lineage(&self) -> Vec<Snapshot> {
        let mut chain: Vec<Snapshot> = std::iter::successors(Some(self.clone()), Snapshot::parent).collect();
        chain.reverse();
        chain
    }

    /// Effective triples in SPO order
    pub fn triples(&self) -> Vec<Triple> {
        let mut triples = self.layer.scan(&Pattern::any());
        triples.sort_unstable();
        triples
    }

    /// Content digest of the effective triple set
    ///
    /// # Errors
    ///
    /// Returns `Resolution` if a stored surrogate is missing from the
    /// registry.
    pub fn digest(&self) -> Result<String> {
        digest(self.layer.as_ref(), &self.shared.registry)
    }

    fn view(&self) -> TripleView<'_> {
        TripleView::new(&self.layer, &self.shared)
    }

    /// Open a writable child layer
    pub fn open_child(&self) -> WriteHandle {
        WriteHandle::open(
            self.shared.clone(),
            Some(self.layer.clone()),
            RequestContext::new(),
        )
    }

    /// Parentless copy of the effective contents under a new layer id
    pub fn squash(&self) -> Snapshot {
        let started = Instant::now();
        let id = self.shared.alloc_layer();
        log_op_start!("squash", layer_id = self.id().get(), target_layer_id = id.get());

        let layer = Layer::from_delta(
            id,
            None,
            self.layer.effective(),
            TripleSet::new(),
            Some(Utc::now()),
        );
        self.shared.set_state(id, LayerState::Committed);
        let added = layer.additions().len();

        log_op_end!(
            "squash",
            duration_ms = elapsed_ms(started),
            layer_id = id.get(),
            added = added
        );
        Snapshot {
            layer: Arc::new(layer),
            shared: self.shared.clone(),
        }
    }

    /// Collapse every layer between `ancestor` and this one into one layer
    ///
    /// The result has `ancestor` as parent and the net difference as delta,
    /// so it reads exactly like `self`.
    ///
    /// # Errors
    ///
    /// Returns `UnrelatedLayer` if `ancestor` is not in this chain.
    pub fn rollup_to(&self, ancestor: &Snapshot) -> Result<Snapshot> {
        let started = Instant::now();
        log_op_start!(
            "rollup",
            layer_id = self.id().get(),
            parent_layer_id = ancestor.id().get()
        );
        if !Arc::ptr_eq(&self.shared, &ancestor.shared) || !self.layer.descends_from(ancestor.id()) {
            let err = TreeError::UnrelatedLayer {
                layer_id: self.id(),
                ancestor: ancestor.id(),
            };
            crate::log_op_error!("rollup", err.clone(), duration_ms = elapsed_ms(started));
            return Err(err);
        }

        let (additions, removals) = self.layer.delta_from(&ancestor.layer);
        let id = self.shared.alloc_layer();
        let layer = Layer::from_delta(
            id,
            Some(ancestor.layer.clone()),
            additions,
            removals,
            Some(Utc::now()),
        );
        self.shared.set_state(id, LayerState::Committed);

        log_op_end!(
            "rollup",
            duration_ms = elapsed_ms(started),
            layer_id = id.get(),
            added = layer.additions().len(),
            removed = layer.removals().len()
        );
        Ok(Snapshot {
            layer: Arc::new(layer),
            shared: self.shared.clone(),
        })
    }
}

impl TreeRead for Snapshot {
    fn layer_id(&self) -> LayerId {
        self.id()
    }

    fn node(&self, id: NodeId) -> Result<Handle> {
        self.view().node(id)
    }

    fn decode(&self, h: Handle) -> Result<NodeData> {
        self.view().decode(h)
    }

    fn kind(&self, h: Handle) -> Result<NodeKind> {
        self.view().kind(h)
    }

    fn children(&self, h: Handle) -> Result<Children> {
        self.view().children(h)
    }

    fn child_at(&self, h: Handle, ordinal: u32) -> Result<Option<Handle>> {
        self.view().child_at(h, ordinal)
    }

    fn child_count(&self, h: Handle) -> Result<usize> {
        self.view().child_count(h)
    }

    fn parent(&self, h: Handle) -> Result<Option<Handle>> {
        self.view().parent(h)
    }

    fn ordinal(&self, h: Handle) -> Result<Option<u32>> {
        self.view().ordinal(h)
    }

    fn documents(&self) -> Vec<Handle> {
        self.view().documents()
    }

    fn elements_named(&self, name: &str) -> Result<Vec<Handle>> {
        self.view().elements_named(name)
    }

    fn attribute(&self, h: Handle, name: &str) -> Result<Option<String>> {
        self.view().attribute(h, name)
    }
}

/// Single writer of one open layer
///
/// Not `Clone`. `commit` and `discard` consume the handle; dropping it
/// without either discards the layer.
#[derive(Debug)]
pub struct WriteHandle {
    layer: Layer,
    shared: Arc<Shared>,
    context: RequestContext,
    finished: bool,
}

impl WriteHandle {
    fn open(shared: Arc<Shared>, parent: Option<Arc<Layer>>, context: RequestContext) -> Self {
        let id = shared.alloc_layer();
        let parent_id = parent.as_ref().map(|p| p.id().get());
        shared.set_state(id, LayerState::Open);
        tracing::debug!(
            op = "open_layer",
            layer_id = id.get(),
            parent_layer_id = ?parent_id,
            request_id = %context.request_id,
            trace_id = trace_of(&context),
            "layer opened"
        );
        Self {
            layer: Layer::open(id, parent),
            shared,
            context,
            finished: false,
        }
    }

    pub fn id(&self) -> LayerId {
        self.layer.id()
    }

    pub fn parent_id(&self) -> Option<LayerId> {
        self.layer.parent().map(|p| p.id())
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// `(additions, removals)` written so far
    pub fn delta_sizes(&self) -> (usize, usize) {
        (self.layer.additions().len(), self.layer.removals().len())
    }

    /// Freeze the layer and publish it as a snapshot
    pub fn commit(mut self) -> Snapshot {
        let started = Instant::now();
        let id = self.layer.id();
        let (added, removed) = self.delta_sizes();
        log_op_start!(
            "commit",
            layer_id = id.get(),
            request_id = %self.context.request_id,
            trace_id = trace_of(&self.context)
        );

        let mut layer = std::mem::replace(&mut self.layer, Layer::open(id, None));
        layer.mark_committed(Utc::now());
        self.finished = true;
        self.shared.set_state(id, LayerState::Committed);
        let snapshot = Snapshot {
            layer: Arc::new(layer),
            shared: self.shared.clone(),
        };

        log_op_end!(
            "commit",
            duration_ms = elapsed_ms(started),
            layer_id = id.get(),
            added = added,
            removed = removed,
            request_id = %self.context.request_id,
            trace_id = trace_of(&self.context)
        );
        snapshot
    }

    /// Drop every change made in this layer
    pub fn discard(mut self) {
        self.finish_discarded();
    }

    fn finish_discarded(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.shared.set_state(self.layer.id(), LayerState::Discarded);
        tracing::debug!(
            op = "discard",
            layer_id = self.layer.id().get(),
            request_id = %self.context.request_id,
            "layer discarded"
        );
    }

    fn view(&self) -> TripleView<'_> {
        TripleView::new(&self.layer, &self.shared)
    }

    fn codec(&self) -> Codec<'_> {
        Codec::new(&self.shared.registry, &self.shared.vocab)
    }

    fn traced<T>(
        &mut self,
        op: &'static str,
        target: Handle,
        edit: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let result = edit(self);
        let layer_id = self.layer.id().get();
        match &result {
            Ok(_) => tracing::debug!(op, layer_id, node_id = target.node.get(), "edit applied"),
            Err(err) => tracing::debug!(
                op,
                layer_id,
                node_id = target.node.get(),
                err_code = err.kind().code(),
                "edit rejected: {err}"
            ),
        }
        result
    }

    fn require_element(&self, node: NodeId) -> Result<()> {
        let kind = self.view().kind(Handle::new(self.layer.id(), node))?;
        if kind == NodeKind::Element {
            Ok(())
        } else {
            Err(TreeError::InvalidInput {
                reason: format!("{node} is a {} node; only elements carry attributes", kind.as_str()),
            })
        }
    }
}

impl Drop for WriteHandle {
    fn drop(&mut self) {
        self.finish_discarded();
    }
}

impl TreeRead for WriteHandle {
    fn layer_id(&self) -> LayerId {
        self.id()
    }

    fn node(&self, id: NodeId) -> Result<Handle> {
        self.view().node(id)
    }

    fn decode(&self, h: Handle) -> Result<NodeData> {
        self.view().decode(h)
    }

    fn kind(&self, h: Handle) -> Result<NodeKind> {
        self.view().kind(h)
    }

    fn children(&self, h: Handle) -> Result<Children> {
        self.view().children(h)
    }

    fn child_at(&self, h: Handle, ordinal: u32) -> Result<Option<Handle>> {
        self.view().child_at(h, ordinal)
    }

    fn child_count(&self, h: Handle) -> Result<usize> {
        self.view().child_count(h)
    }

    fn parent(&self, h: Handle) -> Result<Option<Handle>> {
        self.view().parent(h)
    }

    fn ordinal(&self, h: Handle) -> Result<Option<u32>> {
        self.view().ordinal(h)
    }

    fn documents(&self) -> Vec<Handle> {
        self.view().documents()
    }

    fn elements_named(&self, name: &str) -> Result<Vec<Handle>> {
        self.view().elements_named(name)
    }

    fn attribute(&self, h: Handle, name: &str) -> Result<Option<String>> {
        self.view().attribute(h, name)
    }
}

impl Structure for WriteHandle {
    fn live(&self, h: Handle) -> Result<NodeId> {
        let view = self.view();
        if h.layer != self.layer.id() {
            return Err(view.foreign(h));
        }
        if !view.exists(h.node) {
            return Err(TreeError::StaleHandle {
                node_id: h.node,
                handle_layer: h.layer,
                layer_id: self.layer.id(),
                state: Some(LayerState::Open),
            });
        }
        Ok(h.node)
    }

    fn relink(&mut self, parent: NodeId, before: &[NodeId], after: &[NodeId]) {
        let v = &self.shared.vocab;
        let old: HashMap<NodeId, usize> = before.iter().enumerate().map(|(i, c)| (*c, i)).collect();
        let new: HashMap<NodeId, usize> = after.iter().enumerate().map(|(i, c)| (*c, i)).collect();
        let ordinal = |c: NodeId, i: usize| Triple::new(c, v.child_index, Object::Int(i as u64));

        for (i, &c) in before.iter().enumerate() {
            match new.get(&c) {
                None => {
                    self.layer.retract(&Triple::new(parent, v.has_child, Object::Node(c)));
                    self.layer.retract(&Triple::new(c, v.parent_of, Object::Node(parent)));
                    self.layer.retract(&ordinal(c, i));
                }
                Some(&j) if j != i => {
                    self.layer.retract(&ordinal(c, i));
                }
                Some(_) => {}
            }
        }
        for (j, &c) in after.iter().enumerate() {
            match old.get(&c) {
                None => {
                    self.layer.add(Triple::new(parent, v.has_child, Object::Node(c)));
                    self.layer.add(Triple::new(c, v.parent_of, Object::Node(parent)));
                    self.layer.add(ordinal(c, j));
                }
                Some(&i) if i != j => {
                    self.layer.add(ordinal(c, j));
                }
                Some(_) => {}
            }
        }
    }

    fn purge(&mut self, node: NodeId) {
        let footprint = self.codec().footprint(&self.layer, node);
        for triple in &footprint {
            self.layer.retract(triple);
        }
    }
}

impl TreeWrite for WriteHandle {
    fn create(&mut self, data: NodeData) -> Result<Handle> {
        let layer_id = self.layer.id();
        let codec = Codec::new(&self.shared.registry, &self.shared.vocab);
        let shared = &self.shared;
        let created = codec.encode_new(&data, || shared.alloc_node());
        match created {
            Ok((node, triples)) => {
                for triple in triples {
                    self.layer.add(triple);
                }
                tracing::debug!(
                    op = "create",
                    layer_id = layer_id.get(),
                    node_id = node.get(),
                    kind = data.kind.as_str(),
                    "node created"
                );
                Ok(Handle::new(layer_id, node))
            }
            Err(err) => {
                tracing::debug!(
                    op = "create",
                    layer_id = layer_id.get(),
                    err_code = err.kind().code(),
                    "edit rejected: {err}"
                );
                Err(err)
            }
        }
    }

    fn append(&mut self, parent: Handle, child: Handle) -> Result<()> {
        self.traced("append", child, |w| mutate::append(w, parent, child))
    }

    fn prepend(&mut self, parent: Handle, child: Handle) -> Result<()> {
        self.traced("prepend", child, |w| mutate::prepend(w, parent, child))
    }

    fn insert_before(&mut self, reference: Handle, child: Handle) -> Result<()> {
        self.traced("insert_before", child, |w| {
            mutate::insert_beside(w, reference, child, false)
        })
    }

    fn insert_after(&mut self, reference: Handle, child: Handle) -> Result<()> {
        self.traced("insert_after", child, |w| {
            mutate::insert_beside(w, reference, child, true)
        })
    }

    fn detach(&mut self, node: Handle) -> Result<()> {
        self.traced("detach", node, |w| mutate::detach(w, node))
    }

    fn remove(&mut self, node: Handle) -> Result<()> {
        self.traced("remove", node, |w| mutate::remove(w, node))
    }

    fn remove_subtree(&mut self, node: Handle) -> Result<()> {
        self.traced("remove_subtree", node, |w| mutate::remove_subtree(w, node))
    }

    fn set_attribute(&mut self, node: Handle, name: &str, value: &str) -> Result<()> {
        self.traced("set_attribute", node, |w| {
            let id = w.live(node)?;
            w.require_element(id)?;
            if name.is_empty() {
                return Err(TreeError::InvalidInput {
                    reason: "attribute names must not be empty".to_string(),
                });
            }
            let existing = w.codec().find_attribute(&w.layer, id, name)?;
            let v = &w.shared.vocab;
            let codec = Codec::new(&w.shared.registry, v);
            match existing {
                Some((_, current)) if current == value => {}
                Some((attr, _)) => {
                    for old in w.layer.scan(&Pattern::sp(attr, v.attribute_value)) {
                        w.layer.retract(&old);
                    }
                    let value = Object::Sym(w.shared.registry.intern(value));
                    w.layer.add(Triple::new(attr, v.attribute_value, value));
                }
                None => {
                    let attr = w.shared.alloc_node();
                    for triple in codec.attribute_triples(id, attr, name, value) {
                        w.layer.add(triple);
                    }
                }
            }
            Ok(())
        })
    }

    fn remove_attribute(&mut self, node: Handle, name: &str) -> Result<bool> {
        self.traced("remove_attribute", node, |w| {
            let id = w.live(node)?;
            w.require_element(id)?;
            let Some((attr, _)) = w.codec().find_attribute(&w.layer, id, name)? else {
                return Ok(false);
            };
            let mut doomed = w.layer.scan(&Pattern::any().subject(attr));
            doomed.push(Triple::new(id, w.shared.vocab.has_attribute, Object::Node(attr)));
            for triple in &doomed {
                w.layer.retract(triple);
            }
            Ok(true)
        })
    }

    fn adopt(&self, h: Handle) -> Result<Handle> {
        let view = self.view();
        if !self.layer.descends_from(h.layer) {
            return Err(view.foreign(h));
        }
        if !view.exists(h.node) {
            return Err(TreeError::StaleHandle {
                node_id: h.node,
                handle_layer: h.layer,
                layer_id: self.layer.id(),
                state: Some(LayerState::Open),
            });
        }
        Ok(Handle::new(self.layer.id(), h.node))
    }
}

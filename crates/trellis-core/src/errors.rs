use thiserror::Error;
use trellis_core_types::{LayerId, NodeId, Sym};

use crate::layer::LayerState;
use crate::codec::NodeKind;

/// Result type alias using TreeError
pub type Result<T> = std::result::Result<T, TreeError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Stable classification of every error surfaced by Trellis. Each kind maps
/// to a stable code usable by tests, log sinks and outer API layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Lookup
    NotFound,
    Resolution,

    // Handles and layers
    StaleHandle,
    UnrelatedLayer,

    // Structural
    CycleDetected,
    AlreadyAttached,
    NotAttached,
    InvalidChild,

    // Validation
    InvalidInput,
    DuplicateAttribute,

    // Persistence (trellis-store)
    Persistence,
    Serialization,
    IntegrityViolation,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Resolution => "ERR_RESOLUTION",
            ExErrorKind::StaleHandle => "ERR_STALE_HANDLE",
            ExErrorKind::UnrelatedLayer => "ERR_UNRELATED_LAYER",
            ExErrorKind::CycleDetected => "ERR_CYCLE_DETECTED",
            ExErrorKind::AlreadyAttached => "ERR_ALREADY_ATTACHED",
            ExErrorKind::NotAttached => "ERR_NOT_ATTACHED",
            ExErrorKind::InvalidChild => "ERR_INVALID_CHILD",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::DuplicateAttribute => "ERR_DUPLICATE_ATTRIBUTE",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::IntegrityViolation => "ERR_INTEGRITY_VIOLATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification plus optional context for log sinks and callers
/// sitting above the tree core (the persistence crate returns it directly).
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    node_id: Option<NodeId>,
    layer_id: Option<LayerId>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            node_id: None,
            layer_id: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add node context
    pub fn with_node_id(mut self, id: NodeId) -> Self {
        self.node_id = Some(id);
        self
    }

    /// Add layer context
    pub fn with_layer_id(mut self, id: LayerId) -> Self {
        self.layer_id = Some(id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn node_id(&self) -> Option<NodeId> {
        self.node_id
    }

    pub fn layer_id(&self) -> Option<LayerId> {
        self.layer_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(node_id) = self.node_id {
            write!(f, " (node_id: {})", node_id)?;
        }
        if let Some(layer_id) = self.layer_id {
            write!(f, " (layer_id: {})", layer_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Error taxonomy for tree operations
///
/// Every variant is returned to the immediate caller. Nothing is retried
/// internally: each failure is either caller misuse or absent data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    // ===== Lookup Errors =====
    /// No `kind` triple exists for the node in the reachable layers
    #[error("Node not found: {node_id} in layer {layer_id}")]
    NotFound { node_id: NodeId, layer_id: LayerId },

    /// A surrogate was never interned in this store
    #[error("Identifier {sym} was never interned")]
    Resolution { sym: Sym },

    // ===== Handle Errors =====
    /// Write against a handle that is unknown to the open layer or that
    /// belongs to a layer which is no longer open
    #[error("Stale handle: node {node_id} of layer {handle_layer} used against layer {layer_id} ({state:?})")]
    StaleHandle {
        node_id: NodeId,
        handle_layer: LayerId,
        layer_id: LayerId,
        state: Option<LayerState>,
    },

    /// Rollup target is not an ancestor of the layer
    #[error("Layer {ancestor} is not an ancestor of layer {layer_id}")]
    UnrelatedLayer { layer_id: LayerId, ancestor: LayerId },

    // ===== Structural Errors =====
    /// Attachment would make a node its own ancestor
    #[error("Cycle detected: attaching {child_id} under {parent_id} would create a cycle")]
    Cycle { parent_id: NodeId, child_id: NodeId },

    /// Node already has a parent and must be detached first
    #[error("Node {child_id} is already attached to {current_parent_id}")]
    AlreadyAttached {
        child_id: NodeId,
        current_parent_id: NodeId,
    },

    /// Operation needs a parent but the node has none
    #[error("Node {node_id} is not attached to a parent")]
    NotAttached { node_id: NodeId },

    /// Parent/child kind combination is not a valid tree edge
    #[error("A {child_kind:?} node cannot be a child of a {parent_kind:?} node")]
    InvalidChild {
        parent_kind: NodeKind,
        child_kind: NodeKind,
    },

    // ===== Validation Errors =====
    /// Node description is malformed for its kind
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Attribute name repeated on one element
    #[error("Duplicate attribute '{name}'")]
    DuplicateAttribute { name: String },

    // ===== Generic Errors =====
    /// Stored triples contradict an invariant (e.g. a node with two parents)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl TreeError {
    /// Canonical kind of this error
    pub fn kind(&self) -> ExErrorKind {
        match self {
            TreeError::NotFound { .. } => ExErrorKind::NotFound,
            TreeError::Resolution { .. } => ExErrorKind::Resolution,
            TreeError::StaleHandle { .. } => ExErrorKind::StaleHandle,
            TreeError::UnrelatedLayer { .. } => ExErrorKind::UnrelatedLayer,
            TreeError::Cycle { .. } => ExErrorKind::CycleDetected,
            TreeError::AlreadyAttached { .. } => ExErrorKind::AlreadyAttached,
            TreeError::NotAttached { .. } => ExErrorKind::NotAttached,
            TreeError::InvalidChild { .. } => ExErrorKind::InvalidChild,
            TreeError::InvalidInput { .. } => ExErrorKind::InvalidInput,
            TreeError::DuplicateAttribute { .. } => ExErrorKind::DuplicateAttribute,
            TreeError::Internal { .. } => ExErrorKind::Internal,
        }
    }
}

/// Conversion from TreeError to ExError
///
/// Keeps the thiserror message as the ExError message and lifts the ids
/// into structured context.
impl From<TreeError> for ExError {
    fn from(err: TreeError) -> Self {
        let base = ExError::new(err.kind()).with_message(err.to_string());
        match err {
            TreeError::NotFound { node_id, layer_id } => {
                base.with_node_id(node_id).with_layer_id(layer_id)
            }
            TreeError::StaleHandle {
                node_id, layer_id, ..
            } => base.with_node_id(node_id).with_layer_id(layer_id),
            TreeError::UnrelatedLayer { layer_id, .. } => base.with_layer_id(layer_id),
            TreeError::Cycle { child_id, .. } => base.with_node_id(child_id),
            TreeError::AlreadyAttached { child_id, .. } => base.with_node_id(child_id),
            TreeError::NotAttached { node_id } => base.with_node_id(node_id),
            TreeError::Resolution { .. }
            | TreeError::InvalidChild { .. }
            | TreeError::InvalidInput { .. }
            | TreeError::DuplicateAttribute { .. }
            | TreeError::Internal { .. } => base,
        }
    }
}

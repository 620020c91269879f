//! Canonical schema constants for structured logging
//!
//! Log events emitted by the tree core and the store use these keys so that
//! sinks and test captures can match on them without string drift.

// Canonical field keys
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_TRACE_ID: &str = "trace_id";

// Entity identifiers
pub const FIELD_LAYER_ID: &str = "layer_id";
pub const FIELD_PARENT_LAYER_ID: &str = "parent_layer_id";
pub const FIELD_NODE_ID: &str = "node_id";
pub const FIELD_ORDINAL: &str = "ordinal";

// Delta sizes
pub const FIELD_ADDED: &str = "added";
pub const FIELD_REMOVED: &str = "removed";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

//! Layer chain persistence
//!
//! A saved chain is the registry, the store counters, one `layers` row per
//! committed layer and its delta rows in `layer_triples`. Layers are written
//! once and never updated: saving a chain whose ancestors are already stored
//! only writes the new layers.

#![allow(clippy::result_large_err)]

mod hydration;
mod save;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trellis_core::{Object, Triple};
use trellis_core_types::{LayerId, NodeId, Sym};

use crate::errors::{integrity, serialization, Result};

pub use hydration::{list_layers, load_snapshot};
pub use save::{save_snapshot, SaveOutcome};

const NEXT_NODE: &str = "next_node";
const NEXT_LAYER: &str = "next_layer";

/// Metadata row of one persisted layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub layer_id: LayerId,
    pub parent_layer_id: Option<LayerId>,
    pub depth: usize,
    pub committed_at: Option<DateTime<Utc>>,
    pub digest: String,
    pub added: usize,
    pub removed: usize,
}

/// Delta side of a stored triple row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Remove,
}

impl Op {
    fn as_str(self) -> &'static str {
        match self {
            Op::Add => "add",
            Op::Remove => "remove",
        }
    }
}

fn to_sql(op: &str, value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| serialization(op, format!("{value} does not fit an SQLite integer")))
}

fn from_sql(op: &str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| integrity(op, format!("negative id {value} in database")))
}

/// Column form of a triple: subject, predicate, object tag, object
fn triple_columns(op: &str, triple: &Triple) -> Result<(i64, i64, &'static str, i64)> {
    let (tag, object) = match triple.object {
        Object::Node(n) => ("node", n.get()),
        Object::Sym(s) => ("sym", s.get()),
        Object::Int(i) => ("int", i),
    };
    Ok((
        to_sql(op, triple.subject.get())?,
        to_sql(op, triple.predicate.get())?,
        tag,
        to_sql(op, object)?,
    ))
}

fn triple_from_columns(op: &str, subject: i64, predicate: i64, tag: &str, object: i64) -> Result<Triple> {
    let raw = from_sql(op, object)?;
    let object = match tag {
        "node" => Object::Node(NodeId(raw)),
        "sym" => Object::Sym(Sym(raw)),
        "int" => Object::Int(raw),
        other => return Err(integrity(op, format!("unknown object tag '{other}'"))),
    };
    Ok(Triple::new(
        NodeId(from_sql(op, subject)?),
        Sym(from_sql(op, predicate)?),
        object,
    ))
}

//! Content digests of layers
//!
//! Every effective triple is rendered as one canonical JSON line with its
//! surrogates resolved to text, the lines are sorted, and the SHA-256 of
//! the newline-joined result is the digest. Equal effective content yields
//! equal digests however the layers are stacked, squashed or rolled up.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::{Result, TreeError};
use crate::registry::Registry;
use crate::triple::{Object, Pattern, Triple, TripleSource};

#[derive(Serialize)]
struct Row {
    s: u64,
    p: String,
    o: RenderedObject,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum RenderedObject {
    Node(u64),
    Sym(String),
    Int(u64),
}

fn render(triple: &Triple, registry: &Registry) -> Result<String> {
    let o = match triple.object {
        Object::Node(id) => RenderedObject::Node(id.get()),
        Object::Sym(sym) => RenderedObject::Sym(registry.try_resolve(sym)?.to_string()),
        Object::Int(n) => RenderedObject::Int(n),
    };
    let row = Row {
        s: triple.subject.get(),
        p: registry.try_resolve(triple.predicate)?.to_string(),
        o,
    };
    serde_json::to_string(&row).map_err(|e| TreeError::Internal {
        message: format!("failed to render {triple:?}: {e}"),
    })
}

/// SHA-256 hex digest of the effective triples of `src`
///
/// # Errors
///
/// Returns `Resolution` if a surrogate is missing from `registry`.
pub fn digest<S: TripleSource + ?Sized>(src: &S, registry: &Registry) -> Result<String> {
    let mut lines = src
        .scan(&Pattern::any())
        .iter()
        .map(|t| render(t, registry))
        .collect::<Result<Vec<_>>>()?;
    lines.sort_unstable();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    Ok(hex::encode(hasher.finalize()))
}

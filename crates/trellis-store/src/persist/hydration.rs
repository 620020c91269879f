//! Hydration - rebuilds snapshots from SQLite
//!
//! Loading a layer builds a fresh `TreeStore` whose registry has the same
//! surrogates as the saving store and whose counters start past everything
//! ever saved, then imports the chain root first and checks each digest.

use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use trellis_core::{log_op_end, log_op_error, log_op_start};
use trellis_core::{Registry, Snapshot, TreeStore, TripleSet};
use trellis_core_types::{LayerId, NodeId, Sym};

use super::{from_sql, to_sql, triple_from_columns, LayerRecord, NEXT_LAYER, NEXT_NODE};
use crate::errors::{from_rusqlite, from_tree, integrity, layer_not_found, Result};

const OP: &str = "load_snapshot";

const LAYER_COLUMNS: &str = "layer_id, parent_layer_id, depth, committed_at, digest, added, removed";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, Option<i64>, i64, Option<i64>, String, i64, i64)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn to_record(
    op: &str,
    (layer_id, parent, depth, committed_at, digest, added, removed): (i64, Option<i64>, i64, Option<i64>, String, i64, i64),
) -> Result<LayerRecord> {
    let committed_at = match committed_at {
        Some(ms) => Some(
            DateTime::<Utc>::from_timestamp_millis(ms)
                .ok_or_else(|| integrity(op, format!("timestamp {ms} is out of range")))?,
        ),
        None => None,
    };
    let usize_of = |v: i64| -> Result<usize> {
        usize::try_from(from_sql(op, v)?).map_err(|_| integrity(op, format!("{v} overflows usize")))
    };
    Ok(LayerRecord {
        layer_id: LayerId(from_sql(op, layer_id)?),
        parent_layer_id: parent.map(|p| from_sql(op, p)).transpose()?.map(LayerId),
        depth: usize_of(depth)?,
        committed_at,
        digest,
        added: usize_of(added)?,
        removed: usize_of(removed)?,
    })
}

/// Every persisted layer, ordered by id
///
/// # Errors
///
/// Returns `Persistence` on SQL failures and `IntegrityViolation` for rows
/// that cannot be decoded.
pub fn list_layers(conn: &Connection) -> Result<Vec<LayerRecord>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {LAYER_COLUMNS} FROM layers ORDER BY layer_id"))
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], record_from_row)
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    rows.into_iter().map(|row| to_record("list_layers", row)).collect()
}

fn layer_record(conn: &Connection, layer_id: LayerId) -> Result<Option<LayerRecord>> {
    let row = conn
        .query_row(
            &format!("SELECT {LAYER_COLUMNS} FROM layers WHERE layer_id = ?1"),
            [to_sql(OP, layer_id.get())?],
            record_from_row,
        )
        .optional()
        .map_err(from_rusqlite)?;
    row.map(|row| to_record(OP, row)).transpose()
}

/// Records from `layer_id` up to its root, root first
fn chain_records(conn: &Connection, layer_id: LayerId) -> Result<Vec<LayerRecord>> {
    let mut chain = Vec::new();
    let mut next = Some(layer_id);
    while let Some(id) = next {
        let record = match layer_record(conn, id)? {
            Some(record) => record,
            None if id == layer_id => return Err(layer_not_found(OP, id)),
            None => {
                return Err(integrity(OP, format!("parent layer {id} is missing")).with_layer_id(layer_id));
            }
        };
        next = record.parent_layer_id;
        if next.is_none() && record.depth != 0 {
            return Err(integrity(OP, format!("root layer {id} has depth {}", record.depth)));
        }
        chain.push(record);
        // Depth strictly decreases toward the root, so a parent cycle is caught here.
        if let [.., child, parent] = chain.as_slice() {
            if child.depth != parent.depth + 1 {
                return Err(integrity(OP, format!("depth of layer {id} does not match its child")));
            }
        }
    }
    chain.reverse();
    Ok(chain)
}

fn load_registry(conn: &Connection) -> Result<Registry> {
    let mut stmt = conn
        .prepare("SELECT sym, text FROM symbols ORDER BY sym")
        .map_err(from_rusqlite)?;
    let rows: Vec<(i64, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    let entries = rows
        .into_iter()
        .map(|(sym, text)| -> Result<(Sym, String)> { Ok((Sym(from_sql(OP, sym)?), text)) })
        .collect::<Result<Vec<_>>>()?;
    Registry::from_entries(entries).map_err(|e| integrity(OP, e.to_string()))
}

fn counter(conn: &Connection, key: &str) -> Result<u64> {
    let value: Option<i64> = conn
        .query_row("SELECT value FROM store_meta WHERE key = ?1", [key], |row| row.get(0))
        .optional()
        .map_err(from_rusqlite)?;
    value.map_or(Ok(1), |v| from_sql(OP, v))
}

fn load_delta(conn: &Connection, layer_id: LayerId) -> Result<(TripleSet, TripleSet)> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT op, subject, predicate, object_tag, object FROM layer_triples WHERE layer_id = ?1",
        )
        .map_err(from_rusqlite)?;
    let rows: Vec<(String, i64, i64, String, i64)> = stmt
        .query_map([to_sql(OP, layer_id.get())?], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    let mut additions = TripleSet::new();
    let mut removals = TripleSet::new();
    for (op, subject, predicate, tag, object) in rows {
        let triple = triple_from_columns(OP, subject, predicate, &tag, object)?;
        match op.as_str() {
            "add" => additions.insert(triple),
            "remove" => removals.insert(triple),
            other => return Err(integrity(OP, format!("unknown delta op '{other}'"))),
        };
    }
    Ok((additions, removals))
}

/// Rebuild the snapshot of `layer_id` in a fresh `TreeStore`
///
/// # Errors
///
/// - `NotFound` if `layer_id` was never saved
/// - `IntegrityViolation` if a parent is missing, the registry is not
///   dense, or a rebuilt layer's digest differs from the stored one
/// - `Persistence` on SQL failures
pub fn load_snapshot(conn: &Connection, layer_id: LayerId) -> Result<Snapshot> {
    let started = Instant::now();
    log_op_start!(OP, layer_id = layer_id.get());

    let result = load_chain(conn, layer_id);

    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    match &result {
        Ok(snapshot) => {
            log_op_end!(
                OP,
                duration_ms = duration_ms,
                layer_id = layer_id.get(),
                depth = snapshot.depth()
            );
        }
        Err(err) => {
            log_op_error!(OP, err.clone(), duration_ms = duration_ms);
        }
    }
    result
}

fn load_chain(conn: &Connection, layer_id: LayerId) -> Result<Snapshot> {
    let chain = chain_records(conn, layer_id)?;
    let registry = load_registry(conn)?;
    let store = TreeStore::resume(
        registry,
        NodeId(counter(conn, NEXT_NODE)?),
        LayerId(counter(conn, NEXT_LAYER)?),
    );

    let mut parent: Option<Snapshot> = None;
    for record in chain {
        let (additions, removals) = load_delta(conn, record.layer_id)?;
        let snapshot = store
            .import_layer(
                parent.as_ref(),
                record.layer_id,
                additions,
                removals,
                record.committed_at,
            )
            .map_err(|e| from_tree(OP, e))?;

        let digest = snapshot.digest().map_err(|e| from_tree(OP, e))?;
        if digest != record.digest {
            return Err(integrity(
                OP,
                format!(
                    "layer {} rebuilt with digest {digest}, stored {}",
                    record.layer_id, record.digest
                ),
            )
            .with_layer_id(record.layer_id));
        }
        parent = Some(snapshot);
    }

    parent.ok_or_else(|| layer_not_found(OP, layer_id))
}

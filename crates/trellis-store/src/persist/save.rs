//! Saving a snapshot's layer chain

use std::collections::HashMap;
use std::time::Instant;

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use trellis_core::{log_op_end, log_op_error, log_op_start};
use trellis_core::{Registry, Snapshot, TripleSet};
use trellis_core_types::LayerId;

use super::{to_sql, triple_columns, Op, NEXT_LAYER, NEXT_NODE};
use crate::errors::{from_rusqlite, from_tree, integrity, Result};

const OP: &str = "save_snapshot";

/// What a save wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub layer_id: LayerId,
    pub digest: String,
    /// Layers of the chain that were not stored before
    pub layers_written: usize,
}

/// Persist `snapshot` and every ancestor not yet in the database
///
/// Runs in one transaction. Saving an already stored chain writes nothing
/// and reports `layers_written == 0`.
///
/// # Errors
///
/// - `IntegrityViolation` if the database holds a layer with the same id
///   but different contents, or a surrogate bound to different text
/// - `Serialization` if an id does not fit an SQLite integer
/// - `Persistence` on SQL failures
pub fn save_snapshot(conn: &mut Connection, snapshot: &Snapshot) -> Result<SaveOutcome> {
    let started = Instant::now();
    log_op_start!(OP, layer_id = snapshot.id().get());

    let result = conn
        .transaction()
        .map_err(from_rusqlite)
        .and_then(|tx| {
            let outcome = save_chain(&tx, snapshot)?;
            tx.commit().map_err(from_rusqlite)?;
            Ok(outcome)
        });

    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    match &result {
        Ok(outcome) => {
            log_op_end!(
                OP,
                duration_ms = duration_ms,
                layer_id = outcome.layer_id.get(),
                layers_written = outcome.layers_written
            );
        }
        Err(err) => {
            log_op_error!(OP, err.clone(), duration_ms = duration_ms);
        }
    }
    result
}

fn save_chain(tx: &Transaction, snapshot: &Snapshot) -> Result<SaveOutcome> {
    let store = snapshot.store();
    let mut layers_written = 0;
    let mut digest = String::new();

    for layer in snapshot.lineage() {
        digest = layer.digest().map_err(|e| from_tree(OP, e))?;
        let stored: Option<String> = tx
            .query_row(
                "SELECT digest FROM layers WHERE layer_id = ?1",
                [to_sql(OP, layer.id().get())?],
                |row| row.get(0),
            )
            .optional()
            .map_err(from_rusqlite)?;

        match stored {
            Some(existing) if existing == digest => continue,
            Some(existing) => {
                return Err(integrity(
                    OP,
                    format!(
                        "layer {} is stored with digest {existing}, snapshot has {digest}",
                        layer.id()
                    ),
                )
                .with_layer_id(layer.id()));
            }
            None => {
                insert_layer(tx, &layer, &digest)?;
                layers_written += 1;
            }
        }
    }

    // Entries are read after the digests so every surrogate they used is in.
    save_registry(tx, store.registry())?;
    let (next_node, next_layer) = store.counters();
    raise_counter(tx, NEXT_NODE, next_node.get())?;
    raise_counter(tx, NEXT_LAYER, next_layer.get())?;

    Ok(SaveOutcome {
        layer_id: snapshot.id(),
        digest,
        layers_written,
    })
}

fn insert_layer(tx: &Transaction, snapshot: &Snapshot, digest: &str) -> Result<()> {
    let (added, removed) = snapshot.delta_sizes();
    let parent = snapshot
        .parent()
        .map(|p| to_sql(OP, p.id().get()))
        .transpose()?;
    tx.execute(
        "INSERT INTO layers (layer_id, parent_layer_id, depth, committed_at, digest, added, removed, saved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            to_sql(OP, snapshot.id().get())?,
            parent,
            to_sql(OP, snapshot.depth() as u64)?,
            snapshot.committed_at().map(|t| t.timestamp_millis()),
            digest,
            to_sql(OP, added as u64)?,
            to_sql(OP, removed as u64)?,
            chrono::Utc::now().timestamp_millis(),
        ],
    )
    .map_err(from_rusqlite)?;

    let layer = snapshot.layer();
    insert_triples(tx, snapshot.id(), Op::Add, layer.additions())?;
    insert_triples(tx, snapshot.id(), Op::Remove, layer.removals())?;

    tracing::debug!(
        layer_id = snapshot.id().get(),
        added,
        removed,
        "layer row written"
    );
    Ok(())
}

fn insert_triples(tx: &Transaction, layer_id: LayerId, op: Op, triples: &TripleSet) -> Result<()> {
    let mut stmt = tx
        .prepare_cached(
            "INSERT INTO layer_triples (layer_id, op, subject, predicate, object_tag, object)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(from_rusqlite)?;
    let layer = to_sql(OP, layer_id.get())?;
    for triple in triples.iter() {
        let (subject, predicate, tag, object) = triple_columns(OP, triple)?;
        stmt.execute(params![layer, op.as_str(), subject, predicate, tag, object])
            .map_err(from_rusqlite)?;
    }
    Ok(())
}

fn save_registry(tx: &Transaction, registry: &Registry) -> Result<()> {
    let mut stmt = tx
        .prepare("SELECT sym, text FROM symbols")
        .map_err(from_rusqlite)?;
    let stored: HashMap<i64, String> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<_, _>>()
        .map_err(from_rusqlite)?;
    drop(stmt);

    let mut insert = tx
        .prepare_cached("INSERT INTO symbols (sym, text) VALUES (?1, ?2)")
        .map_err(from_rusqlite)?;
    for (sym, text) in registry.entries() {
        let key = to_sql(OP, sym.get())?;
        match stored.get(&key) {
            Some(existing) if existing.as_str() == &*text => {}
            Some(existing) => {
                return Err(integrity(
                    OP,
                    format!("surrogate {sym} is stored as '{existing}' but the store has '{text}'"),
                ));
            }
            None => {
                insert
                    .execute(params![key, &*text])
                    .map_err(from_rusqlite)?;
            }
        }
    }
    Ok(())
}

fn raise_counter(tx: &Transaction, key: &str, value: u64) -> Result<()> {
    tx.execute(
        "INSERT INTO store_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = MAX(value, excluded.value)",
        params![key, to_sql(OP, value)?],
    )
    .map_err(from_rusqlite)?;
    Ok(())
}

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use trellis_core::logging_facility::test_capture::init_test_capture;
use trellis_core::trellis_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};
use trellis_core::{log_op_end, log_op_error, log_op_start};
use trellis_core::trellis_core_types::RequestContext;
use trellis_core::{NodeData, NodeId, TreeError, TreeStore, TreeWrite};

use common::build_book;

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name);

    let events = capture.events_for_op(op_name);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.as_deref(), Some(EVENT_START));
}

#[test]
fn test_log_op_end_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42);

    let events = capture.events_for_op(op_name);
    assert_eq!(events.len(), 1, "Should have exactly one end event");
    assert_eq!(events[0].event.as_deref(), Some(EVENT_END));
    assert_eq!(events[0].field("duration_ms"), Some("42"));
}

#[test]
fn test_log_op_error_includes_kind_and_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = TreeError::NotAttached { node_id: NodeId(9) };
    log_op_error!(op_name, err, duration_ms = 5);

    let events = capture.events_for_op(op_name);
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.event.as_deref(), Some(EVENT_END_ERROR));
    assert_eq!(event.level, tracing::Level::ERROR);
    assert_eq!(event.field("err_code"), Some("ERR_NOT_ATTACHED"));
    assert_eq!(event.field("err_kind"), Some("NotAttached"));
}

#[test]
fn test_commit_emits_start_and_end_with_delta_sizes() {
    // GIVEN a layer holding the book tree
    let capture = init_test_capture();
    let store = TreeStore::new();
    let mut w = store.open_layer(None).unwrap();
    build_book(&mut w);
    let (added, _) = w.delta_sizes();
    let request_id = w.context().request_id.to_string();

    // WHEN it is committed
    w.commit();

    // THEN exactly one start and one end event carry its request id
    let events: Vec<_> = capture
        .events_for_op("commit")
        .into_iter()
        .filter(|e| e.field("request_id") == Some(request_id.as_str()))
        .collect();
    let kinds: Vec<_> = events.iter().filter_map(|e| e.event.as_deref()).collect();
    assert_eq!(kinds, [EVENT_START, EVENT_END]);
    assert_eq!(events[1].field("added"), Some(added.to_string().as_str()));
    assert_eq!(events[1].field("removed"), Some("0"));
    assert!(events[1].field("duration_ms").is_some());
}

#[test]
fn test_rejected_edit_is_logged_with_code() {
    let capture = init_test_capture();
    let store = TreeStore::new();
    let mut w = store.open_layer(None).unwrap();
    let e = w.create(NodeData::element("lonely")).unwrap();
    let layer_id = w.id().get().to_string();

    assert!(w.detach(e).is_err());

    let rejected = capture.count_events(|ev| {
        ev.op.as_deref() == Some("detach")
            && ev.field("layer_id") == Some(layer_id.as_str())
            && ev.field("err_code") == Some("ERR_NOT_ATTACHED")
    });
    assert_eq!(rejected, 1);
}

#[test]
fn test_rollup_failure_emits_end_error() {
    let capture = init_test_capture();
    let store = TreeStore::new();
    let base = store.open_layer(None).unwrap().commit();
    let left = base.open_child().commit();
    let right = base.open_child().commit();
    let layer_id = left.id().get().to_string();

    assert!(left.rollup_to(&right).is_err());

    let errors = capture.count_events(|ev| {
        ev.op.as_deref() == Some("rollup")
            && ev.event.as_deref() == Some(EVENT_END_ERROR)
            && ev.field("err_code") == Some("ERR_UNRELATED_LAYER")
    });
    assert!(errors >= 1);
    let starts = capture.count_events(|ev| {
        ev.op.as_deref() == Some("rollup")
            && ev.event.as_deref() == Some(EVENT_START)
            && ev.field("layer_id") == Some(layer_id.as_str())
    });
    assert_eq!(starts, 1);
}

#[test]
fn test_caller_request_id_reaches_commit_events() {
    // GIVEN a layer opened with the importer's request id
    let capture = init_test_capture();
    let store = TreeStore::new();
    let ctx = RequestContext::with_request_id("import-book-7").with_trace_id("trace-9");
    let mut w = store.open_layer_with_context(None, ctx).unwrap();
    assert_eq!(w.context().trace_id.as_ref().map(|t| t.as_str()), Some("trace-9"));
    w.create(NodeData::document()).unwrap();

    // WHEN it is committed
    w.commit();

    // THEN the commit events carry both ids
    let tagged = capture.count_events(|ev| {
        ev.op.as_deref() == Some("commit")
            && ev.field("request_id") == Some("import-book-7")
            && ev.field("trace_id") == Some("trace-9")
    });
    assert_eq!(tagged, 2);
}

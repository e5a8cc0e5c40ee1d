//! Observer lifecycle tests: initialise, scoped fields, spans and shutdown.

use std::io;
use std::sync::Arc;

use o11y::observer::{self, global};
use o11y::testing::{InMemoryExporter, MemorySink, TestObserver};
use o11y::tracing_support::{BasicTracer, SpanKind, TraceContext, Tracer};
use o11y::{fields, Context, ErrorKind, Level, ObserverConfig, ObserverSetup, Severity};

fn setup_with(
    level: Level,
    out: &Arc<MemorySink>,
    err: &Arc<MemorySink>,
    exporter: &Arc<InMemoryExporter>,
) -> ObserverSetup {
    let config = ObserverConfig::builder()
        .level(level)
        .service_name("checkout")
        .omit_timestamps(true)
        .build();
    let tracer: Arc<dyn Tracer> = Arc::new(BasicTracer::new(exporter.clone()));

    ObserverSetup::builder()
        .config(Arc::new(config))
        .out(out.clone())
        .err(err.clone())
        .tracer(tracer)
        .fields(fields!["service" => "checkout"])
        .install_global(false)
        .build()
}

#[test]
fn test_initialise_with_custom_sinks() {
    let out = Arc::new(MemorySink::new(Level::Info));
    let err = Arc::new(MemorySink::new(Level::Info));
    let exporter = Arc::new(InMemoryExporter::new());

    let (cx, obs) =
        observer::initialise(&Context::new(), setup_with(Level::Info, &out, &err, &exporter))
            .unwrap();
    assert!(observer::in_context(&cx));

    obs.debug("too quiet", fields![]);
    obs.info("order placed", fields!["order_id" => "ord_1"]);
    obs.error("payment failed", &io::Error::other("card declined"), Severity::High, fields![]);

    // The initialise record is debug and filtered out.
    assert_eq!(out.messages(), ["order placed"]);
    let placed = out.last().unwrap();
    assert_eq!(placed.fields.get("service"), Some(&"checkout".into()));
    assert_eq!(placed.fields.get("order_id"), Some(&"ord_1".into()));

    let failed = err.last().unwrap();
    assert_eq!(failed.level, Level::Error);
    assert_eq!(failed.fields.get("error"), Some(&"card declined".into()));
    assert_eq!(failed.fields.get("severity"), Some(&"high".into()));

    obs.try_close().unwrap();
    assert_eq!(exporter.shutdown_calls(), 1);
}

#[test]
fn test_json_lines_are_flat() {
    let test = TestObserver::new();
    let (_, obs) = observer::extend(&test.cx, fields!["tenant" => "acme"]).unwrap();
    obs.notice("quota reached", fields!["used" => 100]);

    let line = test.out.json_lines().pop().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();

    assert_eq!(parsed["level"], "NOTICE");
    assert_eq!(parsed["msg"], "quota reached");
    assert_eq!(parsed["tenant"], "acme");
    assert_eq!(parsed["used"], 100);
    assert!(parsed.get("time").is_none());
    assert!(parsed["source"]["file"].as_str().unwrap().ends_with("observer_tests.rs"));
}

#[test]
fn test_request_lifecycle_builds_span_tree() {
    let test = TestObserver::new();
    let tracer = Arc::clone(&test.tracer);

    let (cx, _) = observer::extend(&test.cx, fields!["request_id" => "req-1"]).unwrap();
    let (cx, obs) = observer::span(&cx, tracer.as_ref(), "handle", SpanKind::Server).unwrap();
    obs.info("handling", fields![]);
    let root = cx.trace_context().cloned().unwrap();

    let (inner_cx, inner) =
        observer::expand(&cx, tracer.as_ref(), "db.query", SpanKind::Client, fields!["table" => "orders"])
            .unwrap();
    inner.debug("querying", fields![]);
    let child = inner_cx.trace_context().cloned().unwrap();
    let (after_cx, after) = observer::end(&inner_cx).unwrap();

    assert_eq!(child.trace_id(), root.trace_id());
    assert_eq!(child.parent_span_id(), Some(root.span_id()));
    assert_eq!(after_cx.trace_context(), Some(&root));
    assert_eq!(after.span_depth(), 1);
    // Fields added inside the inner scope outlive its span.
    assert!(after.fields().contains_key("table"));

    observer::end(&after_cx).unwrap();

    let spans = test.exporter.spans();
    let names: Vec<_> = spans.iter().map(|s| s.name()).collect();
    assert_eq!(names, ["db.query", "handle"]);
    assert_eq!(spans[0].kind(), SpanKind::Client);
    assert_eq!(spans[0].attribute("request_id").and_then(|v| v.as_str()), Some("req-1"));
    assert_eq!(spans[1].events()[0].name, "handling");
}

#[test]
fn test_remote_parent_is_continued() {
    let test = TestObserver::new();
    let remote = TraceContext::from_traceparent(
        "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
    )
    .unwrap();
    let cx = test.cx.with_trace_context(remote.clone());

    let (cx, _) = observer::span(&cx, test.tracer.as_ref(), "consume", SpanKind::Consumer).unwrap();
    let local = cx.trace_context().unwrap();

    assert_eq!(local.trace_id(), remote.trace_id());
    assert_ne!(local.span_id(), remote.span_id());
}

#[tokio::test]
async fn test_concurrent_tasks_keep_their_own_fields() {
    let test = TestObserver::new();

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let cx = test.cx.clone();
            tokio::spawn(async move {
                let (_, obs) = observer::extend(&cx, fields!["worker" => worker]).unwrap();
                obs.info("working", fields![]);
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let mut workers: Vec<i64> = test
        .out
        .records()
        .iter()
        .filter(|r| r.message == "working")
        .filter_map(|r| r.fields.get("worker").and_then(|v| v.as_i64()))
        .collect();
    workers.sort_unstable();
    assert_eq!(workers, (0..8).collect::<Vec<_>>());
    assert!(observer::get(&test.cx).unwrap().fields().is_empty());
}

#[test]
fn test_reset_gives_each_request_a_clean_observer() {
    let test = TestObserver::new();
    let (base, _) = observer::extend(&test.cx, fields!["service" => "api"]).unwrap();
    let (first, _) = observer::extend(&base, fields!["request_id" => "a"]).unwrap();

    let second = observer::reset(&first);
    let obs = observer::get(&second).unwrap();
    obs.info("next request", fields![]);

    assert!(test.out.last().unwrap().fields.is_empty());
    assert_eq!(observer::get(&first).unwrap().fields().len(), 2);
}

#[test]
fn test_operations_without_observer_fail() {
    let cx = Context::new();
    let tracer = BasicTracer::new(Arc::new(InMemoryExporter::new()));

    let errors = [
        observer::get(&cx).unwrap_err(),
        observer::extend(&cx, fields!["k" => "v"]).unwrap_err(),
        observer::span(&cx, &tracer, "s", SpanKind::Internal).unwrap_err(),
        observer::end(&cx).unwrap_err(),
    ];
    for err in errors {
        assert_eq!(err.kind(), ErrorKind::ObserverNotFound);
    }
}

#[test]
fn test_add_to_context_shares_observer() {
    let test = TestObserver::new();
    let cx = observer::add_to_context(&Context::new().with_request_id("r-9"), test.observer());

    observer::get(&cx).unwrap().warn("shared", fields![]);
    assert_eq!(test.out.last().unwrap().level, Level::Warning);
    assert_eq!(cx.request_id(), Some("r-9"));
}

#[test]
fn test_global_default_is_stable() {
    let first = global::default_observer();
    let second = global::default_observer();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(global::is_installed());
    assert!(!global::install(test_observer_arc()));
}

fn test_observer_arc() -> Arc<o11y::Observer> {
    TestObserver::new().observer()
}

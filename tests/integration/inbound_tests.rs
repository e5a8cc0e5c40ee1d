//! Inbound middleware tests driving a tower service with `oneshot`.

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use futures::future::BoxFuture;
use http::{Request, Response, StatusCode};
use o11y::inbound::{request_context, MetricsLayer, ObserveLayer};
use o11y::observer;
use o11y::testing::{InMemoryExporter, MemorySink, TestObserver};
use o11y::tracing_support::{BasicTracer, CallMetrics, SpanKind, Tracer};
use o11y::{fields, Context, Level, ObserverConfig, ObserverSetup};
use parking_lot::Mutex;
use tower::{Layer, ServiceExt};

const TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

type Seen = Arc<Mutex<Vec<Context>>>;

/// A handler that logs once and remembers the context it was given.
#[derive(Clone)]
struct Handler {
    seen: Seen,
}

impl tower::Service<Request<String>> for Handler {
    type Response = Response<String>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response<String>, Infallible>>;

    fn poll_ready(&mut self, _: &mut TaskContext<'_>) -> Poll<Result<(), Infallible>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<String>) -> Self::Future {
        let seen = Arc::clone(&self.seen);
        Box::pin(async move {
            let cx = request_context(&req).cloned().unwrap_or_default();
            if let Ok(obs) = observer::get(&cx) {
                obs.info("handling", fields!["body_len" => req.body().len()]);
            }
            seen.lock().push(cx);
            let mut response = Response::new("done".to_string());
            *response.status_mut() = StatusCode::CREATED;
            Ok(response)
        })
    }
}

fn handler(seen: Seen) -> Handler {
    Handler { seen }
}

fn traced_observer() -> (Context, Arc<MemorySink>, Arc<InMemoryExporter>) {
    let out = Arc::new(MemorySink::new(Level::Develop));
    let exporter = Arc::new(InMemoryExporter::new());
    let tracer: Arc<dyn Tracer> = Arc::new(BasicTracer::new(exporter.clone()));
    let config = ObserverConfig::builder()
        .level(Level::Develop)
        .trace_endpoint("http://collector.internal:4318")
        .omit_timestamps(true)
        .build();
    let setup = ObserverSetup::builder()
        .config(Arc::new(config))
        .out(out.clone())
        .err(out.clone())
        .tracer(tracer)
        .install_global(false)
        .build();

    let (cx, _) = observer::initialise(&Context::new(), setup).unwrap();
    (cx, out, exporter)
}

#[tokio::test]
async fn test_request_gets_its_own_observer() {
    let test = TestObserver::new();
    let (base, _) = observer::extend(&test.cx, fields!["service" => "api"]).unwrap();
    let seen = Seen::default();
    let service = ObserveLayer::new(&base).unwrap().layer(handler(seen.clone()));

    let request = Request::post("/orders?draft=true")
        .header("user-agent", "curl/8.0")
        .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
        .body("{}".to_string())
        .unwrap();
    let response = service.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let request_id = response.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(request_id.len(), 36);

    let cx = seen.lock()[0].clone();
    assert_eq!(cx.request_id(), Some(request_id.as_str()));
    let obs = observer::get(&cx).unwrap();
    // Reset drops the fields of the base context.
    assert!(!obs.fields().contains_key("service"));
    assert_eq!(obs.fields().get("request_id"), Some(&request_id.as_str().into()));

    let origin = obs.fields().get("origin").unwrap();
    assert_eq!(origin["client_ip"], "203.0.113.9");
    assert_eq!(origin["user_agent"], "curl/8.0");
    assert_eq!(origin["method"], "POST");
    assert_eq!(origin["path"], "/orders");

    let messages = test.out.messages();
    let tail = &messages[messages.len() - 3..];
    assert_eq!(tail, ["request received", "handling", "request processed"]);
    let processed = test.out.last().unwrap();
    assert_eq!(processed.level, Level::Debug);
    assert_eq!(processed.fields.get("status_code"), Some(&201.into()));
}

#[tokio::test]
async fn test_remote_trace_is_recorded_without_span() {
    let test = TestObserver::new();
    let seen = Seen::default();
    let service = ObserveLayer::new(&test.cx).unwrap().layer(handler(seen.clone()));

    let request = Request::get("/health").header("traceparent", TRACEPARENT).body(String::new()).unwrap();
    service.oneshot(request).await.unwrap();

    let cx = seen.lock()[0].clone();
    let obs = observer::get(&cx).unwrap();
    assert_eq!(obs.span_depth(), 0);
    assert_eq!(
        obs.fields().get("remote_trace_id"),
        Some(&"4bf92f3577b34da6a3ce929d0e0e4736".into())
    );
    assert_eq!(obs.fields().get("remote_span_id"), Some(&"00f067aa0ba902b7".into()));
    assert!(obs.fields().get("span_id").is_none());
    assert_eq!(cx.trace_context().unwrap().span_id().to_string(), "00f067aa0ba902b7");
    assert!(test.exporter.spans().is_empty());
}

#[tokio::test]
async fn test_server_span_continues_remote_trace() {
    let (cx, out, exporter) = traced_observer();
    let seen = Seen::default();
    let service = ObserveLayer::new(&cx).unwrap().layer(handler(seen.clone()));

    let request =
        Request::get("/orders/7").header("traceparent", TRACEPARENT).body(String::new()).unwrap();
    service.oneshot(request).await.unwrap();

    let spans = exporter.spans();
    assert_eq!(spans.len(), 1);
    let server = &spans[0];
    assert_eq!(server.name(), "HTTP GET /orders/7");
    assert_eq!(server.kind(), SpanKind::Server);
    assert_eq!(server.trace_context().trace_id().to_string(), "4bf92f3577b34da6a3ce929d0e0e4736");
    assert_eq!(
        server.trace_context().parent_span_id().map(ToString::to_string).as_deref(),
        Some("00f067aa0ba902b7")
    );
    assert!(server.events().iter().any(|e| e.name == "handling"));

    let handled_cx = seen.lock()[0].clone();
    let obs = observer::get(&handled_cx).unwrap();
    assert_eq!(
        obs.fields().get("span_id"),
        Some(&server.trace_context().span_id().to_string().into())
    );
    assert!(out.messages().contains(&"request processed".to_string()));
}

#[tokio::test]
async fn test_custom_request_id_header() {
    let test = TestObserver::new();
    let layer = ObserveLayer::new(&test.cx)
        .unwrap()
        .request_id_header(http::HeaderName::from_static("x-correlation-id"));
    let service = layer.layer(handler(Seen::default()));

    let response = service.oneshot(Request::new(String::new())).await.unwrap();

    assert!(response.headers().contains_key("x-correlation-id"));
    assert!(!response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_concurrent_requests_do_not_share_state() {
    let test = TestObserver::new();
    let seen = Seen::default();
    let service = ObserveLayer::new(&test.cx).unwrap().layer(handler(seen.clone()));

    let calls = (0..4).map(|_| service.clone().oneshot(Request::new(String::new())));
    let responses = futures::future::join_all(calls).await;

    let mut ids: Vec<String> = responses
        .into_iter()
        .map(|r| r.unwrap().headers()["x-request-id"].to_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);

    for cx in seen.lock().iter() {
        let obs = observer::get(cx).unwrap();
        assert_eq!(obs.fields().get("request_id").and_then(|v| v.as_str()), cx.request_id());
    }
}

#[tokio::test]
async fn test_failed_handler_still_ends_request_span() {
    let (cx, out, exporter) = traced_observer();
    let failing = tower::service_fn(|_req: Request<String>| async {
        Err::<Response<String>, _>(std::io::Error::other("handler failed"))
    });
    let service = ObserveLayer::new(&cx).unwrap().layer(failing);

    let request = Request::get("/orders").body(String::new()).unwrap();
    let err = service.oneshot(request).await.unwrap_err();
    assert_eq!(err.to_string(), "handler failed");

    let spans = exporter.spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name(), "HTTP GET /orders");
    assert!(spans[0].status().is_error());
    assert_eq!(spans[0].errors().collect::<Vec<_>>(), ["handler failed"]);
    assert!(out.messages().contains(&"request processed".to_string()));
}

#[tokio::test]
async fn test_metrics_layer_records_masked_paths() {
    let metrics = CallMetrics::new();
    let layer = MetricsLayer::new(metrics.recorder()).path_mask(Arc::new(|path: &str| {
        path.split('/')
            .map(|segment| if segment.parse::<u64>().is_ok() { "{id}" } else { segment })
            .collect::<Vec<_>>()
            .join("/")
    }));

    for path in ["/orders/7", "/orders/8"] {
        let service = layer.layer(handler(Seen::default()));
        let request = Request::get(path).body(String::new()).unwrap();
        let response = service.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].key.path, "/orders/{id}");
    assert_eq!(snapshot[0].key.method, "GET");
    assert_eq!(snapshot[0].key.status, 201);
    assert_eq!(snapshot[0].count, 2);
}

#[tokio::test]
async fn test_metrics_layer_skips_failed_requests() {
    let metrics = CallMetrics::new();
    let failing = tower::service_fn(|_req: Request<String>| async {
        Err::<Response<String>, _>(std::io::Error::other("handler failed"))
    });
    let service = MetricsLayer::new(metrics.recorder()).layer(failing);

    let request = Request::get("/orders").body(String::new()).unwrap();
    assert!(service.oneshot(request).await.is_err());
    assert_eq!(metrics.total_calls(), 0);
}

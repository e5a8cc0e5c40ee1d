//! Decorated transport chains against a mock terminal.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderValue, Method, StatusCode};
use o11y::observer;
use o11y::testing::{InMemoryCallStore, MockTransport, TestObserver};
use o11y::tracing_support::{B3Propagator, CallMetrics, SpanKind};
use o11y::transport::{Body, HttpRequest, PathMask, RoundTrip, TransportBuilder};
use o11y::{fields, Error, ErrorKind, Level};
use url::Url;

fn url(path: &str) -> Url {
    Url::parse("https://payments.internal").unwrap().join(path).unwrap()
}

#[tokio::test]
async fn test_streamed_request_body_is_logged_and_forwarded() {
    let test = TestObserver::new();
    let mock = Arc::new(MockTransport::new().respond_with(StatusCode::ACCEPTED, "queued"));
    let transport = TransportBuilder::new(&test.cx, mock.clone()).with_logging().unwrap().build();

    let chunks: Vec<o11y::Result<Bytes>> = vec![Ok(Bytes::from_static(br#"{"amount":"#)), Ok(Bytes::from_static(b"42}"))];
    let request = HttpRequest::post(url("/charges"))
        .with_body(Body::from_stream(futures::stream::iter(chunks)))
        .with_context(test.cx.clone());

    let response = transport.round_trip(request).await.unwrap();
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.text().await.unwrap(), "queued");

    assert_eq!(mock.requests()[0].body, Bytes::from_static(br#"{"amount":42}"#));
    let logged = test
        .out
        .records()
        .into_iter()
        .find(|r| r.message == "outbound call - request")
        .unwrap();
    assert_eq!(logged.fields.get("request_body"), Some(&r#"{"amount":42}"#.into()));
    assert_eq!(logged.fields.get("request_method"), Some(&"POST".into()));
}

#[tokio::test]
async fn test_inner_failure_passes_through_every_decorator() {
    let test = TestObserver::new();
    let mock = Arc::new(MockTransport::new());
    let store = Arc::new(InMemoryCallStore::new());
    let metrics = CallMetrics::new();
    let transport = TransportBuilder::new(&test.cx, mock.clone())
        .with_propagation()
        .with_metrics(metrics.recorder(), None)
        .with_storage(store.clone())
        .unwrap()
        .with_logging()
        .unwrap()
        .build();

    mock.fail_next(Error::transport("connection refused"));
    let request = HttpRequest::get(url("/health")).with_context(test.cx.clone());
    let err = transport.round_trip(request).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.message(), "connection refused");
    assert_eq!(mock.request_count(), 1);
    assert_eq!(metrics.total_calls(), 0);
    assert!(store.records().is_empty());
    assert_eq!(test.out.messages().last().map(String::as_str), Some("outbound call - request"));
}

#[tokio::test]
async fn test_storage_failure_is_logged_and_returned() {
    let test = TestObserver::new();
    let transport = TransportBuilder::new(&test.cx, Arc::new(MockTransport::new()))
        .with_storage(Arc::new(InMemoryCallStore::failing("disk full")))
        .unwrap()
        .build();

    let request = HttpRequest::get(url("/balance")).with_context(test.cx.clone());
    let err = transport.round_trip(request).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Persistence);
    let logged = test.err.last().unwrap();
    assert_eq!(logged.level, Level::Error);
    assert_eq!(logged.message, "failed to store request/response");
    assert_eq!(logged.fields.get("severity"), Some(&"high".into()));
}

#[tokio::test]
async fn test_stored_record_is_redacted() {
    let test = TestObserver::new();
    let mock = Arc::new(
        MockTransport::new().respond_with(StatusCode::OK, r#"{"session_token":"abcdefghijklmnop"}"#),
    );
    let store = Arc::new(InMemoryCallStore::new());
    let transport =
        TransportBuilder::new(&test.cx, mock).with_storage(store.clone()).unwrap().build();

    let request = HttpRequest::post(url("/login"))
        .with_header(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNzd29yZA=="))
        .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .with_body(r#"{"user":"ada","password":"correct-horse"}"#)
        .with_context(test.cx.clone());
    let response = transport.round_trip(request).await.unwrap();

    // The caller still gets the real body.
    assert_eq!(response.text().await.unwrap(), r#"{"session_token":"abcdefghijklmnop"}"#);

    let records = store.records();
    let record = &records[0];
    assert_eq!(record.method, "POST");
    assert_eq!(record.url, "https://payments.internal/login");
    assert_eq!(record.status_code, 200);
    assert_eq!(record.request_body.as_deref(), Some(r#"{"password":"c[11]e","user":"ada"}"#));
    assert_eq!(record.response_body.as_deref(), Some(r#"{"session_token":"ab[12]op"}"#));

    let headers: serde_json::Value = serde_json::from_slice(&record.request_headers).unwrap();
    assert_eq!(headers["authorization"][0], "Bas[20]A==");
    assert_eq!(headers["content-type"][0], "application/json");
}

#[tokio::test]
async fn test_metrics_aggregate_masked_paths() {
    let test = TestObserver::new();
    let metrics = CallMetrics::new();
    let mask: PathMask = Arc::new(|path: &str| {
        path.split('/')
            .map(|seg| {
                if !seg.is_empty() && seg.chars().all(|c| c.is_ascii_digit()) { "{id}" } else { seg }
            })
            .collect::<Vec<_>>()
            .join("/")
    });
    let transport = TransportBuilder::new(&test.cx, Arc::new(MockTransport::new()))
        .with_metrics(metrics.recorder(), Some(mask))
        .build();

    for id in [1, 2, 3] {
        let request = HttpRequest::get(url(&format!("/orders/{id}")));
        transport.round_trip(request).await.unwrap();
    }

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].key.path, "/orders/{id}");
    assert_eq!(snapshot[0].key.method, Method::GET.as_str());
    assert_eq!(snapshot[0].key.status, 200);
    assert_eq!(snapshot[0].count, 3);
}

#[tokio::test]
async fn test_b3_propagation_follows_current_span() {
    let test = TestObserver::new();
    let mock = Arc::new(MockTransport::new());
    let transport = TransportBuilder::new(&test.cx, mock.clone())
        .with_propagator(B3Propagator::multi())
        .build();

    let (cx, _) =
        observer::span(&test.cx, test.tracer.as_ref(), "call upstream", SpanKind::Client).unwrap();
    let trace = cx.trace_context().cloned().unwrap();
    transport.round_trip(HttpRequest::get(url("/")).with_context(cx)).await.unwrap();

    let requests = mock.requests();
    let sent = &requests[0];
    assert_eq!(sent.headers["x-b3-traceid"], trace.trace_id().to_string().as_str());
    assert_eq!(sent.headers["x-b3-spanid"], trace.span_id().to_string().as_str());
    assert!(!sent.headers.contains_key("traceparent"));
}

#[tokio::test]
async fn test_request_observer_takes_precedence() {
    let test = TestObserver::new();
    let transport = TransportBuilder::new(&test.cx, Arc::new(MockTransport::new()))
        .with_logging()
        .unwrap()
        .build();

    let (scoped, _) = observer::extend(&test.cx, fields!["request_id" => "req-7"]).unwrap();
    transport.round_trip(HttpRequest::get(url("/")).with_context(scoped)).await.unwrap();

    let logged = test.out.last().unwrap();
    assert_eq!(logged.message, "outbound call - response");
    assert_eq!(logged.fields.get("request_id"), Some(&"req-7".into()));
}

#[tokio::test]
async fn test_call_duration_covers_inner_call() {
    let test = TestObserver::new();
    let mock = Arc::new(MockTransport::new().with_delay(Duration::from_millis(25)));
    let transport = TransportBuilder::new(&test.cx, mock).with_logging().unwrap().build();

    transport.round_trip(HttpRequest::get(url("/slow")).with_context(test.cx.clone())).await.unwrap();

    let logged = test.out.last().unwrap();
    let duration = logged.fields.get("call_duration").and_then(|v| v.as_i64()).unwrap();
    assert!(duration >= 25, "call_duration was {duration}");
}

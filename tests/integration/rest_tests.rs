//! The reqwest-backed transport against a local wiremock server.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::{HeaderValue, StatusCode};
use o11y::observer;
use o11y::testing::{InMemoryCallStore, TestObserver};
use o11y::tracing_support::{CallMetrics, SpanKind};
use o11y::transport::{Body, HttpRequest, RestTransport, RoundTrip, TransportBuilder};
use o11y::ErrorKind;
use url::Url;
use wiremock::matchers::{body_string, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn endpoint(server: &MockServer, route: &str) -> Url {
    Url::parse(&server.uri()).unwrap().join(route).unwrap()
}

#[tokio::test]
async fn test_rest_transport_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/echo"))
        .and(body_string("ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = RestTransport::new().unwrap();
    let response = transport
        .round_trip(HttpRequest::post(endpoint(&server, "/v1/echo")).with_body("ping"))
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert!(!response.body.is_buffered());
    assert_eq!(response.text().await.unwrap(), "pong");
}

#[tokio::test]
async fn test_streamed_body_reaches_server() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/upload"))
        .and(body_string("part-1;part-2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let chunks: Vec<o11y::Result<Bytes>> =
        vec![Ok(Bytes::from_static(b"part-1;")), Ok(Bytes::from_static(b"part-2"))];
    let request = HttpRequest::new(http::Method::PUT, endpoint(&server, "/upload"))
        .with_body(Body::from_stream(futures::stream::iter(chunks)));

    let response = RestTransport::new().unwrap().round_trip(request).await.unwrap();
    assert_eq!(response.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_full_chain_against_wiremock() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/charges"))
        .and(header("authorization", "Bearer mysecrettoken"))
        .and(header_exists("traceparent"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("set-cookie", "session=abcdefghijklmnop")
                .set_body_string(r#"{"id":"ch_1","client_secret":"0123456789abcdef"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let test = TestObserver::new();
    let store = Arc::new(InMemoryCallStore::new());
    let metrics = CallMetrics::new();
    let transport = TransportBuilder::rest(&test.cx)
        .unwrap()
        .with_propagation()
        .with_metrics(metrics.recorder(), None)
        .with_storage(store.clone())
        .unwrap()
        .with_logging()
        .unwrap()
        .build();

    let (cx, _) =
        observer::span(&test.cx, test.tracer.as_ref(), "create charge", SpanKind::Client).unwrap();
    let request = HttpRequest::post(endpoint(&server, "/v1/charges"))
        .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer mysecrettoken"))
        .with_body(r#"{"amount":1200}"#)
        .with_context(cx.clone());
    let response = transport.round_trip(request).await.unwrap();

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(
        response.text().await.unwrap(),
        r#"{"id":"ch_1","client_secret":"0123456789abcdef"}"#
    );

    let records = test.out.records();
    let request_log = records.iter().find(|r| r.message == "outbound call - request").unwrap();
    let response_log = records.iter().find(|r| r.message == "outbound call - response").unwrap();
    assert_eq!(
        request_log.fields.get("request_headers").unwrap()["authorization"][0],
        "Be[16]en"
    );
    assert_eq!(response_log.fields.get("status_code"), Some(&201.into()));
    assert_eq!(
        response_log.fields.get("response_body"),
        Some(&r#"{"client_secret":"01[12]ef","id":"ch_1"}"#.into())
    );
    assert_eq!(
        response_log.fields.get("response_headers").unwrap()["set-cookie"][0],
        "ses[18]nop"
    );

    let stored = store.records();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status_code, 201);
    assert_eq!(stored[0].request_body.as_deref(), Some(r#"{"amount":1200}"#));

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot[0].key.path, "/v1/charges");
    assert_eq!(snapshot[0].key.status, 201);

    // The span saw both log records as events.
    observer::end(&cx).unwrap();
    let spans = test.exporter.spans();
    let events: Vec<_> = spans[0].events().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(events, ["outbound call - request", "outbound call - response"]);
}

#[tokio::test]
async fn test_timeout_surfaces_as_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let transport = RestTransport::builder().timeout(Duration::from_millis(50)).build().unwrap();
    let err = transport.round_trip(HttpRequest::get(endpoint(&server, "/slow"))).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
}

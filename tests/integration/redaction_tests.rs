//! Secrets never reach log records in the clear.

use std::sync::Arc;

use http::{HeaderName, HeaderValue};
use o11y::redact::{redact_body, redact_secret};
use o11y::testing::{MockTransport, TestObserver};
use o11y::transport::{HttpRequest, RoundTrip, TransportBuilder};
use proptest::prelude::*;
use test_case::test_case;
use url::Url;

async fn logged_request_header(name: &'static str, value: &'static str) -> serde_json::Value {
    let test = TestObserver::new();
    let transport = TransportBuilder::new(&test.cx, Arc::new(MockTransport::new()))
        .with_logging()
        .unwrap()
        .build();

    let request = HttpRequest::get(Url::parse("https://api.example.com/").unwrap())
        .with_header(HeaderName::from_static(name), HeaderValue::from_static(value))
        .with_context(test.cx.clone());
    transport.round_trip(request).await.unwrap();

    let logged = test
        .out
        .records()
        .into_iter()
        .find(|r| r.message == "outbound call - request")
        .unwrap();
    logged.fields.get("request_headers").unwrap()[name][0].clone()
}

#[test_case("authorization", "Bearer mysecrettoken", "Be[16]en"; "bearer token")]
#[test_case("x-api-key", "sk_live_0123456789abcdef", "sk_[18]def"; "api key")]
#[test_case("cookie", "sid=abc", "*5*"; "short cookie")]
#[test_case("x-auth-token", "tok", "***"; "tiny token")]
#[test_case("accept", "application/json", "application/json"; "not sensitive")]
#[tokio::test]
async fn test_logged_request_headers(name: &'static str, value: &'static str, expected: &str) {
    assert_eq!(logged_request_header(name, value).await, expected);
}

#[test_case(br#"{"password":"hunter22"}"#, br#"{"password":"h[6]2"}"#; "flat")]
#[test_case(br#"{"auth":{"refresh_token":"0123456789abcdef"}}"#, br#"{"auth":{"refresh_token":"01[12]ef"}}"#; "nested")]
#[test_case(br#"{"cookie":["a","b"]}"#, br#"{"cookie":"[[7]]"}"#; "sensitive array is stringified")]
#[test_case(b"password=hunter22", b"password=hunter22"; "form body passes through")]
fn test_body_redaction(body: &[u8], expected: &[u8]) {
    assert_eq!(redact_body(body), expected);
}

proptest! {
    #[test]
    fn prop_redacted_secret_reveals_at_most_a_quarter(secret in "[A-Za-z0-9]{8,64}", reveal in 0usize..16) {
        let redacted = redact_secret(&secret, reveal);
        prop_assert!(!redacted.contains(&secret));

        let shown = redacted
            .split(['[', ']'])
            .enumerate()
            .filter(|(i, _)| i % 2 == 0)
            .map(|(_, part)| part.chars().count())
            .sum::<usize>();
        prop_assert!(shown * 4 <= secret.chars().count() || redacted.starts_with('*'));
    }

    #[test]
    fn prop_redaction_preserves_length_information(secret in "\\PC{0,40}") {
        let len = secret.chars().count();
        let redacted = redact_secret(&secret, 6);
        match len {
            0 => prop_assert!(redacted.is_empty()),
            1..=4 => prop_assert_eq!(redacted, "*".repeat(len)),
            5..=7 => prop_assert_eq!(redacted, format!("*{}*", len - 2)),
            _ => {
                let reveal = len / 8;
                let expected_hidden = format!("[{}]", len - 2 * reveal);
                prop_assert!(redacted.contains(&expected_hidden));
            },
        }
    }

    #[test]
    fn prop_non_object_bodies_pass_through(body in proptest::collection::vec(any::<u8>(), 0..64)) {
        let is_object = matches!(
            serde_json::from_slice::<serde_json::Value>(&body),
            Ok(serde_json::Value::Object(_))
        );
        prop_assume!(!is_object);
        prop_assert_eq!(redact_body(&body), body);
    }
}

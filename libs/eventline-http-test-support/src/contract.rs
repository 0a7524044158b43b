//! Request-factory contract suite.
//!
//! Each function starts its own [`RecordingServer`], builds a factory from a
//! [`TransportConfig`] through the adapter-supplied constructor and panics on
//! the first deviation, so adapters call them from plain `#[test]`s:
//!
//! ```ignore
//! #[test]
//! fn gzipped_response_is_decoded() {
//!     contract::gzipped_response_is_decoded(&factory);
//! }
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::server::{RecordingServer, TRICKLE_BODY_DELAY};
use eventline_http::{
    ContentEncoding, HttpError, Method, RequestFactory, Response, TransportConfig, mime,
};
use std::io::{Read, Write};
use std::time::Duration;

/// Builds the factory under test.
pub type MakeFactory = dyn Fn(TransportConfig) -> Box<dyn RequestFactory>;

fn start() -> RecordingServer {
    RecordingServer::start().expect("recording server should start")
}

fn config(encoding: ContentEncoding) -> TransportConfig {
    TransportConfig::for_testing().with_content_encoding(encoding)
}

fn read_all(response: &mut Response) -> Vec<u8> {
    let mut out = Vec::new();
    response.body().unwrap().read_to_end(&mut out).unwrap();
    out
}

fn post_json(
    make: &MakeFactory,
    server: &RecordingServer,
    encoding: ContentEncoding,
    payload: &[u8],
) -> Response {
    let factory = make(config(encoding));
    let mut request = factory
        .create_request(&server.uri("/events"), &Method::POST)
        .unwrap();
    request
        .headers_mut()
        .set_content_type(&mime::APPLICATION_JSON)
        .unwrap();
    request.body().unwrap().write_all(payload).unwrap();
    request.execute().unwrap()
}

/// `GET` of a gzip-compressed `{}` yields `{}`.
pub fn gzipped_response_is_decoded(make: &MakeFactory) {
    let server = start();
    let factory = make(config(ContentEncoding::Identity));
    let mut request = factory
        .create_request(&server.uri("/gzipped"), &Method::GET)
        .unwrap();

    let mut response = request.execute().unwrap();
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.status_text(), "OK");
    assert_eq!(response.headers().get_first("content-encoding").as_deref(), Some("gzip"));
    assert_eq!(read_all(&mut response), b"{}");
    response.close();
}

/// A zstd-compressed response body is decoded as well.
pub fn zstd_response_is_decoded(make: &MakeFactory) {
    let server = start();
    let factory = make(config(ContentEncoding::Identity));
    let mut request = factory
        .create_request(&server.uri("/zstd"), &Method::GET)
        .unwrap();

    let mut response = request.execute().unwrap();
    assert_eq!(read_all(&mut response), b"{}");
    response.close();
}

/// Every encoding round-trips through the server and is announced iff not identity.
pub fn encoded_request_bodies(make: &MakeFactory) {
    for encoding in ContentEncoding::ALL {
        let server = start();
        let mut response = post_json(make, &server, encoding, b"{}");
        assert_eq!(response.status_code(), 200, "{encoding}");
        response.close();

        let recorded = server.last_request().expect("request should be recorded");
        assert_eq!(recorded.method, Method::POST);
        let expected = encoding.is_announced().then(|| encoding.token().to_owned());
        assert_eq!(recorded.header("content-encoding"), expected, "{encoding}");
        assert_eq!(
            recorded.header("content-type").as_deref(),
            Some("application/json"),
            "{encoding}"
        );
        assert_eq!(recorded.decoded_body().unwrap(), b"{}", "{encoding}");
    }
}

/// Scenario: zstd `POST` of `{}` arrives as a zstd frame announced as such.
pub fn zstd_request_body(make: &MakeFactory) {
    let server = start();
    post_json(make, &server, ContentEncoding::Zstd, b"{}").close();

    let recorded = server.last_request().unwrap();
    assert_eq!(recorded.header("content-encoding").as_deref(), Some("zstd"));
    assert_eq!(&recorded.body[..4], &[0x28, 0xb5, 0x2f, 0xfd]);
    assert_eq!(recorded.decoded_body().unwrap(), b"{}");
}

/// `Accept-Encoding: gzip` goes out whatever the body encoding and method.
pub fn accept_encoding_always_gzip(make: &MakeFactory) {
    let server = start();
    for encoding in ContentEncoding::ALL {
        let factory = make(config(encoding));
        for method in [Method::GET, Method::POST] {
            let mut request = factory.create_request(&server.uri("/"), &method).unwrap();
            if method == Method::POST {
                request.body().unwrap().write_all(b"{}").unwrap();
            }
            request.execute().unwrap().close();

            let recorded = server.last_request().unwrap();
            assert_eq!(
                recorded.header_values("accept-encoding"),
                vec!["gzip".to_owned()],
                "{encoding} {method}"
            );
        }
    }
}

/// Identity never produces a `Content-Encoding` header.
pub fn identity_sends_no_content_encoding(make: &MakeFactory) {
    let server = start();
    post_json(make, &server, ContentEncoding::Identity, b"[1,2,3]").close();

    let recorded = server.last_request().unwrap();
    assert!(recorded.header_values("content-encoding").is_empty());
    assert_eq!(&recorded.body[..], b"[1,2,3]");
}

/// Two acquisitions hand out the same sink and both writes arrive.
pub fn body_acquisition_is_idempotent(make: &MakeFactory) {
    let server = start();
    let factory = make(config(ContentEncoding::Gzip));
    let mut request = factory
        .create_request(&server.uri("/events"), &Method::POST)
        .unwrap();

    let first = {
        let body = request.body().unwrap();
        body.write_all(b"{").unwrap();
        std::ptr::from_mut(body).cast_const()
    };
    let second = {
        let body = request.body().unwrap();
        body.write_all(b"}").unwrap();
        std::ptr::from_mut(body).cast_const()
    };
    assert!(std::ptr::eq(first, second), "body() must return the same sink");

    request.execute().unwrap().close();
    let recorded = server.last_request().unwrap();
    assert_eq!(recorded.header_values("content-encoding"), vec!["gzip".to_owned()]);
    assert_eq!(recorded.decoded_body().unwrap(), b"{}");
}

/// The request is dead after `execute`: neither execute nor body work again.
pub fn second_execute_fails(make: &MakeFactory) {
    let server = start();
    let factory = make(config(ContentEncoding::Identity));
    let mut request = factory
        .create_request(&server.uri("/events"), &Method::POST)
        .unwrap();
    request.body().unwrap().write_all(b"{}").unwrap();
    request.execute().unwrap().close();

    assert!(matches!(request.execute(), Err(HttpError::AlreadyExecuted)));
    assert!(matches!(request.body(), Err(HttpError::AlreadyExecuted)));
    assert!(matches!(
        request.headers_mut().put("x-late", "1"),
        Err(HttpError::AlreadyExecuted)
    ));
    assert_eq!(server.requests().len(), 1);
}

/// Without body acquisition nothing is sent and nothing is announced.
pub fn request_without_body(make: &MakeFactory) {
    let server = start();
    let factory = make(config(ContentEncoding::Gzip));
    let mut request = factory
        .create_request(&server.uri("/events"), &Method::POST)
        .unwrap();
    request.execute().unwrap().close();

    let recorded = server.last_request().unwrap();
    assert!(recorded.body.is_empty());
    assert!(recorded.header_values("content-encoding").is_empty());
}

/// Compressed encodings are skipped for methods that carry no payload.
pub fn encoding_skipped_for_bodyless_methods(make: &MakeFactory) {
    let server = start();
    let factory = make(config(ContentEncoding::Zstd));
    let mut request = factory
        .create_request(&server.uri("/subscriptions/1"), &Method::DELETE)
        .unwrap();
    request.body().unwrap().write_all(b"raw").unwrap();
    request.execute().unwrap().close();

    let recorded = server.last_request().unwrap();
    assert_eq!(recorded.method, Method::DELETE);
    assert!(recorded.header_values("content-encoding").is_empty());
    assert_eq!(&recorded.body[..], b"raw");
}

/// Non-2xx statuses are responses, and reason phrases come from the fixed table.
pub fn status_passthrough(make: &MakeFactory) {
    let server = start();
    let factory = make(config(ContentEncoding::Identity));
    for (code, text) in [
        (201, "Created"),
        (404, "Not Found"),
        (422, "Unprocessable Entity"),
        (503, "Service Unavailable"),
        (299, ""),
    ] {
        let path = format!("/status/{code}");
        let mut request = factory.create_request(&server.uri(&path), &Method::GET).unwrap();
        let mut response = request.execute().unwrap();
        assert_eq!(response.status_code(), code);
        assert_eq!(response.status_text(), text, "{code}");
        assert_eq!(read_all(&mut response), b"{}");
        response.close();
    }
}

/// Custom headers reach the wire: `add` appends, `put` replaces.
pub fn headers_on_the_wire(make: &MakeFactory) {
    let server = start();
    let factory = make(TransportConfig {
        user_agent: "eventline-contract/1.0".to_owned(),
        ..config(ContentEncoding::Identity)
    });
    let mut request = factory.create_request(&server.uri("/"), &Method::GET).unwrap();
    let headers = request.headers_mut();
    headers.add("X-Flow-Id", "a").unwrap();
    headers.add("x-flow-id", "b").unwrap();
    headers.put("X-Stream-Id", "first").unwrap();
    headers.put("x-stream-id", "second").unwrap();
    request.execute().unwrap().close();

    let recorded = server.last_request().unwrap();
    assert_eq!(recorded.header_values("x-flow-id").join(", "), "a, b");
    assert_eq!(recorded.header_values("x-stream-id"), vec!["second".to_owned()]);
    assert_eq!(
        recorded.header("user-agent").as_deref(),
        Some("eventline-contract/1.0")
    );
}

/// Response headers are readable with typed accessors.
pub fn response_headers_readable(make: &MakeFactory) {
    let server = start();
    let factory = make(config(ContentEncoding::Identity));
    let mut request = factory.create_request(&server.uri("/"), &Method::GET).unwrap();
    let mut response = request.execute().unwrap();

    let content_type = response.headers().content_type().unwrap();
    assert_eq!(content_type.essence_str(), "application/json");
    assert_eq!(response.headers().content_length(), Some(2));
    assert!(response.headers().header_names().contains("content-type"));
    response.close();
    response.close();
    assert!(matches!(response.body(), Err(HttpError::BodyClosed)));
}

/// An exceeded request timeout is reported through the I/O channel.
pub fn timeout_is_io_failure(make: &MakeFactory) {
    let server = start();
    let factory =
        make(config(ContentEncoding::Identity).with_request_timeout(Some(Duration::from_millis(200))));
    let mut request = factory.create_request(&server.uri("/slow"), &Method::GET).unwrap();

    match request.execute() {
        Err(HttpError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::TimedOut),
        other => panic!("expected a timed out I/O failure, got {other:?}"),
    }
    assert!(matches!(request.execute(), Err(HttpError::AlreadyExecuted)));
}

/// The timeout bounds the wait for status and headers; the body may keep
/// streaming for longer.
pub fn timeout_does_not_bound_body(make: &MakeFactory) {
    let timeout = Duration::from_millis(200);
    assert!(TRICKLE_BODY_DELAY > timeout);

    let server = start();
    let factory = make(config(ContentEncoding::Identity).with_request_timeout(Some(timeout)));
    let mut request = factory
        .create_request(&server.uri("/trickle"), &Method::GET)
        .unwrap();

    let mut response = request.execute().unwrap();
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.read_to_vec().unwrap(), b"{}");
}

/// A refused connection is an I/O failure, not a backend-specific error.
pub fn connection_refused_is_io_failure(make: &MakeFactory) {
    let port = {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
        listener.local_addr().unwrap().port()
    };
    let factory = make(config(ContentEncoding::Identity));
    let uri = format!("http://127.0.0.1:{port}/events").parse().unwrap();
    let mut request = factory.create_request(&uri, &Method::GET).unwrap();

    assert!(matches!(request.execute(), Err(HttpError::Io(_))));
}

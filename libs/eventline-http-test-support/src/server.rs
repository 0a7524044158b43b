use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use eventline_http::{ContentEncoding, Uri};
use http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use std::convert::Infallible;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::oneshot;

/// How long `/slow` waits before answering.
pub const SLOW_RESPONSE_DELAY: Duration = Duration::from_secs(2);

/// Pause between the two body chunks of `/trickle`.
pub const TRICKLE_BODY_DELAY: Duration = Duration::from_millis(600);

const JSON_BODY: &[u8] = b"{}";

/// A request as it arrived on the wire.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: http::Method,
    pub path: String,
    pub headers: HeaderMap,
    /// Raw body, still encoded
    pub body: Bytes,
}

impl RecordedRequest {
    /// All values of `name`.
    #[must_use]
    pub fn header_values(&self, name: &str) -> Vec<String> {
        self.headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect()
    }

    /// First value of `name`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.header_values(name).into_iter().next()
    }

    /// The body with its declared `Content-Encoding` reversed.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed framing or an unknown encoding.
    pub fn decoded_body(&self) -> io::Result<Vec<u8>> {
        let Some(token) = self.header(CONTENT_ENCODING.as_str()) else {
            return Ok(self.body.to_vec());
        };
        match token.parse::<ContentEncoding>() {
            Ok(ContentEncoding::Gzip) => {
                let mut plain = Vec::new();
                flate2::read::GzDecoder::new(&self.body[..]).read_to_end(&mut plain)?;
                Ok(plain)
            }
            Ok(ContentEncoding::Zstd) => zstd::decode_all(&self.body[..]),
            Ok(_) => Ok(self.body.to_vec()),
            Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        }
    }
}

type Recorded = Arc<Mutex<Vec<RecordedRequest>>>;

/// Local HTTP server recording everything it receives.
///
/// Routes (any method):
/// - `/gzipped`: gzip-compressed `{}` with `Content-Encoding: gzip`
/// - `/zstd`: zstd-compressed `{}` with `Content-Encoding: zstd`
/// - `/status/{code}`: `{}` with the given status
/// - `/slow`: `{}` after [`SLOW_RESPONSE_DELAY`]
/// - `/trickle`: status and headers at once, then `{` and, after
///   [`TRICKLE_BODY_DELAY`], `}`
/// - anything else: `200` with `{}`
pub struct RecordingServer {
    addr: SocketAddr,
    requests: Recorded,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl RecordingServer {
    /// Bind an ephemeral port on localhost and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket or the server runtime cannot be set up.
    pub fn start() -> io::Result<Self> {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let requests = Recorded::default();
        let app = Router::new()
            .fallback(record_and_respond)
            .with_state(Arc::clone(&requests));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("recording-server".to_owned())
            .spawn(move || {
                runtime.block_on(async move {
                    let listener = match tokio::net::TcpListener::from_std(listener) {
                        Ok(listener) => listener,
                        Err(e) => {
                            tracing::error!(error = %e, "recording server failed to register listener");
                            return;
                        }
                    };
                    let shutdown = async {
                        _ = shutdown_rx.await;
                    };
                    if let Err(e) = axum::serve(listener, app)
                        .with_graceful_shutdown(shutdown)
                        .await
                    {
                        tracing::error!(error = %e, "recording server stopped");
                    }
                });
            })?;

        tracing::debug!(%addr, "recording server listening");
        Ok(Self {
            addr,
            requests,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Absolute `http://` URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Like [`url`](Self::url), parsed.
    ///
    /// # Panics
    ///
    /// Panics if `path` does not form a valid URI.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn uri(&self, path: &str) -> Uri {
        self.url(path)
            .parse()
            .expect("test paths must form valid URIs")
    }

    /// Every request received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    #[must_use]
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().last().cloned()
    }
}

impl Drop for RecordingServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            _ = thread.join();
        }
    }
}

async fn record_and_respond(State(requests): State<Recorded>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(body) => body,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let path = parts.uri.path().to_owned();
    requests.lock().push(RecordedRequest {
        method: parts.method,
        path: path.clone(),
        headers: parts.headers,
        body,
    });

    match path.as_str() {
        "/gzipped" => encoded_json(ContentEncoding::Gzip),
        "/zstd" => encoded_json(ContentEncoding::Zstd),
        "/slow" => {
            tokio::time::sleep(SLOW_RESPONSE_DELAY).await;
            json(StatusCode::OK)
        }
        "/trickle" => trickled_json(),
        other => match other.strip_prefix("/status/").map(str::parse::<u16>) {
            Some(Ok(code)) => StatusCode::from_u16(code).map_or_else(
                |_| StatusCode::BAD_REQUEST.into_response(),
                json,
            ),
            Some(Err(_)) => StatusCode::BAD_REQUEST.into_response(),
            None => json(StatusCode::OK),
        },
    }
}

fn json(status: StatusCode) -> Response {
    (status, [(CONTENT_TYPE, "application/json")], JSON_BODY).into_response()
}

fn trickled_json() -> Response {
    let chunks = futures_util::stream::unfold(0u8, |step| async move {
        match step {
            0 => Some((Ok::<_, Infallible>(Bytes::from_static(b"{")), 1)),
            1 => {
                tokio::time::sleep(TRICKLE_BODY_DELAY).await;
                Some((Ok(Bytes::from_static(b"}")), 2))
            }
            _ => None,
        }
    });
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "application/json")],
        Body::from_stream(chunks),
    )
        .into_response()
}

fn encoded_json(encoding: ContentEncoding) -> Response {
    match compress(encoding, JSON_BODY) {
        Ok(payload) => (
            StatusCode::OK,
            [
                (CONTENT_TYPE, "application/json"),
                (CONTENT_ENCODING, encoding.token()),
            ],
            payload,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Compress without going through the crate under test.
fn compress(encoding: ContentEncoding, data: &[u8]) -> io::Result<Vec<u8>> {
    match encoding {
        ContentEncoding::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        ContentEncoding::Zstd => zstd::encode_all(data, 0),
        _ => Ok(data.to_vec()),
    }
}

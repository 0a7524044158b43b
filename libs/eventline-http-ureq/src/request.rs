use crate::headers::ReadableHeaders;
use eventline_http::{
    BodySource, HeaderMap, HeaderMapExt, Headers, HttpError, Method, Request, RequestBody,
    RequestLifecycle, Response, Uri,
};
use http::header::{HeaderName, HeaderValue};
use std::collections::BTreeSet;
use std::io::{self, Read};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

/// A single-use request sent through a blocking `ureq` agent.
pub struct UreqRequest {
    lifecycle: RequestLifecycle,
    headers: ReadableHeaders,
    agent: ureq::Agent,
}

impl UreqRequest {
    pub(crate) fn new(
        lifecycle: RequestLifecycle,
        headers: ReadableHeaders,
        agent: ureq::Agent,
    ) -> Self {
        Self {
            lifecycle,
            headers,
            agent,
        }
    }

    fn build(&mut self) -> ureq::Request {
        let mut request = self
            .agent
            .request(self.lifecycle.method().as_str(), &self.lifecycle.uri().to_string());
        let headers = self.headers.seal();
        for name in headers.keys() {
            let joined = headers.values_of(name.as_str()).join(", ");
            request = request.set(name.as_str(), &joined);
        }
        request
    }
}

impl Request for UreqRequest {
    fn method(&self) -> &Method {
        self.lifecycle.method()
    }

    fn uri(&self) -> &Uri {
        self.lifecycle.uri()
    }

    fn headers(&self) -> &dyn Headers {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut dyn Headers {
        &mut self.headers
    }

    fn body(&mut self) -> Result<&mut RequestBody, HttpError> {
        self.lifecycle.acquire_body(&mut self.headers)
    }

    fn execute(&mut self) -> Result<Response, HttpError> {
        let payload = self.lifecycle.begin_execution()?;
        let request = self.build();

        let result = match self.lifecycle.timeout() {
            Some(limit) => send_within(request, payload, limit)?,
            None => send(request, payload.as_deref()),
        };
        // ureq reports 4xx/5xx as Err(Status); they are ordinary responses here
        let response = match result {
            Ok(response) | Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => return Err(HttpError::io(transport)),
        };

        let status = response.status();
        let headers = collect_headers(&response);
        let body = UreqBody {
            reader: Some(response.into_reader()),
        };
        Ok(Response::new(status, headers, Box::new(body)))
    }
}

impl std::fmt::Debug for UreqRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqRequest")
            .field("method", self.lifecycle.method())
            .field("uri", self.lifecycle.uri())
            .field("executed", &self.lifecycle.is_executed())
            .finish_non_exhaustive()
    }
}

#[allow(clippy::result_large_err)]
fn send(request: ureq::Request, payload: Option<&[u8]>) -> Result<ureq::Response, ureq::Error> {
    match payload {
        Some(bytes) => request.send_bytes(bytes),
        None => request.call(),
    }
}

/// Sends on a helper thread and waits at most `limit` for status and headers.
///
/// The body stream that follows is not bounded. A call given up on keeps
/// running until the server answers or drops the connection; its response is
/// then discarded.
#[allow(clippy::result_large_err)]
fn send_within(
    request: ureq::Request,
    payload: Option<Vec<u8>>,
    limit: Duration,
) -> Result<Result<ureq::Response, ureq::Error>, HttpError> {
    let (tx, rx) = mpsc::sync_channel(1);
    std::thread::Builder::new()
        .name("eventline-ureq-call".to_owned())
        .spawn(move || {
            // nobody is listening once the caller timed out
            _ = tx.send(send(request, payload.as_deref()));
        })
        .map_err(HttpError::Io)?;

    match rx.recv_timeout(limit) {
        Ok(result) => Ok(result),
        Err(RecvTimeoutError::Timeout) => {
            tracing::debug!(timeout_ms = limit.as_millis(), "abandoning ureq call");
            Err(HttpError::timed_out(limit))
        }
        Err(RecvTimeoutError::Disconnected) => Err(HttpError::Io(io::Error::other(
            "ureq call thread exited without a result",
        ))),
    }
}

/// Response headers as an [`http::HeaderMap`]; unrepresentable entries are skipped.
fn collect_headers(response: &ureq::Response) -> HeaderMap {
    let names: BTreeSet<String> = response.headers_names().into_iter().collect();
    let mut map = HeaderMap::new();
    for name in &names {
        let Ok(header) = HeaderName::try_from(name.as_str()) else {
            tracing::debug!(header = %name, "skipping response header with invalid name");
            continue;
        };
        for value in response.all(name) {
            match HeaderValue::try_from(value) {
                Ok(value) => {
                    map.append(header.clone(), value);
                }
                Err(_) => tracing::debug!(header = %name, "skipping invalid response header value"),
            }
        }
    }
    map
}

struct UreqBody {
    reader: Option<Box<dyn Read + Send + Sync + 'static>>,
}

impl Read for UreqBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader.as_mut() {
            Some(reader) => reader.read(buf),
            None => Ok(0),
        }
    }
}

impl BodySource for UreqBody {
    /// Dropping an unfinished ureq reader closes its connection instead of pooling it.
    fn release(&mut self) -> io::Result<()> {
        self.reader = None;
        Ok(())
    }
}

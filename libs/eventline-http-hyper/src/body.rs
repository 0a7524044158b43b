//! Blocking `Read` over a hyper `Incoming` body.

use bytes::{Buf, Bytes};
use eventline_http::BodySource;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use std::io::{self, Read};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Pulls body frames on the factory runtime as the caller reads.
///
/// Trailer frames are skipped. Releasing drops the stream, which lets hyper
/// discard the connection instead of draining it.
pub(crate) struct IncomingReader {
    body: Option<Incoming>,
    chunk: Bytes,
    runtime: Arc<Runtime>,
}

impl IncomingReader {
    pub(crate) fn new(body: Incoming, runtime: Arc<Runtime>) -> Self {
        Self {
            body: Some(body),
            chunk: Bytes::new(),
            runtime,
        }
    }

    /// Next data chunk, or `None` at end of stream.
    fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        while let Some(body) = self.body.as_mut() {
            match self.runtime.block_on(body.frame()) {
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data()
                        && data.has_remaining()
                    {
                        return Ok(Some(data));
                    }
                }
                Some(Err(e)) => {
                    self.body = None;
                    return Err(io::Error::other(e));
                }
                None => self.body = None,
            }
        }
        Ok(None)
    }
}

impl Read for IncomingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.chunk.has_remaining() {
            match self.next_chunk()? {
                Some(chunk) => self.chunk = chunk,
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.chunk.remaining());
        self.chunk.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }
}

impl BodySource for IncomingReader {
    fn release(&mut self) -> io::Result<()> {
        self.body = None;
        self.chunk.clear();
        Ok(())
    }
}

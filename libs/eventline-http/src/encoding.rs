//! Content encodings applied to request and response bodies.
//!
//! Outgoing bodies are compressed with the encoding chosen in the transport
//! configuration. Incoming bodies are decompressed according to the
//! `Content-Encoding` the *response* declares, which may differ from the one
//! used for the request.

use flate2::Compression;
use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, BufReader, Read, Write};
use std::str::FromStr;

/// How a body is transformed for the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ContentEncoding {
    /// No transformation; never announced with a `Content-Encoding` header
    #[default]
    Identity,
    /// gzip (RFC 1952) framing around deflate
    Gzip,
    /// Zstandard frames (RFC 8878)
    Zstd,
}

impl ContentEncoding {
    /// Every supported encoding, identity first.
    pub const ALL: [ContentEncoding; 3] = [
        ContentEncoding::Identity,
        ContentEncoding::Gzip,
        ContentEncoding::Zstd,
    ];

    /// The token used in `Content-Encoding` / `Accept-Encoding` headers.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            ContentEncoding::Identity => "identity",
            ContentEncoding::Gzip => "gzip",
            ContentEncoding::Zstd => "zstd",
        }
    }

    /// Whether a request with this method may carry a body in this encoding.
    ///
    /// Identity applies to everything. Compressed encodings only apply to
    /// methods that carry a payload.
    #[must_use]
    pub fn is_applicable_to(self, method: &Method) -> bool {
        match self {
            ContentEncoding::Identity => true,
            ContentEncoding::Gzip | ContentEncoding::Zstd => {
                matches!(*method, Method::POST | Method::PUT | Method::PATCH)
            }
        }
    }

    /// Whether a `Content-Encoding` header must accompany a body in this encoding.
    #[must_use]
    pub const fn is_announced(self) -> bool {
        !matches!(self, ContentEncoding::Identity)
    }

    /// Interpose a compressing writer in front of `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the zstd compression context cannot be created.
    pub fn wrap<W: Write>(self, sink: W) -> io::Result<EncodingWriter<W>> {
        Ok(match self {
            ContentEncoding::Identity => EncodingWriter::Identity(sink),
            ContentEncoding::Gzip => {
                EncodingWriter::Gzip(flate2::write::GzEncoder::new(sink, Compression::default()))
            }
            ContentEncoding::Zstd => EncodingWriter::Zstd(zstd::stream::write::Encoder::new(
                sink,
                zstd::DEFAULT_COMPRESSION_LEVEL,
            )?),
        })
    }

    /// Interpose a decompressing reader in front of `source`.
    ///
    /// Malformed framing is reported by `read`, not here.
    ///
    /// # Errors
    ///
    /// Returns an error if the zstd decompression context cannot be created.
    pub fn decode<R: Read>(self, source: R) -> io::Result<DecodingReader<R>> {
        Ok(match self {
            ContentEncoding::Identity => DecodingReader::Identity(source),
            ContentEncoding::Gzip => DecodingReader::Gzip(flate2::read::GzDecoder::new(source)),
            ContentEncoding::Zstd => {
                DecodingReader::Zstd(zstd::stream::read::Decoder::new(source)?)
            }
        })
    }

    /// Pick the encoding a `Content-Encoding` header value declares.
    ///
    /// Returns `None` unless exactly one coding besides identity is listed
    /// and it is one we can reverse. Stacked codings such as `gzip, zstd`
    /// leave the stream raw rather than half-decoded.
    #[must_use]
    pub fn from_header(value: &str) -> Option<Self> {
        let mut codings = value
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty() && !token.eq_ignore_ascii_case("identity"));
        let only = codings.next()?;
        if codings.next().is_some() {
            return None;
        }
        only.parse().ok()
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Error returned when parsing an unknown content-coding token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown content encoding '{0}'")]
pub struct UnknownEncoding(pub String);

impl FromStr for ContentEncoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        ContentEncoding::ALL
            .into_iter()
            .find(|encoding| encoding.token().eq_ignore_ascii_case(token))
            .ok_or_else(|| UnknownEncoding(token.to_owned()))
    }
}

/// A sink that encodes everything written to it.
///
/// Call [`finish`](EncodingWriter::finish) to flush the framing trailer and
/// get the inner sink back.
pub enum EncodingWriter<W: Write> {
    /// Pass-through
    Identity(W),
    /// gzip compressor
    Gzip(flate2::write::GzEncoder<W>),
    /// zstd compressor
    Zstd(zstd::stream::write::Encoder<'static, W>),
}

impl<W: Write> EncodingWriter<W> {
    /// The encoding this writer applies.
    #[must_use]
    pub fn encoding(&self) -> ContentEncoding {
        match self {
            EncodingWriter::Identity(_) => ContentEncoding::Identity,
            EncodingWriter::Gzip(_) => ContentEncoding::Gzip,
            EncodingWriter::Zstd(_) => ContentEncoding::Zstd,
        }
    }

    /// Complete the encoded stream and return the inner sink.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the trailing frame to the sink fails.
    pub fn finish(self) -> io::Result<W> {
        match self {
            EncodingWriter::Identity(sink) => Ok(sink),
            EncodingWriter::Gzip(encoder) => encoder.finish(),
            EncodingWriter::Zstd(encoder) => encoder.finish(),
        }
    }
}

impl<W: Write> Write for EncodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            EncodingWriter::Identity(sink) => sink.write(buf),
            EncodingWriter::Gzip(encoder) => encoder.write(buf),
            EncodingWriter::Zstd(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            EncodingWriter::Identity(sink) => sink.flush(),
            EncodingWriter::Gzip(encoder) => encoder.flush(),
            EncodingWriter::Zstd(encoder) => encoder.flush(),
        }
    }
}

impl<W: Write> fmt::Debug for EncodingWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncodingWriter")
            .field(&self.encoding())
            .finish()
    }
}

/// A source that decodes everything read from it.
pub enum DecodingReader<R: Read> {
    /// Pass-through
    Identity(R),
    /// gzip decompressor
    Gzip(flate2::read::GzDecoder<R>),
    /// zstd decompressor
    Zstd(zstd::stream::read::Decoder<'static, BufReader<R>>),
}

impl<R: Read> DecodingReader<R> {
    /// The encoding this reader reverses.
    #[must_use]
    pub fn encoding(&self) -> ContentEncoding {
        match self {
            DecodingReader::Identity(_) => ContentEncoding::Identity,
            DecodingReader::Gzip(_) => ContentEncoding::Gzip,
            DecodingReader::Zstd(_) => ContentEncoding::Zstd,
        }
    }

    /// Mutable access to the raw, still-encoded source.
    pub fn get_mut(&mut self) -> &mut R {
        match self {
            DecodingReader::Identity(source) => source,
            DecodingReader::Gzip(decoder) => decoder.get_mut(),
            DecodingReader::Zstd(decoder) => decoder.get_mut().get_mut(),
        }
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            DecodingReader::Identity(source) => source.read(buf),
            DecodingReader::Gzip(decoder) => decoder.read(buf),
            DecodingReader::Zstd(decoder) => decoder.read(buf),
        }
    }
}

impl<R: Read> fmt::Debug for DecodingReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DecodingReader")
            .field(&self.encoding())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(encoding: ContentEncoding, data: &[u8]) -> Vec<u8> {
        let mut writer = encoding.wrap(Vec::new()).unwrap();
        writer.write_all(data).unwrap();
        writer.finish().unwrap()
    }

    fn decode(encoding: ContentEncoding, data: Vec<u8>) -> io::Result<Vec<u8>> {
        let mut reader = encoding.decode(Cursor::new(data))?;
        let mut out = Vec::new();
        reader.read_to_end(&mut out)?;
        Ok(out)
    }

    #[test]
    fn test_tokens() {
        assert_eq!(ContentEncoding::Identity.token(), "identity");
        assert_eq!(ContentEncoding::Gzip.token(), "gzip");
        assert_eq!(ContentEncoding::Zstd.token(), "zstd");
        assert_eq!(ContentEncoding::Zstd.to_string(), "zstd");
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(" GZip ".parse::<ContentEncoding>(), Ok(ContentEncoding::Gzip));
        assert_eq!("zstd".parse::<ContentEncoding>(), Ok(ContentEncoding::Zstd));
        assert_eq!(
            "br".parse::<ContentEncoding>(),
            Err(UnknownEncoding("br".to_owned()))
        );
    }

    #[test]
    fn test_only_identity_is_unannounced() {
        assert!(!ContentEncoding::Identity.is_announced());
        assert!(ContentEncoding::Gzip.is_announced());
        assert!(ContentEncoding::Zstd.is_announced());
    }

    #[test]
    fn test_applicability_by_method() {
        for method in [Method::GET, Method::HEAD, Method::DELETE, Method::OPTIONS] {
            assert!(ContentEncoding::Identity.is_applicable_to(&method));
            assert!(!ContentEncoding::Gzip.is_applicable_to(&method), "{method}");
            assert!(!ContentEncoding::Zstd.is_applicable_to(&method), "{method}");
        }
        for method in [Method::POST, Method::PUT, Method::PATCH] {
            assert!(ContentEncoding::Gzip.is_applicable_to(&method), "{method}");
            assert!(ContentEncoding::Zstd.is_applicable_to(&method), "{method}");
        }
    }

    #[test]
    fn test_identity_wrap_is_passthrough() {
        assert_eq!(encode(ContentEncoding::Identity, b"{}"), b"{}");
    }

    #[test]
    fn test_gzip_output_is_gzip_framed() {
        let encoded = encode(ContentEncoding::Gzip, b"{\"a\":1}");
        assert_eq!(&encoded[..2], &[0x1f, 0x8b], "gzip magic bytes");

        let mut plain = Vec::new();
        flate2::read::GzDecoder::new(encoded.as_slice())
            .read_to_end(&mut plain)
            .unwrap();
        assert_eq!(plain, b"{\"a\":1}");
    }

    #[test]
    fn test_zstd_output_is_zstd_framed() {
        let encoded = encode(ContentEncoding::Zstd, b"{}");
        assert_eq!(&encoded[..4], &[0x28, 0xb5, 0x2f, 0xfd], "zstd magic bytes");
        assert_eq!(zstd::decode_all(encoded.as_slice()).unwrap(), b"{}");
    }

    #[test]
    fn test_decode_reverses_wrap() {
        let payload = "event ".repeat(512);
        for encoding in ContentEncoding::ALL {
            let encoded = encode(encoding, payload.as_bytes());
            assert_eq!(decode(encoding, encoded).unwrap(), payload.as_bytes());
        }
    }

    #[test]
    fn test_malformed_gzip_fails_on_read() {
        let mut reader = ContentEncoding::Gzip
            .decode(Cursor::new(b"definitely not gzip".to_vec()))
            .unwrap();
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).is_err());
    }

    #[test]
    fn test_malformed_zstd_fails_on_read() {
        let result = decode(ContentEncoding::Zstd, b"definitely not zstd".to_vec());
        assert!(result.is_err());
    }

    #[test]
    fn test_get_mut_reaches_raw_source() {
        let encoded = encode(ContentEncoding::Gzip, b"{}");
        let len = encoded.len();
        let mut reader = ContentEncoding::Gzip.decode(Cursor::new(encoded)).unwrap();
        assert_eq!(reader.get_mut().get_ref().len(), len);
        assert_eq!(reader.encoding(), ContentEncoding::Gzip);
    }

    #[test]
    fn test_from_header() {
        assert_eq!(ContentEncoding::from_header("gzip"), Some(ContentEncoding::Gzip));
        assert_eq!(ContentEncoding::from_header("ZSTD"), Some(ContentEncoding::Zstd));
        assert_eq!(
            ContentEncoding::from_header("identity, gzip"),
            Some(ContentEncoding::Gzip)
        );
        assert_eq!(ContentEncoding::from_header("identity"), None);
        assert_eq!(ContentEncoding::from_header("br"), None);
        assert_eq!(ContentEncoding::from_header(""), None);
    }

    #[test]
    fn test_from_header_leaves_stacked_codings_raw() {
        assert_eq!(ContentEncoding::from_header("gzip, zstd"), None);
        assert_eq!(ContentEncoding::from_header("gzip, br"), None);
        assert_eq!(ContentEncoding::from_header("br, gzip"), None);
        assert_eq!(
            ContentEncoding::from_header(" gzip , identity"),
            Some(ContentEncoding::Gzip)
        );
    }

    #[test]
    fn test_serde_uses_tokens() {
        let json = serde_json::to_string(&ContentEncoding::Zstd).unwrap();
        assert_eq!(json, "\"zstd\"");
        let parsed: ContentEncoding = serde_json::from_str("\"gzip\"").unwrap();
        assert_eq!(parsed, ContentEncoding::Gzip);
    }
}

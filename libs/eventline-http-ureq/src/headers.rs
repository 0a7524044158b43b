use eventline_http::mime::Mime;
use eventline_http::{HeaderMap, HeaderMapExt, Headers, HttpError, header_pair};
use std::collections::BTreeSet;

/// Readable request headers, sealed once the request is executed.
#[derive(Debug, Default)]
pub struct ReadableHeaders {
    map: HeaderMap,
    sealed: bool,
}

impl ReadableHeaders {
    fn ensure_open(&self) -> Result<(), HttpError> {
        if self.sealed {
            return Err(HttpError::AlreadyExecuted);
        }
        Ok(())
    }

    /// Freeze the headers and return them for sending.
    pub(crate) fn seal(&mut self) -> &HeaderMap {
        self.sealed = true;
        &self.map
    }
}

impl Headers for ReadableHeaders {
    fn get(&self, name: &str) -> Result<Vec<String>, HttpError> {
        Ok(self.map.values_of(name))
    }

    fn header_names(&self) -> Result<BTreeSet<String>, HttpError> {
        Ok(self.map.names())
    }

    fn add(&mut self, name: &str, value: &str) -> Result<(), HttpError> {
        self.ensure_open()?;
        let (name, value) = header_pair(name, value)?;
        self.map.append(name, value);
        Ok(())
    }

    fn put(&mut self, name: &str, value: &str) -> Result<(), HttpError> {
        self.ensure_open()?;
        let (name, value) = header_pair(name, value)?;
        self.map.insert(name, value);
        Ok(())
    }

    fn content_length(&self) -> Result<Option<u64>, HttpError> {
        Ok(self.map.parsed_content_length())
    }

    fn set_content_length(&mut self, _content_length: u64) -> Result<(), HttpError> {
        Err(HttpError::ContentLengthManaged)
    }

    fn content_type(&self) -> Result<Option<Mime>, HttpError> {
        Ok(self.map.parsed_content_type())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use eventline_http::mime;

    #[test]
    fn test_reads_back_what_was_written() {
        let mut headers = ReadableHeaders::default();
        headers.add("X-Flow-Id", "a").unwrap();
        headers.add("x-flow-id", "b").unwrap();
        headers.set_content_type(&mime::APPLICATION_JSON).unwrap();

        assert_eq!(headers.get("x-flow-id").unwrap(), vec!["a", "b"]);
        assert_eq!(headers.get_first("X-FLOW-ID").unwrap().as_deref(), Some("a"));
        assert_eq!(
            headers.content_type().unwrap(),
            Some(mime::APPLICATION_JSON)
        );
        let names = headers.header_names().unwrap();
        assert!(names.contains("x-flow-id"));
        assert!(names.contains("content-type"));
    }

    #[test]
    fn test_put_replaces_all_values() {
        let mut headers = ReadableHeaders::default();
        headers.add("x-stream-id", "1").unwrap();
        headers.add("x-stream-id", "2").unwrap();
        headers.put("X-Stream-Id", "3").unwrap();
        assert_eq!(headers.get("x-stream-id").unwrap(), vec!["3"]);
    }

    #[test]
    fn test_missing_header_is_empty() {
        let headers = ReadableHeaders::default();
        assert!(headers.get("x-missing").unwrap().is_empty());
        assert_eq!(headers.get_first("x-missing").unwrap(), None);
        assert_eq!(headers.content_length().unwrap(), None);
        assert_eq!(headers.content_type().unwrap(), None);
    }

    #[test]
    fn test_content_length_is_managed() {
        let mut headers = ReadableHeaders::default();
        assert!(matches!(
            headers.set_content_length(2),
            Err(HttpError::ContentLengthManaged)
        ));
        assert_eq!(headers.content_length().unwrap(), None);
    }

    #[test]
    fn test_sealed_headers_stay_readable() {
        let mut headers = ReadableHeaders::default();
        headers.put("x-flow-id", "a").unwrap();
        headers.seal();

        assert!(matches!(headers.put("x-flow-id", "b"), Err(HttpError::AlreadyExecuted)));
        assert!(matches!(headers.add("x-flow-id", "b"), Err(HttpError::AlreadyExecuted)));
        assert_eq!(headers.get("x-flow-id").unwrap(), vec!["a"]);
    }
}

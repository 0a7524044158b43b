//! Reason phrases derived from status codes.
//!
//! Some backends never expose the reason phrase of the status line, so every
//! adapter reports it from this fixed table instead. The phrases are part of
//! the public contract and must not be "modernised".

/// Sorted by code.
const STATUS_TEXT: [(u16, &str); 45] = [
    (200, "OK"),
    (201, "Created"),
    (202, "Accepted"),
    (203, "Non-Authoritative Information"),
    (204, "No Content"),
    (205, "Reset Content"),
    (206, "Partial Content"),
    (207, "Partial Update OK"),
    (300, "Multiple Choices"),
    (301, "Moved Permanently"),
    (302, "Moved Temporarily"),
    (303, "See Other"),
    (304, "Not Modified"),
    (305, "Use Proxy"),
    (307, "Temporary Redirect"),
    (400, "Bad Request"),
    (401, "Unauthorized"),
    (402, "Payment Required"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (405, "Method Not Allowed"),
    (406, "Not Acceptable"),
    (407, "Proxy Authentication Required"),
    (408, "Request Timeout"),
    (409, "Conflict"),
    (410, "Gone"),
    (411, "Length Required"),
    (412, "Precondition Failed"),
    (413, "Request Entity Too Large"),
    (414, "Request-URI Too Long"),
    (415, "Unsupported Media Type"),
    (416, "Requested Range Not Satisfiable"),
    (417, "Expectation Failed"),
    (418, "Reauthentication Required"),
    (419, "Proxy Reauthentication Required"),
    (422, "Unprocessable Entity"),
    (423, "Locked"),
    (424, "Failed Dependency"),
    (500, "Server Error"),
    (501, "Not Implemented"),
    (502, "Bad Gateway"),
    (503, "Service Unavailable"),
    (504, "Gateway Timeout"),
    (505, "HTTP Version Not Supported"),
    (507, "Insufficient Storage"),
];

/// Reason phrase for `code`, or `""` when the code is not in the table.
#[must_use]
pub fn status_text(code: u16) -> &'static str {
    STATUS_TEXT
        .binary_search_by_key(&code, |&(known, _)| known)
        .map_or("", |index| STATUS_TEXT[index].1)
}

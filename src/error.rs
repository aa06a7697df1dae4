//! Error types for the KurrentDB Atom client.

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

/// Reason phrase the server puts on a 400 raised by a failed
/// expected-version precondition.
pub(crate) const WRONG_EXPECTED_VERSION_REASON: &str = "Wrong expected EventNumber";

/// Error for invalid HTTP header configuration.
#[derive(Debug, Clone, Error)]
pub enum InvalidHeaderError {
    #[error("invalid header name: {0}")]
    InvalidName(String),
    #[error("invalid header value: {0}")]
    InvalidValue(String),
}

/// Main error type for event store operations.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("bad request for stream: {url}")]
    BadRequest { url: String },

    #[error("unauthorized access to stream: {url}")]
    Unauthorized { url: String },

    #[error("stream not found: {url}")]
    StreamNotFound { url: String },

    #[error("stream permanently deleted: {url}")]
    StreamGone { url: String },

    #[error("wrong expected version")]
    WrongExpectedVersion,

    #[error("no extractable version in write response")]
    NoExtractableVersion,

    #[error("writable event collection must contain at least one event")]
    EmptyEventCollection,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("json error: {0}")]
    Json(String),
}

impl EventStoreError {
    /// Whether the caller may reasonably retry the operation.
    ///
    /// Nothing retries internally; callers own the retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EventStoreError::ConnectionFailed { .. })
    }

    /// Canonical HTTP status code if applicable
    pub fn status_code(&self) -> Option<u16> {
        match self {
            EventStoreError::BadRequest { .. } => Some(400),
            EventStoreError::Unauthorized { .. } => Some(401),
            EventStoreError::StreamNotFound { .. } => Some(404),
            EventStoreError::WrongExpectedVersion => Some(409),
            EventStoreError::StreamGone { .. } => Some(410),
            _ => None,
        }
    }
}

/// Map a response status to a domain error, per the server's HTTP contract.
///
/// `reason` is the HTTP/1.1 reason phrase when the transport recorded one.
/// Returns `Ok(())` for any status that is not an error (all 2xx and
/// unrecognized codes).
pub(crate) fn classify_status(
    url: &Url,
    status: StatusCode,
    reason: Option<&str>,
) -> Result<(), EventStoreError> {
    match status.as_u16() {
        400 if reason == Some(WRONG_EXPECTED_VERSION_REASON) => {
            Err(EventStoreError::WrongExpectedVersion)
        }
        400 => Err(EventStoreError::BadRequest {
            url: url.to_string(),
        }),
        401 => Err(EventStoreError::Unauthorized {
            url: url.to_string(),
        }),
        404 => Err(EventStoreError::StreamNotFound {
            url: url.to_string(),
        }),
        409 => Err(EventStoreError::WrongExpectedVersion),
        410 => Err(EventStoreError::StreamGone {
            url: url.to_string(),
        }),
        429 | 500 | 502 | 503 | 504 => Err(EventStoreError::ConnectionFailed {
            message: format!("server error for stream {}: HTTP {}", url, status.as_u16()),
            source: None,
        }),
        _ => Ok(()),
    }
}

/// Route a response through the status classifier.
pub(crate) fn classify_response(resp: &reqwest::Response) -> Result<(), EventStoreError> {
    let reason = reason_phrase(resp);
    classify_status(resp.url(), resp.status(), reason.as_deref())
}

/// Reason phrase from the response status line.
///
/// hyper only records non-canonical phrases, and HTTP/2 has none at all.
fn reason_phrase(resp: &reqwest::Response) -> Option<String> {
    resp.extensions()
        .get::<hyper::ext::ReasonPhrase>()
        .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
}

impl From<reqwest::Error> for EventStoreError {
    fn from(err: reqwest::Error) -> Self {
        // Errors that carry a response status (e.g. from `error_for_status`)
        // classify like a direct response; everything else is connection-level.
        if let (Some(status), Some(url)) = (err.status(), err.url()) {
            if let Err(mapped) = classify_status(url, status, None) {
                return mapped;
            }
        }
        EventStoreError::ConnectionFailed {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for EventStoreError {
    fn from(err: serde_json::Error) -> Self {
        EventStoreError::Json(err.to_string())
    }
}

impl From<url::ParseError> for EventStoreError {
    fn from(err: url::ParseError) -> Self {
        EventStoreError::InvalidUrl(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("http://127.0.0.1:2113/streams/newstream").unwrap()
    }

    fn status(code: u16) -> StatusCode {
        StatusCode::from_u16(code).unwrap()
    }

    #[test]
    fn test_transient_statuses_classify_as_connection_failed() {
        for code in [429, 500, 502, 503, 504] {
            let err = classify_status(&url(), status(code), None).unwrap_err();
            assert!(
                matches!(err, EventStoreError::ConnectionFailed { .. }),
                "status {code}"
            );
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn test_client_errors_classify_by_status() {
        assert!(matches!(
            classify_status(&url(), status(400), None).unwrap_err(),
            EventStoreError::BadRequest { .. }
        ));
        assert!(matches!(
            classify_status(&url(), status(401), None).unwrap_err(),
            EventStoreError::Unauthorized { .. }
        ));
        assert!(matches!(
            classify_status(&url(), status(404), None).unwrap_err(),
            EventStoreError::StreamNotFound { .. }
        ));
        assert!(matches!(
            classify_status(&url(), status(409), None).unwrap_err(),
            EventStoreError::WrongExpectedVersion
        ));
        assert!(matches!(
            classify_status(&url(), status(410), None).unwrap_err(),
            EventStoreError::StreamGone { .. }
        ));
    }

    #[test]
    fn test_wrong_expected_version_reason_beats_bad_request() {
        let err = classify_status(&url(), status(400), Some(WRONG_EXPECTED_VERSION_REASON))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::WrongExpectedVersion));

        let err = classify_status(&url(), status(400), Some("Bad Request")).unwrap_err();
        assert!(matches!(err, EventStoreError::BadRequest { .. }));
    }

    #[test]
    fn test_success_and_unmapped_statuses_pass_through() {
        for code in [200, 201, 204, 301, 302, 304] {
            assert!(
                classify_status(&url(), status(code), None).is_ok(),
                "status {code}"
            );
        }
    }

    #[test]
    fn test_connection_failed_message_includes_status() {
        let err = classify_status(&url(), status(503), None).unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        let err = classify_status(&url(), status(404), None).unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(err.status_code(), Some(404));
    }
}

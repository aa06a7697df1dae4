//! Write side: appends with optimistic concurrency and stream deletion.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, LOCATION};
use tracing::debug;

use crate::client::{EVENTS_MEDIA_TYPE, HEADER_EXPECTED_VERSION, HEADER_HARD_DELETE, Http};
use crate::error::{classify_response, EventStoreError};
use crate::event::WritableEventCollection;
use crate::types::{ExpectedVersion, StreamDeletion, StreamWriteResult};

/// Per-write options.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct WriteOptions {
    /// Extra headers for the write request.
    ///
    /// Invalid names or values are silently ignored. The protocol headers
    /// (expected version, content type) always win over a caller-supplied
    /// value of the same name.
    pub headers: Vec<(String, String)>,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header to the write request.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Write-side handle for appends and deletes.
#[derive(Clone)]
pub struct StreamWriter {
    pub(crate) http: Http,
}

impl StreamWriter {
    pub(crate) fn new(http: Http) -> Self {
        StreamWriter { http }
    }

    /// Append events to a stream.
    ///
    /// Returns the version assigned to the last event written. The server
    /// creates the stream on first write.
    pub async fn write_to_stream(
        &self,
        stream: &str,
        expected_version: ExpectedVersion,
        events: impl Into<WritableEventCollection>,
    ) -> Result<StreamWriteResult, EventStoreError> {
        self.write_to_stream_with(stream, expected_version, events, &WriteOptions::default())
            .await
    }

    /// Append events with extra request options.
    pub async fn write_to_stream_with(
        &self,
        stream: &str,
        expected_version: ExpectedVersion,
        events: impl Into<WritableEventCollection>,
        options: &WriteOptions,
    ) -> Result<StreamWriteResult, EventStoreError> {
        let events = events.into();
        let url = self.http.stream_url(stream)?;
        let body = serde_json::to_vec(&events)?;
        debug!(stream, count = events.len(), %expected_version, "writing events");

        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        // Protocol headers override any caller-supplied value of the same name.
        headers.insert(
            HEADER_EXPECTED_VERSION,
            HeaderValue::from(expected_version.as_header_value()),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(EVENTS_MEDIA_TYPE));

        let resp = self
            .http
            .apply_defaults(self.http.inner.post(url))
            .headers(headers)
            .body(body)
            .send()
            .await?;
        classify_response(&resp)?;

        let version = resp
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(version_from_location)
            .ok_or(EventStoreError::NoExtractableVersion)?;
        Ok(StreamWriteResult { version })
    }

    /// Delete a stream.
    ///
    /// A soft-deleted stream comes back when written to again; a hard-deleted
    /// stream name answers 410 forever.
    pub async fn delete_stream(
        &self,
        stream: &str,
        mode: StreamDeletion,
    ) -> Result<(), EventStoreError> {
        let url = self.http.stream_url(stream)?;
        debug!(stream, ?mode, "deleting stream");

        let mut req = self.http.apply_defaults(self.http.inner.delete(url));
        if mode == StreamDeletion::Hard {
            req = req.header(HEADER_HARD_DELETE, "true");
        }
        let resp = req.send().await?;
        classify_response(&resp)?;
        Ok(())
    }
}

/// Version assigned by a write, read off the numeric tail of the Location
/// header. Anything but a bare number in the last segment yields `None`.
fn version_from_location(location: &str) -> Option<u64> {
    location.rsplit('/').next().and_then(|tail| tail.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_from_location_numeric_tail() {
        assert_eq!(
            version_from_location("http://127.0.0.1:2113/streams/orders/0"),
            Some(0)
        );
        assert_eq!(
            version_from_location("http://127.0.0.1:2113/streams/orders/13"),
            Some(13)
        );
    }

    #[test]
    fn test_version_from_location_rejects_non_numeric_tails() {
        assert_eq!(
            version_from_location("http://127.0.0.1:2113/streams/orders"),
            None
        );
        assert_eq!(
            version_from_location("http://127.0.0.1:2113/streams/orders/1/"),
            None
        );
        assert_eq!(version_from_location(""), None);
    }
}

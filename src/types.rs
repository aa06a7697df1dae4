//! Core types shared across read and write operations.

use std::fmt;

/// Optimistic-concurrency precondition sent with every write.
///
/// Encoded on the wire as the `Kurrent-ExpectedVersion` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// No precondition; the write always proceeds.
    #[default]
    Any,
    /// The stream must not exist yet.
    NoStream,
    /// The stream's current version must be exactly this value.
    Exact(u64),
}

impl ExpectedVersion {
    /// Wire encoding used in the expected-version header.
    pub(crate) fn as_header_value(self) -> i64 {
        match self {
            ExpectedVersion::Any => -2,
            ExpectedVersion::NoStream => -1,
            ExpectedVersion::Exact(version) => version as i64,
        }
    }
}

impl fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedVersion::Any => write!(f, "any"),
            ExpectedVersion::NoStream => write!(f, "no-stream"),
            ExpectedVersion::Exact(version) => write!(f, "{version}"),
        }
    }
}

impl From<u64> for ExpectedVersion {
    fn from(version: u64) -> Self {
        ExpectedVersion::Exact(version)
    }
}

/// How a stream is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamDeletion {
    /// The stream can be recreated by writing to it again.
    #[default]
    Soft,
    /// The stream name is gone for good; further access yields 410.
    Hard,
}

/// Outcome of a successful write.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct StreamWriteResult {
    /// Version assigned to the last event written.
    pub version: u64,
}

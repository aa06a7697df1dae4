//! Atom feed pages: links, entries, and embedded event payloads.

use std::fmt;

use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::error::EventStoreError;

/// Link relation names used by feeds and their entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkRelation {
    /// Newest page of the stream.
    First,
    /// Oldest page of the stream.
    Last,
    /// Page with newer events; absent on the newest page.
    Previous,
    /// Page with older events; absent on the oldest page.
    Next,
    /// Stream metadata document.
    Metadata,
    /// Canonical URI of an entry's event document.
    Alternate,
    /// The page itself (wire value `self`).
    #[serde(rename = "self")]
    SelfRel,
    /// Writable URI of an entry's event.
    Edit,
}

impl LinkRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkRelation::First => "first",
            LinkRelation::Last => "last",
            LinkRelation::Previous => "previous",
            LinkRelation::Next => "next",
            LinkRelation::Metadata => "metadata",
            LinkRelation::Alternate => "alternate",
            LinkRelation::SelfRel => "self",
            LinkRelation::Edit => "edit",
        }
    }
}

impl fmt::Display for LinkRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single hyperlink from a feed or entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub relation: LinkRelation,
    pub uri: Url,
}

/// Ordered set of links; lookups return the first match.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct LinkSet {
    links: Vec<Link>,
}

impl LinkSet {
    pub fn find(&self, relation: LinkRelation) -> Option<&Link> {
        self.links.iter().find(|link| link.relation == relation)
    }

    pub fn uri(&self, relation: LinkRelation) -> Option<&Url> {
        self.find(relation).map(|link| &link.uri)
    }

    pub fn has(&self, relation: LinkRelation) -> bool {
        self.find(relation).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        self.links.iter()
    }
}

/// How much event content the server embeds into feed entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntryEmbedMode {
    /// Entries carry links only.
    #[default]
    None,
    /// Entries carry event attributes but not payloads.
    Rich,
    /// Entries carry full payloads as JSON strings.
    Body,
}

impl EntryEmbedMode {
    /// Value for the `embed` query parameter, if one is needed.
    pub(crate) fn to_query_value(self) -> Option<&'static str> {
        match self {
            EntryEmbedMode::None => None,
            EntryEmbedMode::Rich => Some("rich"),
            EntryEmbedMode::Body => Some("body"),
        }
    }
}

/// One feed entry. Fields beyond the Atom basics are only populated when
/// the feed was requested with a rich or body embed mode.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Entry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub retry_count: Option<i64>,
    #[serde(default)]
    pub links: LinkSet,
    #[serde(default, deserialize_with = "tolerant_event_id")]
    pub event_id: Option<Uuid>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub event_number: Option<u64>,
    #[serde(default, deserialize_with = "embedded_payload")]
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "embedded_payload")]
    pub meta_data: Option<Value>,
    #[serde(default)]
    pub stream_id: Option<String>,
    #[serde(default)]
    pub is_json: Option<bool>,
    #[serde(default)]
    pub is_meta_data: Option<bool>,
    #[serde(default)]
    pub is_link_meta_data: Option<bool>,
    #[serde(default)]
    pub is_redacted: Option<bool>,
    #[serde(default)]
    pub position_event_number: Option<u64>,
    #[serde(default)]
    pub position_stream_id: Option<String>,
}

impl Entry {
    /// URI of the entry's event document.
    pub fn event_url(&self) -> Option<&Url> {
        self.links.uri(LinkRelation::Alternate)
    }
}

/// Embedded payloads arrive either as JSON structures (rich mode) or as
/// JSON-encoded strings (body mode). Anything undecodable becomes `None`.
fn embedded_payload<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => serde_json::from_str(&text).ok(),
        value => Some(value),
    })
}

/// The server serializes an unset event id as `""`, which is not a UUID.
fn tolerant_event_id<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(id) => Uuid::parse_str(id).map(Some).map_err(de::Error::custom),
    }
}

#[derive(Deserialize)]
struct WireFeed {
    #[serde(default)]
    links: LinkSet,
    #[serde(default)]
    entries: Vec<Entry>,
}

/// One page of a stream feed.
///
/// Entries are ordered newest first, as served. The raw document is kept
/// for callers that need fields this crate does not model.
#[derive(Debug, Clone)]
pub struct StreamFeed {
    links: LinkSet,
    entries: Vec<Entry>,
    embed_mode: EntryEmbedMode,
    raw: Value,
}

impl StreamFeed {
    pub(crate) fn decode(raw: Value, embed_mode: EntryEmbedMode) -> Result<Self, EventStoreError> {
        let wire: WireFeed = serde_json::from_value(raw.clone())?;
        Ok(StreamFeed {
            links: wire.links,
            entries: wire.entries,
            embed_mode,
            raw,
        })
    }

    pub fn links(&self) -> &LinkSet {
        &self.links
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Embed mode the page was requested with.
    pub fn embed_mode(&self) -> EntryEmbedMode {
        self.embed_mode
    }

    pub fn has_link(&self, relation: LinkRelation) -> bool {
        self.links.has(relation)
    }

    /// The page as served, before decoding.
    pub fn as_json(&self) -> &Value {
        &self.raw
    }
}

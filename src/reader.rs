//! Read side: feed pages, link navigation, and event fetches.

use futures::future::join_all;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::client::Http;
use crate::error::{classify_response, EventStoreError};
use crate::event::Event;
use crate::feed::{EntryEmbedMode, LinkRelation, StreamFeed};

/// Read-side handle for stream feeds and events.
#[derive(Clone)]
pub struct StreamReader {
    pub(crate) http: Http,
}

impl StreamReader {
    pub(crate) fn new(http: Http) -> Self {
        StreamReader { http }
    }

    /// Fetch the head page of a stream's feed.
    pub async fn open_stream_feed(
        &self,
        stream: &str,
        embed_mode: EntryEmbedMode,
    ) -> Result<StreamFeed, EventStoreError> {
        let url = self.http.stream_url(stream)?;
        self.fetch_feed(url, embed_mode).await
    }

    /// Follow a link relation off a feed page.
    ///
    /// Returns `None` when the feed carries no link for the relation, without
    /// touching the network. The resulting page is requested with, and keeps,
    /// the source feed's embed mode.
    pub async fn navigate_stream_feed(
        &self,
        feed: &StreamFeed,
        relation: LinkRelation,
    ) -> Result<Option<StreamFeed>, EventStoreError> {
        let Some(url) = feed.links().uri(relation) else {
            return Ok(None);
        };
        let page = self.fetch_feed(url.clone(), feed.embed_mode()).await?;
        Ok(Some(page))
    }

    /// Fetch a single event document.
    pub async fn read_event(&self, url: &Url) -> Result<Event, EventStoreError> {
        let resp = self.http.get_atom(url.clone()).send().await?;
        classify_response(&resp)?;
        let body = resp.bytes().await?;
        let value: Value = serde_json::from_slice(&body)?;
        Event::decode(&value)
    }

    /// Fetch several event documents concurrently.
    ///
    /// Events come back in the order of `urls`. Documents that do not decode
    /// as events are dropped; a transport failure or error status fails the
    /// whole batch with the first error in request order.
    pub async fn read_event_batch(&self, urls: &[Url]) -> Result<Vec<Event>, EventStoreError> {
        let events = self.read_event_batch_sparse(urls).await?;
        Ok(events.into_iter().flatten().collect())
    }

    /// Like [`read_event_batch`](Self::read_event_batch), but keeps one slot
    /// per URL so callers can correlate results positionally.
    pub(crate) async fn read_event_batch_sparse(
        &self,
        urls: &[Url],
    ) -> Result<Vec<Option<Event>>, EventStoreError> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = urls.len(), "reading event batch");

        let requests = urls.iter().map(|url| self.http.get_atom(url.clone()).send());
        let results = join_all(requests).await;

        let mut responses = Vec::with_capacity(results.len());
        for result in results {
            let resp = result?;
            classify_response(&resp)?;
            responses.push(resp);
        }

        let mut events = Vec::with_capacity(responses.len());
        for resp in responses {
            let body = resp.bytes().await?;
            let event = serde_json::from_slice::<Value>(&body)
                .ok()
                .and_then(|value| Event::decode(&value).ok());
            events.push(event);
        }
        Ok(events)
    }

    pub(crate) async fn fetch_feed(
        &self,
        url: Url,
        embed_mode: EntryEmbedMode,
    ) -> Result<StreamFeed, EventStoreError> {
        let url = with_embed_mode(url, embed_mode);
        debug!(url = %url, "fetching stream feed");
        let resp = self.http.get_atom(url).send().await?;
        classify_response(&resp)?;
        let body = resp.bytes().await?;
        let value: Value = serde_json::from_slice(&body)?;
        StreamFeed::decode(value, embed_mode)
    }
}

/// Add or replace the `embed` query parameter. Paging links served by the
/// feed do not always carry it, so every feed fetch threads it explicitly.
fn with_embed_mode(mut url: Url, embed_mode: EntryEmbedMode) -> Url {
    let Some(embed) = embed_mode.to_query_value() else {
        return url;
    };
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .filter(|(key, _)| key != "embed")
        .collect();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
        pairs.append_pair("embed", embed);
    }
    url
}

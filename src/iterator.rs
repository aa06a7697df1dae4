//! Stream-order iteration over paginated feeds.

use std::collections::VecDeque;

use tracing::debug;
use url::Url;

use crate::error::EventStoreError;
use crate::event::Event;
use crate::feed::{Entry, EntryEmbedMode, LinkRelation, StreamFeed};
use crate::reader::StreamReader;

/// A feed entry paired with its decoded event.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct EntryWithEvent {
    pub entry: Entry,
    pub event: Event,
}

impl EntryWithEvent {
    /// Entry title, `"<version>@<stream>"`, unique within a stream.
    pub fn key(&self) -> &str {
        &self.entry.title
    }
}

/// Pull iterator over every event of a stream, page by page.
///
/// A forward iterator starts at the oldest page (the `last` link) and walks
/// `previous` links toward the head, reversing each page so events come out
/// oldest first. A backward iterator starts at the newest page (the `first`
/// link) and walks `next` links, yielding events newest first.
///
/// ```ignore
/// let mut events = store.forward_iterator("orders");
/// while let Some(pair) = events.next().await? {
///     println!("{} {}", pair.key(), pair.event.event_type);
/// }
/// ```
pub struct StreamFeedIterator {
    reader: StreamReader,
    stream: String,
    start_relation: LinkRelation,
    navigation_relation: LinkRelation,
    reverse_page: bool,
    pages_left: usize,
    feed: Option<StreamFeed>,
    pairs: VecDeque<EntryWithEvent>,
    rewound: bool,
    done: bool,
}

impl StreamFeedIterator {
    /// Iterator from the oldest event toward the head of the stream.
    pub fn forward(reader: StreamReader, stream: impl Into<String>) -> Self {
        Self::new(
            reader,
            stream,
            LinkRelation::Last,
            LinkRelation::Previous,
            true,
        )
    }

    /// Iterator from the newest event toward the tail of the stream.
    pub fn backward(reader: StreamReader, stream: impl Into<String>) -> Self {
        Self::new(
            reader,
            stream,
            LinkRelation::First,
            LinkRelation::Next,
            false,
        )
    }

    fn new(
        reader: StreamReader,
        stream: impl Into<String>,
        start_relation: LinkRelation,
        navigation_relation: LinkRelation,
        reverse_page: bool,
    ) -> Self {
        StreamFeedIterator {
            reader,
            stream: stream.into(),
            start_relation,
            navigation_relation,
            reverse_page,
            pages_left: usize::MAX,
            feed: None,
            pairs: VecDeque::new(),
            rewound: false,
            done: false,
        }
    }

    /// Cap how many pages the iterator fetches beyond the starting page.
    ///
    /// The budget is fixed here once; rewinding does not replenish it.
    #[must_use]
    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.pages_left = limit.saturating_sub(1);
        self
    }

    /// Link target the walk would fetch next, usable as a checkpoint.
    ///
    /// `None` before the first page is loaded and once the current page
    /// carries no further link in the walk direction.
    pub fn next_url(&self) -> Option<&Url> {
        self.feed
            .as_ref()
            .and_then(|feed| feed.links().uri(self.navigation_relation))
    }

    /// Position at the first page of the walk.
    ///
    /// Calling this again without an intervening [`next`](Self::next) is a
    /// no-op; after events have been consumed it restarts from the beginning.
    pub async fn rewind(&mut self) -> Result<(), EventStoreError> {
        if self.rewound {
            return Ok(());
        }
        debug!(stream = %self.stream, start = %self.start_relation, "rewinding feed iterator");
        self.done = false;
        self.pairs.clear();
        self.feed = None;

        let head = self
            .reader
            .open_stream_feed(&self.stream, EntryEmbedMode::None)
            .await?;
        let start = if head.has_link(self.start_relation) {
            self.reader
                .navigate_stream_feed(&head, self.start_relation)
                .await?
        } else {
            // Streams short enough for one page carry no paging links; the
            // head is the whole walk.
            Some(head)
        };
        match start {
            Some(page) => self.load_page(page).await?,
            None => self.done = true,
        }
        self.rewound = true;
        Ok(())
    }

    /// Yield the next event, fetching pages as needed.
    ///
    /// Returns `Ok(None)` once the walk is exhausted; later calls keep
    /// returning `Ok(None)` unless [`rewind`](Self::rewind) is called in
    /// between.
    pub async fn next(&mut self) -> Result<Option<EntryWithEvent>, EventStoreError> {
        if self.done && !self.rewound {
            return Ok(None);
        }
        // First pull starts the walk; afterwards a page is always loaded.
        if self.feed.is_none() && !self.done {
            self.rewind().await?;
        }
        self.rewound = false;

        if self.done {
            return Ok(None);
        }
        if let Some(pair) = self.pairs.pop_front() {
            return Ok(Some(pair));
        }
        if self.pages_left == 0 {
            self.done = true;
            return Ok(None);
        }

        let next_page = {
            let Some(feed) = self.feed.as_ref() else {
                self.done = true;
                return Ok(None);
            };
            self.reader
                .navigate_stream_feed(feed, self.navigation_relation)
                .await?
        };
        match next_page {
            Some(page) => {
                self.pages_left -= 1;
                self.load_page(page).await?;
                Ok(self.pairs.pop_front())
            }
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }

    /// Decode a page into entry/event pairs. A page that contributes no
    /// pairs ends the walk.
    async fn load_page(&mut self, page: StreamFeed) -> Result<(), EventStoreError> {
        let mut entries: Vec<Entry> = page.entries().to_vec();
        if self.reverse_page {
            entries.reverse();
        }
        entries.retain(|entry| entry.event_url().is_some());

        let urls: Vec<Url> = entries
            .iter()
            .filter_map(|entry| entry.event_url().cloned())
            .collect();
        let events = self.reader.read_event_batch_sparse(&urls).await?;

        self.pairs = entries
            .into_iter()
            .zip(events)
            .filter_map(|(entry, event)| event.map(|event| EntryWithEvent { entry, event }))
            .collect();
        self.feed = Some(page);
        if self.pairs.is_empty() {
            self.done = true;
        }
        debug!(pairs = self.pairs.len(), "loaded feed page");
        Ok(())
    }
}

//! The record types shared by every stage of the update pipeline.
//!
//! `FeedEntry` is a single item from a feed, `FetchedFeed` is what a
//! [`FeedSource`](super::FeedSource) hands back, and `FeedSnapshot` is the
//! per-source state that gets persisted between runs.
//!
//! ## For contributors
//!
//! The serde layout of these structs *is* the on-disk format.  Keys are
//! camelCase and every display field defaults to an empty string, so older
//! snapshots missing a field still load.  If you change the shape in a way
//! that older files cannot satisfy, bump [`SNAPSHOT_VERSION`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version written into every persisted snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A media attachment (podcast audio, image, ...) carried by an entry.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enclosure {
    pub url: String,
    #[serde(default)]
    pub media_type: String,
}

/// A single feed entry, normalised from whatever format the source speaks.
///
/// Entries are identified by [`link`](FeedEntry::link).  An entry with an
/// empty link cannot be de-duplicated across fetches and never makes it into
/// a snapshot.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedEntry {
    /// Identity key within a source.
    pub link: String,

    /// Human-readable headline.
    pub title: String,

    /// Publication date exactly as the feed wrote it.
    pub published_at: String,

    /// Publication date normalised to RFC 3339, empty if unparseable.
    pub iso_date: String,

    /// Full content (or the description when the feed has no content).
    pub body: String,

    /// Plain-text excerpt of the description.
    pub body_snippet: String,

    pub author: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enclosure: Option<Enclosure>,

    /// Generated summary.
    ///
    /// `None` until the summarizer has produced something; once non-empty it
    /// is carried forward by every later merge and never regenerated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl FeedEntry {
    /// The trimmed link, or `None` when the entry has no usable identity.
    pub fn identity(&self) -> Option<&str> {
        let link = self.link.trim();
        (!link.is_empty()).then_some(link)
    }

    /// True once a non-empty summary is attached.
    pub fn has_summary(&self) -> bool {
        self.summary.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    /// The text handed to the summarizer: the body, or the snippet when the
    /// feed carried no body.
    pub fn summary_input(&self) -> &str {
        if self.body.trim().is_empty() {
            &self.body_snippet
        } else {
            &self.body
        }
    }
}

/// Feed-level metadata plus entries, as returned by a fetch.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FetchedFeed {
    pub title: String,
    pub description: String,
    pub link: String,
    pub items: Vec<FeedEntry>,
}

/// The persisted merged state for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Canonical URL / identifier of the source.
    pub source_url: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub link: String,

    /// Entries in latest-fetch order.
    #[serde(default)]
    pub items: Vec<FeedEntry>,

    pub last_updated: DateTime<Utc>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl FeedSnapshot {
    /// Assemble a snapshot from freshly fetched metadata and merged items.
    pub fn assemble(
        source_url: impl Into<String>,
        feed: &FetchedFeed,
        items: Vec<FeedEntry>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            source_url: source_url.into(),
            title: feed.title.clone(),
            description: feed.description.clone(),
            link: feed.link.clone(),
            items,
            last_updated,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

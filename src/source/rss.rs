//! RSS feed source implementation.
//!
//! Fetches an RSS 2.0 document over HTTP and normalises it into
//! [`FetchedFeed`].  The parsing half is a pure function so tests can
//! exercise it without the network.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use tracing::debug;

use super::{Enclosure, FeedEntry, FeedSource, FetchedFeed};
use crate::error::FetchError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest plain-text excerpt kept in [`FeedEntry::body_snippet`].
const SNIPPET_CHARS: usize = 500;

/// An RSS feed data source backed by a shared HTTP client.
pub struct RssSource {
    client: reqwest::Client,
}

impl RssSource {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Parse an already-fetched [`rss::Channel`] into a [`FetchedFeed`].
    pub fn parse_channel(channel: &rss::Channel) -> FetchedFeed {
        let items = channel.items().iter().map(parse_item).collect();

        FetchedFeed {
            title: channel.title().to_string(),
            description: channel.description().to_string(),
            link: channel.link().to_string(),
            items,
        }
    }
}

fn parse_item(item: &rss::Item) -> FeedEntry {
    // Prefer <link>, fall back to a permalink <guid>.
    let link = item
        .link()
        .or_else(|| {
            item.guid()
                .filter(|g| g.is_permalink())
                .map(|g| g.value())
        })
        .unwrap_or_default()
        .trim()
        .to_string();

    let published_at = item.pub_date().unwrap_or_default().to_string();

    // RFC-2822 → RFC-3339; degrade to empty on failure.
    let iso_date = DateTime::parse_from_rfc2822(published_at.trim())
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default();

    let description = item.description().unwrap_or_default();
    let body = item.content().unwrap_or(description).to_string();

    let author = item
        .author()
        .map(String::from)
        .or_else(|| {
            item.dublin_core_ext()
                .and_then(|dc| dc.creators().first().cloned())
        })
        .unwrap_or_default();

    let enclosure = item.enclosure().map(|e| Enclosure {
        url: e.url().to_string(),
        media_type: e.mime_type().to_string(),
    });

    FeedEntry {
        link,
        title: item.title().unwrap_or_default().to_string(),
        published_at,
        iso_date,
        body_snippet: snippet(if description.is_empty() { body.as_str() } else { description }),
        body,
        author,
        enclosure,
        summary: None,
    }
}

/// Strip markup from `html`, collapse whitespace and cap the length.
fn snippet(html: &str) -> String {
    let mut text = String::with_capacity(html.len().min(SNIPPET_CHARS * 2));
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(SNIPPET_CHARS)
        .collect()
}

#[async_trait]
impl FeedSource for RssSource {
    async fn fetch(&self, source_id: &str) -> Result<FetchedFeed, FetchError> {
        let response = self.client.get(source_id).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await?;
        let channel = rss::Channel::read_from(body.as_ref())?;
        let feed = Self::parse_channel(&channel);
        debug!(source = %source_id, items = feed.items.len(), "fetched feed");
        Ok(feed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

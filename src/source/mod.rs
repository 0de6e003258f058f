//! Feed source abstraction layer.
//!
//! This module defines the [`FeedSource`] trait and the record types shared
//! by the whole pipeline.  Concrete source implementations live in
//! sub-modules (currently only [`rss`]).
//!
//! ## For contributors: adding a new source
//!
//! 1. Create a new file in this directory (e.g. `atom.rs`).
//! 2. Define a struct (e.g. `AtomSource`) and implement [`FeedSource`] for it.
//! 3. Add `mod atom;` below and re-export your struct in the `pub use` block.
//! 4. Construct it in `main.rs` in place of (or alongside) `RssSource`.
//!
//! Merging, summarization and persistence are all source-agnostic.

mod feed_item;
mod rss;

pub use feed_item::{Enclosure, FeedEntry, FeedSnapshot, FetchedFeed, SNAPSHOT_VERSION};
pub use rss::RssSource;

use async_trait::async_trait;

use crate::error::FetchError;

/// Trait that every feed source must implement.
///
/// The pipeline calls [`fetch()`](FeedSource::fetch) once per source per run.
///
/// ```ignore
/// pub struct MySource { /* client, credentials */ }
///
/// #[async_trait]
/// impl FeedSource for MySource {
///     async fn fetch(&self, source_id: &str) -> Result<FetchedFeed, FetchError> {
///         // Perform HTTP / IO, then convert into FeedEntry values.
///         todo!()
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the current contents of the feed identified by `source_id`
    /// (its canonical URL).
    async fn fetch(&self, source_id: &str) -> Result<FetchedFeed, FetchError>;
}

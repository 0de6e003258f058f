//! Snapshot persistence.
//!
//! One JSON document per source.  Writes go to a sibling `.tmp` file which
//! is then renamed over the target, so a reader never sees a half-written
//! snapshot.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::PersistError;
use crate::source::FeedSnapshot;

/// Key-value blob store keyed by source identifier.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The previous snapshot for `source_id`, or `None` if there is none.
    async fn load(&self, source_id: &str) -> Result<Option<FeedSnapshot>, PersistError>;

    /// Replace the stored snapshot for `source_id`.
    async fn save(&self, source_id: &str, snapshot: &FeedSnapshot) -> Result<(), PersistError>;
}

/// Filesystem-safe file name for a source identifier.
///
/// ASCII letters and digits are kept (lowercased); everything else becomes
/// `_`.  The stem is lossy, so the first 16 hex digits of the SHA-256 of the
/// raw identifier are appended to keep distinct sources apart:
/// `https://Example.com/feed.xml` → `https___example_com_feed_xml-<hash>.json`.
pub fn storage_key(source_id: &str) -> String {
    let mut key: String = source_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if key.is_empty() {
        key.push('_');
    }

    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    key.push('-');
    key.push_str(&digest[..16]);
    key.push_str(".json");
    key
}

/// Stores snapshots as pretty-printed JSON files in one directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, source_id: &str) -> PathBuf {
        self.dir.join(storage_key(source_id))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistError + '_ {
    move |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn load(&self, source_id: &str) -> Result<Option<FeedSnapshot>, PersistError> {
        let path = self.path_for(source_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path)(e)),
        };

        match serde_json::from_slice::<FeedSnapshot>(&bytes) {
            Ok(snapshot) if snapshot.source_url != source_id => {
                warn!(
                    path = %path.display(),
                    source = %source_id,
                    stored = %snapshot.source_url,
                    "ignoring snapshot written for another source"
                );
                Ok(None)
            }
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                // undecodable snapshots count as absent
                warn!(path = %path.display(), error = %e, "ignoring corrupt snapshot");
                Ok(None)
            }
        }
    }

    async fn save(&self, source_id: &str, snapshot: &FeedSnapshot) -> Result<(), PersistError> {
        let path = self.path_for(source_id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(snapshot)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(io_error(&self.dir))?;
        tokio::fs::write(&tmp, &bytes).await.map_err(io_error(&tmp))?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_error(&path))?;

        debug!(path = %path.display(), items = snapshot.items.len(), "snapshot saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

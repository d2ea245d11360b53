//! Source discovery.
//!
//! Decides which remote objects a run processes. Three strategies exist:
//! - **manifest**: a JSON track list `{"input": ["key", ...]}`
//! - **live scan**: every audio key in the bucket
//! - **cache recovery**: whatever is already staged locally, with no remote
//!   keys attached (used to resume a run whose downloads already finished)
//!
//! Only `.mp3` keys are kept; directory markers (keys ending in `/`) are
//! always dropped. Order follows the manifest or the store's listing.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::staging::StagingCache;
use crate::store::ObjectStore;

/// Extension of the audio files this tool migrates.
pub const AUDIO_EXTENSION: &str = "mp3";

/// Remote key of an object to process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for SourceId {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check if a key or filename names an audio object.
///
/// The suffix match is exact: `Song.MP3` is not migrated.
pub fn is_audio_key(key: &str) -> bool {
    key.strip_suffix(AUDIO_EXTENSION)
        .is_some_and(|stem| stem.ends_with('.'))
}

/// How a run finds its sources. Each variant carries only what it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryMode {
    /// Read keys from a JSON track list.
    Manifest { path: PathBuf },
    /// List the bucket.
    LiveScan,
    /// Walk an existing staging directory.
    CacheRecovery { directory: PathBuf },
}

impl DiscoveryMode {
    /// Name as written in the config file.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Manifest { .. } => "track_list",
            Self::LiveScan => "dynamic",
            Self::CacheRecovery { .. } => "cache",
        }
    }

    pub fn is_cache_recovery(&self) -> bool {
        matches!(self, Self::CacheRecovery { .. })
    }
}

/// What discovery produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovered {
    /// Remote keys still to be downloaded.
    Remote(Vec<SourceId>),
    /// Files already staged locally; their remote keys are unknown.
    Cached(Vec<PathBuf>),
}

impl Discovered {
    pub fn len(&self) -> usize {
        match self {
            Self::Remote(ids) => ids.len(),
            Self::Cached(paths) => paths.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    input: Vec<String>,
}

/// Produces the source set for a run.
#[derive(Debug, Clone)]
pub struct SourceEnumerator {
    mode: DiscoveryMode,
}

impl SourceEnumerator {
    pub fn new(mode: DiscoveryMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> &DiscoveryMode {
        &self.mode
    }

    /// Run discovery. Only live scans touch the store.
    pub async fn enumerate<S>(&self, store: &S) -> Result<Discovered>
    where
        S: ObjectStore + ?Sized,
    {
        tracing::debug!(target: "sortie::sources", mode = self.mode.name(), "Using track listing mode");

        let discovered = match &self.mode {
            DiscoveryMode::Manifest { path } => Discovered::Remote(ingest_manifest(path)?),
            DiscoveryMode::LiveScan => {
                let contents = store.list_bucket_contents().await?;
                tracing::debug!(target: "sortie::sources", count = contents.len(), "Bucket contents found");
                Discovered::Remote(filter_listing(contents))
            }
            DiscoveryMode::CacheRecovery { directory } => {
                Discovered::Cached(StagingCache::new(directory).list_staged()?)
            }
        };

        tracing::info!(target: "sortie::sources", count = discovered.len(), "Tracks found");
        Ok(discovered)
    }
}

/// Read a JSON track list, keeping audio keys in manifest order.
pub fn ingest_manifest(path: &Path) -> Result<Vec<SourceId>> {
    let contents = fs::read_to_string(path)
        .map_err(|e| Error::manifest(path, format!("failed to read track list: {e}")))?;
    let manifest: Manifest = serde_json::from_str(&contents)
        .map_err(|e| Error::manifest(path, format!("invalid track list: {e}")))?;
    Ok(filter_listing(manifest.input))
}

/// Keep audio keys, drop directory markers and repeats, preserve order.
pub fn filter_listing<I>(keys: I) -> Vec<SourceId>
where
    I: IntoIterator,
    I::Item: Into<SourceId>,
{
    let mut seen = HashSet::new();
    keys.into_iter()
        .map(Into::into)
        .filter(|id: &SourceId| is_audio_key(id.as_str()))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

//! Local staging cache.
//!
//! Downloaded originals are kept under a name derived from their remote key
//! with a name-based UUID (v5, OID namespace). The same key always maps to
//! the same local file, so re-running or resuming a migration never stages
//! an object twice under different names.
//!
//! The directory can be re-walked without knowing the original keys, which
//! is what makes cache-recovery runs possible.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::sources::{SourceId, is_audio_key};

/// A downloaded object on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFile {
    pub local_path: PathBuf,
    /// Remote key this file was downloaded from, when known.
    ///
    /// `None` for files recovered from a pre-existing cache.
    pub origin: Option<SourceId>,
}

/// The staging directory.
#[derive(Debug, Clone)]
pub struct StagingCache {
    dir: PathBuf,
}

impl StagingCache {
    /// Create a handle on a staging directory. Nothing is touched on disk
    /// until the directory is first used.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory (and parents) if absent.
    pub fn ensure_dir(&self) -> Result<()> {
        if !self.dir.is_dir() {
            tracing::debug!(target: "sortie::staging", dir = %self.dir.display(), "Creating staging directory");
            fs::create_dir_all(&self.dir).map_err(|e| Error::filesystem(&self.dir, e))?;
        }
        Ok(())
    }

    /// Deterministic local filename for a remote key.
    pub fn stage_name_for(source: &SourceId) -> String {
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, source.as_str().as_bytes());
        format!("{id}.mp3")
    }

    /// Full local path a remote key is staged at.
    pub fn stage_path_for(&self, source: &SourceId) -> PathBuf {
        self.dir.join(Self::stage_name_for(source))
    }

    /// All staged audio files, recursively, in sorted order.
    pub fn list_staged(&self) -> Result<Vec<PathBuf>> {
        self.ensure_dir()?;

        let mut staged = Vec::new();
        for entry in WalkDir::new(&self.dir) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.dir).to_path_buf();
                Error::filesystem(path, e.into())
            })?;
            if entry.file_type().is_file()
                && entry.file_name().to_str().is_some_and(is_audio_key)
            {
                staged.push(entry.into_path());
            }
        }
        staged.sort();

        tracing::debug!(target: "sortie::staging", count = staged.len(), "Staged files listed");
        Ok(staged)
    }

    /// Recursively delete the staging directory.
    ///
    /// An already-absent directory is fine; anything short of full removal
    /// is an error.
    pub fn purge(&self) -> Result<()> {
        tracing::warn!(target: "sortie::staging", dir = %self.dir.display(), "Erasing staging directory");
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::filesystem(&self.dir, e)),
        }
    }
}


/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Staging the same key twice yields the same filename
        #[test]
        fn stage_name_idempotent(key in "[a-zA-Z0-9/._ -]{1,80}") {
            let id = SourceId::from(key.as_str());
            prop_assert_eq!(
                StagingCache::stage_name_for(&id),
                StagingCache::stage_name_for(&SourceId::from(key.as_str()))
            );
        }

        /// Distinct keys get distinct filenames
        #[test]
        fn stage_name_collision_free(a in "[a-z0-9/]{1,40}", b in "[a-z0-9/]{1,40}") {
            prop_assume!(a != b);
            prop_assert_ne!(
                StagingCache::stage_name_for(&SourceId::from(a.as_str())),
                StagingCache::stage_name_for(&SourceId::from(b.as_str()))
            );
        }
    }
}

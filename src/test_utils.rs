//! Test utilities and fixtures for sortie tests.
//!
//! - [`MockStore`]: an in-memory [`ObjectStore`] that records every call
//! - [`FakeTagReader`]: a [`TagReader`] that reads `key=value` lines
//!   instead of real audio tags, so fixtures can be plain bytes
//!
//! # Example
//!
//! ```ignore
//! let store = MockStore::with_objects(&[("music/01.mp3", tagged("A", "B", "C").as_slice())]);
//! store.download(&"music/01.mp3".into(), &dest).await?;
//! assert_eq!(store.calls(), vec![StoreCall::Download("music/01.mp3".into(), dest)]);
//! ```

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::metadata::{TagReader, TrackMetadata};
use crate::sources::SourceId;
use crate::store::ObjectStore;

/// A call made against a [`MockStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List,
    Download(SourceId, PathBuf),
    Upload(String),
    Delete(SourceId),
}

/// In-memory object store.
///
/// Keys list in lexical order, like S3.
#[derive(Debug, Default)]
pub struct MockStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    denied: HashSet<&'static str>,
    calls: Mutex<Vec<StoreCall>>,
}

impl MockStore {
    /// Creates a store pre-populated with objects.
    pub fn with_objects(objects: &[(&str, &[u8])]) -> Self {
        let store = Self::default();
        {
            let mut map = store.objects.lock().unwrap();
            for (key, data) in objects {
                map.insert(key.to_string(), data.to_vec());
            }
        }
        store
    }

    /// Reject an operation (`list`, `download`, `upload`, `delete`) as
    /// unauthorized.
    pub fn deny(mut self, operation: &'static str) -> Self {
        self.denied.insert(operation);
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Current content of an object.
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, operation: &'static str, key: &str) -> Result<()> {
        if self.denied.contains(operation) {
            return Err(Error::PermissionDenied {
                operation,
                key: key.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    fn bucket(&self) -> &str {
        "mock-bucket"
    }

    async fn list_bucket_contents(&self) -> Result<Vec<SourceId>> {
        self.record(StoreCall::List);
        self.check("list", "mock-bucket")?;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .map(|k| SourceId::from(k.as_str()))
            .collect())
    }

    async fn download(&self, source: &SourceId, destination: &Path) -> Result<()> {
        self.record(StoreCall::Download(source.clone(), destination.to_path_buf()));
        self.check("download", source.as_str())?;
        let data = self.object(source.as_str()).ok_or_else(|| Error::Store {
            operation: "download",
            key: source.to_string(),
            message: "NoSuchKey".to_string(),
        })?;
        std::fs::write(destination, data).map_err(|e| Error::filesystem(destination, e))
    }

    async fn upload(&self, local_path: &Path, destination: &str) -> Result<()> {
        self.record(StoreCall::Upload(destination.to_string()));
        self.check("upload", destination)?;
        let data = std::fs::read(local_path).map_err(|e| Error::filesystem(local_path, e))?;
        self.objects
            .lock()
            .unwrap()
            .insert(destination.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &SourceId) -> Result<()> {
        self.record(StoreCall::Delete(key.clone()));
        self.check("delete", key.as_str())?;
        self.objects.lock().unwrap().remove(key.as_str());
        Ok(())
    }
}

/// Fixture bytes that [`FakeTagReader`] reads as the given tags.
pub fn tagged(artist: &str, album: &str, title: &str) -> Vec<u8> {
    format!("artist={artist}\nalbum={album}\ntitle={title}\n").into_bytes()
}

/// Tag reader over plain-text fixtures.
///
/// Files are read as `key=value` lines (`artist`, `album`, `title`); an
/// empty file has no tags and any other line makes the file "corrupt".
/// Per-filename overrides skip the disk entirely.
#[derive(Debug, Clone, Default)]
pub struct FakeTagReader {
    overrides: HashMap<String, TrackMetadata>,
}

impl FakeTagReader {
    /// Return `metadata` for any file named `file_name`.
    pub fn with(mut self, file_name: &str, metadata: TrackMetadata) -> Self {
        self.overrides.insert(file_name.to_string(), metadata);
        self
    }
}

impl TagReader for FakeTagReader {
    fn read(&self, path: &Path) -> Result<TrackMetadata> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if let Some(metadata) = self.overrides.get(name) {
            return Ok(metadata.clone());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::metadata(path, e.to_string()))?;
        let mut metadata = TrackMetadata::default();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| Error::metadata(path, "corrupt tag data"))?;
            let value = Some(value.to_string());
            match key {
                "artist" => metadata.artist = value,
                "album" => metadata.album = value,
                "title" => metadata.title = value,
                _ => return Err(Error::metadata(path, format!("unknown tag '{key}'"))),
            }
        }
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_fake_reader_parses_fixture() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("t.mp3");
        std::fs::write(&path, tagged("A", "B", "C")).unwrap();

        let meta = FakeTagReader::default().read(&path).unwrap();
        assert_eq!(meta, TrackMetadata::new("A", "B", "C"));
    }

    #[test]
    fn test_fake_reader_rejects_corrupt() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("t.mp3");
        std::fs::write(&path, "corrupt").unwrap();

        assert!(FakeTagReader::default().read(&path).is_err());
    }

    #[tokio::test]
    async fn test_mock_store_records_calls() {
        let store = MockStore::with_objects(&[("k.mp3", b"x".as_slice())]);
        store.delete(&SourceId::from("k.mp3")).await.unwrap();
        store.delete(&SourceId::from("k.mp3")).await.unwrap();

        assert!(store.object("k.mp3").is_none());
        assert_eq!(store.calls().len(), 2);
    }
}

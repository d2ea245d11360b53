//! Audio file metadata reading.
//!
//! Uses the lofty crate for format-independent tag access. Only the three
//! fields the destination template understands are extracted: artist,
//! album and title.
//!
//! Tag reading sits behind the [`TagReader`] trait so the pipeline can be
//! exercised in tests without real audio fixtures.

use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::Accessor;
use std::path::Path;

use crate::error::{Error, Result};

/// Track metadata as found in the file's tags.
///
/// Missing tags are legal and stay `None`; they render as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
}

impl TrackMetadata {
    /// Build metadata with all three fields present.
    pub fn new(
        artist: impl Into<String>,
        album: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            artist: Some(artist.into()),
            album: Some(album.into()),
            title: Some(title.into()),
        }
    }

    /// Look up a template variable by name.
    ///
    /// Unknown names and absent tags both yield `None`.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "artist" => self.artist.as_deref(),
            "album" => self.album.as_deref(),
            "title" => self.title.as_deref(),
            _ => None,
        }
    }
}

/// Reads tags from a local audio file.
pub trait TagReader {
    /// Extract metadata from the file at `path`.
    ///
    /// Absent tags are not an error; an unreadable or unsupported file is.
    fn read(&self, path: &Path) -> Result<TrackMetadata>;
}

/// [`TagReader`] backed by lofty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read(&self, path: &Path) -> Result<TrackMetadata> {
        read(path)
    }
}

/// Read artist/album/title from an audio file.
pub fn read(path: &Path) -> Result<TrackMetadata> {
    let tagged_file = Probe::open(path)
        .map_err(|e| Error::metadata(path, format!("failed to open file for probing: {e}")))?
        .read()
        .map_err(|e| Error::metadata(path, format!("failed to read file metadata: {e}")))?;

    // Get the primary tag, or fall back to the first available tag
    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag());

    let metadata = TrackMetadata {
        artist: tag.and_then(|t| t.artist().map(|s| s.to_string())),
        album: tag.and_then(|t| t.album().map(|s| s.to_string())),
        title: tag.and_then(|t| t.title().map(|s| s.to_string())),
    };

    tracing::debug!(
        target: "sortie::metadata",
        path = %path.display(),
        ?metadata,
        "Tags read"
    );
    Ok(metadata)
}

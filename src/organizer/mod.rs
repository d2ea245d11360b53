//! Destination path resolution.
//!
//! Turns a staged file into a remote key by reading its tags and rendering
//! them through a template such as `{{ artist }}/{{ album }}/{{ title }}.mp3`.
//!
//! # Template syntax
//! - `{{ name }}` substitutes a variable; whitespace inside the braces is ignored
//! - recognised variables: `artist`, `album`, `title`
//! - absent tags and unknown variables render as an empty string
//! - everything else is copied verbatim; no sanitization is applied, so
//!   characters that are illegal in keys are the template author's problem
//!
//! Templates are compiled once into a [`PathTemplate`], which reports syntax
//! errors up front instead of on the first track.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::metadata::{TagReader, TrackMetadata};
use crate::staging::StagedFile;

/// Variables a template may reference.
pub const TEMPLATE_VARIABLES: [&str; 3] = ["artist", "album", "title"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A compiled destination template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Compile a template string.
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after_open = &rest[open + 2..];
            let close = after_open.find("}}").ok_or_else(|| {
                Error::template(format!(
                    "unclosed '{{{{' at byte {} in '{}'",
                    template.len() - rest.len() + open,
                    template
                ))
            })?;

            let name = after_open[..close].trim();
            if !is_identifier(name) {
                return Err(Error::template(format!(
                    "invalid variable '{{{{{}}}}}' in '{}'",
                    &after_open[..close],
                    template
                )));
            }
            if !TEMPLATE_VARIABLES.contains(&name) {
                tracing::warn!(
                    target: "sortie::organizer",
                    variable = name,
                    "Unknown template variable will render as empty"
                );
            }
            segments.push(Segment::Variable(name.to_string()));
            rest = &after_open[close + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// Render the template against a track's metadata.
    pub fn render(&self, metadata: &TrackMetadata) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Variable(name) => metadata.field(name).unwrap_or(""),
            })
            .collect()
    }

    /// The template as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Render a template string against metadata in one step.
pub fn render_target_path(template: &str, metadata: &TrackMetadata) -> Result<String> {
    Ok(PathTemplate::parse(template)?.render(metadata))
}

/// A staged file paired with the remote key it will be published under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTrack {
    #[serde(flatten)]
    pub staged: StagedFile,
    pub target_path: String,
}

/// Reads tags from staged files and renders their destination keys.
pub struct PathResolver<R> {
    reader: R,
    template: PathTemplate,
}

impl<R: TagReader> PathResolver<R> {
    pub fn new(reader: R, template: PathTemplate) -> Self {
        Self { reader, template }
    }

    /// Extract metadata from a staged file.
    pub fn extract_metadata(&self, path: &Path) -> Result<TrackMetadata> {
        self.reader.read(path)
    }

    /// Resolve one staged file to its destination key.
    ///
    /// An empty render is an error rather than a default key.
    pub fn resolve(&self, staged: StagedFile) -> Result<ResolvedTrack> {
        let metadata = self.extract_metadata(&staged.local_path)?;
        let target_path = self.template.render(&metadata);
        if target_path.is_empty() {
            return Err(Error::EmptyTargetPath(staged.local_path));
        }
        tracing::info!(
            target: "sortie::organizer",
            local = %staged.local_path.display(),
            target = %target_path,
            "Target path resolved"
        );
        Ok(ResolvedTrack {
            staged,
            target_path,
        })
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }
}

/// The resolved source-to-target mapping of one run, exportable as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunPlan {
    pub generated_at: Option<String>,
    pub template: String,
    pub tracks: Vec<ResolvedTrack>,
}

impl RunPlan {
    pub fn new(template: &PathTemplate, tracks: &[ResolvedTrack]) -> Self {
        Self {
            generated_at: Some(Utc::now().to_rfc3339()),
            template: template.as_str().to_string(),
            tracks: tracks.to_vec(),
        }
    }

    /// Write the plan to disk as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|source| Error::Plan {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;
        }
        fs::write(path, json).map_err(|e| Error::filesystem(path, e))?;
        Ok(())
    }

    /// Load a previously saved plan.
    #[cfg(test)]
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| Error::filesystem(path, e))?;
        serde_json::from_str(&contents).map_err(|source| Error::Plan {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn targets(&self) -> impl Iterator<Item = (&PathBuf, &str)> {
        self.tracks
            .iter()
            .map(|t| (&t.staged.local_path, t.target_path.as_str()))
    }
}


/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Tag values that never contain template braces
    fn tag_value() -> impl Strategy<Value = Option<String>> {
        proptest::option::of(prop::string::string_regex("[a-zA-Z0-9 /:?_-]{0,30}").unwrap())
    }

    proptest! {
        /// Rendering is a pure function of template and tags
        #[test]
        fn render_is_deterministic(
            artist in tag_value(),
            album in tag_value(),
            title in tag_value(),
        ) {
            let meta = TrackMetadata { artist, album, title };
            let template = PathTemplate::parse("{{artist}}/{{album}}/{{title}}.mp3").unwrap();
            prop_assert_eq!(template.render(&meta), template.render(&meta));
        }

        /// Each field is substituted verbatim, absent fields as empty
        #[test]
        fn render_substitutes_verbatim(
            artist in tag_value(),
            album in tag_value(),
            title in tag_value(),
        ) {
            let expected = format!(
                "{}/{}/{}.mp3",
                artist.as_deref().unwrap_or(""),
                album.as_deref().unwrap_or(""),
                title.as_deref().unwrap_or(""),
            );
            let meta = TrackMetadata { artist, album, title };
            let rendered = render_target_path("{{ artist }}/{{ album }}/{{ title }}.mp3", &meta).unwrap();
            prop_assert_eq!(rendered, expected);
        }

        /// Templates without braces render unchanged
        #[test]
        fn literal_templates_are_identity(text in "[a-zA-Z0-9 /._-]{0,40}") {
            let template = PathTemplate::parse(&text).unwrap();
            prop_assert_eq!(template.render(&TrackMetadata::default()), text);
        }
    }
}

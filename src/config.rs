//! Configuration system using TOML files.
//!
//! The default config lives in the OS-standard config directory:
//! - Windows: %APPDATA%\sortie\config.toml
//! - macOS: ~/Library/Application Support/sortie/config.toml
//! - Linux: ~/.config/sortie/config.toml
//!
//! A different file can be passed with `--config`. Unlike most settings
//! files, a missing or incomplete config is fatal: there is no sensible
//! default bucket or destination template.
//!
//! The file is deserialized into [`ConfigFile`] and then validated into a
//! [`RunConfig`], which is what the rest of the crate consumes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

use crate::error::{Error, Result};
use crate::organizer::PathTemplate;
use crate::sources::DiscoveryMode;

// ============================================================================
// File Layout
// ============================================================================

/// Config file as written on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub aws: AwsSettings,
    pub bucket: BucketSection,
    pub ingestion: IngestionSection,
    pub cache: CacheSection,
    pub targeting: TargetingSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// AWS session settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsSettings {
    /// Named profile from the AWS CLI configuration (None = default chain)
    pub profile: Option<String>,

    /// Region override
    pub region: Option<String>,

    /// Endpoint override for S3-compatible stores (e.g. MinIO)
    pub endpoint_url: Option<String>,

    /// Use path-style addressing (`endpoint/bucket/key`)
    pub force_path_style: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketSection {
    pub name: String,
}

/// Discovery mode as written in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum IngestionSection {
    /// Keys come from a JSON track list.
    TrackList { track_list: PathBuf },
    /// Keys come from listing the bucket.
    Dynamic,
    /// Resume from the staging directory.
    Cache,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Staging directory
    pub directory: PathBuf,

    /// Keep the staging directory after the run
    #[serde(default)]
    pub persistent: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetingSection {
    /// Destination key template
    pub sort_mask: String,

    /// Delete the original objects once re-uploaded
    #[serde(default)]
    pub clean_up: bool,

    #[serde(default)]
    pub on_metadata_error: MetadataErrorPolicy,
}

/// What to do with a staged file whose tags cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataErrorPolicy {
    /// Fail the whole run.
    #[default]
    Abort,
    /// Log a warning and leave the file out of publish and clean-up.
    Skip,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Most verbose level shown: error, warn, info, debug or trace
    pub level: String,

    /// Also append log lines to `log_file`
    pub log_to_file: bool,

    /// Log file path (required when `log_to_file` is set)
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: None,
        }
    }
}

impl LoggingConfig {
    /// Parsed verbosity threshold.
    ///
    /// `off` is rejected: fatal errors must always reach the log.
    pub fn level_filter(&self) -> Result<LevelFilter> {
        match self.level.parse::<LevelFilter>() {
            Ok(level) if level == LevelFilter::OFF => Err(Error::config("logging level 'off' would hide fatal errors")),
            Ok(level) => Ok(level),
            Err(_) => Err(Error::config(format!("invalid logging level '{}'", self.level))),
        }
    }

    /// Log file to append to, if file logging is enabled.
    pub fn file(&self) -> Result<Option<&Path>> {
        if !self.log_to_file {
            return Ok(None);
        }
        self.log_file
            .as_deref()
            .map(Some)
            .ok_or_else(|| Error::config("logging.log_to_file is set but logging.log_file is missing"))
    }
}

// ============================================================================
// Validated Configuration
// ============================================================================

/// Everything one run needs, validated.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub aws: AwsSettings,
    pub bucket: String,
    pub discovery: DiscoveryMode,
    pub staging_dir: PathBuf,
    pub template: PathTemplate,
    pub clean_up: bool,
    pub persistent_cache: bool,
    pub on_metadata_error: MetadataErrorPolicy,
    pub logging: LoggingConfig,
}

impl RunConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::config(format!(
                "Supplied config file not found: {}",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path).map_err(|e| Error::filesystem(path, e))?;
        let config = Self::from_toml(&contents)
            .map_err(|e| e.context(format!("in config file {}", path.display())))?;

        tracing::debug!(target: "sortie::config", path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Parse and validate config text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::config(e.to_string()))?;
        Self::try_from(file)
    }
}

impl TryFrom<ConfigFile> for RunConfig {
    type Error = Error;

    fn try_from(file: ConfigFile) -> Result<Self> {
        if file.bucket.name.trim().is_empty() {
            return Err(Error::config("bucket.name must not be empty"));
        }
        if file.cache.directory.as_os_str().is_empty() {
            return Err(Error::config("cache.directory must not be empty"));
        }
        if file.targeting.sort_mask.trim().is_empty() {
            return Err(Error::config("targeting.sort_mask must not be empty"));
        }
        if file.aws.profile.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(Error::config("aws.profile must not be empty when set"));
        }
        file.logging.level_filter()?;
        file.logging.file()?;

        let template = PathTemplate::parse(&file.targeting.sort_mask)?;

        let discovery = match file.ingestion {
            IngestionSection::TrackList { track_list } => DiscoveryMode::Manifest { path: track_list },
            IngestionSection::Dynamic => DiscoveryMode::LiveScan,
            IngestionSection::Cache => DiscoveryMode::CacheRecovery {
                directory: file.cache.directory.clone(),
            },
        };

        Ok(Self {
            aws: file.aws,
            bucket: file.bucket.name,
            discovery,
            staging_dir: file.cache.directory,
            template,
            clean_up: file.targeting.clean_up,
            persistent_cache: file.cache.persistent,
            on_metadata_error: file.targeting.on_metadata_error,
            logging: file.logging,
        })
    }
}

// ============================================================================
// Config File Location
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sortie"))
}

/// Get the full path to the default config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const FULL: &str = r#"
[aws]
profile = "music"
region = "eu-west-1"
endpoint_url = "http://localhost:9000"
force_path_style = true

[bucket]
name = "my-music"

[ingestion]
mode = "track_list"
track_list = "tracks.json"

[cache]
directory = "cache"
persistent = true

[targeting]
sort_mask = "{{ artist }}/{{ album }}/{{ title }}.mp3"
clean_up = true
on_metadata_error = "skip"

[logging]
level = "debug"
log_to_file = true
log_file = "sortie.log"
"#;

    const MINIMAL: &str = r#"
[bucket]
name = "my-music"

[ingestion]
mode = "dynamic"

[cache]
directory = "cache"

[targeting]
sort_mask = "{{artist}}/{{title}}.mp3"
"#;

    #[test]
    fn test_full_config() {
        let config = RunConfig::from_toml(FULL).unwrap();

        assert_eq!(config.aws.profile.as_deref(), Some("music"));
        assert_eq!(config.aws.region.as_deref(), Some("eu-west-1"));
        assert!(config.aws.force_path_style);
        assert_eq!(config.bucket, "my-music");
        assert_eq!(
            config.discovery,
            DiscoveryMode::Manifest {
                path: PathBuf::from("tracks.json")
            }
        );
        assert_eq!(config.staging_dir, PathBuf::from("cache"));
        assert!(config.clean_up);
        assert!(config.persistent_cache);
        assert_eq!(config.on_metadata_error, MetadataErrorPolicy::Skip);
        assert_eq!(config.logging.level_filter().unwrap(), LevelFilter::DEBUG);
        assert_eq!(
            config.logging.file().unwrap(),
            Some(Path::new("sortie.log"))
        );
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = RunConfig::from_toml(MINIMAL).unwrap();

        assert_eq!(config.aws, AwsSettings::default());
        assert_eq!(config.discovery, DiscoveryMode::LiveScan);
        assert!(!config.clean_up);
        assert!(!config.persistent_cache);
        assert_eq!(config.on_metadata_error, MetadataErrorPolicy::Abort);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_cache_mode_uses_cache_directory() {
        let toml = MINIMAL.replace("mode = \"dynamic\"", "mode = \"cache\"");
        let config = RunConfig::from_toml(&toml).unwrap();
        assert_eq!(
            config.discovery,
            DiscoveryMode::CacheRecovery {
                directory: PathBuf::from("cache")
            }
        );
    }

    #[test]
    fn test_unknown_mode_is_config_error() {
        let toml = MINIMAL.replace("mode = \"dynamic\"", "mode = \"ftp\"");
        let err = RunConfig::from_toml(&toml).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_track_list_mode_requires_path() {
        let toml = MINIMAL.replace("mode = \"dynamic\"", "mode = \"track_list\"");
        assert!(matches!(
            RunConfig::from_toml(&toml),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_bucket_is_config_error() {
        let toml = MINIMAL.replace("[bucket]\nname = \"my-music\"\n", "");
        let err = RunConfig::from_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("bucket"));
    }

    #[test]
    fn test_malformed_template_rejected_at_load() {
        let toml = MINIMAL.replace("{{artist}}/{{title}}.mp3", "{{artist/{{title}}.mp3");
        assert!(matches!(
            RunConfig::from_toml(&toml),
            Err(Error::TemplateRender(_))
        ));
    }

    #[test]
    fn test_log_to_file_requires_path() {
        let toml = format!("{MINIMAL}\n[logging]\nlog_to_file = true\n");
        assert!(matches!(
            RunConfig::from_toml(&toml),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_level_rejected() {
        let toml = format!("{MINIMAL}\n[logging]\nlevel = \"loud\"\n");
        assert!(RunConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn test_level_off_rejected() {
        let toml = format!("{MINIMAL}\n[logging]\nlevel = \"off\"\n");
        assert!(matches!(
            RunConfig::from_toml(&toml),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let temp = tempdir().unwrap();
        let err = RunConfig::from_file(&temp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_from_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = RunConfig::from_file(&path).unwrap();
        assert_eq!(config.bucket, "my-music");
    }
}

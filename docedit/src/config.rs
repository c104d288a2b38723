//! Editor configuration from docedit.toml

use crate::apply::{ApplyOptions, DEFAULT_BOOKMARK_PREFIX};
use crate::extract::DEFAULT_INDETERMINATE_MARKER;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "docedit.toml";

/// Editor configuration; every field has a default
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Text-merge rendering
    pub text_merge: TextMergeConfig,

    /// Table of contents handling
    pub toc: TocConfig,

    /// Container output
    pub repack: RepackConfig,
}

/// Text-merge rendering options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextMergeConfig {
    /// Shown in place of a numbering prefix that cannot be computed
    pub indeterminate_marker: String,
}

impl Default for TextMergeConfig {
    fn default() -> Self {
        Self {
            indeterminate_marker: DEFAULT_INDETERMINATE_MARKER.to_string(),
        }
    }
}

/// TOC options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TocConfig {
    /// Prefix of bookmarks created for new TOC anchors
    pub bookmark_prefix: String,

    /// Run the synchronisation pass after plans that touch headings
    pub auto_sync: bool,
}

impl Default for TocConfig {
    fn default() -> Self {
        Self {
            bookmark_prefix: DEFAULT_BOOKMARK_PREFIX.to_string(),
            auto_sync: true,
        }
    }
}

/// Repack options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepackConfig {
    /// Ask the word processor to refresh fields on open when the TOC changed
    pub update_fields: bool,
}

impl Default for RepackConfig {
    fn default() -> Self {
        Self { update_fields: true }
    }
}

impl EditorConfig {
    /// Load configuration from a docedit.toml file
    ///
    /// # Parameters
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(EditorConfig)` - Successfully loaded configuration
    /// * `Err(ConfigError)` - Error reading or parsing the configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(ConfigError::IoError)?;
        let config: EditorConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Save configuration to a docedit.toml file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeError)?;
        fs::write(&path, content).map_err(ConfigError::IoError)?;
        Ok(())
    }

    /// Configuration from an explicit path, or docedit.toml in `dir` when present
    ///
    /// A missing default file means defaults; a missing explicit file is an error.
    pub fn resolve(explicit: Option<&Path>, dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let default_path: PathBuf = dir.join(CONFIG_FILE_NAME);
        if default_path.is_file() {
            log::debug!("Loading configuration from {}", default_path.display());
            Self::load(default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Mutator options derived from the configuration
    pub fn apply_options(&self) -> ApplyOptions {
        ApplyOptions {
            bookmark_prefix: self.toc.bookmark_prefix.clone(),
        }
    }
}

/// Errors that can occur when loading or saving the configuration
#[derive(Debug, Error)]
#[allow(clippy::enum_variant_names)]
pub enum ConfigError {
    /// IO error when reading or writing file
    #[error("IO error: {0}")]
    IoError(std::io::Error),

    /// Error parsing TOML
    #[error("TOML parse error: {0}")]
    ParseError(toml::de::Error),

    /// Error serializing to TOML
    #[error("TOML serialize error: {0}")]
    SerializeError(toml::ser::Error),
}

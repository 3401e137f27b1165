use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::{ExceptionCatalogue, HunkExtent};
use crate::error::{CulpritError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Stack trace parsing configuration
    pub parsing: ParsingConfig,

    /// Line correlation settings
    pub correlation: CorrelationConfig,

    /// Root cause resolution settings
    pub resolution: ResolutionConfig,

    /// Known exception signatures
    pub exceptions: ExceptionCatalogue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// Package prefix that marks a frame as application-owned (plain prefix, not a glob)
    pub owned_package_prefix: String,

    /// Source root for Kotlin files
    pub kotlin_source_root: String,

    /// Source root for Java files
    pub java_source_root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Lines on either side of a change that still count as "near"
    pub proximity: u32,

    /// How a hunk's end line is estimated
    pub hunk_extent: HunkExtent,

    /// Offset added to a hunk's start line when `hunk_extent` is `fixed`
    pub hunk_window: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Deployments older than this (relative to the incident) are ignored
    pub deployment_lookback_hours: u32,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            owned_package_prefix: "com.example".to_string(),
            kotlin_source_root: "src/main/kotlin".to_string(),
            java_source_root: "src/main/java".to_string(),
        }
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            proximity: 5,
            hunk_extent: HunkExtent::Fixed,
            hunk_window: 20,
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            deployment_lookback_hours: 72,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parsing: ParsingConfig::default(),
            correlation: CorrelationConfig::default(),
            resolution: ResolutionConfig::default(),
            exceptions: ExceptionCatalogue::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| CulpritError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CulpritError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                let candidates = [
                    "Culprit.toml",
                    "culprit.toml",
                    ".culprit.toml",
                ];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}

//! Configuration loading with multi-layer merge

use super::{AnalysisConfig, BackendConfig};
use crate::patch::{DEFAULT_MAX_ATTEMPTS, OutputMode};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Top-level sdk-patcher configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PatcherConfig {
    /// Global defaults
    #[serde(default)]
    pub defaults: Defaults,

    /// Backend definitions
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,

    /// Diff and context sources for `analyze`; a later layer replaces the
    /// whole table
    pub analysis: Option<AnalysisConfig>,
}

/// Global default settings
///
/// Every field is optional so that a layer which sets a value wins over
/// earlier layers even when it restates the built-in default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Root of the SDK checkout that plan paths are relative to
    pub sdk_root: Option<String>,

    /// Failing patch attempts allowed before falling back to regeneration
    pub max_attempts: Option<u32>,

    /// Where patched files are written
    pub output: Option<OutputMode>,

    /// Backend used for patch generation and regeneration
    pub backend: Option<String>,

    /// Max files processed concurrently
    pub max_concurrent: Option<usize>,
}

impl Defaults {
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS)
    }

    pub fn output(&self) -> OutputMode {
        self.output.unwrap_or_default()
    }
}

impl PatcherConfig {
    /// Load configuration from the standard hierarchy
    ///
    /// Load order (later overrides earlier):
    /// 1. Built-in defaults
    /// 2. ~/.config/sdk-patcher/config.toml
    /// 3. .sdk-patcher/config.toml (project)
    pub fn load(project_dir: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        // Load user config
        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                let user_config = Self::load_file(&user_config_path)
                    .with_context(|| format!("loading {}", user_config_path.display()))?;
                config.merge(user_config);
            }
        }

        // Load project config
        let project_config_path = project_dir
            .map(|p| p.join(".sdk-patcher/config.toml"))
            .unwrap_or_else(|| PathBuf::from(".sdk-patcher/config.toml"));

        if project_config_path.exists() {
            let project_config = Self::load_file(&project_config_path)
                .with_context(|| format!("loading {}", project_config_path.display()))?;
            config.merge(project_config);
        }

        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Get the user config path (~/.config/sdk-patcher/config.toml)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sdk-patcher/config.toml"))
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Self) {
        if other.defaults.sdk_root.is_some() {
            self.defaults.sdk_root = other.defaults.sdk_root;
        }
        if other.defaults.max_attempts.is_some() {
            self.defaults.max_attempts = other.defaults.max_attempts;
        }
        if other.defaults.output.is_some() {
            self.defaults.output = other.defaults.output;
        }
        if other.defaults.backend.is_some() {
            self.defaults.backend = other.defaults.backend;
        }
        if other.defaults.max_concurrent.is_some() {
            self.defaults.max_concurrent = other.defaults.max_concurrent;
        }

        // Merge backends (other wins for same key)
        for (name, backend) in other.backends {
            self.backends.insert(name, backend);
        }

        if other.analysis.is_some() {
            self.analysis = other.analysis;
        }
    }

    pub fn analysis(&self) -> AnalysisConfig {
        self.analysis.clone().unwrap_or_default()
    }

    /// Resolve the SDK root
    ///
    /// `~` is expanded; relative roots are taken relative to the project
    /// directory. Without a configured root the project directory is used.
    pub fn sdk_root(&self, project_dir: &Path) -> PathBuf {
        match self.defaults.sdk_root.as_deref() {
            Some(root) => {
                let expanded = PathBuf::from(shellexpand::tilde(root).as_ref());
                if expanded.is_absolute() {
                    expanded
                } else {
                    project_dir.join(expanded)
                }
            }
            None => project_dir.to_path_buf(),
        }
    }

    /// Get a backend by name
    pub fn get_backend(&self, name: &str) -> Option<&BackendConfig> {
        self.backends.get(name)
    }

    /// Get all enabled backends, sorted by name
    pub fn enabled_backends(&self) -> Vec<(&String, &BackendConfig)> {
        let mut backends: Vec<_> = self.backends.iter().filter(|(_, b)| b.enabled).collect();
        backends.sort_by(|a, b| a.0.cmp(b.0));
        backends
    }

    /// The backend used for generation: the configured default, else the
    /// first enabled backend by name
    pub fn generation_backend(&self) -> Result<(String, &BackendConfig)> {
        if let Some(ref name) = self.defaults.backend {
            let backend = self
                .get_backend(name)
                .with_context(|| format!("backend '{}' is not configured", name))?;
            if !backend.enabled {
                anyhow::bail!("backend '{}' is disabled", name);
            }
            return Ok((name.clone(), backend));
        }

        self.enabled_backends()
            .into_iter()
            .next()
            .map(|(name, backend)| (name.clone(), backend))
            .context("no enabled backends configured")
    }
}

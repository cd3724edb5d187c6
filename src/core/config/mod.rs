//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! Wireloom has two configuration scopes:
//! - **User**: Per-user settings
//! - **Project**: Overrides for one project directory
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. User config file
//! 3. Project config file
//! 4. Explicit container setters (not handled here)
//!
//! # User Config Locations
//!
//! Searched in order:
//! 1. `$WIRELOOM_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/wireloom/config.toml`
//! 3. `~/.wireloom/config.toml`
//!
//! # Project Config Location
//!
//! `<project>/.wireloom.toml`
//!
//! # Example
//!
//! ```no_run
//! use wireloom::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/path/to/project"))).unwrap();
//! println!("Mode: {}", config.mode());
//! println!("Separator: {}", config.naming_tokens().separator);
//! ```

pub mod schema;

pub use schema::{FetchConfig, NamingConfig, RuntimeConfig};

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::naming::NamingTokens;
use crate::core::types::Mode;

/// File name of the project-scope config.
pub const PROJECT_CONFIG_FILE: &str = ".wireloom.toml";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence automatically: project config overrides
/// user config, which overrides defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// User configuration
    pub user: RuntimeConfig,
    /// Project configuration (if a project directory was given and has one)
    pub project: Option<RuntimeConfig>,
    /// Path to the user config file (if loaded)
    user_path: Option<PathBuf>,
    /// Path to the project config file (if loaded)
    project_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `project_dir` is provided, also loads its `.wireloom.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed, or if
    /// the merged values are invalid. Missing config files are not an
    /// error (defaults are used).
    pub fn load(project_dir: Option<&Path>) -> Result<Config, ConfigError> {
        let (user, user_path) = Self::load_user()?;

        let (project, project_path) = match project_dir {
            Some(dir) => Self::load_project(dir)?,
            None => (None, None),
        };

        let config = Config {
            user,
            project,
            user_path,
            project_path,
        };
        config.validate()?;

        tracing::debug!(
            user = ?config.user_path,
            project = ?config.project_path,
            mode = %config.mode(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Build a configuration from a single in-memory TOML document.
    ///
    /// # Example
    ///
    /// ```
    /// use wireloom::core::config::Config;
    /// use wireloom::core::types::Mode;
    ///
    /// let config = Config::from_toml_str("mode = \"development\"").unwrap();
    /// assert_eq!(config.mode(), Mode::Development);
    /// assert!(config.fetch_enabled());
    /// ```
    pub fn from_toml_str(contents: &str) -> Result<Config, ConfigError> {
        let user: RuntimeConfig = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })?;
        let config = Config {
            user,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate each scope and the merged naming tokens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.user.validate()?;
        if let Some(project) = &self.project {
            project.validate()?;
        }
        self.naming_tokens()
            .validate()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }

    /// Load user configuration from standard locations.
    fn load_user() -> Result<(RuntimeConfig, Option<PathBuf>), ConfigError> {
        // 1. Check $WIRELOOM_CONFIG
        if let Ok(path) = std::env::var("WIRELOOM_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                let config = Self::read_config(&path)?;
                return Ok((config, Some(path)));
            }
        }

        // 2. Check $XDG_CONFIG_HOME/wireloom/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("wireloom/config.toml");
            if path.exists() {
                let config = Self::read_config(&path)?;
                return Ok((config, Some(path)));
            }
        }

        // 3. Check ~/.wireloom/config.toml
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".wireloom/config.toml");
            if path.exists() {
                let config = Self::read_config(&path)?;
                return Ok((config, Some(path)));
            }
        }

        Ok((RuntimeConfig::default(), None))
    }

    fn load_project(
        project_dir: &Path,
    ) -> Result<(Option<RuntimeConfig>, Option<PathBuf>), ConfigError> {
        let path = project_dir.join(PROJECT_CONFIG_FILE);
        if !path.exists() {
            return Ok((None, None));
        }
        let config = Self::read_config(&path)?;
        Ok((Some(config), Some(path)))
    }

    /// Read and parse a config file.
    fn read_config(path: &Path) -> Result<RuntimeConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Pick the project value if set, else the user value.
    fn pick<'a, T: ?Sized>(
        &'a self,
        get: impl Fn(&'a RuntimeConfig) -> Option<&'a T>,
    ) -> Option<&'a T> {
        self.project.as_ref().and_then(&get).or_else(|| get(&self.user))
    }

    /// Get the runtime mode.
    ///
    /// Defaults to production.
    pub fn mode(&self) -> Mode {
        self.pick(|c| c.mode.as_ref()).copied().unwrap_or_default()
    }

    /// Get the naming tokens, each token resolved independently.
    pub fn naming_tokens(&self) -> NamingTokens {
        let defaults = NamingTokens::default();
        NamingTokens {
            separator: self
                .naming_token(|n| n.separator.as_ref())
                .unwrap_or(defaults.separator),
            accessor: self
                .naming_token(|n| n.accessor.as_ref())
                .unwrap_or(defaults.accessor),
            delimiter: self
                .naming_token(|n| n.handler_delimiter.as_ref())
                .unwrap_or(defaults.delimiter),
        }
    }

    fn naming_token(&self, get: fn(&NamingConfig) -> Option<&String>) -> Option<String> {
        self.pick(|c| c.naming.as_ref().and_then(get)).cloned()
    }

    /// Check if undeclared dependencies are fetched.
    ///
    /// Defaults to `true` if not configured.
    pub fn fetch_enabled(&self) -> bool {
        self.pick(|c| c.fetch.as_ref().and_then(|f| f.enabled.as_ref()))
            .copied()
            .unwrap_or(true)
    }

    /// Get the fetch target prefix.
    ///
    /// Defaults to empty.
    pub fn fetch_prefix(&self) -> &str {
        self.pick(|c| c.fetch.as_ref().and_then(|f| f.prefix.as_deref()))
            .unwrap_or("")
    }

    /// Get the fetch target suffix.
    ///
    /// Defaults to empty.
    pub fn fetch_suffix(&self) -> &str {
        self.pick(|c| c.fetch.as_ref().and_then(|f| f.suffix.as_deref()))
            .unwrap_or("")
    }

    /// Get the path to the loaded user config file.
    pub fn user_config_loaded_from(&self) -> Option<&Path> {
        self.user_path.as_deref()
    }

    /// Get the path to the loaded project config file.
    pub fn project_config_loaded_from(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }
}

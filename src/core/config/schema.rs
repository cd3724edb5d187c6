//! core::config::schema
//!
//! Configuration schema types.
//!
//! # User Config
//!
//! Located at (in order of precedence):
//! 1. `$WIRELOOM_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/wireloom/config.toml`
//! 3. `~/.wireloom/config.toml` (canonical write location)
//!
//! # Project Config
//!
//! Located at `<project>/.wireloom.toml`.
//!
//! # Validation
//!
//! Each file is validated after parsing. The naming tokens are validated
//! again once both scopes are merged, since a project file may override
//! only one token.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::Mode;

/// Runtime configuration (either scope).
///
/// # Example
///
/// ```toml
/// mode = "development"
///
/// [naming]
/// separator = "/"
/// accessor = "."
/// handler_delimiter = "!"
///
/// [fetch]
/// enabled = true
/// prefix = "modules/"
/// suffix = ".js"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Runtime mode
    pub mode: Option<Mode>,

    /// Specifier grammar tokens
    pub naming: Option<NamingConfig>,

    /// On-demand fetch settings
    pub fetch: Option<FetchConfig>,
}

impl RuntimeConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(naming) = &self.naming {
            naming.validate()?;
        }
        Ok(())
    }
}

/// Naming token overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NamingConfig {
    /// Path separator (default: "/")
    pub separator: Option<String>,

    /// Fragment accessor (default: ".")
    pub accessor: Option<String>,

    /// Handler-prefix delimiter (default: "!")
    pub handler_delimiter: Option<String>,
}

impl NamingConfig {
    /// Reject an empty handler delimiter.
    ///
    /// An empty separator or accessor is allowed and switches off
    /// relative names or fragments respectively.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(&self.handler_delimiter, Some(token) if token.is_empty()) {
            return Err(ConfigError::InvalidValue(
                "naming.handler_delimiter cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fetch settings.
///
/// The fetch target for module `name` is `prefix + name + suffix`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Whether undeclared dependencies are fetched (default: true)
    pub enabled: Option<bool>,

    /// Prepended to the module name
    pub prefix: Option<String>,

    /// Appended to the module name
    pub suffix: Option<String>,
}

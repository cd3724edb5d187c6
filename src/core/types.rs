//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ModuleName`] - Canonical (fully resolved) module name
//! - [`ModuleId`] - Arena index of a module inside a registry
//! - [`ModuleState`] - Lifecycle state of a module
//! - [`Phase`] - Lifecycle phase of a container
//! - [`Mode`] - Runtime mode (production, development, analyze)
//!
//! # Validation
//!
//! Whether a string is an acceptable module name depends on the configured
//! naming tokens, so validation lives in [`crate::core::naming`]. A
//! `ModuleName` is only ever produced by that module (or by deserializing
//! one that was produced earlier), which keeps unresolved relative forms
//! out of the registry.

use serde::{Deserialize, Serialize};

/// A canonical module name.
///
/// Relative forms (`./sibling`, `../up`, `/child`) have already been
/// resolved and any fragment path stripped. Names of custom-handled
/// dependencies keep their handler prefixes (`text!greeting`).
///
/// # Example
///
/// ```
/// use wireloom::core::naming::{NameResolver, NamingTokens};
///
/// let resolver = NameResolver::new(NamingTokens::default());
/// let name = resolver.module_name("app/views").unwrap();
/// assert_eq!(name.as_str(), "app/views");
/// assert_eq!(name.to_string(), "app/views");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleName(String);

impl ModuleName {
    /// Wrap an already-canonical name.
    pub(crate) fn canonical(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ModuleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ModuleName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<ModuleName> for String {
    fn from(name: ModuleName) -> Self {
        name.0
    }
}

impl std::fmt::Display for ModuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a module in the registry arena.
///
/// Modules are never removed, so an id stays valid for the lifetime of
/// the registry that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) usize);

impl ModuleId {
    /// Position of the module in declaration order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Lifecycle state of a module.
///
/// States only ever move forward:
///
/// ```text
/// Declared -> Ready -> Finalized
///                   -> Deferred -> Finalized
///                   -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// Registered; dependencies are being tracked.
    Declared,
    /// All dependencies resolved; eligible for finalization.
    Ready,
    /// The factory asked to finish later through an external resolve.
    Deferred,
    /// Factory invoked exactly once; the value is fixed.
    Finalized,
    /// The factory or a custom handler reported an error.
    Failed,
}

impl ModuleState {
    /// Whether the module has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ModuleState::Finalized | ModuleState::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            ModuleState::Declared => 0,
            ModuleState::Ready => 1,
            ModuleState::Deferred => 2,
            ModuleState::Finalized | ModuleState::Failed => 3,
        }
    }

    /// Whether moving from `self` to `next` keeps states monotonic.
    ///
    /// # Example
    ///
    /// ```
    /// use wireloom::core::types::ModuleState;
    ///
    /// assert!(ModuleState::Ready.can_advance_to(ModuleState::Deferred));
    /// assert!(!ModuleState::Finalized.can_advance_to(ModuleState::Ready));
    /// assert!(!ModuleState::Deferred.can_advance_to(ModuleState::Deferred));
    /// ```
    pub fn can_advance_to(self, next: ModuleState) -> bool {
        next.rank() > self.rank()
    }
}

impl std::fmt::Display for ModuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ModuleState::Declared => "declared",
            ModuleState::Ready => "ready",
            ModuleState::Deferred => "deferred",
            ModuleState::Finalized => "finalized",
            ModuleState::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// Lifecycle phase of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Declarations are buffered; configuration is still mutable.
    Declaring,
    /// Buffered declarations have been flushed; factories run when ready.
    Resolving,
    /// Undeclared dependencies are fetched on demand.
    Fetching,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Declaring => write!(f, "declaring"),
            Phase::Resolving => write!(f, "resolving"),
            Phase::Fetching => write!(f, "fetching"),
        }
    }
}

/// Runtime mode.
///
/// Development and analyze modes enable diagnostics (cycle detection,
/// hang hints). Analyze mode additionally skips factory invocation so a
/// graph can be inspected without running any module code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Production,
    Development,
    Analyze,
}

impl Mode {
    /// Whether diagnostic checks are enabled.
    pub fn diagnostics_enabled(&self) -> bool {
        matches!(self, Mode::Development | Mode::Analyze)
    }

    /// Whether factories are invoked.
    pub fn runs_factories(&self) -> bool {
        !matches!(self, Mode::Analyze)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Production => write!(f, "production"),
            Mode::Development => write!(f, "development"),
            Mode::Analyze => write!(f, "analyze"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(Mode::Production),
            "development" | "dev" => Ok(Mode::Development),
            "analyze" => Ok(Mode::Analyze),
            other => Err(format!(
                "invalid mode '{}', must be one of: production, development, analyze",
                other
            )),
        }
    }
}

//! engine::health
//!
//! Diagnostics recorded while the container runs.
//!
//! # Architecture
//!
//! Conditions that must not abort execution (a dependency cycle, a failed
//! fetch, a factory error) are recorded as [`Diagnostic`]s instead of being
//! returned as errors. Each diagnostic carries:
//! - A [`DiagnosticId`] (stable and deterministic from its evidence)
//! - A [`Severity`] (`Error`, `Warning`)
//! - A [`DiagnosticKind`] holding the evidence
//!
//! Every recorded diagnostic is also emitted through `tracing`, so a
//! subscriber sees them as they happen while callers can still inspect
//! them afterwards.
//!
//! # Example
//!
//! ```
//! use wireloom::engine::health::{DiagnosticKind, Diagnostics, Severity};
//!
//! let mut diagnostics = Diagnostics::new();
//! diagnostics.report(DiagnosticKind::FetchFailed {
//!     target: "lib/db.js".to_string(),
//!     message: "connection refused".to_string(),
//! });
//!
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics.all()[0].severity, Severity::Error);
//! assert!(diagnostics.all()[0].id.as_str().starts_with("fetch-failed:"));
//! ```

use sha2::{Digest, Sha256};

use crate::core::types::ModuleName;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Something failed; some modules will never finalize.
    Error,
    /// Misuse or a suspicious condition; execution is unaffected.
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A stable, deterministic diagnostic identifier.
///
/// Formatted as `code:hash(key)` where hash is a truncated SHA-256 of the
/// evidence key, so the same problem gets the same id across runs.
///
/// # Example
///
/// ```
/// use wireloom::engine::health::DiagnosticId;
///
/// let id = DiagnosticId::new("dependency-cycle", "a,b,a");
/// assert!(id.as_str().starts_with("dependency-cycle:"));
/// assert_eq!(id, DiagnosticId::new("dependency-cycle", "a,b,a"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiagnosticId(String);

impl DiagnosticId {
    pub fn new(code: &str, key: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let hash = hasher.finalize();
        let short_hash = hex::encode(&hash[..4]); // 8 hex chars
        Self(format!("{}:{}", code, short_hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DiagnosticId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What was observed, with its evidence.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    /// A declaration closed a dependency loop.
    Cycle {
        /// Path starting and ending at the module that closed the loop
        path: Vec<ModuleName>,
    },

    /// The loader reported a failure.
    FetchFailed { target: String, message: String },

    /// A fetched unit did not declare a module it was fetched for.
    ModuleNotInUnit { module: ModuleName, target: String },

    /// Names still undeclared when resolving ended and fetching is off.
    UndeclaredAtResolveEnd { names: Vec<ModuleName> },

    /// A factory returned an error.
    FactoryFailed { module: String, message: String },

    /// An extension handler failed a dependency.
    ExtensionFailed {
        module: String,
        handler: String,
        message: String,
    },

    /// The loader delivered the wrong kind of content.
    UnexpectedContent { target: String, expected: String },

    /// A declaration inside a fetched unit was invalid.
    UnitRejected { target: String, message: String },

    /// A completion arrived for something that was not waiting.
    StrayResolution { subject: String },

    /// A factory called `defer()` more than once.
    DeferralRepeated { module: String },

    /// A module waiting on `ModuleContext::fetch_data` did not get its data.
    LibraryFailed {
        module: String,
        target: String,
        message: String,
    },
}

impl DiagnosticKind {
    /// Short stable code, used as the id prefix.
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::Cycle { .. } => "dependency-cycle",
            DiagnosticKind::FetchFailed { .. } => "fetch-failed",
            DiagnosticKind::ModuleNotInUnit { .. } => "module-not-in-unit",
            DiagnosticKind::UndeclaredAtResolveEnd { .. } => "undeclared-at-resolve-end",
            DiagnosticKind::FactoryFailed { .. } => "factory-failed",
            DiagnosticKind::ExtensionFailed { .. } => "extension-failed",
            DiagnosticKind::UnexpectedContent { .. } => "unexpected-content",
            DiagnosticKind::UnitRejected { .. } => "unit-rejected",
            DiagnosticKind::StrayResolution { .. } => "stray-resolution",
            DiagnosticKind::DeferralRepeated { .. } => "deferral-repeated",
            DiagnosticKind::LibraryFailed { .. } => "library-failed",
        }
    }

    /// Get a key string for use in id computation.
    pub fn key(&self) -> String {
        fn join(names: &[ModuleName]) -> String {
            names
                .iter()
                .map(ModuleName::as_str)
                .collect::<Vec<_>>()
                .join(",")
        }
        match self {
            DiagnosticKind::Cycle { path } => join(path),
            DiagnosticKind::FetchFailed { target, .. } => target.clone(),
            DiagnosticKind::ModuleNotInUnit { module, target } => format!("{}@{}", module, target),
            DiagnosticKind::UndeclaredAtResolveEnd { names } => join(names),
            DiagnosticKind::FactoryFailed { module, .. } => module.clone(),
            DiagnosticKind::ExtensionFailed {
                module, handler, ..
            } => format!("{}:{}", handler, module),
            DiagnosticKind::UnexpectedContent { target, .. } => target.clone(),
            DiagnosticKind::UnitRejected { target, message } => format!("{}:{}", target, message),
            DiagnosticKind::StrayResolution { subject } => subject.clone(),
            DiagnosticKind::DeferralRepeated { module } => module.clone(),
            DiagnosticKind::LibraryFailed { module, target, .. } => format!("{}@{}", module, target),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::Cycle { .. }
            | DiagnosticKind::FetchFailed { .. }
            | DiagnosticKind::FactoryFailed { .. }
            | DiagnosticKind::ExtensionFailed { .. }
            | DiagnosticKind::UnexpectedContent { .. }
            | DiagnosticKind::UnitRejected { .. }
            | DiagnosticKind::LibraryFailed { .. } => Severity::Error,
            DiagnosticKind::ModuleNotInUnit { .. }
            | DiagnosticKind::UndeclaredAtResolveEnd { .. }
            | DiagnosticKind::StrayResolution { .. }
            | DiagnosticKind::DeferralRepeated { .. } => Severity::Warning,
        }
    }
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticKind::Cycle { path } => {
                let path: Vec<&str> = path.iter().map(ModuleName::as_str).collect();
                write!(f, "circular dependency: {}", path.join(" -> "))
            }
            DiagnosticKind::FetchFailed { target, message } => {
                write!(f, "failed to fetch '{}': {}", target, message)
            }
            DiagnosticKind::ModuleNotInUnit { module, target } => write!(
                f,
                "module '{}' was not declared by the unit fetched from '{}'",
                module, target
            ),
            DiagnosticKind::UndeclaredAtResolveEnd { names } => {
                let names: Vec<&str> = names.iter().map(ModuleName::as_str).collect();
                write!(
                    f,
                    "modules still undeclared and fetching is disabled: {}",
                    names.join(", ")
                )
            }
            DiagnosticKind::FactoryFailed { module, message } => {
                write!(f, "factory of '{}' failed: {}", module, message)
            }
            DiagnosticKind::ExtensionFailed {
                module,
                handler,
                message,
            } => write!(f, "handler '{}' failed '{}': {}", handler, module, message),
            DiagnosticKind::UnexpectedContent { target, expected } => {
                write!(f, "fetch of '{}' did not deliver {}", target, expected)
            }
            DiagnosticKind::UnitRejected { target, message } => {
                write!(f, "unit '{}' contains an invalid declaration: {}", target, message)
            }
            DiagnosticKind::StrayResolution { subject } => {
                write!(f, "ignored completion for {}, nothing was waiting on it", subject)
            }
            DiagnosticKind::DeferralRepeated { module } => write!(
                f,
                "factory of '{}' called defer() more than once; only the first deferral counts",
                module
            ),
            DiagnosticKind::LibraryFailed {
                module,
                target,
                message,
            } => write!(f, "module '{}' could not load '{}': {}", module, target, message),
        }
    }
}

/// A recorded diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Stable identifier.
    pub id: DiagnosticId,
    /// Severity level.
    pub severity: Severity,
    /// The evidence.
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind) -> Self {
        Self {
            id: DiagnosticId::new(kind.code(), &kind.key()),
            severity: kind.severity(),
            kind,
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.id, self.kind)
    }
}

/// Ordered collection of recorded diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and emit it through `tracing`.
    pub fn report(&mut self, kind: DiagnosticKind) -> &Diagnostic {
        let diagnostic = Diagnostic::new(kind);
        match diagnostic.severity {
            Severity::Error => tracing::error!(id = %diagnostic.id, "{}", diagnostic.kind),
            Severity::Warning => tracing::warn!(id = %diagnostic.id, "{}", diagnostic.kind),
        }
        self.entries.push(diagnostic);
        &self.entries[self.entries.len() - 1]
    }

    /// All diagnostics, in the order they were recorded.
    pub fn all(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Remove and return everything recorded so far.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }

    pub fn by_severity(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.severity == severity)
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    /// Find a diagnostic by id.
    pub fn find(&self, id: &DiagnosticId) -> Option<&Diagnostic> {
        self.entries.iter().find(|d| &d.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::naming::NameResolver;

    fn names(list: &[&str]) -> Vec<ModuleName> {
        let resolver = NameResolver::default();
        list.iter().map(|n| resolver.module_name(n).unwrap()).collect()
    }

    #[test]
    fn id_is_deterministic() {
        let a = DiagnosticId::new("factory-failed", "app");
        let b = DiagnosticId::new("factory-failed", "app");
        let c = DiagnosticId::new("factory-failed", "db");
        assert_eq!(a, b);
        assert_ne!(a, c);
        // code + ':' + 8 hex chars
        assert_eq!(a.as_str().len(), "factory-failed:".len() + 8);
    }

    #[test]
    fn cycle_message_shows_path() {
        let diagnostic = Diagnostic::new(DiagnosticKind::Cycle {
            path: names(&["a", "b", "a"]),
        });
        assert_eq!(diagnostic.severity, Severity::Error);
        assert_eq!(diagnostic.message(), "circular dependency: a -> b -> a");
        assert!(diagnostic.id.as_str().starts_with("dependency-cycle:"));
    }

    #[test]
    fn severities() {
        let warning = DiagnosticKind::DeferralRepeated {
            module: "app".to_string(),
        };
        assert_eq!(warning.severity(), Severity::Warning);

        let error = DiagnosticKind::UnitRejected {
            target: "a.js".to_string(),
            message: "duplicate".to_string(),
        };
        assert_eq!(error.severity(), Severity::Error);
    }

    #[test]
    fn collection_queries() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.is_empty());

        let id = diagnostics
            .report(DiagnosticKind::StrayResolution {
                subject: "fetch 'x'".to_string(),
            })
            .id
            .clone();
        diagnostics.report(DiagnosticKind::FactoryFailed {
            module: "app".to_string(),
            message: "boom".to_string(),
        });

        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.by_severity(Severity::Warning).count(), 1);
        assert!(diagnostics.find(&id).is_some());

        let taken = diagnostics.take();
        assert_eq!(taken.len(), 2);
        assert!(diagnostics.is_empty());
    }
}

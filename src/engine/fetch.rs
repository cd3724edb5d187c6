//! engine::fetch
//!
//! On-demand fetching of undeclared modules and data.
//!
//! # Design
//!
//! The physical fetch is delegated to a [`Loader`] collaborator. The
//! [`FetchDispatcher`] sits in front of it and guarantees that each
//! target identifier is requested at most once, and each module name
//! triggers at most one request. A loader may answer immediately
//! ([`FetchStatus::Ready`]) or later, through `Container::complete_fetch`.
//!
//! Requests are queued in an outbox; the container drains it after every
//! synchronous turn, so a cascade of declarations never re-enters the
//! loader.
//!
//! # Example
//!
//! ```
//! use wireloom::engine::fetch::{FetchKind, TargetResolver};
//! use wireloom::core::naming::NameResolver;
//!
//! let resolver = TargetResolver::affix("lib/", ".js");
//! let name = NameResolver::default().module_name("app/db").unwrap();
//! assert_eq!(resolver.target_for(&name).as_deref(), Some("lib/app/db.js"));
//! # let _ = FetchKind::Unit;
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;

use super::extension::ExtensionTicket;
use super::module::Declaration;
use crate::core::types::{ModuleId, ModuleName};
use crate::core::value::Value;

/// Errors reported by loaders.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("no loader is configured")]
    Unavailable,

    #[error("'{target}' was not found")]
    NotFound { target: String },

    #[error("'{target}' is not a valid target: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("failed to read '{target}': {message}")]
    Io { target: String, message: String },

    #[error("failed to parse '{target}': {message}")]
    Parse { target: String, message: String },

    #[error("this loader cannot deliver {kind} content")]
    Unsupported { kind: FetchKind },

    #[error("{0}")]
    Other(String),
}

/// What the requester expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    /// A unit of declarations (code).
    Unit,
    /// A value delivered to an extension.
    Data,
}

impl std::fmt::Display for FetchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchKind::Unit => write!(f, "unit"),
            FetchKind::Data => write!(f, "data"),
        }
    }
}

/// A request handed to the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Target identifier (path, URL, key)
    pub target: String,
    /// Expected content
    pub kind: FetchKind,
    /// Module whose absence triggered the request, if any
    pub module: Option<ModuleName>,
}

/// What a loader delivers.
#[derive(Debug)]
pub enum Content {
    /// Declarations, processed as if declared directly.
    Unit(Vec<Declaration>),
    /// A value for a data request.
    Data(Value),
}

/// A loader's immediate answer.
#[derive(Debug)]
pub enum FetchStatus {
    /// The fetch finished synchronously.
    Ready(Result<Content, FetchError>),
    /// The result will arrive through `Container::complete_fetch`.
    Pending,
}

/// The physical fetch mechanism.
pub trait Loader {
    /// Get the loader name (for logs).
    fn name(&self) -> &'static str;

    /// Start fetching `request.target`.
    ///
    /// Called at most once per target.
    fn fetch(&mut self, request: &FetchRequest) -> FetchStatus;
}

/// Maps module names to fetch targets.
pub enum TargetResolver {
    /// `prefix + name + suffix`
    Affix { prefix: String, suffix: String },
    /// A caller-supplied mapping; `None` means "do not fetch".
    Custom(Box<dyn Fn(&ModuleName) -> Option<String>>),
}

impl TargetResolver {
    pub fn affix(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        TargetResolver::Affix {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    pub fn target_for(&self, name: &ModuleName) -> Option<String> {
        match self {
            TargetResolver::Affix { prefix, suffix } => Some(format!("{}{}{}", prefix, name, suffix)),
            TargetResolver::Custom(resolve) => resolve(name),
        }
    }
}

/// The module name itself is the target.
impl Default for TargetResolver {
    fn default() -> Self {
        TargetResolver::affix("", "")
    }
}

impl std::fmt::Debug for TargetResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetResolver::Affix { prefix, suffix } => f
                .debug_struct("Affix")
                .field("prefix", prefix)
                .field("suffix", suffix)
                .finish(),
            TargetResolver::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Who is waiting on a data target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DataWaiter {
    /// A parked handler step.
    Handler(ExtensionTicket),
    /// A module deferred by `ModuleContext::fetch_data`.
    Module(ModuleId),
}

/// Answer to a data request.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DataLookup {
    /// Already delivered (or failed).
    Cached(Result<Value, String>),
    /// In flight; the ticket was parked.
    Waiting,
}

#[derive(Debug)]
enum TargetState {
    InFlight {
        kind: FetchKind,
        modules: Vec<ModuleName>,
        waiters: Vec<DataWaiter>,
    },
    Loaded,
    Data(Result<Value, String>),
}

/// A settled in-flight request.
#[derive(Debug)]
pub(crate) struct Settled {
    pub(crate) kind: FetchKind,
    pub(crate) modules: Vec<ModuleName>,
    pub(crate) waiters: Vec<DataWaiter>,
}

/// Deduplicates fetch requests by module name and by target.
#[derive(Debug, Default)]
pub struct FetchDispatcher {
    requested_modules: HashSet<ModuleName>,
    targets: HashMap<String, TargetState>,
    outbox: VecDeque<FetchRequest>,
}

impl FetchDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the unit that should declare `name`.
    ///
    /// Returns `true` if a new request was queued. A `None` target records
    /// the name as requested without fetching anything.
    pub(crate) fn request_module(&mut self, name: &ModuleName, target: Option<String>) -> bool {
        if !self.requested_modules.insert(name.clone()) {
            return false;
        }
        let Some(target) = target else {
            tracing::debug!(module = %name, "no fetch target for module");
            return false;
        };
        match self.targets.get_mut(&target) {
            Some(TargetState::InFlight { modules, .. }) => {
                modules.push(name.clone());
                false
            }
            Some(_) => false,
            None => {
                self.targets.insert(
                    target.clone(),
                    TargetState::InFlight {
                        kind: FetchKind::Unit,
                        modules: vec![name.clone()],
                        waiters: Vec::new(),
                    },
                );
                self.outbox.push_back(FetchRequest {
                    target,
                    kind: FetchKind::Unit,
                    module: Some(name.clone()),
                });
                true
            }
        }
    }

    /// Request an explicit unit. Returns `true` if a new request was queued.
    pub(crate) fn request_unit(&mut self, target: &str) -> bool {
        if self.targets.contains_key(target) {
            return false;
        }
        self.targets.insert(
            target.to_string(),
            TargetState::InFlight {
                kind: FetchKind::Unit,
                modules: Vec::new(),
                waiters: Vec::new(),
            },
        );
        self.outbox.push_back(FetchRequest {
            target: target.to_string(),
            kind: FetchKind::Unit,
            module: None,
        });
        true
    }

    /// Request `target` as data on behalf of `waiter`.
    pub(crate) fn request_data(&mut self, target: &str, waiter: DataWaiter) -> DataLookup {
        match self.targets.get_mut(target) {
            Some(TargetState::Data(result)) => DataLookup::Cached(result.clone()),
            Some(TargetState::Loaded) => DataLookup::Cached(Err(format!(
                "'{}' was already loaded as a unit",
                target
            ))),
            Some(TargetState::InFlight { waiters, .. }) => {
                waiters.push(waiter);
                DataLookup::Waiting
            }
            None => {
                self.targets.insert(
                    target.to_string(),
                    TargetState::InFlight {
                        kind: FetchKind::Data,
                        modules: Vec::new(),
                        waiters: vec![waiter],
                    },
                );
                self.outbox.push_back(FetchRequest {
                    target: target.to_string(),
                    kind: FetchKind::Data,
                    module: None,
                });
                DataLookup::Waiting
            }
        }
    }

    /// Next request to hand to the loader.
    pub(crate) fn next_request(&mut self) -> Option<FetchRequest> {
        self.outbox.pop_front()
    }

    /// Whether `target` is waiting for a completion.
    pub fn is_in_flight(&self, target: &str) -> bool {
        matches!(self.targets.get(target), Some(TargetState::InFlight { .. }))
    }

    /// Whether a fetch was ever triggered for module `name`.
    pub fn was_requested(&self, name: &str) -> bool {
        self.requested_modules.contains(name)
    }

    /// Targets still waiting for a completion, sorted.
    pub fn in_flight(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = self
            .targets
            .iter()
            .filter(|(_, state)| matches!(state, TargetState::InFlight { .. }))
            .map(|(target, _)| target.as_str())
            .collect();
        targets.sort_unstable();
        targets
    }

    /// Close an in-flight request.
    ///
    /// Returns `None` if nothing was waiting on `target`. Unit targets are
    /// marked loaded; data targets must be followed by [`Self::store_data`].
    pub(crate) fn settle(&mut self, target: &str) -> Option<Settled> {
        let state = self.targets.get_mut(target)?;
        if !matches!(state, TargetState::InFlight { .. }) {
            return None;
        }
        match std::mem::replace(state, TargetState::Loaded) {
            TargetState::InFlight {
                kind,
                modules,
                waiters,
            } => Some(Settled {
                kind,
                modules,
                waiters,
            }),
            _ => None,
        }
    }

    /// Remember the outcome of a data fetch for later requests.
    pub(crate) fn store_data(&mut self, target: &str, result: Result<Value, String>) {
        self.targets.insert(target.to_string(), TargetState::Data(result));
    }
}

//! engine::extension
//!
//! Custom dependency handlers ("modifiers").
//!
//! # Design
//!
//! A dependency written `text!greeting` is not looked up in the registry.
//! The container creates one module per distinct prefixed target and runs
//! its handler chain: each [`Extension`] receives the stripped name and the
//! value produced by the previous handler, and answers with an
//! [`ExtensionOutcome`]. A `Pending` answer keeps the chain parked until
//! its [`ExtensionTicket`] comes back through `Container::resolve_extension`
//! or through a data fetch the handler started with
//! [`ExtensionContext::fetch_data`].
//!
//! Dependents wait on a prefixed target exactly as on any other module.

use std::collections::HashMap;

use thiserror::Error;

use super::fetch::{DataLookup, DataWaiter, FetchDispatcher};
use super::phase::PhaseError;
use crate::core::types::ModuleId;
use crate::core::value::Value;

/// Errors from registering or configuring extensions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtensionError {
    #[error("extension prefix cannot be empty")]
    EmptyPrefix,

    #[error("extension prefix \"{prefix}\" cannot contain \"{token}\"")]
    InvalidPrefix { prefix: String, token: String },

    #[error("an extension is already registered for prefix \"{prefix}\"")]
    DuplicatePrefix { prefix: String },

    #[error("constant \"{key}\" is already defined")]
    ConstantRedefined { key: String },

    #[error(transparent)]
    Phase(#[from] PhaseError),
}

/// Identifies one parked handler step.
///
/// Tickets are plain values; resolving one that is not parked (twice, or
/// after the chain moved on) is reported as a stray resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtensionTicket {
    pub(crate) module: ModuleId,
    pub(crate) step: usize,
}

/// What a handler is asked to resolve.
#[derive(Debug, Clone)]
pub struct ExtensionRequest {
    /// The dependency name with all handler prefixes stripped.
    pub name: String,
    /// Value produced by the previously-applied handler, if any.
    pub previous: Option<Value>,
    /// Ticket for finishing this step later.
    pub ticket: ExtensionTicket,
}

/// A handler's answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionOutcome {
    /// The value is available now.
    Resolved(Value),
    /// The value will arrive later through the request's ticket.
    Pending,
    /// The dependency cannot be satisfied.
    Failed(String),
}

/// Services available to a handler while it runs.
pub struct ExtensionContext<'a> {
    dispatcher: &'a mut FetchDispatcher,
}

impl<'a> ExtensionContext<'a> {
    pub(crate) fn new(dispatcher: &'a mut FetchDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Request `target` as data through the container's loader.
    ///
    /// Fetches are deduplicated by target: a target that already arrived
    /// resolves immediately, one in flight parks `ticket` alongside the
    /// earlier waiters.
    pub fn fetch_data(&mut self, target: &str, ticket: ExtensionTicket) -> ExtensionOutcome {
        match self.dispatcher.request_data(target, DataWaiter::Handler(ticket)) {
            DataLookup::Cached(Ok(value)) => ExtensionOutcome::Resolved(value),
            DataLookup::Cached(Err(message)) => ExtensionOutcome::Failed(message),
            DataLookup::Waiting => ExtensionOutcome::Pending,
        }
    }
}

/// A custom dependency handler.
pub trait Extension {
    /// Resolve one prefixed dependency.
    fn handle(
        &mut self,
        request: ExtensionRequest,
        context: &mut ExtensionContext<'_>,
    ) -> ExtensionOutcome;
}

/// Handlers by prefix.
#[derive(Default)]
pub(crate) struct ExtensionRegistry {
    handlers: HashMap<String, Box<dyn Extension>>,
}

impl ExtensionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `extension` under `prefix`.
    ///
    /// `reserved` lists the tokens a prefix may not contain (the separator
    /// and the handler delimiter).
    pub(crate) fn register(
        &mut self,
        prefix: &str,
        extension: Box<dyn Extension>,
        reserved: &[&str],
    ) -> Result<(), ExtensionError> {
        if prefix.is_empty() {
            return Err(ExtensionError::EmptyPrefix);
        }
        if let Some(token) = reserved
            .iter()
            .find(|t| !t.is_empty() && prefix.contains(**t))
        {
            return Err(ExtensionError::InvalidPrefix {
                prefix: prefix.to_string(),
                token: token.to_string(),
            });
        }
        if self.handlers.contains_key(prefix) {
            return Err(ExtensionError::DuplicatePrefix {
                prefix: prefix.to_string(),
            });
        }
        self.handlers.insert(prefix.to_string(), extension);
        Ok(())
    }

    pub(crate) fn contains(&self, prefix: &str) -> bool {
        self.handlers.contains_key(prefix)
    }

    pub(crate) fn get_mut(&mut self, prefix: &str) -> Option<&mut Box<dyn Extension>> {
        self.handlers.get_mut(prefix)
    }

    pub(crate) fn prefixes(&self) -> Vec<&str> {
        let mut prefixes: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        prefixes.sort_unstable();
        prefixes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::json;

    struct Upper;

    impl Extension for Upper {
        fn handle(
            &mut self,
            request: ExtensionRequest,
            _: &mut ExtensionContext<'_>,
        ) -> ExtensionOutcome {
            ExtensionOutcome::Resolved(json!(request.name.to_uppercase()))
        }
    }

    fn upper() -> Box<dyn Extension> {
        Box::new(Upper)
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = ExtensionRegistry::new();
        registry.register("upper", upper(), &["/", "!"]).unwrap();
        assert!(registry.contains("upper"));
        assert!(!registry.contains("lower"));
        assert_eq!(registry.prefixes(), vec!["upper"]);
    }

    #[test]
    fn prefix_rules() {
        let mut registry = ExtensionRegistry::new();
        assert_eq!(
            registry.register("", upper(), &["/", "!"]),
            Err(ExtensionError::EmptyPrefix)
        );
        assert!(matches!(
            registry.register("a/b", upper(), &["/", "!"]),
            Err(ExtensionError::InvalidPrefix { token, .. }) if token == "/"
        ));
        assert!(matches!(
            registry.register("a!b", upper(), &["/", "!"]),
            Err(ExtensionError::InvalidPrefix { token, .. }) if token == "!"
        ));

        registry.register("upper", upper(), &["/", "!"]).unwrap();
        assert!(matches!(
            registry.register("upper", upper(), &["/", "!"]),
            Err(ExtensionError::DuplicatePrefix { .. })
        ));
    }

    #[test]
    fn empty_reserved_tokens_are_ignored() {
        let mut registry = ExtensionRegistry::new();
        registry.register("upper", upper(), &["", "!"]).unwrap();
        assert!(registry.contains("upper"));
    }

    #[test]
    fn handler_receives_stripped_name() {
        let mut registry = ExtensionRegistry::new();
        registry.register("upper", upper(), &[]).unwrap();

        let mut dispatcher = FetchDispatcher::new();
        let mut context = ExtensionContext::new(&mut dispatcher);
        let request = ExtensionRequest {
            name: "abc".to_string(),
            previous: None,
            ticket: ExtensionTicket {
                module: ModuleId(0),
                step: 0,
            },
        };
        let outcome = registry
            .get_mut("upper")
            .unwrap()
            .handle(request, &mut context);
        assert_eq!(outcome, ExtensionOutcome::Resolved(json!("ABC")));
    }

    #[test]
    fn fetch_data_parks_until_delivered() {
        let mut dispatcher = FetchDispatcher::new();
        let ticket = ExtensionTicket {
            module: ModuleId(2),
            step: 0,
        };

        let mut context = ExtensionContext::new(&mut dispatcher);
        assert_eq!(context.fetch_data("a.txt", ticket), ExtensionOutcome::Pending);
        // a second waiter does not issue a second request
        assert_eq!(context.fetch_data("a.txt", ticket), ExtensionOutcome::Pending);

        assert!(dispatcher.next_request().is_some());
        assert!(dispatcher.next_request().is_none());
    }
}

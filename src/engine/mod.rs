//! engine
//!
//! The module runtime: declarations, readiness tracking, fetching and
//! custom dependency handlers.
//!
//! # Architecture
//!
//! [`Container`] is the single entry point. It coordinates:
//!
//! 1. **Phases** ([`phase`]): buffer declarations while declaring, then
//!    process them in order
//! 2. **Registry** (`registry`): every module, its dependents and the graph
//! 3. **Modules** ([`module`]): per-module state machine and factory context
//! 4. **Fetching** ([`fetch`]): deduplicated loader requests for undeclared
//!    names, explicit units, and data for handlers and libraries
//! 5. **Extensions** ([`extension`]): `prefix!name` dependency handlers
//! 6. **Health** ([`health`]): diagnostics collected instead of raised
//!
//! # Invariants
//!
//! - Each factory runs at most once, and only after all its dependencies
//!   finalized
//! - Module states only move forward
//! - No target is fetched twice
//! - Cascades complete before the triggering call returns

mod container;
pub mod extension;
pub mod fetch;
pub mod health;
pub mod hooks;
pub mod module;
pub mod phase;
pub(crate) mod registry;

pub use container::Container;
pub use extension::{
    Extension, ExtensionContext, ExtensionError, ExtensionOutcome, ExtensionRequest,
    ExtensionTicket,
};
pub use fetch::{Content, FetchDispatcher, FetchError, FetchKind, FetchRequest, FetchStatus, Loader, TargetResolver};
pub use health::{Diagnostic, DiagnosticId, DiagnosticKind, Severity};
pub use hooks::ModuleEvent;
pub use module::{Declaration, DeclareError, Deferral, ModuleContext};
pub use phase::PhaseError;

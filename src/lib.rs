//! Wireloom - a dependency-injection module runtime
//!
//! Wireloom lets code declare named modules with dependency lists and a
//! factory, and invokes each factory exactly once, after every dependency
//! is available, handing it the dependency values in declaration order.
//! Dependencies nobody declared are fetched on demand through a pluggable
//! loader; prefixed dependencies (`text!greeting`) are resolved by custom
//! handlers.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`core`] - Strong types, naming rules, values, the dependency graph and configuration
//! - [`engine`] - The [`Container`]: lifecycle phases, module states, fetching, diagnostics
//! - [`loaders`] - Loader implementations (in-memory, filesystem, mock)
//! - [`extensions`] - Built-in dependency handlers
//!
//! # Correctness Invariants
//!
//! 1. A factory runs at most once, after all its dependencies finalized
//! 2. Module states only move forward
//! 3. A fetch target is requested at most once
//! 4. Problems that do not break the caller are recorded as diagnostics

pub mod core;
pub mod engine;
pub mod extensions;
pub mod loaders;

pub use engine::Container;

//! core
//!
//! Core domain types, schemas, and algorithms for Wireloom.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ModuleName, ModuleState, Phase, Mode
//! - [`naming`] - Module naming rules and specifier resolution
//! - [`value`] - Module values and fragment access
//! - [`graph`] - Dependency graph, cycle detection, load order
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing keeps unresolved names out of the registry
//! - Schemas are strict and self-describing
//! - Graph traversals are deterministic and always terminate

pub mod config;
pub mod graph;
pub mod naming;
pub mod types;
pub mod value;

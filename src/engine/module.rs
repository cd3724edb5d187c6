//! engine::module
//!
//! Declarations, the per-module state machine, and the factory context.
//!
//! # Lifecycle
//!
//! A module is created from a [`Declaration`] once its dependency
//! specifiers have been resolved. It counts the dependency edges that are
//! not yet filled; every time a producer finalizes, the matching slots are
//! filled and the counter drops. At zero the module becomes `Ready` and the
//! container invokes its factory exactly once.
//!
//! A factory may ask to finish later through [`ModuleContext::defer`]. The
//! module then stays `Deferred` until the container receives the
//! [`Deferral`] back.

use thiserror::Error;

use crate::core::naming::{DependencySpec, NameError, ANONYMOUS};
use crate::core::types::{ModuleId, ModuleName, ModuleState};
use crate::core::value::{fragment, Args, Map, Value};

/// Errors raised synchronously by a declaration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeclareError {
    #[error(transparent)]
    Name(#[from] NameError),

    #[error("module \"{name}\" is already declared")]
    Duplicate { name: ModuleName },

    #[error("module \"{module}\" lists dependency \"{specifier}\" more than once")]
    DuplicateDependency { module: String, specifier: String },
}

/// A module's factory.
///
/// Receives the module context and the resolved dependency values in
/// declaration order. Returning `Some(value)` sets the module's value;
/// `None` falls back to the exports bag.
pub type Factory = Box<dyn FnOnce(&mut ModuleContext, Args) -> anyhow::Result<Option<Value>>>;

/// An unprocessed module declaration.
///
/// # Example
///
/// ```
/// use wireloom::engine::module::Declaration;
/// use wireloom::core::value::json;
///
/// let declaration = Declaration::new("greeting", &["name"], |_, args| {
///     Ok(Some(json!(format!("hello {}", args.str(0).unwrap_or("world")))))
/// });
/// assert_eq!(declaration.name(), Some("greeting"));
/// assert_eq!(declaration.dependencies(), ["name".to_string()]);
/// ```
pub struct Declaration {
    pub(crate) name: Option<String>,
    pub(crate) dependencies: Vec<String>,
    pub(crate) factory: Factory,
}

impl Declaration {
    pub fn new<F>(name: &str, dependencies: &[&str], factory: F) -> Self
    where
        F: FnOnce(&mut ModuleContext, Args) -> anyhow::Result<Option<Value>> + 'static,
    {
        Self {
            name: Some(name.to_string()),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            factory: Box::new(factory),
        }
    }

    /// A module nobody can depend on.
    pub fn anonymous<F>(dependencies: &[&str], factory: F) -> Self
    where
        F: FnOnce(&mut ModuleContext, Args) -> anyhow::Result<Option<Value>> + 'static,
    {
        Self {
            name: None,
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            factory: Box::new(factory),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Dependency specifiers as written.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub(crate) fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(ANONYMOUS)
    }
}

impl std::fmt::Debug for Declaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Declaration")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Single-use token that finishes a deferred module.
///
/// Handed out by [`ModuleContext::defer`] and consumed by
/// `Container::resolve`. Dropping it leaves the module deferred forever.
#[must_use = "a dropped deferral leaves its module unresolved"]
#[derive(Debug, PartialEq, Eq)]
pub struct Deferral {
    pub(crate) module: ModuleId,
}

impl Deferral {
    /// The module this deferral finishes.
    pub fn module_id(&self) -> ModuleId {
        self.module
    }
}

/// What a factory sees while it runs.
#[derive(Debug)]
pub struct ModuleContext {
    module: ModuleId,
    name: Option<ModuleName>,
    exports: Map<String, Value>,
    deferred: bool,
    repeated_deferrals: usize,
    fetch: Option<String>,
}

/// How a factory left its context.
#[derive(Debug)]
pub(crate) struct ContextParts {
    pub(crate) exports: Map<String, Value>,
    pub(crate) deferred: bool,
    pub(crate) repeated_deferrals: usize,
    /// Data target the module waits on, set by `fetch_data`
    pub(crate) fetch: Option<String>,
}

impl ModuleContext {
    pub(crate) fn new(module: ModuleId, name: Option<ModuleName>, exports: Map<String, Value>) -> Self {
        Self {
            module,
            name,
            exports,
            deferred: false,
            repeated_deferrals: 0,
            fetch: None,
        }
    }

    /// Name of the running module (`None` for anonymous modules).
    pub fn name(&self) -> Option<&ModuleName> {
        self.name.as_ref()
    }

    pub fn exports(&self) -> &Map<String, Value> {
        &self.exports
    }

    /// The exports bag. Used as the module's value when the factory
    /// returns `None`.
    pub fn exports_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.exports
    }

    /// Set one export.
    pub fn export(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.exports.insert(key.into(), value.into());
    }

    /// Ask to finish this module later.
    ///
    /// The first call returns the token; later calls return `None` and are
    /// reported as misuse.
    pub fn defer(&mut self) -> Option<Deferral> {
        if self.deferred {
            self.repeated_deferrals += 1;
            return None;
        }
        self.deferred = true;
        Some(Deferral {
            module: self.module,
        })
    }

    /// Defer this module until `target` arrives as data from the loader.
    ///
    /// The delivered value becomes the module's value and a failed fetch
    /// fails the module. Counts as this factory's deferral: returns `false`
    /// (and is reported as misuse) if the module was already deferred.
    ///
    /// # Example
    ///
    /// ```
    /// use wireloom::Container;
    /// use wireloom::core::value::json;
    /// use wireloom::loaders::CatalogLoader;
    ///
    /// let mut container = Container::new();
    /// container.set_loader(CatalogLoader::new().with_data("vendor/chart.json", json!({"v": 3})));
    /// container.declare("chart", &[], |ctx, _| {
    ///     ctx.fetch_data("vendor/chart.json");
    ///     Ok(None)
    /// })?;
    /// container.start()?;
    ///
    /// assert_eq!(container.value("chart"), Some(&json!({"v": 3})));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn fetch_data(&mut self, target: impl Into<String>) -> bool {
        if self.deferred {
            self.repeated_deferrals += 1;
            return false;
        }
        self.deferred = true;
        self.fetch = Some(target.into());
        true
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub(crate) fn into_parts(self) -> ContextParts {
        ContextParts {
            exports: self.exports,
            deferred: self.deferred,
            repeated_deferrals: self.repeated_deferrals,
            fetch: self.fetch,
        }
    }
}

/// A custom-handled dependency being worked through its handler chain.
#[derive(Debug)]
pub(crate) struct HandlerChain {
    /// Name handed to each handler (prefixes stripped)
    pub(crate) base: String,
    /// Handler prefixes in application order
    pub(crate) handlers: Vec<String>,
    /// Index of the handler currently running
    pub(crate) step: usize,
    /// Value produced by the previous handler
    pub(crate) previous: Option<Value>,
    /// Whether the current handler answered `Pending`
    pub(crate) awaiting: bool,
}

pub(crate) enum ModuleKind {
    Regular { factory: Option<Factory> },
    Custom(HandlerChain),
}

/// A module owned by the registry.
pub(crate) struct Module {
    pub(crate) id: ModuleId,
    pub(crate) name: Option<ModuleName>,
    pub(crate) kind: ModuleKind,
    pub(crate) edges: Vec<DependencySpec>,
    slots: Vec<Option<Value>>,
    filled: Vec<bool>,
    outstanding: usize,
    pub(crate) state: ModuleState,
    pub(crate) value: Option<Value>,
    pub(crate) exports: Map<String, Value>,
    /// Value returned by a factory that also deferred
    pub(crate) provisional: Option<Value>,
}

impl Module {
    pub(crate) fn regular(
        id: ModuleId,
        name: Option<ModuleName>,
        edges: Vec<DependencySpec>,
        factory: Factory,
    ) -> Self {
        let count = edges.len();
        Self {
            id,
            name,
            kind: ModuleKind::Regular {
                factory: Some(factory),
            },
            edges,
            slots: vec![None; count],
            filled: vec![false; count],
            outstanding: count,
            state: if count == 0 {
                ModuleState::Ready
            } else {
                ModuleState::Declared
            },
            value: None,
            exports: Map::new(),
            provisional: None,
        }
    }

    /// A module standing for a custom-handled dependency (`text!x`).
    pub(crate) fn custom(id: ModuleId, spec: &DependencySpec) -> Self {
        Self {
            id,
            name: Some(spec.target.clone()),
            kind: ModuleKind::Custom(HandlerChain {
                base: spec.base.clone(),
                handlers: spec.handlers.clone(),
                step: 0,
                previous: None,
                awaiting: false,
            }),
            edges: Vec::new(),
            slots: Vec::new(),
            filled: Vec::new(),
            outstanding: 0,
            state: ModuleState::Ready,
            value: None,
            exports: Map::new(),
            provisional: None,
        }
    }

    pub(crate) fn label(&self) -> String {
        self.name
            .as_ref()
            .map(ModuleName::to_string)
            .unwrap_or_else(|| ANONYMOUS.to_string())
    }

    pub(crate) fn is_custom(&self) -> bool {
        matches!(self.kind, ModuleKind::Custom(_))
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Move to `next` if that keeps the state monotonic.
    pub(crate) fn advance(&mut self, next: ModuleState) -> bool {
        if !self.state.can_advance_to(next) {
            tracing::trace!(module = %self.label(), from = %self.state, to = %next, "state change refused");
            return false;
        }
        self.state = next;
        true
    }

    /// Fill every unfilled edge that targets `target`.
    ///
    /// Returns `true` when this made the module ready.
    pub(crate) fn on_dependency_ready(&mut self, target: &str, value: &Value) -> bool {
        for (index, edge) in self.edges.iter().enumerate() {
            if self.filled[index] || edge.target.as_str() != target {
                continue;
            }
            self.slots[index] = match &edge.fragment {
                Some(path) => fragment(value, path),
                None => Some(value.clone()),
            };
            self.filled[index] = true;
            self.outstanding -= 1;
            tracing::trace!(module = %self.label(), dependency = %edge.raw, slot = index, "slot filled");
        }

        self.outstanding == 0 && self.state == ModuleState::Declared && self.advance(ModuleState::Ready)
    }

    /// Hand the filled slots to the factory.
    pub(crate) fn take_args(&mut self) -> Args {
        Args::new(std::mem::take(&mut self.slots))
    }

    /// Canonical names this module depends on, in declaration order.
    pub(crate) fn dependency_names(&self) -> Vec<ModuleName> {
        self.edges.iter().map(|e| e.target.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::naming::NameResolver;
    use crate::core::value::json;

    fn specs(owner: &str, deps: &[&str]) -> (ModuleName, Vec<DependencySpec>) {
        let resolver = NameResolver::default();
        let owner = resolver.module_name(owner).unwrap();
        let specs = deps
            .iter()
            .enumerate()
            .map(|(i, d)| resolver.resolve(Some(&owner), d, i, |_| false).unwrap())
            .collect();
        (owner, specs)
    }

    fn noop() -> Factory {
        Box::new(|_, _| Ok(None))
    }

    #[test]
    fn no_dependencies_starts_ready() {
        let (name, edges) = specs("a", &[]);
        let module = Module::regular(ModuleId(0), Some(name), edges, noop());
        assert_eq!(module.state, ModuleState::Ready);
        assert_eq!(module.outstanding(), 0);
    }

    #[test]
    fn becomes_ready_after_last_dependency() {
        let (name, edges) = specs("app", &["db", "log"]);
        let mut module = Module::regular(ModuleId(0), Some(name), edges, noop());
        assert_eq!(module.state, ModuleState::Declared);

        assert!(!module.on_dependency_ready("db", &json!("db")));
        assert_eq!(module.outstanding(), 1);
        assert!(module.on_dependency_ready("log", &json!("log")));
        assert_eq!(module.state, ModuleState::Ready);

        let args = module.take_args();
        assert_eq!(args.str(0), Some("db"));
        assert_eq!(args.str(1), Some("log"));
    }

    #[test]
    fn same_target_with_different_fragments() {
        let (name, edges) = specs("app", &["config.db", "config.port", "config.nope.deeper"]);
        let mut module = Module::regular(ModuleId(0), Some(name), edges, noop());

        let config = json!({"db": "postgres", "port": 5432});
        assert!(module.on_dependency_ready("config", &config));

        let args = module.take_args();
        assert_eq!(args.str(0), Some("postgres"));
        assert_eq!(args.i64(1), Some(5432));
        assert_eq!(args.get(2), None);
    }

    #[test]
    fn repeated_notification_is_ignored() {
        let (name, edges) = specs("app", &["db", "log"]);
        let mut module = Module::regular(ModuleId(0), Some(name), edges, noop());
        module.on_dependency_ready("db", &json!(1));
        module.on_dependency_ready("db", &json!(2));
        assert_eq!(module.outstanding(), 1);
    }

    #[test]
    fn defer_is_single_use() {
        let mut ctx = ModuleContext::new(ModuleId(3), None, Map::new());
        let first = ctx.defer();
        assert_eq!(first.map(|d| d.module_id()), Some(ModuleId(3)));
        assert!(ctx.defer().is_none());
        assert!(ctx.is_deferred());

        let parts = ctx.into_parts();
        assert!(parts.deferred);
        assert_eq!(parts.repeated_deferrals, 1);
        assert_eq!(parts.fetch, None);
    }

    #[test]
    fn fetch_data_counts_as_the_deferral() {
        let mut ctx = ModuleContext::new(ModuleId(0), None, Map::new());
        assert!(ctx.fetch_data("lib/chart.js"));
        assert!(ctx.defer().is_none());
        assert!(!ctx.fetch_data("other.js"));

        let parts = ctx.into_parts();
        assert!(parts.deferred);
        assert_eq!(parts.repeated_deferrals, 2);
        assert_eq!(parts.fetch.as_deref(), Some("lib/chart.js"));
    }

    #[test]
    fn exports_bag() {
        let mut ctx = ModuleContext::new(ModuleId(0), None, Map::new());
        ctx.export("answer", 42);
        ctx.exports_mut().insert("name".to_string(), json!("x"));
        assert_eq!(ctx.exports().len(), 2);
        assert_eq!(ctx.exports()["answer"], json!(42));
    }

    #[test]
    fn states_never_go_backwards() {
        let (name, edges) = specs("a", &[]);
        let mut module = Module::regular(ModuleId(0), Some(name), edges, noop());
        assert!(module.advance(ModuleState::Finalized));
        assert!(!module.advance(ModuleState::Deferred));
        assert_eq!(module.state, ModuleState::Finalized);
    }

    #[test]
    fn custom_module_is_named_after_its_target() {
        let resolver = NameResolver::default();
        let owner = resolver.module_name("views").unwrap();
        let spec = resolver
            .resolve(Some(&owner), "text!./page.html", 0, |p| p == "text")
            .unwrap();
        let module = Module::custom(ModuleId(1), &spec);
        assert_eq!(module.label(), "text!page.html");
        assert!(module.is_custom());
        assert_eq!(module.state, ModuleState::Ready);
    }
}

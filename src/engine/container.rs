//! engine::container
//!
//! The dependency-injection runtime.
//!
//! # Architecture
//!
//! [`Container`] owns every piece of runtime state: the registry, the phase
//! controller, the extension registry, the fetch dispatcher and the
//! diagnostics. All mutation happens on the caller's thread.
//!
//! Each public call performs its own change and then drains a work queue
//! until nothing is left to do:
//!
//! ```text
//! declare ──> register edges ──> Finalize(ready modules)
//!                                   │
//!                                   └──> notify dependents ──> Finalize(...)
//! fetch completion ──> Declare(unit contents) ──> CheckUnit
//! prefixed dependency ──> Extension(step) ──> ... ──> Finalize
//! ctx.fetch_data(target) ──> Deferred ──> data completion ──> Finalize
//! ```
//!
//! A cascade `X -> Y -> Z` therefore completes before control returns, and
//! dependent lists are snapshotted before they are notified.
//!
//! # Example
//!
//! ```
//! use wireloom::Container;
//! use wireloom::core::value::json;
//!
//! let mut container = Container::new();
//! container
//!     .declare("b", &["a"], |_, args| Ok(Some(json!(args.i64(0).unwrap_or(0) + 1))))?
//!     .declare("a", &[], |_, _| Ok(Some(json!(1))))?;
//! container.start()?;
//!
//! assert_eq!(container.value("b"), Some(&json!(2)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::{BTreeMap, VecDeque};

use super::extension::{
    Extension, ExtensionContext, ExtensionError, ExtensionOutcome, ExtensionRegistry,
    ExtensionRequest, ExtensionTicket,
};
use super::fetch::{
    Content, DataLookup, DataWaiter, FetchDispatcher, FetchError, FetchKind, FetchRequest,
    FetchStatus, Loader, TargetResolver,
};
use super::health::{Diagnostic, DiagnosticKind, Diagnostics};
use super::hooks::{Hooks, ModuleEvent};
use super::module::{
    ContextParts, Declaration, DeclareError, Deferral, Module, ModuleContext, ModuleKind,
};
use super::phase::{PhaseController, PhaseError};
use super::registry::Registry;
use crate::core::config::Config;
use crate::core::graph::DependencyGraph;
use crate::core::naming::{DependencySpec, NameResolver};
use crate::core::types::{Mode, ModuleId, ModuleName, ModuleState, Phase};
use crate::core::value::{Args, Value};

/// One unit of deferred work.
enum Work {
    /// A declaration delivered by a fetched unit.
    Declare { declaration: Declaration, source: String },
    Finalize(ModuleId),
    Extension(ModuleId),
    Completion {
        target: String,
        result: Result<Content, FetchError>,
    },
    /// Verify a unit declared the modules it was fetched for.
    CheckUnit { target: String, modules: Vec<ModuleName> },
}

/// The module container.
pub struct Container {
    mode: Mode,
    resolver: NameResolver,
    phases: PhaseController,
    registry: Registry,
    extensions: ExtensionRegistry,
    dispatcher: FetchDispatcher,
    loader: Option<Box<dyn Loader>>,
    targets: TargetResolver,
    fetch_enabled: bool,
    hooks: Hooks,
    diagnostics: Diagnostics,
    queue: VecDeque<Work>,
    fetch_candidates: Vec<ModuleName>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("mode", &self.mode)
            .field("phase", &self.phases.phase())
            .field("buffered", &self.phases.buffered())
            .field("modules", &self.registry.len())
            .field("extensions", &self.extensions.prefixes())
            .field("loader", &self.loader.as_ref().map(|l| l.name()))
            .field("diagnostics", &self.diagnostics.len())
            .finish()
    }
}

impl Container {
    /// Create a production-mode container with default naming tokens.
    pub fn new() -> Self {
        Self {
            mode: Mode::default(),
            resolver: NameResolver::default(),
            phases: PhaseController::new(),
            registry: Registry::new(),
            extensions: ExtensionRegistry::new(),
            dispatcher: FetchDispatcher::new(),
            loader: None,
            targets: TargetResolver::default(),
            fetch_enabled: true,
            hooks: Hooks::default(),
            diagnostics: Diagnostics::new(),
            queue: VecDeque::new(),
            fetch_candidates: Vec::new(),
        }
    }

    /// Create a container configured from `config`.
    pub fn from_config(config: &Config) -> Self {
        let mut container = Self::new();
        container.apply_config(config);
        container
    }

    // =========================================================================
    // Configuration (Declaring only)
    // =========================================================================

    /// Apply mode, naming tokens and fetch settings.
    pub fn configure(&mut self, config: &Config) -> Result<(), PhaseError> {
        self.phases.require_declaring("configure")?;
        self.apply_config(config);
        Ok(())
    }

    fn apply_config(&mut self, config: &Config) {
        self.mode = config.mode();
        self.resolver = NameResolver::new(config.naming_tokens());
        self.fetch_enabled = config.fetch_enabled();
        self.targets = TargetResolver::affix(config.fetch_prefix(), config.fetch_suffix());
        tracing::debug!(mode = %self.mode, fetch = self.fetch_enabled, "container configured");
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<(), PhaseError> {
        self.phases.require_declaring("set_mode")?;
        self.mode = mode;
        Ok(())
    }

    /// Turn on-demand fetching of undeclared modules on or off.
    pub fn set_fetch_enabled(&mut self, enabled: bool) -> Result<(), PhaseError> {
        self.phases.require_declaring("set_fetch_enabled")?;
        self.fetch_enabled = enabled;
        Ok(())
    }

    /// Map module names to fetch targets with a custom function.
    ///
    /// Returning `None` marks the name as requested without fetching.
    pub fn set_target_resolver<F>(&mut self, resolver: F) -> Result<(), PhaseError>
    where
        F: Fn(&ModuleName) -> Option<String> + 'static,
    {
        self.phases.require_declaring("set_target_resolver")?;
        self.targets = TargetResolver::Custom(Box::new(resolver));
        Ok(())
    }

    /// Install the loader used for on-demand fetches.
    pub fn set_loader(&mut self, loader: impl Loader + 'static) {
        tracing::debug!(loader = loader.name(), "loader installed");
        self.loader = Some(Box::new(loader));
    }

    /// Register a handler for dependencies written `prefix!name`.
    pub fn register_extension(
        &mut self,
        prefix: &str,
        extension: impl Extension + 'static,
    ) -> Result<(), ExtensionError> {
        self.phases.require_declaring("register_extension")?;
        let tokens = self.resolver.tokens();
        let reserved = [tokens.separator.as_str(), tokens.delimiter.as_str()];
        self.extensions
            .register(prefix, Box::new(extension), &reserved)?;
        tracing::debug!(prefix, "extension registered");
        Ok(())
    }

    /// Call `listener` whenever a named module is declared.
    pub fn on_declared(
        &mut self,
        listener: impl FnMut(&ModuleEvent) + 'static,
    ) -> Result<(), PhaseError> {
        self.phases.require_declaring("on_declared")?;
        self.hooks.on_declared(Box::new(listener));
        Ok(())
    }

    /// Call `listener` whenever a named module finalizes.
    pub fn on_finalized(
        &mut self,
        listener: impl FnMut(&ModuleEvent) + 'static,
    ) -> Result<(), PhaseError> {
        self.phases.require_declaring("on_finalized")?;
        self.hooks.on_finalized(Box::new(listener));
        Ok(())
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    /// Declare a named module.
    ///
    /// While declaring, the declaration is buffered; afterwards it is
    /// processed immediately and any resulting cascade completes before
    /// this returns.
    pub fn declare<F>(
        &mut self,
        name: &str,
        dependencies: &[&str],
        factory: F,
    ) -> Result<&mut Self, DeclareError>
    where
        F: FnOnce(&mut ModuleContext, Args) -> anyhow::Result<Option<Value>> + 'static,
    {
        self.submit(Declaration::new(name, dependencies, factory))
    }

    /// Declare a module nothing can depend on.
    pub fn declare_anonymous<F>(
        &mut self,
        dependencies: &[&str],
        factory: F,
    ) -> Result<&mut Self, DeclareError>
    where
        F: FnOnce(&mut ModuleContext, Args) -> anyhow::Result<Option<Value>> + 'static,
    {
        self.submit(Declaration::anonymous(dependencies, factory))
    }

    /// Declare module `name` whose value is the data loaded from `target`.
    ///
    /// The module defers itself and finalizes once the loader delivers
    /// `target`; dependents see the delivered value.
    pub fn lib(&mut self, name: &str, target: &str) -> Result<&mut Self, DeclareError> {
        let target = target.to_string();
        self.declare(name, &[], move |ctx, _| {
            ctx.fetch_data(target);
            Ok(None)
        })
    }

    /// Declare a prepared [`Declaration`].
    pub fn submit(&mut self, declaration: Declaration) -> Result<&mut Self, DeclareError> {
        if self.phases.is_declaring() {
            tracing::trace!(module = declaration.label(), "declaration buffered");
            self.phases.buffer(declaration)?;
            return Ok(self);
        }

        self.process_declaration(declaration)?;
        self.drain();
        Ok(self)
    }

    // =========================================================================
    // Phase transitions
    // =========================================================================

    /// `Declaring -> Resolving`: process buffered declarations in order.
    ///
    /// Invalid buffered declarations are skipped and returned together as
    /// [`PhaseError::Rejected`]; the others proceed and the phase advances
    /// either way.
    pub fn start_resolving(&mut self) -> Result<(), PhaseError> {
        let buffered = self.phases.begin_resolving()?;
        tracing::debug!(count = buffered.len(), "flushing buffered declarations");

        let mut rejected = Vec::new();
        for declaration in buffered {
            let label = declaration.label().to_string();
            if let Err(error) = self.process_declaration(declaration) {
                tracing::warn!(module = %label, %error, "buffered declaration rejected");
                rejected.push(error);
            }
            self.drain();
        }

        if rejected.is_empty() {
            Ok(())
        } else {
            Err(PhaseError::Rejected(rejected))
        }
    }

    /// `Resolving -> Fetching`: fetch every undeclared name that has
    /// dependents (or report them when fetching is off).
    pub fn start_fetching(&mut self) -> Result<(), PhaseError> {
        self.phases.begin_fetching()?;

        let missing: Vec<ModuleName> = self.registry.missing().into_keys().collect();
        if self.fetch_enabled {
            self.fetch_candidates.extend(missing);
            self.drain();
        } else if !missing.is_empty() && self.mode.diagnostics_enabled() {
            self.diagnostics
                .report(DiagnosticKind::UndeclaredAtResolveEnd { names: missing });
        }
        Ok(())
    }

    /// Run both transitions.
    ///
    /// Fetching starts even if some buffered declarations were rejected;
    /// the rejection is returned afterwards.
    pub fn start(&mut self) -> Result<(), PhaseError> {
        let resolved = self.start_resolving();
        if matches!(resolved, Err(PhaseError::InvalidTransition { .. })) {
            return resolved;
        }
        self.start_fetching()?;
        resolved
    }

    // =========================================================================
    // Completing suspended work
    // =========================================================================

    /// Finish a deferred module.
    ///
    /// With `None`, the value returned by the deferring factory is used, or
    /// its exports bag if it returned nothing.
    pub fn resolve(&mut self, deferral: Deferral, value: Option<Value>) {
        let id = deferral.module;
        let value = match self.registry.get_mut(id) {
            Some(module) if module.state == ModuleState::Deferred => value
                .or_else(|| module.provisional.take())
                .unwrap_or_else(|| Value::Object(std::mem::take(&mut module.exports))),
            _ => {
                self.diagnostics.report(DiagnosticKind::StrayResolution {
                    subject: format!("deferral of module #{}", id.index()),
                });
                return;
            }
        };
        self.finalize(id, value);
        self.drain();
    }

    /// Finish a handler step that answered [`ExtensionOutcome::Pending`].
    pub fn resolve_extension(&mut self, ticket: ExtensionTicket, result: Result<Value, String>) {
        self.resume(ticket, result);
        self.drain();
    }

    /// Deliver the result of a fetch the loader answered with `Pending`.
    pub fn complete_fetch(&mut self, target: &str, result: Result<Content, FetchError>) {
        self.queue.push_back(Work::Completion {
            target: target.to_string(),
            result,
        });
        self.drain();
    }

    /// Fetch an explicit unit of declarations.
    pub fn load_unit(&mut self, target: &str) -> Result<(), PhaseError> {
        self.phases.require_started("load_unit")?;
        if self.dispatcher.request_unit(target) {
            tracing::debug!(fetch_target = target, "unit requested");
        }
        self.drain();
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn phase(&self) -> Phase {
        self.phases.phase()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Active naming rules.
    pub fn resolver(&self) -> &NameResolver {
        &self.resolver
    }

    /// State of a declared (or custom-handled) module.
    pub fn state(&self, name: &str) -> Option<ModuleState> {
        self.registry.by_name(name).map(|m| m.state)
    }

    /// Value of a finalized module.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.registry
            .by_name(name)
            .filter(|m| m.state == ModuleState::Finalized)
            .and_then(|m| m.value.as_ref())
    }

    /// Undeclared names that something depends on, with their dependents.
    pub fn missing(&self) -> BTreeMap<ModuleName, Vec<String>> {
        self.registry.missing()
    }

    /// Every depended-upon name with its dependents.
    pub fn dependents(&self) -> BTreeMap<ModuleName, Vec<String>> {
        self.registry.dependents()
    }

    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.registry.dependents_of(name)
    }

    /// Load order of the subtree rooted at `name` (empty if undeclared).
    pub fn load_order(&self, name: &str) -> Vec<ModuleName> {
        self.registry.graph().load_order(name)
    }

    /// Load order of every root module.
    pub fn forest(&self) -> BTreeMap<ModuleName, Vec<ModuleName>> {
        self.registry.graph().forest()
    }

    pub fn graph(&self) -> &DependencyGraph {
        self.registry.graph()
    }

    /// Fetch targets still waiting for a completion.
    pub fn in_flight(&self) -> Vec<&str> {
        self.dispatcher.in_flight()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.all()
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.take()
    }

    // =========================================================================
    // Work queue
    // =========================================================================

    fn drain(&mut self) {
        loop {
            if let Some(work) = self.queue.pop_front() {
                self.run(work);
                continue;
            }
            if !self.fetch_candidates.is_empty() {
                self.request_candidates();
                continue;
            }
            if let Some(request) = self.dispatcher.next_request() {
                self.dispatch(request);
                continue;
            }
            break;
        }
    }

    fn run(&mut self, work: Work) {
        match work {
            Work::Declare {
                declaration,
                source,
            } => {
                if let Err(error) = self.process_declaration(declaration) {
                    self.diagnostics.report(DiagnosticKind::UnitRejected {
                        target: source,
                        message: error.to_string(),
                    });
                }
            }
            Work::Finalize(id) => self.try_finalize(id),
            Work::Extension(id) => self.run_extension(id),
            Work::Completion { target, result } => self.apply_completion(target, result),
            Work::CheckUnit { target, modules } => {
                if !self.mode.diagnostics_enabled() {
                    return;
                }
                for module in modules {
                    if !self.registry.contains(module.as_str()) {
                        self.diagnostics.report(DiagnosticKind::ModuleNotInUnit {
                            module,
                            target: target.clone(),
                        });
                    }
                }
            }
        }
    }

    /// Validate and register a declaration, wiring every edge.
    fn process_declaration(&mut self, declaration: Declaration) -> Result<ModuleId, DeclareError> {
        let Declaration {
            name,
            dependencies,
            factory,
        } = declaration;

        let name = name
            .as_deref()
            .map(|n| self.resolver.module_name(n))
            .transpose()?;
        if let Some(name) = &name {
            if self.registry.contains(name.as_str()) {
                return Err(DeclareError::Duplicate { name: name.clone() });
            }
        }

        let extensions = &self.extensions;
        let mut edges: Vec<DependencySpec> = Vec::with_capacity(dependencies.len());
        for (index, raw) in dependencies.iter().enumerate() {
            let spec = self
                .resolver
                .resolve(name.as_ref(), raw, index, |prefix| extensions.contains(prefix))?;
            if edges
                .iter()
                .any(|e| e.target == spec.target && e.fragment == spec.fragment)
            {
                return Err(DeclareError::DuplicateDependency {
                    module: declaration_label(name.as_ref()),
                    specifier: raw.clone(),
                });
            }
            edges.push(spec);
        }

        let id = self.registry.next_id();
        let module = Module::regular(id, name.clone(), edges.clone(), factory);
        let label = module.label();
        let waiting = module.outstanding();
        self.registry.insert(module);
        tracing::debug!(module = %label, dependencies = edges.len(), waiting, "module declared");

        if let Some(name) = &name {
            if self.hooks.wants_declared() {
                self.hooks.declared(&ModuleEvent {
                    name: name.clone(),
                    dependencies: edges.iter().map(|e| e.target.clone()).collect(),
                    value: None,
                });
            }
        }

        for edge in &edges {
            self.connect(id, edge);
        }

        if let Some(name) = &name {
            if self.mode.diagnostics_enabled() {
                if let Some(path) = self.registry.graph().find_cycle_through(name) {
                    self.diagnostics.report(DiagnosticKind::Cycle { path });
                }
            }
        }

        if self.registry.get(id).map(|m| m.state) == Some(ModuleState::Ready) {
            self.queue.push_back(Work::Finalize(id));
        }
        Ok(id)
    }

    /// Wire one dependency edge of module `id`.
    fn connect(&mut self, id: ModuleId, edge: &DependencySpec) {
        let target = &edge.target;
        self.registry.add_dependent(target, id);

        if let Some(producer) = self.registry.by_name(target.as_str()) {
            if producer.state == ModuleState::Finalized {
                let value = producer.value.clone().unwrap_or(Value::Null);
                if let Some(module) = self.registry.get_mut(id) {
                    module.on_dependency_ready(target.as_str(), &value);
                }
            }
            return;
        }

        if edge.is_custom() {
            let custom = self.registry.next_id();
            self.registry.insert(Module::custom(custom, edge));
            tracing::debug!(module = %target, "custom dependency created");
            self.queue.push_back(Work::Extension(custom));
        } else if self.fetch_enabled && self.phases.phase() == Phase::Fetching {
            self.fetch_candidates.push(target.clone());
        }
    }

    /// Invoke the factory of a ready module.
    fn try_finalize(&mut self, id: ModuleId) {
        let runs_factories = self.mode.runs_factories();
        let Some(module) = self.registry.get_mut(id) else {
            return;
        };
        if module.state != ModuleState::Ready {
            return;
        }
        let ModuleKind::Regular { factory } = &mut module.kind else {
            return;
        };
        let Some(factory) = factory.take() else {
            return;
        };

        if !runs_factories {
            let value = Value::Object(std::mem::take(&mut module.exports));
            self.finalize(id, value);
            return;
        }

        let label = module.label();
        let args = module.take_args();
        let mut context =
            ModuleContext::new(id, module.name.clone(), std::mem::take(&mut module.exports));
        tracing::debug!(module = %label, "invoking factory");
        let outcome = factory(&mut context, args);
        let ContextParts {
            exports,
            deferred,
            repeated_deferrals,
            fetch,
        } = context.into_parts();

        if repeated_deferrals > 0 {
            self.diagnostics.report(DiagnosticKind::DeferralRepeated {
                module: label.clone(),
            });
        }

        let Some(module) = self.registry.get_mut(id) else {
            return;
        };
        module.exports = exports;
        match outcome {
            Err(error) => {
                module.advance(ModuleState::Failed);
                self.diagnostics.report(DiagnosticKind::FactoryFailed {
                    module: label,
                    message: format!("{:#}", error),
                });
            }
            Ok(provisional) if deferred => {
                module.provisional = provisional;
                module.advance(ModuleState::Deferred);
                tracing::debug!(module = %label, "module deferred");
                if let Some(target) = fetch {
                    self.await_data(id, &target);
                }
            }
            Ok(Some(value)) => self.finalize(id, value),
            Ok(None) => {
                let value = Value::Object(std::mem::take(&mut module.exports));
                self.finalize(id, value);
            }
        }
    }

    /// Fix a module's value and notify its dependents.
    fn finalize(&mut self, id: ModuleId, value: Value) {
        let Some(module) = self.registry.get_mut(id) else {
            return;
        };
        if !module.advance(ModuleState::Finalized) {
            return;
        }
        module.value = Some(value.clone());
        tracing::debug!(module = %module.label(), "module finalized");

        let Some(name) = module.name.clone() else {
            return;
        };

        if !module.is_custom() && self.hooks.wants_finalized() {
            let event = ModuleEvent {
                name: name.clone(),
                dependencies: module.dependency_names(),
                value: Some(value.clone()),
            };
            self.hooks.finalized(&event);
        }

        for dependent in self.registry.dependents_snapshot(name.as_str()) {
            if let Some(module) = self.registry.get_mut(dependent) {
                if module.on_dependency_ready(name.as_str(), &value) {
                    self.queue.push_back(Work::Finalize(dependent));
                }
            }
        }
    }

    // =========================================================================
    // Handler chains
    // =========================================================================

    /// Apply the current handler of a custom module.
    fn run_extension(&mut self, id: ModuleId) {
        let Some(module) = self.registry.get_mut(id) else {
            return;
        };
        if module.state.is_terminal() {
            return;
        }
        let label = module.label();
        let ModuleKind::Custom(chain) = &mut module.kind else {
            return;
        };
        if chain.awaiting {
            return;
        }
        let Some(prefix) = chain.handlers.get(chain.step).cloned() else {
            return;
        };
        let request = ExtensionRequest {
            name: chain.base.clone(),
            previous: chain.previous.take(),
            ticket: ExtensionTicket {
                module: id,
                step: chain.step,
            },
        };

        let Some(extension) = self.extensions.get_mut(&prefix) else {
            self.fail_chain(id, format!("no handler registered for \"{}\"", prefix));
            return;
        };
        let mut context = ExtensionContext::new(&mut self.dispatcher);
        tracing::debug!(module = %label, handler = %prefix, "applying handler");

        match extension.handle(request, &mut context) {
            ExtensionOutcome::Resolved(value) => self.advance_chain(id, value),
            ExtensionOutcome::Pending => {
                if let Some(Module {
                    kind: ModuleKind::Custom(chain),
                    ..
                }) = self.registry.get_mut(id)
                {
                    chain.awaiting = true;
                }
            }
            ExtensionOutcome::Failed(message) => self.fail_chain(id, message),
        }
    }

    fn advance_chain(&mut self, id: ModuleId, value: Value) {
        let Some(Module {
            kind: ModuleKind::Custom(chain),
            ..
        }) = self.registry.get_mut(id)
        else {
            return;
        };
        chain.step += 1;
        if chain.step < chain.handlers.len() {
            chain.previous = Some(value);
            self.queue.push_back(Work::Extension(id));
        } else {
            self.finalize(id, value);
        }
    }

    fn fail_chain(&mut self, id: ModuleId, message: String) {
        let Some(module) = self.registry.get_mut(id) else {
            return;
        };
        let handler = match &module.kind {
            ModuleKind::Custom(chain) => chain.handlers.get(chain.step).cloned().unwrap_or_default(),
            ModuleKind::Regular { .. } => String::new(),
        };
        module.advance(ModuleState::Failed);
        self.diagnostics.report(DiagnosticKind::ExtensionFailed {
            module: module.label(),
            handler,
            message,
        });
    }

    /// Continue a parked handler step.
    fn resume(&mut self, ticket: ExtensionTicket, result: Result<Value, String>) {
        let parked = match self.registry.get_mut(ticket.module) {
            Some(module) if !module.state.is_terminal() => match &mut module.kind {
                ModuleKind::Custom(chain) if chain.awaiting && chain.step == ticket.step => {
                    chain.awaiting = false;
                    true
                }
                _ => false,
            },
            _ => false,
        };
        if !parked {
            self.diagnostics.report(DiagnosticKind::StrayResolution {
                subject: format!("handler step {} of module #{}", ticket.step, ticket.module.index()),
            });
            return;
        }
        match result {
            Ok(value) => self.advance_chain(ticket.module, value),
            Err(message) => self.fail_chain(ticket.module, message),
        }
    }

    // =========================================================================
    // Fetching
    // =========================================================================

    /// Park deferred module `id` on data `target`.
    fn await_data(&mut self, id: ModuleId, target: &str) {
        tracing::debug!(fetch_target = target, "module waiting on data");
        match self.dispatcher.request_data(target, DataWaiter::Module(id)) {
            DataLookup::Cached(result) => self.deliver_data(id, target, result),
            DataLookup::Waiting => {}
        }
    }

    /// Finish a module deferred by `ModuleContext::fetch_data`.
    fn deliver_data(&mut self, id: ModuleId, target: &str, result: Result<Value, String>) {
        let Some(module) = self.registry.get_mut(id) else {
            return;
        };
        if module.state != ModuleState::Deferred {
            return;
        }
        match result {
            Ok(value) => self.finalize(id, value),
            Err(message) => {
                module.advance(ModuleState::Failed);
                self.diagnostics.report(DiagnosticKind::LibraryFailed {
                    module: module.label(),
                    target: target.to_string(),
                    message,
                });
            }
        }
    }

    /// Request units for candidate names that are still undeclared.
    fn request_candidates(&mut self) {
        for name in std::mem::take(&mut self.fetch_candidates) {
            if self.registry.contains(name.as_str()) {
                continue;
            }
            let target = self.targets.target_for(&name);
            if self.dispatcher.request_module(&name, target) {
                tracing::debug!(module = %name, "fetch queued");
            }
        }
    }

    fn dispatch(&mut self, request: FetchRequest) {
        tracing::debug!(fetch_target = %request.target, kind = %request.kind, "dispatching fetch");
        let status = match self.loader.as_mut() {
            Some(loader) => loader.fetch(&request),
            None => FetchStatus::Ready(Err(FetchError::Unavailable)),
        };
        if let FetchStatus::Ready(result) = status {
            self.queue.push_back(Work::Completion {
                target: request.target,
                result,
            });
        }
    }

    fn apply_completion(&mut self, target: String, result: Result<Content, FetchError>) {
        let Some(settled) = self.dispatcher.settle(&target) else {
            self.diagnostics.report(DiagnosticKind::StrayResolution {
                subject: format!("fetch '{}'", target),
            });
            return;
        };

        match settled.kind {
            FetchKind::Unit => match result {
                Ok(Content::Unit(declarations)) => {
                    tracing::debug!(fetch_target = %target, count = declarations.len(), "unit loaded");
                    for declaration in declarations {
                        self.queue.push_back(Work::Declare {
                            declaration,
                            source: target.clone(),
                        });
                    }
                    self.queue.push_back(Work::CheckUnit {
                        target,
                        modules: settled.modules,
                    });
                }
                Ok(Content::Data(_)) => {
                    self.diagnostics.report(DiagnosticKind::UnexpectedContent {
                        target,
                        expected: "a unit of declarations".to_string(),
                    });
                }
                Err(error) => {
                    self.diagnostics.report(DiagnosticKind::FetchFailed {
                        target,
                        message: error.to_string(),
                    });
                }
            },
            FetchKind::Data => {
                let outcome = match result {
                    Ok(Content::Data(value)) => Ok(value),
                    Ok(Content::Unit(_)) => {
                        self.diagnostics.report(DiagnosticKind::UnexpectedContent {
                            target: target.clone(),
                            expected: "data".to_string(),
                        });
                        Err(format!("'{}' delivered a unit instead of data", target))
                    }
                    Err(error) => {
                        self.diagnostics.report(DiagnosticKind::FetchFailed {
                            target: target.clone(),
                            message: error.to_string(),
                        });
                        Err(error.to_string())
                    }
                };
                self.dispatcher.store_data(&target, outcome.clone());
                for waiter in settled.waiters {
                    match waiter {
                        DataWaiter::Handler(ticket) => self.resume(ticket, outcome.clone()),
                        DataWaiter::Module(id) => self.deliver_data(id, &target, outcome.clone()),
                    }
                }
            }
        }
    }
}

fn declaration_label(name: Option<&ModuleName>) -> String {
    name.map(ModuleName::to_string)
        .unwrap_or_else(|| crate::core::naming::ANONYMOUS.to_string())
}

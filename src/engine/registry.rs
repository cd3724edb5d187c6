//! engine::registry
//!
//! The authoritative store of every module ever declared or referenced.
//!
//! # Invariants
//!
//! - Modules are append-only; a [`ModuleId`] stays valid forever
//! - A name maps to at most one module
//! - The reverse index lists each dependent at most once per name

use std::collections::{BTreeMap, HashMap};

use super::module::Module;
use crate::core::graph::DependencyGraph;
use crate::core::types::{ModuleId, ModuleName};

#[derive(Default)]
pub(crate) struct Registry {
    modules: Vec<Module>,
    by_name: HashMap<ModuleName, ModuleId>,
    dependents: BTreeMap<ModuleName, Vec<ModuleId>>,
    graph: DependencyGraph,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Id the next inserted module will get.
    pub(crate) fn next_id(&self) -> ModuleId {
        ModuleId(self.modules.len())
    }

    /// Store a module, indexing it by name if it has one.
    ///
    /// Regular modules also become graph nodes; custom-handled ones are
    /// lookup targets only.
    pub(crate) fn insert(&mut self, module: Module) -> ModuleId {
        let id = module.id;
        debug_assert_eq!(id, self.next_id());
        if !module.is_custom() {
            self.graph
                .add_module(module.name.as_ref(), &module.dependency_names());
        }
        if let Some(name) = &module.name {
            self.by_name.insert(name.clone(), id);
        }
        self.modules.push(module);
        id
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<ModuleId> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub(crate) fn get(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        self.modules.get_mut(id.0)
    }

    pub(crate) fn by_name(&self, name: &str) -> Option<&Module> {
        self.lookup(name).and_then(|id| self.get(id))
    }

    /// Record that `dependent` waits on `target`.
    pub(crate) fn add_dependent(&mut self, target: &ModuleName, dependent: ModuleId) {
        let waiting = self.dependents.entry(target.clone()).or_default();
        if !waiting.contains(&dependent) {
            waiting.push(dependent);
        }
    }

    /// Copy of the modules waiting on `target`.
    pub(crate) fn dependents_snapshot(&self, target: &str) -> Vec<ModuleId> {
        self.dependents.get(target).cloned().unwrap_or_default()
    }

    fn labels(&self, ids: &[ModuleId]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.get(*id))
            .map(Module::label)
            .collect()
    }

    /// Labels of the modules depending on `target`.
    pub(crate) fn dependents_of(&self, target: &str) -> Vec<String> {
        self.dependents
            .get(target)
            .map(|ids| self.labels(ids))
            .unwrap_or_default()
    }

    /// Every name with dependents, mapped to its dependents' labels.
    pub(crate) fn dependents(&self) -> BTreeMap<ModuleName, Vec<String>> {
        self.dependents
            .iter()
            .map(|(name, ids)| (name.clone(), self.labels(ids)))
            .collect()
    }

    /// Names that have dependents but no module.
    pub(crate) fn missing(&self) -> BTreeMap<ModuleName, Vec<String>> {
        self.dependents
            .iter()
            .filter(|(name, _)| !self.by_name.contains_key(name.as_str()))
            .map(|(name, ids)| (name.clone(), self.labels(ids)))
            .collect()
    }

    pub(crate) fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub(crate) fn len(&self) -> usize {
        self.modules.len()
    }
}

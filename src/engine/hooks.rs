//! engine::hooks
//!
//! Lifecycle listeners.
//!
//! Listeners are registered while the container is declaring and are
//! called synchronously, in registration order, for every named module.
//! Anonymous modules and custom-handled dependencies fire nothing.

use crate::core::types::ModuleName;
use crate::core::value::Value;

/// What a listener is told about a module.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleEvent {
    pub name: ModuleName,
    /// Canonical dependency names, in declaration order.
    pub dependencies: Vec<ModuleName>,
    /// The module's value (finalization events only).
    pub value: Option<Value>,
}

/// A lifecycle listener.
pub type Listener = Box<dyn FnMut(&ModuleEvent)>;

#[derive(Default)]
pub(crate) struct Hooks {
    declared: Vec<Listener>,
    finalized: Vec<Listener>,
}

impl Hooks {
    pub(crate) fn on_declared(&mut self, listener: Listener) {
        self.declared.push(listener);
    }

    pub(crate) fn on_finalized(&mut self, listener: Listener) {
        self.finalized.push(listener);
    }

    pub(crate) fn wants_declared(&self) -> bool {
        !self.declared.is_empty()
    }

    pub(crate) fn wants_finalized(&self) -> bool {
        !self.finalized.is_empty()
    }

    pub(crate) fn declared(&mut self, event: &ModuleEvent) {
        for listener in &mut self.declared {
            listener(event);
        }
    }

    pub(crate) fn finalized(&mut self, event: &ModuleEvent) {
        for listener in &mut self.finalized {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::naming::NameResolver;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn listeners_run_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = Hooks::default();
        assert!(!hooks.wants_declared());

        for tag in ["first", "second"] {
            let seen = Rc::clone(&seen);
            hooks.on_declared(Box::new(move |event: &ModuleEvent| {
                seen.borrow_mut().push(format!("{}:{}", tag, event.name));
            }));
        }
        assert!(hooks.wants_declared());
        assert!(!hooks.wants_finalized());

        let event = ModuleEvent {
            name: NameResolver::default().module_name("app").unwrap(),
            dependencies: Vec::new(),
            value: None,
        };
        hooks.declared(&event);
        hooks.finalized(&event);

        assert_eq!(*seen.borrow(), vec!["first:app", "second:app"]);
    }
}

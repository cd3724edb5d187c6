//! extensions::constant
//!
//! Immutable named constants.
//!
//! # Example
//!
//! ```
//! use wireloom::Container;
//! use wireloom::core::value::json;
//! use wireloom::extensions::ConstExtension;
//!
//! let constants = ConstExtension::new().define("RETRIES", json!(3))?;
//!
//! let mut container = Container::new();
//! container.register_extension("const", constants)?;
//! container.declare("client", &["const!RETRIES"], |_, args| Ok(Some(args[0].clone())))?;
//! container.start()?;
//!
//! assert_eq!(container.value("client"), Some(&json!(3)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeMap;

use crate::core::value::Value;
use crate::engine::extension::{
    Extension, ExtensionContext, ExtensionError, ExtensionOutcome, ExtensionRequest,
};

#[derive(Debug, Clone, Default)]
pub struct ConstExtension {
    values: BTreeMap<String, Value>,
}

impl ConstExtension {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define `key`. A key can only be defined once.
    pub fn define(mut self, key: impl Into<String>, value: Value) -> Result<Self, ExtensionError> {
        let key = key.into();
        if self.values.contains_key(&key) {
            return Err(ExtensionError::ConstantRedefined { key });
        }
        self.values.insert(key, value);
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl Extension for ConstExtension {
    fn handle(&mut self, request: ExtensionRequest, _: &mut ExtensionContext<'_>) -> ExtensionOutcome {
        match self.values.get(&request.name) {
            Some(value) => ExtensionOutcome::Resolved(value.clone()),
            None => ExtensionOutcome::Failed(format!("no constant named \"{}\"", request.name)),
        }
    }
}

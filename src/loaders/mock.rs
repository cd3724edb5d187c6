//! loaders::mock
//!
//! Scripted loader for deterministic tests.
//!
//! # Design
//!
//! Every request is recorded. Targets with a scripted answer complete
//! synchronously; all others answer `Pending` and are completed by the
//! test through `Container::complete_fetch`. Clones share state, so a test
//! can keep a handle after giving the loader to a container.
//!
//! # Example
//!
//! ```
//! use wireloom::Container;
//! use wireloom::core::value::json;
//! use wireloom::engine::{Content, Declaration};
//! use wireloom::loaders::MockLoader;
//!
//! let loader = MockLoader::new();
//! let mut container = Container::new();
//! container.set_loader(loader.clone());
//! container.declare("app", &["db"], |_, args| Ok(Some(args[0].clone())))?;
//! container.start()?;
//!
//! assert_eq!(loader.request_count("db"), 1);
//! container.complete_fetch(
//!     "db",
//!     Ok(Content::Unit(vec![Declaration::new("db", &[], |_, _| Ok(Some(json!(1))))])),
//! );
//! assert_eq!(container.value("app"), Some(&json!(1)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use crate::core::value::Value;
use crate::engine::fetch::{Content, FetchError, FetchRequest, FetchStatus, Loader};
use crate::engine::module::Declaration;

/// Mock loader for testing.
#[derive(Debug, Clone, Default)]
pub struct MockLoader {
    inner: Rc<RefCell<MockLoaderInner>>,
}

#[derive(Debug, Default)]
struct MockLoaderInner {
    /// Scripted answers by target, consumed on use.
    responses: HashMap<String, Result<Content, FetchError>>,
    /// Recorded requests, in order.
    requests: Vec<FetchRequest>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RefMut<'_, MockLoaderInner> {
        self.inner.borrow_mut()
    }

    /// Answer `target` with a unit of declarations.
    pub fn respond_unit(&self, target: impl Into<String>, declarations: Vec<Declaration>) {
        self.lock()
            .responses
            .insert(target.into(), Ok(Content::Unit(declarations)));
    }

    /// Answer `target` with data.
    pub fn respond_data(&self, target: impl Into<String>, value: Value) {
        self.lock()
            .responses
            .insert(target.into(), Ok(Content::Data(value)));
    }

    /// Fail `target` with `error`.
    pub fn fail(&self, target: impl Into<String>, error: FetchError) {
        self.lock().responses.insert(target.into(), Err(error));
    }

    /// All recorded requests.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.lock().requests.clone()
    }

    /// How many times `target` was requested.
    pub fn request_count(&self, target: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.target == target)
            .count()
    }
}

impl Loader for MockLoader {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn fetch(&mut self, request: &FetchRequest) -> FetchStatus {
        let mut inner = self.lock();
        inner.requests.push(request.clone());
        match inner.responses.remove(&request.target) {
            Some(result) => FetchStatus::Ready(result),
            None => FetchStatus::Pending,
        }
    }
}

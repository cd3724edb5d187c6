//! loaders::catalog
//!
//! An in-memory loader.
//!
//! Units are handed out once: a unit's declarations are moved into the
//! container on the first fetch. Data entries stay available.

use std::collections::HashMap;

use crate::core::value::Value;
use crate::engine::fetch::{Content, FetchError, FetchKind, FetchRequest, FetchStatus, Loader};
use crate::engine::module::Declaration;

#[derive(Debug, Default)]
pub struct CatalogLoader {
    units: HashMap<String, Vec<Declaration>>,
    data: HashMap<String, Value>,
}

impl CatalogLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `declarations` for `target`.
    pub fn with_unit(mut self, target: impl Into<String>, declarations: Vec<Declaration>) -> Self {
        self.units.insert(target.into(), declarations);
        self
    }

    /// Serve `value` for data requests on `target`.
    pub fn with_data(mut self, target: impl Into<String>, value: Value) -> Self {
        self.data.insert(target.into(), value);
        self
    }

    /// Whether `target` still has something to deliver.
    pub fn has(&self, target: &str) -> bool {
        self.units.contains_key(target) || self.data.contains_key(target)
    }
}

impl Loader for CatalogLoader {
    fn name(&self) -> &'static str {
        "catalog"
    }

    fn fetch(&mut self, request: &FetchRequest) -> FetchStatus {
        let found = match request.kind {
            FetchKind::Unit => self.units.remove(&request.target).map(Content::Unit),
            FetchKind::Data => self.data.get(&request.target).cloned().map(Content::Data),
        };
        tracing::trace!(fetch_target = %request.target, found = found.is_some(), "catalog lookup");
        FetchStatus::Ready(found.ok_or_else(|| FetchError::NotFound {
            target: request.target.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::json;

    fn request(target: &str, kind: FetchKind) -> FetchRequest {
        FetchRequest {
            target: target.to_string(),
            kind,
            module: None,
        }
    }

    #[test]
    fn units_are_delivered_once() {
        let mut catalog = CatalogLoader::new()
            .with_unit("a.js", vec![Declaration::new("a", &[], |_, _| Ok(None))]);
        assert!(catalog.has("a.js"));

        match catalog.fetch(&request("a.js", FetchKind::Unit)) {
            FetchStatus::Ready(Ok(Content::Unit(declarations))) => {
                assert_eq!(declarations.len(), 1);
                assert_eq!(declarations[0].name(), Some("a"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!catalog.has("a.js"));
        assert!(matches!(
            catalog.fetch(&request("a.js", FetchKind::Unit)),
            FetchStatus::Ready(Err(FetchError::NotFound { .. }))
        ));
    }

    #[test]
    fn data_is_served_by_kind() {
        let mut catalog = CatalogLoader::new().with_data("greeting.txt", json!("hi"));

        assert!(matches!(
            catalog.fetch(&request("greeting.txt", FetchKind::Data)),
            FetchStatus::Ready(Ok(Content::Data(v))) if v == json!("hi")
        ));
        // data entries are not units
        assert!(matches!(
            catalog.fetch(&request("greeting.txt", FetchKind::Unit)),
            FetchStatus::Ready(Err(FetchError::NotFound { .. }))
        ));
    }
}

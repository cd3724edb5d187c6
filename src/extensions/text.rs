//! extensions::text
//!
//! Text resources.
//!
//! A name with an inline entry resolves immediately. Anything else is
//! requested as data through the container's loader; concurrent requests
//! for the same name share one fetch. When another handler ran first, its
//! value is used as-is.

use std::collections::HashMap;

use crate::core::value::Value;
use crate::engine::extension::{Extension, ExtensionContext, ExtensionOutcome, ExtensionRequest};

#[derive(Debug, Clone, Default)]
pub struct TextExtension {
    inline: HashMap<String, String>,
}

impl TextExtension {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `text` for `name` without fetching.
    pub fn inline(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.inline.insert(name.into(), text.into());
        self
    }
}

impl Extension for TextExtension {
    fn handle(
        &mut self,
        request: ExtensionRequest,
        context: &mut ExtensionContext<'_>,
    ) -> ExtensionOutcome {
        if let Some(previous) = request.previous {
            return ExtensionOutcome::Resolved(previous);
        }
        if let Some(text) = self.inline.get(&request.name) {
            return ExtensionOutcome::Resolved(Value::String(text.clone()));
        }
        context.fetch_data(&request.name, request.ticket)
    }
}

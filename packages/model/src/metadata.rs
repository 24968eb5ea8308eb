//! Presentation-level name/content metadata entries.

use crate::error::{ModelError, ModelResult};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    name: String,
    content: String,
}

impl Metadata {
    /// Create an entry. The name must not be empty.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> ModelResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ModelError::MissingArgument("metadata name"));
        }
        Ok(Self {
            name,
            content: content.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub(crate) fn set_content(&mut self, content: String) -> String {
        std::mem::replace(&mut self.content, content)
    }
}

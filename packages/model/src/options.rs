use crate::data_provider::DEFAULT_DATA_DIRECTORY;
use serde::{Deserialize, Serialize};

/// XUK writer and project options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct XukOptions {
    /// Indent nested elements
    pub pretty: bool,

    /// Spaces per nesting level when pretty printing
    pub indent: usize,

    /// Emit the (always empty) undo/redo manager element
    pub write_undo_redo_manager: bool,

    /// Data directory for presentations created by the project
    pub data_directory: String,
}

impl Default for XukOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            indent: 2,
            write_undo_redo_manager: true,
            data_directory: DEFAULT_DATA_DIRECTORY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_options_use_defaults() {
        let options: XukOptions = serde_json::from_str(r#"{ "indent": 4 }"#).unwrap();
        assert_eq!(options.indent, 4);
        assert!(options.pretty);
        assert_eq!(options.data_directory, "Data");
    }

    #[test]
    fn test_options_serialize_camel_case() {
        let json = serde_json::to_string(&XukOptions::default()).unwrap();
        assert!(json.contains("\"writeUndoRedoManager\":true"));
        assert!(json.contains("\"dataDirectory\":\"Data\""));
    }
}

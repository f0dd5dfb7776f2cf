//! Plugin protocol messages.
//!
//! A plugin is an executable invoked as `<entry> <op> <export> [path...]`.
//! `describe` prints a [`PluginManifest`] as JSON on stdout, `invoke` reads an
//! [`InvokeRequest`] from stdin and runs with inherited stdio, `update`
//! refreshes whatever the plugin caches.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::OptionSpec;

/// Protocol revision understood by this host.
pub const PROTOCOL_VERSION: u32 = 1;

/// Exit code a plugin returns when it does not export the requested name.
pub const EXIT_UNKNOWN_EXPORT: i32 = 3;

/// Exit code a plugin returns for an operation it does not implement.
pub const EXIT_UNSUPPORTED: i32 = 4;

/// Operations the host can request from a plugin executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginOp {
    Describe,
    Invoke,
    Update,
}

impl PluginOp {
    /// The argv spelling of the operation.
    pub fn as_arg(&self) -> &'static str {
        match self {
            PluginOp::Describe => "describe",
            PluginOp::Invoke => "invoke",
            PluginOp::Update => "update",
        }
    }
}

/// What a plugin contributes when loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(default = "default_protocol")]
    pub protocol: u32,

    /// The export that produced this manifest.
    #[serde(default)]
    pub export: String,

    /// Subtrees to graft onto the host's command tree.
    #[serde(default)]
    pub commands: Vec<CommandSpec>,

    /// Additional plugin types registered through the host's registry.
    #[serde(default)]
    pub loader_types: Vec<LoaderTypeSpec>,
}

fn default_protocol() -> u32 {
    PROTOCOL_VERSION
}

/// A command subtree declared by a plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Path below the host root under which this subtree is attached.
    /// Empty means directly under the root.
    #[serde(default)]
    pub parent: Vec<String>,

    #[serde(default)]
    pub options: Vec<OptionSpec>,

    #[serde(default)]
    pub children: Vec<CommandSpec>,

    /// Whether the host should route invocations of this leaf to the plugin.
    #[serde(default)]
    pub runnable: bool,
}

/// A plugin type contributed by a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderTypeSpec {
    pub name: String,

    /// Entry executable, relative to the contributing plugin's directory.
    pub entry: String,
}

/// Payload written to the plugin's stdin for `invoke`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub export: String,

    /// Command path below the host root, e.g. `["dataset", "convert"]`.
    pub path: Vec<String>,

    /// Parsed option values keyed by option id.
    #[serde(default)]
    pub values: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_defaults_fill_missing_fields() {
        let manifest: PluginManifest =
            serde_json::from_str(r#"{"commands":[{"name":"hello"}]}"#).unwrap();
        assert_eq!(manifest.protocol, PROTOCOL_VERSION);
        assert!(manifest.loader_types.is_empty());
        let cmd = &manifest.commands[0];
        assert_eq!(cmd.name, "hello");
        assert!(cmd.parent.is_empty());
        assert!(!cmd.runnable);
    }

    #[test]
    fn nested_command_spec_parses() {
        let manifest: PluginManifest = serde_json::from_str(
            r#"{
                "export": "Kaggle",
                "commands": [{
                    "name": "kaggle",
                    "description": "kaggle helpers",
                    "parent": ["dataset"],
                    "children": [{
                        "name": "fetch",
                        "runnable": true,
                        "options": [{"names": ["--competition"], "kwargs": {"required": true}}]
                    }]
                }]
            }"#,
        )
        .unwrap();
        let kaggle = &manifest.commands[0];
        assert_eq!(kaggle.parent, vec!["dataset"]);
        let fetch = &kaggle.children[0];
        assert!(fetch.runnable);
        assert_eq!(fetch.options[0].names, vec!["--competition"]);
    }

    #[test]
    fn op_spellings() {
        assert_eq!(PluginOp::Describe.as_arg(), "describe");
        assert_eq!(PluginOp::Invoke.as_arg(), "invoke");
        assert_eq!(PluginOp::Update.as_arg(), "update");
    }
}

//! Option declarations attached to command nodes.
//!
//! An option is an opaque bag of positional names and keyword settings. The
//! command tree stores it verbatim; only the grammar builder reads the keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single option declaration, e.g. `["--input", "-i"]` plus `{help: "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    /// Flag spellings (`--input`, `-i`) or a single positional name.
    pub names: Vec<String>,

    /// Keyword settings forwarded to the argument grammar.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub kwargs: Map<String, Value>,
}

impl OptionSpec {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            kwargs: Map::new(),
        }
    }

    /// Set an arbitrary keyword.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    pub fn help(self, text: impl Into<String>) -> Self {
        self.kwarg("help", text.into())
    }

    pub fn required(self, required: bool) -> Self {
        self.kwarg("required", required)
    }

    pub fn default_value(self, value: impl Into<Value>) -> Self {
        self.kwarg("default", value)
    }

    /// `"?"`, `"*"`, `"+"` or an exact count.
    pub fn nargs(self, nargs: impl Into<Value>) -> Self {
        self.kwarg("nargs", nargs)
    }

    /// `store`, `store_true`, `count` or `append`.
    pub fn action(self, action: impl Into<String>) -> Self {
        self.kwarg("action", action.into())
    }

    pub fn choices<I, S>(self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<Value> = choices
            .into_iter()
            .map(|c| Value::String(c.into()))
            .collect();
        self.kwarg("choices", values)
    }

    /// True when every name is a flag spelling.
    pub fn is_flag(&self) -> bool {
        !self.names.is_empty() && self.names.iter().all(|n| n.starts_with('-'))
    }
}

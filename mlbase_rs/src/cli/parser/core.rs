//! Grammar compilation: walks a command tree once and produces the parseable
//! argument grammar together with its dispatch records.

use std::collections::HashMap;
use std::fmt;

use clap::Command;
use thiserror::Error;
use tracing::debug;

use super::helpers::{ArgBinding, UsedNames, to_arg};
use crate::cli::command::{CommandNode, Handler, TreeError};

/// Errors raised while compiling a tree into a grammar.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid option {option} on `{command}`: {reason}")]
    InvalidOption {
        command: String,
        option: String,
        reason: String,
    },

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// What dispatch needs to know about one compiled node.
#[derive(Clone)]
pub struct DispatchRecord {
    /// Node names from the root down to this node, root included.
    pub path: Vec<String>,

    /// Present only on leaves that do real work.
    pub handler: Option<Handler>,

    pub(crate) bindings: Vec<ArgBinding>,
}

impl fmt::Debug for DispatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchRecord")
            .field("path", &self.path)
            .field("handler", &self.handler.is_some())
            .field("bindings", &self.bindings)
            .finish()
    }
}

/// A compiled command tree, ready to parse argv any number of times.
pub struct Grammar {
    pub(crate) meta_key: String,
    pub(crate) command: Command,
    pub(crate) records: HashMap<Vec<String>, DispatchRecord>,
}

impl Grammar {
    /// The key under which every dispatch record of this grammar is stored.
    pub fn meta_key(&self) -> &str {
        &self.meta_key
    }

    /// The dispatch record for a path (root name included).
    pub fn record<S: AsRef<str>>(&self, path: &[S]) -> Option<&DispatchRecord> {
        let key: Vec<String> = path.iter().map(|s| s.as_ref().to_string()).collect();
        self.records.get(&key)
    }

    /// Expose `--version` / `-V` on the root command.
    pub fn with_version(mut self, version: &'static str) -> Self {
        self.command = self.command.version(version);
        self
    }

    /// Full help text of the root command.
    pub fn render_help(&self) -> String {
        self.command.clone().render_help().to_string()
    }
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("meta_key", &self.meta_key)
            .field("root", &self.command.get_name())
            .field("records", &self.records.len())
            .finish()
    }
}

/// Compile the tree below `root` into a [`Grammar`].
///
/// A node with children becomes a branching command and its own handler, if
/// any, is unreachable. A childless node becomes a leaf accepting exactly its
/// declared options.
pub fn build(root: &CommandNode) -> Result<Grammar, BuildError> {
    let meta_key = root.meta_key();
    let mut records = HashMap::new();
    let mut path = Vec::new();
    let command = compile(root, &meta_key, &mut path, &mut records)?;

    debug!(
        root = %root.name(),
        meta_key = %meta_key,
        records = records.len(),
        "grammar built"
    );

    Ok(Grammar {
        meta_key,
        command,
        records,
    })
}

fn compile(
    node: &CommandNode,
    meta_key: &str,
    path: &mut Vec<String>,
    records: &mut HashMap<Vec<String>, DispatchRecord>,
) -> Result<Command, BuildError> {
    let name = node.name();
    let found = node.meta_key();
    if found != meta_key {
        return Err(TreeError::MetaKeyMismatch {
            parent: path.last().cloned().unwrap_or_default(),
            child: name,
            expected: meta_key.to_string(),
            found,
        }
        .into());
    }

    path.push(name.clone());
    let mut command = Command::new(name)
        .about(node.description())
        .disable_help_subcommand(true);

    let mut bindings = Vec::new();
    let mut used = UsedNames::for_command(path.len() == 1);
    for spec in node.options() {
        let (arg, binding) = to_arg(&spec)
            .and_then(|(arg, binding)| {
                used.claim(&spec, &arg, &binding)?;
                Ok((arg, binding))
            })
            .map_err(|reason| BuildError::InvalidOption {
                command: path.join(" "),
                option: spec.names.join("/"),
                reason,
            })?;
        command = command.arg(arg);
        bindings.push(binding);
    }

    let children = node.children();
    let handler = if children.is_empty() {
        node.handler()
    } else {
        if node.has_handler() {
            debug!(command = %path.join(" "), "handler on a branch is unreachable");
        }
        None
    };

    for child in &children {
        command = command.subcommand(compile(child, meta_key, path, records)?);
    }

    records.insert(
        path.clone(),
        DispatchRecord {
            path: path.clone(),
            handler,
            bindings,
        },
    );
    path.pop();
    Ok(command)
}

// ============================================================================
// Tests
// ============================================================================

//! Dispatcher for compiled grammars.
//!
//! Parses argv against a [`Grammar`], reads back the single dispatch record
//! selected by the parse and either runs its handler or prints the help of
//! the branch that was reached.

pub mod handlers;

use std::ffi::OsString;

use clap::ArgMatches;
use clap::error::ErrorKind;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::cli::parser::{ArgBinding, ArgKind, Grammar};

/// What a handler reports back: an exit code plus non-fatal warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub code: i32,
    pub warnings: Vec<String>,
}

impl Report {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_code(code: i32) -> Self {
        Self {
            code,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn extend_warnings<I: IntoIterator<Item = String>>(&mut self, warnings: I) {
        self.warnings.extend(warnings);
    }
}

/// Result of a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A handler ran.
    Completed(Report),
    /// Help or version text was printed instead of running anything.
    HelpShown,
}

impl Outcome {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Completed(report) => report.code,
            Outcome::HelpShown => 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// argv did not match the grammar.
    #[error(transparent)]
    Usage(#[from] clap::Error),

    #[error("no dispatch record for `{}`", .0.join(" "))]
    UnknownPath(Vec<String>),

    #[error("`{command}` failed: {error:#}")]
    Handler {
        command: String,
        error: anyhow::Error,
    },
}

/// Dispatch metadata recorded for the node a parse resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchMeta {
    /// The grammar's meta key.
    pub key: String,
    /// Node names from the root to the selected node, both included.
    pub path: Vec<String>,
    /// Whether the selected node carries a handler.
    pub has_handler: bool,
}

impl DispatchMeta {
    /// Ancestor names of the selected node, starting at the root.
    pub fn parents(&self) -> &[String] {
        let end = self.path.len().saturating_sub(1);
        &self.path[..end]
    }

    /// Name of the selected node.
    pub fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    /// Path below the root, as a plugin sees it.
    pub fn command_path(&self) -> &[String] {
        self.path.get(1..).unwrap_or_default()
    }
}

struct Level {
    matches: ArgMatches,
    bindings: Vec<ArgBinding>,
}

/// Parsed invocation context handed to a handler.
///
/// Value lookups search from the selected node back up to the root, so options
/// declared on a branch are visible to every leaf below it.
pub struct Invocation {
    meta: DispatchMeta,
    levels: Vec<Level>,
}

impl Invocation {
    /// The dispatch record metadata: ancestor path and resolved handler.
    pub fn meta(&self) -> &DispatchMeta {
        &self.meta
    }

    /// First value of a single- or multi-valued option.
    pub fn value(&self, id: &str) -> Option<String> {
        self.values(id).into_iter().next()
    }

    /// All values of an option; empty when absent.
    pub fn values(&self, id: &str) -> Vec<String> {
        for (level, binding) in self.bindings_for(id) {
            let found: Vec<String> = match binding.kind {
                ArgKind::Single | ArgKind::Many => level
                    .matches
                    .try_get_many::<String>(id)
                    .ok()
                    .flatten()
                    .map(|vals| vals.cloned().collect())
                    .unwrap_or_default(),
                ArgKind::Flag | ArgKind::Count => continue,
            };
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    /// Whether a `store_true` switch was given.
    pub fn flag(&self, id: &str) -> bool {
        self.bindings_for(id).any(|(level, binding)| {
            binding.kind == ArgKind::Flag
                && level
                    .matches
                    .try_get_one::<bool>(id)
                    .ok()
                    .flatten()
                    .copied()
                    .unwrap_or(false)
        })
    }

    /// Occurrences of a `count` option.
    pub fn count(&self, id: &str) -> u8 {
        self.bindings_for(id)
            .filter(|(_, binding)| binding.kind == ArgKind::Count)
            .filter_map(|(level, _)| level.matches.try_get_one::<u8>(id).ok().flatten())
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Every declared option along the selected path, as JSON.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for level in &self.levels {
            for binding in &level.bindings {
                let id = binding.id.as_str();
                let value = match binding.kind {
                    ArgKind::Single => match level.matches.try_get_one::<String>(id) {
                        Ok(Some(v)) => Value::String(v.clone()),
                        _ => Value::Null,
                    },
                    ArgKind::Many => match level.matches.try_get_many::<String>(id) {
                        Ok(Some(vals)) => {
                            Value::Array(vals.map(|v| Value::String(v.clone())).collect())
                        }
                        _ => Value::Array(Vec::new()),
                    },
                    ArgKind::Flag => Value::Bool(self.flag(id)),
                    ArgKind::Count => Value::from(self.count(id)),
                };
                out.insert(binding.id.clone(), value);
            }
        }
        out
    }

    fn bindings_for<'a>(&'a self, id: &'a str) -> impl Iterator<Item = (&'a Level, &'a ArgBinding)> {
        self.levels.iter().rev().flat_map(move |level| {
            level
                .bindings
                .iter()
                .filter(move |b| b.id == id)
                .map(move |b| (level, b))
        })
    }
}

impl Grammar {
    /// Parse `argv` (program name excluded) and run the selected handler.
    ///
    /// Reaching a branch without a leaf prints that branch's help and yields
    /// [`Outcome::HelpShown`]; so do `--help` and `--version`. Each call is
    /// independent of earlier ones.
    pub fn dispatch<I, S>(&self, argv: I) -> Result<Outcome, DispatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let root_name = self.command.get_name().to_string();
        let args = std::iter::once(OsString::from(&root_name))
            .chain(argv.into_iter().map(Into::into));

        let matches = match self.command.clone().try_get_matches_from(args) {
            Ok(matches) => matches,
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::DisplayHelp
                        | ErrorKind::DisplayVersion
                        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) =>
            {
                // Printing help can only fail on a closed stdout.
                let _ = err.print();
                return Ok(Outcome::HelpShown);
            }
            Err(err) => return Err(DispatchError::Usage(err)),
        };

        let mut path = vec![root_name];
        let mut chain = Vec::new();
        let mut current = matches;
        loop {
            let next = current
                .subcommand()
                .map(|(name, sub)| (name.to_string(), sub.clone()));
            chain.push(current);
            match next {
                Some((name, sub)) => {
                    path.push(name);
                    current = sub;
                }
                None => break,
            }
        }

        let mut levels = Vec::with_capacity(chain.len());
        for (depth, matches) in chain.into_iter().enumerate() {
            let record = self
                .records
                .get(&path[..=depth])
                .ok_or_else(|| DispatchError::UnknownPath(path[..=depth].to_vec()))?;
            levels.push(Level {
                matches,
                bindings: record.bindings.clone(),
            });
        }

        let record = self
            .records
            .get(&path)
            .ok_or_else(|| DispatchError::UnknownPath(path.clone()))?;

        let invocation = Invocation {
            meta: DispatchMeta {
                key: self.meta_key.clone(),
                path: path.clone(),
                has_handler: record.handler.is_some(),
            },
            levels,
        };

        match &record.handler {
            Some(handler) => {
                debug!(command = %path.join(" "), "dispatching");
                handler(&invocation)
                    .map(Outcome::Completed)
                    .map_err(|error| DispatchError::Handler {
                        command: path.join(" "),
                        error,
                    })
            }
            None => {
                debug!(command = %path.join(" "), "no leaf reached; showing help");
                print!("{}", self.help_for(&path));
                Ok(Outcome::HelpShown)
            }
        }
    }

    /// Help text of the command at `path` (root name included).
    pub fn help_for(&self, path: &[String]) -> String {
        let mut command = self.command.clone();
        for name in path.iter().skip(1) {
            match command.find_subcommand(name) {
                Some(sub) => command = sub.clone(),
                None => break,
            }
        }
        command.bin_name(path.join(" ")).render_help().to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Plugin system: a name-keyed table of loader factories and the loaders
//! that graft plugin-provided commands onto the live command tree.
//!
//! ```text
//! descriptors ──► PluginTypeRegistry::instantiate ──► Box<dyn PluginLoader>
//!                        ▲                                   │ load()
//!                        │ register (RegistryWriter)         ▼
//!                        └──────────────────────────── plugin on_load(root)
//! ```
//!
//! Loading is strictly sequential: a plugin loaded by descriptor `n` may
//! register a type that descriptor `n + 1` uses.

mod cache;
mod descriptor;
mod external;
mod local;
mod registry;

pub use cache::{CacheLoader, cache_dir_for};
pub use descriptor::{PluginDescriptor, parse_descriptors, read_descriptors};
pub use external::ProcessPlugin;
pub use local::{LocalLoader, resolve_entry};
pub use registry::{LoaderFactory, PluginTypeRegistry, RegistryWriter};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cli::command::{CommandNode, TreeError};
use crate::git::GitError;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin type '{0}' is already registered")]
    DuplicateType(String),

    #[error("unknown plugin type '{name}'{}", did_you_mean(.suggestion))]
    UnknownType {
        name: String,
        suggestion: Option<String>,
    },

    #[error("invalid '{loader}' plugin configuration: {message}")]
    Config { loader: String, message: String },

    #[error("plugin descriptor #{index} (type '{kind}'): {error}")]
    Descriptor {
        index: usize,
        kind: String,
        error: Box<PluginError>,
    },

    #[error("cannot read plugin document {path}: {message}")]
    Document { path: String, message: String },

    #[error("plugin {plugin}: {message}")]
    Protocol { plugin: String, message: String },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{}'?)", s),
        None => String::new(),
    }
}

impl PluginError {
    pub(crate) fn config(loader: &str, message: impl Into<String>) -> Self {
        PluginError::Config {
            loader: loader.to_string(),
            message: message.into(),
        }
    }
}

/// The capability contract of a loaded plugin instance.
pub trait Plugin {
    /// Called once after the plugin is instantiated. May register new plugin
    /// types and attach commands anywhere below `root`.
    fn on_load(&mut self, registry: &mut RegistryWriter<'_>, root: &CommandNode)
    -> Result<(), PluginError>;

    /// Refresh whatever the plugin caches. Returns non-fatal warnings.
    fn update(&mut self) -> Result<Vec<String>, PluginError> {
        Ok(Vec::new())
    }
}

/// Whether a loader produced a live plugin instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded,
    /// The plugin code could not be resolved; nothing was changed.
    Skipped,
}

/// A strategy that can install a plugin into the tree and refresh its source.
pub trait PluginLoader {
    fn load(
        &mut self,
        registry: &mut RegistryWriter<'_>,
        root: &CommandNode,
    ) -> Result<LoadStatus, PluginError>;

    /// Refresh the plugin source. Returns non-fatal warnings.
    fn update(&mut self) -> Result<Vec<String>, PluginError>;

    /// One-line description for listings and logs.
    fn describe(&self) -> String;
}

/// A loader that produced a live plugin, with the descriptor it came from.
pub struct LiveLoader {
    pub index: usize,
    pub kind: String,
    pub loader: Box<dyn PluginLoader>,
}

impl std::fmt::Debug for LiveLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveLoader")
            .field("index", &self.index)
            .field("kind", &self.kind)
            .field("loader", &self.loader.describe())
            .finish()
    }
}

fn in_descriptor(index: usize, kind: &str) -> impl FnOnce(PluginError) -> PluginError + '_ {
    move |error| PluginError::Descriptor {
        index,
        kind: kind.to_string(),
        error: Box::new(error),
    }
}

/// Instantiate and load every descriptor in order.
///
/// The first failing descriptor aborts the sequence and is named in the
/// error. Loaders that skip are dropped; the rest are returned for later
/// lifecycle calls.
pub fn load_descriptors(
    registry: &mut PluginTypeRegistry,
    root: &CommandNode,
    descriptors: &[PluginDescriptor],
) -> Result<Vec<LiveLoader>, PluginError> {
    let mut live = Vec::new();
    for (index, descriptor) in descriptors.iter().enumerate() {
        let kind = descriptor.kind.as_str();
        let mut loader = registry
            .instantiate(kind, &descriptor.args, &descriptor.kwargs)
            .map_err(in_descriptor(index, kind))?;
        let status = loader
            .load(&mut registry.writer(), root)
            .map_err(in_descriptor(index, kind))?;
        match status {
            LoadStatus::Loaded => {
                info!(index, kind, loader = %loader.describe(), "plugin loaded");
                live.push(LiveLoader {
                    index,
                    kind: kind.to_string(),
                    loader,
                });
            }
            LoadStatus::Skipped => {
                debug!(index, kind, loader = %loader.describe(), "plugin skipped");
            }
        }
    }
    Ok(live)
}

/// Instantiate every descriptor's loader and refresh it, whether or not it
/// loaded last time. Returns the collected warnings.
///
/// An unknown type is only a warning here: it may be contributed by a plugin
/// whose source this very update is about to fetch.
pub fn update_loaders(
    registry: &PluginTypeRegistry,
    descriptors: &[PluginDescriptor],
) -> Result<Vec<String>, PluginError> {
    let mut warnings = Vec::new();
    for (index, descriptor) in descriptors.iter().enumerate() {
        let kind = descriptor.kind.as_str();
        let mut loader = match registry.instantiate(kind, &descriptor.args, &descriptor.kwargs) {
            Ok(loader) => loader,
            Err(err @ PluginError::UnknownType { .. }) => {
                warn!(index, kind, "not updating plugin of unknown type");
                warnings.push(format!("plugin #{} ({}): {}; not updated", index, kind, err));
                continue;
            }
            Err(err) => return Err(in_descriptor(index, kind)(err)),
        };
        info!(index, kind, loader = %loader.describe(), "updating plugin");
        let found = loader.update().map_err(in_descriptor(index, kind))?;
        warnings.extend(
            found
                .into_iter()
                .map(|w| format!("plugin #{} ({}): {}", index, kind, w)),
        );
    }
    Ok(warnings)
}

//! Loader for plugins that already sit on the local filesystem.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::warn;

use super::descriptor::required_string_arg;
use super::external::{ProcessPlugin, request_update};
use super::{LoadStatus, Plugin, PluginError, PluginLoader, RegistryWriter};
use crate::cli::command::CommandNode;

#[cfg(windows)]
const ENTRY_NAME: &str = "plugin.exe";
#[cfg(not(windows))]
const ENTRY_NAME: &str = "plugin";

/// The executable for a plugin at `path`: the file itself, or `plugin` inside
/// a directory. `None` when neither is an executable file.
pub fn resolve_entry(path: &Path) -> Option<PathBuf> {
    let candidate = if path.is_dir() {
        path.join(ENTRY_NAME)
    } else {
        path.to_path_buf()
    };
    (candidate.is_file() && is_executable(&candidate)).then_some(candidate)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

/// Loads the export `export` of the plugin at `path`.
#[derive(Debug)]
pub struct LocalLoader {
    path: PathBuf,
    export: String,
    plugin: Option<ProcessPlugin>,
}

impl LocalLoader {
    pub fn new(path: PathBuf, export: String) -> Self {
        Self {
            path,
            export,
            plugin: None,
        }
    }

    /// `args = [path, exportedName]` or `kwargs = {path, exported_name}`.
    pub fn from_descriptor(args: &[Value], kwargs: &Map<String, Value>) -> Result<Self, PluginError> {
        let path = required_string_arg("local", args, kwargs, 0, "path")?;
        let export = required_string_arg("local", args, kwargs, 1, "exported_name")?;
        Ok(Self::new(crate::config::expand_path(Path::new(&path)), export))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn export(&self) -> &str {
        &self.export
    }
}

impl PluginLoader for LocalLoader {
    fn load(
        &mut self,
        registry: &mut RegistryWriter<'_>,
        root: &CommandNode,
    ) -> Result<LoadStatus, PluginError> {
        let Some(entry) = resolve_entry(&self.path) else {
            warn!(path = %self.path.display(), "plugin not found; skipping");
            return Ok(LoadStatus::Skipped);
        };
        let Some(mut plugin) = ProcessPlugin::describe(&entry, &self.export)? else {
            return Ok(LoadStatus::Skipped);
        };
        plugin.on_load(registry, root)?;
        self.plugin = Some(plugin);
        Ok(LoadStatus::Loaded)
    }

    fn update(&mut self) -> Result<Vec<String>, PluginError> {
        if let Some(plugin) = self.plugin.as_mut() {
            return plugin.update();
        }
        match resolve_entry(&self.path) {
            Some(entry) => request_update(&entry, &self.export),
            None => Ok(Vec::new()),
        }
    }

    fn describe(&self) -> String {
        format!("local {} ({})", self.path.display(), self.export)
    }
}

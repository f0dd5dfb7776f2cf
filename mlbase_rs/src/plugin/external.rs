//! Plugins that live in a separate executable.
//!
//! The host talks to the executable with `describe`, `invoke` and `update`
//! requests (see `mlbase_common::PluginOp`). The manifest returned by
//! `describe` is turned into command nodes and plugin types here.

use std::path::{Path, PathBuf};

use mlbase_common::{
    CommandSpec, EXIT_UNKNOWN_EXPORT, EXIT_UNSUPPORTED, InvokeRequest, LoaderTypeSpec,
    PROTOCOL_VERSION, PluginManifest, PluginOp,
};
use tracing::{debug, warn};

use super::descriptor::required_string_arg;
use super::{LocalLoader, Plugin, PluginError, PluginLoader, RegistryWriter};
use crate::cli::command::CommandNode;
use crate::cli::dispatch::Report;
use crate::process;

/// A plugin executable that answered `describe` for one export.
#[derive(Debug, Clone)]
pub struct ProcessPlugin {
    entry: PathBuf,
    export: String,
    manifest: PluginManifest,
}

fn op_args(op: PluginOp, export: &str, path: &[String]) -> Vec<String> {
    let mut args = vec![op.as_arg().to_string(), export.to_string()];
    args.extend(path.iter().cloned());
    args
}

impl ProcessPlugin {
    /// Ask `entry` to describe `export`.
    ///
    /// `Ok(None)` means the export could not be resolved: the program is
    /// missing, fails, prints something other than a manifest, or reports
    /// an unknown export.
    pub fn describe(entry: &Path, export: &str) -> Result<Option<Self>, PluginError> {
        let captured = match process::capture(entry, &op_args(PluginOp::Describe, export, &[]), None)
        {
            Ok(captured) => captured,
            Err(e) => {
                warn!(entry = %entry.display(), "cannot run plugin: {}", e);
                return Ok(None);
            }
        };

        if captured.status.code == Some(EXIT_UNKNOWN_EXPORT) {
            warn!(entry = %entry.display(), export, "plugin does not export this name");
            return Ok(None);
        }
        if let Some(warning) = captured.status.warning() {
            warn!(entry = %entry.display(), export, "{}", warning);
            return Ok(None);
        }

        let mut manifest: PluginManifest = match serde_json::from_slice(&captured.stdout) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(entry = %entry.display(), export, "malformed plugin manifest: {}", e);
                return Ok(None);
            }
        };
        if manifest.protocol > PROTOCOL_VERSION {
            return Err(PluginError::Protocol {
                plugin: entry.display().to_string(),
                message: format!(
                    "speaks protocol {}, this host understands up to {}",
                    manifest.protocol, PROTOCOL_VERSION
                ),
            });
        }
        if manifest.export.is_empty() {
            manifest.export = export.to_string();
        }

        debug!(
            entry = %entry.display(),
            export,
            commands = manifest.commands.len(),
            loader_types = manifest.loader_types.len(),
            "plugin described"
        );
        Ok(Some(Self {
            entry: entry.to_path_buf(),
            export: export.to_string(),
            manifest,
        }))
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn plugin_name(&self) -> String {
        format!("{}:{}", self.entry.display(), self.export)
    }

    fn register_type(
        &self,
        registry: &mut RegistryWriter<'_>,
        spec: &LoaderTypeSpec,
    ) -> Result<(), PluginError> {
        let base = self.entry.parent().unwrap_or_else(|| Path::new("."));
        let entry = base.join(&spec.entry);
        let type_name = spec.name.clone();
        registry.register(&spec.name, move |args, kwargs| {
            let export = required_string_arg(&type_name, args, kwargs, 0, "exported_name")?;
            Ok(Box::new(LocalLoader::new(entry.clone(), export)) as Box<dyn PluginLoader>)
        })
    }

    fn graft(&self, parent: &CommandNode, spec: &CommandSpec) -> Result<(), PluginError> {
        let node = parent.attach_child(CommandNode::new(&spec.name, &spec.description))?;
        for option in &spec.options {
            node.declare_option(option.clone());
        }
        for child in &spec.children {
            self.graft(&node, child)?;
        }
        if spec.runnable {
            let entry = self.entry.clone();
            let export = self.export.clone();
            node.set_handler(move |inv| {
                let path = inv.meta().command_path().to_vec();
                let request = InvokeRequest {
                    export: export.clone(),
                    path: path.clone(),
                    values: inv.to_json(),
                };
                let input = serde_json::to_vec(&request)?;
                let status =
                    process::run_with_stdin(&entry, &op_args(PluginOp::Invoke, &export, &path), &input)?;
                let mut report = Report::with_code(status.exit_code());
                if let Some(warning) = status.warning() {
                    report.warn(warning);
                }
                Ok(report)
            });
        }
        Ok(())
    }
}

impl Plugin for ProcessPlugin {
    fn on_load(
        &mut self,
        registry: &mut RegistryWriter<'_>,
        root: &CommandNode,
    ) -> Result<(), PluginError> {
        for spec in &self.manifest.loader_types {
            self.register_type(registry, spec)?;
        }
        for spec in &self.manifest.commands {
            let parent = root.lookup_path(&spec.parent).ok_or_else(|| PluginError::Protocol {
                plugin: self.plugin_name(),
                message: format!(
                    "cannot attach '{}': no command at '{}'",
                    spec.name,
                    spec.parent.join(" ")
                ),
            })?;
            self.graft(&parent, spec)?;
        }
        Ok(())
    }

    fn update(&mut self) -> Result<Vec<String>, PluginError> {
        request_update(&self.entry, &self.export)
    }
}

/// Run `<entry> update <export>`; unsupported updates are not an error.
pub(super) fn request_update(entry: &Path, export: &str) -> Result<Vec<String>, PluginError> {
    let status = match process::run(entry, &op_args(PluginOp::Update, export, &[]), None) {
        Ok(status) => status,
        Err(e) => return Ok(vec![format!("cannot run {}: {}", entry.display(), e)]),
    };
    if status.code == Some(EXIT_UNSUPPORTED) {
        debug!(entry = %entry.display(), export, "plugin has nothing to update");
        return Ok(Vec::new());
    }
    Ok(status.warning().into_iter().collect())
}
